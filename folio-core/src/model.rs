use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::geometry::{Point, Rotation};
use crate::{AnnotationId, PageId};

#[derive(Debug, Error, PartialEq, Eq)]
#[error("invalid color {0:?}; expected #rrggbb or #rrggbbaa")]
pub struct ColorParseError(pub String);

/// RGBA color, written as `#rrggbb` (opaque) or `#rrggbbaa` on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    pub const BLACK: Color = Color::rgb(0, 0, 0);
    pub const WHITE: Color = Color::rgb(255, 255, 255);
    pub const RED: Color = Color::rgb(255, 0, 0);
    pub const YELLOW: Color = Color::rgb(255, 235, 59);

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self { r, g, b, a: 255 }
    }

    pub const fn rgba(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }
}

impl fmt::Display for Color {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{:02x}{:02x}{:02x}", self.r, self.g, self.b)?;
        if self.a != 255 {
            write!(f, "{:02x}", self.a)?;
        }
        Ok(())
    }
}

impl FromStr for Color {
    type Err = ColorParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || ColorParseError(s.to_owned());
        let hex = s.strip_prefix('#').ok_or_else(err)?;
        if !(hex.len() == 6 || hex.len() == 8) || !hex.is_ascii() {
            return Err(err());
        }
        let channel = |i: usize| u8::from_str_radix(&hex[i..i + 2], 16).map_err(|_| err());
        let a = if hex.len() == 8 { channel(6)? } else { 255 };
        Ok(Color::rgba(channel(0)?, channel(2)?, channel(4)?, a))
    }
}

impl TryFrom<String> for Color {
    type Error = ColorParseError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Color> for String {
    fn from(value: Color) -> Self {
        value.to_string()
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextAnnotation {
    pub id: AnnotationId,
    pub text: String,
    pub x: f64,
    pub y: f64,
    pub font_size: f64,
    pub color: Color,
    #[serde(default)]
    pub rotation: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HighlightAnnotation {
    pub id: AnnotationId,
    pub x: f64,
    /// Top edge; the larger document Y of the rectangle.
    pub y: f64,
    pub width: f64,
    pub height: f64,
    pub color: Color,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ShapeKind {
    Line,
    Arrow,
    Rectangle,
    Ellipse,
    Freehand,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeAnnotation {
    pub id: AnnotationId,
    #[serde(rename = "type")]
    pub kind: ShapeKind,
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
    pub stroke_color: Color,
    pub stroke_width: f64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fill_color: Option<Color>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path: Option<Vec<Point>>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AnnotationKind {
    Text,
    Highlight,
    Shape,
}

/// Any annotation, as carried by clipboard and insert/delete edit records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Annotation {
    Text(TextAnnotation),
    Highlight(HighlightAnnotation),
    Shape(ShapeAnnotation),
}

impl Annotation {
    pub fn id(&self) -> AnnotationId {
        match self {
            Annotation::Text(text) => text.id,
            Annotation::Highlight(highlight) => highlight.id,
            Annotation::Shape(shape) => shape.id,
        }
    }

    pub fn kind(&self) -> AnnotationKind {
        match self {
            Annotation::Text(_) => AnnotationKind::Text,
            Annotation::Highlight(_) => AnnotationKind::Highlight,
            Annotation::Shape(_) => AnnotationKind::Shape,
        }
    }

    /// Same content under a fresh id.
    pub fn with_new_id(&self) -> Self {
        let mut copy = self.clone();
        let id = Uuid::new_v4();
        match &mut copy {
            Annotation::Text(text) => text.id = id,
            Annotation::Highlight(highlight) => highlight.id = id,
            Annotation::Shape(shape) => shape.id = id,
        }
        copy
    }
}

/// Where a page came from. Lets image pages be told apart from blanks and duplicates.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum PageSource {
    Original { index: usize },
    #[default]
    Blank,
    Image { name: String },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Page {
    pub id: PageId,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub rotation: Rotation,
    #[serde(default)]
    pub source: PageSource,
    #[serde(default)]
    pub text_annotations: Vec<TextAnnotation>,
    #[serde(default)]
    pub highlight_annotations: Vec<HighlightAnnotation>,
    #[serde(default)]
    pub shape_annotations: Vec<ShapeAnnotation>,
}

impl Page {
    pub fn new(width: f64, height: f64, source: PageSource) -> Self {
        Self {
            id: Uuid::new_v4(),
            width,
            height,
            rotation: Rotation::Deg0,
            source,
            text_annotations: Vec::new(),
            highlight_annotations: Vec::new(),
            shape_annotations: Vec::new(),
        }
    }

    pub fn blank(width: f64, height: f64) -> Self {
        Self::new(width, height, PageSource::Blank)
    }

    /// Deep copy under a fresh page id; annotations get fresh ids too.
    pub fn duplicate(&self) -> Self {
        let mut copy = self.clone();
        copy.id = Uuid::new_v4();
        for text in &mut copy.text_annotations {
            text.id = Uuid::new_v4();
        }
        for highlight in &mut copy.highlight_annotations {
            highlight.id = Uuid::new_v4();
        }
        for shape in &mut copy.shape_annotations {
            shape.id = Uuid::new_v4();
        }
        copy
    }

    pub fn annotation_count(&self) -> usize {
        self.text_annotations.len()
            + self.highlight_annotations.len()
            + self.shape_annotations.len()
    }

    pub fn text(&self, id: AnnotationId) -> Option<&TextAnnotation> {
        self.text_annotations.iter().find(|a| a.id == id)
    }

    pub fn text_mut(&mut self, id: AnnotationId) -> Option<&mut TextAnnotation> {
        self.text_annotations.iter_mut().find(|a| a.id == id)
    }

    pub fn highlight(&self, id: AnnotationId) -> Option<&HighlightAnnotation> {
        self.highlight_annotations.iter().find(|a| a.id == id)
    }

    pub fn highlight_mut(&mut self, id: AnnotationId) -> Option<&mut HighlightAnnotation> {
        self.highlight_annotations.iter_mut().find(|a| a.id == id)
    }

    pub fn shape(&self, id: AnnotationId) -> Option<&ShapeAnnotation> {
        self.shape_annotations.iter().find(|a| a.id == id)
    }

    pub fn shape_mut(&mut self, id: AnnotationId) -> Option<&mut ShapeAnnotation> {
        self.shape_annotations.iter_mut().find(|a| a.id == id)
    }

    /// Owned copy of the annotation with `id`, whatever its collection.
    pub fn annotation(&self, id: AnnotationId) -> Option<Annotation> {
        if let Some(text) = self.text(id) {
            return Some(Annotation::Text(text.clone()));
        }
        if let Some(highlight) = self.highlight(id) {
            return Some(Annotation::Highlight(highlight.clone()));
        }
        self.shape(id).cloned().map(Annotation::Shape)
    }

    pub fn contains_annotation(&self, id: AnnotationId) -> bool {
        self.text(id).is_some() || self.highlight(id).is_some() || self.shape(id).is_some()
    }
}
