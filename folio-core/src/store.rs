//! Annotation mutations on a [`Document`].
//!
//! Every operation is addressed by page id and annotation id. Unknown targets are a
//! silent no-op (`None`/`false`), since a page can disappear while a gesture is still
//! in flight. Mutations hand back the state they replaced; recording history is the
//! caller's job.

use serde::{Deserialize, Serialize};

use crate::document::Document;
use crate::geometry::Point;
use crate::model::{Annotation, Color, Page, ShapeAnnotation};
use crate::{AnnotationId, PageId};

pub const MIN_FONT_SIZE: f64 = 8.0;
pub const MAX_FONT_SIZE: f64 = 300.0;

/// Positional fields of an annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum Placement {
    Anchor {
        x: f64,
        y: f64,
    },
    Corners {
        x1: f64,
        y1: f64,
        x2: f64,
        y2: f64,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        path: Option<Vec<Point>>,
    },
}

impl Placement {
    fn of_shape(shape: &ShapeAnnotation) -> Self {
        Placement::Corners {
            x1: shape.x1,
            y1: shape.y1,
            x2: shape.x2,
            y2: shape.y2,
            path: shape.path.clone(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextContent {
    pub text: String,
    pub color: Color,
    pub font_size: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ShapeStyle {
    pub stroke_color: Color,
    pub stroke_width: f64,
    #[serde(default)]
    pub fill_color: Option<Color>,
}

pub fn clamp_font_size(font_size: f64) -> f64 {
    font_size.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
}

impl Page {
    fn push_annotation(&mut self, annotation: Annotation) -> usize {
        match annotation {
            Annotation::Text(text) => {
                self.text_annotations.push(text);
                self.text_annotations.len() - 1
            }
            Annotation::Highlight(highlight) => {
                self.highlight_annotations.push(highlight);
                self.highlight_annotations.len() - 1
            }
            Annotation::Shape(shape) => {
                self.shape_annotations.push(shape);
                self.shape_annotations.len() - 1
            }
        }
    }

    fn insert_annotation_at(&mut self, index: usize, annotation: Annotation) {
        match annotation {
            Annotation::Text(text) => {
                let index = index.min(self.text_annotations.len());
                self.text_annotations.insert(index, text);
            }
            Annotation::Highlight(highlight) => {
                let index = index.min(self.highlight_annotations.len());
                self.highlight_annotations.insert(index, highlight);
            }
            Annotation::Shape(shape) => {
                let index = index.min(self.shape_annotations.len());
                self.shape_annotations.insert(index, shape);
            }
        }
    }

    fn remove_annotation(&mut self, id: AnnotationId) -> Option<(usize, Annotation)> {
        if let Some(index) = self.text_annotations.iter().position(|a| a.id == id) {
            return Some((index, Annotation::Text(self.text_annotations.remove(index))));
        }
        if let Some(index) = self.highlight_annotations.iter().position(|a| a.id == id) {
            return Some((
                index,
                Annotation::Highlight(self.highlight_annotations.remove(index)),
            ));
        }
        let index = self.shape_annotations.iter().position(|a| a.id == id)?;
        Some((index, Annotation::Shape(self.shape_annotations.remove(index))))
    }

    fn placement(&self, id: AnnotationId) -> Option<Placement> {
        if let Some(text) = self.text(id) {
            return Some(Placement::Anchor { x: text.x, y: text.y });
        }
        if let Some(highlight) = self.highlight(id) {
            return Some(Placement::Anchor {
                x: highlight.x,
                y: highlight.y,
            });
        }
        self.shape(id).map(Placement::of_shape)
    }

    fn apply_placement(&mut self, id: AnnotationId, placement: &Placement) -> bool {
        match placement {
            Placement::Anchor { x, y } => {
                if let Some(text) = self.text_mut(id) {
                    text.x = *x;
                    text.y = *y;
                    return true;
                }
                if let Some(highlight) = self.highlight_mut(id) {
                    highlight.x = *x;
                    highlight.y = *y;
                    return true;
                }
                false
            }
            Placement::Corners { x1, y1, x2, y2, path } => match self.shape_mut(id) {
                Some(shape) => {
                    shape.x1 = *x1;
                    shape.y1 = *y1;
                    shape.x2 = *x2;
                    shape.y2 = *y2;
                    shape.path = path.clone();
                    true
                }
                None => false,
            },
        }
    }
}

fn translate_shape(shape: &mut ShapeAnnotation, dx: f64, dy: f64) {
    shape.x1 += dx;
    shape.y1 += dy;
    shape.x2 += dx;
    shape.y2 += dy;
    if let Some(path) = shape.path.as_mut() {
        for point in path.iter_mut() {
            *point = point.translate(dx, dy);
        }
    }
}

impl Document {
    pub fn annotation(&self, page: PageId, id: AnnotationId) -> Option<Annotation> {
        self.page(page)?.annotation(id)
    }

    /// Appends to the matching collection and returns the index inside it.
    pub fn add_annotation(&mut self, page: PageId, annotation: Annotation) -> Option<usize> {
        Some(self.page_mut(page)?.push_annotation(annotation))
    }

    /// Inserts at `index` inside the matching collection, clamped to its length.
    pub fn insert_annotation(&mut self, page: PageId, index: usize, annotation: Annotation) -> bool {
        match self.page_mut(page) {
            Some(target) => {
                target.insert_annotation_at(index, annotation);
                true
            }
            None => false,
        }
    }

    pub fn delete_annotation(&mut self, page: PageId, id: AnnotationId) -> Option<(usize, Annotation)> {
        self.page_mut(page)?.remove_annotation(id)
    }

    pub fn placement(&self, page: PageId, id: AnnotationId) -> Option<Placement> {
        self.page(page)?.placement(id)
    }

    /// Translates by (dx, dy); shapes move their path with them. Returns the old placement.
    pub fn move_annotation(&mut self, page: PageId, id: AnnotationId, dx: f64, dy: f64) -> Option<Placement> {
        let target = self.page_mut(page)?;
        let before = target.placement(id)?;
        if let Some(text) = target.text_mut(id) {
            text.x += dx;
            text.y += dy;
        } else if let Some(highlight) = target.highlight_mut(id) {
            highlight.x += dx;
            highlight.y += dy;
        } else if let Some(shape) = target.shape_mut(id) {
            translate_shape(shape, dx, dy);
        }
        Some(before)
    }

    pub fn set_placement(&mut self, page: PageId, id: AnnotationId, placement: &Placement) -> bool {
        self.page_mut(page)
            .map(|target| target.apply_placement(id, placement))
            .unwrap_or(false)
    }

    /// Font size is clamped to [8, 300]. Returns the old size.
    pub fn resize_text(&mut self, page: PageId, id: AnnotationId, font_size: f64) -> Option<f64> {
        let text = self.page_mut(page)?.text_mut(id)?;
        Some(std::mem::replace(&mut text.font_size, clamp_font_size(font_size)))
    }

    /// Width and height are clamped to be non-negative. Returns the old size.
    pub fn resize_highlight(&mut self, page: PageId, id: AnnotationId, width: f64, height: f64) -> Option<Size> {
        let highlight = self.page_mut(page)?.highlight_mut(id)?;
        let before = Size {
            width: highlight.width,
            height: highlight.height,
        };
        highlight.width = width.max(0.0);
        highlight.height = height.max(0.0);
        Some(before)
    }

    /// Stores the angle as given; only its sine and cosine matter downstream.
    pub fn rotate_text(&mut self, page: PageId, id: AnnotationId, degrees: f64) -> Option<f64> {
        let text = self.page_mut(page)?.text_mut(id)?;
        Some(std::mem::replace(&mut text.rotation, degrees))
    }

    pub fn text_content(&self, page: PageId, id: AnnotationId) -> Option<TextContent> {
        let text = self.page(page)?.text(id)?;
        Some(TextContent {
            text: text.text.clone(),
            color: text.color,
            font_size: text.font_size,
        })
    }

    pub fn update_text_content(&mut self, page: PageId, id: AnnotationId, content: TextContent) -> Option<TextContent> {
        let before = self.text_content(page, id)?;
        let text = self.page_mut(page)?.text_mut(id)?;
        text.text = content.text;
        text.color = content.color;
        text.font_size = clamp_font_size(content.font_size);
        Some(before)
    }

    pub fn recolor_highlight(&mut self, page: PageId, id: AnnotationId, color: Color) -> Option<Color> {
        let highlight = self.page_mut(page)?.highlight_mut(id)?;
        Some(std::mem::replace(&mut highlight.color, color))
    }

    pub fn restyle_shape(&mut self, page: PageId, id: AnnotationId, style: ShapeStyle) -> Option<ShapeStyle> {
        let shape = self.page_mut(page)?.shape_mut(id)?;
        let before = ShapeStyle {
            stroke_color: shape.stroke_color,
            stroke_width: shape.stroke_width,
            fill_color: shape.fill_color,
        };
        shape.stroke_color = style.stroke_color;
        shape.stroke_width = style.stroke_width.max(0.0);
        shape.fill_color = style.fill_color;
        Some(before)
    }

    /// Appends a point to a freehand path and grows its bounding corners.
    pub fn extend_freehand(&mut self, page: PageId, id: AnnotationId, point: Point) -> bool {
        let Some(shape) = self.page_mut(page).and_then(|target| target.shape_mut(id)) else {
            return false;
        };
        shape.path.get_or_insert_with(Vec::new).push(point);
        shape.x1 = shape.x1.min(point.x);
        shape.y1 = shape.y1.min(point.y);
        shape.x2 = shape.x2.max(point.x);
        shape.y2 = shape.y2.max(point.y);
        true
    }
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::model::{HighlightAnnotation, ShapeKind, TextAnnotation};

    fn doc_with_page() -> (Document, PageId) {
        let page = Page::blank(612.0, 792.0);
        let id = page.id;
        (Document::with_pages(vec![page]), id)
    }

    fn text(x: f64, y: f64) -> TextAnnotation {
        TextAnnotation {
            id: Uuid::new_v4(),
            text: "note".into(),
            x,
            y,
            font_size: 16.0,
            color: Color::BLACK,
            rotation: 0.0,
        }
    }

    fn freehand() -> ShapeAnnotation {
        ShapeAnnotation {
            id: Uuid::new_v4(),
            kind: ShapeKind::Freehand,
            x1: 0.0,
            y1: 0.0,
            x2: 10.0,
            y2: 10.0,
            stroke_color: Color::RED,
            stroke_width: 2.0,
            fill_color: None,
            path: Some(vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)]),
        }
    }

    #[test]
    fn moving_a_shape_translates_every_path_point() {
        let (mut doc, page) = doc_with_page();
        let shape = freehand();
        let id = shape.id;
        doc.add_annotation(page, Annotation::Shape(shape)).unwrap();

        let before = doc.move_annotation(page, id, 5.0, -3.0).unwrap();
        let moved = doc.page(page).unwrap().shape(id).unwrap();
        assert_eq!((moved.x1, moved.y1, moved.x2, moved.y2), (5.0, -3.0, 15.0, 7.0));
        assert_eq!(
            moved.path.as_deref(),
            Some(&[Point::new(5.0, -3.0), Point::new(15.0, 7.0)][..])
        );

        assert!(doc.set_placement(page, id, &before));
        assert_eq!(doc.page(page).unwrap().shape(id).unwrap().path.as_ref().unwrap()[1], Point::new(10.0, 10.0));
    }

    #[test]
    fn resize_text_clamps_to_font_bounds() {
        let (mut doc, page) = doc_with_page();
        let note = text(10.0, 10.0);
        let id = note.id;
        doc.add_annotation(page, Annotation::Text(note)).unwrap();

        assert_eq!(doc.resize_text(page, id, 2.0), Some(16.0));
        assert_eq!(doc.page(page).unwrap().text(id).unwrap().font_size, MIN_FONT_SIZE);
        doc.resize_text(page, id, 1000.0);
        assert_eq!(doc.page(page).unwrap().text(id).unwrap().font_size, MAX_FONT_SIZE);
    }

    #[test]
    fn resize_highlight_clamps_negative_sizes() {
        let (mut doc, page) = doc_with_page();
        let highlight = HighlightAnnotation {
            id: Uuid::new_v4(),
            x: 10.0,
            y: 50.0,
            width: 40.0,
            height: 40.0,
            color: Color::YELLOW,
        };
        let id = highlight.id;
        doc.add_annotation(page, Annotation::Highlight(highlight)).unwrap();

        let before = doc.resize_highlight(page, id, -5.0, 12.0).unwrap();
        assert_eq!(before, Size { width: 40.0, height: 40.0 });
        let after = doc.page(page).unwrap().highlight(id).unwrap();
        assert_eq!((after.width, after.height), (0.0, 12.0));
    }

    #[test]
    fn rotation_is_stored_unclamped() {
        let (mut doc, page) = doc_with_page();
        let note = text(0.0, 0.0);
        let id = note.id;
        doc.add_annotation(page, Annotation::Text(note)).unwrap();
        assert_eq!(doc.rotate_text(page, id, 725.0), Some(0.0));
        assert_eq!(doc.page(page).unwrap().text(id).unwrap().rotation, 725.0);
    }

    #[test]
    fn delete_then_insert_restores_position() {
        let (mut doc, page) = doc_with_page();
        let notes: Vec<_> = (0..3).map(|i| text(i as f64, 0.0)).collect();
        let middle = notes[1].id;
        for note in notes {
            doc.add_annotation(page, Annotation::Text(note));
        }

        let (index, removed) = doc.delete_annotation(page, middle).unwrap();
        assert_eq!(index, 1);
        assert_eq!(doc.page(page).unwrap().text_annotations.len(), 2);

        assert!(doc.insert_annotation(page, index, removed));
        assert_eq!(doc.page(page).unwrap().text_annotations[1].id, middle);
    }

    #[test]
    fn unknown_targets_are_silent_no_ops() {
        let (mut doc, page) = doc_with_page();
        let stranger = Uuid::new_v4();
        assert!(doc.move_annotation(page, stranger, 1.0, 1.0).is_none());
        assert!(doc.move_annotation(stranger, stranger, 1.0, 1.0).is_none());
        assert!(doc.resize_text(page, stranger, 12.0).is_none());
        assert!(doc.delete_annotation(page, stranger).is_none());
        assert!(!doc.insert_annotation(stranger, 0, Annotation::Text(text(0.0, 0.0))));
        assert!(!doc.extend_freehand(page, stranger, Point::new(0.0, 0.0)));
    }

    #[test]
    fn freehand_extension_grows_bounds() {
        let (mut doc, page) = doc_with_page();
        let shape = freehand();
        let id = shape.id;
        doc.add_annotation(page, Annotation::Shape(shape));
        assert!(doc.extend_freehand(page, id, Point::new(-4.0, 30.0)));
        let grown = doc.page(page).unwrap().shape(id).unwrap();
        assert_eq!((grown.x1, grown.y2), (-4.0, 30.0));
        assert_eq!(grown.path.as_ref().unwrap().len(), 3);
    }
}
