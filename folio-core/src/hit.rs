//! Hit-testing of annotations and their interaction handles, in document space.
//!
//! Tolerances come in as pointer pixels and are divided by the view scale, so the
//! clickable slop stays constant on screen at every zoom level.

use crate::geometry::{rotate_about, unrotate_about, Point, Rect};
use crate::model::{
    AnnotationKind, HighlightAnnotation, Page, ShapeAnnotation, ShapeKind, TextAnnotation,
};
use crate::AnnotationId;

/// Gap between a box corner and its resize handle, in document units.
pub const HANDLE_PADDING: f64 = 4.0;
/// Distance of the rotate handle above the box's top edge, in document units.
pub const ROTATE_HANDLE_DISTANCE: f64 = 24.0;
/// Half the side of the square resize handle hit region, in pixels.
pub const RESIZE_HANDLE_HALF_PX: f64 = 6.0;
/// Radius of the circular rotate handle hit region, in pixels.
pub const ROTATE_HANDLE_RADIUS_PX: f64 = 8.0;

pub trait TextMeasure {
    /// Advance width of one line of `text`, in document units.
    fn line_width(&self, line: &str, font_size: f64) -> f64;
}

/// Average-glyph-width estimate; good enough for hit-testing without a font.
#[derive(Debug, Clone, Copy)]
pub struct ApproxTextMeasure {
    pub char_width_ratio: f64,
}

impl Default for ApproxTextMeasure {
    fn default() -> Self {
        Self {
            char_width_ratio: 0.6,
        }
    }
}

impl TextMeasure for ApproxTextMeasure {
    fn line_width(&self, line: &str, font_size: f64) -> f64 {
        line.chars().count() as f64 * font_size * self.char_width_ratio
    }
}

/// Unrotated box of a text annotation. Lines stack upward from the bottom-left anchor.
pub fn text_bounds(text: &TextAnnotation, measure: &dyn TextMeasure) -> Rect {
    let lines = text.text.lines().count().max(1);
    let width = text
        .text
        .lines()
        .map(|line| measure.line_width(line, text.font_size))
        .fold(0.0, f64::max);
    Rect {
        min_x: text.x,
        min_y: text.y,
        max_x: text.x + width,
        max_y: text.y + text.font_size * lines as f64,
    }
}

pub fn highlight_bounds(highlight: &HighlightAnnotation) -> Rect {
    Rect {
        min_x: highlight.x,
        min_y: highlight.y - highlight.height,
        max_x: highlight.x + highlight.width,
        max_y: highlight.y,
    }
}

pub fn shape_bounds(shape: &ShapeAnnotation) -> Rect {
    let mut bounds = Rect::from_corners(
        Point::new(shape.x1, shape.y1),
        Point::new(shape.x2, shape.y2),
    );
    if let Some(path) = &shape.path {
        for point in path {
            bounds.include(*point);
        }
    }
    bounds
}

pub fn hit_test_text(point: Point, text: &TextAnnotation, tolerance: f64, measure: &dyn TextMeasure) -> bool {
    let bounds = text_bounds(text, measure);
    let local = unrotate_about(point, bounds.center(), text.rotation);
    bounds.contains(local, tolerance)
}

pub fn hit_test_highlight(point: Point, highlight: &HighlightAnnotation, tolerance: f64) -> bool {
    highlight_bounds(highlight).contains(point, tolerance)
}

pub fn hit_test_shape(point: Point, shape: &ShapeAnnotation, tolerance: f64) -> bool {
    let slop = tolerance + shape.stroke_width * 0.5;
    let start = Point::new(shape.x1, shape.y1);
    let end = Point::new(shape.x2, shape.y2);
    match shape.kind {
        ShapeKind::Line | ShapeKind::Arrow => distance_to_segment(point, start, end) <= slop,
        ShapeKind::Rectangle => Rect::from_corners(start, end).contains(point, slop),
        ShapeKind::Ellipse => {
            let bounds = Rect::from_corners(start, end);
            let center = bounds.center();
            let rx = bounds.width() * 0.5 + slop;
            let ry = bounds.height() * 0.5 + slop;
            if rx <= 0.0 || ry <= 0.0 {
                return false;
            }
            let nx = (point.x - center.x) / rx;
            let ny = (point.y - center.y) / ry;
            nx * nx + ny * ny <= 1.0
        }
        ShapeKind::Freehand => match shape.path.as_deref() {
            Some([only]) => only.distance_to(point) <= slop,
            Some(path) if path.len() > 1 => path
                .windows(2)
                .any(|pair| distance_to_segment(point, pair[0], pair[1]) <= slop),
            _ => shape_bounds(shape).contains(point, slop),
        },
    }
}

fn distance_to_segment(point: Point, start: Point, end: Point) -> f64 {
    let dx = end.x - start.x;
    let dy = end.y - start.y;
    let length_sq = dx * dx + dy * dy;
    if length_sq < 1e-12 {
        return point.distance_to(start);
    }
    let t = (((point.x - start.x) * dx + (point.y - start.y) * dy) / length_sq).clamp(0.0, 1.0);
    point.distance_to(Point::new(start.x + t * dx, start.y + t * dy))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Hit {
    pub kind: AnnotationKind,
    pub id: AnnotationId,
}

/// Topmost annotation under `point`. Paint order is highlights, shapes, then text, so
/// the search runs the other way round, last-drawn first.
pub fn hit_test_page(
    page: &Page,
    point: Point,
    scale: f64,
    tolerance_px: f64,
    measure: &dyn TextMeasure,
) -> Option<Hit> {
    let tolerance = tolerance_px / scale;
    if let Some(text) = page
        .text_annotations
        .iter()
        .rev()
        .find(|text| hit_test_text(point, text, tolerance, measure))
    {
        return Some(Hit {
            kind: AnnotationKind::Text,
            id: text.id,
        });
    }
    if let Some(shape) = page
        .shape_annotations
        .iter()
        .rev()
        .find(|shape| hit_test_shape(point, shape, tolerance))
    {
        return Some(Hit {
            kind: AnnotationKind::Shape,
            id: shape.id,
        });
    }
    page.highlight_annotations
        .iter()
        .rev()
        .find(|highlight| hit_test_highlight(point, highlight, tolerance))
        .map(|highlight| Hit {
            kind: AnnotationKind::Highlight,
            id: highlight.id,
        })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Handle {
    Resize,
    Rotate,
}

/// Handle positions of a text box before the annotation's own rotation is applied.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextHandles {
    pub center: Point,
    pub resize: Point,
    pub rotate: Point,
}

pub fn text_handles(text: &TextAnnotation, measure: &dyn TextMeasure) -> TextHandles {
    let bounds = text_bounds(text, measure);
    let center = bounds.center();
    TextHandles {
        center,
        resize: Point::new(bounds.max_x + HANDLE_PADDING, bounds.min_y - HANDLE_PADDING),
        rotate: Point::new(center.x, bounds.max_y + ROTATE_HANDLE_DISTANCE),
    }
}

/// Where the handles actually sit on the page, rotation included.
pub fn rotated_text_handles(text: &TextAnnotation, measure: &dyn TextMeasure) -> TextHandles {
    let handles = text_handles(text, measure);
    let turn = |p: Point| rotate_about(p, handles.center, text.rotation);
    TextHandles {
        center: handles.center,
        resize: turn(handles.resize),
        rotate: turn(handles.rotate),
    }
}

pub fn highlight_resize_handle(highlight: &HighlightAnnotation) -> Point {
    let bounds = highlight_bounds(highlight);
    Point::new(bounds.max_x + HANDLE_PADDING, bounds.min_y - HANDLE_PADDING)
}

fn within_square(point: Point, center: Point, half: f64) -> bool {
    (point.x - center.x).abs() <= half && (point.y - center.y).abs() <= half
}

pub fn hit_test_text_handle(
    point: Point,
    text: &TextAnnotation,
    scale: f64,
    measure: &dyn TextMeasure,
) -> Option<Handle> {
    let handles = text_handles(text, measure);
    let local = unrotate_about(point, handles.center, text.rotation);
    if within_square(local, handles.resize, RESIZE_HANDLE_HALF_PX / scale) {
        return Some(Handle::Resize);
    }
    if local.distance_to(handles.rotate) <= ROTATE_HANDLE_RADIUS_PX / scale {
        return Some(Handle::Rotate);
    }
    None
}

pub fn hit_test_highlight_handle(point: Point, highlight: &HighlightAnnotation, scale: f64) -> Option<Handle> {
    within_square(
        point,
        highlight_resize_handle(highlight),
        RESIZE_HANDLE_HALF_PX / scale,
    )
    .then_some(Handle::Resize)
}

#[cfg(test)]
mod tests {
    use uuid::Uuid;

    use super::*;
    use crate::geometry::{to_document_point, to_surface_point, Rotation};
    use crate::model::Color;

    fn text(rotation: f64) -> TextAnnotation {
        // "abcd" at 10pt with the default measure: 24 x 10 box at (100, 100).
        TextAnnotation {
            id: Uuid::new_v4(),
            text: "abcd".into(),
            x: 100.0,
            y: 100.0,
            font_size: 10.0,
            color: Color::BLACK,
            rotation,
        }
    }

    fn highlight() -> HighlightAnnotation {
        HighlightAnnotation {
            id: Uuid::new_v4(),
            x: 10.0,
            y: 50.0,
            width: 40.0,
            height: 40.0,
            color: Color::YELLOW,
        }
    }

    fn shape(kind: ShapeKind) -> ShapeAnnotation {
        ShapeAnnotation {
            id: Uuid::new_v4(),
            kind,
            x1: 0.0,
            y1: 0.0,
            x2: 100.0,
            y2: 50.0,
            stroke_color: Color::RED,
            stroke_width: 2.0,
            fill_color: None,
            path: None,
        }
    }

    #[test]
    fn text_box_follows_measure() {
        let bounds = text_bounds(&text(0.0), &ApproxTextMeasure::default());
        assert!((bounds.width() - 24.0).abs() < 1e-9);
        assert!((bounds.height() - 10.0).abs() < 1e-9);
    }

    #[test]
    fn rotated_text_is_hit_in_its_own_frame() {
        let measure = ApproxTextMeasure::default();
        let upright = text(0.0);
        let turned = text(90.0);
        // Right end of the upright box; a quarter turn swings it below the center.
        let right_end = Point::new(122.0, 105.0);
        assert!(hit_test_text(right_end, &upright, 0.0, &measure));
        assert!(!hit_test_text(right_end, &turned, 0.0, &measure));

        let center = text_bounds(&turned, &measure).center();
        let swung = rotate_about(right_end, center, 90.0);
        assert!(hit_test_text(swung, &turned, 0.0, &measure));
    }

    #[test]
    fn tolerance_shrinks_with_zoom() {
        let measure = ApproxTextMeasure::default();
        let mut page = Page::blank(612.0, 792.0);
        page.text_annotations.push(text(0.0));
        let just_outside = Point::new(127.0, 105.0);
        assert!(hit_test_page(&page, just_outside, 1.0, 5.0, &measure).is_some());
        assert!(hit_test_page(&page, just_outside, 4.0, 5.0, &measure).is_none());
    }

    #[test]
    fn topmost_annotation_wins() {
        let measure = ApproxTextMeasure::default();
        let mut page = Page::blank(612.0, 792.0);
        let below = highlight();
        let mut above = highlight();
        above.id = Uuid::new_v4();
        page.highlight_annotations.push(below);
        page.highlight_annotations.push(above.clone());

        let hit = hit_test_page(&page, Point::new(30.0, 30.0), 1.0, 0.0, &measure).unwrap();
        assert_eq!(hit, Hit { kind: AnnotationKind::Highlight, id: above.id });

        let mut rect = shape(ShapeKind::Rectangle);
        rect.x2 = 60.0;
        page.shape_annotations.push(rect.clone());
        let hit = hit_test_page(&page, Point::new(30.0, 30.0), 1.0, 0.0, &measure).unwrap();
        assert_eq!(hit.id, rect.id);
    }

    #[test]
    fn shapes_hit_by_kind() {
        let line = shape(ShapeKind::Line);
        assert!(hit_test_shape(Point::new(50.0, 26.0), &line, 1.0));
        assert!(!hit_test_shape(Point::new(50.0, 40.0), &line, 1.0));

        let ellipse = shape(ShapeKind::Ellipse);
        assert!(hit_test_shape(Point::new(50.0, 25.0), &ellipse, 0.0));
        assert!(!hit_test_shape(Point::new(2.0, 2.0), &ellipse, 0.0));

        let mut free = shape(ShapeKind::Freehand);
        free.path = Some(vec![Point::new(0.0, 0.0), Point::new(0.0, 50.0), Point::new(100.0, 50.0)]);
        assert!(hit_test_shape(Point::new(50.0, 50.5), &free, 0.0));
        assert!(!hit_test_shape(Point::new(50.0, 25.0), &free, 0.0));
    }

    #[test]
    fn text_handles_follow_annotation_rotation() {
        let measure = ApproxTextMeasure::default();
        let upright = text(0.0);
        let handles = text_handles(&upright, &measure);
        assert_eq!(handles.resize, Point::new(128.0, 96.0));
        assert_eq!(hit_test_text_handle(handles.resize, &upright, 1.0, &measure), Some(Handle::Resize));
        assert_eq!(hit_test_text_handle(handles.rotate, &upright, 1.0, &measure), Some(Handle::Rotate));

        let turned = text(45.0);
        let placed = rotated_text_handles(&turned, &measure);
        assert_eq!(hit_test_text_handle(placed.rotate, &turned, 1.0, &measure), Some(Handle::Rotate));
        assert_eq!(hit_test_text_handle(placed.resize, &turned, 1.0, &measure), Some(Handle::Resize));
        assert_eq!(hit_test_text_handle(handles.rotate, &turned, 1.0, &measure), None);
    }

    #[test]
    fn highlight_handle_is_found_on_a_rotated_surface() {
        let mark = highlight();
        let handle = highlight_resize_handle(&mark);
        for rotation in [Rotation::Deg0, Rotation::Deg90, Rotation::Deg180, Rotation::Deg270] {
            let pixel = to_surface_point(handle, 2.0, 612.0, 792.0, rotation);
            let nudged = Point::new(pixel.x + 3.0, pixel.y - 3.0);
            let doc = to_document_point(nudged, 2.0, 612.0, 792.0, rotation);
            assert_eq!(hit_test_highlight_handle(doc, &mark, 2.0), Some(Handle::Resize));
        }
        assert_eq!(hit_test_highlight_handle(Point::new(30.0, 30.0), &mark, 1.0), None);
    }
}
