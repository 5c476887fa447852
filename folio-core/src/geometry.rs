use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn translate(self, dx: f64, dy: f64) -> Self {
        Self::new(self.x + dx, self.y + dy)
    }

    pub fn distance_to(self, other: Point) -> f64 {
        (self.x - other.x).hypot(self.y - other.y)
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
#[error("rotation must be a multiple of 90 degrees, got {0}")]
pub struct RotationError(pub i32);

/// Page rotation in quarter turns, clockwise as seen on screen.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "i32", into = "i32")]
pub enum Rotation {
    #[default]
    Deg0,
    Deg90,
    Deg180,
    Deg270,
}

impl Rotation {
    /// Normalizes any multiple of 90 into [0, 360).
    pub fn from_degrees(degrees: i32) -> Option<Self> {
        if degrees % 90 != 0 {
            return None;
        }
        Some(Self::from_quarter_turns(degrees / 90))
    }

    pub fn from_quarter_turns(turns: i32) -> Self {
        match turns.rem_euclid(4) {
            0 => Rotation::Deg0,
            1 => Rotation::Deg90,
            2 => Rotation::Deg180,
            _ => Rotation::Deg270,
        }
    }

    pub fn degrees(self) -> i32 {
        self.quarter_turns() * 90
    }

    pub fn quarter_turns(self) -> i32 {
        match self {
            Rotation::Deg0 => 0,
            Rotation::Deg90 => 1,
            Rotation::Deg180 => 2,
            Rotation::Deg270 => 3,
        }
    }

    /// Adds `delta` degrees, rounded to the nearest quarter turn.
    pub fn rotate_by(self, delta: i32) -> Self {
        let turns = (f64::from(delta) / 90.0).round() as i32;
        Self::from_quarter_turns(self.quarter_turns() + turns)
    }

    /// Width and height trade places on screen.
    pub fn is_sideways(self) -> bool {
        matches!(self, Rotation::Deg90 | Rotation::Deg270)
    }
}

impl TryFrom<i32> for Rotation {
    type Error = RotationError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        Self::from_degrees(value).ok_or(RotationError(value))
    }
}

impl From<Rotation> for i32 {
    fn from(value: Rotation) -> Self {
        value.degrees()
    }
}

/// Axis-aligned rectangle in document space.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub min_x: f64,
    pub min_y: f64,
    pub max_x: f64,
    pub max_y: f64,
}

impl Rect {
    pub fn from_corners(a: Point, b: Point) -> Self {
        Self {
            min_x: a.x.min(b.x),
            min_y: a.y.min(b.y),
            max_x: a.x.max(b.x),
            max_y: a.y.max(b.y),
        }
    }

    pub fn width(&self) -> f64 {
        self.max_x - self.min_x
    }

    pub fn height(&self) -> f64 {
        self.max_y - self.min_y
    }

    pub fn center(&self) -> Point {
        Point::new(
            (self.min_x + self.max_x) * 0.5,
            (self.min_y + self.max_y) * 0.5,
        )
    }

    pub fn include(&mut self, point: Point) {
        self.min_x = self.min_x.min(point.x);
        self.min_y = self.min_y.min(point.y);
        self.max_x = self.max_x.max(point.x);
        self.max_y = self.max_y.max(point.y);
    }

    pub fn contains(&self, point: Point, tolerance: f64) -> bool {
        point.x >= self.min_x - tolerance
            && point.x <= self.max_x + tolerance
            && point.y >= self.min_y - tolerance
            && point.y <= self.max_y + tolerance
    }
}

/// Maps a pointer-space pixel to document space.
///
/// Exact inverse of the paint transform (translate to center, rotate clockwise,
/// translate back, scale). With `u = px / scale` and `v = py / scale`:
///
/// | rotation | document point   |
/// |----------|------------------|
/// | 0        | (u, H - v)       |
/// | 90       | (v, u)           |
/// | 180      | (W - u, v)       |
/// | 270      | (W - v, H - u)   |
pub fn to_document_point(
    pointer: Point,
    scale: f64,
    page_width: f64,
    page_height: f64,
    rotation: Rotation,
) -> Point {
    let u = pointer.x / scale;
    let v = pointer.y / scale;
    match rotation {
        Rotation::Deg0 => Point::new(u, page_height - v),
        Rotation::Deg90 => Point::new(v, u),
        Rotation::Deg180 => Point::new(page_width - u, v),
        Rotation::Deg270 => Point::new(page_width - v, page_height - u),
    }
}

/// Document point to unrotated surface pixels. Painting applies the page rotation as a
/// surface transform, so only the Y flip and scale happen here.
pub fn to_pointer_point(doc: Point, scale: f64, page_height: f64) -> Point {
    Point::new(doc.x * scale, (page_height - doc.y) * scale)
}

/// Document point to pixels on the rotated surface; inverse of [`to_document_point`].
pub fn to_surface_point(
    doc: Point,
    scale: f64,
    page_width: f64,
    page_height: f64,
    rotation: Rotation,
) -> Point {
    let (u, v) = match rotation {
        Rotation::Deg0 => (doc.x, page_height - doc.y),
        Rotation::Deg90 => (doc.y, doc.x),
        Rotation::Deg180 => (page_width - doc.x, doc.y),
        Rotation::Deg270 => (page_height - doc.y, page_width - doc.x),
    };
    Point::new(u * scale, v * scale)
}

/// Pixel size of the rotated, scaled page surface.
pub fn surface_size(page_width: f64, page_height: f64, scale: f64, rotation: Rotation) -> (f64, f64) {
    if rotation.is_sideways() {
        (page_height * scale, page_width * scale)
    } else {
        (page_width * scale, page_height * scale)
    }
}

/// Rotates `point` around `center` by `degrees` clockwise as seen on screen.
///
/// Document space is Y-up, so a clockwise turn on screen is a negative turn in the
/// usual counter-clockwise math sense.
pub fn rotate_about(point: Point, center: Point, degrees: f64) -> Point {
    let (sin, cos) = degrees.to_radians().sin_cos();
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    Point::new(
        center.x + dx * cos + dy * sin,
        center.y - dx * sin + dy * cos,
    )
}

/// Undoes [`rotate_about`] for the same center and angle.
pub fn unrotate_about(point: Point, center: Point, degrees: f64) -> Point {
    rotate_about(point, center, -degrees)
}

/// Screen-clockwise angle of `point` around `center`, 0 pointing straight up.
pub fn clockwise_angle(center: Point, point: Point) -> f64 {
    let dx = point.x - center.x;
    let dy = point.y - center.y;
    dx.atan2(dy).to_degrees()
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::Rng;

    const W: f64 = 612.0;
    const H: f64 = 792.0;
    const ALL: [Rotation; 4] = [
        Rotation::Deg0,
        Rotation::Deg90,
        Rotation::Deg180,
        Rotation::Deg270,
    ];

    fn assert_close(actual: Point, expected: Point) {
        assert!(
            (actual.x - expected.x).abs() < 1e-6 && (actual.y - expected.y).abs() < 1e-6,
            "expected {:?}, got {:?}",
            expected,
            actual
        );
    }

    #[test]
    fn unrotated_round_trip_holds_for_common_scales() {
        let mut rng = rand::thread_rng();
        for scale in [0.5, 1.0, 2.0] {
            for _ in 0..200 {
                let doc = Point::new(rng.gen_range(-50.0..W + 50.0), rng.gen_range(-50.0..H + 50.0));
                let pointer = to_pointer_point(doc, scale, H);
                let back = to_document_point(pointer, scale, W, H, Rotation::Deg0);
                assert_close(back, doc);
            }
        }
    }

    #[test]
    fn surface_point_inverts_document_point_for_every_rotation() {
        let mut rng = rand::thread_rng();
        for rotation in ALL {
            for scale in [0.5, 1.0, 2.0] {
                for _ in 0..50 {
                    let doc = Point::new(rng.gen_range(0.0..W), rng.gen_range(0.0..H));
                    let pixel = to_surface_point(doc, scale, W, H, rotation);
                    assert_close(to_document_point(pixel, scale, W, H, rotation), doc);
                }
            }
        }
    }

    #[test]
    fn corner_table_matches_for_every_rotation() {
        let s = 1.5;
        // (rotation, [top-left, top-right, bottom-left, bottom-right] of the surface in doc space)
        let cases = [
            (Rotation::Deg0, [(0.0, H), (W, H), (0.0, 0.0), (W, 0.0)]),
            (Rotation::Deg90, [(0.0, 0.0), (0.0, H), (W, 0.0), (W, H)]),
            (Rotation::Deg180, [(W, 0.0), (0.0, 0.0), (W, H), (0.0, H)]),
            (Rotation::Deg270, [(W, H), (W, 0.0), (0.0, H), (0.0, 0.0)]),
        ];
        for (rotation, expected) in cases {
            let (sw, sh) = surface_size(W, H, s, rotation);
            let corners = [
                Point::new(0.0, 0.0),
                Point::new(sw, 0.0),
                Point::new(0.0, sh),
                Point::new(sw, sh),
            ];
            for (corner, (ex, ey)) in corners.into_iter().zip(expected) {
                let doc = to_document_point(corner, s, W, H, rotation);
                assert_close(doc, Point::new(ex, ey));
            }
        }
    }

    #[test]
    fn axis_growth_follows_rotation_table() {
        let s = 2.0;
        let step = 10.0;
        // (rotation, doc delta for +pointerX, doc delta for +pointerY)
        let cases = [
            (Rotation::Deg0, (1.0, 0.0), (0.0, -1.0)),
            (Rotation::Deg90, (0.0, 1.0), (1.0, 0.0)),
            (Rotation::Deg180, (-1.0, 0.0), (0.0, 1.0)),
            (Rotation::Deg270, (0.0, -1.0), (-1.0, 0.0)),
        ];
        for (rotation, along_x, along_y) in cases {
            let origin = to_document_point(Point::new(40.0, 40.0), s, W, H, rotation);
            let moved_x = to_document_point(Point::new(40.0 + step, 40.0), s, W, H, rotation);
            let moved_y = to_document_point(Point::new(40.0, 40.0 + step), s, W, H, rotation);
            let unit = step / s;
            assert_close(
                Point::new(moved_x.x - origin.x, moved_x.y - origin.y),
                Point::new(along_x.0 * unit, along_x.1 * unit),
            );
            assert_close(
                Point::new(moved_y.x - origin.x, moved_y.y - origin.y),
                Point::new(along_y.0 * unit, along_y.1 * unit),
            );
        }
    }

    #[test]
    fn quarter_turn_maps_far_corner_to_page_corner() {
        let s = 0.75;
        let far = Point::new(H * s, W * s);
        assert_close(
            to_document_point(far, s, W, H, Rotation::Deg90),
            Point::new(W, H),
        );
        assert_close(
            to_document_point(Point::new(0.0, 0.0), s, W, H, Rotation::Deg90),
            Point::new(0.0, 0.0),
        );
    }

    #[test]
    fn rotation_normalizes_and_rejects_partial_turns() {
        assert_eq!(Rotation::from_degrees(-90), Some(Rotation::Deg270));
        assert_eq!(Rotation::from_degrees(450), Some(Rotation::Deg90));
        assert_eq!(Rotation::from_degrees(45), None);
        assert_eq!(Rotation::Deg270.rotate_by(90), Rotation::Deg0);
        assert_eq!(Rotation::Deg0.rotate_by(-90), Rotation::Deg270);
        assert_eq!(Rotation::try_from(30), Err(RotationError(30)));

        let json = serde_json::to_string(&Rotation::Deg180).unwrap();
        assert_eq!(json, "180");
        assert!(serde_json::from_str::<Rotation>("100").is_err());
    }

    #[test]
    fn rotate_about_is_clockwise_on_screen() {
        let center = Point::new(0.0, 0.0);
        // Straight up in document space turns to the right after a clockwise quarter turn.
        let turned = rotate_about(Point::new(0.0, 10.0), center, 90.0);
        assert_close(turned, Point::new(10.0, 0.0));
        assert_close(unrotate_about(turned, center, 90.0), Point::new(0.0, 10.0));
        assert!((clockwise_angle(center, Point::new(10.0, 0.0)) - 90.0).abs() < 1e-9);
        assert!(clockwise_angle(center, Point::new(0.0, 5.0)).abs() < 1e-9);
    }

    #[test]
    fn degenerate_scale_does_not_panic() {
        let p = to_document_point(Point::new(10.0, 10.0), 0.0, W, H, Rotation::Deg90);
        assert!(p.x.is_infinite());
    }
}
