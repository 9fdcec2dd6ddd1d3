//! Planar geometry for cable routes.
//!
//! Cables are straight segments between unit positions. The only geometric
//! question the layout model asks is whether two such segments cross, which
//! is answered with exact orientation signs rather than tolerances: a
//! crossing is *proper* only when each segment strictly separates the
//! endpoints of the other.
//!
//! ```text
//!        q1                     q1
//!         \    p2                |   p2
//!          \  /                  |  /
//!           \/      crosses      | /     touches (not a crossing)
//!           /\                   |/
//!          /  \                  p1
//!        p1    q2                |
//!                                q2
//! ```

use serde::{Deserialize, Serialize};

use crate::units::Meters;

/// A position in the array's planar coordinate system (meters).
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> Meters {
        Meters((self.x - other.x).hypot(self.y - other.y))
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }
}

/// Which side of the directed line `a → b` the point `c` lies on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Orientation {
    CounterClockwise,
    Clockwise,
    Collinear,
}

/// Sign of the cross product `(b - a) × (c - a)`.
pub fn orientation(a: Point, b: Point, c: Point) -> Orientation {
    let cross = (b.x - a.x) * (c.y - a.y) - (b.y - a.y) * (c.x - a.x);
    if cross > 0.0 {
        Orientation::CounterClockwise
    } else if cross < 0.0 {
        Orientation::Clockwise
    } else {
        Orientation::Collinear
    }
}

/// Axis-aligned bounding box of a segment, used to reject far-apart pairs
/// before the orientation test.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min: Point,
    pub max: Point,
}

impl BoundingBox {
    pub fn of_segment(segment: &Segment) -> Self {
        Self {
            min: Point::new(segment.start.x.min(segment.end.x), segment.start.y.min(segment.end.y)),
            max: Point::new(segment.start.x.max(segment.end.x), segment.start.y.max(segment.end.y)),
        }
    }

    /// Closed-interval overlap; boxes that only touch still overlap.
    pub fn overlaps(&self, other: &BoundingBox) -> bool {
        self.min.x <= other.max.x
            && other.min.x <= self.max.x
            && self.min.y <= other.max.y
            && other.min.y <= self.max.y
    }
}

/// A straight cable route between two positions.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Segment {
    pub start: Point,
    pub end: Point,
}

impl Segment {
    pub const fn new(start: Point, end: Point) -> Self {
        Self { start, end }
    }

    pub fn length(&self) -> Meters {
        self.start.distance_to(&self.end)
    }

    pub fn bounding_box(&self) -> BoundingBox {
        BoundingBox::of_segment(self)
    }

    /// Proper crossing test.
    ///
    /// True only when the segments intersect in a single point interior to
    /// both. Collinear overlap, T-junctions and shared endpoints are not
    /// crossings. Symmetric in its arguments.
    pub fn crosses(&self, other: &Segment) -> bool {
        use Orientation::Collinear;

        let o1 = orientation(self.start, self.end, other.start);
        let o2 = orientation(self.start, self.end, other.end);
        let o3 = orientation(other.start, other.end, self.start);
        let o4 = orientation(other.start, other.end, self.end);

        if [o1, o2, o3, o4].contains(&Collinear) {
            return false;
        }
        o1 != o2 && o3 != o4
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seg(x1: f64, y1: f64, x2: f64, y2: f64) -> Segment {
        Segment::new(Point::new(x1, y1), Point::new(x2, y2))
    }

    #[test]
    fn test_orientation_signs() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(1.0, 0.0);
        assert_eq!(orientation(a, b, Point::new(0.5, 1.0)), Orientation::CounterClockwise);
        assert_eq!(orientation(a, b, Point::new(0.5, -1.0)), Orientation::Clockwise);
        assert_eq!(orientation(a, b, Point::new(2.0, 0.0)), Orientation::Collinear);
    }

    #[test]
    fn test_diagonals_cross() {
        let a = seg(0.0, 0.0, 1.0, 1.0);
        let b = seg(0.0, 1.0, 1.0, 0.0);
        assert!(a.crosses(&b));
        assert!(b.crosses(&a));
    }

    #[test]
    fn test_touching_is_not_crossing() {
        let a = seg(0.0, 0.0, 1.0, 1.0);
        // endpoint lies on the interior of `a`
        assert!(!a.crosses(&seg(0.0, 1.0, 0.5, 0.5)));
        // shared end position
        assert!(!a.crosses(&seg(0.0, 1.0, 1.0, 1.0)));
    }

    #[test]
    fn test_collinear_overlap_is_not_crossing() {
        let a = seg(0.0, 0.0, 2.0, 0.0);
        let b = seg(1.0, 0.0, 3.0, 0.0);
        assert!(!a.crosses(&b));
    }

    #[test]
    fn test_disjoint_segments() {
        let a = seg(0.0, 0.0, 1.0, 1.0);
        let b = seg(0.0, 1.0, 0.0, 2.0);
        assert!(!a.crosses(&b));
        assert!(!a.bounding_box().overlaps(&seg(5.0, 5.0, 6.0, 6.0).bounding_box()));
    }

    #[test]
    fn test_length() {
        let s = seg(0.0, 0.0, 1000.0, 1000.0);
        assert!((s.length().value() - 1414.2135623).abs() < 1e-6);
    }
}
