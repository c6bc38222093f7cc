use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum GeometryError {
    #[error("Invalid crop region ({x_min}, {y_min})-({x_max}, {y_max}): min must be below max on both axes")]
    InvalidRegion {
        x_min: f64,
        y_min: f64,
        x_max: f64,
        y_max: f64,
    },
}

/// A 2D point in layout coordinates (physical units after import scaling).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance_to(&self, other: &Point) -> f64 {
        ((self.x - other.x).powi(2) + (self.y - other.y).powi(2)).sqrt()
    }

    pub fn translate(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

/// An axis-aligned bounding box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct BBox {
    pub min: Point,
    pub max: Point,
}

impl BBox {
    pub fn new(min: Point, max: Point) -> Self {
        Self { min, max }
    }

    pub fn from_points(points: &[Point]) -> Option<Self> {
        if points.is_empty() {
            return None;
        }
        let mut min_x = f64::MAX;
        let mut min_y = f64::MAX;
        let mut max_x = f64::MIN;
        let mut max_y = f64::MIN;
        for p in points {
            min_x = min_x.min(p.x);
            min_y = min_y.min(p.y);
            max_x = max_x.max(p.x);
            max_y = max_y.max(p.y);
        }
        Some(Self {
            min: Point::new(min_x, min_y),
            max: Point::new(max_x, max_y),
        })
    }

    pub fn width(&self) -> f64 {
        self.max.x - self.min.x
    }

    pub fn height(&self) -> f64 {
        self.max.y - self.min.y
    }

    /// The four corners, counter-clockwise from `min`.
    pub fn corners(&self) -> [Point; 4] {
        [
            self.min,
            Point::new(self.max.x, self.min.y),
            self.max,
            Point::new(self.min.x, self.max.y),
        ]
    }

    /// True when `other` lies inside `self`, allowing `tolerance` of overhang on every side.
    pub fn contains_bbox(&self, other: &BBox, tolerance: f64) -> bool {
        other.min.x >= self.min.x - tolerance
            && other.min.y >= self.min.y - tolerance
            && other.max.x <= self.max.x + tolerance
            && other.max.y <= self.max.y + tolerance
    }

    pub fn union(&self, other: &BBox) -> Self {
        Self {
            min: Point::new(self.min.x.min(other.min.x), self.min.y.min(other.min.y)),
            max: Point::new(self.max.x.max(other.max.x), self.max.y.max(other.max.y)),
        }
    }
}

/// A simple closed polygon. The closing vertex is not repeated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Polygon {
    pub vertices: Vec<Point>,
}

impl Polygon {
    pub fn new(vertices: Vec<Point>) -> Self {
        Self { vertices }
    }

    /// Build a polygon from raw `(x, y)` pairs.
    pub fn from_coords(coords: &[(f64, f64)]) -> Self {
        Self::new(coords.iter().map(|&(x, y)| Point::new(x, y)).collect())
    }

    pub fn rectangle(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        let bbox = BBox::new(
            Point::new(x1.min(x2), y1.min(y2)),
            Point::new(x1.max(x2), y1.max(y2)),
        );
        Self::new(bbox.corners().to_vec())
    }

    pub fn bbox(&self) -> Option<BBox> {
        BBox::from_points(&self.vertices)
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    /// Fewer than three vertices cannot enclose an area.
    pub fn is_degenerate(&self) -> bool {
        self.vertices.len() < 3
    }

    /// Shoelace area; positive for counter-clockwise winding.
    pub fn signed_area(&self) -> f64 {
        let n = self.vertices.len();
        if n < 3 {
            return 0.0;
        }
        let twice: f64 = (0..n)
            .map(|i| {
                let a = self.vertices[i];
                let b = self.vertices[(i + 1) % n];
                a.x * b.y - b.x * a.y
            })
            .sum();
        twice / 2.0
    }

    pub fn area(&self) -> f64 {
        self.signed_area().abs()
    }

    /// Drop consecutive duplicates and a repeated closing vertex.
    pub fn dedup(mut self) -> Self {
        self.vertices.dedup();
        if self.vertices.len() > 1 && self.vertices.first() == self.vertices.last() {
            self.vertices.pop();
        }
        self
    }

    /// Remove vertices lying on the straight line through their neighbours.
    pub fn without_collinear(self) -> Self {
        let mut vertices = self.vertices;
        let mut changed = true;
        while changed && vertices.len() > 3 {
            changed = false;
            let n = vertices.len();
            for i in 0..n {
                let prev = vertices[(i + n - 1) % n];
                let cur = vertices[i];
                let next = vertices[(i + 1) % n];
                let cross = (cur.x - prev.x) * (next.y - cur.y) - (cur.y - prev.y) * (next.x - cur.x);
                let scale = prev.distance_to(&cur) * cur.distance_to(&next);
                if cross.abs() <= 1e-12 * scale.max(f64::MIN_POSITIVE) {
                    vertices.remove(i);
                    changed = true;
                    break;
                }
            }
        }
        Self { vertices }
    }
}

/// An axis-aligned rectangle used to crop a layout before extrusion.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CropRegion {
    pub x_min: f64,
    pub y_min: f64,
    pub x_max: f64,
    pub y_max: f64,
}

impl CropRegion {
    pub fn new(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> Result<Self, GeometryError> {
        // Negated comparison also rejects NaN.
        if !(x_min < x_max && y_min < y_max) {
            return Err(GeometryError::InvalidRegion {
                x_min,
                y_min,
                x_max,
                y_max,
            });
        }
        Ok(Self {
            x_min,
            y_min,
            x_max,
            y_max,
        })
    }

    /// Region anchored at its lower-left corner, as the importer options express it.
    pub fn from_origin_size(x: f64, y: f64, width: f64, height: f64) -> Result<Self, GeometryError> {
        Self::new(x, y, x + width, y + height)
    }

    pub fn width(&self) -> f64 {
        self.x_max - self.x_min
    }

    pub fn height(&self) -> f64 {
        self.y_max - self.y_min
    }

    pub fn bbox(&self) -> BBox {
        BBox::new(
            Point::new(self.x_min, self.y_min),
            Point::new(self.x_max, self.y_max),
        )
    }

    pub fn to_polygon(&self) -> Polygon {
        Polygon::new(self.bbox().corners().to_vec())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_point_distance() {
        let a = Point::new(0.0, 0.0);
        let b = Point::new(3.0, 4.0);
        assert!((a.distance_to(&b) - 5.0).abs() < 1e-10);
    }

    #[test]
    fn test_polygon_area_and_winding() {
        let ccw = Polygon::rectangle(0.0, 0.0, 10.0, 5.0);
        assert!((ccw.signed_area() - 50.0).abs() < 1e-10);

        let mut cw = ccw.clone();
        cw.vertices.reverse();
        assert!((cw.signed_area() + 50.0).abs() < 1e-10);
        assert!((cw.area() - 50.0).abs() < 1e-10);
    }

    #[test]
    fn test_polygon_dedup_closing_vertex() {
        let poly = Polygon::from_coords(&[(0.0, 0.0), (1.0, 0.0), (1.0, 0.0), (1.0, 1.0), (0.0, 0.0)]);
        let poly = poly.dedup();
        assert_eq!(poly.vertex_count(), 3);
    }

    #[test]
    fn test_without_collinear() {
        let poly = Polygon::from_coords(&[(0.0, 0.0), (5.0, 0.0), (10.0, 0.0), (10.0, 10.0), (0.0, 10.0)]);
        let poly = poly.without_collinear();
        assert_eq!(poly.vertex_count(), 4);
        assert!((poly.area() - 100.0).abs() < 1e-10);
    }

    #[test]
    fn test_degenerate_polygon() {
        assert!(Polygon::from_coords(&[(0.0, 0.0), (1.0, 1.0)]).is_degenerate());
        assert!(!Polygon::rectangle(0.0, 0.0, 1.0, 1.0).is_degenerate());
    }

    #[test]
    fn test_bbox_containment() {
        let a = BBox::new(Point::new(0.0, 0.0), Point::new(10.0, 10.0));
        let b = BBox::new(Point::new(5.0, 5.0), Point::new(15.0, 15.0));
        assert!(!a.contains_bbox(&b, 0.0));
        assert!(a.contains_bbox(&BBox::new(Point::new(1.0, 1.0), Point::new(9.0, 9.0)), 0.0));
        assert!(a.contains_bbox(&BBox::new(Point::new(0.0, 0.0), Point::new(10.5, 10.0)), 0.5));
    }

    #[test]
    fn test_crop_region_validation() {
        assert!(CropRegion::new(0.0, 0.0, 10.0, 10.0).is_ok());
        assert!(CropRegion::new(10.0, 0.0, 0.0, 10.0).is_err());
        assert!(CropRegion::new(0.0, 0.0, 10.0, 0.0).is_err());
        assert!(CropRegion::new(f64::NAN, 0.0, 10.0, 10.0).is_err());

        let region = CropRegion::from_origin_size(5.0, 5.0, 10.0, 20.0).unwrap();
        assert_eq!(region.x_max, 15.0);
        assert_eq!(region.y_max, 25.0);
        assert_eq!(region.to_polygon().vertex_count(), 4);
    }
}
