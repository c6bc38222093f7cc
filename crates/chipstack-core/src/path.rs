//! Path (wire) outlines.
//!
//! A GDS-II `PATH` is a centerline with a width. Before extrusion every path is
//! turned into the filled polygon it covers: the centerline is offset by half the
//! width on both sides with mitered joins, and the ends are shaped according to
//! the `PATHTYPE` record.

use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point, Polygon};

/// Miter joins longer than this many half-widths are beveled on the outer side.
const MITER_LIMIT: f64 = 2.0;

/// Number of segments used for a round (half-disc) end cap.
const ROUND_CAP_SEGMENTS: usize = 8;

/// End style of a path, mirroring GDS-II `PATHTYPE`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum PathEnd {
    /// Type 0: square end flush with the endpoint.
    Flush,
    /// Type 1: half-disc centered on the endpoint.
    Round,
    /// Type 2: square end extended by half the width.
    Extended,
    /// Type 4: explicit extensions past the first and last point.
    Custom { begin: f64, end: f64 },
}

impl PathEnd {
    /// Map a `PATHTYPE` value; unknown types fall back to flush.
    pub fn from_gds(path_type: i16, begin_extn: f64, end_extn: f64) -> Self {
        match path_type {
            1 => PathEnd::Round,
            2 => PathEnd::Extended,
            4 => PathEnd::Custom {
                begin: begin_extn,
                end: end_extn,
            },
            _ => PathEnd::Flush,
        }
    }

    pub fn to_gds(&self) -> i16 {
        match self {
            PathEnd::Flush => 0,
            PathEnd::Round => 1,
            PathEnd::Extended => 2,
            PathEnd::Custom { .. } => 4,
        }
    }
}

/// A path (wire) defined by a centerline and width.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayoutPath {
    pub points: Vec<Point>,
    pub width: f64,
    pub end: PathEnd,
}

impl LayoutPath {
    pub fn new(points: Vec<Point>, width: f64) -> Self {
        Self {
            points,
            width,
            end: PathEnd::Flush,
        }
    }

    pub fn with_end(mut self, end: PathEnd) -> Self {
        self.end = end;
        self
    }

    pub fn bbox(&self) -> Option<BBox> {
        let half_w = self.width.abs() / 2.0;
        let expanded: Vec<Point> = self
            .points
            .iter()
            .flat_map(|p| {
                vec![
                    Point::new(p.x - half_w, p.y - half_w),
                    Point::new(p.x + half_w, p.y + half_w),
                ]
            })
            .collect();
        BBox::from_points(&expanded)
    }

    /// The filled outline of this path, or `None` if it covers no area
    /// (zero width or fewer than two distinct points).
    pub fn to_polygon(&self) -> Option<Polygon> {
        let half_w = self.width.abs() / 2.0;
        let mut pts = self.points.clone();
        pts.dedup();
        if pts.len() < 2 || half_w == 0.0 {
            return None;
        }

        let (begin_ext, end_ext) = match self.end {
            PathEnd::Flush | PathEnd::Round => (0.0, 0.0),
            PathEnd::Extended => (half_w, half_w),
            PathEnd::Custom { begin, end } => (begin, end),
        };

        let last = pts.len() - 1;
        let d_first = unit(pts[0], pts[1]);
        let d_last = unit(pts[last - 1], pts[last]);
        pts[0] = Point::new(pts[0].x - d_first.x * begin_ext, pts[0].y - d_first.y * begin_ext);
        pts[last] = Point::new(pts[last].x + d_last.x * end_ext, pts[last].y + d_last.y * end_ext);

        let mut left: Vec<Point> = Vec::with_capacity(pts.len() + 2);
        let mut right: Vec<Point> = Vec::with_capacity(pts.len() + 2);

        for i in 0..pts.len() {
            let p = pts[i];
            if i == 0 || i == last {
                let d = if i == 0 { d_first } else { d_last };
                let n = left_normal(d);
                left.push(offset(p, n, half_w));
                right.push(offset(p, n, -half_w));
                continue;
            }

            let n1 = left_normal(unit(pts[i - 1], p));
            let n2 = left_normal(unit(p, pts[i + 1]));
            let bisector = Point::new(n1.x + n2.x, n1.y + n2.y);
            let bisector_len = (bisector.x * bisector.x + bisector.y * bisector.y).sqrt();

            if bisector_len < 1e-12 {
                // The path doubles back on itself.
                left.push(offset(p, n1, half_w));
                right.push(offset(p, n1, -half_w));
                continue;
            }

            let m = Point::new(bisector.x / bisector_len, bisector.y / bisector_len);
            let miter = half_w / (m.x * n1.x + m.y * n1.y);
            let turns_left = cross(n1, n2) > 0.0;

            if miter <= MITER_LIMIT * half_w {
                left.push(offset(p, m, miter));
                right.push(offset(p, m, -miter));
            } else if turns_left {
                left.push(offset(p, m, miter));
                right.push(offset(p, n1, -half_w));
                right.push(offset(p, n2, -half_w));
            } else {
                left.push(offset(p, n1, half_w));
                left.push(offset(p, n2, half_w));
                right.push(offset(p, m, -miter));
            }
        }

        let mut outline = left;
        if self.end == PathEnd::Round {
            outline.extend(round_cap(pts[last], left_normal(d_last), half_w));
        }
        outline.extend(right.into_iter().rev());
        if self.end == PathEnd::Round {
            let n = left_normal(d_first);
            outline.extend(round_cap(pts[0], Point::new(-n.x, -n.y), half_w));
        }

        let polygon = Polygon::new(outline).dedup();
        if polygon.is_degenerate() {
            None
        } else {
            Some(polygon)
        }
    }
}

fn unit(from: Point, to: Point) -> Point {
    let dx = to.x - from.x;
    let dy = to.y - from.y;
    let len = (dx * dx + dy * dy).sqrt();
    Point::new(dx / len, dy / len)
}

fn left_normal(d: Point) -> Point {
    Point::new(-d.y, d.x)
}

fn cross(a: Point, b: Point) -> f64 {
    a.x * b.y - a.y * b.x
}

fn offset(p: Point, dir: Point, dist: f64) -> Point {
    Point::new(p.x + dir.x * dist, p.y + dir.y * dist)
}

/// Interior arc points of a half-disc, sweeping clockwise from `start_normal`.
fn round_cap(center: Point, start_normal: Point, radius: f64) -> Vec<Point> {
    let start = start_normal.y.atan2(start_normal.x);
    (1..ROUND_CAP_SEGMENTS)
        .map(|k| {
            let theta = start - std::f64::consts::PI * k as f64 / ROUND_CAP_SEGMENTS as f64;
            Point::new(center.x + radius * theta.cos(), center.y + radius * theta.sin())
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn straight(end: PathEnd) -> LayoutPath {
        LayoutPath::new(vec![Point::new(0.0, 0.0), Point::new(10.0, 0.0)], 2.0).with_end(end)
    }

    #[test]
    fn test_flush_path_is_rectangle() {
        let poly = straight(PathEnd::Flush).to_polygon().unwrap();
        assert_eq!(poly.vertex_count(), 4);
        assert_relative_eq!(poly.area(), 20.0, epsilon = 1e-9);
        let bbox = poly.bbox().unwrap();
        assert_relative_eq!(bbox.min.x, 0.0);
        assert_relative_eq!(bbox.max.y, 1.0);
    }

    #[test]
    fn test_extended_and_custom_ends() {
        let extended = straight(PathEnd::Extended).to_polygon().unwrap();
        assert_relative_eq!(extended.area(), 24.0, epsilon = 1e-9);

        let custom = straight(PathEnd::Custom { begin: 0.5, end: 2.0 })
            .to_polygon()
            .unwrap();
        assert_relative_eq!(custom.area(), 25.0, epsilon = 1e-9);
        let bbox = custom.bbox().unwrap();
        assert_relative_eq!(bbox.min.x, -0.5, epsilon = 1e-12);
        assert_relative_eq!(bbox.max.x, 12.0, epsilon = 1e-12);
    }

    #[test]
    fn test_round_end_adds_half_discs() {
        let poly = straight(PathEnd::Round).to_polygon().unwrap();
        let area = poly.area();
        assert!(area > 23.0 && area < 20.0 + std::f64::consts::PI, "area {area}");
    }

    #[test]
    fn test_bent_path_miter() {
        let path = LayoutPath::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(10.0, 10.0),
            ],
            2.0,
        );
        let poly = path.to_polygon().unwrap();
        assert_eq!(poly.vertex_count(), 6);
        assert_relative_eq!(poly.area(), 40.0, epsilon = 1e-9);
    }

    #[test]
    fn test_sharp_turn_is_beveled() {
        let path = LayoutPath::new(
            vec![
                Point::new(0.0, 0.0),
                Point::new(10.0, 0.0),
                Point::new(0.0, 1.0),
            ],
            1.0,
        );
        let poly = path.to_polygon().unwrap();
        // Bevel adds one extra vertex on the outer side.
        assert_eq!(poly.vertex_count(), 7);
    }

    #[test]
    fn test_degenerate_paths() {
        let single = LayoutPath::new(vec![Point::new(1.0, 1.0), Point::new(1.0, 1.0)], 2.0);
        assert!(single.to_polygon().is_none());

        let zero_width = LayoutPath::new(vec![Point::new(0.0, 0.0), Point::new(1.0, 0.0)], 0.0);
        assert!(zero_width.to_polygon().is_none());
    }
}
