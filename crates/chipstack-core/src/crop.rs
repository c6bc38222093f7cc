//! Cropping a layer's polygons to a rectangular region.
//!
//! Each polygon is intersected with the clip rectangle on its own; the output is
//! the concatenation of all fragments. Polygons that cannot touch the region are
//! rejected through the R-tree, and polygons already inside it are passed
//! through untouched, so cropping an already-cropped set changes nothing.

use geo::{BooleanOps, Coord, LineString, Polygon as GeoPolygon};

use crate::geometry::{CropRegion, Point, Polygon};
use crate::spatial::SpatialIndex;

/// Relative slack when deciding that a polygon already lies inside the region.
///
/// A polygon whose bounding box overhangs the region by at most this fraction
/// of the region's larger side (and at least by an absolute 1e-9) is passed
/// through unclipped. The overhang stays within coordinate rounding.
const CONTAINMENT_TOLERANCE: f64 = 1e-9;

/// Intersect every polygon with `region`.
///
/// A polygon may yield zero, one or several fragments. The input is never
/// modified. Fragments appear in the order of the polygons they came from.
pub fn crop(polygons: &[Polygon], region: &CropRegion) -> Vec<Polygon> {
    let clip = to_geo(&region.to_polygon());
    let region_bbox = region.bbox();
    let tolerance = CONTAINMENT_TOLERANCE * region.width().max(region.height()).max(1.0);

    let index = SpatialIndex::from_polygons(polygons);
    let mut candidates: Vec<usize> = index
        .query_region(&region_bbox)
        .into_iter()
        .map(|e| e.polygon_index)
        .collect();
    candidates.sort_unstable();

    let mut result = Vec::with_capacity(candidates.len());
    for i in candidates {
        let polygon = &polygons[i];
        let Some(bbox) = polygon.bbox() else {
            continue;
        };
        if region_bbox.contains_bbox(&bbox, tolerance) {
            result.push(polygon.clone());
            continue;
        }
        result.extend(intersect(polygon, &clip));
    }

    log::debug!(
        "Cropped {} polygons to {} fragments inside ({}, {})-({}, {})",
        polygons.len(),
        result.len(),
        region.x_min,
        region.y_min,
        region.x_max,
        region.y_max
    );
    result
}

/// Boolean AND of one polygon against a clip polygon.
fn intersect(polygon: &Polygon, clip: &GeoPolygon<f64>) -> Vec<Polygon> {
    let subject = to_geo(polygon);
    subject
        .intersection(clip)
        .into_iter()
        .filter_map(|fragment| {
            let poly = keyhole(&fragment).dedup().without_collinear();
            (!poly.is_degenerate() && poly.area() > 0.0).then_some(poly)
        })
        .collect()
}

/// Flatten a polygon with holes into a single keyhole ring, the way GDS-II
/// stores them: each hole is joined to the outline by a zero-width cut.
fn keyhole(fragment: &GeoPolygon<f64>) -> Polygon {
    let mut ring = ring_points(fragment.exterior());
    let mut holes: Vec<Vec<Point>> = fragment
        .interiors()
        .iter()
        .map(ring_points)
        .filter(|h| h.len() >= 3)
        .collect();
    holes.sort_by(|a, b| min_x(a).total_cmp(&min_x(b)));
    for hole in holes {
        ring = bridge(ring, hole);
    }
    Polygon::new(ring)
}

/// Splice `hole` into `ring` through a cut from the hole's leftmost vertex to
/// the nearest ring vertex left of it.
fn bridge(ring: Vec<Point>, mut hole: Vec<Point>) -> Vec<Point> {
    // Holes wind against the outline so the cut edges cancel.
    if ring_area(&hole).signum() == ring_area(&ring).signum() {
        hole.reverse();
    }
    let Some((hi, h)) = hole
        .iter()
        .copied()
        .enumerate()
        .min_by(|a, b| a.1.x.total_cmp(&b.1.x))
    else {
        return ring;
    };
    let nearest = |left_only: bool| {
        ring.iter()
            .enumerate()
            .filter(|(_, p)| !left_only || p.x < h.x)
            .min_by(|a, b| a.1.distance_to(&h).total_cmp(&b.1.distance_to(&h)))
            .map(|(i, _)| i)
    };
    let Some(vi) = nearest(true).or_else(|| nearest(false)) else {
        return ring;
    };

    let mut out = Vec::with_capacity(ring.len() + hole.len() + 2);
    out.extend_from_slice(&ring[..=vi]);
    out.extend(hole[hi..].iter().chain(&hole[..hi]).copied());
    out.push(h);
    out.push(ring[vi]);
    out.extend_from_slice(&ring[vi + 1..]);
    out
}

fn ring_points(ring: &LineString<f64>) -> Vec<Point> {
    let mut points: Vec<Point> = ring.coords().map(|c| Point::new(c.x, c.y)).collect();
    if points.len() > 1 && points.first() == points.last() {
        points.pop();
    }
    points
}

fn ring_area(points: &[Point]) -> f64 {
    let n = points.len();
    (0..n)
        .map(|i| {
            let (a, b) = (points[i], points[(i + 1) % n]);
            a.x * b.y - b.x * a.y
        })
        .sum::<f64>()
        / 2.0
}

fn min_x(points: &[Point]) -> f64 {
    points.iter().map(|p| p.x).fold(f64::INFINITY, f64::min)
}

fn to_geo(polygon: &Polygon) -> GeoPolygon<f64> {
    let coords: Vec<Coord<f64>> = polygon
        .vertices
        .iter()
        .map(|p| Coord { x: p.x, y: p.y })
        .collect();
    // LineString is closed by Polygon::new.
    GeoPolygon::new(LineString::from(coords), vec![])
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn total_area(polygons: &[Polygon]) -> f64 {
        polygons.iter().map(Polygon::area).sum()
    }

    fn region(x_min: f64, y_min: f64, x_max: f64, y_max: f64) -> CropRegion {
        CropRegion::new(x_min, y_min, x_max, y_max).unwrap()
    }

    #[test]
    fn test_partial_overlap_is_clipped() {
        let square = vec![Polygon::rectangle(0.0, 0.0, 10.0, 10.0)];
        let out = crop(&square, &region(5.0, 5.0, 15.0, 15.0));
        assert_eq!(out.len(), 1);
        assert_eq!(out[0].vertex_count(), 4);
        assert_relative_eq!(out[0].area(), 25.0, epsilon = 1e-9);
        let bb = out[0].bbox().unwrap();
        assert_relative_eq!(bb.min.x, 5.0, epsilon = 1e-9);
        assert_relative_eq!(bb.max.y, 10.0, epsilon = 1e-9);
    }

    #[test]
    fn test_inside_passes_through_unchanged() {
        let tri = vec![Polygon::from_coords(&[(1.0, 1.0), (4.0, 1.0), (2.0, 3.0)])];
        let out = crop(&tri, &region(0.0, 0.0, 10.0, 10.0));
        assert_eq!(out, tri);
    }

    #[test]
    fn test_outside_is_dropped() {
        let far = vec![Polygon::rectangle(100.0, 100.0, 110.0, 110.0)];
        assert!(crop(&far, &region(0.0, 0.0, 10.0, 10.0)).is_empty());

        // Touching along an edge has no area in common.
        let touching = vec![Polygon::rectangle(10.0, 0.0, 20.0, 10.0)];
        assert!(crop(&touching, &region(0.0, 0.0, 10.0, 10.0)).is_empty());
    }

    #[test]
    fn test_u_shape_splits_into_fragments() {
        // A U opening upwards; cropping its top band leaves the two arms.
        let u = vec![Polygon::from_coords(&[
            (0.0, 0.0),
            (30.0, 0.0),
            (30.0, 30.0),
            (20.0, 30.0),
            (20.0, 10.0),
            (10.0, 10.0),
            (10.0, 30.0),
            (0.0, 30.0),
        ])];
        let out = crop(&u, &region(-5.0, 20.0, 35.0, 40.0));
        assert_eq!(out.len(), 2);
        assert_relative_eq!(total_area(&out), 200.0, epsilon = 1e-9);
    }

    #[test]
    fn test_crop_is_idempotent() {
        let shapes = vec![
            Polygon::rectangle(0.0, 0.0, 10.0, 10.0),
            Polygon::from_coords(&[(2.0, -5.0), (12.0, 3.0), (4.0, 14.0)]),
            Polygon::rectangle(50.0, 50.0, 60.0, 60.0),
        ];
        let r = region(3.0, 1.0, 9.0, 8.0);
        let once = crop(&shapes, &r);
        let twice = crop(&once, &r);
        assert_eq!(once, twice);
    }

    #[test]
    fn test_keyhole_polygon_keeps_its_hole() {
        // 10x10 square with a 2x2 hole at (4,4)-(6,6), cut in from the left at y = 5.
        let keyhole = vec![Polygon::from_coords(&[
            (0.0, 0.0),
            (10.0, 0.0),
            (10.0, 10.0),
            (0.0, 10.0),
            (0.0, 5.0),
            (4.0, 5.0),
            (4.0, 6.0),
            (6.0, 6.0),
            (6.0, 4.0),
            (4.0, 4.0),
            (4.0, 5.0),
            (0.0, 5.0),
        ])];
        assert_relative_eq!(total_area(&keyhole), 96.0, epsilon = 1e-9);

        let out = crop(&keyhole, &region(-1.0, -1.0, 11.0, 8.0));
        assert_eq!(out.len(), 1);
        assert_relative_eq!(total_area(&out), 76.0, epsilon = 1e-9);
        let bb = out[0].bbox().unwrap();
        assert_relative_eq!(bb.max.y, 8.0, epsilon = 1e-9);

        // A window around the hole leaves a frame.
        let frame = crop(&keyhole, &region(3.0, 3.0, 7.0, 7.0));
        assert_eq!(frame.len(), 1);
        assert_relative_eq!(total_area(&frame), 12.0, epsilon = 1e-9);

        // Cropping the result again changes nothing.
        assert_eq!(crop(&out, &region(-1.0, -1.0, 11.0, 8.0)), out);
    }

    #[test]
    fn test_crop_does_not_mutate_input() {
        let shapes = vec![Polygon::rectangle(0.0, 0.0, 10.0, 10.0)];
        let before = shapes.clone();
        let _ = crop(&shapes, &region(5.0, 5.0, 15.0, 15.0));
        assert_eq!(shapes, before);
    }
}
