use rstar::{RTree, RTreeObject, AABB};

use crate::geometry::{BBox, Polygon};

/// An entry in the R-tree spatial index, referencing a polygon by its index.
#[derive(Debug, Clone)]
pub struct SpatialEntry {
    /// Index into the indexed polygon slice.
    pub polygon_index: usize,
    /// Bounding box of the polygon.
    pub bbox: BBox,
}

impl RTreeObject for SpatialEntry {
    type Envelope = AABB<[f64; 2]>;

    fn envelope(&self) -> Self::Envelope {
        AABB::from_corners(
            [self.bbox.min.x, self.bbox.min.y],
            [self.bbox.max.x, self.bbox.max.y],
        )
    }
}

/// Spatial index over polygon bounding boxes.
pub struct SpatialIndex {
    tree: RTree<SpatialEntry>,
}

impl SpatialIndex {
    /// Build the index from a list of bounding-box entries.
    pub fn build(entries: Vec<SpatialEntry>) -> Self {
        Self {
            tree: RTree::bulk_load(entries),
        }
    }

    /// Index a polygon slice; degenerate polygons are left out.
    pub fn from_polygons(polygons: &[Polygon]) -> Self {
        let entries = polygons
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_degenerate())
            .filter_map(|(polygon_index, p)| p.bbox().map(|bbox| SpatialEntry { polygon_index, bbox }))
            .collect();
        Self::build(entries)
    }

    /// Find all entries whose bounding box touches the given region.
    pub fn query_region(&self, region: &BBox) -> Vec<&SpatialEntry> {
        let envelope = AABB::from_corners(
            [region.min.x, region.min.y],
            [region.max.x, region.max.y],
        );
        self.tree
            .locate_in_envelope_intersecting(&envelope)
            .collect()
    }

    /// Number of entries in the index.
    pub fn len(&self) -> usize {
        self.tree.size()
    }

    pub fn is_empty(&self) -> bool {
        self.tree.size() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Point;

    #[test]
    fn test_spatial_query() {
        let polygons = vec![
            Polygon::rectangle(0.0, 0.0, 10.0, 10.0),
            Polygon::rectangle(20.0, 20.0, 30.0, 30.0),
            Polygon::from_coords(&[(0.0, 0.0), (1.0, 1.0)]),
        ];
        let index = SpatialIndex::from_polygons(&polygons);
        assert_eq!(index.len(), 2);

        let region = BBox::new(Point::new(-5.0, -5.0), Point::new(15.0, 15.0));
        let results = index.query_region(&region);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].polygon_index, 0);

        // Touching a box edge counts as a hit; the clipper decides the rest.
        let region = BBox::new(Point::new(10.0, 10.0), Point::new(20.0, 20.0));
        let mut hits: Vec<usize> = index.query_region(&region).iter().map(|e| e.polygon_index).collect();
        hits.sort_unstable();
        assert_eq!(hits, vec![0, 1]);
    }
}
