use serde::{Deserialize, Serialize};

use crate::geometry::{BBox, Point, Polygon};
use crate::layer::LayerKey;
use crate::path::LayoutPath;

/// A GDS-II placement transform.
///
/// Applied in GDS order: reflect about the X axis, magnify, rotate
/// counter-clockwise, then translate.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Translation offset.
    pub offset: Point,
    /// Rotation in degrees, counter-clockwise.
    pub rotation: f64,
    /// Mirror about X axis (STRANS bit 15).
    pub mirror_x: bool,
    /// Uniform scale factor (typically 1.0).
    pub scale: f64,
}

impl Default for Transform {
    fn default() -> Self {
        Self {
            offset: Point::new(0.0, 0.0),
            rotation: 0.0,
            mirror_x: false,
            scale: 1.0,
        }
    }
}

impl Transform {
    pub fn translate(x: f64, y: f64) -> Self {
        Self {
            offset: Point::new(x, y),
            ..Default::default()
        }
    }

    pub fn with_offset(mut self, offset: Point) -> Self {
        self.offset = offset;
        self
    }

    pub fn apply(&self, point: &Point) -> Point {
        let mut p = *point;

        if self.mirror_x {
            p.y = -p.y;
        }

        p.x *= self.scale;
        p.y *= self.scale;

        let (rx, ry) = if self.rotation == 0.0 {
            (p.x, p.y)
        } else {
            let (sin_r, cos_r) = self.rotation.to_radians().sin_cos();
            (p.x * cos_r - p.y * sin_r, p.x * sin_r + p.y * cos_r)
        };

        Point::new(rx + self.offset.x, ry + self.offset.y)
    }

    pub fn apply_polygon(&self, polygon: &Polygon) -> Polygon {
        Polygon::new(polygon.vertices.iter().map(|p| self.apply(p)).collect())
    }

    /// Bounding box of the transformed corners of `bbox`.
    pub fn apply_bbox(&self, bbox: &BBox) -> BBox {
        let corners = bbox.corners().map(|c| self.apply(&c));
        // Four corners are never empty.
        BBox::from_points(&corners).unwrap_or(*bbox)
    }
}

/// Grid parameters of an arrayed reference (GDS-II `AREF`).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ArrayGrid {
    pub columns: u16,
    pub rows: u16,
    /// Displacement between neighbouring columns, in the parent's frame.
    pub column_step: Point,
    /// Displacement between neighbouring rows, in the parent's frame.
    pub row_step: Point,
}

impl ArrayGrid {
    /// Build from the three `AREF` XY points: origin, origin + columns * col_step,
    /// origin + rows * row_step.
    pub fn from_gds(columns: u16, rows: u16, origin: Point, col_corner: Point, row_corner: Point) -> Self {
        let cols = f64::from(columns.max(1));
        let rws = f64::from(rows.max(1));
        Self {
            columns,
            rows,
            column_step: Point::new((col_corner.x - origin.x) / cols, (col_corner.y - origin.y) / cols),
            row_step: Point::new((row_corner.x - origin.x) / rws, (row_corner.y - origin.y) / rws),
        }
    }
}

/// A reference to another cell placed within a parent cell.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CellInstance {
    pub cell_name: String,
    pub transform: Transform,
    pub array: Option<ArrayGrid>,
}

impl CellInstance {
    pub fn new(cell_name: &str, transform: Transform) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            transform,
            array: None,
        }
    }

    pub fn arrayed(cell_name: &str, transform: Transform, grid: ArrayGrid) -> Self {
        Self {
            cell_name: cell_name.to_string(),
            transform,
            array: Some(grid),
        }
    }

    /// Every placement transform this instance stands for.
    pub fn placements(&self) -> Vec<Transform> {
        match &self.array {
            None => vec![self.transform],
            Some(grid) => {
                let mut out = Vec::with_capacity(usize::from(grid.columns) * usize::from(grid.rows));
                for r in 0..grid.rows {
                    for c in 0..grid.columns {
                        let (c, r) = (f64::from(c), f64::from(r));
                        let offset = self.transform.offset.translate(
                            c * grid.column_step.x + r * grid.row_step.x,
                            c * grid.column_step.y + r * grid.row_step.y,
                        );
                        out.push(self.transform.with_offset(offset));
                    }
                }
                out
            }
        }
    }
}

/// Drawn geometry of a shape element.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum ShapeGeometry {
    Polygon(Polygon),
    Path(LayoutPath),
}

/// A shape element on one layer/datatype.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Shape {
    pub key: LayerKey,
    pub geometry: ShapeGeometry,
}

impl Shape {
    pub fn polygon(key: LayerKey, polygon: Polygon) -> Self {
        Self {
            key,
            geometry: ShapeGeometry::Polygon(polygon),
        }
    }

    pub fn path(key: LayerKey, path: LayoutPath) -> Self {
        Self {
            key,
            geometry: ShapeGeometry::Path(path),
        }
    }

    pub fn bbox(&self) -> Option<BBox> {
        match &self.geometry {
            ShapeGeometry::Polygon(p) => p.bbox(),
            ShapeGeometry::Path(p) => p.bbox(),
        }
    }

    /// The filled outline; paths are converted, unusable paths yield `None`.
    pub fn to_polygon(&self) -> Option<Polygon> {
        match &self.geometry {
            ShapeGeometry::Polygon(p) => Some(p.clone()),
            ShapeGeometry::Path(p) => p.to_polygon(),
        }
    }
}

/// A layout cell containing shapes and references to other cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Cell {
    pub name: String,
    pub shapes: Vec<Shape>,
    pub instances: Vec<CellInstance>,
}

impl Cell {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            shapes: Vec::new(),
            instances: Vec::new(),
        }
    }

    pub fn add_shape(&mut self, shape: Shape) {
        self.shapes.push(shape);
    }

    pub fn add_instance(&mut self, instance: CellInstance) {
        self.instances.push(instance);
    }

    /// Compute the bounding box of all shapes in this cell (not including subcells).
    pub fn local_bbox(&self) -> Option<BBox> {
        self.shapes
            .iter()
            .filter_map(|s| s.bbox())
            .reduce(|acc, bb| acc.union(&bb))
    }

    pub fn shape_count(&self) -> usize {
        self.shapes.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }
}
