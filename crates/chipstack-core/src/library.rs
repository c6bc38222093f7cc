use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::cell::Cell;
use crate::geometry::{BBox, Polygon};
use crate::layer::LayerKey;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum LibraryError {
    #[error("Cell '{0}' references itself through its hierarchy")]
    RecursiveReference(String),

    #[error("Cell '{0}' not found in library")]
    UnknownCell(String),
}

/// A library of layout cells, as read from one GDS-II stream.
///
/// Cells keep their stream order. References between cells are by name and are
/// resolved lazily when flattening, so a library may hold references to cells
/// that were never defined; those are skipped with a warning.
#[derive(Debug, Clone, Default)]
pub struct Library {
    /// Library name from `LIBNAME`.
    pub name: String,
    /// User units per database unit (`UNITS[0]`).
    pub user_units_per_dbu: f64,
    /// Metres per database unit (`UNITS[1]`).
    pub meters_per_dbu: f64,
    cells: Vec<Cell>,
    index: HashMap<String, usize>,
}

impl Library {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            user_units_per_dbu: 1e-3,
            meters_per_dbu: 1e-9,
            cells: Vec::new(),
            index: HashMap::new(),
        }
    }

    // ── Cell management ──────────────────────────────────────────────

    /// Add a cell. A cell with the same name replaces the earlier definition.
    pub fn add_cell(&mut self, cell: Cell) {
        match self.index.get(&cell.name) {
            Some(&i) => {
                log::warn!("Cell '{}' defined twice; keeping the last definition", cell.name);
                self.cells[i] = cell;
            }
            None => {
                self.index.insert(cell.name.clone(), self.cells.len());
                self.cells.push(cell);
            }
        }
    }

    pub fn find_cell_by_name(&self, name: &str) -> Option<&Cell> {
        self.index.get(name).map(|&i| &self.cells[i])
    }

    pub fn cell_count(&self) -> usize {
        self.cells.len()
    }

    pub fn all_cells(&self) -> impl Iterator<Item = &Cell> {
        self.cells.iter()
    }

    /// Cells that no other cell references, in stream order.
    pub fn top_level(&self) -> Vec<&Cell> {
        let referenced: HashSet<&str> = self
            .cells
            .iter()
            .flat_map(|c| c.instances.iter().map(|i| i.cell_name.as_str()))
            .collect();
        self.cells
            .iter()
            .filter(|c| !referenced.contains(c.name.as_str()))
            .collect()
    }

    // ── Flattening ───────────────────────────────────────────────────

    /// Flatten one cell into absolute-coordinate polygons.
    ///
    /// With `key` set, only shapes on that layer/datatype are kept; paths are
    /// converted to their outline polygons.
    pub fn flatten_cell(&self, name: &str, key: Option<LayerKey>) -> Result<Vec<Polygon>, LibraryError> {
        if !self.index.contains_key(name) {
            return Err(LibraryError::UnknownCell(name.to_string()));
        }
        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        self.flatten_into(name, key, &mut memo, &mut stack)
    }

    /// Flatten every top-level cell and merge the results into one set.
    pub fn flatten_top_level(&self, key: Option<LayerKey>) -> Result<Vec<Polygon>, LibraryError> {
        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        let mut polygons = Vec::new();
        for cell in self.top_level() {
            polygons.extend(self.flatten_into(&cell.name, key, &mut memo, &mut stack)?);
        }
        Ok(polygons)
    }

    fn flatten_into(
        &self,
        name: &str,
        key: Option<LayerKey>,
        memo: &mut HashMap<String, Vec<Polygon>>,
        stack: &mut Vec<String>,
    ) -> Result<Vec<Polygon>, LibraryError> {
        if let Some(done) = memo.get(name) {
            return Ok(done.clone());
        }
        if stack.iter().any(|n| n == name) {
            return Err(LibraryError::RecursiveReference(name.to_string()));
        }
        let Some(cell) = self.find_cell_by_name(name) else {
            log::warn!("Reference to undefined cell '{}' ignored", name);
            return Ok(Vec::new());
        };

        stack.push(name.to_string());

        let mut polygons: Vec<Polygon> = cell
            .shapes
            .iter()
            .filter(|s| key.map_or(true, |k| s.key == k))
            .filter_map(|s| s.to_polygon())
            .collect();

        for inst in &cell.instances {
            let child = self.flatten_into(&inst.cell_name, key, memo, stack)?;
            if child.is_empty() {
                continue;
            }
            for placement in inst.placements() {
                polygons.extend(child.iter().map(|p| placement.apply_polygon(p)));
            }
        }

        stack.pop();
        log::debug!("Flattened cell '{}': {} polygons", name, polygons.len());
        memo.insert(name.to_string(), polygons.clone());
        Ok(polygons)
    }

    // ── Extents ──────────────────────────────────────────────────────

    /// Bounding box of a cell including its subcells, over all layers.
    ///
    /// Subcell boxes are carried through their transforms by corner, which is
    /// exact for Manhattan placements and conservative otherwise.
    pub fn cell_bbox(&self, name: &str) -> Result<Option<BBox>, LibraryError> {
        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        self.bbox_into(name, &mut memo, &mut stack)
    }

    /// Union of the bounding boxes of all top-level cells.
    pub fn bbox(&self) -> Result<Option<BBox>, LibraryError> {
        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        let mut result: Option<BBox> = None;
        for cell in self.top_level() {
            if let Some(bb) = self.bbox_into(&cell.name, &mut memo, &mut stack)? {
                result = Some(result.map_or(bb, |acc| acc.union(&bb)));
            }
        }
        Ok(result)
    }

    /// Fails if any cell reaches itself through its references, including
    /// cycles that no top-level cell leads into.
    pub fn check_hierarchy(&self) -> Result<(), LibraryError> {
        let mut memo = HashMap::new();
        let mut stack = Vec::new();
        for cell in &self.cells {
            self.bbox_into(&cell.name, &mut memo, &mut stack)?;
        }
        Ok(())
    }

    fn bbox_into(
        &self,
        name: &str,
        memo: &mut HashMap<String, Option<BBox>>,
        stack: &mut Vec<String>,
    ) -> Result<Option<BBox>, LibraryError> {
        if let Some(done) = memo.get(name) {
            return Ok(*done);
        }
        if stack.iter().any(|n| n == name) {
            return Err(LibraryError::RecursiveReference(name.to_string()));
        }
        let Some(cell) = self.find_cell_by_name(name) else {
            return Ok(None);
        };

        stack.push(name.to_string());
        let mut result = cell.local_bbox();
        for inst in &cell.instances {
            if let Some(child) = self.bbox_into(&inst.cell_name, memo, stack)? {
                for placement in inst.placements() {
                    let placed = placement.apply_bbox(&child);
                    result = Some(result.map_or(placed, |acc| acc.union(&placed)));
                }
            }
        }
        stack.pop();

        memo.insert(name.to_string(), result);
        Ok(result)
    }
}
