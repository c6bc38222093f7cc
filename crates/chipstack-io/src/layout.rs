//! File-level access to GDS-II layouts.

use std::fs::File;
use std::io::{self, BufReader};
use std::path::Path;

use chipstack_core::geometry::{BBox, Polygon};
use chipstack_core::layer::LayerKey;
use chipstack_core::library::Library;

use crate::gds::{GdsError, GdsReader, LayerFilter};

/// Read a GDS-II file, materialising only the shapes `filter` accepts.
pub fn read_library(path: &Path, filter: LayerFilter, unit_scale: f64) -> Result<Library, GdsError> {
    let file = File::open(path).map_err(|e| {
        if e.kind() == io::ErrorKind::NotFound {
            GdsError::NotFound(path.to_path_buf())
        } else {
            GdsError::Io(e)
        }
    })?;

    GdsReader::new(BufReader::new(file))
        .with_filter(filter)
        .with_unit_scale(unit_scale)
        .read()
}

/// All polygons on `key`, flattened across every top-level cell.
///
/// Paths come back as their outline polygons. A layer with no shapes yields an
/// empty vector.
pub fn read_layer(path: &Path, key: LayerKey, unit_scale: f64) -> Result<Vec<Polygon>, GdsError> {
    let lib = read_library(path, LayerFilter::single(key), unit_scale)?;
    let polygons = lib.flatten_top_level(Some(key))?;
    log::debug!("Layer {} of {}: {} polygons", key, path.display(), polygons.len());
    Ok(polygons)
}

/// Union of the bounding boxes of all top-level cells, `None` for an empty layout.
pub fn chip_bbox(path: &Path, unit_scale: f64) -> Result<Option<BBox>, GdsError> {
    let lib = read_library(path, LayerFilter::All, unit_scale)?;
    Ok(lib.bbox()?)
}

/// Check that `path` is a readable GDS-II file with a sound hierarchy.
///
/// Parses every record but keeps no geometry.
pub fn probe(path: &Path, unit_scale: f64) -> Result<Library, GdsError> {
    let lib = read_library(path, LayerFilter::none(), unit_scale)?;
    lib.check_hierarchy()?;
    Ok(lib)
}
