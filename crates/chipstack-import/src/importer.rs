//! The per-layer import pipeline.
//!
//! For every layer of the stack, in order: read the flattened polygons, crop
//! them when a region is set, extrude them into one mesh, and hand the mesh to
//! the host. A layer that ends up with no geometry is skipped; a layer whose
//! read or delivery fails either aborts the run ([`FailureMode::Strict`]) or is
//! recorded and passed over ([`FailureMode::Resilient`]).
//!
//! The input file is validated before the host is touched. Host objects created
//! for earlier layers stay in place when a later layer fails.

use std::path::{Path, PathBuf};

use chipstack_core::crop::crop;
use chipstack_core::extrude::extrude;
use chipstack_core::geometry::CropRegion;
use chipstack_core::layer::{LayerKey, LayerSpec, LayerStack};
use chipstack_io::{chip_bbox, probe, read_layer};
use chipstack_scene::{CollectionHandle, Material, ObjectHandle, SceneHost};

use crate::error::ImportError;

// ── Options ──────────────────────────────────────────────────────────

/// What to do when a single layer fails.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FailureMode {
    /// Abort the run with the first layer error.
    #[default]
    Strict,
    /// Record the error for that layer and continue with the rest.
    Resilient,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportOptions {
    /// Output unit in metres; 1e-6 yields micrometres.
    pub unit_scale: f64,
    /// Uniform factor applied to every layer's elevation and thickness.
    pub z_scale: f64,
    pub crop: Option<CropRegion>,
    /// Put all objects into a new collection named after the input file.
    pub create_collection: bool,
    /// Place camera, light and base plate sized to the chip.
    pub setup_scene: bool,
    pub mode: FailureMode,
}

impl Default for ImportOptions {
    fn default() -> Self {
        Self {
            unit_scale: 1e-6,
            z_scale: 1.0,
            crop: None,
            create_collection: true,
            setup_scene: true,
            mode: FailureMode::Strict,
        }
    }
}

impl ImportOptions {
    pub fn validate(&self) -> Result<(), ImportError> {
        if !self.unit_scale.is_finite() || self.unit_scale <= 0.0 {
            return Err(ImportError::InvalidOptions(format!(
                "unit scale must be a positive number, got {}",
                self.unit_scale
            )));
        }
        if !self.z_scale.is_finite() || self.z_scale <= 0.0 {
            return Err(ImportError::InvalidOptions(format!(
                "z scale must be a positive number, got {}",
                self.z_scale
            )));
        }
        Ok(())
    }
}

// ── Report ───────────────────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// The layer has no shapes in the file.
    NoGeometry,
    /// All shapes lie outside the crop region.
    OutsideCrop,
    /// Every polygon had fewer than three vertices.
    Degenerate,
}

/// Where a layer's pipeline broke.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerStage {
    Read,
    Deliver,
}

#[derive(Debug)]
pub enum LayerOutcome {
    Imported {
        object: ObjectHandle,
        polygons: usize,
        vertices: usize,
    },
    Skipped(SkipReason),
    Failed {
        stage: LayerStage,
        error: ImportError,
    },
}

#[derive(Debug)]
pub struct LayerReport {
    pub layer: String,
    pub key: LayerKey,
    pub outcome: LayerOutcome,
}

#[derive(Debug)]
pub struct ImportReport {
    pub source: PathBuf,
    pub collection: Option<CollectionHandle>,
    /// Chip width and height used for the scene rig.
    pub extent: Option<(f64, f64)>,
    pub layers: Vec<LayerReport>,
}

impl ImportReport {
    pub fn imported_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l.outcome, LayerOutcome::Imported { .. }))
            .count()
    }

    pub fn skipped_count(&self) -> usize {
        self.layers
            .iter()
            .filter(|l| matches!(l.outcome, LayerOutcome::Skipped(_)))
            .count()
    }

    pub fn failures(&self) -> impl Iterator<Item = &LayerReport> {
        self.layers
            .iter()
            .filter(|l| matches!(l.outcome, LayerOutcome::Failed { .. }))
    }

    pub fn layer(&self, name: &str) -> Option<&LayerReport> {
        self.layers.iter().find(|l| l.layer == name)
    }
}

// ── Importer ─────────────────────────────────────────────────────────

pub struct Importer {
    stack: LayerStack,
    options: ImportOptions,
}

impl Importer {
    pub fn new(stack: LayerStack, options: ImportOptions) -> Self {
        Self { stack, options }
    }

    pub fn stack(&self) -> &LayerStack {
        &self.stack
    }

    pub fn options(&self) -> &ImportOptions {
        &self.options
    }

    /// Import every layer of the stack from `gds` into `host`.
    pub fn run(&self, gds: &Path, host: &mut dyn SceneHost) -> Result<ImportReport, ImportError> {
        self.options.validate()?;

        let lib = probe(gds, self.options.unit_scale).map_err(|e| ImportError::from_gds(gds, e))?;
        log::info!(
            "Importing {} ({} cells) with {} layers",
            gds.display(),
            lib.cell_count(),
            self.stack.layer_count()
        );

        let extent = if self.options.setup_scene {
            Some(chip_extent(gds, &self.options)?)
        } else {
            None
        };

        let collection = if self.options.create_collection {
            let name = collection_name(gds);
            let handle = host
                .create_collection(&name)
                .map_err(|e| ImportError::host(format!("collection '{}'", name), e))?;
            Some(handle)
        } else {
            None
        };

        if let Some((width, height)) = extent {
            host.place_camera_and_light(width, height, collection)
                .map_err(|e| ImportError::host("camera and light", e))?;
        }

        let mut layers = Vec::with_capacity(self.stack.layer_count());
        for spec in self.stack.iter() {
            let outcome = match self.import_layer(spec, gds, host, collection) {
                Ok(outcome) => outcome,
                Err((stage, error)) => match self.options.mode {
                    FailureMode::Strict => return Err(error),
                    FailureMode::Resilient => {
                        log::error!("Layer {}: {} failed: {}", spec.name, stage_name(stage), error);
                        LayerOutcome::Failed { stage, error }
                    }
                },
            };
            layers.push(LayerReport {
                layer: spec.name.clone(),
                key: spec.key,
                outcome,
            });
        }

        let report = ImportReport {
            source: gds.to_path_buf(),
            collection,
            extent,
            layers,
        };
        log::info!(
            "Import complete: {} imported, {} skipped, {} failed",
            report.imported_count(),
            report.skipped_count(),
            report.failures().count()
        );
        Ok(report)
    }

    fn import_layer(
        &self,
        spec: &LayerSpec,
        gds: &Path,
        host: &mut dyn SceneHost,
        collection: Option<CollectionHandle>,
    ) -> Result<LayerOutcome, (LayerStage, ImportError)> {
        let z = spec.z * self.options.z_scale;
        let height = spec.height * self.options.z_scale;

        let mut polygons = read_layer(gds, spec.key, self.options.unit_scale)
            .map_err(|e| (LayerStage::Read, ImportError::from_gds(gds, e)))?;
        if polygons.is_empty() {
            log::warn!("Layer {} ({}): no geometry found", spec.name, spec.key);
            return Ok(LayerOutcome::Skipped(SkipReason::NoGeometry));
        }

        if let Some(region) = &self.options.crop {
            polygons = crop(&polygons, region);
            if polygons.is_empty() {
                log::warn!("Layer {} ({}): nothing inside the crop region", spec.name, spec.key);
                return Ok(LayerOutcome::Skipped(SkipReason::OutsideCrop));
            }
        }

        let Some(mesh) = extrude(&polygons, z, height) else {
            log::warn!("Layer {} ({}): only degenerate polygons", spec.name, spec.key);
            return Ok(LayerOutcome::Skipped(SkipReason::Degenerate));
        };

        let vertices = mesh.vertex_count();
        let object = host
            .create_mesh_object(&spec.name, mesh, Material::for_layer(spec), collection)
            .map_err(|e| {
                (
                    LayerStage::Deliver,
                    ImportError::host(format!("layer '{}'", spec.name), e),
                )
            })?;

        log::info!("{}: {} polygons, {} vertices", spec.name, polygons.len(), vertices);
        Ok(LayerOutcome::Imported {
            object,
            polygons: polygons.len(),
            vertices,
        })
    }
}

/// Chip width and height: the crop region when set, otherwise the extent of
/// all top-level cells. An empty layout has zero extent.
pub fn chip_extent(gds: &Path, options: &ImportOptions) -> Result<(f64, f64), ImportError> {
    if let Some(region) = &options.crop {
        return Ok((region.width(), region.height()));
    }
    let bbox = chip_bbox(gds, options.unit_scale).map_err(|e| ImportError::from_gds(gds, e))?;
    Ok(bbox.map_or((0.0, 0.0), |bb| (bb.width(), bb.height())))
}

fn collection_name(gds: &Path) -> String {
    gds.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "chip".to_string())
}

fn stage_name(stage: LayerStage) -> &'static str {
    match stage {
        LayerStage::Read => "read",
        LayerStage::Deliver => "delivery",
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_options_validation() {
        assert!(ImportOptions::default().validate().is_ok());

        for (unit_scale, z_scale) in [(0.0, 1.0), (-1e-6, 1.0), (f64::NAN, 1.0), (1e-6, 0.0), (1e-6, f64::INFINITY)] {
            let options = ImportOptions {
                unit_scale,
                z_scale,
                ..Default::default()
            };
            assert!(matches!(options.validate(), Err(ImportError::InvalidOptions(_))));
        }
    }

    #[test]
    fn test_extent_of_crop_region() {
        let options = ImportOptions {
            crop: Some(CropRegion::from_origin_size(5.0, 5.0, 30.0, 20.0).unwrap()),
            ..Default::default()
        };
        // The file is not opened when a crop region is set.
        let extent = chip_extent(Path::new("/nonexistent.gds"), &options).unwrap();
        assert_eq!(extent, (30.0, 20.0));
    }

    #[test]
    fn test_collection_name_from_stem() {
        assert_eq!(collection_name(Path::new("/tmp/inverter.gds")), "inverter");
    }
}
