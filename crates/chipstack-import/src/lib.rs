//! # Chipstack Import
//!
//! Turns a GDS-II layout and a layer stack into one extruded mesh object per
//! layer inside a [`chipstack_scene::SceneHost`].

pub mod error;
pub mod importer;

pub use error::ImportError;
pub use importer::{
    chip_extent, FailureMode, ImportOptions, ImportReport, Importer, LayerOutcome, LayerReport,
    LayerStage, SkipReason,
};
