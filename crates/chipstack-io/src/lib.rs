//! # Chipstack I/O
//!
//! File formats: GDS-II layout streams, layer-stack and color-scheme YAML, and
//! the layer stacks of the built-in PDKs.

pub mod gds;
pub mod config;
pub mod pdk;
pub mod layout;

pub use gds::{GdsError, GdsReader, GdsWriter, LayerFilter};
pub use config::{layer_stack_to_yaml, load_layer_stack, parse_layer_stack, ColorScheme, ConfigError, LayerEntry};
pub use pdk::Pdk;
pub use layout::{chip_bbox, probe, read_layer, read_library};
