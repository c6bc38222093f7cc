//! Layer-stack and color-scheme YAML files.
//!
//! A layer stack is a YAML mapping from layer name to its GDS key, elevation,
//! thickness and color:
//!
//! ```yaml
//! Metal1:
//!   index: 8
//!   type: 0
//!   z: 1.04
//!   height: 0.42
//!   color: [0.8, 0.6, 0.2, 1.0]
//! ```
//!
//! Mapping order is kept and becomes the import order. A color scheme replaces
//! the colors of an existing stack and must name exactly the same layers.

use std::collections::BTreeSet;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use chipstack_core::layer::{LayerColor, LayerKey, LayerSpec, LayerStack};

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Configuration file not found: {0}")]
    NotFound(PathBuf),

    #[error("Failed to read {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Malformed configuration in {origin}: {source}")]
    Malformed {
        origin: String,
        #[source]
        source: serde_yaml::Error,
    },

    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Color scheme does not match the layer stack; inconsistent or missing layers: {}", .layers.join(", "))]
    SchemeMismatch { layers: Vec<String> },
}

/// One value of the layer-stack mapping, exactly as written in the file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerEntry {
    /// GDS layer number.
    pub index: u16,
    /// GDS datatype.
    #[serde(rename = "type")]
    pub datatype: u16,
    pub z: f64,
    pub height: f64,
    pub color: [f32; 4],
}

impl LayerEntry {
    fn to_spec(&self, name: &str) -> LayerSpec {
        LayerSpec::new(name, LayerKey::new(self.index, self.datatype), self.z, self.height)
            .with_color(LayerColor::from_array(self.color))
    }

    fn from_spec(spec: &LayerSpec) -> Self {
        Self {
            index: spec.key.number,
            datatype: spec.key.datatype,
            z: spec.z,
            height: spec.height,
            color: spec.color.to_array(),
        }
    }
}

// ── Layer stacks ─────────────────────────────────────────────────────

/// Parse a layer stack from YAML text.
pub fn parse_layer_stack(yaml: &str) -> Result<LayerStack, ConfigError> {
    parse_layer_stack_from(yaml, "<inline>")
}

/// Load a layer stack from a YAML file.
pub fn load_layer_stack(path: &Path) -> Result<LayerStack, ConfigError> {
    let text = read_config(path)?;
    parse_layer_stack_from(&text, &path.display().to_string())
}

/// Serialise a stack back to the YAML layout it was loaded from.
pub fn layer_stack_to_yaml(stack: &LayerStack) -> Result<String, ConfigError> {
    let entries: IndexMap<&str, LayerEntry> = stack
        .iter()
        .map(|spec| (spec.name.as_str(), LayerEntry::from_spec(spec)))
        .collect();
    serde_yaml::to_string(&entries).map_err(|source| ConfigError::Malformed {
        origin: "<layer stack>".into(),
        source,
    })
}

fn parse_layer_stack_from(yaml: &str, origin: &str) -> Result<LayerStack, ConfigError> {
    let entries: IndexMap<String, LayerEntry> =
        serde_yaml::from_str(yaml).map_err(|source| ConfigError::Malformed {
            origin: origin.to_string(),
            source,
        })?;

    if entries.is_empty() {
        return Err(ConfigError::Invalid(format!("{} defines no layers", origin)));
    }

    let mut stack = LayerStack::new();
    for (name, entry) in &entries {
        validate_entry(name, entry)?;
        stack.add_layer(entry.to_spec(name));
    }

    log::info!("Loaded layer stack from {}: {} layers", origin, stack.layer_count());
    Ok(stack)
}

fn validate_entry(name: &str, entry: &LayerEntry) -> Result<(), ConfigError> {
    if name.trim().is_empty() {
        return Err(ConfigError::Invalid("layer with an empty name".into()));
    }
    if !entry.z.is_finite() || !entry.height.is_finite() {
        return Err(ConfigError::Invalid(format!(
            "layer '{}' has a non-finite z or height",
            name
        )));
    }
    if !LayerColor::from_array(entry.color).is_normalized() {
        return Err(ConfigError::Invalid(format!(
            "layer '{}' color {:?} is outside [0, 1]",
            name, entry.color
        )));
    }
    if entry.height == 0.0 {
        log::warn!("Layer '{}' has zero height and will produce flat prisms", name);
    }
    Ok(())
}

fn read_config(path: &Path) -> Result<String, ConfigError> {
    fs::read_to_string(path).map_err(|source| {
        if source.kind() == io::ErrorKind::NotFound {
            ConfigError::NotFound(path.to_path_buf())
        } else {
            ConfigError::Io {
                path: path.to_path_buf(),
                source,
            }
        }
    })
}

// ── Color schemes ────────────────────────────────────────────────────

/// Alternative colors for every layer of a stack.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ColorScheme {
    pub layers: IndexMap<String, [f32; 4]>,
}

impl ColorScheme {
    pub fn from_yaml_str(yaml: &str) -> Result<Self, ConfigError> {
        Self::parse(yaml, "<inline>")
    }

    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let text = read_config(path)?;
        Self::parse(&text, &path.display().to_string())
    }

    fn parse(yaml: &str, origin: &str) -> Result<Self, ConfigError> {
        let scheme: ColorScheme =
            serde_yaml::from_str(yaml).map_err(|source| ConfigError::Malformed {
                origin: origin.to_string(),
                source,
            })?;
        for (name, color) in &scheme.layers {
            if !LayerColor::from_array(*color).is_normalized() {
                return Err(ConfigError::Invalid(format!(
                    "color scheme entry '{}' {:?} is outside [0, 1]",
                    name, color
                )));
            }
        }
        Ok(scheme)
    }

    /// Layer names present in only one of the scheme and the stack, sorted.
    pub fn mismatched_layers(&self, stack: &LayerStack) -> Vec<String> {
        let ours: BTreeSet<&str> = self.layers.keys().map(String::as_str).collect();
        let theirs: BTreeSet<&str> = stack.names().collect();
        ours.symmetric_difference(&theirs)
            .map(|s| s.to_string())
            .collect()
    }

    /// Recolor `stack`. Fails without touching it unless both name the same layers.
    pub fn apply(&self, stack: &mut LayerStack) -> Result<(), ConfigError> {
        let layers = self.mismatched_layers(stack);
        if !layers.is_empty() {
            return Err(ConfigError::SchemeMismatch { layers });
        }

        for (name, color) in &self.layers {
            if let Some(spec) = stack.get_layer_mut(name) {
                spec.color = LayerColor::from_array(*color);
            }
        }
        log::debug!("Applied color scheme to {} layers", self.layers.len());
        Ok(())
    }
}
