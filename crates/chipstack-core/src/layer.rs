use std::fmt;

use serde::{Deserialize, Serialize};

/// A GDS-II `(layer, datatype)` pair.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct LayerKey {
    pub number: u16,
    pub datatype: u16,
}

impl LayerKey {
    pub fn new(number: u16, datatype: u16) -> Self {
        Self { number, datatype }
    }
}

impl fmt::Display for LayerKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.number, self.datatype)
    }
}

/// RGBA color for a layer, each channel in `[0, 1]`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LayerColor {
    pub r: f32,
    pub g: f32,
    pub b: f32,
    pub a: f32,
}

impl Default for LayerColor {
    fn default() -> Self {
        Self {
            r: 0.5,
            g: 0.5,
            b: 0.5,
            a: 1.0,
        }
    }
}

impl LayerColor {
    pub fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }

    pub fn from_array(rgba: [f32; 4]) -> Self {
        Self::new(rgba[0], rgba[1], rgba[2], rgba[3])
    }

    pub fn to_array(&self) -> [f32; 4] {
        [self.r, self.g, self.b, self.a]
    }

    pub fn is_normalized(&self) -> bool {
        self.to_array()
            .iter()
            .all(|c| c.is_finite() && (0.0..=1.0).contains(c))
    }
}

/// One entry of a process layer stack: where a mask layer sits and how it looks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerSpec {
    pub name: String,
    pub key: LayerKey,
    /// Base elevation in physical units.
    pub z: f64,
    /// Thickness. Negative values build an inverted prism; zero is degenerate.
    pub height: f64,
    pub color: LayerColor,
}

impl LayerSpec {
    pub fn new(name: &str, key: LayerKey, z: f64, height: f64) -> Self {
        Self {
            name: name.to_string(),
            key,
            z,
            height,
            color: LayerColor::default(),
        }
    }

    pub fn with_color(mut self, color: LayerColor) -> Self {
        self.color = color;
        self
    }

    /// Top of the layer, `z + height`.
    pub fn top(&self) -> f64 {
        self.z + self.height
    }
}

/// An ordered collection of layers representing a technology stack.
///
/// Order is the import order. Names are unique; adding a layer whose name is
/// already present replaces the earlier entry in place.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LayerStack {
    layers: Vec<LayerSpec>,
}

impl LayerStack {
    pub fn new() -> Self {
        Self { layers: Vec::new() }
    }

    pub fn add_layer(&mut self, layer: LayerSpec) {
        match self.layers.iter_mut().find(|l| l.name == layer.name) {
            Some(existing) => *existing = layer,
            None => self.layers.push(layer),
        }
    }

    pub fn get_layer(&self, name: &str) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.name == name)
    }

    pub fn get_layer_mut(&mut self, name: &str) -> Option<&mut LayerSpec> {
        self.layers.iter_mut().find(|l| l.name == name)
    }

    pub fn get_layer_by_gds(&self, key: LayerKey) -> Option<&LayerSpec> {
        self.layers.iter().find(|l| l.key == key)
    }

    pub fn all_layers(&self) -> &[LayerSpec] {
        &self.layers
    }

    pub fn iter(&self) -> impl Iterator<Item = &LayerSpec> {
        self.layers.iter()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.layers.iter().map(|l| l.name.as_str())
    }

    pub fn layer_count(&self) -> usize {
        self.layers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Highest `z + height` over the stack, used to size scene framing.
    pub fn total_height(&self) -> f64 {
        self.layers
            .iter()
            .map(|l| l.z.max(l.top()))
            .fold(0.0, f64::max)
    }
}

impl FromIterator<LayerSpec> for LayerStack {
    fn from_iter<I: IntoIterator<Item = LayerSpec>>(iter: I) -> Self {
        let mut stack = LayerStack::new();
        for layer in iter {
            stack.add_layer(layer);
        }
        stack
    }
}
