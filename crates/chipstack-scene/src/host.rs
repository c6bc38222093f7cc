use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use chipstack_core::layer::{LayerColor, LayerSpec};
use chipstack_core::mesh::Mesh3D;

pub type CollectionHandle = Uuid;
pub type ObjectHandle = Uuid;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum HostError {
    #[error("Host rejected {what}: {reason}")]
    Rejected { what: String, reason: String },

    #[error("Unknown collection {0}")]
    UnknownCollection(CollectionHandle),
}

/// A principled surface: base color plus metallic and roughness factors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Material {
    pub name: String,
    pub base_color: [f32; 4],
    pub metallic: f32,
    pub roughness: f32,
}

impl Material {
    pub fn new(name: &str, color: LayerColor) -> Self {
        Self {
            name: name.to_string(),
            base_color: color.to_array(),
            metallic: 0.0,
            roughness: 0.5,
        }
    }

    /// Material `Mat_<layer>`. Metal, via and contact layers are metallic;
    /// metals are also polished.
    pub fn for_layer(spec: &LayerSpec) -> Self {
        let name = &spec.name;
        let conductive = ["Metal", "Via", "Cont"].iter().any(|k| name.contains(k));
        Self {
            name: format!("Mat_{}", name),
            base_color: spec.color.to_array(),
            metallic: if conductive { 0.8 } else { 0.1 },
            roughness: if name.contains("Metal") { 0.3 } else { 0.5 },
        }
    }
}

/// Object name used for a layer's mesh object.
pub fn object_name(layer: &str) -> String {
    format!("L{}", layer)
}

/// Mesh datablock name used for a layer.
pub fn mesh_name(layer: &str) -> String {
    format!("M{}", layer)
}

/// The operations the importer needs from a 3D content host.
///
/// Calls are made from one thread, one at a time.
pub trait SceneHost {
    /// Create a named group and return its handle.
    fn create_collection(&mut self, name: &str) -> Result<CollectionHandle, HostError>;

    /// Create the object for `layer`, owning `mesh`, with `material` assigned.
    ///
    /// Without a collection the host's active collection is used.
    fn create_mesh_object(
        &mut self,
        layer: &str,
        mesh: Mesh3D,
        material: Material,
        collection: Option<CollectionHandle>,
    ) -> Result<ObjectHandle, HostError>;

    /// Place camera, light, background and a base plate for a `width` × `height` chip.
    fn place_camera_and_light(
        &mut self,
        width: f64,
        height: f64,
        collection: Option<CollectionHandle>,
    ) -> Result<(), HostError>;
}
