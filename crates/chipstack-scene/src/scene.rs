//! In-memory scene used as the reference host.
//!
//! Objects, materials and collections are kept in creation order. Names are
//! unique per kind: a clashing object name gets a numeric suffix (`LMetal1.001`),
//! a material with an existing name replaces the stored one.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use chipstack_core::mesh::Mesh3D;

use crate::bootstrap::{Camera, ChipRig, SunLight, BASE_PLATE_NAME};
use crate::host::{mesh_name, object_name, CollectionHandle, HostError, Material, ObjectHandle, SceneHost};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Collection {
    pub id: CollectionHandle,
    pub name: String,
    pub objects: Vec<ObjectHandle>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SceneObject {
    pub id: ObjectHandle,
    pub name: String,
    pub mesh_name: String,
    pub mesh: Mesh3D,
    /// Name of the assigned material.
    pub material: String,
    pub collection: Option<CollectionHandle>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub collections: Vec<Collection>,
    pub objects: Vec<SceneObject>,
    pub materials: Vec<Material>,
    pub background: Option<[f32; 4]>,
    pub camera: Option<Camera>,
    pub sun: Option<SunLight>,
}

impl Scene {
    pub fn new() -> Self {
        Self::default()
    }

    // ── Lookup ───────────────────────────────────────────────────────

    pub fn object(&self, id: ObjectHandle) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn find_object(&self, name: &str) -> Option<&SceneObject> {
        self.objects.iter().find(|o| o.name == name)
    }

    pub fn find_collection(&self, name: &str) -> Option<&Collection> {
        self.collections.iter().find(|c| c.name == name)
    }

    pub fn material(&self, name: &str) -> Option<&Material> {
        self.materials.iter().find(|m| m.name == name)
    }

    pub fn object_count(&self) -> usize {
        self.objects.len()
    }

    /// Objects linked to `collection`, in creation order.
    pub fn objects_in(&self, collection: CollectionHandle) -> impl Iterator<Item = &SceneObject> {
        self.objects
            .iter()
            .filter(move |o| o.collection == Some(collection))
    }

    // ── Serialization ────────────────────────────────────────────────

    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }

    pub fn from_json(json: &str) -> serde_json::Result<Self> {
        serde_json::from_str(json)
    }

    // ── Internals ────────────────────────────────────────────────────

    fn unique_object_name(&self, base: &str) -> String {
        if self.find_object(base).is_none() {
            return base.to_string();
        }
        (1..)
            .map(|i| format!("{}.{:03}", base, i))
            .find(|candidate| self.find_object(candidate).is_none())
            .unwrap_or_else(|| base.to_string())
    }

    fn store_material(&mut self, material: Material) {
        match self.materials.iter_mut().find(|m| m.name == material.name) {
            Some(existing) => *existing = material,
            None => self.materials.push(material),
        }
    }

    fn add_object(
        &mut self,
        name: &str,
        mesh_name: String,
        mesh: Mesh3D,
        material: Material,
        collection: Option<CollectionHandle>,
    ) -> Result<ObjectHandle, HostError> {
        if let Some(handle) = collection {
            if !self.collections.iter().any(|c| c.id == handle) {
                return Err(HostError::UnknownCollection(handle));
            }
        }

        let id = Uuid::new_v4();
        let name = self.unique_object_name(name);
        let material_name = material.name.clone();
        self.store_material(material);

        if let Some(c) = collection.and_then(|h| self.collections.iter_mut().find(|c| c.id == h)) {
            c.objects.push(id);
        }

        log::debug!("Created object '{}' ({} vertices)", name, mesh.vertex_count());
        self.objects.push(SceneObject {
            id,
            name,
            mesh_name,
            mesh,
            material: material_name,
            collection,
        });
        Ok(id)
    }
}

impl SceneHost for Scene {
    fn create_collection(&mut self, name: &str) -> Result<CollectionHandle, HostError> {
        let id = Uuid::new_v4();
        self.collections.push(Collection {
            id,
            name: name.to_string(),
            objects: Vec::new(),
        });
        log::debug!("Created collection '{}'", name);
        Ok(id)
    }

    fn create_mesh_object(
        &mut self,
        layer: &str,
        mesh: Mesh3D,
        material: Material,
        collection: Option<CollectionHandle>,
    ) -> Result<ObjectHandle, HostError> {
        if !mesh.is_well_formed() {
            return Err(HostError::Rejected {
                what: format!("mesh for layer '{}'", layer),
                reason: "face index outside the vertex buffer".into(),
            });
        }
        self.add_object(&object_name(layer), mesh_name(layer), mesh, material, collection)
    }

    fn place_camera_and_light(
        &mut self,
        width: f64,
        height: f64,
        collection: Option<CollectionHandle>,
    ) -> Result<(), HostError> {
        let rig = ChipRig::for_extent(width, height);
        self.add_object(
            BASE_PLATE_NAME,
            format!("{}Mesh", BASE_PLATE_NAME),
            rig.base_plate,
            rig.base_material,
            collection,
        )?;
        self.background = Some(rig.background);
        self.camera = Some(rig.camera);
        self.sun = Some(rig.sun);
        log::info!("Placed camera and light for a {} x {} chip", width, height);
        Ok(())
    }
}
