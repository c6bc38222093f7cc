//! # Chipstack Scene
//!
//! The boundary between the importer and a 3D content host. [`SceneHost`] is
//! the set of calls the importer makes; [`Scene`] is an in-memory host that can
//! be saved as JSON or exported to Wavefront OBJ.

pub mod host;
pub mod bootstrap;
pub mod scene;
pub mod export;

pub use host::{CollectionHandle, HostError, Material, ObjectHandle, SceneHost};
pub use bootstrap::ChipRig;
pub use scene::{Collection, Scene, SceneObject};
pub use export::{export, ExportError, ExportFormat};
