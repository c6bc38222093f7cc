//! # Chipstack Core
//!
//! Layer-stack model, hierarchical cell library with flattening, region
//! cropping and prism extrusion. Everything here is pure computation: no file
//! access and no host-application calls.

pub mod geometry;
pub mod layer;
pub mod path;
pub mod cell;
pub mod library;
pub mod spatial;
pub mod crop;
pub mod mesh;
pub mod extrude;

pub use geometry::{BBox, CropRegion, GeometryError, Point, Polygon};
pub use layer::{LayerColor, LayerKey, LayerSpec, LayerStack};
pub use path::{LayoutPath, PathEnd};
pub use cell::{ArrayGrid, Cell, CellInstance, Shape, ShapeGeometry, Transform};
pub use library::{Library, LibraryError};
pub use crop::crop;
pub use mesh::Mesh3D;
pub use extrude::{extrude, PrismBuilder};
