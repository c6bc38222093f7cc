//! Camera, light and base plate framing a chip.

use serde::{Deserialize, Serialize};

use chipstack_core::layer::LayerColor;
use chipstack_core::mesh::Mesh3D;

use crate::host::Material;

/// Dark bluish world background.
pub const WORLD_BACKGROUND: [f32; 4] = [0.05, 0.05, 0.08, 1.0];
pub const SUN_ROTATION: [f64; 3] = [0.8, 0.0, 0.8];
pub const SUN_ENERGY: f32 = 3.0;
/// Camera elevation above the chip surface.
pub const CAMERA_HEIGHT: f64 = 200.0;
pub const BASE_PLATE_COLOR: [f32; 4] = [0.05, 0.07, 0.1, 1.0];

pub const CAMERA_NAME: &str = "Camera";
pub const SUN_NAME: &str = "Sun";
pub const BASE_PLATE_NAME: &str = "ChipBase";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Camera {
    pub name: String,
    pub location: [f64; 3],
    /// Euler XYZ in radians; zero looks straight down.
    pub rotation: [f64; 3],
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SunLight {
    pub name: String,
    pub rotation: [f64; 3],
    pub energy: f32,
}

/// Everything placed around a `width` × `height` chip whose corner is the origin.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChipRig {
    pub background: [f32; 4],
    pub camera: Camera,
    pub sun: SunLight,
    pub base_plate: Mesh3D,
    pub base_material: Material,
}

impl ChipRig {
    pub fn for_extent(width: f64, height: f64) -> Self {
        Self {
            background: WORLD_BACKGROUND,
            camera: Camera {
                name: CAMERA_NAME.to_string(),
                location: [width / 2.0, height / 2.0, CAMERA_HEIGHT],
                rotation: [0.0; 3],
            },
            sun: SunLight {
                name: SUN_NAME.to_string(),
                rotation: SUN_ROTATION,
                energy: SUN_ENERGY,
            },
            base_plate: base_plate(width, height),
            base_material: Material::new("ChipBaseMat", LayerColor::from_array(BASE_PLATE_COLOR)),
        }
    }
}

/// A single quad at z = 0 spanning `(0, 0)-(width, height)`.
fn base_plate(width: f64, height: f64) -> Mesh3D {
    Mesh3D {
        vertices: vec![
            [0.0, 0.0, 0.0],
            [0.0, height, 0.0],
            [width, height, 0.0],
            [width, 0.0, 0.0],
        ],
        faces: vec![vec![0, 1, 2, 3]],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_rig_for_extent() {
        let rig = ChipRig::for_extent(40.0, 20.0);
        assert_eq!(rig.camera.location, [20.0, 10.0, 200.0]);
        assert_eq!(rig.sun.energy, 3.0);
        assert_eq!(rig.base_plate.bounds(), Some(([0.0, 0.0, 0.0], [40.0, 20.0, 0.0])));
        assert!(rig.base_plate.is_well_formed());
        assert_eq!(rig.base_material.name, "ChipBaseMat");
        assert_eq!(rig.base_material.base_color, BASE_PLATE_COLOR);
    }
}
