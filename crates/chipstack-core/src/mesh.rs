use serde::{Deserialize, Serialize};

/// A polygonal 3D mesh: a vertex buffer and faces indexing into it.
///
/// Faces are n-gons (caps keep the polygon's vertex count, walls are quads).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Mesh3D {
    pub vertices: Vec<[f64; 3]>,
    pub faces: Vec<Vec<usize>>,
}

impl Mesh3D {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn vertex_count(&self) -> usize {
        self.vertices.len()
    }

    pub fn face_count(&self) -> usize {
        self.faces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vertices.is_empty()
    }

    /// Lowest and highest Z over all vertices.
    pub fn z_range(&self) -> Option<(f64, f64)> {
        self.vertices.iter().fold(None, |acc, v| match acc {
            None => Some((v[2], v[2])),
            Some((lo, hi)) => Some((lo.min(v[2]), hi.max(v[2]))),
        })
    }

    /// Axis-aligned bounds as `(min, max)` corners.
    pub fn bounds(&self) -> Option<([f64; 3], [f64; 3])> {
        let first = *self.vertices.first()?;
        Some(self.vertices.iter().fold((first, first), |(mut lo, mut hi), v| {
            for axis in 0..3 {
                lo[axis] = lo[axis].min(v[axis]);
                hi[axis] = hi[axis].max(v[axis]);
            }
            (lo, hi)
        }))
    }

    /// Every face has at least three indices, all inside the vertex buffer.
    pub fn is_well_formed(&self) -> bool {
        let n = self.vertices.len();
        self.faces
            .iter()
            .all(|f| f.len() >= 3 && f.iter().all(|&i| i < n))
    }
}
