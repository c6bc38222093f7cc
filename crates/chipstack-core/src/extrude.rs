//! Prism extrusion of 2D polygons.
//!
//! Each polygon becomes a closed solid between `z` and `z + height`. For an
//! N-gon starting at running vertex offset `V` the layout is:
//!
//! - vertices `V..V+N` are the bottom ring, `V+N..V+2N` the top ring at the
//!   same XY;
//! - the bottom cap lists the bottom ring in order, the top cap lists the top
//!   ring reversed so both caps face outward under one winding convention;
//! - side quad `i` is `[V+i, V+j, V+j+N, V+i+N]` with `j = (i + 1) % N`.
//!
//! Polygons with fewer than three vertices are skipped.

use crate::geometry::Polygon;
use crate::mesh::Mesh3D;

/// Accumulates prisms into one mesh, keeping vertex offsets disjoint.
#[derive(Debug, Clone)]
pub struct PrismBuilder {
    z: f64,
    height: f64,
    mesh: Mesh3D,
    prisms: usize,
}

impl PrismBuilder {
    pub fn new(z: f64, height: f64) -> Self {
        Self {
            z,
            height,
            mesh: Mesh3D::new(),
            prisms: 0,
        }
    }

    /// Append the prism of `polygon`. Returns `false` if it was degenerate.
    pub fn add_polygon(&mut self, polygon: &Polygon) -> bool {
        let n = polygon.vertex_count();
        if n < 3 {
            return false;
        }

        let v = self.mesh.vertices.len();
        let top_z = self.z + self.height;

        self.mesh.vertices.reserve(2 * n);
        self.mesh
            .vertices
            .extend(polygon.vertices.iter().map(|p| [p.x, p.y, self.z]));
        self.mesh
            .vertices
            .extend(polygon.vertices.iter().map(|p| [p.x, p.y, top_z]));

        self.mesh.faces.reserve(n + 2);
        self.mesh.faces.push((v..v + n).collect());
        self.mesh.faces.push((v + n..v + 2 * n).rev().collect());
        for i in 0..n {
            let j = (i + 1) % n;
            self.mesh.faces.push(vec![v + i, v + j, v + j + n, v + i + n]);
        }

        self.prisms += 1;
        true
    }

    /// The finished mesh, or `None` if no polygon contributed.
    pub fn finish(self) -> Option<Mesh3D> {
        if self.prisms == 0 {
            None
        } else {
            Some(self.mesh)
        }
    }
}

/// Extrude a polygon set into one mesh spanning `[z, z + height]`.
///
/// Returns `None` when nothing could be extruded; callers treat that as
/// "no geometry on this layer" rather than building an empty object.
pub fn extrude(polygons: &[Polygon], z: f64, height: f64) -> Option<Mesh3D> {
    let mut builder = PrismBuilder::new(z, height);
    let mut skipped = 0usize;
    for polygon in polygons {
        if !builder.add_polygon(polygon) {
            skipped += 1;
        }
    }
    if skipped > 0 {
        log::debug!("Skipped {} degenerate polygons during extrusion", skipped);
    }
    builder.finish()
}
