//! Writing a [`Scene`] to disk: Wavefront OBJ with a sibling MTL library, or
//! the scene document as JSON.

use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::scene::Scene;

#[derive(Error, Debug)]
pub enum ExportError {
    #[error("Failed to write {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("Failed to encode scene: {0}")]
    Encode(#[from] serde_json::Error),

    #[error("Unsupported output format '{0}' (expected .obj or .json)")]
    UnsupportedFormat(String),
}

/// Output formats, chosen from the file extension.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExportFormat {
    Obj,
    Json,
}

impl ExportFormat {
    pub fn from_path(path: &Path) -> Result<Self, ExportError> {
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .map(str::to_ascii_lowercase)
            .unwrap_or_default();
        match ext.as_str() {
            "obj" => Ok(ExportFormat::Obj),
            "json" => Ok(ExportFormat::Json),
            _ => Err(ExportError::UnsupportedFormat(ext)),
        }
    }
}

/// Write `scene` to `path` in the format its extension names.
///
/// Returns every file written.
pub fn export(scene: &Scene, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
    match ExportFormat::from_path(path)? {
        ExportFormat::Obj => export_obj(scene, path),
        ExportFormat::Json => {
            export_json(scene, path)?;
            Ok(vec![path.to_path_buf()])
        }
    }
}

pub fn export_json(scene: &Scene, path: &Path) -> Result<(), ExportError> {
    let json = scene.to_json()?;
    std::fs::write(path, json).map_err(|source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    })
}

/// Write `path` and the material library next to it (same stem, `.mtl`).
pub fn export_obj(scene: &Scene, path: &Path) -> Result<Vec<PathBuf>, ExportError> {
    let mtl_path = path.with_extension("mtl");
    let mtl_name = mtl_path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "scene.mtl".to_string());

    write_file(path, |w| write_obj(scene, &mtl_name, w))?;
    write_file(&mtl_path, |w| write_mtl(scene, w))?;

    log::info!(
        "Exported {} objects to {} and {}",
        scene.object_count(),
        path.display(),
        mtl_path.display()
    );
    Ok(vec![path.to_path_buf(), mtl_path])
}

fn write_file(
    path: &Path,
    body: impl FnOnce(&mut BufWriter<File>) -> io::Result<()>,
) -> Result<(), ExportError> {
    let wrap = |source| ExportError::Io {
        path: path.to_path_buf(),
        source,
    };
    let file = File::create(path).map_err(wrap)?;
    let mut writer = BufWriter::new(file);
    body(&mut writer).map_err(wrap)?;
    writer.flush().map_err(wrap)
}

/// OBJ body. Vertex indices are 1-based and run on across objects.
pub fn write_obj<W: Write>(scene: &Scene, mtl_name: &str, w: &mut W) -> io::Result<()> {
    writeln!(w, "# chipstack scene: {} objects", scene.object_count())?;
    writeln!(w, "mtllib {}", mtl_name)?;

    let mut base = 1usize;
    for obj in &scene.objects {
        writeln!(w, "o {}", obj.name)?;
        for v in &obj.mesh.vertices {
            writeln!(w, "v {} {} {}", v[0], v[1], v[2])?;
        }
        writeln!(w, "usemtl {}", obj.material)?;
        for face in &obj.mesh.faces {
            write!(w, "f")?;
            for &i in face {
                write!(w, " {}", base + i)?;
            }
            writeln!(w)?;
        }
        base += obj.mesh.vertex_count();
    }
    Ok(())
}

/// MTL body, using the PBR extension keys for metallic and roughness.
pub fn write_mtl<W: Write>(scene: &Scene, w: &mut W) -> io::Result<()> {
    for m in &scene.materials {
        let [r, g, b, a] = m.base_color;
        writeln!(w, "newmtl {}", m.name)?;
        writeln!(w, "Kd {} {} {}", r, g, b)?;
        writeln!(w, "d {}", a)?;
        writeln!(w, "Pm {}", m.metallic)?;
        writeln!(w, "Pr {}", m.roughness)?;
        writeln!(w)?;
    }
    Ok(())
}
