use std::fs::File;
use std::path::{Path, PathBuf};

use approx::assert_relative_eq;
use tempfile::TempDir;

use chipstack_core::cell::{Cell, Shape};
use chipstack_core::geometry::{CropRegion, Point, Polygon};
use chipstack_core::layer::LayerKey;
use chipstack_core::library::Library;
use chipstack_core::mesh::Mesh3D;
use chipstack_import::{
    FailureMode, ImportError, ImportOptions, ImportReport, Importer, LayerOutcome, LayerStage,
    SkipReason,
};
use chipstack_io::{parse_layer_stack, GdsWriter};
use chipstack_scene::{CollectionHandle, HostError, Material, ObjectHandle, Scene, SceneHost};

const ONE_LAYER: &str = "
Metal1:
  index: 8
  type: 0
  z: 0
  height: 0.5
  color: [1, 0, 0, 1]
";

const THREE_LAYERS: &str = "
Metal1:
  index: 8
  type: 0
  z: 1.0
  height: 0.5
  color: [0.2, 0.3, 0.9, 1]
Via1:
  index: 19
  type: 0
  z: 1.5
  height: 0.5
  color: [0.5, 0.5, 0.5, 1]
Metal2:
  index: 10
  type: 0
  z: 2.0
  height: 0.5
  color: [0.9, 0.8, 0.2, 1]
";

fn square_gds(dir: &TempDir) -> PathBuf {
    let mut lib = Library::new("chip");
    let mut top = Cell::new("TOP");
    top.add_shape(Shape::polygon(LayerKey::new(8, 0), Polygon::rectangle(0.0, 0.0, 10.0, 10.0)));
    lib.add_cell(top);
    write_gds(dir, "square.gds", &lib)
}

fn three_layer_gds(dir: &TempDir) -> PathBuf {
    let mut lib = Library::new("chip");
    let mut top = Cell::new("TOP");
    top.add_shape(Shape::polygon(LayerKey::new(8, 0), Polygon::rectangle(0.0, 0.0, 40.0, 20.0)));
    top.add_shape(Shape::polygon(LayerKey::new(19, 0), Polygon::rectangle(4.0, 4.0, 6.0, 6.0)));
    top.add_shape(Shape::polygon(LayerKey::new(10, 0), Polygon::rectangle(2.0, 2.0, 38.0, 8.0)));
    lib.add_cell(top);
    write_gds(dir, "three.gds", &lib)
}

fn write_gds(dir: &TempDir, name: &str, lib: &Library) -> PathBuf {
    let path = dir.path().join(name);
    GdsWriter::new(File::create(&path).unwrap()).write(lib).unwrap();
    path
}

fn bare_options() -> ImportOptions {
    ImportOptions {
        create_collection: false,
        setup_scene: false,
        ..Default::default()
    }
}

fn run(config: &str, gds: &Path, options: ImportOptions, host: &mut dyn SceneHost) -> Result<ImportReport, ImportError> {
    let stack = parse_layer_stack(config)?;
    Importer::new(stack, options).run(gds, host)
}

/// Footprint area of an extruded single-prism mesh, taken from its bottom cap.
fn footprint_area(mesh: &Mesh3D) -> f64 {
    let cap: Vec<Point> = mesh.faces[0]
        .iter()
        .map(|&i| Point::new(mesh.vertices[i][0], mesh.vertices[i][1]))
        .collect();
    Polygon::new(cap).area()
}

/// Scene that rejects the object for one named layer.
struct FailingHost {
    scene: Scene,
    reject: &'static str,
}

impl SceneHost for FailingHost {
    fn create_collection(&mut self, name: &str) -> Result<CollectionHandle, HostError> {
        self.scene.create_collection(name)
    }

    fn create_mesh_object(
        &mut self,
        layer: &str,
        mesh: Mesh3D,
        material: Material,
        collection: Option<CollectionHandle>,
    ) -> Result<ObjectHandle, HostError> {
        if layer == self.reject {
            return Err(HostError::Rejected {
                what: layer.to_string(),
                reason: "out of memory".into(),
            });
        }
        self.scene.create_mesh_object(layer, mesh, material, collection)
    }

    fn place_camera_and_light(
        &mut self,
        width: f64,
        height: f64,
        collection: Option<CollectionHandle>,
    ) -> Result<(), HostError> {
        self.scene.place_camera_and_light(width, height, collection)
    }
}

#[test]
fn test_single_square_layer() {
    let dir = TempDir::new().unwrap();
    let gds = square_gds(&dir);
    let mut scene = Scene::new();

    let report = run(ONE_LAYER, &gds, bare_options(), &mut scene).unwrap();
    assert_eq!(report.imported_count(), 1);

    let obj = scene.find_object("LMetal1").unwrap();
    assert_eq!(obj.mesh_name, "MMetal1");
    assert_eq!(obj.mesh.vertex_count(), 8);
    assert_eq!(obj.mesh.face_count(), 6);
    let (lo, hi) = obj.mesh.z_range().unwrap();
    assert_relative_eq!(lo, 0.0);
    assert_relative_eq!(hi, 0.5);
    assert_relative_eq!(footprint_area(&obj.mesh), 100.0, epsilon = 1e-6);

    let mat = scene.material("Mat_Metal1").unwrap();
    assert_eq!(mat.base_color, [1.0, 0.0, 0.0, 1.0]);
    assert_eq!(mat.metallic, 0.8);
}

#[test]
fn test_crop_to_quarter() {
    let dir = TempDir::new().unwrap();
    let gds = square_gds(&dir);
    let mut scene = Scene::new();
    let options = ImportOptions {
        crop: Some(CropRegion::new(5.0, 5.0, 15.0, 15.0).unwrap()),
        ..bare_options()
    };

    let report = run(ONE_LAYER, &gds, options, &mut scene).unwrap();
    assert_eq!(report.imported_count(), 1);

    let mesh = &scene.find_object("LMetal1").unwrap().mesh;
    assert_eq!(mesh.vertex_count(), 8);
    assert_relative_eq!(footprint_area(mesh), 25.0, epsilon = 1e-6);
    let (lo, hi) = mesh.bounds().unwrap();
    assert_relative_eq!(lo[0], 5.0, epsilon = 1e-9);
    assert_relative_eq!(hi[1], 10.0, epsilon = 1e-9);
}

#[test]
fn test_crop_outside_skips_layer() {
    let dir = TempDir::new().unwrap();
    let gds = square_gds(&dir);
    let mut scene = Scene::new();
    let options = ImportOptions {
        crop: Some(CropRegion::from_origin_size(100.0, 100.0, 10.0, 10.0).unwrap()),
        ..bare_options()
    };

    let report = run(ONE_LAYER, &gds, options, &mut scene).unwrap();
    assert!(matches!(
        report.layer("Metal1").unwrap().outcome,
        LayerOutcome::Skipped(SkipReason::OutsideCrop)
    ));
    assert_eq!(scene.object_count(), 0);
}

#[test]
fn test_absent_layer_is_skipped() {
    let dir = TempDir::new().unwrap();
    let gds = square_gds(&dir);
    let config = format!(
        "{}Ghost:\n  index: 99\n  type: 0\n  z: 1\n  height: 1\n  color: [1, 1, 1, 1]\n",
        ONE_LAYER
    );
    let mut scene = Scene::new();

    let report = run(&config, &gds, bare_options(), &mut scene).unwrap();
    assert_eq!(report.imported_count(), 1);
    assert_eq!(report.skipped_count(), 1);
    let ghost = report.layer("Ghost").unwrap();
    assert_eq!(ghost.key, LayerKey::new(99, 0));
    assert!(matches!(ghost.outcome, LayerOutcome::Skipped(SkipReason::NoGeometry)));
    assert!(scene.find_object("LGhost").is_none());
}

#[test]
fn test_malformed_config_aborts_before_reading() {
    let mut scene = Scene::new();
    let no_height = "Metal1:\n  index: 8\n  type: 0\n  z: 0\n  color: [1, 0, 0, 1]\n";

    // The GDS path does not exist; the config error must win.
    let err = run(no_height, Path::new("/nonexistent/chip.gds"), bare_options(), &mut scene).unwrap_err();
    assert!(matches!(err, ImportError::ConfigMalformed(_)), "{err}");
    assert_eq!(scene, Scene::new());
}

#[test]
fn test_bad_input_leaves_host_untouched() {
    let dir = TempDir::new().unwrap();
    let mut scene = Scene::new();

    let err = run(ONE_LAYER, &dir.path().join("missing.gds"), ImportOptions::default(), &mut scene)
        .unwrap_err();
    assert!(matches!(err, ImportError::InputNotFound(_)));

    let garbage = dir.path().join("garbage.gds");
    std::fs::write(&garbage, b"\x00\x06\x00\x02\x02\x58\x00").unwrap();
    let err = run(ONE_LAYER, &garbage, ImportOptions::default(), &mut scene).unwrap_err();
    assert!(matches!(err, ImportError::InputMalformed { .. }), "{err}");

    assert_eq!(scene, Scene::new());
}

#[test]
fn test_z_scale_applies_to_elevation_and_thickness() {
    let dir = TempDir::new().unwrap();
    let gds = three_layer_gds(&dir);
    let mut scene = Scene::new();
    let options = ImportOptions {
        z_scale: 2.0,
        ..bare_options()
    };

    run(THREE_LAYERS, &gds, options, &mut scene).unwrap();
    let (lo, hi) = scene.find_object("LVia1").unwrap().mesh.z_range().unwrap();
    assert_relative_eq!(lo, 3.0);
    assert_relative_eq!(hi, 4.0);
}

#[test]
fn test_collection_and_scene_setup() {
    let dir = TempDir::new().unwrap();
    let gds = three_layer_gds(&dir);
    let mut scene = Scene::new();

    let report = run(THREE_LAYERS, &gds, ImportOptions::default(), &mut scene).unwrap();
    assert_eq!(report.imported_count(), 3);
    let (width, height) = report.extent.unwrap();
    assert_relative_eq!(width, 40.0, epsilon = 1e-9);
    assert_relative_eq!(height, 20.0, epsilon = 1e-9);

    let collection = scene.find_collection("three").unwrap();
    assert_eq!(report.collection, Some(collection.id));
    // Base plate plus one object per layer.
    assert_eq!(scene.objects_in(collection.id).count(), 4);

    let camera = scene.camera.as_ref().unwrap();
    assert_relative_eq!(camera.location[0], 20.0, epsilon = 1e-9);
    assert_relative_eq!(camera.location[1], 10.0, epsilon = 1e-9);
    assert_relative_eq!(camera.location[2], 200.0);
    assert!(scene.find_object("ChipBase").is_some());
}

#[test]
fn test_strict_mode_aborts_without_rollback() {
    let dir = TempDir::new().unwrap();
    let gds = three_layer_gds(&dir);
    let mut host = FailingHost {
        scene: Scene::new(),
        reject: "Via1",
    };

    let err = run(THREE_LAYERS, &gds, bare_options(), &mut host).unwrap_err();
    assert!(matches!(err, ImportError::HostAdapterFailure { .. }), "{err}");
    // Metal1 came first and stays; Metal2 was never reached.
    assert!(host.scene.find_object("LMetal1").is_some());
    assert!(host.scene.find_object("LMetal2").is_none());
}

#[test]
fn test_resilient_mode_continues() {
    let dir = TempDir::new().unwrap();
    let gds = three_layer_gds(&dir);
    let mut host = FailingHost {
        scene: Scene::new(),
        reject: "Via1",
    };
    let options = ImportOptions {
        mode: FailureMode::Resilient,
        ..bare_options()
    };

    let report = run(THREE_LAYERS, &gds, options, &mut host).unwrap();
    assert_eq!(report.imported_count(), 2);

    let failures: Vec<_> = report.failures().collect();
    assert_eq!(failures.len(), 1);
    assert_eq!(failures[0].layer, "Via1");
    assert!(matches!(
        failures[0].outcome,
        LayerOutcome::Failed {
            stage: LayerStage::Deliver,
            error: ImportError::HostAdapterFailure { .. }
        }
    ));
    assert!(host.scene.find_object("LMetal2").is_some());
}
