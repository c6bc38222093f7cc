//! # chipstack
//!
//! Command-line front end: import a GDS-II layout into a 3D scene using a PDK
//! layer stack, and inspect the built-in stacks.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use clap::{ArgAction, Args, Parser, Subcommand};

use chipstack_core::geometry::CropRegion;
use chipstack_core::layer::LayerStack;
use chipstack_import::{FailureMode, ImportError, ImportOptions, Importer, LayerOutcome};
use chipstack_io::{layer_stack_to_yaml, load_layer_stack, ColorScheme, Pdk};
use chipstack_scene::{export, ExportFormat, Scene};

#[derive(Parser)]
#[command(version, about = "Extrude GDS-II layouts into 3D using a PDK layer stack")]
struct Cli {
    /// Increase log verbosity (-v info, -vv debug, -vvv trace).
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Import a GDS-II file and write the resulting scene.
    Import(ImportArgs),
    /// Print the layer stack that an import would use.
    Layers(LayersArgs),
    /// List the built-in PDKs.
    Pdks,
}

#[derive(Args)]
struct StackArgs {
    /// Built-in PDK whose layer stack to use.
    #[arg(long, default_value_t = Pdk::default())]
    pdk: Pdk,
    /// Custom layer-stack YAML file; overrides --pdk.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,
    /// Color scheme YAML file applied on top of the stack.
    #[arg(long, value_name = "FILE")]
    colors: Option<PathBuf>,
}

#[derive(Args)]
struct ImportArgs {
    /// The GDS-II layout to import.
    input: PathBuf,
    /// Output file; `.obj` writes a mesh with a sibling `.mtl`, `.json` the scene document.
    #[arg(short, long)]
    output: PathBuf,
    #[command(flatten)]
    stack: StackArgs,
    /// Output unit in metres (1e-6 for micrometres).
    #[arg(long, default_value_t = 1e-6)]
    unit_scale: f64,
    /// Scale factor for layer elevations and thicknesses.
    #[arg(long, default_value_t = 1.0)]
    z_scale: f64,
    /// Import only the region with lower-left corner (X, Y) and size W × H.
    #[arg(long, num_args = 4, value_names = ["X", "Y", "W", "H"], allow_negative_numbers = true)]
    crop: Option<Vec<f64>>,
    /// Do not group the imported objects into a collection.
    #[arg(long)]
    no_collection: bool,
    /// Do not add camera, light and base plate.
    #[arg(long)]
    no_scene: bool,
    /// Continue with the remaining layers when one fails.
    #[arg(long)]
    keep_going: bool,
}

#[derive(Args)]
struct LayersArgs {
    #[command(flatten)]
    stack: StackArgs,
    /// Print the stack as layer-stack YAML instead of a table.
    #[arg(long)]
    yaml: bool,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let level = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match cli.command {
        Command::Import(args) => run_import(args),
        Command::Layers(args) => run_layers(args),
        Command::Pdks => {
            for pdk in Pdk::ALL {
                println!("{:<12} {} - {}", pdk.id(), pdk.display_name(), pdk.description());
            }
            Ok(())
        }
    }
}

// ── Commands ─────────────────────────────────────────────────────────

fn run_import(args: ImportArgs) -> anyhow::Result<()> {
    // Settle everything that can fail before the layout is opened.
    let stack = resolve_stack(&args.stack)?;
    let crop = args.crop.as_deref().map(crop_region).transpose()?;
    ExportFormat::from_path(&args.output)
        .with_context(|| format!("Cannot write {}", args.output.display()))?;

    let options = ImportOptions {
        unit_scale: args.unit_scale,
        z_scale: args.z_scale,
        crop,
        create_collection: !args.no_collection,
        setup_scene: !args.no_scene,
        mode: if args.keep_going {
            FailureMode::Resilient
        } else {
            FailureMode::Strict
        },
    };

    let mut scene = Scene::new();
    let report = Importer::new(stack, options)
        .run(&args.input, &mut scene)
        .with_context(|| format!("Import of {} failed", args.input.display()))?;

    let written = export(&scene, &args.output)
        .with_context(|| format!("Failed to export scene to {}", args.output.display()))?;

    for layer in report.failures() {
        if let LayerOutcome::Failed { error, .. } = &layer.outcome {
            eprintln!("warning: layer {} not imported: {}", layer.layer, error);
        }
    }
    println!(
        "Imported {} layers from {}",
        report.imported_count(),
        file_name(&args.input)
    );
    for path in written {
        log::info!("Wrote {}", path.display());
    }
    Ok(())
}

fn run_layers(args: LayersArgs) -> anyhow::Result<()> {
    let stack = resolve_stack(&args.stack)?;

    if args.yaml {
        print!("{}", layer_stack_to_yaml(&stack)?);
        return Ok(());
    }

    println!(
        "{:<12} {:>9} {:>9} {:>9}  {}",
        "LAYER", "GDS", "Z", "HEIGHT", "COLOR"
    );
    for spec in stack.iter() {
        let [r, g, b, a] = spec.color.to_array();
        println!(
            "{:<12} {:>9} {:>9.3} {:>9.3}  ({:.2}, {:.2}, {:.2}, {:.2})",
            spec.name,
            spec.key.to_string(),
            spec.z,
            spec.height,
            r,
            g,
            b,
            a
        );
    }
    println!("{} layers, total height {:.3}", stack.layer_count(), stack.total_height());
    Ok(())
}

// ── Helpers ──────────────────────────────────────────────────────────

fn resolve_stack(args: &StackArgs) -> anyhow::Result<LayerStack> {
    let mut stack = match &args.config {
        Some(path) => load_layer_stack(path).map_err(ImportError::from)?,
        None => args
            .pdk
            .layer_stack()
            .with_context(|| format!("Built-in stack for {} is invalid", args.pdk.display_name()))?,
    };

    if let Some(path) = &args.colors {
        let scheme = ColorScheme::load(path)
            .with_context(|| format!("Failed to load color scheme {}", path.display()))?;
        scheme
            .apply(&mut stack)
            .with_context(|| format!("Color scheme {} does not fit the stack", path.display()))?;
    }
    Ok(stack)
}

fn crop_region(values: &[f64]) -> anyhow::Result<CropRegion> {
    let &[x, y, w, h] = values else {
        bail!("--crop takes exactly four values: X Y W H");
    };
    CropRegion::from_origin_size(x, y, w, h).context("Invalid crop region")
}

fn file_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}
