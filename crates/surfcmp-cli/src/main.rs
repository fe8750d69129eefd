//! surfcmp CLI — compare volumetric surface-detection methods on one region.

use clap::{Args, Parser, Subcommand};
use rand::Rng;
use std::path::{Path, PathBuf};

use surfcmp::{
    compare, derive_key, run_comparison, ArtifactWriter, MethodTable, PointCloud, SharedParams,
    VirtualVolume,
};

mod detectors;

type CliError = Box<dyn std::error::Error>;
type CliResult<T> = Result<T, CliError>;

#[derive(Parser)]
#[command(name = "surfcmp")]
#[command(about = "Compare volumetric surface-detection methods on one scan region")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run two methods over one region and score their agreement.
    Compare(CompareArgs),

    /// Score two point-cloud PLY files directly.
    Score {
        /// First cloud (PLY with x y z nx ny nz).
        cloud1: PathBuf,
        /// Second cloud.
        cloud2: PathBuf,
    },

    /// Print layout and extents of a volume directory.
    VolumeInfo {
        /// Directory of TIFF tiles.
        volume: PathBuf,
    },

    /// Print the experiment key for a region.
    DeriveKey {
        #[arg(long)]
        center_z: usize,
        #[arg(long)]
        center_y: usize,
        #[arg(long)]
        center_x: usize,
        #[arg(long)]
        radius: usize,
    },
}

#[derive(Debug, Clone, Args)]
struct CompareArgs {
    /// Directory of TIFF tiles forming the scan volume.
    #[arg(long)]
    volume: PathBuf,

    /// First method name (method-table entry).
    #[arg(long, default_value = "gradient-shell")]
    method_a: String,

    /// Second method name.
    #[arg(long, default_value = "gradient-shell")]
    method_b: String,

    /// Region radius in voxels; the extracted cube has side 2 * radius.
    #[arg(long)]
    radius: usize,

    /// Region center Z; sampled at random when the center is omitted.
    #[arg(long)]
    center_z: Option<usize>,

    /// Region center Y.
    #[arg(long)]
    center_y: Option<usize>,

    /// Region center X.
    #[arg(long)]
    center_x: Option<usize>,

    /// Method-table JSON (method name -> tunables). When omitted, both
    /// requested methods get stock tunables.
    #[arg(long)]
    methods: Option<PathBuf>,

    /// Compute device selector handed to the detector.
    #[arg(long, default_value = "cpu")]
    device: String,

    /// Output directory for point-cloud and mask artifacts.
    #[arg(long, default_value = "artifacts")]
    out: PathBuf,
}

fn main() -> CliResult<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Compare(args) => run_compare(&args),
        Commands::Score { cloud1, cloud2 } => run_score(&cloud1, &cloud2),
        Commands::VolumeInfo { volume } => run_volume_info(&volume),
        Commands::DeriveKey {
            center_z,
            center_y,
            center_x,
            radius,
        } => {
            println!(
                "{}",
                derive_key(&SharedParams {
                    center: [center_z, center_y, center_x],
                    radius,
                })
            );
            Ok(())
        }
    }
}

// ── compare ───────────────────────────────────────────────────────────

fn run_compare(args: &CompareArgs) -> CliResult<()> {
    let table = match &args.methods {
        Some(path) => MethodTable::from_json_file(path)?,
        None => MethodTable::with_defaults(&[args.method_a.as_str(), args.method_b.as_str()]),
    };

    let center = match (args.center_z, args.center_y, args.center_x) {
        (Some(z), Some(y), Some(x)) => [z, y, x],
        (None, None, None) => sample_center(&args.volume, args.radius)?,
        _ => {
            return Err("pass all of --center-z/--center-y/--center-x, or none to sample \
                        a random center"
                .into())
        }
    };
    let shared = SharedParams {
        center,
        radius: args.radius,
    };
    tracing::info!(?center, radius = args.radius, "comparing at region");

    let outcome = run_comparison(
        &args.volume,
        &args.method_a,
        &args.method_b,
        &shared,
        &args.device,
        &table,
        &detectors::GradientShellDetector,
        &ArtifactWriter::new(&args.out),
    )?;
    println!("{}", serde_json::to_string_pretty(&outcome)?);
    Ok(())
}

/// Sample a center uniformly at random, at least `radius` away from every
/// boundary of the opened volume's true extents.
fn sample_center(volume_dir: &Path, radius: usize) -> CliResult<[usize; 3]> {
    let volume = VirtualVolume::open(volume_dir)?;
    let extents = volume.extents();
    let mut rng = rand::thread_rng();
    let mut center = [0usize; 3];
    for axis in 0..3 {
        if extents[axis] < 2 * radius {
            return Err(format!(
                "volume extent {} on axis {axis} cannot fit a region of radius {radius}",
                extents[axis]
            )
            .into());
        }
        center[axis] = rng.gen_range(radius..=extents[axis] - radius);
    }
    Ok(center)
}

// ── score ─────────────────────────────────────────────────────────────

fn run_score(cloud1: &Path, cloud2: &Path) -> CliResult<()> {
    let a = PointCloud::read_ply(cloud1)?;
    let b = PointCloud::read_ply(cloud2)?;
    tracing::info!(
        points1 = a.len(),
        points2 = b.len(),
        "scoring point clouds"
    );
    let metrics = compare(&a, &b)?;
    println!("{}", serde_json::to_string_pretty(&metrics)?);
    Ok(())
}

// ── volume-info ───────────────────────────────────────────────────────

fn run_volume_info(dir: &Path) -> CliResult<()> {
    let volume = VirtualVolume::open(dir)?;
    let extents = volume.extents();
    println!("volume: {}", dir.display());
    println!("  layout:          {:?}", volume.layout_kind());
    println!(
        "  extents (Z,Y,X): {} x {} x {}",
        extents[0], extents[1], extents[2]
    );
    println!("  tiles:           {}", volume.tile_count());
    println!("  bits per sample: {}", volume.bits_per_sample());
    println!("  max sample:      {}", volume.max_sample_value());
    Ok(())
}
