//! Command-line interface for the scan pipeline.

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use log::{error, info, warn};
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};
use std::time::Instant;

use crate::core::loaders::{load_recording, Recording};
use crate::core::recorder::convert_polar_recording;
use crate::core::writers::{write_ply, write_segments_csv};
use crate::processors::{batch, export, linear, segmentation, spherical, visibility};
use crate::PipelineConfig;

#[derive(Parser)]
#[command(name = "urg-pipeline")]
#[command(about = "Rangefinder scan to point cloud pipeline", version)]
pub struct Cli {
    /// Path to YAML config file
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Increase verbosity
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Stack scans along z into a PLY point cloud
    Linear {
        /// Input recording CSV
        input: PathBuf,
        /// Output PLY file
        #[arg(short, long)]
        output: PathBuf,
        /// First scan (inclusive)
        #[arg(long)]
        start_scan: Option<usize>,
        /// Last scan (exclusive), -1 for the end
        #[arg(long, allow_hyphen_values = true)]
        end_scan: Option<i64>,
        /// Space scans by capture time
        #[arg(long)]
        time_dependent: bool,
        /// Minimum distance from the sensor (0 disables)
        #[arg(long)]
        cull_distance: Option<f32>,
    },

    /// Sweep scans of a rotating sensor onto a sphere
    Spherical {
        /// Input recording CSV
        input: PathBuf,
        /// Output PLY file
        #[arg(short, long)]
        output: PathBuf,
        /// Period at which to start
        #[arg(long)]
        starting_period: Option<f32>,
        /// Number of periods, -1 for all
        #[arg(long, allow_hyphen_values = true)]
        n_periods: Option<f32>,
        /// Seam alignment angle (degrees)
        #[arg(long, allow_hyphen_values = true)]
        alignment_angle: Option<f32>,
        /// Keep scans the sensor emitted twice
        #[arg(long)]
        keep_duplicates: bool,
    },

    /// Split points into opaque and transparent PLY files
    Classify {
        /// Input recording CSV
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output file prefix (defaults to the input file stem)
        #[arg(long)]
        prefix: Option<String>,
        /// Thin out nearby transparent points
        #[arg(long)]
        resample: bool,
    },

    /// Detect people and write a segment summary CSV
    Segment {
        /// Input recording CSV
        input: PathBuf,
        /// Output CSV (defaults to <input>_segments.csv)
        #[arg(short, long)]
        output: Option<PathBuf>,
        /// Minimum in-bounds readings per scan
        #[arg(long)]
        min_point_count: Option<usize>,
    },

    /// Export buffered windows around detected people
    Export {
        /// Input recording CSV
        input: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
        /// Output file prefix (defaults to the input file stem)
        #[arg(long)]
        prefix: Option<String>,
    },

    /// Segment and export every recording in a directory
    Batch {
        /// Directory containing recording CSVs
        input_dir: PathBuf,
        /// Output directory
        #[arg(short, long)]
        output_dir: PathBuf,
    },

    /// Convert a polar capture (timestamp, r0, theta0, ...) into a recording
    Record {
        /// Polar capture CSV
        input: PathBuf,
        /// Output recording CSV
        output: PathBuf,
    },
}

/// Create a spinner for indeterminate operations
fn create_spinner(message: &str) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    let style = ProgressStyle::default_spinner()
        .template("{spinner:.green} {msg}")
        .unwrap_or_else(|_| ProgressStyle::default_spinner());
    pb.set_style(style);
    pb.set_message(message.to_string());
    pb.enable_steady_tick(std::time::Duration::from_millis(100));
    pb
}

/// Print a summary box
fn print_summary(title: &str, items: &[(&str, String)]) {
    println!();
    println!("╔══════════════════════════════════════════════════════════════╗");
    println!("║ {:<62} ║", title);
    println!("╠══════════════════════════════════════════════════════════════╣");
    for (key, value) in items {
        let display_value = if value.chars().count() > 39 {
            let head: String = value.chars().take(36).collect();
            format!("{}...", head)
        } else {
            value.clone()
        };
        println!("║ {:<20}: {:<39} ║", key, display_value);
    }
    println!("╚══════════════════════════════════════════════════════════════╝");
    println!();
}

pub fn run() {
    let cli = Cli::parse();

    // Logging first so config problems are reported
    env_logger::Builder::new()
        .filter_level(match cli.verbose {
            0 => log::LevelFilter::Warn,
            1 => log::LevelFilter::Info,
            _ => log::LevelFilter::Debug,
        })
        .format_timestamp_secs()
        .init();

    let config = match &cli.config {
        Some(path) => match PipelineConfig::from_yaml(path) {
            Ok(cfg) => {
                info!("Loaded config from: {}", path.display());
                cfg
            }
            Err(e) => {
                warn!(
                    "Failed to load config from {}: {}, using defaults",
                    path.display(),
                    e
                );
                PipelineConfig::default()
            }
        },
        None => PipelineConfig::default(),
    };

    let result = match cli.command {
        Commands::Linear {
            input,
            output,
            start_scan,
            end_scan,
            time_dependent,
            cull_distance,
        } => {
            let mut config = config;
            let selection = &mut config.linear.selection;
            selection.start_scan = start_scan.unwrap_or(selection.start_scan);
            selection.end_scan = end_scan.unwrap_or(selection.end_scan);
            config.linear.time_dependent |= time_dependent;
            if let Some(cull) = cull_distance {
                config.linear.cull_distance = cull;
            }
            cmd_linear(&input, &output, &config)
        }
        Commands::Spherical {
            input,
            output,
            starting_period,
            n_periods,
            alignment_angle,
            keep_duplicates,
        } => {
            let mut config = config;
            let sph = &mut config.spherical;
            sph.starting_period = starting_period.unwrap_or(sph.starting_period);
            sph.n_periods = n_periods.unwrap_or(sph.n_periods);
            sph.alignment_angle_deg = alignment_angle.unwrap_or(sph.alignment_angle_deg);
            if keep_duplicates {
                sph.cull_duplicate_scans = false;
            }
            cmd_spherical(&input, &output, &config)
        }
        Commands::Classify {
            input,
            output_dir,
            prefix,
            resample,
        } => {
            let mut config = config;
            config.classify.resample |= resample;
            cmd_classify(&input, &output_dir, prefix, &config)
        }
        Commands::Segment {
            input,
            output,
            min_point_count,
        } => {
            let mut config = config;
            if let Some(min) = min_point_count {
                config.segment.min_point_count = min;
            }
            cmd_segment(&input, output, &config)
        }
        Commands::Export {
            input,
            output_dir,
            prefix,
        } => cmd_export(&input, &output_dir, prefix, &config),
        Commands::Batch {
            input_dir,
            output_dir,
        } => cmd_batch(&input_dir, &output_dir, &config),
        Commands::Record { input, output } => cmd_record(&input, &output),
    };

    if let Err(e) = result {
        error!("{:#}", e);
        std::process::exit(1);
    }
}

fn load(input: &Path, config: &PipelineConfig) -> Result<Recording> {
    let spinner = create_spinner("Loading recording...");
    let recording = load_recording(input, &config.ingest)
        .with_context(|| format!("failed to load recording {}", input.display()));
    spinner.finish_and_clear();
    recording
}

fn file_prefix(input: &Path, prefix: Option<String>) -> String {
    prefix.unwrap_or_else(|| {
        input
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_else(|| "recording".to_string())
    })
}

fn cmd_linear(input: &Path, output: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let recording = load(input, config)?;

    let projection = linear::project_linear(&recording, &config.linear);
    for warning in &projection.warnings {
        println!("Warning: {}", warning);
    }

    write_ply(output, &projection.cloud)?;

    print_summary(
        "Linear Projection Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output PLY", output.display().to_string()),
            ("Scans", recording.len().to_string()),
            ("Points", projection.cloud.len().to_string()),
            ("Time dependent", config.linear.time_dependent.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_spherical(input: &Path, output: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let recording = load(input, config)?;

    let spinner = create_spinner("Projecting onto sphere...");
    let cloud = spherical::project_spherical(&recording, &config.spherical);
    spinner.finish_and_clear();
    let cloud = cloud.context("spherical projection failed")?;

    write_ply(output, &cloud)?;

    print_summary(
        "Spherical Projection Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output PLY", output.display().to_string()),
            ("Points", cloud.len().to_string()),
            ("Starting period", config.spherical.starting_period.to_string()),
            ("Periods", config.spherical.n_periods.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_classify(
    input: &Path,
    output_dir: &Path,
    prefix: Option<String>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let recording = load(input, config)?;
    let prefix = file_prefix(input, prefix);

    let clouds = visibility::classify(&recording, &config.classify);
    for warning in &clouds.warnings {
        println!("Warning: {}", warning);
    }

    let opaque_path = output_dir.join(format!("{}_opaque.ply", prefix));
    let ghost_path = output_dir.join(format!("{}_transparent.ply", prefix));
    write_ply(&opaque_path, &clouds.opaque)?;
    write_ply(&ghost_path, &clouds.ghosted)?;

    print_summary(
        "Classification Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Opaque points", clouds.opaque.len().to_string()),
            ("Transparent points", clouds.ghosted.len().to_string()),
            ("Opaque PLY", opaque_path.display().to_string()),
            ("Transparent PLY", ghost_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_segment(input: &Path, output: Option<PathBuf>, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();
    let recording = load(input, config)?;

    let output = output.unwrap_or_else(|| {
        let prefix = file_prefix(input, None);
        input.with_file_name(format!("{}_segments.csv", prefix))
    });

    let segments = segmentation::segment_people(&recording, &config.segment);
    write_segments_csv(&output, &segments)?;

    let scans: usize = segments.iter().map(|s| s.scan_length).sum();
    print_summary(
        "Segmentation Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output CSV", output.display().to_string()),
            ("Scans", recording.len().to_string()),
            ("People found", segments.len().to_string()),
            ("Scans with people", scans.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_export(
    input: &Path,
    output_dir: &Path,
    prefix: Option<String>,
    config: &PipelineConfig,
) -> Result<()> {
    let start = Instant::now();
    let recording = load(input, config)?;
    let prefix = file_prefix(input, prefix);

    let segments = segmentation::segment_people(&recording, &config.segment);
    if segments.is_empty() {
        warn!("no people found in {}", input.display());
    }

    let spinner = create_spinner("Exporting windows...");
    let written = export::export_people(
        &recording,
        &segments,
        &config.export,
        &config.classify,
        output_dir,
        &prefix,
    );
    spinner.finish_and_clear();
    let (opaque_path, ghost_path) = written?;

    print_summary(
        "Export Complete",
        &[
            ("Input file", input.display().to_string()),
            ("People exported", segments.len().to_string()),
            ("Opaque PLY", opaque_path.display().to_string()),
            ("Transparent PLY", ghost_path.display().to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}

fn cmd_batch(input_dir: &Path, output_dir: &Path, config: &PipelineConfig) -> Result<()> {
    let start = Instant::now();

    let inputs = batch::find_recordings(input_dir)?;
    if inputs.is_empty() {
        bail!("no recordings found in {}", input_dir.display());
    }
    println!("Found {} recordings in {}", inputs.len(), input_dir.display());

    let spinner = create_spinner("Segmenting and exporting recordings...");
    let summary = batch::export_batch(&inputs, output_dir, config);
    spinner.finish_and_clear();

    let people: usize = summary.exported.iter().map(|o| o.n_people).sum();
    print_summary(
        "Batch Export Complete",
        &[
            ("Input directory", input_dir.display().to_string()),
            ("Output directory", output_dir.display().to_string()),
            ("Recordings", inputs.len().to_string()),
            ("Exported", summary.exported.len().to_string()),
            ("Failed", summary.failed.len().to_string()),
            ("People found", people.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );

    if !summary.failed.is_empty() {
        bail!("{} recordings failed", summary.failed.len());
    }
    Ok(())
}

fn cmd_record(input: &Path, output: &Path) -> Result<()> {
    let start = Instant::now();

    let reader = File::open(input)
        .map(BufReader::new)
        .with_context(|| format!("failed to open {}", input.display()))?;
    let writer = File::create(output)
        .map(BufWriter::new)
        .with_context(|| format!("failed to create {}", output.display()))?;

    let n_scans = convert_polar_recording(reader, writer)
        .with_context(|| format!("failed to convert {}", input.display()))?;

    print_summary(
        "Recording Complete",
        &[
            ("Input file", input.display().to_string()),
            ("Output file", output.display().to_string()),
            ("Scans", n_scans.to_string()),
            ("Duration", format!("{:.2?}", start.elapsed())),
        ],
    );
    Ok(())
}
