//! chartkap: Calibrate scanned nautical charts and produce KAP/BSB products.
//!
//! Reads survey data from the chart database, drives ImageMagick and
//! `imgkap` through the production workflows and records what has been
//! produced so batch runs can be repeated safely.
//!
//! # Usage
//!
//! ```text
//! chartkap [--config FILE] [--database FILE] [--lock FILE] [-v] [-a ACTION] [-p GPX] [CHART]
//! ```
//!
//! Without an action every pending chart and inset is processed under
//! the run lock.

#![allow(clippy::print_stdout, clippy::print_stderr)]

use std::path::PathBuf;
use std::process::ExitCode;

use chartkap_io::{
    ChartkapConfig, Collaborators, FsArtifactStore, GpxTrackFile, ImageMagick, Imgkap,
    PipelineOrchestrator, RunLock, SqliteRepository, SystemClock,
};
use chartkap_pipeline::{ChartNumber, ChartNumberError};
use clap::error::ErrorKind;
use clap::{CommandFactory, Parser, ValueEnum};

/// Calibrate scanned nautical charts and produce KAP/BSB products.
#[derive(Parser)]
#[command(name = "chartkap", version)]
struct Cli {
    /// Configuration file (JSON). Built-in defaults apply without one.
    #[arg(long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Chart database, overriding the configuration.
    #[arg(long, value_name = "FILE")]
    database: Option<PathBuf>,

    /// Run lock file, overriding the configuration.
    #[arg(long, value_name = "FILE")]
    lock: Option<PathBuf>,

    /// Log debug detail.
    #[arg(short, long)]
    verbose: bool,

    /// What to do.
    #[arg(short, long, value_enum, ignore_case = true, default_value_t = Action::ProduceNew)]
    action: Action,

    /// GPX track to import with `import-boundary`.
    #[arg(short = 'p', long = "gpx", value_name = "GPX")]
    gpx: Option<PathBuf>,

    /// Chart number (digits only).
    #[arg(value_parser = parse_chart_number)]
    chart: Option<ChartNumber>,
}

#[derive(Clone, Copy, PartialEq, Eq, ValueEnum)]
enum Action {
    /// Produce every pending chart, then crop every pending inset.
    #[value(alias = "prodnew")]
    ProduceNew,
    /// Produce one chart regardless of its marker.
    #[value(alias = "kap")]
    ProduceOne,
    /// Replace a chart's boundary polygon from a GPX track.
    #[value(alias = "ply")]
    ImportBoundary,
    /// Pre-rotate the scan, make thumbnails and corner cut-outs.
    Preprocess,
    /// Cut the four corners out of the chart image.
    Corners,
    /// Crop the chart's pending insets.
    #[value(alias = "crop")]
    CropInsets,
}

fn parse_chart_number(value: &str) -> Result<ChartNumber, ChartNumberError> {
    ChartNumber::parse(value)
}

/// Abort with a usage error when `value` is missing.
fn required<'a, T>(value: Option<&'a T>, what: &str, action: Action) -> &'a T {
    value.unwrap_or_else(|| {
        let name = action
            .to_possible_value()
            .map_or_else(String::new, |v| v.get_name().to_owned());
        Cli::command()
            .error(
                ErrorKind::MissingRequiredArgument,
                format!("action `{name}` requires {what}"),
            )
            .exit()
    })
}

fn init_logging(verbose: bool) {
    let level = if verbose { "debug" } else { "info" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match run(&cli) {
        Ok(code) => code,
        Err(e) => {
            log::error!("{e}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: &Cli) -> Result<ExitCode, Box<dyn std::error::Error>> {
    let chart = match cli.action {
        Action::ProduceNew => None,
        action => {
            if action == Action::ImportBoundary {
                required(cli.gpx.as_ref(), "a GPX track (-p)", action);
            }
            Some(required(cli.chart.as_ref(), "a CHART number", action))
        }
    };

    let mut config = match &cli.config {
        Some(path) => ChartkapConfig::load(path)?,
        None => ChartkapConfig::default(),
    };
    if let Some(database) = &cli.database {
        config.database.clone_from(database);
    }
    if let Some(lock) = &cli.lock {
        config.lock_path.clone_from(lock);
    }

    let _lock = if cli.action == Action::ProduceNew {
        let Some(lock) = RunLock::try_acquire(&config.lock_path)? else {
            log::info!(
                "another run holds {}; nothing to do",
                config.lock_path.display()
            );
            return Ok(ExitCode::SUCCESS);
        };
        Some(lock)
    } else {
        None
    };

    let repository = SqliteRepository::open(&config.database)?;
    let raster = ImageMagick::new(config.tools.convert.clone());
    let encoder = Imgkap::new(config.tools.imgkap.clone());
    let orchestrator = PipelineOrchestrator::new(
        &config,
        Collaborators {
            repository: &repository,
            raster: &raster,
            encoder: &encoder,
            tracks: &GpxTrackFile,
            artifacts: &FsArtifactStore,
            clock: &SystemClock,
        },
    );

    let Some(chart) = chart else {
        let summary = orchestrator.run_batch()?;
        for (chart, reason) in &summary.failed {
            println!("failed {chart}: {reason}");
        }
        println!("{summary}");
        return Ok(ExitCode::SUCCESS);
    };

    match cli.action {
        Action::ProduceNew | Action::ProduceOne => {
            let product = orchestrator.produce_base(chart)?;
            println!("{}", product.kap.display());
        }
        Action::ImportBoundary => {
            let gpx = required(cli.gpx.as_ref(), "a GPX track (-p)", cli.action);
            let import = orchestrator.import_boundary(chart, gpx)?;
            println!(
                "imported {} points for chart {chart}, status {}",
                import.points, import.status
            );
        }
        Action::Preprocess => {
            for path in orchestrator.preprocess(chart)? {
                println!("{}", path.display());
            }
        }
        Action::Corners => {
            for path in orchestrator.generate_corners(chart)? {
                println!("{}", path.display());
            }
        }
        Action::CropInsets => {
            let outcome = orchestrator.crop_insets(chart)?;
            for inset in &outcome.cropped {
                println!("cropped inset {inset}");
            }
            for (inset, reason) in &outcome.skipped {
                println!("skipped inset {inset}: {reason}");
            }
        }
    }
    Ok(ExitCode::SUCCESS)
}
