//! Tropical cyclone diagnostics service.
//!
//! Reads a model entries file, runs every entry against its model's GRIB2
//! output and a distance-to-land lookup table, and writes one diagnostics
//! file per entry.

mod grib;

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

use cylindrical_grid::LandLUT;
use tc_diag_engine::{model_entries_from_file, Driver};

use grib::Grib2Loader;

#[derive(Parser, Debug)]
#[command(name = "tc-diag")]
#[command(about = "Compute tropical cyclone diagnostics from model output")]
struct Args {
    /// Model entries YAML file
    #[arg(env = "TC_DIAG_MODEL_ENTRIES")]
    model_entry_file: PathBuf,

    /// Distance-to-land lookup table
    #[arg(env = "TC_DIAG_LAND_LUT")]
    land_lut_file: PathBuf,

    /// Log computation failures and store missing values instead of
    /// stopping the run
    #[arg(long)]
    suppress_exceptions: bool,

    /// Log level
    #[arg(long, default_value = "info", env = "TC_DIAG_LOG_LEVEL")]
    log_level: String,

    /// Emit logs as JSON
    #[arg(long)]
    json: bool,
}

fn main() -> Result<()> {
    // Load environment from .env file if present
    dotenvy::dotenv().ok();

    let args = Args::parse();
    init_tracing(&args)?;

    info!(
        model_entry_file = %args.model_entry_file.display(),
        land_lut_file = %args.land_lut_file.display(),
        suppress_exceptions = args.suppress_exceptions,
        "Starting tc-diag"
    );

    let land_lut = LandLUT::from_file(&args.land_lut_file)
        .with_context(|| format!("failed to load land LUT {}", args.land_lut_file.display()))?;
    let entries = model_entries_from_file(&args.model_entry_file).with_context(|| {
        format!(
            "failed to load model entries {}",
            args.model_entry_file.display()
        )
    })?;
    info!(entries = entries.len(), "Loaded model entries");

    let loader = Grib2Loader;
    let written = Driver::new(&land_lut, &loader)
        .suppress_exceptions(args.suppress_exceptions)
        .run(&entries)
        .context("diagnostic run failed")?;

    for path in &written {
        info!(path = %path.display(), "Diagnostics written");
    }
    info!(
        written = written.len(),
        skipped = entries.len() - written.len(),
        "Finished tc-diag"
    );
    Ok(())
}

/// `RUST_LOG` takes precedence over `--log-level`.
fn init_tracing(args: &Args) -> Result<()> {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));
    let builder = fmt().with_env_filter(filter).with_target(true).with_level(true);

    if args.json {
        builder.json().try_init()
    } else {
        builder.try_init()
    }
    .map_err(|e| anyhow::anyhow!("failed to initialize tracing: {}", e))
}
