//! Split an extracted mosaic into contiguous sub-mosaics.
//!
//! ```bash
//! split-mosaic LAB_skymap_HI_line_image.fits --config mosaic.toml --parts 4
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::info;

use survey_mosaic::split::{split_mosaic, write_partitions, SplitAxis};
use survey_mosaic::{Config, Observation};

#[derive(Parser)]
#[command(name = "split-mosaic")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Mosaic to split
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Number of parts (overrides [split] parts)
    #[arg(short = 'n', long)]
    parts: Option<usize>,

    /// Split along longitude instead of the configured axis
    #[arg(long)]
    lon: bool,

    /// Replace existing partition files
    #[arg(long)]
    overwrite: bool,

    /// Verbosity level (-v for info, -vv for debug)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let log_level = match cli.verbose {
        0 => "warn",
        1 => "info",
        _ => "debug",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(log_level)).init();

    let config = Config::from_file(&cli.config)
        .with_context(|| format!("Failed to load config file: {}", cli.config.display()))?;
    let ntot = match cli.parts {
        Some(n) => n,
        None => config.parts()?,
    };
    let axis = if cli.lon {
        SplitAxis::Longitude
    } else {
        config.split.axis
    };
    let dir = config.split_dir()?;

    info!("Open file and get data...");
    let mosaic = Observation::load(&cli.input, config.observation.clone())
        .with_context(|| format!("Failed to read mosaic: {}", cli.input.display()))?;
    let parts = split_mosaic(&mosaic, ntot, axis)?;
    let paths = write_partitions(
        &parts,
        &mosaic.identity,
        dir,
        config.output.overwrite || cli.overwrite,
    )?;
    info!("Wrote {} partitions to {}", paths.len(), dir.display());
    Ok(())
}
