//! Extract a mosaic from a full survey cube, or rebuild a derived HI species
//! from its correction catalog.
//!
//! ```bash
//! make-mosaic /data/lab/hi/LAB_skymap_HI_line_image.fits --config mosaic.toml -v
//! ```

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Parser;
use log::{info, warn};

use survey_mosaic::{Config, Extraction, MosaicExtractor, Observation};

#[derive(Parser)]
#[command(name = "make-mosaic")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Survey cube to read
    #[arg(value_name = "INPUT")]
    input: PathBuf,

    /// TOML configuration file
    #[arg(short, long, value_name = "FILE")]
    config: PathBuf,

    /// Replace an existing output file
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
    let mut extractor = MosaicExtractor::from_config(&config)?;
    extractor.overwrite |= cli.overwrite;
    extractor.preflight()?;

    let obs = Observation::load(&cli.input, config.observation.clone())
        .with_context(|| format!("Failed to read survey cube: {}", cli.input.display()))?;
    match extractor.run(obs)? {
        Extraction::Written(path) => info!("Mosaic written to {}", path.display()),
        Extraction::Skipped => warn!(
            "No mosaic written for {}",
            config.observation.stem()
        ),
    }
    Ok(())
}
