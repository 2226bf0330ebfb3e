//! The mosaic extraction pipeline.

use std::path::{Path, PathBuf};

use log::info;
use ndarray::ArrayD;

use crate::catalog::{read_catalog, reconstruct, Reconstruction};
use crate::config::Config;
use crate::crop::crop;
use crate::error::{Error, Result};
use crate::fits::{write_fits, Header, Verify};
use crate::metadata::synthesize_header;
use crate::observation::Observation;
use crate::preflight::{check_output, require_input};
use crate::region::{resolve_region, RegionRequest};

/// What an extraction produced.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Extraction {
    Written(PathBuf),
    /// Nothing was written; the reason has been logged.
    Skipped,
}

/// Crops a survey cube to a region, or rebuilds a derived species from its
/// correction catalog, and writes the result.
#[derive(Debug, Clone)]
pub struct MosaicExtractor {
    pub output: PathBuf,
    /// Correction catalog. Required for derived species; when set for any
    /// other species the cube goes through reconstruction, which skips it.
    pub catalog: Option<PathBuf>,
    pub request: RegionRequest,
    pub overwrite: bool,
}

impl MosaicExtractor {
    pub fn new(output: impl Into<PathBuf>, request: RegionRequest) -> Self {
        MosaicExtractor {
            output: output.into(),
            catalog: None,
            request,
            overwrite: false,
        }
    }

    pub fn with_catalog(mut self, catalog: impl Into<PathBuf>) -> Self {
        self.catalog = Some(catalog.into());
        self
    }

    pub fn overwrite(mut self, overwrite: bool) -> Self {
        self.overwrite = overwrite;
        self
    }

    /// Resolve output and catalog paths from `config`.
    pub fn from_config(config: &Config) -> Result<Self> {
        let mut extractor = MosaicExtractor::new(config.mosaic_path()?, config.region.request())
            .overwrite(config.output.overwrite);
        if config.observation.species.is_derived() {
            extractor = extractor.with_catalog(config.catalog_path()?);
        }
        Ok(extractor)
    }

    /// Existence checks that must pass before any array work.
    pub fn preflight(&self) -> Result<()> {
        check_output(&self.output, self.overwrite)?;
        if let Some(catalog) = &self.catalog {
            require_input(catalog)?;
        }
        Ok(())
    }

    /// Reconstruct when a catalog is set or the species is derived, crop
    /// otherwise. [`Extraction::Skipped`] means reconstruction refused the
    /// species and nothing was written.
    pub fn run(&self, obs: Observation) -> Result<Extraction> {
        self.preflight()?;
        let species = obs.identity.species;

        if species.is_derived() || self.catalog.is_some() {
            let catalog = self.catalog.as_deref().ok_or_else(|| {
                Error::Config(format!("{species} needs a correction catalog"))
            })?;
            let records = read_catalog(catalog)?;
            let (cube, mut header) = obs.into_cube();
            return match reconstruct(cube, species, &records)? {
                Reconstruction::Applied { cube, metadata } => {
                    header.merge(metadata);
                    self.write(&header, &cube)
                }
                Reconstruction::Unsupported { .. } => Ok(Extraction::Skipped),
            };
        }

        let region = resolve_region(&obs, &self.request)?;
        let cropped = crop(&obs, &region)?;
        let header = synthesize_header(&obs, &region, &cropped);
        self.write(&header, &cropped.data)
    }

    fn write(&self, header: &Header, data: &ArrayD<f32>) -> Result<Extraction> {
        info!("Writing data to a fits file in...");
        write_fits(&self.output, header, &data.view(), Verify::Fix)?;
        info!("{}", parent_display(&self.output));
        info!("Done");
        Ok(Extraction::Written(self.output.clone()))
    }
}

fn parent_display(path: &Path) -> String {
    path.parent()
        .map(|p| p.display().to_string())
        .unwrap_or_default()
}
