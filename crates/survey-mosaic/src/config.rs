//! TOML configuration for both pipelines.
//!
//! ```toml
//! [observation]
//! survey = "LAB"
//! mosaic = "skymap"
//! species = "HI"
//!
//! [region]            # every key optional; "INDEF" means the cube's extent
//! lon = 80.0
//! lat = 0.0
//! side = 10.0         # full side in degrees
//! z1 = -50000.0
//! z2 = "INDEF"
//!
//! [split]
//! parts = 4
//! axis = "lat"
//!
//! [output]
//! overwrite = false
//!
//! [paths]
//! lustre_lab_hi = "/data/lab/hi"
//! ```

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use serde::de::Error as _;
use serde::{Deserialize, Deserializer};

use crate::error::{Error, Result};
use crate::observation::Identity;
use crate::region::RegionRequest;
use crate::split::SplitAxis;
use crate::survey::{Species, Survey};

/// Root of a configuration file.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    pub observation: Identity,
    #[serde(default)]
    pub region: RegionConfig,
    #[serde(default)]
    pub split: SplitConfig,
    #[serde(default)]
    pub output: OutputConfig,
    /// Directory per purpose key, e.g. `lustre_lab_hi`.
    #[serde(default)]
    pub paths: BTreeMap<String, PathBuf>,
}

/// Region request as written by the user.
#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct RegionConfig {
    #[serde(default, deserialize_with = "indef")]
    pub lon: Option<f64>,
    #[serde(default, deserialize_with = "indef")]
    pub lat: Option<f64>,
    /// Full side of the square mosaic, degrees.
    #[serde(default, deserialize_with = "indef")]
    pub side: Option<f64>,
    #[serde(default, deserialize_with = "indef")]
    pub z1: Option<f64>,
    #[serde(default, deserialize_with = "indef")]
    pub z2: Option<f64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct SplitConfig {
    pub parts: Option<usize>,
    #[serde(default)]
    pub axis: SplitAxis,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Deserialize)]
pub struct OutputConfig {
    #[serde(default)]
    pub overwrite: bool,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum Setting {
    Number(f64),
    Text(String),
}

/// A number, or the legacy `"INDEF"` meaning "not given".
fn indef<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<f64>, D::Error> {
    match Option::<Setting>::deserialize(d)? {
        None => Ok(None),
        Some(Setting::Number(v)) => Ok(Some(v)),
        Some(Setting::Text(s)) if s.trim().eq_ignore_ascii_case("INDEF") => Ok(None),
        Some(Setting::Text(s)) => s
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| D::Error::custom(format!("expected a number or \"INDEF\", found {s:?}"))),
    }
}

impl RegionConfig {
    /// The request handed to the resolver; the side is halved here.
    pub fn request(&self) -> RegionRequest {
        RegionRequest {
            lon: self.lon,
            lat: self.lat,
            half_side: self.side.map(|s| s / 2.0),
            z1: self.z1,
            z2: self.z2,
        }
    }
}

impl FromStr for Config {
    type Err = Error;

    fn from_str(content: &str) -> Result<Self> {
        Ok(toml::from_str(content)?)
    }
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        content.parse()
    }

    /// Directory registered under `key`, matched case-insensitively.
    pub fn path(&self, key: &str) -> Result<&Path> {
        self.paths
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(key))
            .map(|(_, v)| v.as_path())
            .ok_or_else(|| Error::Config(format!("no directory configured for {key:?}")))
    }

    fn survey_key(&self) -> String {
        self.observation.survey.name().to_ascii_lowercase()
    }

    fn species_key(&self) -> String {
        self.observation.species.name().to_ascii_lowercase()
    }

    /// Key of the directory holding full cubes and extracted mosaics.
    pub fn mosaic_dir_key(&self) -> String {
        match (&self.observation.survey, self.observation.species) {
            (Survey::Dame, _) => "lustre_dame".to_string(),
            (_, Species::HiPlusHisa) => format!("lustre_{}_hi", self.survey_key()),
            _ => format!("lustre_{}_{}", self.survey_key(), self.species_key()),
        }
    }

    /// `<dir>/<survey>_<mosaic>_<species><flag>`.
    pub fn mosaic_path(&self) -> Result<PathBuf> {
        let flag = self.observation.survey.policy().file_flag;
        let name = format!("{}{flag}", self.observation.stem());
        Ok(self.path(&self.mosaic_dir_key())?.join(name))
    }

    /// `<dir>/<survey>_<mosaic>_HISA.dat`.
    pub fn catalog_path(&self) -> Result<PathBuf> {
        let Identity { survey, mosaic, .. } = &self.observation;
        let dir = self.path(&format!("{}_hisa_dat", self.survey_key()))?;
        Ok(dir.join(format!("{survey}_{mosaic}_HISA.dat")))
    }

    /// Directory receiving the partitions of a split.
    pub fn split_dir(&self) -> Result<&Path> {
        self.path(&format!(
            "lustre_{}_{}_split",
            self.survey_key(),
            self.species_key()
        ))
    }

    pub fn parts(&self) -> Result<usize> {
        self.split
            .parts
            .ok_or_else(|| Error::Config("[split] parts is required".into()))
    }
}
