//! Survey identity and the per-survey policy table.
//!
//! Every survey-specific decision (which axes are cropped, which header block
//! describes the third axis, the brightness unit, longitude mirroring, the
//! input file suffix) lives in [`SurveyPolicy`] and is looked up once per
//! invocation.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The surveys whose cubes the pipelines understand.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Survey {
    Cgps,
    Sgps,
    Vgps,
    Lab,
    Galprop,
    Dame,
    Other(String),
}

/// Emission species carried by a cube.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Species {
    Hi,
    Hisa,
    HiUnabsorbed,
    HiPlusHisa,
    Co,
}

/// Header block describing the third (spectral or ring) axis.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ThirdAxis {
    pub ctype: &'static str,
    pub unit: &'static str,
    /// Noun used in the card comments, e.g. "Velocity".
    pub quantity: &'static str,
    /// Short form used in the CRPIX3 comment, e.g. "vel".
    pub short: &'static str,
}

pub const VELOCITY_AXIS: ThirdAxis = ThirdAxis {
    ctype: "VELO-LSR",
    unit: "m/s",
    quantity: "Velocity",
    short: "vel",
};

pub const RING_AXIS: ThirdAxis = ThirdAxis {
    ctype: "RingBand",
    unit: "ring num",
    quantity: "Ring",
    short: "ring",
};

/// Survey-specific behavior, carried as data.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SurveyPolicy {
    /// Whether the cube has a spectral/ring axis that gets cropped.
    pub spectral: bool,
    pub third_axis: Option<ThirdAxis>,
    /// BUNIT written on extracted mosaics.
    pub bunit: Option<&'static str>,
    /// Whether the rest frequency (BAND) is copied to the mosaic header.
    pub rest_frequency: bool,
    /// Reverse the longitude axis after cropping.
    pub mirror_longitude: bool,
    /// Suffix appended to `<survey>_<mosaic>_<species>` for input/output cubes.
    pub file_flag: &'static str,
}

const DEFAULT_POLICY: SurveyPolicy = SurveyPolicy {
    spectral: true,
    third_axis: None,
    bunit: None,
    rest_frequency: false,
    mirror_longitude: false,
    file_flag: "_line.fits",
};

const SGPS_POLICY: SurveyPolicy = SurveyPolicy {
    third_axis: Some(VELOCITY_AXIS),
    bunit: Some("K"),
    rest_frequency: true,
    ..DEFAULT_POLICY
};

const LAB_POLICY: SurveyPolicy = SurveyPolicy {
    file_flag: "_line_image.fits",
    ..SGPS_POLICY
};

const GALPROP_POLICY: SurveyPolicy = SurveyPolicy {
    third_axis: Some(RING_AXIS),
    bunit: Some("K km s-1"),
    mirror_longitude: true,
    ..DEFAULT_POLICY
};

const DAME_POLICY: SurveyPolicy = SurveyPolicy {
    spectral: false,
    bunit: Some("K km s-1"),
    ..DEFAULT_POLICY
};

impl Survey {
    pub fn policy(&self) -> &'static SurveyPolicy {
        match self {
            Survey::Sgps => &SGPS_POLICY,
            Survey::Lab => &LAB_POLICY,
            Survey::Galprop => &GALPROP_POLICY,
            Survey::Dame => &DAME_POLICY,
            Survey::Cgps | Survey::Vgps | Survey::Other(_) => &DEFAULT_POLICY,
        }
    }

    pub fn name(&self) -> &str {
        match self {
            Survey::Cgps => "CGPS",
            Survey::Sgps => "SGPS",
            Survey::Vgps => "VGPS",
            Survey::Lab => "LAB",
            Survey::Galprop => "Galprop",
            Survey::Dame => "Dame",
            Survey::Other(name) => name,
        }
    }
}

impl fmt::Display for Survey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Survey {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let survey = match s.to_ascii_lowercase().as_str() {
            "cgps" => Survey::Cgps,
            "sgps" => Survey::Sgps,
            "vgps" => Survey::Vgps,
            "lab" => Survey::Lab,
            "galprop" => Survey::Galprop,
            "dame" => Survey::Dame,
            "" => return Err(Error::Config("empty survey name".into())),
            _ => Survey::Other(s.to_string()),
        };
        Ok(survey)
    }
}

impl TryFrom<String> for Survey {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Survey> for String {
    fn from(s: Survey) -> Self {
        s.name().to_string()
    }
}

impl Species {
    /// Species rebuilt from a correction catalog rather than cropped.
    pub fn is_derived(self) -> bool {
        matches!(self, Species::Hisa | Species::HiUnabsorbed)
    }

    pub fn name(self) -> &'static str {
        match self {
            Species::Hi => "HI",
            Species::Hisa => "HISA",
            Species::HiUnabsorbed => "HI_unabsorbed",
            Species::HiPlusHisa => "HI+HISA",
            Species::Co => "CO",
        }
    }
}

impl fmt::Display for Species {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Species {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "HI" => Ok(Species::Hi),
            "HISA" => Ok(Species::Hisa),
            "HI_unabsorbed" => Ok(Species::HiUnabsorbed),
            "HI+HISA" => Ok(Species::HiPlusHisa),
            "CO" => Ok(Species::Co),
            other => Err(Error::Config(format!("unknown species {other:?}"))),
        }
    }
}

impl TryFrom<String> for Species {
    type Error = Error;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

impl From<Species> for String {
    fn from(s: Species) -> Self {
        s.name().to_string()
    }
}
