//! Source cubes and their axis calibration.

use std::path::Path;

use log::info;
use ndarray::ArrayD;
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fits::{read_fits, Header, ImageHdu};
use crate::preflight::require_input;
use crate::survey::{Species, Survey};

/// Linear pixel ↔ world mapping of one FITS axis.
///
/// Pixel indices are 0-based; FITS reference pixels are 1-based, so the world
/// value of index `i` is `origin + (i + 1 - refpix) * increment`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct AxisCalibration {
    /// CRVALn
    pub origin: f64,
    /// CRPIXn
    pub refpix: f64,
    /// CDELTn
    pub increment: f64,
    /// NAXISn
    pub length: usize,
}

impl AxisCalibration {
    /// Read `CRVALn`, `CRPIXn` and `CDELTn`, using the FITS defaults
    /// (0, 0, 1) for absent keywords.
    pub fn from_header(header: &Header, axis: usize, length: usize) -> Result<Self> {
        let increment = header.get_f64(&format!("CDELT{axis}")).unwrap_or(1.0);
        if increment == 0.0 || !increment.is_finite() {
            return Err(Error::InvalidHeader("axis increment must be finite and non-zero"));
        }
        Ok(AxisCalibration {
            origin: header.get_f64(&format!("CRVAL{axis}")).unwrap_or(0.0),
            refpix: header.get_f64(&format!("CRPIX{axis}")).unwrap_or(0.0),
            increment,
            length,
        })
    }

    pub fn value_at(&self, index: usize) -> f64 {
        self.origin + (index as f64 + 1.0 - self.refpix) * self.increment
    }

    /// Fractional 0-based pixel position of a world value.
    pub fn pixel_of(&self, value: f64) -> f64 {
        self.refpix - 1.0 + (value - self.origin) / self.increment
    }

    /// World value of every pixel along the axis.
    pub fn coordinates(&self) -> Vec<f64> {
        (0..self.length).map(|i| self.value_at(i)).collect()
    }

    /// Angular (or spectral) extent covered by the whole axis.
    pub fn extent(&self) -> f64 {
        (self.length as f64 * self.increment).abs()
    }
}

/// Who a cube belongs to: survey, mosaic name, species and product type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub survey: Survey,
    pub mosaic: String,
    pub species: Species,
    #[serde(default = "default_product")]
    pub product: String,
}

fn default_product() -> String {
    "line".to_string()
}

impl Identity {
    /// `<survey>_<mosaic>_<species>`, the stem shared by every file name.
    pub fn stem(&self) -> String {
        format!("{}_{}_{}", self.survey, self.mosaic, self.species)
    }
}

/// A survey cube together with its calibration and metadata.
///
/// The array is in C order: any leading polarization/species axes, then the
/// spectral/ring axis (when present), latitude, longitude.
#[derive(Debug, Clone)]
pub struct Observation {
    pub identity: Identity,
    pub data: ArrayD<f32>,
    /// Longitude (FITS axis 1).
    pub x: AxisCalibration,
    /// Latitude (FITS axis 2).
    pub y: AxisCalibration,
    /// Spectral or ring axis (FITS axis 3), absent for 2-D maps.
    pub z: Option<AxisCalibration>,
    /// World value of every plane along `z`.
    pub zarray: Vec<f64>,
    pub header: Header,
}

impl Observation {
    pub fn new(identity: Identity, hdu: ImageHdu) -> Result<Self> {
        let ImageHdu { header, data } = hdu;
        let shape = data.shape().to_vec();
        let ndim = shape.len();
        if ndim < 2 {
            return Err(Error::InvalidHeader("survey cube needs at least two axes"));
        }
        if shape.contains(&0) {
            return Err(Error::InvalidHeader("survey cube has an empty axis"));
        }

        let x = AxisCalibration::from_header(&header, 1, shape[ndim - 1])?;
        let y = AxisCalibration::from_header(&header, 2, shape[ndim - 2])?;
        let z = if ndim >= 3 {
            Some(AxisCalibration::from_header(&header, 3, shape[ndim - 3])?)
        } else {
            None
        };
        let zarray = z.map(|z| z.coordinates()).unwrap_or_default();

        Ok(Observation {
            identity,
            data,
            x,
            y,
            z,
            zarray,
            header,
        })
    }

    /// Read the cube at `path`, failing fast if the file does not exist.
    pub fn load(path: &Path, identity: Identity) -> Result<Self> {
        require_input(path)?;
        info!("Getting the data from {}", path.display());
        let obs = Self::new(identity, read_fits(path)?)?;
        info!(
            "Loaded {} cube with shape {:?}",
            obs.identity.stem(),
            obs.data.shape()
        );
        Ok(obs)
    }

    pub fn xarray(&self) -> Vec<f64> {
        self.x.coordinates()
    }

    pub fn yarray(&self) -> Vec<f64> {
        self.y.coordinates()
    }

    /// `CROTAn` of the source cube, 0 when absent.
    pub fn rotation(&self, axis: usize) -> f64 {
        self.header.get_f64(&format!("CROTA{axis}")).unwrap_or(0.0)
    }

    /// Give up the cube and header, dropping the coordinate arrays.
    pub fn into_cube(self) -> (ArrayD<f32>, Header) {
        let Observation {
            data, header, zarray, ..
        } = self;
        drop(zarray);
        (data, header)
    }
}
