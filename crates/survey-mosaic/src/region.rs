//! Resolution of a region request into concrete pixel ranges.

use log::info;

use crate::error::{Error, Result};
use crate::geometry::mosaic_coordinate;
use crate::observation::{AxisCalibration, Observation};
use crate::survey::Survey;

/// What the caller asked for. `None` means "use the cube's full extent".
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct RegionRequest {
    /// Galactic longitude of the center, degrees.
    pub lon: Option<f64>,
    /// Galactic latitude of the center, degrees.
    pub lat: Option<f64>,
    /// Half the side of the square mosaic, degrees.
    pub half_side: Option<f64>,
    /// Spectral/ring bounds in the units of the third axis (m/s or ring).
    pub z1: Option<f64>,
    pub z2: Option<f64>,
}

/// A region pinned to the pixel grid of one cube.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedRegion {
    pub lon: f64,
    pub lat: f64,
    pub half_side: f64,
    /// Physical spectral bounds as requested (or defaulted).
    pub z_world: Option<[f64; 2]>,
    /// Spectral pixel bounds, ascending, after the zero-floor adjustment.
    /// The cropped planes are `z[0] - 1 .. z[1]`. Absent for 2-D surveys.
    pub z: Option<[usize; 2]>,
    /// Inclusive longitude pixel bounds.
    pub l: [usize; 2],
    /// Inclusive latitude pixel bounds.
    pub b: [usize; 2],
    /// Longitude / latitude increment multipliers from the geometry.
    pub sign: [f64; 2],
    pub crpix1: usize,
    pub crpix2: usize,
}

fn paired(a: Option<f64>, b: Option<f64>, what: &str) -> Result<Option<[f64; 2]>> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(Some([a, b])),
        (None, None) => Ok(None),
        _ => Err(Error::Config(format!(
            "{what} must be given together or both left to default"
        ))),
    }
}

/// `ceil(refpix - 1 + (value - origin) / increment)`, floored at 0 and
/// capped at the axis length.
pub fn spectral_pixel(axis: &AxisCalibration, value: f64) -> usize {
    axis.pixel_of(value)
        .ceil()
        .clamp(0.0, axis.length as f64) as usize
}

fn half_width(range: [usize; 2]) -> usize {
    ((range[1] - range[0]) as f64 / 2.0).round() as usize
}

/// Map `request` onto the pixel grid of `obs`.
pub fn resolve_region(obs: &Observation, request: &RegionRequest) -> Result<ResolvedRegion> {
    let survey = &obs.identity.survey;
    let policy = survey.policy();

    let [lon, lat] = paired(request.lon, request.lat, "lon and lat")?.unwrap_or([
        obs.x.value_at((obs.x.length - 1) / 2),
        obs.y.value_at((obs.y.length - 1) / 2),
    ]);
    let half_side = request.half_side.unwrap_or_else(|| obs.x.extent());

    let (z_world, z) = if policy.spectral {
        let axis = obs.z.as_ref().ok_or_else(|| {
            Error::InvalidRegion(format!("{survey} cube has no spectral axis to crop"))
        })?;
        let world = match paired(request.z1, request.z2, "z1 and z2")? {
            Some(bounds) => bounds,
            None => {
                let min = obs.zarray.iter().copied().fold(f64::INFINITY, f64::min);
                let max = obs.zarray.iter().copied().fold(f64::NEG_INFINITY, f64::max);
                [min, max]
            }
        };
        let mut z = [
            spectral_pixel(axis, world[0]),
            spectral_pixel(axis, world[1]),
        ];
        if z[0] > z[1] {
            z.swap(0, 1);
        }
        // The crop starts at z[0] - 1, which cannot go below zero.
        if z[0] == 0 {
            z = [1, z[1] + 1];
        }
        (Some(world), Some(z))
    } else {
        (None, None)
    };

    let coord = mosaic_coordinate(&obs.x, &obs.y, lon, lat, half_side)?;
    let region = ResolvedRegion {
        lon,
        lat,
        half_side,
        z_world,
        z,
        l: coord.l,
        b: coord.b,
        sign: coord.sign,
        crpix1: half_width(coord.l),
        crpix2: half_width(coord.b),
    };
    log_region(survey, &region);
    Ok(region)
}

fn log_region(survey: &Survey, r: &ResolvedRegion) {
    info!("Mosaic properties:");
    info!(
        "- (l0,b0) = ({:.3},{:.3}) deg, [{},{}] px",
        r.lon,
        r.lat,
        r.l[0] + r.crpix1,
        r.b[0] + r.crpix2
    );
    if let (Some(w), Some(z)) = (r.z_world, r.z) {
        match survey {
            Survey::Galprop => info!("- (r1,r2) = ({},{}) px", z[0], z[1]),
            _ => info!(
                "- (v1,v2) = ({:.3},{:.3}), [{},{}] px",
                w[0], w[1], z[0], z[1]
            ),
        }
    }
    info!(
        "- (h0,w0) = ({},{}) deg, [{},{}] px",
        r.half_side, r.half_side, r.crpix1, r.crpix2
    );
}
