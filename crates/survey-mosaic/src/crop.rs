//! Cube cropping to a resolved region.

use log::debug;
use ndarray::{ArrayD, Axis, Slice};

use crate::error::{Error, Result};
use crate::observation::Observation;
use crate::region::ResolvedRegion;

/// A cropped cube with the spatial increments to advertise in its header.
#[derive(Debug, Clone)]
pub struct Cropped {
    pub data: ArrayD<f32>,
    pub cdelt1: f64,
    pub cdelt2: f64,
}

/// Crop `obs` to `region`.
///
/// Latitude and longitude are cut to the inclusive pixel ranges. The
/// spectral/ring axis, when the region has one, keeps planes
/// `z[0] - 1 .. z[1]` clamped to its length. Leading axes are kept whole.
/// Surveys that mirror longitude get that axis reversed afterwards.
pub fn crop(obs: &Observation, region: &ResolvedRegion) -> Result<Cropped> {
    let policy = obs.identity.survey.policy();
    let ndim = obs.data.ndim();
    let needed = if region.z.is_some() { 3 } else { 2 };
    if ndim < needed {
        return Err(Error::InvalidRegion(format!(
            "{} layout needs {needed} axes, cube has {ndim}",
            obs.identity.survey
        )));
    }

    let planes = match region.z {
        Some([z0, z1]) => {
            let len = obs.data.len_of(Axis(ndim - 3));
            let (start, end) = (z0 - 1, z1.min(len));
            if start >= end {
                return Err(Error::InvalidRegion(format!(
                    "spectral planes [{z0}, {z1}] lie outside the cube (1..={len})"
                )));
            }
            Some(start..end)
        }
        None => None,
    };

    let [l0, l1] = region.l;
    let [b0, b1] = region.b;
    // Axes are counted from the end: longitude, latitude, spectral.
    let view = obs.data.slice_each_axis(|ax| match ndim - ax.axis.index() {
        1 => Slice::from(l0..=l1),
        2 => Slice::from(b0..=b1),
        3 => planes.clone().map_or(Slice::from(..), Slice::from),
        _ => Slice::from(..),
    });
    let mut data = view.to_owned();

    let (mut cdelt1, mut cdelt2) = (obs.x.increment, obs.y.increment);
    if policy.mirror_longitude {
        data.invert_axis(Axis(ndim - 1));
        cdelt1 = -cdelt1;
        cdelt2 *= region.sign[1];
    }
    debug!("cropped {:?} -> {:?}", obs.data.shape(), data.shape());

    Ok(Cropped {
        data,
        cdelt1,
        cdelt2,
    })
}
