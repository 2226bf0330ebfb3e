//! Header synthesis for extracted mosaics.

use log::warn;

use crate::crop::Cropped;
use crate::fits::Header;
use crate::observation::Observation;
use crate::region::ResolvedRegion;
use crate::stats::range_patch;

/// `names` is `[ctype, noun, short, quantity]` as used in the card comments.
fn spatial_block(
    h: &mut Header,
    axis: usize,
    names: [&str; 4],
    value: f64,
    crpix: usize,
    cdelt: f64,
    crota: f64,
) {
    let [ctype, noun, short, quantity] = names;
    h.set(&format!("CTYPE{axis}"), ctype, "Coordinate type");
    h.set(
        &format!("CRVAL{axis}"),
        value,
        &format!("Galactic {noun} of reference pixel"),
    );
    h.set(
        &format!("CRPIX{axis}"),
        crpix,
        &format!("Reference pixel of {short}"),
    );
    h.set(&format!("CDELT{axis}"), cdelt, &format!("{quantity} increment"));
    h.set(&format!("CROTA{axis}"), crota, &format!("{quantity} rotation"));
    h.set(&format!("CUNIT{axis}"), "deg", "Unit type");
}

/// Build the header of a cropped mosaic from scratch.
///
/// The third-axis block, BUNIT and BAND follow the survey's policy; CROTAn
/// default to 0 when the source cube has none.
pub fn synthesize_header(obs: &Observation, region: &ResolvedRegion, cropped: &Cropped) -> Header {
    let survey = &obs.identity.survey;
    let policy = survey.policy();
    let mut h = Header::new();

    spatial_block(
        &mut h,
        1,
        ["GLON-CAR", "longitude", "lon", "Longitude"],
        region.lon,
        region.crpix1,
        cropped.cdelt1,
        obs.rotation(1),
    );
    spatial_block(
        &mut h,
        2,
        ["GLAT-CAR", "latitude", "lat", "Latitude"],
        region.lat,
        region.crpix2,
        cropped.cdelt2,
        obs.rotation(2),
    );

    if let (Some(third), Some(axis), Some([z0, _])) = (policy.third_axis, obs.z, region.z) {
        let q = third.quantity;
        h.set("CTYPE3", third.ctype, "Coordinate type");
        h.set(
            "CRVAL3",
            obs.zarray[z0 - 1],
            &format!("{q} of reference pixel"),
        );
        h.set("CRPIX3", 1i64, &format!("Reference pixel of {}", third.short));
        h.set("CDELT3", axis.increment, &format!("{q} increment"));
        h.set("CROTA3", obs.rotation(3), &format!("{q} rotation"));
        h.set("CUNIT3", third.unit, "Unit type");
    }
    if let Some(bunit) = policy.bunit {
        h.set("BUNIT", bunit, "Map units");
    }

    h.set("SYSTEM", "GALACTIC", "Coordinate system");
    h.set("EQUINOX", 2000.0, "Equinox of ref. coord.");
    h.merge(range_patch(&cropped.data.view()));
    h.set(
        "OBJECT",
        format!("{survey} Mosaic {}", obs.identity.mosaic),
        &format!("{survey} Mosaic"),
    );

    if policy.rest_frequency {
        match obs.header.get("BAND").or_else(|| obs.header.get("RESTFREQ")) {
            Some(band) => h.set("BAND", band.clone(), "Rest frequency in Hz"),
            None => warn!("{survey} cube carries neither BAND nor RESTFREQ; BAND omitted"),
        }
    }
    h
}
