//! Longitude/latitude → pixel-range mapping on the Galactic CAR grid.

use crate::error::{Error, Result};
use crate::observation::AxisCalibration;

/// Inclusive pixel bounds of a square mosaic and its orientation relative to
/// the requested one.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct MosaicCoordinate {
    /// `[l0, l1]`, ascending, inclusive.
    pub l: [usize; 2],
    /// `[b0, b1]`, ascending, inclusive.
    pub b: [usize; 2],
    /// Multipliers for the longitude and latitude increments: `-1.0` where the
    /// cube runs against the requested orientation (longitude decreasing and
    /// latitude increasing with pixel index), `1.0` otherwise.
    pub sign: [f64; 2],
}

/// Fold a longitude difference into `[-180, 180)`.
fn wrap_longitude(delta: f64) -> f64 {
    (delta + 180.0).rem_euclid(360.0) - 180.0
}

/// Fractional pixel of `lon` on `x`, taking whichever 360 deg alias of the
/// center lands on (or nearest to) the axis. The edges are offset from this
/// center so a mosaic never straddles the wrap point.
fn longitude_center(x: &AxisCalibration, lon: f64) -> f64 {
    let period = 360.0 / x.increment.abs();
    let center = x.refpix - 1.0 + wrap_longitude(lon - x.origin) / x.increment;
    let last = x.length as f64 - 1.0;
    let outside = |p: f64| (-p).max(p - last).max(0.0);
    [center, center + period, center - period]
        .into_iter()
        .min_by(|a, b| outside(*a).total_cmp(&outside(*b)))
        .unwrap_or(center)
}

fn pixel_range(
    axis: &AxisCalibration,
    lo_pixel: f64,
    hi_pixel: f64,
    name: &str,
) -> Result<[usize; 2]> {
    let (lo, hi) = if lo_pixel <= hi_pixel {
        (lo_pixel, hi_pixel)
    } else {
        (hi_pixel, lo_pixel)
    };
    let last = axis.length as f64 - 1.0;
    if hi.round() < 0.0 || lo.round() > last {
        return Err(Error::InvalidRegion(format!(
            "{name} range [{lo:.1}, {hi:.1}] px lies outside the cube (0..{})",
            axis.length
        )));
    }
    Ok([lo.round().max(0.0) as usize, hi.round().min(last) as usize])
}

/// Map a mosaic centered on (`lon`, `lat`) with half-side `half_side` degrees
/// onto the pixel grid described by `x` (longitude) and `y` (latitude).
pub fn mosaic_coordinate(
    x: &AxisCalibration,
    y: &AxisCalibration,
    lon: f64,
    lat: f64,
    half_side: f64,
) -> Result<MosaicCoordinate> {
    if !(half_side.is_finite() && half_side > 0.0) {
        return Err(Error::InvalidRegion(format!(
            "mosaic half-side must be positive, got {half_side}"
        )));
    }
    if x.length == 0 || y.length == 0 {
        return Err(Error::InvalidRegion("cube has an empty spatial axis".into()));
    }

    // A half-side of 180 deg or more spans the whole circle in longitude.
    let l = if half_side >= 180.0 {
        [0, x.length - 1]
    } else {
        let center = longitude_center(x, lon);
        let half = half_side / x.increment.abs();
        pixel_range(x, center - half, center + half, "longitude")?
    };
    let b = pixel_range(
        y,
        y.pixel_of(lat - half_side),
        y.pixel_of(lat + half_side),
        "latitude",
    )?;

    let sign = [
        if x.increment > 0.0 { -1.0 } else { 1.0 },
        if y.increment < 0.0 { -1.0 } else { 1.0 },
    ];
    Ok(MosaicCoordinate { l, b, sign })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn axis(origin: f64, refpix: f64, increment: f64, length: usize) -> AxisCalibration {
        AxisCalibration {
            origin,
            refpix,
            increment,
            length,
        }
    }

    #[test]
    fn wrap_keeps_small_differences() {
        assert_eq!(wrap_longitude(10.0), 10.0);
        assert_eq!(wrap_longitude(-10.0), -10.0);
        assert_eq!(wrap_longitude(350.0), -10.0);
        assert_eq!(wrap_longitude(-350.0), 10.0);
    }

    #[test]
    fn centered_square() {
        // 0.5 deg pixels, lon decreasing; pixel 50 is (80, 0).
        let x = axis(80.0, 51.0, -0.5, 101);
        let y = axis(0.0, 51.0, 0.5, 101);
        let mc = mosaic_coordinate(&x, &y, 80.0, 0.0, 5.0).unwrap();
        assert_eq!(mc.l, [40, 60]);
        assert_eq!(mc.b, [40, 60]);
        assert_eq!(mc.sign, [1.0, 1.0]);
    }

    #[test]
    fn ranges_are_clamped_to_the_cube() {
        let x = axis(80.0, 51.0, -0.5, 101);
        let y = axis(0.0, 51.0, 0.5, 101);
        let mc = mosaic_coordinate(&x, &y, 100.0, 20.0, 15.0).unwrap();
        assert_eq!(mc.l, [0, 40]);
        assert_eq!(mc.b, [60, 100]);
    }

    // ---- longitude wrapping ----

    #[test]
    fn longitude_wraps_across_zero() {
        // Galprop-style all-sky grid, lon increasing from 0.
        let x = axis(0.0, 1.0, 1.0, 360);
        let y = axis(-10.0, 1.0, 1.0, 21);
        let mc = mosaic_coordinate(&x, &y, 359.0, 0.0, 2.0).unwrap();
        // Center lands on pixel 359; 357..361 is clamped at the last pixel.
        assert_eq!(mc.l, [357, 359]);
        assert_eq!(mc.b, [8, 12]);
        assert_eq!(mc.sign, [-1.0, 1.0]);

        let mc = mosaic_coordinate(&x, &y, 1.0, 0.0, 3.0).unwrap();
        assert_eq!(mc.l, [0, 4]);
    }

    #[test]
    fn mosaic_at_the_antipode_keeps_its_width() {
        let x = axis(0.0, 1.0, 1.0, 360);
        let y = axis(-10.0, 1.0, 1.0, 21);
        let mc = mosaic_coordinate(&x, &y, 180.0, 0.0, 5.0).unwrap();
        assert_eq!(mc.l, [175, 185]);

        let mc = mosaic_coordinate(&x, &y, 178.0, 0.0, 5.0).unwrap();
        assert_eq!(mc.l, [173, 183]);
        let mc = mosaic_coordinate(&x, &y, -178.0, 0.0, 5.0).unwrap();
        assert_eq!(mc.l, [177, 187]);
    }

    #[test]
    fn antipode_on_a_decreasing_axis() {
        // lon decreasing from 180 at pixel 0, 1 deg pixels: pixel 180 is l = 0.
        let x = axis(180.0, 1.0, -1.0, 360);
        let y = axis(-10.0, 1.0, 1.0, 21);
        let mc = mosaic_coordinate(&x, &y, 0.0, 0.0, 5.0).unwrap();
        assert_eq!(mc.l, [175, 185]);
        assert_eq!(mc.sign, [1.0, 1.0]);
    }

    #[test]
    fn full_circle_takes_every_longitude() {
        let x = axis(0.0, 1.0, 1.0, 360);
        let y = axis(-10.0, 1.0, 1.0, 21);
        let mc = mosaic_coordinate(&x, &y, 179.5, 0.0, 360.0).unwrap();
        assert_eq!(mc.l, [0, 359]);
        assert_eq!(mc.b, [0, 20]);
    }

    #[test]
    fn negative_latitude_increment_flips_sign() {
        let x = axis(0.0, 1.0, -1.0, 10);
        let y = axis(0.0, 5.0, -1.0, 10);
        let mc = mosaic_coordinate(&x, &y, 0.0, 0.0, 2.0).unwrap();
        assert_eq!(mc.sign, [1.0, -1.0]);
        assert_eq!(mc.b, [2, 6]);
    }

    #[test]
    fn region_outside_cube_is_rejected() {
        let x = axis(80.0, 51.0, -0.5, 101);
        let y = axis(0.0, 51.0, 0.5, 101);
        assert!(matches!(
            mosaic_coordinate(&x, &y, 80.0, 60.0, 1.0),
            Err(Error::InvalidRegion(_))
        ));
    }

    #[test]
    fn non_positive_side_is_rejected() {
        let x = axis(0.0, 1.0, 1.0, 10);
        assert!(mosaic_coordinate(&x, &x, 0.0, 0.0, 0.0).is_err());
    }

    #[test]
    fn empty_axis_is_rejected() {
        let x = axis(0.0, 1.0, 1.0, 0);
        let y = axis(0.0, 1.0, 1.0, 10);
        for half_side in [2.0, 180.0] {
            assert!(matches!(
                mosaic_coordinate(&x, &y, 0.0, 0.0, half_side),
                Err(Error::InvalidRegion(_))
            ));
        }
    }
}
