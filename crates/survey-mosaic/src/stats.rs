//! Min/max statistics and their location keys.

use log::warn;
use ndarray::{ArrayViewD, Dimension};

use crate::fits::Header;

/// Global extrema of an array, ignoring NaN.
///
/// Locations are `(plane, row, col)` over the last three axes; leading axes
/// are not reported and a 2-D array reports plane 0. Ties resolve to the
/// first occurrence in C order.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Extrema {
    pub min: f32,
    pub max: f32,
    pub argmin: [usize; 3],
    pub argmax: [usize; 3],
}

fn trailing_three(index: &[usize]) -> [usize; 3] {
    let mut out = [0; 3];
    let n = index.len().min(3);
    out[3 - n..].copy_from_slice(&index[index.len() - n..]);
    out
}

impl Extrema {
    /// `None` when the array is empty or entirely NaN.
    pub fn of(data: &ArrayViewD<'_, f32>) -> Option<Self> {
        let mut found: Option<Extrema> = None;
        for (index, &v) in data.indexed_iter() {
            if v.is_nan() {
                continue;
            }
            let at = trailing_three(index.slice());
            match found.as_mut() {
                None => {
                    found = Some(Extrema {
                        min: v,
                        max: v,
                        argmin: at,
                        argmax: at,
                    })
                }
                Some(e) => {
                    if v < e.min {
                        e.min = v;
                        e.argmin = at;
                    }
                    if v > e.max {
                        e.max = v;
                        e.argmax = at;
                    }
                }
            }
        }
        found
    }

    /// `DATAMIN` and `DATAMAX`.
    pub fn range_patch(&self) -> Header {
        let mut h = Header::new();
        h.set("DATAMIN", self.min, "Min value");
        h.set("DATAMAX", self.max, "Max value");
        h
    }

    /// `DATAMIN`/`DATAMAX` plus the six location keys.
    ///
    /// FIL is the plane, COL the row (latitude), ROW the column (longitude);
    /// all 0-based array indices.
    pub fn location_patch(&self) -> Header {
        let mut h = self.range_patch();
        let [fil, col, row] = self.argmin;
        h.set("MINFIL", fil, "Plane of min value");
        h.set("MINCOL", col, "Latitude pixel of min value");
        h.set("MINROW", row, "Longitude pixel of min value");
        let [fil, col, row] = self.argmax;
        h.set("MAXFIL", fil, "Plane of max value");
        h.set("MAXCOL", col, "Latitude pixel of max value");
        h.set("MAXROW", row, "Longitude pixel of max value");
        h
    }
}

/// Header patch with the data range of `data`, empty (and logged) when the
/// array holds no finite value.
pub fn range_patch(data: &ArrayViewD<'_, f32>) -> Header {
    match Extrema::of(data) {
        Some(e) => e.range_patch(),
        None => {
            warn!("array holds no valid pixel; DATAMIN/DATAMAX omitted");
            Header::new()
        }
    }
}

/// Like [`range_patch`], with the min/max location keys.
pub fn location_patch(data: &ArrayViewD<'_, f32>) -> Header {
    match Extrema::of(data) {
        Some(e) => e.location_patch(),
        None => {
            warn!("array holds no valid pixel; min/max keys omitted");
            Header::new()
        }
    }
}
