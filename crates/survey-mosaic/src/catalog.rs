//! HISA correction catalogs and the derived-species reconstruction.
//!
//! A catalog lists one corrected voxel per line as four whitespace-separated
//! numbers: region id, flat voxel index, unabsorbed brightness and absorption
//! depth. The flat index runs over the last three axes of the cube with
//! longitude fastest.

use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;

use log::{debug, error, info};
use ndarray::{ArrayD, IxDyn};

use crate::error::{Error, Result};
use crate::fits::Header;
use crate::preflight::require_input;
use crate::stats::location_patch;
use crate::survey::Species;

/// One line of a correction catalog.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct CorrectionRecord {
    /// HISA region id; carried for completeness.
    pub region: f64,
    /// Flat voxel index over (plane, row, col).
    pub index: u64,
    /// Unabsorbed brightness temperature.
    pub unabsorbed: f32,
    /// Absorption depth, conventionally negative.
    pub depth: f32,
    /// 1-based line in the catalog file.
    pub line: usize,
}

fn parse_line(text: &str, line: usize) -> Result<CorrectionRecord> {
    let fields: Vec<&str> = text.split_whitespace().collect();
    if fields.len() < 4 {
        return Err(Error::Catalog {
            line,
            reason: format!("expected 4 fields, found {}", fields.len()),
        });
    }
    let mut numbers = [0.0f64; 4];
    for (n, field) in numbers.iter_mut().zip(&fields) {
        *n = field.parse().map_err(|_| Error::Catalog {
            line,
            reason: format!("{field:?} is not a number"),
        })?;
    }
    let [region, index, unabsorbed, depth] = numbers;
    if !index.is_finite() || index < 0.0 {
        return Err(Error::Catalog {
            line,
            reason: format!("voxel index {index} must be a non-negative number"),
        });
    }
    Ok(CorrectionRecord {
        region,
        index: index.floor() as u64,
        unabsorbed: unabsorbed as f32,
        depth: depth as f32,
        line,
    })
}

/// Parse every record from `reader`, skipping blank lines.
pub fn parse_catalog<R: BufRead>(reader: R) -> Result<Vec<CorrectionRecord>> {
    let mut records = Vec::new();
    for (i, line) in reader.lines().enumerate() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        records.push(parse_line(&line, i + 1)?);
    }
    Ok(records)
}

pub fn read_catalog(path: &Path) -> Result<Vec<CorrectionRecord>> {
    require_input(path)?;
    let records = parse_catalog(BufReader::new(File::open(path)?))?;
    info!("Read {} correction records from {}", records.len(), path.display());
    Ok(records)
}

/// Split a flat index into `(plane, row, col)` for a cube whose last two axes
/// have lengths `ydim` (rows) and `xdim` (columns).
pub fn decode(index: u64, xdim: usize, ydim: usize) -> [usize; 3] {
    let (xdim, ydim) = (xdim as u64, ydim as u64);
    let plane = index / (xdim * ydim);
    let rest = index - plane * xdim * ydim;
    let row = rest / xdim;
    let col = rest - row * xdim;
    [plane as usize, row as usize, col as usize]
}

/// Outcome of [`reconstruct`].
#[derive(Debug)]
pub enum Reconstruction {
    /// The derived cube and the statistics patch to merge onto its header.
    Applied { cube: ArrayD<f32>, metadata: Header },
    /// The species has no reconstruction; the cube comes back untouched.
    Unsupported { cube: ArrayD<f32> },
}

/// Rebuild a derived-species cube from `records`.
///
/// HISA starts from zeros and receives `|depth|`; HI_unabsorbed starts from
/// `cube` and receives the unabsorbed brightness. Voxels are written in the
/// first plane of every leading axis.
pub fn reconstruct(
    cube: ArrayD<f32>,
    species: Species,
    records: &[CorrectionRecord],
) -> Result<Reconstruction> {
    let mut cube = match species {
        Species::Hisa => ArrayD::zeros(cube.raw_dim()),
        Species::HiUnabsorbed => cube,
        _ => {
            error!(
                "Reconstruction can be only applied to HI_unabsorbed and HISA mosaics, not {species}"
            );
            return Ok(Reconstruction::Unsupported { cube });
        }
    };

    let shape = cube.shape().to_vec();
    let ndim = shape.len();
    if ndim < 3 || shape.contains(&0) {
        return Err(Error::InvalidRegion(format!(
            "reconstruction needs a non-empty cube with at least 3 axes, got shape {shape:?}"
        )));
    }
    let (xdim, ydim) = (shape[ndim - 1], shape[ndim - 2]);
    let trailing = &shape[ndim - 3..];

    let mut index = IxDyn(&vec![0; ndim]);
    for record in records {
        let voxel = decode(record.index, xdim, ydim);
        if voxel.iter().zip(trailing).any(|(v, n)| v >= n) {
            return Err(Error::VoxelOutOfBounds {
                line: record.line,
                voxel,
                shape,
            });
        }
        index[ndim - 3] = voxel[0];
        index[ndim - 2] = voxel[1];
        index[ndim - 1] = voxel[2];
        cube[&index] = match species {
            Species::Hisa => record.depth.abs(),
            _ => record.unabsorbed,
        };
    }
    debug!("applied {} corrections to {species} cube", records.len());

    let metadata = location_patch(&cube.view());
    Ok(Reconstruction::Applied { cube, metadata })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(index: u64, unabsorbed: f32, depth: f32) -> CorrectionRecord {
        CorrectionRecord {
            region: 1.0,
            index,
            unabsorbed,
            depth,
            line: 1,
        }
    }

    // ---- parsing ----

    #[test]
    fn parse_records_and_skip_blank_lines() {
        let text = "1 0 10.5 -3.0\n\n  2 7 11.0 -4.5 extra\n";
        let records = parse_catalog(text.as_bytes()).unwrap();
        assert_eq!(records.len(), 2);
        assert_eq!(records[0].index, 0);
        assert_eq!(records[0].depth, -3.0);
        assert_eq!(records[1].region, 2.0);
        assert_eq!(records[1].unabsorbed, 11.0);
        assert_eq!(records[1].line, 3);
    }

    #[test]
    fn short_line_reports_its_number() {
        let err = parse_catalog("1 2 3 4\n1 2 3\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Catalog { line: 2, .. }));
    }

    #[test]
    fn bad_number_is_rejected() {
        let err = parse_catalog("1 x 3 4\n".as_bytes()).unwrap_err();
        assert!(matches!(err, Error::Catalog { line: 1, .. }));
    }

    #[test]
    fn negative_index_is_rejected() {
        assert!(parse_catalog("1 -4 3 4\n".as_bytes()).is_err());
        assert!(parse_catalog("1 nan 3 4\n".as_bytes()).is_err());
    }

    #[test]
    fn missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("LAB_m_HISA.dat");
        assert!(matches!(read_catalog(&path), Err(Error::MissingInput(_))));
        std::fs::write(&path, "0 5 1 -1\n").unwrap();
        assert_eq!(read_catalog(&path).unwrap().len(), 1);
    }

    // ---- decoding ----

    #[test]
    fn decode_flat_index() {
        // 4 columns, 3 rows per plane.
        assert_eq!(decode(0, 4, 3), [0, 0, 0]);
        assert_eq!(decode(5, 4, 3), [0, 1, 1]);
        assert_eq!(decode(12, 4, 3), [1, 0, 0]);
        assert_eq!(decode(23, 4, 3), [1, 2, 3]);
    }

    // ---- reconstruction ----

    #[test]
    fn hisa_starts_from_zero() {
        let cube = ArrayD::from_elem(IxDyn(&[1, 2, 3, 4]), 50.0f32);
        let records = [record(5, 40.0, -3.0), record(23, 41.0, -7.5)];
        let Reconstruction::Applied { cube, metadata } =
            reconstruct(cube, Species::Hisa, &records).unwrap()
        else {
            panic!("HISA must be reconstructed");
        };
        assert_eq!(cube[[0, 0, 1, 1]], 3.0);
        assert_eq!(cube[[0, 1, 2, 3]], 7.5);
        assert_eq!(cube.sum(), 10.5);
        assert_eq!(metadata.get_f64("DATAMAX"), Some(7.5));
        assert_eq!(metadata.get_i64("MAXFIL"), Some(1));
        assert_eq!(metadata.get_i64("MAXCOL"), Some(2));
        assert_eq!(metadata.get_i64("MAXROW"), Some(3));
        assert_eq!(metadata.get_f64("DATAMIN"), Some(0.0));
    }

    #[test]
    fn unabsorbed_overwrites_source() {
        let cube = ArrayD::from_elem(IxDyn(&[2, 3, 4]), 50.0f32);
        let records = [record(5, 40.0, -3.0)];
        let Reconstruction::Applied { cube, metadata } =
            reconstruct(cube, Species::HiUnabsorbed, &records).unwrap()
        else {
            panic!("HI_unabsorbed must be reconstructed");
        };
        assert_eq!(cube[[0, 1, 1]], 40.0);
        assert_eq!(cube[[1, 1, 1]], 50.0);
        assert_eq!(metadata.get_f64("DATAMIN"), Some(40.0));
        assert_eq!(metadata.get_i64("MINROW"), Some(1));
    }

    #[test]
    fn only_first_leading_plane_is_written() {
        let cube = ArrayD::zeros(IxDyn(&[2, 1, 2, 2]));
        let Reconstruction::Applied { cube, .. } =
            reconstruct(cube, Species::Hisa, &[record(3, 0.0, -2.0)]).unwrap()
        else {
            panic!("HISA must be reconstructed");
        };
        assert_eq!(cube[[0, 0, 1, 1]], 2.0);
        assert_eq!(cube[[1, 0, 1, 1]], 0.0);
    }

    #[test]
    fn co_is_returned_unchanged() {
        let cube = ArrayD::from_elem(IxDyn(&[1, 2, 2]), 9.0f32);
        match reconstruct(cube.clone(), Species::Co, &[record(0, 1.0, -1.0)]).unwrap() {
            Reconstruction::Unsupported { cube: back } => assert_eq!(back, cube),
            Reconstruction::Applied { .. } => panic!("CO has no reconstruction"),
        }
    }

    #[test]
    fn out_of_bounds_voxel_is_rejected() {
        let cube = ArrayD::zeros(IxDyn(&[2, 3, 4]));
        let mut bad = record(24, 1.0, -1.0);
        bad.line = 9;
        let err = reconstruct(cube, Species::Hisa, &[bad]).unwrap_err();
        assert!(matches!(
            err,
            Error::VoxelOutOfBounds { line: 9, voxel: [2, 0, 0], .. }
        ));
    }

    #[test]
    fn empty_cube_is_rejected() {
        for shape in [&[2, 0, 4][..], &[2, 3, 0], &[0, 2, 3, 4]] {
            let cube = ArrayD::zeros(IxDyn(shape));
            assert!(matches!(
                reconstruct(cube, Species::HiUnabsorbed, &[record(0, 1.0, -1.0)]),
                Err(Error::InvalidRegion(_))
            ));
        }
    }
}
