//! Splitting a mosaic into contiguous sub-mosaics along one spatial axis.

use std::path::{Path, PathBuf};

use log::info;
use ndarray::{ArrayD, Axis, Slice};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::fits::{write_fits, Header, Verify};
use crate::observation::{Identity, Observation};
use crate::preflight::check_output;
use crate::stats::location_patch;
use crate::survey::Species;

/// Spatial axis along which a mosaic is split.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SplitAxis {
    #[default]
    #[serde(rename = "lat")]
    Latitude,
    #[serde(rename = "lon")]
    Longitude,
}

impl SplitAxis {
    /// FITS axis number rewritten in each partition header.
    pub fn fits_axis(self) -> usize {
        match self {
            SplitAxis::Latitude => 2,
            SplitAxis::Longitude => 1,
        }
    }

    /// Array axis of an `ndim`-dimensional C-order cube.
    pub fn array_axis(self, ndim: usize) -> Axis {
        Axis(ndim - self.fits_axis())
    }
}

/// One slab of a split mosaic.
#[derive(Debug, Clone)]
pub struct Partition {
    /// 1-based position in emission order.
    pub number: usize,
    pub total: usize,
    pub data: ArrayD<f32>,
    pub header: Header,
}

impl Partition {
    pub fn file_name(&self, identity: &Identity) -> String {
        format!(
            "{}_line_part_{}-{}.fits",
            identity.stem(),
            self.number,
            self.total
        )
    }
}

/// Lengths of `ntot` contiguous slabs covering `len`: the first `len % ntot`
/// are one element longer than the rest.
pub fn slab_lengths(len: usize, ntot: usize) -> Vec<usize> {
    let (base, extra) = (len / ntot, len % ntot);
    (0..ntot).map(|i| base + usize::from(i < extra)).collect()
}

/// Reference pixel shared by every partition and the representative
/// coordinate index of each one.
pub fn reference_indices(len: usize, ntot: usize) -> Result<(usize, Vec<usize>)> {
    if ntot == 0 {
        return Err(Error::InvalidPartition("number of parts must be positive".into()));
    }
    let refpix = (len / ntot) / 2;
    if refpix == 0 {
        return Err(Error::InvalidPartition(format!(
            "axis of length {len} is too short for {ntot} parts"
        )));
    }
    Ok((refpix, (0..ntot).map(|z| refpix * (2 * z + 1)).collect()))
}

/// Partition `obs` into `ntot` slabs along `axis`.
///
/// Each partition carries a copy of the source header with the reference
/// value and pixel of the split axis rewritten, plus its own statistics.
pub fn split_mosaic(obs: &Observation, ntot: usize, axis: SplitAxis) -> Result<Vec<Partition>> {
    let identity = &obs.identity;
    if identity.species == Species::Co {
        return Err(Error::UnsupportedSpecies {
            species: identity.species,
            operation: "split",
        });
    }

    let array_axis = axis.array_axis(obs.data.ndim());
    let len = obs.data.len_of(array_axis);
    let (refpix, indices) = reference_indices(len, ntot)?;
    let coord = match axis {
        SplitAxis::Latitude => obs.yarray(),
        SplitAxis::Longitude => obs.xarray(),
    };
    let n = axis.fits_axis();

    let mut start = 0;
    let mut parts = Vec::with_capacity(ntot);
    for (z, (slab, index)) in slab_lengths(len, ntot).into_iter().zip(indices).enumerate() {
        let data = obs
            .data
            .slice_axis(array_axis, Slice::from(start..start + slab))
            .to_owned();
        start += slab;

        let mut header = obs.header.clone();
        header.set_value(&format!("CRVAL{n}"), coord[index - 1]);
        header.set_value(&format!("CRPIX{n}"), refpix);
        header.merge(location_patch(&data.view()));
        header.set(
            "OBJECT",
            format!("Mosaic {} ({}/{ntot})", identity.mosaic, z + 1),
            &format!("{} Mosaic (n/tot)", identity.survey),
        );
        parts.push(Partition {
            number: z + 1,
            total: ntot,
            data,
            header,
        });
    }
    Ok(parts)
}

/// Write `parts` into `dir`, checking every target before the first write.
pub fn write_partitions(
    parts: &[Partition],
    identity: &Identity,
    dir: &Path,
    overwrite: bool,
) -> Result<Vec<PathBuf>> {
    let paths: Vec<PathBuf> = parts.iter().map(|p| dir.join(p.file_name(identity))).collect();
    for path in &paths {
        check_output(path, overwrite)?;
    }
    for (part, path) in parts.iter().zip(&paths) {
        info!(
            "Writing fits file {} out of {} in {}",
            part.number,
            part.total,
            dir.display()
        );
        write_fits(path, &part.header, &part.data.view(), Verify::Fix)?;
    }
    info!("Done");
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::ImageHdu;
    use crate::survey::Survey;
    use ndarray::{concatenate, Array, IxDyn};

    fn mosaic(species: Species, shape: &[usize]) -> Observation {
        let mut h = Header::new();
        h.set("CRVAL1", 50.0, "Galactic longitude of reference pixel");
        h.set("CRPIX1", 1.0, "Reference pixel of lon");
        h.set("CDELT1", -0.1, "Longitude increment");
        h.set("CRVAL2", -5.0, "Galactic latitude of reference pixel");
        h.set("CRPIX2", 1.0, "Reference pixel of lat");
        h.set("CDELT2", 0.1, "Latitude increment");
        let n: usize = shape.iter().product();
        let data = Array::from_iter((0..n).map(|v| v as f32))
            .into_shape_with_order(IxDyn(shape))
            .unwrap();
        let identity = Identity {
            survey: Survey::Lab,
            mosaic: "skymap".into(),
            species,
            product: "line".into(),
        };
        Observation::new(identity, ImageHdu { header: h, data }).unwrap()
    }

    // ---- slab arithmetic ----

    #[test]
    fn slab_lengths_cover_the_axis() {
        assert_eq!(slab_lengths(100, 4), vec![25; 4]);
        assert_eq!(slab_lengths(10, 3), vec![4, 3, 3]);
        assert_eq!(slab_lengths(7, 7), vec![1; 7]);
    }

    #[test]
    fn reference_indices_for_four_parts() {
        let (refpix, idx) = reference_indices(100, 4).unwrap();
        assert_eq!(refpix, 12);
        assert_eq!(idx, vec![12, 36, 60, 84]);
    }

    #[test]
    fn degenerate_partitions_are_rejected() {
        assert!(matches!(
            reference_indices(100, 0),
            Err(Error::InvalidPartition(_))
        ));
        assert!(matches!(
            reference_indices(5, 4),
            Err(Error::InvalidPartition(_))
        ));
    }

    // ---- splitting ----

    #[test]
    fn partitions_reassemble_the_source() {
        let obs = mosaic(Species::Hi, &[3, 10, 6]);
        for axis in [SplitAxis::Latitude, SplitAxis::Longitude] {
            let parts = split_mosaic(&obs, 3, axis).unwrap();
            let views: Vec<_> = parts.iter().map(|p| p.data.view()).collect();
            let joined = concatenate(axis.array_axis(3), &views).unwrap();
            assert_eq!(joined, obs.data);
        }
    }

    #[test]
    fn latitude_partition_headers() {
        let obs = mosaic(Species::Hisa, &[2, 100, 3]);
        let parts = split_mosaic(&obs, 4, SplitAxis::Latitude).unwrap();
        let yarray = obs.yarray();
        for (z, (part, idx)) in parts.iter().zip([12, 36, 60, 84]).enumerate() {
            assert_eq!(part.data.shape(), &[2, 25, 3]);
            assert_eq!(part.header.get_f64("CRVAL2"), Some(yarray[idx - 1]));
            assert_eq!(part.header.get_i64("CRPIX2"), Some(12));
            assert_eq!(
                part.header.card("CRPIX2").unwrap().comment.as_deref(),
                Some("Reference pixel of lat")
            );
            assert_eq!(part.header.get_f64("CRVAL1"), Some(50.0));
            assert_eq!(
                part.header.get_str("OBJECT"),
                Some(format!("Mosaic skymap ({}/4)", z + 1).as_str())
            );
            assert_eq!(
                part.header.card("OBJECT").unwrap().comment.as_deref(),
                Some("LAB Mosaic (n/tot)")
            );
        }
    }

    #[test]
    fn statistics_cover_only_the_slab() {
        let obs = mosaic(Species::Hi, &[2, 4, 3]);
        let parts = split_mosaic(&obs, 2, SplitAxis::Latitude).unwrap();
        // Second slab: rows 2..4 of each plane.
        let h = &parts[1].header;
        assert_eq!(h.get_f64("DATAMIN"), Some(6.0));
        assert_eq!(h.get_f64("DATAMAX"), Some(23.0));
        assert_eq!(h.get_i64("MAXFIL"), Some(1));
        assert_eq!(h.get_i64("MAXCOL"), Some(1));
        assert_eq!(h.get_i64("MAXROW"), Some(2));
    }

    #[test]
    fn longitude_split_rewrites_axis_one() {
        let obs = mosaic(Species::Hi, &[1, 2, 8]);
        let parts = split_mosaic(&obs, 2, SplitAxis::Longitude).unwrap();
        let xarray = obs.xarray();
        assert_eq!(parts[1].header.get_f64("CRVAL1"), Some(xarray[5]));
        assert_eq!(parts[1].header.get_i64("CRPIX1"), Some(2));
        assert_eq!(parts[1].header.get_f64("CRVAL2"), Some(-5.0));
    }

    #[test]
    fn co_cannot_be_split() {
        let obs = mosaic(Species::Co, &[1, 8, 8]);
        assert!(matches!(
            split_mosaic(&obs, 2, SplitAxis::Latitude),
            Err(Error::UnsupportedSpecies {
                species: Species::Co,
                ..
            })
        ));
    }

    // ---- writing ----

    #[test]
    fn file_names_follow_emission_order() {
        let obs = mosaic(Species::HiUnabsorbed, &[1, 8, 2]);
        let parts = split_mosaic(&obs, 2, SplitAxis::Latitude).unwrap();
        assert_eq!(
            parts[0].file_name(&obs.identity),
            "LAB_skymap_HI_unabsorbed_line_part_1-2.fits"
        );
        assert_eq!(
            parts[1].file_name(&obs.identity),
            "LAB_skymap_HI_unabsorbed_line_part_2-2.fits"
        );
    }

    #[test]
    fn existing_part_blocks_every_write() {
        let dir = tempfile::tempdir().unwrap();
        let obs = mosaic(Species::Hi, &[1, 8, 2]);
        let parts = split_mosaic(&obs, 2, SplitAxis::Latitude).unwrap();
        let second = dir.path().join(parts[1].file_name(&obs.identity));
        std::fs::write(&second, b"").unwrap();

        let err = write_partitions(&parts, &obs.identity, dir.path(), false).unwrap_err();
        assert!(matches!(err, Error::OutputExists(p) if p == second));
        assert!(!dir.path().join(parts[0].file_name(&obs.identity)).exists());

        let written = write_partitions(&parts, &obs.identity, dir.path(), true).unwrap();
        assert_eq!(written.len(), 2);
        assert!(written.iter().all(|p| p.is_file()));
    }
}
