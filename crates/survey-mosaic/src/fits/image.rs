//! Primary HDU image reading and writing.
//!
//! Cubes are exchanged as `ArrayD<f32>` in C order, so the array shape is the
//! FITS `NAXISn` list reversed: a `(NAXIS1, NAXIS2, NAXIS3)` cube becomes an
//! array of shape `[NAXIS3, NAXIS2, NAXIS1]`. Integer data is calibrated with
//! BSCALE/BZERO on read and BLANK pixels become NaN; output is always
//! BITPIX = -32.

use std::path::Path;

use bytemuck::pod_collect_to_vec;
use log::debug;
use ndarray::{ArrayD, ArrayViewD, IxDyn};

use super::block::{pad_to_block, padded_byte_len, DATA_PAD_BYTE};
use super::header::{
    is_structural, parse_header, serialize_header, verify_header, Card, Header, Verify,
};
use crate::error::{Error, Result};

const VALID_BITPIX: [i64; 6] = [8, 16, 32, 64, -32, -64];

/// An image read from, or about to be written to, a primary HDU.
#[derive(Debug, Clone)]
pub struct ImageHdu {
    /// Metadata cards, without the structural keywords describing the array.
    pub header: Header,
    pub data: ArrayD<f32>,
}

fn required_integer(header: &Header, keyword: &str) -> Result<i64> {
    header
        .get_i64(keyword)
        .ok_or_else(|| Error::MissingKeyword(keyword.to_string()))
}

/// Parse the primary HDU image from an in-memory FITS file.
pub fn read_primary_image(fits_data: &[u8]) -> Result<ImageHdu> {
    let (cards, header_len) = parse_header(fits_data)?;

    if cards.get("SIMPLE").is_none() {
        return Err(Error::MissingKeyword("SIMPLE".into()));
    }
    let bitpix = required_integer(&cards, "BITPIX")?;
    if !VALID_BITPIX.contains(&bitpix) {
        return Err(Error::InvalidBitpix(bitpix));
    }
    let naxis = required_integer(&cards, "NAXIS")?;
    if naxis <= 0 {
        return Err(Error::InvalidHeader("primary HDU holds no image"));
    }

    let mut shape = Vec::with_capacity(naxis as usize);
    for i in 1..=naxis {
        let n = required_integer(&cards, &format!("NAXIS{i}"))?;
        shape.push(usize::try_from(n).map_err(|_| Error::InvalidHeader("negative NAXISn"))?);
    }
    shape.reverse();

    let npix: usize = shape.iter().product();
    let bytes_per_pixel = (bitpix.unsigned_abs() / 8) as usize;
    let end = header_len + npix * bytes_per_pixel;
    if fits_data.len() < end {
        return Err(Error::UnexpectedEof);
    }
    let raw = &fits_data[header_len..end];

    let bscale = cards.get_f64("BSCALE").unwrap_or(1.0);
    let bzero = cards.get_f64("BZERO").unwrap_or(0.0);
    let blank = cards.get_i64("BLANK");
    let pixels = decode_pixels(raw, bitpix, bscale, bzero, blank)?;
    debug!("decoded {npix} pixels, BITPIX {bitpix}, shape {shape:?}");

    let mut header = Header::new();
    for card in cards.iter().filter(|c| !is_structural(&c.keyword)) {
        header.push_card(card.clone());
    }

    Ok(ImageHdu {
        header,
        data: ArrayD::from_shape_vec(IxDyn(&shape), pixels)?,
    })
}

fn decode_pixels(
    raw: &[u8],
    bitpix: i64,
    bscale: f64,
    bzero: f64,
    blank: Option<i64>,
) -> Result<Vec<f32>> {
    let calibrate = |v: i64| -> f32 {
        if blank == Some(v) {
            f32::NAN
        } else {
            (bzero + bscale * v as f64) as f32
        }
    };
    let scaled = bscale != 1.0 || bzero != 0.0;

    let pixels: Vec<f32> = match bitpix {
        8 => raw.iter().map(|&b| calibrate(i64::from(b))).collect(),
        16 => pod_collect_to_vec::<u8, i16>(raw)
            .into_iter()
            .map(|v| calibrate(i64::from(i16::from_be(v))))
            .collect(),
        32 => pod_collect_to_vec::<u8, i32>(raw)
            .into_iter()
            .map(|v| calibrate(i64::from(i32::from_be(v))))
            .collect(),
        64 => pod_collect_to_vec::<u8, i64>(raw)
            .into_iter()
            .map(|v| calibrate(i64::from_be(v)))
            .collect(),
        -32 => pod_collect_to_vec::<u8, u32>(raw)
            .into_iter()
            .map(|v| {
                let x = f32::from_bits(u32::from_be(v));
                if scaled {
                    (bzero + bscale * f64::from(x)) as f32
                } else {
                    x
                }
            })
            .collect(),
        -64 => pod_collect_to_vec::<u8, u64>(raw)
            .into_iter()
            .map(|v| (bzero + bscale * f64::from_bits(u64::from_be(v))) as f32)
            .collect(),
        other => return Err(Error::InvalidBitpix(other)),
    };
    Ok(pixels)
}

/// Serialize `data` and `header` as a single primary HDU with BITPIX = -32.
///
/// The metadata is checked with [`verify_header`] first, so in
/// [`Verify::Fix`] mode legacy header quirks are repaired instead of
/// rejected.
pub fn serialize_primary_image(
    header: &Header,
    data: &ArrayViewD<'_, f32>,
    verify: Verify,
) -> Result<Vec<u8>> {
    let (metadata, _) = verify_header(header, verify)?;

    let mut cards = vec![
        Card::new("SIMPLE", true, "conforms to FITS standard"),
        Card::new("BITPIX", -32i64, "array data type"),
        Card::new("NAXIS", data.ndim(), "number of array dimensions"),
    ];
    for (i, &len) in data.shape().iter().rev().enumerate() {
        cards.push(Card::new(&format!("NAXIS{}", i + 1), len, ""));
    }
    cards.push(Card::new("EXTEND", true, ""));

    let mut buf = serialize_header(cards.iter().chain(metadata.iter()));
    let header_len = buf.len();

    // Logical iteration order is C order even for views with negative strides.
    let words: Vec<u32> = data.iter().map(|v| v.to_bits().to_be()).collect();
    buf.extend_from_slice(&pod_collect_to_vec::<u32, u8>(&words));
    pad_to_block(&mut buf, DATA_PAD_BYTE);
    debug_assert_eq!(buf.len(), header_len + padded_byte_len(words.len() * 4));
    Ok(buf)
}

/// Read the primary image of the FITS file at `path`.
pub fn read_fits(path: &Path) -> Result<ImageHdu> {
    let bytes = std::fs::read(path)?;
    read_primary_image(&bytes)
}

/// Write `data` with `header` to `path`, replacing any existing file.
pub fn write_fits(
    path: &Path,
    header: &Header,
    data: &ArrayViewD<'_, f32>,
    verify: Verify,
) -> Result<()> {
    let bytes = serialize_primary_image(header, data, verify)?;
    std::fs::write(path, bytes)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fits::block::{BLOCK_SIZE, CARD_SIZE, HEADER_PAD_BYTE};
    use ndarray::{Array, Axis};

    fn raw_hdu(cards: &[String], data: &[u8]) -> Vec<u8> {
        let mut buf = Vec::new();
        for c in cards.iter().map(String::as_str).chain(["END"]) {
            let mut card = [b' '; CARD_SIZE];
            card[..c.len()].copy_from_slice(c.as_bytes());
            buf.extend_from_slice(&card);
        }
        pad_to_block(&mut buf, HEADER_PAD_BYTE);
        buf.extend_from_slice(data);
        pad_to_block(&mut buf, DATA_PAD_BYTE);
        buf
    }

    fn kv(key: &str, value: &str) -> String {
        format!("{key:<8}= {value:>20}")
    }

    // ---- read ----

    #[test]
    fn read_int16_with_scaling_and_blank() {
        let values: [i16; 4] = [1, 2, -32768, 4];
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = raw_hdu(
            &[
                kv("SIMPLE", "T"),
                kv("BITPIX", "16"),
                kv("NAXIS", "2"),
                kv("NAXIS1", "2"),
                kv("NAXIS2", "2"),
                kv("BSCALE", "0.5"),
                kv("BZERO", "10.0"),
                kv("BLANK", "-32768"),
                kv("CDELT1", "-0.5"),
            ],
            &data,
        );
        let hdu = read_primary_image(&bytes).unwrap();
        assert_eq!(hdu.data.shape(), &[2, 2]);
        assert_eq!(hdu.data[[0, 0]], 10.5);
        assert_eq!(hdu.data[[0, 1]], 11.0);
        assert!(hdu.data[[1, 0]].is_nan());
        assert_eq!(hdu.data[[1, 1]], 12.0);
        assert_eq!(hdu.header.keywords().collect::<Vec<_>>(), ["CDELT1"]);
    }

    #[test]
    fn read_shape_is_reversed() {
        let values: Vec<f32> = (0..24).map(|i| i as f32).collect();
        let data: Vec<u8> = values.iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = raw_hdu(
            &[
                kv("SIMPLE", "T"),
                kv("BITPIX", "-32"),
                kv("NAXIS", "3"),
                kv("NAXIS1", "4"),
                kv("NAXIS2", "3"),
                kv("NAXIS3", "2"),
            ],
            &data,
        );
        let hdu = read_primary_image(&bytes).unwrap();
        assert_eq!(hdu.data.shape(), &[2, 3, 4]);
        // NAXIS1 varies fastest.
        assert_eq!(hdu.data[[0, 0, 1]], 1.0);
        assert_eq!(hdu.data[[1, 2, 3]], 23.0);
    }

    #[test]
    fn read_float64() {
        let data: Vec<u8> = [1.25f64, -2.5].iter().flat_map(|v| v.to_be_bytes()).collect();
        let bytes = raw_hdu(
            &[
                kv("SIMPLE", "T"),
                kv("BITPIX", "-64"),
                kv("NAXIS", "1"),
                kv("NAXIS1", "2"),
            ],
            &data,
        );
        let hdu = read_primary_image(&bytes).unwrap();
        assert_eq!(hdu.data.as_slice().unwrap(), &[1.25, -2.5]);
    }

    #[test]
    fn read_rejects_bad_bitpix() {
        let bytes = raw_hdu(
            &[
                kv("SIMPLE", "T"),
                kv("BITPIX", "12"),
                kv("NAXIS", "1"),
                kv("NAXIS1", "2"),
            ],
            &[],
        );
        assert!(matches!(
            read_primary_image(&bytes),
            Err(Error::InvalidBitpix(12))
        ));
    }

    #[test]
    fn read_rejects_empty_primary() {
        let bytes = raw_hdu(&[kv("SIMPLE", "T"), kv("BITPIX", "8"), kv("NAXIS", "0")], &[]);
        assert!(matches!(
            read_primary_image(&bytes),
            Err(Error::InvalidHeader(_))
        ));
    }

    #[test]
    fn read_truncated_data_is_eof() {
        let mut bytes = raw_hdu(
            &[
                kv("SIMPLE", "T"),
                kv("BITPIX", "-32"),
                kv("NAXIS", "1"),
                kv("NAXIS1", "1000"),
            ],
            &[0u8; 16],
        );
        bytes.truncate(BLOCK_SIZE + 16);
        assert!(matches!(read_primary_image(&bytes), Err(Error::UnexpectedEof)));
    }

    #[test]
    fn read_missing_naxisn() {
        let bytes = raw_hdu(&[kv("SIMPLE", "T"), kv("BITPIX", "8"), kv("NAXIS", "2")], &[]);
        assert!(matches!(
            read_primary_image(&bytes),
            Err(Error::MissingKeyword(k)) if k == "NAXIS1"
        ));
    }

    // ---- write ----

    #[test]
    fn serialize_then_read_back() {
        let data = Array::from_shape_fn(IxDyn(&[2, 3, 5]), |ix| {
            (ix[0] * 100 + ix[1] * 10 + ix[2]) as f32
        });
        let mut header = Header::new();
        header.set("OBJECT", "LAB Mosaic skymap", "LAB Mosaic");
        let bytes = serialize_primary_image(&header, &data.view(), Verify::Fix).unwrap();
        assert_eq!(bytes.len() % BLOCK_SIZE, 0);

        let back = read_primary_image(&bytes).unwrap();
        assert_eq!(back.data, data);
        assert_eq!(back.header.keywords().collect::<Vec<_>>(), ["OBJECT"]);
    }

    #[test]
    fn serialize_inverted_view_in_logical_order() {
        let mut data = Array::from_shape_vec(IxDyn(&[1, 3]), vec![1.0f32, 2.0, 3.0]).unwrap();
        data.invert_axis(Axis(1));
        let bytes = serialize_primary_image(&Header::new(), &data.view(), Verify::Fix).unwrap();
        let back = read_primary_image(&bytes).unwrap();
        assert_eq!(back.data.as_slice().unwrap(), &[3.0, 2.0, 1.0]);
    }

    #[test]
    fn write_and_read_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cube.fits");
        let data = Array::from_elem(IxDyn(&[2, 2]), 7.5f32);
        write_fits(&path, &Header::new(), &data.view(), Verify::Fix).unwrap();
        let back = read_fits(&path).unwrap();
        assert_eq!(back.data, data);
    }
}
