//! Pixel rectangle reading for frame validation.
//!
//! FITS stores pixel words big-endian; integer types are shifted by
//! BZERO/BSCALE. Values are returned in native ADU so statistical
//! thresholds can be expressed in sensor units.

use std::fs::File;
use std::io::{BufReader, Read};
use std::path::Path;

use byteorder::{BigEndian, ReadBytesExt};
use ndarray::Array2;

use crate::error::{DarkLibError, Result};
use crate::fits::FitsHeader;

/// Read the full pixel rectangle of the primary HDU into ADU.
///
/// For cubes (NAXIS > 2) only the first plane is read; dark frames are
/// two-dimensional.
pub fn read_pixels(path: &Path) -> Result<Array2<f32>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let header = FitsHeader::read_from(&mut reader)?;
    read_pixels_after_header(&mut reader, &header)
}

/// Read pixels from a reader positioned at the start of the data unit.
pub fn read_pixels_after_header<R: Read>(
    reader: &mut R,
    header: &FitsHeader,
) -> Result<Array2<f32>> {
    let bitpix = header
        .get_int("BITPIX")
        .ok_or_else(|| DarkLibError::InvalidFits("missing BITPIX".into()))?;
    let naxis = header
        .get_int("NAXIS")
        .ok_or_else(|| DarkLibError::InvalidFits("missing NAXIS".into()))?;
    if naxis < 2 {
        return Err(DarkLibError::InvalidFits(format!(
            "expected a 2-D image, got NAXIS={naxis}"
        )));
    }
    let width = header
        .get_int("NAXIS1")
        .ok_or_else(|| DarkLibError::InvalidFits("missing NAXIS1".into()))? as usize;
    let height = header
        .get_int("NAXIS2")
        .ok_or_else(|| DarkLibError::InvalidFits("missing NAXIS2".into()))? as usize;
    if width == 0 || height == 0 {
        return Err(DarkLibError::InvalidFits(format!(
            "degenerate image dimensions {width}x{height}"
        )));
    }

    let bzero = header.get_real("BZERO").unwrap_or(0.0);
    let bscale = header.get_real("BSCALE").unwrap_or(1.0);
    let n = width * height;

    let mut values = vec![0.0f32; n];
    match bitpix {
        8 => {
            let mut raw = vec![0u8; n];
            reader.read_exact(&mut raw)?;
            for (out, &v) in values.iter_mut().zip(raw.iter()) {
                *out = (v as f64 * bscale + bzero) as f32;
            }
        }
        16 => {
            let mut raw = vec![0i16; n];
            reader.read_i16_into::<BigEndian>(&mut raw)?;
            for (out, &v) in values.iter_mut().zip(raw.iter()) {
                *out = (v as f64 * bscale + bzero) as f32;
            }
        }
        32 => {
            let mut raw = vec![0i32; n];
            reader.read_i32_into::<BigEndian>(&mut raw)?;
            for (out, &v) in values.iter_mut().zip(raw.iter()) {
                *out = (v as f64 * bscale + bzero) as f32;
            }
        }
        -32 => {
            let mut raw = vec![0.0f32; n];
            reader.read_f32_into::<BigEndian>(&mut raw)?;
            for (out, &v) in values.iter_mut().zip(raw.iter()) {
                *out = (v as f64 * bscale + bzero) as f32;
            }
        }
        -64 => {
            let mut raw = vec![0.0f64; n];
            reader.read_f64_into::<BigEndian>(&mut raw)?;
            for (out, &v) in values.iter_mut().zip(raw.iter()) {
                *out = (v * bscale + bzero) as f32;
            }
        }
        other => return Err(DarkLibError::UnsupportedBitpix(other)),
    }

    Array2::from_shape_vec((height, width), values)
        .map_err(|e| DarkLibError::InvalidFits(format!("pixel buffer shape: {e}")))
}
