//! Inflate raster streams and undo PNG row prediction.

use crate::error::{CompressError, ErrorKind, Result};
use flate2::read::ZlibDecoder;
use std::io::Read;

/// Inflate a zlib (FlateDecode) payload
pub fn inflate(data: &[u8]) -> Result<Vec<u8>> {
    let mut decoder = ZlibDecoder::new(data);
    let mut decoded = Vec::new();
    decoder.read_to_end(&mut decoded).map_err(|e| {
        CompressError::new(
            ErrorKind::InflateError,
            format!("Failed to decompress image stream: {}", e),
        )
    })?;
    Ok(decoded)
}

/// Reverse PNG per-row filtering.
///
/// `data` holds `height` rows of one filter-type byte followed by
/// `width * bytes_per_pixel` filtered bytes. Trailing bytes past the last
/// row are ignored.
pub fn png_unfilter(data: &[u8], width: usize, height: usize, bytes_per_pixel: usize) -> Result<Vec<u8>> {
    let row_size = width * bytes_per_pixel;
    let expected = height * (row_size + 1);
    if data.len() < expected {
        return Err(CompressError::new(
            ErrorKind::StreamCorrupt,
            format!(
                "Image data stream is truncated: got {} bytes, expected {}",
                data.len(),
                expected
            ),
        ));
    }

    let mut out = vec![0u8; height * row_size];
    let mut prev_row = vec![0u8; row_size];

    for (y, src) in data[..expected].chunks_exact(row_size + 1).enumerate() {
        let filter = src[0];
        let row = &src[1..];
        let cur = &mut out[y * row_size..(y + 1) * row_size];

        match filter {
            0 => cur.copy_from_slice(row),
            1 => {
                for i in 0..row_size {
                    let left = if i >= bytes_per_pixel { cur[i - bytes_per_pixel] } else { 0 };
                    cur[i] = row[i].wrapping_add(left);
                }
            }
            2 => {
                for i in 0..row_size {
                    cur[i] = row[i].wrapping_add(prev_row[i]);
                }
            }
            3 => {
                for i in 0..row_size {
                    let left = if i >= bytes_per_pixel { cur[i - bytes_per_pixel] } else { 0 };
                    let avg = ((u16::from(left) + u16::from(prev_row[i])) / 2) as u8;
                    cur[i] = row[i].wrapping_add(avg);
                }
            }
            4 => {
                for i in 0..row_size {
                    let a = if i >= bytes_per_pixel { cur[i - bytes_per_pixel] } else { 0 };
                    let b = prev_row[i];
                    let c = if i >= bytes_per_pixel { prev_row[i - bytes_per_pixel] } else { 0 };
                    cur[i] = row[i].wrapping_add(paeth(a, b, c));
                }
            }
            other => {
                return Err(CompressError::new(
                    ErrorKind::PngFilterUnsupported,
                    format!("Unsupported PNG filter type {} in row {}", other, y),
                ));
            }
        }

        prev_row.copy_from_slice(cur);
    }

    Ok(out)
}

/// Paeth predictor; ties prefer left, then up, then upper-left.
pub(crate) fn paeth(a: u8, b: u8, c: u8) -> u8 {
    let p = i16::from(a) + i16::from(b) - i16::from(c);
    let pa = (p - i16::from(a)).abs();
    let pb = (p - i16::from(b)).abs();
    let pc = (p - i16::from(c)).abs();
    if pa <= pb && pa <= pc {
        a
    } else if pb <= pc {
        b
    } else {
        c
    }
}

/// Inflate a FlateDecode image payload and undo its predictor.
///
/// Returns exactly `width * height * bytes_per_pixel` raw sample bytes.
pub fn decode_flate_image(
    compressed: &[u8],
    width: usize,
    height: usize,
    predictor: Option<i64>,
    columns: Option<i64>,
    bytes_per_pixel: usize,
) -> Result<Vec<u8>> {
    let inflated = inflate(compressed)?;

    match predictor.unwrap_or(1) {
        10..=15 => {
            let columns = columns.unwrap_or(width as i64);
            if columns != width as i64 {
                return Err(CompressError::new(
                    ErrorKind::PredictorMismatch,
                    format!("Predictor columns {} do not match image width {}", columns, width),
                ));
            }
            png_unfilter(&inflated, width, height, bytes_per_pixel)
        }
        1 => {
            let expected = width * height * bytes_per_pixel;
            if inflated.len() < expected {
                return Err(CompressError::new(
                    ErrorKind::StreamCorrupt,
                    format!(
                        "Image data too short: got {} bytes, expected {}",
                        inflated.len(),
                        expected
                    ),
                ));
            }
            let mut raw = inflated;
            raw.truncate(expected);
            Ok(raw)
        }
        other => Err(CompressError::new(
            ErrorKind::PredictorUnsupported,
            format!("Unsupported Predictor value: {}", other),
        )),
    }
}
