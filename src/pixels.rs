//! Map raw 8-bit samples to the canonical RGBA buffer.

use crate::colorspace::ColorSpaceInfo;
use crate::error::{CompressError, ErrorKind, Result};
use image::RgbaImage;

/// Convert raw samples into an opaque RGBA image.
///
/// CMYK uses the naive multiplicative formula, not an ICC transform.
/// Indexed samples that fall outside the lookup table become opaque black.
pub fn to_rgba(raw: &[u8], color_space: &ColorSpaceInfo, width: u32, height: u32) -> Result<RgbaImage> {
    let bpp = color_space
        .bytes_per_pixel()
        .ok_or_else(|| unsupported(color_space))?;

    let pixel_count = width as usize * height as usize;
    if raw.len() < pixel_count * bpp {
        return Err(CompressError::new(
            ErrorKind::StreamCorrupt,
            format!(
                "{} samples too short: got {} bytes, expected {}",
                color_space.name(),
                raw.len(),
                pixel_count * bpp
            ),
        ));
    }

    let mut rgba = Vec::with_capacity(pixel_count * 4);
    let samples = raw[..pixel_count * bpp].chunks_exact(bpp);

    match color_space {
        ColorSpaceInfo::DeviceGray => {
            for s in samples {
                rgba.extend_from_slice(&[s[0], s[0], s[0], 255]);
            }
        }
        ColorSpaceInfo::DeviceRgb => {
            for s in samples {
                rgba.extend_from_slice(&[s[0], s[1], s[2], 255]);
            }
        }
        ColorSpaceInfo::DeviceCmyk => {
            for s in samples {
                let [r, g, b] = cmyk_to_rgb(s[0], s[1], s[2], s[3]);
                rgba.extend_from_slice(&[r, g, b, 255]);
            }
        }
        ColorSpaceInfo::Indexed { lookup } => {
            for s in samples {
                let at = s[0] as usize * 3;
                match lookup.get(at..at + 3) {
                    Some(rgb) => rgba.extend_from_slice(&[rgb[0], rgb[1], rgb[2], 255]),
                    None => rgba.extend_from_slice(&[0, 0, 0, 255]),
                }
            }
        }
        ColorSpaceInfo::Unknown => return Err(unsupported(color_space)),
    }

    RgbaImage::from_raw(width, height, rgba).ok_or_else(|| {
        CompressError::new(ErrorKind::ImageProcessing, "Failed to build RGBA buffer")
    })
}

fn unsupported(color_space: &ColorSpaceInfo) -> CompressError {
    CompressError::new(
        ErrorKind::ColorspaceUnsupported,
        format!("Unsupported color space type: {}", color_space.name()),
    )
}

fn cmyk_to_rgb(c: u8, m: u8, y: u8, k: u8) -> [u8; 3] {
    let k = f32::from(k) / 255.0;
    let channel = |v: u8| {
        let v = f32::from(v) / 255.0;
        (255.0 * (1.0 - (v * (1.0 - k) + k).min(1.0))).round() as u8
    };
    [channel(c), channel(m), channel(y)]
}
