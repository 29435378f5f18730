//! Re-encode one image at a quality/resolution budget.

use crate::codec::RasterCodec;
use crate::colorspace::ColorSpaceInfo;
use crate::decode::decode_flate_image;
use crate::error::{CompressError, ErrorKind, Result};
use crate::pixels::to_rgba;
use image::{RgbImage, RgbaImage};

/// Encoded payload of an image XObject
#[derive(Debug, Clone, Copy)]
pub enum ImageSource<'a> {
    /// DCTDecode payload
    Jpeg(&'a [u8]),
    /// FlateDecode payload with its decode parameters
    Raw {
        data: &'a [u8],
        color_space: &'a ColorSpaceInfo,
        predictor: Option<i64>,
        columns: Option<i64>,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RecompressParams {
    /// JPEG quality factor in `[0, 1]`
    pub quality: f32,
    /// Longest allowed side; `None` is unbounded
    pub max_dimension: Option<u32>,
    /// The image carries a soft mask. Pixels are encoded as-is instead of
    /// being flattened onto white.
    pub has_alpha: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecompressedImage {
    pub data: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

/// Drop APP1 (EXIF/XMP) segments from a JPEG.
///
/// All other marker segments, and everything from the SOS marker on, are
/// copied byte for byte. Input that does not start with SOI is returned
/// unchanged.
pub fn strip_exif(jpeg: &[u8]) -> Vec<u8> {
    if jpeg.len() < 2 || jpeg[0] != 0xFF || jpeg[1] != 0xD8 {
        return jpeg.to_vec();
    }

    let mut out = Vec::with_capacity(jpeg.len());
    out.extend_from_slice(&jpeg[..2]);
    let mut offset = 2;

    while offset < jpeg.len() {
        if jpeg[offset] != 0xFF || offset + 1 >= jpeg.len() {
            break;
        }
        let marker = jpeg[offset + 1];
        if marker == 0xFF {
            // fill byte
            out.push(0xFF);
            offset += 1;
            continue;
        }
        if marker == 0xDA {
            break;
        }
        if offset + 3 >= jpeg.len() {
            break;
        }

        let len = usize::from(u16::from_be_bytes([jpeg[offset + 2], jpeg[offset + 3]]));
        let end = (offset + 2 + len).min(jpeg.len());
        if marker != 0xE1 {
            out.extend_from_slice(&jpeg[offset..end]);
        }
        offset = end;
    }

    out.extend_from_slice(&jpeg[offset.min(jpeg.len())..]);
    out
}

/// Fit `width` x `height` inside `max_dimension` on the longer side,
/// keeping the aspect ratio.
pub fn target_dimensions(width: u32, height: u32, max_dimension: Option<u32>) -> (u32, u32) {
    let Some(max) = max_dimension else {
        return (width, height);
    };
    if width <= max && height <= max {
        return (width, height);
    }

    let ratio = f64::from(width) / f64::from(height);
    if width > height {
        let h = (f64::from(max) / ratio).round() as u32;
        (max, h.max(1))
    } else {
        let w = (f64::from(max) * ratio).round() as u32;
        (w.max(1), max)
    }
}

/// Composite RGBA pixels over an opaque white background
pub fn flatten_onto_white(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, a] = image.get_pixel(x, y).0;
        let a = u16::from(a);
        let blend = |c: u8| ((u16::from(c) * a + 255 * (255 - a) + 127) / 255) as u8;
        image::Rgb([blend(r), blend(g), blend(b)])
    })
}

/// Drop the alpha channel without compositing
fn discard_alpha(image: &RgbaImage) -> RgbImage {
    RgbImage::from_fn(image.width(), image.height(), |x, y| {
        let [r, g, b, _] = image.get_pixel(x, y).0;
        image::Rgb([r, g, b])
    })
}

/// Decode, optionally downscale, and JPEG-encode one image.
///
/// `orig_width`/`orig_height` come from the image dictionary. For JPEG
/// sources the decoded dimensions win, so the result may differ from the
/// dictionary even without a cap; callers that need lockstep dimensions
/// must compare.
pub fn recompress_image(
    codec: &dyn RasterCodec,
    source: ImageSource<'_>,
    params: &RecompressParams,
    orig_width: u32,
    orig_height: u32,
) -> Result<RecompressedImage> {
    let pixels = match source {
        ImageSource::Jpeg(data) => codec.decode_jpeg(&strip_exif(data))?,
        ImageSource::Raw {
            data,
            color_space,
            predictor,
            columns,
        } => {
            let bpp = color_space.bytes_per_pixel().ok_or_else(|| {
                CompressError::new(
                    ErrorKind::ColorspaceUnsupported,
                    format!("Unsupported color space type: {}", color_space.name()),
                )
            })?;
            let raw = decode_flate_image(
                data,
                orig_width as usize,
                orig_height as usize,
                predictor,
                columns,
                bpp,
            )?;
            to_rgba(&raw, color_space, orig_width, orig_height)?
        }
    };

    let (src_width, src_height) = pixels.dimensions();
    let (width, height) = target_dimensions(src_width, src_height, params.max_dimension);

    let pixels = if (width, height) != (src_width, src_height) {
        log::debug!("Scaling {}x{} -> {}x{}", src_width, src_height, width, height);
        codec.resize(&pixels, width, height)?
    } else {
        pixels
    };

    let rgb = if params.has_alpha {
        discard_alpha(&pixels)
    } else {
        flatten_onto_white(&pixels)
    };
    let data = codec.encode_jpeg(&rgb, params.quality)?;

    Ok(RecompressedImage { data, width, height })
}
