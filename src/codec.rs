//! Raster codec capability.
//!
//! The recompression engine only talks to a [`RasterCodec`], so hosts can
//! plug in their own decoder/encoder. [`ImageCodec`] is the in-process
//! implementation built on the `image` and `jpeg-encoder` crates.

use crate::error::{CompressError, ErrorKind, Result};
use image::imageops::FilterType;
use image::{ImageFormat, RgbImage, RgbaImage};

pub trait RasterCodec {
    /// Decode an encoded JPEG into RGBA pixels
    fn decode_jpeg(&self, data: &[u8]) -> Result<RgbaImage>;

    /// Encode RGB pixels as a baseline JPEG. `quality` is in `[0, 1]`.
    fn encode_jpeg(&self, image: &RgbImage, quality: f32) -> Result<Vec<u8>>;

    /// High-quality resample to exactly `width` x `height`
    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage>;
}

/// Map a `[0, 1]` quality factor onto the encoder's 1..=100 scale
pub fn jpeg_quality(quality: f32) -> u8 {
    (quality * 100.0).round().clamp(1.0, 100.0) as u8
}

/// Reference codec backed by `image` (decode, resize) and `jpeg-encoder` (encode)
#[derive(Debug, Clone, Copy, Default)]
pub struct ImageCodec;

impl RasterCodec for ImageCodec {
    fn decode_jpeg(&self, data: &[u8]) -> Result<RgbaImage> {
        let img = image::load_from_memory_with_format(data, ImageFormat::Jpeg).map_err(|e| {
            CompressError::new(
                ErrorKind::ImageDecodeFailed,
                format!("Failed to decode embedded JPEG image: {}", e),
            )
        })?;
        Ok(img.to_rgba8())
    }

    fn encode_jpeg(&self, image: &RgbImage, quality: f32) -> Result<Vec<u8>> {
        let (width, height) = image.dimensions();
        let (w, h) = match (u16::try_from(width), u16::try_from(height)) {
            (Ok(w), Ok(h)) => (w, h),
            _ => {
                return Err(CompressError::new(
                    ErrorKind::BlobFailed,
                    format!("{}x{} exceeds the JPEG size limit", width, height),
                ))
            }
        };

        let mut jpeg_bytes = Vec::new();
        let mut encoder = jpeg_encoder::Encoder::new(&mut jpeg_bytes, jpeg_quality(quality));
        encoder.set_sampling_factor(jpeg_encoder::SamplingFactor::R_4_2_0);
        encoder
            .encode(image.as_raw(), w, h, jpeg_encoder::ColorType::Rgb)
            .map_err(|e| {
                CompressError::new(
                    ErrorKind::BlobFailed,
                    format!("Failed to generate compressed image: {}", e),
                )
            })?;

        Ok(jpeg_bytes)
    }

    fn resize(&self, image: &RgbaImage, width: u32, height: u32) -> Result<RgbaImage> {
        if width == 0 || height == 0 {
            return Err(CompressError::new(
                ErrorKind::CanvasAllocFailed,
                format!("Failed to allocate {}x{} scaling buffer", width, height),
            ));
        }
        Ok(image::imageops::resize(image, width, height, FilterType::Lanczos3))
    }
}
