//! PDF Squeeze Library
//!
//! Shrinks PDFs by recompressing their embedded raster images as JPEG and
//! repacking the document structure. Shared between CLI and WASM targets.
//!
//! Images are decoded from DCTDecode or FlateDecode (with PNG predictors),
//! mapped to RGB, optionally downscaled and re-encoded. An image is only
//! replaced when the new encoding is smaller, and the whole document is only
//! replaced when the final file is smaller than the input.

pub mod cancel;
pub mod cleanup;
pub mod codec;
pub mod colorspace;
pub mod decode;
pub mod error;
pub mod inventory;
pub mod object;
pub mod orchestrator;
pub mod pixels;
pub mod recompress;
pub mod security;

#[cfg(target_arch = "wasm32")]
pub mod wasm;

use std::fmt;
use std::str::FromStr;

pub use cancel::CancellationToken;
pub use cleanup::{CleanupDocument, CleanupOptions, LopdfCleanup, StructuralCleanup, CLEANUP_OPTIONS};
pub use codec::{ImageCodec, RasterCodec};
pub use error::{CompressError, ErrorKind, Result, Severity};
pub use inventory::{extract_pdf_images_info, ImageInfo, PageImages};
pub use orchestrator::{
    CompressResult, ImageOutcome, Pipeline, Progress, SkipReason, Stage, MAX_IMAGE_PIXELS,
};
pub use security::{looks_encrypted, needs_password, validate_input, MAX_INPUT_BYTES};

/// How hard to compress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum CompressionLevel {
    /// Container cleanup only, images untouched
    Lossless,
    #[default]
    Balanced,
    Strong,
}

/// Image budget for a [`CompressionLevel`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LevelSettings {
    /// JPEG quality factor in `[0, 1]`
    pub quality: f32,
    /// Longest allowed image side; `None` is unbounded
    pub max_dimension: Option<u32>,
}

impl CompressionLevel {
    pub const ALL: [CompressionLevel; 3] = [
        CompressionLevel::Lossless,
        CompressionLevel::Balanced,
        CompressionLevel::Strong,
    ];

    pub fn settings(self) -> LevelSettings {
        match self {
            CompressionLevel::Lossless => LevelSettings {
                quality: 1.0,
                max_dimension: None,
            },
            CompressionLevel::Balanced => LevelSettings {
                quality: 0.75,
                max_dimension: Some(1600),
            },
            CompressionLevel::Strong => LevelSettings {
                quality: 0.5,
                max_dimension: Some(900),
            },
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CompressionLevel::Lossless => "lossless",
            CompressionLevel::Balanced => "balanced",
            CompressionLevel::Strong => "strong",
        }
    }
}

impl fmt::Display for CompressionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CompressionLevel {
    type Err = CompressError;

    fn from_str(s: &str) -> Result<Self> {
        CompressionLevel::ALL
            .into_iter()
            .find(|level| level.as_str().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| {
                CompressError::new(
                    ErrorKind::InvalidInput,
                    format!("Unknown compression level '{}' (expected lossless, balanced or strong)", s),
                )
            })
    }
}

/// Options for PDF compression
#[derive(Debug, Clone, Default)]
pub struct CompressOptions {
    pub level: CompressionLevel,
    /// Verbose output
    pub verbose: bool,
}

/// Compress PDF bytes and return the (never larger) output bytes
pub fn compress_pdf_bytes(
    input_bytes: &[u8],
    options: &CompressOptions,
) -> Result<(Vec<u8>, CompressResult)> {
    log::debug!(
        "Compressing {} bytes at level {}",
        input_bytes.len(),
        options.level
    );
    Pipeline::new(options.level).run(input_bytes)
}

#[cfg(not(target_arch = "wasm32"))]
pub mod file_ops {
    use super::*;
    use std::path::Path;

    /// Compress a PDF from file path to file path.
    ///
    /// Inputs over [`MAX_INPUT_BYTES`] or without the `%PDF-` signature are
    /// rejected before parsing.
    pub fn compress_pdf_file(
        input_path: &Path,
        output_path: &Path,
        options: &CompressOptions,
    ) -> Result<CompressResult> {
        let input = std::fs::read(input_path).map_err(|e| {
            CompressError::new(ErrorKind::Io, format!("{:?}: {}", input_path, e))
        })?;
        validate_input(&input, MAX_INPUT_BYTES)?;

        let (output, result) = compress_pdf_bytes(&input, options)?;

        std::fs::write(output_path, &output).map_err(|e| {
            CompressError::new(ErrorKind::Io, format!("{:?}: {}", output_path, e))
        })?;
        Ok(result)
    }
}
