//! Recompression pipeline.
//!
//! Walks every stream in the document, decides per image whether it is a
//! candidate, recompresses candidates and swaps the result in when it is
//! strictly smaller. If anything changed, the document is serialized with
//! object streams and run through the structural cleanup engine. The
//! smaller of cleaned output and original input wins.

use crate::cancel::CancellationToken;
use crate::cleanup::{CleanupOptions, LopdfCleanup, StructuralCleanup, CLEANUP_OPTIONS};
use crate::codec::{ImageCodec, RasterCodec};
use crate::colorspace::ColorSpaceInfo;
use crate::error::{CompressError, ErrorKind, Result, Severity};
use crate::object::{
    filter_chain, get_array, get_bool, get_decode_parms, get_integer, get_name, get_number,
    get_reference, stream_object_ids,
};
use crate::recompress::{recompress_image, ImageSource, RecompressParams, RecompressedImage};
use crate::security::load_document;
use crate::{CompressionLevel, LevelSettings};
use lopdf::{Document, Object, ObjectId, SaveOptions};
use std::collections::HashSet;
use std::fmt;

/// Largest `Width * Height` that will be decoded
pub const MAX_IMAGE_PIXELS: u64 = 16_777_216;

/// Keys that no longer describe the payload after a swap
const STALE_KEYS: [&[u8]; 5] = [b"Mask", b"Decode", b"DecodeParms", b"Predictor", b"Palette"];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stage {
    Loading,
    Images,
    Serializing,
    Cleanup,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    pub stage: Stage,
    pub current: usize,
    pub total: usize,
}

/// Why an object was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    NotRawStream,
    NotImage,
    ImageMask,
    UnsupportedFilter,
    InvalidDimensions,
    TooManyPixels,
    BitsPerComponent(i64),
    /// Referenced as another image's `SMask`
    ProtectedMask,
    /// Has a `Mask` but no `SMask`
    StencilMask,
    UnknownColorSpace,
    /// Non-default `Decode` array
    CustomDecode,
    /// Alpha image whose recompressed size would drift from its mask
    DimensionMismatch,
    NotSmaller,
    Failed(ErrorKind),
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::NotRawStream => write!(f, "not a stream"),
            SkipReason::NotImage => write!(f, "not an image"),
            SkipReason::ImageMask => write!(f, "image mask"),
            SkipReason::UnsupportedFilter => write!(f, "unsupported filter"),
            SkipReason::InvalidDimensions => write!(f, "invalid dimensions"),
            SkipReason::TooManyPixels => write!(f, "too many pixels"),
            SkipReason::BitsPerComponent(n) => write!(f, "{} bits per component", n),
            SkipReason::ProtectedMask => write!(f, "soft mask of another image"),
            SkipReason::StencilMask => write!(f, "has a stencil mask"),
            SkipReason::UnknownColorSpace => write!(f, "unsupported color space"),
            SkipReason::CustomDecode => write!(f, "custom Decode array"),
            SkipReason::DimensionMismatch => write!(f, "dimensions would drift from soft mask"),
            SkipReason::NotSmaller => write!(f, "not smaller"),
            SkipReason::Failed(kind) => write!(f, "failed: {}", kind),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ImageOutcome {
    Swapped {
        old_size: usize,
        new_size: usize,
        width: u32,
        height: u32,
    },
    Skipped(SkipReason),
}

/// Result of a compression run
#[derive(Debug, Clone, Default)]
pub struct CompressResult {
    pub original_size: usize,
    pub output_size: usize,
    pub total_images: usize,
    pub recompressed_images: usize,
    pub skipped_images: usize,
    pub image_bytes_saved: u64,
    pub outcomes: Vec<(ObjectId, ImageOutcome)>,
}

impl CompressResult {
    /// Output is strictly smaller than the input
    pub fn is_reduced(&self) -> bool {
        self.output_size < self.original_size
    }

    pub fn reduction_percent(&self) -> f64 {
        if self.original_size == 0 {
            return 0.0;
        }
        (self.original_size as f64 - self.output_size as f64) / self.original_size as f64 * 100.0
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum CandidateEncoding {
    Jpeg,
    Raw {
        predictor: Option<i64>,
        columns: Option<i64>,
    },
}

/// An image that passed every eligibility filter
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub id: ObjectId,
    pub width: u32,
    pub height: u32,
    pub encoding: CandidateEncoding,
    pub color_space: ColorSpaceInfo,
    pub has_alpha: bool,
    pub encoded_size: usize,
}

/// Targets of every `SMask` reference in the document
pub fn collect_protected_masks(doc: &Document) -> HashSet<ObjectId> {
    doc.objects
        .values()
        .filter_map(|object| match object {
            Object::Dictionary(dict) => get_reference(dict, b"SMask"),
            Object::Stream(stream) => get_reference(&stream.dict, b"SMask"),
            _ => None,
        })
        .collect()
}

fn has_default_decode(doc: &Document, dict: &lopdf::Dictionary) -> bool {
    let Some(items) = get_array(doc, dict, b"Decode") else {
        return true;
    };
    items.chunks(2).all(|pair| {
        let value = |obj: &Object| match obj {
            Object::Integer(n) => Some(*n as f64),
            Object::Real(n) => Some(f64::from(*n)),
            _ => None,
        };
        matches!(pair, [lo, hi] if value(lo) == Some(0.0) && value(hi) == Some(1.0))
    })
}

/// Apply the eligibility filters to one object.
pub fn evaluate_candidate(
    doc: &Document,
    id: ObjectId,
    protected: &HashSet<ObjectId>,
) -> std::result::Result<Candidate, SkipReason> {
    let stream = match doc.get_object(id) {
        Ok(Object::Stream(stream)) => stream,
        _ => return Err(SkipReason::NotRawStream),
    };
    let dict = &stream.dict;

    if get_name(doc, dict, b"Subtype") != Some(&b"Image"[..]) {
        return Err(SkipReason::NotImage);
    }
    if get_bool(doc, dict, b"ImageMask") == Some(true) {
        return Err(SkipReason::ImageMask);
    }

    let encoding = match filter_chain(doc, dict).as_slice() {
        [b"DCTDecode"] => CandidateEncoding::Jpeg,
        [b"FlateDecode"] => {
            let parms = get_decode_parms(doc, dict);
            CandidateEncoding::Raw {
                predictor: parms.and_then(|p| get_integer(doc, p, b"Predictor")),
                columns: parms.and_then(|p| get_integer(doc, p, b"Columns")),
            }
        }
        _ => return Err(SkipReason::UnsupportedFilter),
    };

    let dimension = |key: &[u8]| {
        get_integer(doc, dict, key)
            .filter(|n| *n > 0)
            .and_then(|n| u32::try_from(n).ok())
    };
    let (width, height) = match (dimension(b"Width"), dimension(b"Height")) {
        (Some(w), Some(h)) => (w, h),
        _ => return Err(SkipReason::InvalidDimensions),
    };
    if u64::from(width) * u64::from(height) > MAX_IMAGE_PIXELS {
        return Err(SkipReason::TooManyPixels);
    }

    match get_number(doc, dict, b"BitsPerComponent") {
        None => {}
        Some(bpc) if bpc == 8.0 => {}
        Some(bpc) => return Err(SkipReason::BitsPerComponent(bpc as i64)),
    }

    if protected.contains(&id) {
        return Err(SkipReason::ProtectedMask);
    }
    let has_alpha = dict.has(b"SMask");
    if dict.has(b"Mask") && !has_alpha {
        return Err(SkipReason::StencilMask);
    }

    let color_space = ColorSpaceInfo::resolve(doc, dict);
    if !color_space.is_known() {
        return Err(SkipReason::UnknownColorSpace);
    }
    if !has_default_decode(doc, dict) {
        return Err(SkipReason::CustomDecode);
    }

    Ok(Candidate {
        id,
        width,
        height,
        encoding,
        color_space,
        has_alpha,
        encoded_size: stream.content.len(),
    })
}

/// Replace the payload and the keys describing it in one step.
fn swap_image(doc: &mut Document, candidate: &Candidate, image: RecompressedImage) -> Result<()> {
    let stream = match doc.get_object_mut(candidate.id) {
        Ok(Object::Stream(stream)) => stream,
        _ => {
            return Err(CompressError::new(
                ErrorKind::ImageProcessing,
                format!("Object {:?} is no longer a stream", candidate.id),
            ))
        }
    };

    let dict = &mut stream.dict;
    dict.set("Width", Object::Integer(i64::from(image.width)));
    dict.set("Height", Object::Integer(i64::from(image.height)));
    dict.set("Filter", Object::Name(b"DCTDecode".to_vec()));
    dict.set("ColorSpace", Object::Name(b"DeviceRGB".to_vec()));
    dict.set("BitsPerComponent", Object::Integer(8));
    for key in STALE_KEYS {
        dict.remove(key);
    }
    if !candidate.has_alpha {
        dict.remove(b"SMask");
    }

    stream.set_content(image.data);
    stream.allows_compression = false;
    Ok(())
}

/// One document compression run with pluggable collaborators.
pub struct Pipeline<'a> {
    level: CompressionLevel,
    codec: Box<dyn RasterCodec + 'a>,
    cleanup: Box<dyn StructuralCleanup + 'a>,
    cancel: CancellationToken,
    progress: Option<Box<dyn FnMut(Progress) + 'a>>,
}

impl<'a> Pipeline<'a> {
    pub fn new(level: CompressionLevel) -> Self {
        Self {
            level,
            codec: Box::new(ImageCodec),
            cleanup: Box::new(LopdfCleanup),
            cancel: CancellationToken::new(),
            progress: None,
        }
    }

    pub fn with_codec(mut self, codec: impl RasterCodec + 'a) -> Self {
        self.codec = Box::new(codec);
        self
    }

    pub fn with_cleanup(mut self, cleanup: impl StructuralCleanup + 'a) -> Self {
        self.cleanup = Box::new(cleanup);
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = token;
        self
    }

    pub fn on_progress(mut self, callback: impl FnMut(Progress) + 'a) -> Self {
        self.progress = Some(Box::new(callback));
        self
    }

    fn report(&mut self, stage: Stage, current: usize, total: usize) {
        if let Some(callback) = self.progress.as_mut() {
            callback(Progress { stage, current, total });
        }
    }

    /// Compress `input`. The returned bytes are never larger than `input`.
    pub fn run(&mut self, input: &[u8]) -> Result<(Vec<u8>, CompressResult)> {
        self.report(Stage::Loading, 0, 1);
        let mut doc = load_document(input)?;
        let settings = self.level.settings();

        let mut result = CompressResult {
            original_size: input.len(),
            ..CompressResult::default()
        };

        if self.level == CompressionLevel::Lossless {
            result.total_images = count_images(&doc);
            result.skipped_images = result.total_images;
        } else {
            self.recompress_images(&mut doc, &settings, &mut result)?;
            result.skipped_images = result.total_images - result.recompressed_images;
        }

        self.cancel.check()?;
        let serialized = if self.level != CompressionLevel::Lossless && result.recompressed_images == 0 {
            log::info!("No image got smaller; cleaning up the original document");
            None
        } else {
            self.report(Stage::Serializing, 0, 1);
            Some(serialize_with_object_streams(&mut doc)?)
        };
        drop(doc);
        let phase1 = serialized.as_deref().unwrap_or(input);

        self.cancel.check()?;
        self.report(Stage::Cleanup, 0, 1);
        let options: CleanupOptions = CLEANUP_OPTIONS.parse()?;
        let cleaned = {
            let mut handle = self.cleanup.open(phase1)?;
            handle.save_to_buffer(&options)?
        };

        let output = if cleaned.len() < input.len() {
            cleaned
        } else {
            log::info!(
                "Cleaned output ({} bytes) is not smaller than input ({} bytes); keeping the original",
                cleaned.len(),
                input.len()
            );
            input.to_vec()
        };
        result.output_size = output.len();

        log::info!(
            "{} -> {} bytes ({:.1}%), {} of {} images recompressed",
            result.original_size,
            result.output_size,
            result.reduction_percent(),
            result.recompressed_images,
            result.total_images
        );
        self.report(Stage::Done, 1, 1);
        Ok((output, result))
    }

    fn recompress_images(
        &mut self,
        doc: &mut Document,
        settings: &LevelSettings,
        result: &mut CompressResult,
    ) -> Result<()> {
        let protected = collect_protected_masks(doc);
        let ids = stream_object_ids(doc);
        let total = ids.len();

        for (index, id) in ids.into_iter().enumerate() {
            self.cancel.check()?;
            self.report(Stage::Images, index, total);

            let candidate = match evaluate_candidate(doc, id, &protected) {
                Ok(candidate) => candidate,
                Err(SkipReason::NotRawStream | SkipReason::NotImage) => continue,
                Err(reason) => {
                    log::debug!("Image {:?}: skipped ({})", id, reason);
                    result.total_images += 1;
                    result.outcomes.push((id, ImageOutcome::Skipped(reason)));
                    continue;
                }
            };
            result.total_images += 1;

            let outcome = self.process_candidate(doc, &candidate, settings)?;
            if let ImageOutcome::Swapped { old_size, new_size, .. } = outcome {
                result.recompressed_images += 1;
                result.image_bytes_saved += (old_size - new_size) as u64;
            }
            result.outcomes.push((id, outcome));
        }
        self.report(Stage::Images, total, total);
        Ok(())
    }

    fn process_candidate(
        &self,
        doc: &mut Document,
        candidate: &Candidate,
        settings: &LevelSettings,
    ) -> Result<ImageOutcome> {
        let params = RecompressParams {
            quality: settings.quality,
            max_dimension: if candidate.has_alpha { None } else { settings.max_dimension },
            has_alpha: candidate.has_alpha,
        };

        let recompressed = {
            let content = match doc.get_object(candidate.id) {
                Ok(Object::Stream(stream)) => stream.content.as_slice(),
                _ => return Ok(ImageOutcome::Skipped(SkipReason::NotRawStream)),
            };
            let source = match &candidate.encoding {
                CandidateEncoding::Jpeg => ImageSource::Jpeg(content),
                CandidateEncoding::Raw { predictor, columns } => ImageSource::Raw {
                    data: content,
                    color_space: &candidate.color_space,
                    predictor: *predictor,
                    columns: *columns,
                },
            };
            recompress_image(
                self.codec.as_ref(),
                source,
                &params,
                candidate.width,
                candidate.height,
            )
        };

        let image = match recompressed {
            Ok(image) => image,
            Err(e) if e.severity() == Severity::ImageLocal => {
                log::warn!("Image {:?}: {}", candidate.id, e);
                return Ok(ImageOutcome::Skipped(SkipReason::Failed(e.kind())));
            }
            Err(e) => return Err(e),
        };

        Ok(apply_recompressed(doc, candidate, image))
    }
}

/// Swap `image` in if it keeps the soft-mask geometry and is strictly smaller.
fn apply_recompressed(doc: &mut Document, candidate: &Candidate, image: RecompressedImage) -> ImageOutcome {
    if candidate.has_alpha && (image.width, image.height) != (candidate.width, candidate.height) {
        log::debug!(
            "Image {:?}: {}x{} would become {}x{} next to its soft mask",
            candidate.id,
            candidate.width,
            candidate.height,
            image.width,
            image.height
        );
        return ImageOutcome::Skipped(SkipReason::DimensionMismatch);
    }
    if image.data.len() >= candidate.encoded_size {
        log::debug!(
            "Image {:?}: {} bytes is not smaller than {}",
            candidate.id,
            image.data.len(),
            candidate.encoded_size
        );
        return ImageOutcome::Skipped(SkipReason::NotSmaller);
    }

    let outcome = ImageOutcome::Swapped {
        old_size: candidate.encoded_size,
        new_size: image.data.len(),
        width: image.width,
        height: image.height,
    };
    log::debug!(
        "Image {:?} ({}): {}x{} {} -> {}x{} {} bytes",
        candidate.id,
        candidate.color_space.name(),
        candidate.width,
        candidate.height,
        candidate.encoded_size,
        image.width,
        image.height,
        image.data.len()
    );
    if let Err(e) = swap_image(doc, candidate, image) {
        log::warn!("Image {:?}: {}", candidate.id, e);
        return ImageOutcome::Skipped(SkipReason::NotRawStream);
    }
    outcome
}

fn count_images(doc: &Document) -> usize {
    doc.objects
        .values()
        .filter(|object| match object {
            Object::Stream(stream) => get_name(doc, &stream.dict, b"Subtype") == Some(&b"Image"[..]),
            _ => false,
        })
        .count()
}

/// Serialize with object streams and cross-reference streams
pub(crate) fn serialize_with_object_streams(doc: &mut Document) -> Result<Vec<u8>> {
    let options = SaveOptions::builder()
        .use_object_streams(true)
        .use_xref_streams(true)
        .build();
    let mut buffer = Vec::new();
    doc.save_with_options(&mut buffer, options).map_err(|e| {
        CompressError::new(ErrorKind::PdfSaveFailed, format!("Failed to save PDF: {}", e))
    })?;
    Ok(buffer)
}
