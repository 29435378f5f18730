//! WebAssembly bindings for PDF Squeeze

use crate::{
    compress_pdf_bytes, inventory, needs_password, validate_input, CompressError,
    CompressOptions, CompressionLevel, PageImages, MAX_INPUT_BYTES,
};
use wasm_bindgen::prelude::*;

/// Forwards `log` records to the browser console
struct ConsoleLogger;

impl log::Log for ConsoleLogger {
    fn enabled(&self, metadata: &log::Metadata) -> bool {
        metadata.level() <= log::Level::Info
    }

    fn log(&self, record: &log::Record) {
        if !self.enabled(record.metadata()) {
            return;
        }
        let line = JsValue::from_str(&format!("[pdf-squeeze] {}", record.args()));
        match record.level() {
            log::Level::Error | log::Level::Warn => web_sys::console::warn_1(&line),
            _ => web_sys::console::log_1(&line),
        }
    }

    fn flush(&self) {}
}

static LOGGER: ConsoleLogger = ConsoleLogger;

/// Initialize panic hook and console logging
#[wasm_bindgen(start)]
pub fn init() {
    console_error_panic_hook::set_once();
    if log::set_logger(&LOGGER).is_ok() {
        log::set_max_level(log::LevelFilter::Info);
    }
}

fn js_error(err: CompressError) -> JsError {
    JsError::new(&err.to_string())
}

fn options_for(level: Option<String>) -> Result<CompressOptions, JsError> {
    let level = match level {
        Some(name) => name.parse::<CompressionLevel>().map_err(js_error)?,
        None => CompressionLevel::default(),
    };
    Ok(CompressOptions {
        level,
        verbose: false,
    })
}

/// Compress a PDF
///
/// # Arguments
/// * `pdf_bytes` - The input PDF file as a byte array
/// * `level` - `lossless`, `balanced` or `strong` (default: balanced)
///
/// # Returns
/// The compressed PDF, never larger than the input, or throws an error
/// whose message starts with the error code
#[wasm_bindgen]
pub fn compress_pdf(pdf_bytes: &[u8], level: Option<String>) -> Result<Vec<u8>, JsError> {
    let options = options_for(level)?;
    validate_input(pdf_bytes, MAX_INPUT_BYTES).map_err(js_error)?;

    let (output_bytes, _result) = compress_pdf_bytes(pdf_bytes, &options).map_err(js_error)?;
    Ok(output_bytes)
}

/// Compress a PDF with detailed result information
///
/// # Returns
/// A `CompressResultJs` object containing the compressed PDF, counters and
/// the image inventory of the output
#[wasm_bindgen]
pub fn compress_pdf_with_info(
    pdf_bytes: &[u8],
    level: Option<String>,
) -> Result<CompressResultJs, JsError> {
    let options = options_for(level)?;
    validate_input(pdf_bytes, MAX_INPUT_BYTES).map_err(js_error)?;

    let (output_bytes, result) = compress_pdf_bytes(pdf_bytes, &options).map_err(js_error)?;

    let page_images = inventory::extract_pdf_images_info(&output_bytes).map_err(js_error)?;
    let image_info_json = serde_json::to_string(&page_images_to_json(&page_images))
        .unwrap_or_else(|_| "[]".to_string());

    Ok(CompressResultJs {
        original_size: result.original_size,
        output_size: result.output_size,
        total_images: result.total_images,
        recompressed_images: result.recompressed_images,
        skipped_images: result.skipped_images,
        reduced: result.is_reduced(),
        pdf_bytes: output_bytes,
        image_info_json,
    })
}

/// Whether the PDF needs a password to open
#[wasm_bindgen]
pub fn pdf_needs_password(pdf_bytes: &[u8]) -> Result<bool, JsError> {
    needs_password(pdf_bytes).map_err(js_error)
}

/// Convert page images to a JSON-serializable structure
fn page_images_to_json(pages: &[PageImages]) -> Vec<serde_json::Value> {
    pages
        .iter()
        .map(|page| {
            serde_json::json!({
                "page": page.page_number,
                "images": page.images.iter().map(|img| {
                    serde_json::json!({
                        "objectId": format!("{} {}", img.object_id.0, img.object_id.1),
                        "type": img.role,
                        "width": img.width,
                        "height": img.height,
                        "colorSpace": img.color_space,
                        "bpc": img.bits_per_component,
                        "filter": img.filter,
                        "size": img.size_bytes,
                        "verdict": img.verdict
                    })
                }).collect::<Vec<_>>()
            })
        })
        .collect()
}

/// Result of a PDF compression with statistics
#[wasm_bindgen]
pub struct CompressResultJs {
    pdf_bytes: Vec<u8>,
    original_size: usize,
    output_size: usize,
    total_images: usize,
    recompressed_images: usize,
    skipped_images: usize,
    reduced: bool,
    image_info_json: String,
}

#[wasm_bindgen]
impl CompressResultJs {
    /// Get the compressed PDF bytes
    #[wasm_bindgen(getter)]
    pub fn pdf_bytes(&self) -> Vec<u8> {
        self.pdf_bytes.clone()
    }

    #[wasm_bindgen(getter)]
    pub fn original_size(&self) -> usize {
        self.original_size
    }

    #[wasm_bindgen(getter)]
    pub fn output_size(&self) -> usize {
        self.output_size
    }

    /// Get the total number of images found
    #[wasm_bindgen(getter)]
    pub fn total_images(&self) -> usize {
        self.total_images
    }

    #[wasm_bindgen(getter)]
    pub fn recompressed_images(&self) -> usize {
        self.recompressed_images
    }

    #[wasm_bindgen(getter)]
    pub fn skipped_images(&self) -> usize {
        self.skipped_images
    }

    /// False when the original bytes were returned unchanged
    #[wasm_bindgen(getter)]
    pub fn reduced(&self) -> bool {
        self.reduced
    }

    /// Get detailed image information as JSON string
    #[wasm_bindgen(getter)]
    pub fn image_info_json(&self) -> String {
        self.image_info_json.clone()
    }
}
