//! Input validation and password detection.

use crate::error::{CompressError, ErrorKind, Result};
use lopdf::Document;

/// Largest input the CLI and WASM surfaces accept (100 MiB)
pub const MAX_INPUT_BYTES: usize = 100 * 1024 * 1024;

const PDF_MAGIC: &[u8] = b"%PDF-";
const ENCRYPT_TOKEN: &[u8] = b"/Encrypt";
const TRAILER_WINDOW: usize = 2048;
const HEADER_WINDOW: usize = 1024;

/// Reject input that is not a PDF or exceeds `max_bytes`
pub fn validate_input(bytes: &[u8], max_bytes: usize) -> Result<()> {
    if bytes.len() > max_bytes {
        return Err(CompressError::new(
            ErrorKind::InvalidInput,
            format!(
                "File is too large ({:.1} MB). Maximum size is {:.0} MB.",
                bytes.len() as f64 / (1024.0 * 1024.0),
                max_bytes as f64 / (1024.0 * 1024.0)
            ),
        ));
    }
    if !bytes.starts_with(PDF_MAGIC) {
        return Err(CompressError::new(
            ErrorKind::InvalidInput,
            "Input does not start with the %PDF- signature",
        ));
    }
    Ok(())
}

/// Cheap pre-check: `/Encrypt` in the trailer or header region.
pub fn looks_encrypted(bytes: &[u8]) -> bool {
    let tail = &bytes[bytes.len().saturating_sub(TRAILER_WINDOW)..];
    let head = &bytes[..bytes.len().min(HEADER_WINDOW)];
    contains(tail, ENCRYPT_TOKEN) || contains(head, ENCRYPT_TOKEN)
}

fn contains(haystack: &[u8], needle: &[u8]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// True when the parser reports an error that only encryption explains
pub(crate) fn is_encryption_error(err: &lopdf::Error) -> bool {
    let message = err.to_string().to_ascii_lowercase();
    message.contains("encrypt") || message.contains("password") || message.contains("decrypt")
}

/// Parse `bytes` for processing, mapping failures onto document-fatal kinds
pub(crate) fn load_document(bytes: &[u8]) -> Result<Document> {
    if looks_encrypted(bytes) {
        return Err(CompressError::password_protected());
    }
    let doc = Document::load_mem(bytes).map_err(|e| {
        if is_encryption_error(&e) {
            CompressError::password_protected()
        } else {
            CompressError::new(ErrorKind::PdfParseFailed, format!("Failed to load PDF: {}", e))
        }
    })?;
    if doc.is_encrypted() {
        return Err(CompressError::password_protected());
    }
    Ok(doc)
}

/// Whether opening `bytes` requires a password.
///
/// The `/Encrypt` heuristic short-circuits; otherwise the document is
/// parsed and its trailer consulted.
pub fn needs_password(bytes: &[u8]) -> Result<bool> {
    match load_document(bytes) {
        Ok(_) => Ok(false),
        Err(e) if e.kind() == ErrorKind::PasswordProtected => Ok(true),
        Err(e) => Err(e),
    }
}
