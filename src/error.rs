//! Error kinds and severities for the compression pipeline.
//!
//! Every failure carries a closed [`ErrorKind`]. The kind alone decides
//! whether a failure aborts the whole document or only the image being
//! processed, so callers never have to inspect messages or catch sites.

use thiserror::Error;

/// How far a failure reaches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Severity {
    /// Abort the whole operation, no partial output.
    DocumentFatal,
    /// Skip the current image and keep going.
    ImageLocal,
    /// Raised while processing one image, but means the raster surface
    /// itself is gone. Aborts the whole operation.
    EnvironmentFatal,
}

/// Closed set of failure kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    PasswordProtected,
    InvalidInput,
    PdfParseFailed,
    EngineOpenFailed,
    PdfSaveFailed,
    EngineOptimizeFailed,
    Cancelled,
    Io,

    InflateError,
    StreamCorrupt,
    PredictorMismatch,
    PredictorUnsupported,
    PngFilterUnsupported,
    ColorspaceUnsupported,
    ImageDecodeFailed,
    BlobFailed,
    ImageProcessing,

    CanvasError,
    EnvError,
    CanvasAllocFailed,
}

impl ErrorKind {
    pub fn severity(self) -> Severity {
        use ErrorKind::*;
        match self {
            PasswordProtected | InvalidInput | PdfParseFailed | EngineOpenFailed
            | PdfSaveFailed | EngineOptimizeFailed | Cancelled | Io => Severity::DocumentFatal,
            InflateError | StreamCorrupt | PredictorMismatch | PredictorUnsupported
            | PngFilterUnsupported | ColorspaceUnsupported | ImageDecodeFailed | BlobFailed
            | ImageProcessing => Severity::ImageLocal,
            CanvasError | EnvError | CanvasAllocFailed => Severity::EnvironmentFatal,
        }
    }

    /// Stable machine-readable code, e.g. `PREDICTOR_UNSUPPORTED`.
    pub fn code(self) -> &'static str {
        use ErrorKind::*;
        match self {
            PasswordProtected => "PASSWORD_PROTECTED",
            InvalidInput => "INVALID_INPUT",
            PdfParseFailed => "PDF_PARSE_FAILED",
            EngineOpenFailed => "MUPDF_OPEN_FAILED",
            PdfSaveFailed => "PDF_SAVE_FAILED",
            EngineOptimizeFailed => "MUPDF_OPTIMIZE_FAILED",
            Cancelled => "CANCELLED",
            Io => "IO_ERROR",
            InflateError => "INFLATE_ERROR",
            StreamCorrupt => "STREAM_CORRUPT",
            PredictorMismatch => "PREDICTOR_MISMATCH",
            PredictorUnsupported => "PREDICTOR_UNSUPPORTED",
            PngFilterUnsupported => "PNG_FILTER_UNSUPPORTED",
            ColorspaceUnsupported => "COLORSPACE_UNSUPPORTED",
            ImageDecodeFailed => "IMAGE_DECODE_FAILED",
            BlobFailed => "BLOB_FAILED",
            ImageProcessing => "IMG_PROC_ERR",
            CanvasError => "CANVAS_ERROR",
            EnvError => "ENV_ERROR",
            CanvasAllocFailed => "CANVAS_ALLOC_FAILED",
        }
    }

    pub fn is_image_local(self) -> bool {
        self.severity() == Severity::ImageLocal
    }
}

impl std::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.code())
    }
}

/// Error type for all compression operations
#[derive(Debug, Clone, Error)]
#[error("{kind}: {message}")]
pub struct CompressError {
    kind: ErrorKind,
    message: String,
}

impl CompressError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn password_protected() -> Self {
        Self::new(
            ErrorKind::PasswordProtected,
            "This PDF is password protected. Please remove the password and try again.",
        )
    }

    pub fn cancelled() -> Self {
        Self::new(ErrorKind::Cancelled, "Compression was cancelled")
    }
}

impl From<std::io::Error> for CompressError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io, err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, CompressError>;
