//! Error types for the currico-preview library.
//!
//! Two distinct error types reflect two distinct failure modes:
//!
//! * [`PreviewError`] — a single preview could not be produced (corrupt
//!   image, encoder failure, invalid configuration). Returned by the
//!   `render_*` methods for callers that want the reason.
//!
//! * [`RasterError`] — the PDF rasteriser could not deliver page images
//!   (binary missing, non-zero exit, timeout). Wrapped in
//!   [`PreviewError::Rasterize`] when it surfaces.
//!
//! Neither type ever crosses the public `generate_*` functions: those log the
//! error and return `None` (or an empty page list), because a missing preview
//! must never fail the upload it belongs to.

use thiserror::Error;

/// Everything that can stop one preview from being produced.
#[derive(Debug, Error)]
pub enum PreviewError {
    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Image errors ──────────────────────────────────────────────────────
    /// The source bytes are not a decodable image.
    #[error("Failed to decode source image: {0}")]
    Decode(#[from] image::ImageError),

    /// Decoding succeeded but produced a zero-sized frame.
    #[error("Source image has no pixels ({width}x{height})")]
    EmptyImage { width: u32, height: u32 },

    /// The watermark SVG could not be parsed or rasterised.
    #[error("Watermark rendering failed: {0}")]
    Watermark(String),

    /// The WebP encoder rejected the frame.
    #[error("WebP encoding failed: {0}")]
    Encode(String),

    // ── PDF errors ────────────────────────────────────────────────────────
    /// Page rasterisation did not produce any usable output.
    #[error(transparent)]
    Rasterize(#[from] RasterError),

    /// Page {page} was rasterised but could not be turned into a preview.
    #[error("Page {page}: {source}")]
    Page {
        page: usize,
        #[source]
        source: Box<PreviewError>,
    },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not stage the document in a temporary directory.
    #[error("Temporary file error: {0}")]
    Io(#[from] std::io::Error),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (e.g. a blocking task panicked).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Outcome of a failed rasteriser invocation.
///
/// Every variant is a *soft* failure: PDF previews are a best-effort
/// enhancement and their absence degrades to "no preview stored".
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum RasterError {
    /// The rasteriser binary or library is not installed / could not start.
    #[error("Rasteriser '{tool}' is unavailable: {detail}")]
    ToolUnavailable { tool: String, detail: String },

    /// The rasteriser ran but reported failure.
    #[error("Rasteriser '{tool}' failed (exit code {code:?}): {stderr}")]
    ToolFailed {
        tool: String,
        code: Option<i32>,
        stderr: String,
    },

    /// The rasteriser did not finish within the configured timeout.
    #[error("Rasteriser '{tool}' timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },

    /// The rasteriser exited cleanly but wrote no page images.
    #[error("Rasteriser '{tool}' produced no pages")]
    NoOutput { tool: String },

    /// Reading the rasteriser output failed.
    #[error("Rasteriser I/O error: {0}")]
    Io(String),

    /// Unexpected internal error.
    #[error("Rasteriser internal error: {0}")]
    Internal(String),
}

impl From<std::io::Error> for RasterError {
    fn from(e: std::io::Error) -> Self {
        RasterError::Io(e.to_string())
    }
}
