//! Image encoding: watermarked frame → lossy WebP bytes.
//!
//! The `image` crate only writes lossless WebP, which is several times larger
//! than a quality-60 lossy encode of the same preview, so encoding goes
//! through libwebp via the `webp` crate.

use crate::error::PreviewError;
use image::RgbaImage;
use tracing::debug;

/// Encode an RGBA frame as lossy WebP at `quality` (1–100).
pub fn encode_webp(frame: &RgbaImage, quality: u8) -> Result<Vec<u8>, PreviewError> {
    let (width, height) = frame.dimensions();
    let encoder = webp::Encoder::from_rgba(frame.as_raw(), width, height);
    let memory = encoder
        .encode_simple(false, f32::from(quality.clamp(1, 100)))
        .map_err(|e| PreviewError::Encode(format!("{e:?}")))?;

    let bytes = memory.to_vec();
    debug!(
        "Encoded {}x{} frame → {} bytes WebP (q={})",
        width,
        height,
        bytes.len(),
        quality
    );
    Ok(bytes)
}
