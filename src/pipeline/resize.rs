//! Decoding and bounded resizing.
//!
//! Previews fit inside the configured box and never upscale: a 400×300
//! upload stays 400×300, a 1600×1200 upload becomes 800×600.

use crate::error::PreviewError;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageReader};
use std::io::Cursor;
use tracing::debug;

/// Width/height pair in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Dimensions {
    pub width: u32,
    pub height: u32,
}

impl Dimensions {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn is_empty(self) -> bool {
        self.width == 0 || self.height == 0
    }
}

/// Read the intrinsic size from the image header without decoding pixels.
///
/// Returns `None` when the header is unreadable or reports a zero dimension;
/// callers treat that as "unknown" rather than as a failure.
pub fn probe_dimensions(bytes: &[u8]) -> Option<Dimensions> {
    let reader = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()
        .ok()?;
    let (width, height) = reader.into_dimensions().ok()?;
    let dims = Dimensions::new(width, height);
    (!dims.is_empty()).then_some(dims)
}

/// Largest aspect-preserving rectangle inside `bound` that is no larger
/// than `source`.
///
/// An unknown (or degenerate) source yields the full bounding box.
pub fn fit_inside(source: Option<Dimensions>, bound: Dimensions) -> Dimensions {
    let src = match source {
        Some(d) if !d.is_empty() => d,
        _ => return bound,
    };

    if src.width <= bound.width && src.height <= bound.height {
        return src;
    }

    let scale = f64::min(
        bound.width as f64 / src.width as f64,
        bound.height as f64 / src.height as f64,
    );
    let width = ((src.width as f64 * scale).round() as u32).clamp(1, bound.width);
    let height = ((src.height as f64 * scale).round() as u32).clamp(1, bound.height);
    Dimensions::new(width, height)
}

/// Decode `bytes`, letting the content decide the format.
pub fn decode(bytes: &[u8]) -> Result<DynamicImage, PreviewError> {
    let img = ImageReader::new(Cursor::new(bytes))
        .with_guessed_format()?
        .decode()?;
    let (width, height) = img.dimensions();
    if width == 0 || height == 0 {
        return Err(PreviewError::EmptyImage { width, height });
    }
    Ok(img)
}

/// Shrink `img` to fit inside `bound`; images already inside are returned as-is.
pub fn resize_to_fit(img: DynamicImage, bound: Dimensions) -> DynamicImage {
    let (width, height) = img.dimensions();
    let target = fit_inside(Some(Dimensions::new(width, height)), bound);
    if target.width == width && target.height == height {
        return img;
    }
    debug!(
        "Resizing {}x{} → {}x{}",
        width, height, target.width, target.height
    );
    img.resize_exact(target.width, target.height, FilterType::Lanczos3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    const BOX: Dimensions = Dimensions::new(800, 1131);

    fn png(width: u32, height: u32) -> Vec<u8> {
        let img = DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, Rgb([10, 20, 30])));
        let mut buf = Vec::new();
        img.write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .unwrap();
        buf
    }

    #[test]
    fn small_source_is_not_enlarged() {
        let d = fit_inside(Some(Dimensions::new(400, 300)), BOX);
        assert_eq!(d, Dimensions::new(400, 300));
    }

    #[test]
    fn wide_source_is_bounded_by_width() {
        let d = fit_inside(Some(Dimensions::new(1600, 1200)), BOX);
        assert_eq!(d, Dimensions::new(800, 600));
    }

    #[test]
    fn tall_source_is_bounded_by_height() {
        let d = fit_inside(Some(Dimensions::new(1000, 4000)), BOX);
        assert_eq!(d.height, 1131);
        assert_eq!(d.width, 283); // 1000 * 1131/4000 = 282.75
    }

    #[test]
    fn a4_at_150_dpi_fills_the_width() {
        let d = fit_inside(Some(Dimensions::new(1241, 1754)), BOX);
        assert_eq!(d.width, 800);
        assert!(d.height <= 1131);
    }

    #[test]
    fn extreme_aspect_ratio_keeps_one_pixel() {
        let d = fit_inside(Some(Dimensions::new(100_000, 1)), BOX);
        assert_eq!(d, Dimensions::new(800, 1));
    }

    #[test]
    fn unknown_source_falls_back_to_box() {
        assert_eq!(fit_inside(None, BOX), BOX);
        assert_eq!(fit_inside(Some(Dimensions::new(0, 50)), BOX), BOX);
    }

    #[test]
    fn probe_reads_png_header() {
        assert_eq!(probe_dimensions(&png(33, 17)), Some(Dimensions::new(33, 17)));
    }

    #[test]
    fn probe_of_garbage_is_unknown() {
        assert_eq!(probe_dimensions(b"definitely not an image"), None);
        assert_eq!(probe_dimensions(&[]), None);
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(matches!(
            decode(b"\x89PNG\r\n\x1a\ntruncated"),
            Err(PreviewError::Decode(_))
        ));
    }

    #[test]
    fn resize_to_fit_shrinks_large_images() {
        let img = decode(&png(1600, 2262)).unwrap();
        let out = resize_to_fit(img, BOX);
        assert_eq!(out.dimensions(), (800, 1131));
    }

    #[test]
    fn resize_to_fit_keeps_small_images() {
        let img = decode(&png(20, 10)).unwrap();
        assert_eq!(resize_to_fit(img, BOX).dimensions(), (20, 10));
    }
}
