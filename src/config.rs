//! Configuration types for preview generation.
//!
//! All preview behaviour is controlled through [`PreviewConfig`], built via
//! its [`PreviewConfigBuilder`]. The defaults reproduce the marketplace's
//! production settings: an 800×1131 bounding box (A4 portrait at 800 px
//! width), WebP quality 60 and a `currico.ch` watermark when the seller has
//! no display name.

use crate::error::PreviewError;
use crate::pipeline::render::PageRasterizer;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

/// Default watermark text when no seller name is supplied.
pub const DEFAULT_WATERMARK_FALLBACK: &str = "currico.ch";

/// Configuration for preview generation.
///
/// # Example
/// ```rust
/// use currico_preview::PreviewConfig;
///
/// let config = PreviewConfig::builder()
///     .watermark_fallback("example.org")
///     .rasterize_timeout_secs(10)
///     .build()
///     .unwrap();
/// assert_eq!(config.max_width, 800);
/// ```
#[derive(Clone)]
pub struct PreviewConfig {
    /// Maximum preview width in pixels. Default: 800.
    pub max_width: u32,

    /// Maximum preview height in pixels. Default: 1131.
    pub max_height: u32,

    /// Lossy WebP quality, 1–100. Default: 60.
    pub quality: u8,

    /// Watermark text used when the seller name is missing or blank.
    /// Default: [`DEFAULT_WATERMARK_FALLBACK`].
    pub watermark_fallback: String,

    /// Watermark opacity, 0.0–1.0. Default: 0.18.
    pub watermark_opacity: f32,

    /// Rasterisation DPI for PDF pages. Range: 72–400. Default: 150.
    ///
    /// Pages are downscaled to the bounding box afterwards, so DPI only
    /// needs to be high enough that an A4 page exceeds 800 px in width.
    pub dpi: u32,

    /// Upper bound on a single rasteriser invocation, in seconds. Default: 30.
    ///
    /// Exceeding it is handled exactly like a missing rasteriser.
    pub rasterize_timeout_secs: u64,

    /// Number of PDF pages turned into previews concurrently. Default: 4.
    pub concurrency: usize,

    /// Which built-in rasteriser to use when `rasterizer` is `None`.
    pub backend: RasterizerBackend,

    /// Path or name of the `pdftoppm` binary. Default: `pdftoppm` (resolved via `PATH`).
    pub pdftoppm_path: PathBuf,

    /// Pre-constructed rasteriser. Takes precedence over `backend`.
    pub rasterizer: Option<Arc<dyn PageRasterizer>>,
}

impl Default for PreviewConfig {
    fn default() -> Self {
        Self {
            max_width: 800,
            max_height: 1131,
            quality: 60,
            watermark_fallback: DEFAULT_WATERMARK_FALLBACK.to_string(),
            watermark_opacity: 0.18,
            dpi: 150,
            rasterize_timeout_secs: 30,
            concurrency: 4,
            backend: RasterizerBackend::default(),
            pdftoppm_path: PathBuf::from("pdftoppm"),
            rasterizer: None,
        }
    }
}

impl fmt::Debug for PreviewConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PreviewConfig")
            .field("max_width", &self.max_width)
            .field("max_height", &self.max_height)
            .field("quality", &self.quality)
            .field("watermark_fallback", &self.watermark_fallback)
            .field("watermark_opacity", &self.watermark_opacity)
            .field("dpi", &self.dpi)
            .field("rasterize_timeout_secs", &self.rasterize_timeout_secs)
            .field("concurrency", &self.concurrency)
            .field("backend", &self.backend)
            .field("pdftoppm_path", &self.pdftoppm_path)
            .field(
                "rasterizer",
                &self.rasterizer.as_ref().map(|r| r.name().to_string()),
            )
            .finish()
    }
}

impl PreviewConfig {
    /// Create a new builder for `PreviewConfig`.
    pub fn builder() -> PreviewConfigBuilder {
        PreviewConfigBuilder {
            config: Self::default(),
        }
    }
}

/// Builder for [`PreviewConfig`].
#[derive(Debug)]
pub struct PreviewConfigBuilder {
    config: PreviewConfig,
}

impl PreviewConfigBuilder {
    pub fn max_width(mut self, px: u32) -> Self {
        self.config.max_width = px;
        self
    }

    pub fn max_height(mut self, px: u32) -> Self {
        self.config.max_height = px;
        self
    }

    pub fn quality(mut self, q: u8) -> Self {
        self.config.quality = q.clamp(1, 100);
        self
    }

    pub fn watermark_fallback(mut self, text: impl Into<String>) -> Self {
        self.config.watermark_fallback = text.into();
        self
    }

    pub fn watermark_opacity(mut self, opacity: f32) -> Self {
        self.config.watermark_opacity = opacity.clamp(0.0, 1.0);
        self
    }

    pub fn dpi(mut self, dpi: u32) -> Self {
        self.config.dpi = dpi.clamp(72, 400);
        self
    }

    pub fn rasterize_timeout_secs(mut self, secs: u64) -> Self {
        self.config.rasterize_timeout_secs = secs;
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn backend(mut self, backend: RasterizerBackend) -> Self {
        self.config.backend = backend;
        self
    }

    pub fn pdftoppm_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.pdftoppm_path = path.into();
        self
    }

    pub fn rasterizer(mut self, rasterizer: Arc<dyn PageRasterizer>) -> Self {
        self.config.rasterizer = Some(rasterizer);
        self
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<PreviewConfig, PreviewError> {
        let c = &self.config;
        if c.max_width == 0 || c.max_height == 0 {
            return Err(PreviewError::InvalidConfig(format!(
                "Bounding box must be non-empty, got {}x{}",
                c.max_width, c.max_height
            )));
        }
        if c.watermark_fallback.trim().is_empty() {
            return Err(PreviewError::InvalidConfig(
                "Watermark fallback text must not be blank".into(),
            ));
        }
        if c.rasterize_timeout_secs == 0 {
            return Err(PreviewError::InvalidConfig(
                "Rasteriser timeout must be ≥ 1 second".into(),
            ));
        }
        if c.backend == RasterizerBackend::Pdfium && !cfg!(feature = "pdfium") && c.rasterizer.is_none()
        {
            return Err(PreviewError::InvalidConfig(
                "The pdfium backend requires the `pdfium` cargo feature".into(),
            ));
        }
        Ok(self.config)
    }
}

// ── Enums ────────────────────────────────────────────────────────────────

/// Built-in PDF page rasterisers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RasterizerBackend {
    /// Spawn poppler's `pdftoppm` (default).
    #[default]
    Pdftoppm,
    /// Render in-process through pdfium (requires the `pdfium` feature).
    Pdfium,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_production_settings() {
        let c = PreviewConfig::default();
        assert_eq!((c.max_width, c.max_height), (800, 1131));
        assert_eq!(c.quality, 60);
        assert_eq!(c.watermark_fallback, "currico.ch");
        assert_eq!(c.backend, RasterizerBackend::Pdftoppm);
    }

    #[test]
    fn builder_clamps_out_of_range_values() {
        let c = PreviewConfig::builder()
            .quality(0)
            .dpi(10_000)
            .watermark_opacity(3.0)
            .concurrency(0)
            .build()
            .unwrap();
        assert_eq!(c.quality, 1);
        assert_eq!(c.dpi, 400);
        assert_eq!(c.watermark_opacity, 1.0);
        assert_eq!(c.concurrency, 1);
    }

    #[test]
    fn blank_fallback_is_rejected() {
        let err = PreviewConfig::builder()
            .watermark_fallback("   ")
            .build()
            .unwrap_err();
        assert!(matches!(err, PreviewError::InvalidConfig(_)));
    }

    #[test]
    fn empty_box_is_rejected() {
        assert!(PreviewConfig::builder().max_width(0).build().is_err());
    }

    #[test]
    fn zero_timeout_is_rejected() {
        assert!(PreviewConfig::builder()
            .rasterize_timeout_secs(0)
            .build()
            .is_err());
    }

    #[cfg(not(feature = "pdfium"))]
    #[test]
    fn pdfium_backend_requires_feature() {
        let err = PreviewConfig::builder()
            .backend(RasterizerBackend::Pdfium)
            .build()
            .unwrap_err();
        assert!(err.to_string().contains("pdfium"));
    }

    #[test]
    fn backend_serialises_lowercase() {
        let json = serde_json::to_string(&RasterizerBackend::Pdftoppm).unwrap();
        assert_eq!(json, "\"pdftoppm\"");
        let back: RasterizerBackend = serde_json::from_str("\"pdfium\"").unwrap();
        assert_eq!(back, RasterizerBackend::Pdfium);
    }
}
