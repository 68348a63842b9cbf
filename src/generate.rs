//! Preview generation entry points.
//!
//! [`PreviewGenerator`] owns the resolved rasteriser and the watermark font
//! database, so build it once and reuse it across uploads. Every public
//! `generate_*` method is infallible by contract: failures are logged and
//! surface as `None` (or an empty page list), because an upload must never
//! be rejected just because its preview could not be produced. The
//! `render_*` methods return the same work as a `Result` for callers that
//! want the reason.

use crate::config::{PreviewConfig, RasterizerBackend};
use crate::error::{PreviewError, RasterError};
use crate::output::{PagePreview, PreviewImage};
use crate::pipeline::classify::{classify, DocumentKind};
use crate::pipeline::encode;
use crate::pipeline::render::{PageRaster, PageRasterizer, Pdftoppm};
use crate::pipeline::resize::{self, Dimensions};
use crate::pipeline::watermark::{watermark_text, Watermarker};
use futures::stream::{self, StreamExt};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

/// Produces watermarked, size-bounded previews for uploaded documents.
///
/// Cheap to clone; holds no mutable state, so one instance can serve
/// concurrent requests.
#[derive(Clone)]
pub struct PreviewGenerator {
    config: PreviewConfig,
    rasterizer: Arc<dyn PageRasterizer>,
    watermarker: Watermarker,
}

impl PreviewGenerator {
    /// Build a generator, resolving the rasteriser and loading system fonts.
    ///
    /// # Errors
    /// [`PreviewError::InvalidConfig`] when the configured backend is not
    /// compiled in.
    pub fn new(config: PreviewConfig) -> Result<Self, PreviewError> {
        let watermarker = Watermarker::new(config.watermark_opacity);
        Self::with_watermarker(config, watermarker)
    }

    /// Build a generator around an existing [`Watermarker`] (e.g. one sharing
    /// a font database with other generators).
    pub fn with_watermarker(
        config: PreviewConfig,
        watermarker: Watermarker,
    ) -> Result<Self, PreviewError> {
        let rasterizer = resolve_rasterizer(&config)?;
        debug!("Preview generator using rasteriser '{}'", rasterizer.name());
        Ok(Self {
            config,
            rasterizer,
            watermarker,
        })
    }

    pub fn config(&self) -> &PreviewConfig {
        &self.config
    }

    fn bound(&self) -> Dimensions {
        Dimensions::new(self.config.max_width, self.config.max_height)
    }

    // ── Image path ───────────────────────────────────────────────────────

    /// Decode, bound, watermark and encode an image.
    pub fn render_image_preview(
        &self,
        bytes: &[u8],
        seller_name: Option<&str>,
    ) -> Result<PreviewImage, PreviewError> {
        let declared = resize::probe_dimensions(bytes);
        let img = resize::decode(bytes)?;
        self.render_decoded_preview(img, declared, seller_name)
    }

    /// Bound, watermark and encode an already decoded image.
    ///
    /// `declared` is the size recorded in the source metadata, if any. The
    /// watermark is laid out for it and stretched over the real frame; when
    /// it is missing the decoded size is used instead.
    pub fn render_decoded_preview(
        &self,
        img: DynamicImage,
        declared: Option<Dimensions>,
        seller_name: Option<&str>,
    ) -> Result<PreviewImage, PreviewError> {
        let bound = self.bound();
        let (width, height) = img.dimensions();
        let source = match declared {
            Some(d) => d,
            None => {
                debug!(
                    "No declared image size; watermark canvas uses decoded {}x{}",
                    width, height
                );
                Dimensions::new(width, height)
            }
        };

        let mut frame = resize::resize_to_fit(img, bound).into_rgba8();
        let canvas = resize::fit_inside(Some(source), bound);
        let text = watermark_text(seller_name, &self.config.watermark_fallback);
        self.watermarker.apply(&mut frame, text, canvas)?;

        let quality = self.config.quality;
        let bytes = encode::encode_webp(&frame, quality)?;
        Ok(PreviewImage {
            bytes,
            width: frame.width(),
            height: frame.height(),
            quality,
            watermark: text.to_string(),
        })
    }

    /// Preview an image; `None` when anything along the way fails.
    pub fn generate_image_preview(
        &self,
        bytes: &[u8],
        seller_name: Option<&str>,
    ) -> Option<Vec<u8>> {
        match self.render_image_preview(bytes, seller_name) {
            Ok(preview) => {
                info!(
                    "Image preview ready: {}x{}, {} bytes",
                    preview.width,
                    preview.height,
                    preview.byte_len()
                );
                Some(preview.into_bytes())
            }
            Err(e) => {
                warn!("Image preview unavailable: {}", e);
                None
            }
        }
    }

    // ── PDF path ─────────────────────────────────────────────────────────

    /// Rasterise up to `max_pages` pages and preview each one.
    ///
    /// The outer `Result` fails only when no page rasters were obtained at
    /// all (tool missing, failing or timing out). Each inner result is one
    /// page, in page order; a failed page never affects the others.
    pub async fn render_pdf_pages(
        &self,
        bytes: &[u8],
        max_pages: usize,
        seller_name: Option<&str>,
    ) -> Result<Vec<Result<PagePreview, PreviewError>>, PreviewError> {
        if max_pages == 0 {
            return Ok(Vec::new());
        }

        let start = Instant::now();
        let staging = tempfile::Builder::new()
            .prefix("currico-preview-")
            .tempdir()?;
        let pdf_path = staging.path().join("document.pdf");
        tokio::fs::write(&pdf_path, bytes).await?;

        let mut rasters = self.rasterize(&pdf_path, max_pages).await?;
        // The source PDF is no longer needed once pages are rasterised.
        drop(staging);
        rasters.sort_by_key(|r| r.page_num);
        rasters.truncate(max_pages);
        debug!(
            "Rasterised {} page(s) in {}ms",
            rasters.len(),
            start.elapsed().as_millis()
        );

        let seller = seller_name.map(str::to_owned);
        let pages: Vec<_> = stream::iter(rasters)
            .map(|PageRaster { page_num, bytes }| {
                let this = self.clone();
                let seller = seller.clone();
                async move {
                    tokio::task::spawn_blocking(move || {
                        this.render_image_preview(&bytes, seller.as_deref())
                    })
                    .await
                    .map_err(|e| PreviewError::Internal(format!("Preview task panicked: {e}")))
                    .and_then(|r| r)
                    .map(|image| PagePreview { page_num, image })
                    .map_err(|e| PreviewError::Page {
                        page: page_num,
                        source: Box::new(e),
                    })
                }
            })
            .buffered(self.config.concurrency)
            .collect()
            .await;

        Ok(pages)
    }

    /// Preview page 1 of a PDF.
    pub async fn render_pdf_preview(
        &self,
        bytes: &[u8],
        seller_name: Option<&str>,
    ) -> Result<PreviewImage, PreviewError> {
        let mut pages = self.render_pdf_pages(bytes, 1, seller_name).await?;
        match pages.pop() {
            Some(page) => page.map(|p| p.image),
            None => Err(RasterError::NoOutput {
                tool: self.rasterizer.name().to_string(),
            }
            .into()),
        }
    }

    /// Preview page 1 of a PDF; `None` when the rasteriser is unavailable or
    /// the page cannot be previewed.
    pub async fn generate_pdf_preview(
        &self,
        bytes: &[u8],
        seller_name: Option<&str>,
    ) -> Option<Vec<u8>> {
        match self.render_pdf_preview(bytes, seller_name).await {
            Ok(preview) => {
                info!(
                    "PDF preview ready: {}x{}, {} bytes",
                    preview.width,
                    preview.height,
                    preview.byte_len()
                );
                Some(preview.into_bytes())
            }
            Err(e) => {
                warn!("PDF preview unavailable: {}", e);
                None
            }
        }
    }

    /// Preview up to `max_pages` pages of a PDF, in page order.
    ///
    /// Pages that fail are omitted; an unavailable rasteriser yields an empty
    /// list.
    pub async fn generate_pdf_preview_pages(
        &self,
        bytes: &[u8],
        max_pages: usize,
        seller_name: Option<&str>,
    ) -> Vec<Vec<u8>> {
        let pages = match self.render_pdf_pages(bytes, max_pages, seller_name).await {
            Ok(pages) => pages,
            Err(e) => {
                warn!("PDF page previews unavailable: {}", e);
                return Vec::new();
            }
        };

        let requested = pages.len();
        let previews: Vec<Vec<u8>> = pages
            .into_iter()
            .filter_map(|page| match page {
                Ok(p) => Some(p.image.into_bytes()),
                Err(e) => {
                    warn!("Skipping page preview: {}", e);
                    None
                }
            })
            .collect();

        info!("PDF page previews ready: {}/{}", previews.len(), requested);
        previews
    }

    // ── Dispatcher ───────────────────────────────────────────────────────

    /// Route on the MIME type. `Ok(None)` means the type is not previewable.
    pub async fn render_preview(
        &self,
        bytes: &[u8],
        mime_type: &str,
        seller_name: Option<&str>,
    ) -> Result<Option<PreviewImage>, PreviewError> {
        match classify(mime_type) {
            DocumentKind::Pdf => self.render_pdf_preview(bytes, seller_name).await.map(Some),
            DocumentKind::Image(_) => self.render_image_preview(bytes, seller_name).map(Some),
            DocumentKind::Unsupported => Ok(None),
        }
    }

    /// Preview any supported document; `None` for unsupported types and for
    /// every failure.
    pub async fn generate_preview(
        &self,
        bytes: &[u8],
        mime_type: &str,
        seller_name: Option<&str>,
    ) -> Option<Vec<u8>> {
        match classify(mime_type) {
            DocumentKind::Pdf => self.generate_pdf_preview(bytes, seller_name).await,
            DocumentKind::Image(_) => self.generate_image_preview(bytes, seller_name),
            DocumentKind::Unsupported => {
                debug!("No preview for MIME type '{}'", mime_type);
                None
            }
        }
    }

    /// Synchronous wrapper around [`Self::generate_preview`].
    ///
    /// Creates a temporary tokio runtime internally; do not call from inside
    /// an async context.
    pub fn generate_preview_sync(
        &self,
        bytes: &[u8],
        mime_type: &str,
        seller_name: Option<&str>,
    ) -> Option<Vec<u8>> {
        match tokio::runtime::Runtime::new() {
            Ok(rt) => rt.block_on(self.generate_preview(bytes, mime_type, seller_name)),
            Err(e) => {
                warn!("Failed to create tokio runtime for preview: {}", e);
                None
            }
        }
    }

    // ── Internal helpers ─────────────────────────────────────────────────

    /// Run the rasteriser under the configured timeout. No retries.
    async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: usize,
    ) -> Result<Vec<PageRaster>, RasterError> {
        let secs = self.config.rasterize_timeout_secs;
        match tokio::time::timeout(
            Duration::from_secs(secs),
            self.rasterizer.rasterize(pdf_path, max_pages),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(RasterError::Timeout {
                tool: self.rasterizer.name().to_string(),
                secs,
            }),
        }
    }
}

/// One-shot convenience: build a generator from `config` and preview.
///
/// Loads system fonts on every call; keep a [`PreviewGenerator`] around when
/// previewing more than one document.
pub async fn generate_preview(
    bytes: &[u8],
    mime_type: &str,
    seller_name: Option<&str>,
    config: &PreviewConfig,
) -> Option<Vec<u8>> {
    match PreviewGenerator::new(config.clone()) {
        Ok(generator) => generator.generate_preview(bytes, mime_type, seller_name).await,
        Err(e) => {
            warn!("Preview generator misconfigured: {}", e);
            None
        }
    }
}

/// Resolve the rasteriser, from most-specific to least-specific:
///
/// 1. **Injected** (`config.rasterizer`) — used as-is.
/// 2. **Built-in backend** (`config.backend`) — `pdftoppm` from
///    `config.pdftoppm_path`, or pdfium when compiled in.
fn resolve_rasterizer(config: &PreviewConfig) -> Result<Arc<dyn PageRasterizer>, PreviewError> {
    if let Some(ref rasterizer) = config.rasterizer {
        return Ok(Arc::clone(rasterizer));
    }

    match config.backend {
        RasterizerBackend::Pdftoppm => Ok(Arc::new(Pdftoppm::new(
            config.pdftoppm_path.clone(),
            config.dpi,
        ))),
        #[cfg(feature = "pdfium")]
        RasterizerBackend::Pdfium => {
            let longest = config.max_width.max(config.max_height);
            Ok(Arc::new(crate::pipeline::render::PdfiumRasterizer::new(
                longest.saturating_mul(2),
            )))
        }
        #[cfg(not(feature = "pdfium"))]
        RasterizerBackend::Pdfium => Err(PreviewError::InvalidConfig(
            "The pdfium backend requires the `pdfium` cargo feature".into(),
        )),
    }
}
