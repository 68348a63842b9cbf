//! # currico-preview
//!
//! Watermarked, size-bounded WebP previews for documents uploaded to the
//! Currico marketplace.
//!
//! Sellers upload teaching material as images or PDFs. Buyers browsing the
//! catalogue see a preview: a downscaled copy of the image (or of the first
//! PDF pages) with the seller's name tiled across it, so the preview is
//! useful for judging the material but useless as a substitute for buying it.
//!
//! ## Pipeline Overview
//!
//! ```text
//! bytes + MIME (+ seller name)
//!  │
//!  ├─ 1. Classify   image / PDF / unsupported (unsupported → no preview)
//!  ├─ 2. Render     PDF pages → PNG via pdftoppm (temp-file handshake, timeout)
//!  ├─ 3. Resize     fit inside 800×1131, never upscale
//!  ├─ 4. Watermark  escaped seller name, tiled at −30°, alpha-blended
//!  └─ 5. Encode     lossy WebP, quality 60
//! ```
//!
//! Preview generation is best-effort: every `generate_*` call returns `None`
//! (or an empty page list) instead of an error, so the upload that triggered
//! it always goes through.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use currico_preview::{PreviewConfig, PreviewGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let generator = PreviewGenerator::new(PreviewConfig::default())?;
//!     let upload = std::fs::read("worksheet.pdf")?;
//!
//!     match generator
//!         .generate_preview(&upload, "application/pdf", Some("Frau Muster"))
//!         .await
//!     {
//!         Some(webp) => std::fs::write("worksheet.preview.webp", webp)?,
//!         None => eprintln!("stored without preview"),
//!     }
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature  | Default | Description |
//! |----------|---------|-------------|
//! | `cli`    | on      | Enables the `currico-preview` binary (clap + anyhow + tracing-subscriber + infer) |
//! | `pdfium` | off     | In-process PDF rendering through pdfium instead of `pdftoppm` |

// ── Modules ──────────────────────────────────────────────────────────────

pub mod config;
pub mod error;
pub mod generate;
pub mod output;
pub mod pipeline;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use config::{PreviewConfig, PreviewConfigBuilder, RasterizerBackend, DEFAULT_WATERMARK_FALLBACK};
pub use error::{PreviewError, RasterError};
pub use generate::{generate_preview, PreviewGenerator};
pub use output::{PagePreview, PreviewImage};
pub use pipeline::classify::{can_generate_preview, classify, DocumentKind, ImageKind};
pub use pipeline::render::{PageRaster, PageRasterizer, Pdftoppm};
pub use pipeline::resize::Dimensions;
pub use pipeline::watermark::{bundled_fontdb, escape_xml, watermark_svg, Watermarker};

#[cfg(feature = "pdfium")]
pub use pipeline::render::PdfiumRasterizer;
