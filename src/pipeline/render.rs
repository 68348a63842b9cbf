//! PDF rasterisation: turn the first pages of a PDF into PNG page images.
//!
//! The default backend shells out to poppler's `pdftoppm`. Its contract is a
//! temp-file handshake: the PDF is read from a path, page images are written
//! next to an output prefix inside a private [`TempDir`], read back in page
//! order and the directory is removed when the call returns.
//!
//! A missing binary, a non-zero exit and an empty output directory are all
//! reported as [`RasterError`]s; the caller turns every one of them into
//! "no preview". The child process is spawned with `kill_on_drop`, so a
//! caller-side timeout that drops the future also terminates the process.
//!
//! With the `pdfium` feature, [`PdfiumRasterizer`] renders in-process instead.

use crate::error::RasterError;
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tempfile::TempDir;
use tokio::process::Command;
use tracing::{debug, warn};

/// One rasterised page: its 1-based number in the document and the encoded
/// image (PNG from the built-in backends).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PageRaster {
    pub page_num: usize,
    pub bytes: Vec<u8>,
}

impl PageRaster {
    pub fn new(page_num: usize, bytes: Vec<u8>) -> Self {
        Self { page_num, bytes }
    }
}

/// Produces raw page rasters for the first pages of a PDF.
///
/// Implementations return pages in ascending page order and at most
/// `max_pages` of them. A page that could not be rendered is left out; the
/// remaining pages keep their own numbers.
#[async_trait]
pub trait PageRasterizer: Send + Sync {
    /// Short tool name used in logs and errors.
    fn name(&self) -> &str;

    /// Rasterise pages `1..=max_pages` of the PDF at `pdf_path`.
    async fn rasterize(&self, pdf_path: &Path, max_pages: usize)
        -> Result<Vec<PageRaster>, RasterError>;
}

// ── pdftoppm ─────────────────────────────────────────────────────────────

/// Rasteriser backed by the `pdftoppm` binary from poppler-utils.
#[derive(Debug, Clone)]
pub struct Pdftoppm {
    binary: PathBuf,
    dpi: u32,
}

impl Pdftoppm {
    pub fn new(binary: impl Into<PathBuf>, dpi: u32) -> Self {
        Self {
            binary: binary.into(),
            dpi,
        }
    }

    fn command(&self, pdf_path: &Path, prefix: &Path, max_pages: usize) -> Command {
        let mut cmd = Command::new(&self.binary);
        cmd.arg("-png")
            .arg("-r")
            .arg(self.dpi.to_string())
            .arg("-f")
            .arg("1")
            .arg("-l")
            .arg(max_pages.to_string());
        if max_pages == 1 {
            // Writes `<prefix>.png` instead of a zero-padded `<prefix>-N.png`.
            cmd.arg("-singlefile");
        }
        cmd.arg(pdf_path)
            .arg(prefix)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }
}

impl Default for Pdftoppm {
    fn default() -> Self {
        Self::new("pdftoppm", 150)
    }
}

const OUTPUT_STEM: &str = "page";

#[async_trait]
impl PageRasterizer for Pdftoppm {
    fn name(&self) -> &str {
        "pdftoppm"
    }

    async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: usize,
    ) -> Result<Vec<PageRaster>, RasterError> {
        let out_dir = TempDir::new()?;
        let prefix = out_dir.path().join(OUTPUT_STEM);

        debug!(
            "Running {} on {} (pages 1-{}, {} dpi)",
            self.binary.display(),
            pdf_path.display(),
            max_pages,
            self.dpi
        );

        let output = self
            .command(pdf_path, &prefix, max_pages)
            .output()
            .await
            .map_err(|e| RasterError::ToolUnavailable {
                tool: self.binary.display().to_string(),
                detail: e.to_string(),
            })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            return Err(RasterError::ToolFailed {
                tool: self.name().to_string(),
                code: output.status.code(),
                stderr,
            });
        }

        let pages = collect_pages(out_dir.path(), max_pages).await?;
        if pages.is_empty() {
            return Err(RasterError::NoOutput {
                tool: self.name().to_string(),
            });
        }
        debug!("{} produced {} page(s)", self.name(), pages.len());
        Ok(pages)
    }
}

/// Page number encoded in a pdftoppm output file name.
///
/// `page.png` (from `-singlefile`) is page 1; `page-7.png` and `page-007.png`
/// are page 7. Anything else is not ours.
fn page_number(file_name: &str) -> Option<usize> {
    let stem = file_name.strip_suffix(".png")?;
    if stem == OUTPUT_STEM {
        return Some(1);
    }
    stem.strip_prefix(OUTPUT_STEM)?
        .strip_prefix('-')?
        .parse()
        .ok()
}

/// Read every page image in `dir`, ordered by page number.
async fn collect_pages(dir: &Path, max_pages: usize) -> Result<Vec<PageRaster>, RasterError> {
    let mut numbered = Vec::new();
    let mut entries = tokio::fs::read_dir(dir).await?;
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name();
        match name.to_str().and_then(page_number) {
            Some(n) => numbered.push((n, entry.path())),
            None => warn!("Ignoring unexpected rasteriser output: {:?}", name),
        }
    }
    numbered.sort_unstable_by_key(|(n, _)| *n);
    numbered.truncate(max_pages);

    let mut pages = Vec::with_capacity(numbered.len());
    for (page_num, path) in numbered {
        pages.push(PageRaster::new(page_num, tokio::fs::read(&path).await?));
    }
    Ok(pages)
}

// ── pdfium ───────────────────────────────────────────────────────────────

/// In-process rasteriser backed by the pdfium library.
///
/// Runs inside `spawn_blocking` since pdfium operations are CPU-bound and
/// not async-safe. The library is bound per call, so a host without pdfium
/// gets [`RasterError::ToolUnavailable`] rather than a panic.
#[cfg(feature = "pdfium")]
#[derive(Debug, Clone)]
pub struct PdfiumRasterizer {
    max_rendered_pixels: u32,
}

#[cfg(feature = "pdfium")]
impl PdfiumRasterizer {
    /// `max_rendered_pixels` caps the longest rendered edge.
    pub fn new(max_rendered_pixels: u32) -> Self {
        Self {
            max_rendered_pixels: max_rendered_pixels.max(100),
        }
    }
}

#[cfg(feature = "pdfium")]
#[async_trait]
impl PageRasterizer for PdfiumRasterizer {
    fn name(&self) -> &str {
        "pdfium"
    }

    async fn rasterize(
        &self,
        pdf_path: &Path,
        max_pages: usize,
    ) -> Result<Vec<PageRaster>, RasterError> {
        let path = pdf_path.to_path_buf();
        let max_pixels = self.max_rendered_pixels;

        tokio::task::spawn_blocking(move || render_pdfium_blocking(&path, max_pixels, max_pages))
            .await
            .map_err(|e| RasterError::Internal(format!("Render task panicked: {e}")))?
    }
}

#[cfg(feature = "pdfium")]
fn render_pdfium_blocking(
    pdf_path: &Path,
    max_pixels: u32,
    max_pages: usize,
) -> Result<Vec<PageRaster>, RasterError> {
    use pdfium_render::prelude::*;
    use std::io::Cursor;

    let bindings = Pdfium::bind_to_system_library().map_err(|e| RasterError::ToolUnavailable {
        tool: "pdfium".into(),
        detail: format!("{e:?}"),
    })?;
    let pdfium = Pdfium::new(bindings);

    let document = pdfium
        .load_pdf_from_file(pdf_path, None)
        .map_err(|e| RasterError::ToolFailed {
            tool: "pdfium".into(),
            code: None,
            stderr: format!("{e:?}"),
        })?;

    let pages = document.pages();
    let total = pages.len() as usize;
    let render_config = PdfRenderConfig::new()
        .set_target_width(max_pixels as i32)
        .set_maximum_height(max_pixels as i32);

    let mut out = Vec::with_capacity(total.min(max_pages));
    for idx in 0..total.min(max_pages) {
        let page = match pages.get(idx as u16) {
            Ok(p) => p,
            Err(e) => {
                warn!("pdfium could not open page {}: {:?}", idx + 1, e);
                continue;
            }
        };
        let bitmap = match page.render_with_config(&render_config) {
            Ok(b) => b,
            Err(e) => {
                // Later pages are still worth trying.
                warn!("pdfium failed on page {}: {:?}", idx + 1, e);
                continue;
            }
        };

        let mut buf = Vec::new();
        bitmap
            .as_image()
            .write_to(&mut Cursor::new(&mut buf), image::ImageFormat::Png)
            .map_err(|e| RasterError::Internal(format!("PNG encoding failed: {e}")))?;
        out.push(PageRaster::new(idx + 1, buf));
    }

    if out.is_empty() {
        return Err(RasterError::NoOutput {
            tool: "pdfium".into(),
        });
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_numbers_from_file_names() {
        assert_eq!(page_number("page.png"), Some(1));
        assert_eq!(page_number("page-1.png"), Some(1));
        assert_eq!(page_number("page-07.png"), Some(7));
        assert_eq!(page_number("page-123.png"), Some(123));
        assert_eq!(page_number("page-x.png"), None);
        assert_eq!(page_number("page-2.ppm"), None);
        assert_eq!(page_number("other-2.png"), None);
    }

    #[tokio::test]
    async fn collect_pages_orders_numerically() {
        let dir = TempDir::new().unwrap();
        for n in [10, 2, 1] {
            std::fs::write(dir.path().join(format!("page-{n:02}.png")), [n as u8]).unwrap();
        }
        std::fs::write(dir.path().join("stray.txt"), b"x").unwrap();

        let pages = collect_pages(dir.path(), 5).await.unwrap();
        let numbers: Vec<_> = pages.iter().map(|p| p.page_num).collect();
        assert_eq!(numbers, [1, 2, 10]);
        assert_eq!(pages[2].bytes, vec![10u8]);
    }

    #[tokio::test]
    async fn collect_pages_honours_max_pages() {
        let dir = TempDir::new().unwrap();
        for n in 1..=4u8 {
            std::fs::write(dir.path().join(format!("page-{n}.png")), [n]).unwrap();
        }
        let pages = collect_pages(dir.path(), 2).await.unwrap();
        assert_eq!(
            pages,
            vec![PageRaster::new(1, vec![1u8]), PageRaster::new(2, vec![2u8])]
        );
    }

    #[tokio::test]
    async fn collect_pages_keeps_numbers_across_gaps() {
        let dir = TempDir::new().unwrap();
        for n in [1u8, 3] {
            std::fs::write(dir.path().join(format!("page-{n}.png")), [n]).unwrap();
        }
        let pages = collect_pages(dir.path(), 3).await.unwrap();
        let numbers: Vec<_> = pages.iter().map(|p| p.page_num).collect();
        assert_eq!(numbers, [1, 3]);
    }

    #[tokio::test]
    async fn missing_binary_is_tool_unavailable() {
        let r = Pdftoppm::new("/nonexistent/bin/pdftoppm-missing", 150);
        let err = r
            .rasterize(Path::new("/nonexistent/input.pdf"), 1)
            .await
            .unwrap_err();
        assert!(
            matches!(err, RasterError::ToolUnavailable { .. }),
            "got {err:?}"
        );
    }

    #[test]
    fn single_page_uses_singlefile() {
        let r = Pdftoppm::default();
        let cmd = r.command(Path::new("in.pdf"), Path::new("out/page"), 1);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(args.contains(&"-singlefile".to_string()));
        assert_eq!(args[..4], ["-png", "-r", "150", "-f"]);
        assert_eq!(args.last().map(String::as_str), Some("out/page"));
    }

    #[test]
    fn multi_page_requests_last_page() {
        let r = Pdftoppm::new("pdftoppm", 96);
        let cmd = r.command(Path::new("in.pdf"), Path::new("page"), 5);
        let args: Vec<_> = cmd
            .as_std()
            .get_args()
            .map(|a| a.to_string_lossy().into_owned())
            .collect();
        assert!(!args.contains(&"-singlefile".to_string()));
        let l = args.iter().position(|a| a == "-l").unwrap();
        assert_eq!(args[l + 1], "5");
    }
}
