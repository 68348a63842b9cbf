//! CLI binary for currico-preview.
//!
//! A thin shim over the library crate that maps CLI flags to
//! `PreviewConfig`, runs one preview and writes the WebP file(s).

use anyhow::{Context, Result};
use clap::Parser;
use currico_preview::{
    can_generate_preview, classify, DocumentKind, PagePreview, PreviewConfig, PreviewGenerator,
    RasterizerBackend, DEFAULT_WATERMARK_FALLBACK,
};
use serde::Serialize;
use std::io;
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

// ── ANSI colour helpers (no extra deps) ──────────────────────────────────────

fn green(s: &str) -> String {
    format!("\x1b[32m{s}\x1b[0m")
}
fn yellow(s: &str) -> String {
    format!("\x1b[33m{s}\x1b[0m")
}
fn dim(s: &str) -> String {
    format!("\x1b[2m{s}\x1b[0m")
}

const AFTER_HELP: &str = r#"EXAMPLES:
  # Preview an image, watermarked with the seller's name
  currico-preview worksheet.png --seller "Frau Muster"

  # First page of a PDF, explicit output path
  currico-preview lesson.pdf -o lesson.webp

  # First three PDF pages → lesson.page-1.webp … lesson.page-3.webp
  currico-preview lesson.pdf --pages 3

  # JSON report instead of human-readable output
  currico-preview lesson.pdf --pages 3 --json

RASTERISER:
  PDF pages are rendered with poppler's `pdftoppm` (package poppler-utils).
  When it is missing, PDFs simply get no preview; images are unaffected.

ENVIRONMENT VARIABLES:
  CURRICO_PREVIEW_SELLER      Default watermark seller name
  CURRICO_PREVIEW_FALLBACK    Watermark text when no seller is given
  CURRICO_PREVIEW_PDFTOPPM    Path to the pdftoppm binary
  RUST_LOG                    Overrides --verbose / --quiet log filtering
"#;

/// Generate watermarked WebP previews for images and PDFs.
#[derive(Parser, Debug)]
#[command(
    name = "currico-preview",
    version,
    about = "Generate watermarked WebP previews for images and PDFs",
    arg_required_else_help = true,
    color = clap::ColorChoice::Auto,
    after_long_help = AFTER_HELP
)]
struct Cli {
    /// Image or PDF file to preview.
    input: PathBuf,

    /// Declared MIME type. Sniffed from the file content when omitted.
    #[arg(long, env = "CURRICO_PREVIEW_MIME")]
    mime: Option<String>,

    /// Seller display name used as watermark.
    #[arg(long, env = "CURRICO_PREVIEW_SELLER")]
    seller: Option<String>,

    /// Watermark text when no seller name is given.
    #[arg(long, env = "CURRICO_PREVIEW_FALLBACK", default_value = DEFAULT_WATERMARK_FALLBACK)]
    fallback: String,

    /// Number of PDF pages to preview (PDF only).
    #[arg(long, env = "CURRICO_PREVIEW_PAGES", default_value_t = 1)]
    pages: usize,

    /// Output file (single preview) or directory (multi-page).
    #[arg(short, long, env = "CURRICO_PREVIEW_OUTPUT")]
    output: Option<PathBuf>,

    /// Maximum preview width in pixels.
    #[arg(long, env = "CURRICO_PREVIEW_MAX_WIDTH", default_value_t = 800)]
    max_width: u32,

    /// Maximum preview height in pixels.
    #[arg(long, env = "CURRICO_PREVIEW_MAX_HEIGHT", default_value_t = 1131)]
    max_height: u32,

    /// WebP quality (1–100).
    #[arg(long, env = "CURRICO_PREVIEW_QUALITY", default_value_t = 60,
          value_parser = clap::value_parser!(u8).range(1..=100))]
    quality: u8,

    /// PDF rasterisation DPI (72–400).
    #[arg(long, env = "CURRICO_PREVIEW_DPI", default_value_t = 150,
          value_parser = clap::value_parser!(u32).range(72..=400))]
    dpi: u32,

    /// Rasteriser timeout in seconds.
    #[arg(long, env = "CURRICO_PREVIEW_TIMEOUT", default_value_t = 30)]
    timeout: u64,

    /// PDF rasteriser backend.
    #[arg(long, env = "CURRICO_PREVIEW_BACKEND", value_enum, default_value = "pdftoppm")]
    backend: BackendArg,

    /// Path to the pdftoppm binary.
    #[arg(long, env = "CURRICO_PREVIEW_PDFTOPPM", default_value = "pdftoppm")]
    pdftoppm: PathBuf,

    /// Print a JSON report instead of human-readable output.
    #[arg(long, env = "CURRICO_PREVIEW_JSON")]
    json: bool,

    /// Enable DEBUG-level tracing logs.
    #[arg(short, long, env = "CURRICO_PREVIEW_VERBOSE")]
    verbose: bool,

    /// Suppress all output except errors.
    #[arg(short, long, env = "CURRICO_PREVIEW_QUIET")]
    quiet: bool,
}

#[derive(clap::ValueEnum, Clone, Debug)]
enum BackendArg {
    Pdftoppm,
    Pdfium,
}

impl From<BackendArg> for RasterizerBackend {
    fn from(v: BackendArg) -> Self {
        match v {
            BackendArg::Pdftoppm => RasterizerBackend::Pdftoppm,
            BackendArg::Pdfium => RasterizerBackend::Pdfium,
        }
    }
}

/// Machine-readable summary printed with `--json`.
#[derive(Serialize)]
struct Report {
    input: PathBuf,
    mime_type: String,
    previewable: bool,
    pages: Vec<PageReport>,
}

#[derive(Serialize)]
struct PageReport {
    page: usize,
    path: PathBuf,
    width: u32,
    height: u32,
    bytes: usize,
    watermark: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // ── Logging setup ────────────────────────────────────────────────────
    let filter = if cli.verbose {
        "debug"
    } else if cli.quiet || cli.json {
        "error"
    } else {
        "info"
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter)),
        )
        .with_writer(io::stderr)
        .init();

    // ── Read input ───────────────────────────────────────────────────────
    let bytes = tokio::fs::read(&cli.input)
        .await
        .with_context(|| format!("Failed to read {:?}", cli.input))?;

    let mime_type = match cli.mime.clone() {
        Some(m) => m,
        None => sniff_mime(&bytes),
    };
    let previewable = can_generate_preview(&mime_type);
    let multi = classify(&mime_type) == DocumentKind::Pdf && cli.pages > 1;

    // ── Build generator ──────────────────────────────────────────────────
    let config = build_config(&cli)?;
    let generator = PreviewGenerator::new(config).context("Invalid configuration")?;
    let seller = cli.seller.as_deref();

    // ── Generate ─────────────────────────────────────────────────────────
    let pages: Vec<PagePreview> = if !previewable {
        Vec::new()
    } else if multi {
        match generator.render_pdf_pages(&bytes, cli.pages, seller).await {
            Ok(pages) => pages
                .into_iter()
                .filter_map(|p| p.map_err(|e| tracing::warn!("{}", e)).ok())
                .collect(),
            Err(e) => {
                tracing::warn!("No PDF page previews: {}", e);
                Vec::new()
            }
        }
    } else {
        match generator.render_preview(&bytes, &mime_type, seller).await {
            Ok(Some(image)) => vec![PagePreview { page_num: 1, image }],
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!("No preview: {}", e);
                Vec::new()
            }
        }
    };

    // ── Write output ─────────────────────────────────────────────────────
    let mut written = Vec::with_capacity(pages.len());
    for page in pages {
        let path = output_path(&cli.input, cli.output.as_deref(), page.page_num, multi);
        write_atomic(&path, &page.image.bytes).await?;
        written.push(PageReport {
            page: page.page_num,
            width: page.image.width,
            height: page.image.height,
            bytes: page.image.byte_len(),
            watermark: page.image.watermark,
            path,
        });
    }

    if cli.json {
        let report = Report {
            input: cli.input.clone(),
            mime_type,
            previewable,
            pages: written,
        };
        println!(
            "{}",
            serde_json::to_string_pretty(&report).context("Failed to serialise report")?
        );
    } else if !cli.quiet {
        if written.is_empty() {
            let why = if previewable {
                "preview generation failed"
            } else {
                "type has no preview"
            };
            eprintln!("{} no preview for {} ({})", yellow("⚠"), mime_type, why);
        }
        for p in &written {
            eprintln!(
                "{} {}  {}x{}  {}",
                green("✔"),
                p.path.display(),
                p.width,
                p.height,
                dim(&format!("{} bytes", p.bytes)),
            );
        }
    }

    Ok(())
}

/// Map CLI args to `PreviewConfig`.
fn build_config(cli: &Cli) -> Result<PreviewConfig> {
    PreviewConfig::builder()
        .max_width(cli.max_width)
        .max_height(cli.max_height)
        .quality(cli.quality)
        .dpi(cli.dpi)
        .watermark_fallback(cli.fallback.clone())
        .rasterize_timeout_secs(cli.timeout)
        .backend(cli.backend.clone().into())
        .pdftoppm_path(cli.pdftoppm.clone())
        .build()
        .context("Invalid configuration")
}

/// Guess the MIME type from magic bytes, as an upload handler would.
fn sniff_mime(bytes: &[u8]) -> String {
    infer::get(bytes)
        .map(|t| t.mime_type().to_string())
        .unwrap_or_else(|| "application/octet-stream".to_string())
}

/// `<stem>.preview.webp` or `<stem>.page-<n>.webp`, next to the input or
/// under `--output`.
fn output_path(input: &Path, output: Option<&Path>, page: usize, multi: bool) -> PathBuf {
    let stem = input
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "preview".to_string());
    let file_name = if multi {
        format!("{stem}.page-{page}.webp")
    } else {
        format!("{stem}.preview.webp")
    };

    match output {
        Some(out) if multi || out.is_dir() => out.join(file_name),
        Some(out) => out.to_path_buf(),
        None => input.with_file_name(file_name),
    }
}

/// Atomic write: write to a sibling temp file, then rename.
async fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        tokio::fs::create_dir_all(parent)
            .await
            .with_context(|| format!("Failed to create {:?}", parent))?;
    }

    let tmp_path = path.with_extension("webp.tmp");
    tokio::fs::write(&tmp_path, bytes)
        .await
        .with_context(|| format!("Failed to write {:?}", tmp_path))?;
    tokio::fs::rename(&tmp_path, path)
        .await
        .with_context(|| format!("Failed to move preview into {:?}", path))?;
    Ok(())
}
