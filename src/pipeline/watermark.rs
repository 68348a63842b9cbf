//! Watermark overlay: escaped seller text, tiled at −30°, alpha-blended.
//!
//! The overlay is built as SVG markup, rasterised with resvg onto a
//! transparent pixmap the size of the preview frame, then blended onto the
//! frame with a plain "over" composite.
//!
//! The SVG canvas is sized from the declared source size (or the decoded
//! size when there is none) and scaled onto the real frame.
//!
//! A bold DejaVu Sans face ships with the crate and doubles as the generic
//! `sans-serif` family, so the text renders on hosts without system fonts.

use crate::error::PreviewError;
use crate::pipeline::resize::Dimensions;
use image::{Rgba, RgbaImage};
use std::borrow::Cow;
use std::fmt::Write as _;
use std::sync::Arc;
use tracing::debug;
use usvg::fontdb::Database;

/// Rotation applied to the watermark tiling, in degrees.
pub const WATERMARK_ROTATION_DEG: i32 = -30;

const FONT_FAMILY: &str = "DejaVu Sans, Liberation Sans, Arial, Helvetica, sans-serif";

const BUNDLED_FONT: &[u8] = include_bytes!("../../assets/fonts/DejaVuSans-Bold.ttf");
const BUNDLED_FAMILY: &str = "DejaVu Sans";

/// Pick the watermark text: the trimmed seller name, or `fallback` when the
/// name is missing or has nothing printable in it.
pub fn watermark_text<'a>(seller_name: Option<&'a str>, fallback: &'a str) -> &'a str {
    match seller_name.map(str::trim) {
        Some(name) if name.chars().any(|c| !c.is_whitespace() && !c.is_control()) => name,
        _ => fallback,
    }
}

/// Characters allowed by the XML 1.0 `Char` production. Surrogates cannot
/// occur in a Rust `char`.
fn is_xml_char(c: char) -> bool {
    matches!(c, '\t' | '\n' | '\r') || (c >= ' ' && !matches!(c, '\u{FFFE}' | '\u{FFFF}'))
}

/// Escape text for embedding in SVG character data or attribute values.
///
/// Works in a single pass over the input, so the `&` introduced by an entity
/// is never itself re-escaped (`<` becomes `&lt;`, not `&amp;lt;`).
/// Characters XML cannot carry at all (most C0 controls, U+FFFE, U+FFFF) are
/// dropped.
pub fn escape_xml(text: &str) -> Cow<'_, str> {
    let clean = |c: char| is_xml_char(c) && !matches!(c, '&' | '<' | '>' | '"' | '\'');
    if text.chars().all(clean) {
        return Cow::Borrowed(text);
    }
    let mut out = String::with_capacity(text.len() + 16);
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&apos;"),
            c if is_xml_char(c) => out.push(c),
            _ => {}
        }
    }
    Cow::Owned(out)
}

/// Font database holding only the bundled face, registered as the generic
/// `sans-serif` family.
pub fn bundled_fontdb() -> Database {
    let mut fontdb = Database::new();
    fontdb.load_font_data(BUNDLED_FONT.to_vec());
    fontdb.set_sans_serif_family(BUNDLED_FAMILY);
    fontdb
}

/// Build the watermark SVG for a `canvas`-sized frame.
///
/// `text` is escaped here; pass the raw seller name.
pub fn watermark_svg(text: &str, canvas: Dimensions, opacity: f32) -> String {
    let (w, h) = (canvas.width as f32, canvas.height as f32);
    let font_size = (w.min(h) / 14.0).max(12.0);
    // Rough advance width for a bold sans face; only drives tile spacing.
    let text_width = text.chars().count() as f32 * font_size * 0.62;
    let tile_w = text_width + font_size * 3.0;
    let tile_h = font_size * 5.0;
    let stroke = (font_size / 24.0).max(0.5);

    // Offset the tiling so one copy sits on the canvas centre once rotated;
    // small canvases would otherwise fall between copies.
    let theta = (-WATERMARK_ROTATION_DEG as f32).to_radians();
    let (cx, cy) = (w / 2.0, h / 2.0);
    let origin_x = cx * theta.cos() - cy * theta.sin() - tile_w / 2.0;
    let origin_y = cx * theta.sin() + cy * theta.cos() - tile_h / 2.0;

    let mut svg = String::with_capacity(768);
    let _ = write!(
        svg,
        r#"<svg xmlns="http://www.w3.org/2000/svg" width="{w}" height="{h}" viewBox="0 0 {w} {h}">"#
    );
    let _ = write!(
        svg,
        r#"<defs><pattern id="wm" x="{origin_x:.1}" y="{origin_y:.1}" width="{tile_w:.1}" height="{tile_h:.1}" patternUnits="userSpaceOnUse" patternTransform="rotate({WATERMARK_ROTATION_DEG})">"#
    );
    let _ = write!(
        svg,
        r##"<text x="{:.1}" y="{:.1}" text-anchor="middle" dominant-baseline="central" font-family="{FONT_FAMILY}" font-size="{font_size:.1}" font-weight="bold" fill="#ffffff" stroke="#000000" stroke-width="{stroke:.2}">{}</text>"##,
        tile_w / 2.0,
        tile_h / 2.0,
        escape_xml(text),
    );
    let _ = write!(
        svg,
        r#"</pattern></defs><rect width="{w}" height="{h}" fill="url(#wm)" opacity="{opacity:.2}"/></svg>"#
    );
    svg
}

/// Rasterises watermark SVG and blends it onto preview frames.
///
/// Holds the font database so system fonts are scanned once per instance,
/// not once per preview. Cloning is cheap.
#[derive(Clone)]
pub struct Watermarker {
    fontdb: Arc<Database>,
    opacity: f32,
}

impl Watermarker {
    /// Create a watermarker with the bundled face plus the host's system fonts.
    pub fn new(opacity: f32) -> Self {
        let mut fontdb = bundled_fontdb();
        fontdb.load_system_fonts();
        debug!("Loaded {} font faces for watermarking", fontdb.len());
        Self::with_fontdb(Arc::new(fontdb), opacity)
    }

    /// Create a watermarker over an existing font database, used as-is.
    ///
    /// [`Self::apply`] refuses to run over an empty database.
    pub fn with_fontdb(fontdb: Arc<Database>, opacity: f32) -> Self {
        Self { fontdb, opacity }
    }

    /// Watermark `frame` in place with `text`.
    ///
    /// `canvas` is the size the SVG is laid out for; it is scaled to cover the
    /// whole frame.
    pub fn apply(
        &self,
        frame: &mut RgbaImage,
        text: &str,
        canvas: Dimensions,
    ) -> Result<(), PreviewError> {
        // Without a face usvg drops the text and the frame would go out bare.
        if self.fontdb.is_empty() {
            return Err(PreviewError::Watermark("No fonts available".into()));
        }
        let svg = watermark_svg(text, canvas, self.opacity);
        let overlay = self.render_overlay(&svg, frame.width(), frame.height())?;
        image::imageops::overlay(frame, &overlay, 0, 0);
        Ok(())
    }

    /// Rasterise `svg` stretched to `width`×`height` with straight alpha.
    pub fn render_overlay(
        &self,
        svg: &str,
        width: u32,
        height: u32,
    ) -> Result<RgbaImage, PreviewError> {
        let mut opts = usvg::Options::default();
        opts.fontdb = Arc::clone(&self.fontdb);
        let tree = usvg::Tree::from_str(svg, &opts)
            .map_err(|e| PreviewError::Watermark(format!("SVG parsing failed: {e}")))?;

        let mut pixmap = tiny_skia::Pixmap::new(width, height).ok_or_else(|| {
            PreviewError::Watermark(format!("Failed to create pixmap ({width}x{height})"))
        })?;

        let size = tree.size();
        let transform = tiny_skia::Transform::from_scale(
            width as f32 / size.width(),
            height as f32 / size.height(),
        );
        resvg::render(&tree, transform, &mut pixmap.as_mut());

        // tiny-skia stores premultiplied alpha; image blends straight alpha.
        let mut overlay = RgbaImage::new(width, height);
        for (dst, src) in overlay.pixels_mut().zip(pixmap.pixels()) {
            let c = src.demultiply();
            *dst = Rgba([c.red(), c.green(), c.blue(), c.alpha()]);
        }
        Ok(overlay)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CANVAS: Dimensions = Dimensions::new(800, 600);

    fn bare_watermarker() -> Watermarker {
        Watermarker::with_fontdb(Arc::new(Database::new()), 0.18)
    }

    fn bundled_watermarker() -> Watermarker {
        Watermarker::with_fontdb(Arc::new(bundled_fontdb()), 0.18)
    }

    #[test]
    fn seller_name_is_embedded_with_rotation() {
        let svg = watermark_svg("Test Seller", CANVAS, 0.18);
        assert!(svg.contains("Test Seller"));
        assert!(svg.contains("rotate(-30"));
    }

    #[test]
    fn fallback_used_for_missing_or_blank_name() {
        assert_eq!(watermark_text(None, "currico.ch"), "currico.ch");
        assert_eq!(watermark_text(Some(""), "currico.ch"), "currico.ch");
        assert_eq!(watermark_text(Some("   "), "currico.ch"), "currico.ch");
        assert_eq!(watermark_text(Some(" Anna "), "currico.ch"), "Anna");

        let svg = watermark_svg(watermark_text(None, "currico.ch"), CANVAS, 0.18);
        assert!(svg.contains("currico.ch"));
    }

    #[test]
    fn markup_characters_are_escaped() {
        let svg = watermark_svg(r#"Test <&> "Seller""#, CANVAS, 0.18);
        assert!(svg.contains("Test &lt;&amp;&gt; &quot;Seller&quot;"));
        assert!(!svg.contains("<&>"));
    }

    #[test]
    fn escaping_never_double_encodes() {
        assert_eq!(escape_xml("&lt;"), "&amp;lt;");
        assert_eq!(escape_xml("a & b"), "a &amp; b");
        assert_eq!(escape_xml("it's"), "it&apos;s");
    }

    #[test]
    fn control_characters_are_dropped() {
        assert_eq!(escape_xml("Anna\u{1}Muster"), "AnnaMuster");
        assert_eq!(escape_xml("a\u{b}\u{FFFF}<b"), "a&lt;b");
        assert_eq!(escape_xml("tab\there"), "tab\there");

        let svg = watermark_svg("Anna\u{1}Muster\u{1f}", CANVAS, 0.18);
        assert!(svg.contains(">AnnaMuster<"));
        assert!(usvg::Tree::from_str(&svg, &usvg::Options::default()).is_ok());
    }

    #[test]
    fn unprintable_name_uses_fallback() {
        assert_eq!(watermark_text(Some("\u{1}\u{7} "), "currico.ch"), "currico.ch");
        assert_eq!(watermark_text(Some("Anna\u{1}"), "currico.ch"), "Anna\u{1}");
    }

    #[test]
    fn plain_text_is_borrowed() {
        assert!(matches!(escape_xml("Frau Müller"), Cow::Borrowed(_)));
    }

    #[test]
    fn svg_is_sized_to_canvas_and_parses() {
        let svg = watermark_svg("x", Dimensions::new(321, 123), 0.18);
        assert!(svg.contains(r#"width="321""#));
        assert!(svg.contains(r#"height="123""#));
        let tree = usvg::Tree::from_str(&svg, &usvg::Options::default()).unwrap();
        assert_eq!(tree.size().width(), 321.0);
    }

    #[test]
    fn hostile_name_still_parses() {
        let svg = watermark_svg(r#"</text><script>alert('x')</script>"#, CANVAS, 0.18);
        assert!(usvg::Tree::from_str(&svg, &usvg::Options::default()).is_ok());
        assert!(!svg.contains("<script>"));
    }

    #[test]
    fn overlay_blends_over_the_frame() {
        let wm = bare_watermarker();
        let svg = r##"<svg xmlns="http://www.w3.org/2000/svg" width="10" height="10" viewBox="0 0 10 10"><rect width="10" height="10" fill="#000000" opacity="0.5"/></svg>"##;
        let overlay = wm.render_overlay(svg, 20, 20).unwrap();
        let mut frame = RgbaImage::from_pixel(20, 20, Rgba([255, 255, 255, 255]));
        image::imageops::overlay(&mut frame, &overlay, 0, 0);

        let px = frame.get_pixel(15, 15);
        assert!(px[0] > 100 && px[0] < 155, "expected mid grey, got {px:?}");
        assert_eq!(px[3], 255);
    }

    #[test]
    fn empty_font_database_is_rejected() {
        let mut frame = RgbaImage::from_pixel(64, 48, Rgba([200, 200, 200, 255]));
        let err = bare_watermarker()
            .apply(&mut frame, "Test Seller", Dimensions::new(64, 48))
            .unwrap_err();
        assert!(matches!(err, PreviewError::Watermark(_)), "got {err:?}");
    }

    #[test]
    fn bundled_font_draws_text() {
        let fontdb = bundled_fontdb();
        assert_eq!(fontdb.len(), 1);

        let grey = Rgba([128, 128, 128, 255]);
        let mut frame = RgbaImage::from_pixel(400, 300, grey);
        bundled_watermarker()
            .apply(&mut frame, "Test Seller", Dimensions::new(400, 300))
            .unwrap();

        let changed = frame.pixels().filter(|p| **p != grey).count();
        assert!(changed > 400, "only {changed} pixels changed");
        assert!(frame.pixels().all(|p| p[3] == 255));
    }

    #[test]
    fn tiny_canvas_still_gets_text() {
        let grey = Rgba([128, 128, 128, 255]);
        let mut frame = RgbaImage::from_pixel(40, 30, grey);
        bundled_watermarker()
            .apply(&mut frame, "Test Seller", Dimensions::new(40, 30))
            .unwrap();
        assert!(frame.pixels().any(|p| *p != grey));
    }

    #[test]
    fn apply_keeps_frame_size() {
        let wm = bundled_watermarker();
        let mut frame = RgbaImage::from_pixel(64, 48, Rgba([200, 200, 200, 255]));
        wm.apply(&mut frame, "Test Seller", Dimensions::new(800, 1131))
            .unwrap();
        assert_eq!(frame.dimensions(), (64, 48));
    }
}
