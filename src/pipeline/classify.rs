//! MIME classification: decide which preview path, if any, applies.
//!
//! The dispatcher routes on [`classify`] directly, so the answer given by
//! [`can_generate_preview`] and the path actually taken can never drift apart.

use serde::{Deserialize, Serialize};

/// Raster formats the image path accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ImageKind {
    Png,
    Jpeg,
    Webp,
    Gif,
}

/// What a declared MIME type means for preview generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DocumentKind {
    Image(ImageKind),
    Pdf,
    /// No preview is produced; this is not an error.
    Unsupported,
}

/// Map a MIME type to its preview capability.
///
/// Matching ignores case, surrounding whitespace and parameters such as
/// `; charset=binary`.
pub fn classify(mime_type: &str) -> DocumentKind {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();

    match essence.as_str() {
        "application/pdf" => DocumentKind::Pdf,
        "image/png" => DocumentKind::Image(ImageKind::Png),
        "image/jpeg" | "image/jpg" | "image/pjpeg" => DocumentKind::Image(ImageKind::Jpeg),
        "image/webp" => DocumentKind::Image(ImageKind::Webp),
        "image/gif" => DocumentKind::Image(ImageKind::Gif),
        _ => DocumentKind::Unsupported,
    }
}

/// `true` when a preview can be generated for documents of this MIME type.
pub fn can_generate_preview(mime_type: &str) -> bool {
    classify(mime_type) != DocumentKind::Unsupported
}
