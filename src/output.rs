//! Result types returned by the preview generator.

use serde::{Deserialize, Serialize};

/// A finished, watermarked WebP preview.
///
/// The caller owns the bytes and decides whether and where to persist them.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PreviewImage {
    /// Encoded WebP bytes.
    #[serde(skip)]
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
    /// WebP quality the bytes were encoded with.
    pub quality: u8,
    /// Watermark text that was applied (seller name or fallback).
    pub watermark: String,
}

impl PreviewImage {
    /// Size of the encoded preview in bytes.
    pub fn byte_len(&self) -> usize {
        self.bytes.len()
    }

    pub fn into_bytes(self) -> Vec<u8> {
        self.bytes
    }
}

/// One page of a multi-page PDF preview.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PagePreview {
    /// 1-indexed page number.
    pub page_num: usize,
    #[serde(flatten)]
    pub image: PreviewImage,
}
