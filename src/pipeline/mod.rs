//! Pipeline stages for preview generation.
//!
//! Each submodule implements exactly one transformation step, so each can be
//! tested on its own and a stage (e.g. the rasteriser backend) can be swapped
//! without touching the others.
//!
//! ## Data Flow
//!
//! ```text
//! classify ──▶ render ──▶ resize ──▶ watermark ──▶ encode
//! (MIME)      (PDF only)  (bound)    (SVG over)    (WebP q60)
//! ```
//!
//! 1. [`classify`]  — map the declared MIME type to image / PDF / unsupported
//! 2. [`render`]    — rasterise PDF pages through an external tool; the only
//!    stage that suspends
//! 3. [`resize`]    — decode and fit inside the bounding box without upscaling
//! 4. [`watermark`] — tile the escaped seller name at −30° and alpha-blend it
//! 5. [`encode`]    — lossy WebP encode

pub mod classify;
pub mod encode;
pub mod render;
pub mod resize;
pub mod watermark;
