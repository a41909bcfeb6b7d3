//! Pipeline stages for target-size PDF recompression.
//!
//! Each submodule implements exactly one step. The search never touches
//! pixels, and the renderer never knows about budgets, so each stage can be
//! tested against synthetic inputs.
//!
//! ## Data Flow
//!
//! ```text
//! input ──▶ render ──▶ encode ──▶ assemble ◀──▶ search
//! (path)    (pdfium)   (JPEG)     (lopdf)       (bisection)
//! ```
//!
//! 1. [`input`]    — read a local file and validate the `%PDF` header
//! 2. [`render`]   — rasterise pages through the [`render::SourceDocument`]
//!    seam; blocking, so it runs in `spawn_blocking`
//! 3. [`encode`]   — JPEG-encode one rasterised page at a given quality
//! 4. [`assemble`] — build a complete candidate PDF at one quality, pages in
//!    parallel, output in source order
//! 5. [`search`]   — bisect the quality range, one full build per trial,
//!    until the best fitting quality is known to within the window

pub mod assemble;
pub mod encode;
pub mod input;
pub mod render;
pub mod search;

#[cfg(test)]
pub(crate) mod testing;
