//! # pdfshrink
//!
//! Recompress PDF documents so they fit a byte budget.
//!
//! ## Why this crate?
//!
//! Upload portals (exam forms, scholarship and government sites) routinely cap
//! attachments at 100 or 200 KB, and scanned documents are nowhere near that.
//! Rather than tuning each embedded object, this crate rasterises every page,
//! re-encodes it as JPEG and rebuilds the PDF, then searches the JPEG quality
//! for the best result that still fits. The output is image-only: text is no
//! longer selectable, which is acceptable for the portals this targets.
//!
//! ## Pipeline Overview
//!
//! ```text
//! PDF
//!  │
//!  ├─ 1. Input     read the file, check the %PDF header
//!  ├─ 2. Render    rasterise pages via pdfium (CPU-bound, spawn_blocking)
//!  ├─ 3. Encode    RGB → baseline JPEG at the trial quality
//!  ├─ 4. Assemble  one image per page, page boxes at native size (lopdf)
//!  └─ 5. Search    bisect quality 5–95 until within 5 of the best fit
//! ```
//!
//! Rendered pages are cached for the whole operation, so only the first trial
//! pays for rasterisation.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdfshrink::{compress_file, CompressionConfig, CompressionStatus, Preset};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = CompressionConfig::from_preset(Preset::Budget100Kb).build()?;
//!     let output = compress_file("scan.pdf", "scan-100kb.pdf", &config).await?;
//!     if output.status == CompressionStatus::BudgetUnreachable {
//!         eprintln!("warning: {}", output.summary());
//!     }
//!     eprintln!("q={} after {} builds", output.quality, output.stats.trials.len());
//!     Ok(())
//! }
//! ```
//!
//! ## Feature Flags
//!
//! | Feature | Default | Description |
//! |---------|---------|-------------|
//! | `cli`   | on      | Enables the `pdfshrink` binary (clap + anyhow + indicatif + tracing-subscriber) |
//!
//! Disable `cli` when using only the library to avoid pulling in CLI-only deps:
//! ```toml
//! pdfshrink = { version = "0.1", default-features = false }
//! ```
//!
//! ## Runtime requirement
//!
//! Rendering needs a pdfium shared library. Point
//! [`RendererConfig::library_path`] (CLI: `--pdfium-lib` / `PDFIUM_LIB_PATH`)
//! at the directory containing it, or install it where the system loader
//! finds it.

// ── Modules ──────────────────────────────────────────────────────────────

pub mod cancel;
pub mod compress;
pub mod config;
pub mod error;
pub mod output;
pub mod pipeline;
pub mod progress;

// ── Re-exports ───────────────────────────────────────────────────────────

pub use cancel::CancellationFlag;
pub use compress::{compress, compress_document, compress_file, compress_sync, inspect};
pub use config::{
    CompressionConfig, CompressionConfigBuilder, CompressionMode, Preset, Quality, QualityBounds,
    RendererConfig, DEFAULT_MAX_INPUT_BYTES, KIB,
};
pub use error::{BuildError, CompressError};
pub use output::{
    format_size, CompressionOutput, CompressionStats, CompressionStatus, DocumentMetadata,
    TrialRecord,
};
pub use pipeline::assemble::Orientation;
pub use pipeline::render::{PageSize, PdfiumDocument, RenderedPage, SourceDocument};
pub use progress::{CompressionProgressCallback, NoopProgressCallback, ProgressCallback};
