//! Error types for the pdfshrink library.
//!
//! Two distinct error types reflect two distinct layers:
//!
//! * [`BuildError`] — a **component** failed while building one candidate
//!   document: a page could not be decoded, the JPEG codec gave up, or the
//!   output PDF could not be serialised. Raised by the rasteriser, encoder and
//!   assembler.
//!
//! * [`CompressError`] — the **operation** failed. Returned as
//!   `Err(CompressError)` from the top-level `compress*` functions. Component
//!   failures reach callers wrapped in [`CompressError::PipelineFailed`],
//!   except [`BuildError::WorkerPanicked`], which is a bug in the renderer or
//!   codec rather than a property of the document and becomes
//!   [`CompressError::Internal`].
//!
//! There is no partial-success type: one bad page invalidates the whole
//! document, and a result that misses the budget is reported through
//! [`crate::output::CompressionStatus::BudgetUnreachable`], not as an error.

use std::path::PathBuf;
use thiserror::Error;

/// All fatal errors returned by the pdfshrink library.
#[derive(Debug, Error)]
pub enum CompressError {
    // ── Input errors ──────────────────────────────────────────────────────
    /// The request was rejected before any work began (zero budget, empty
    /// document, empty byte buffer).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Input file was not found at the given path.
    #[error("PDF file not found: '{path}'\nCheck the path exists and is readable.")]
    FileNotFound { path: PathBuf },

    /// Process does not have read permission on the file.
    #[error("Permission denied reading '{path}'\nTry: chmod +r {path:?}")]
    PermissionDenied { path: PathBuf },

    /// The file exists and was read, but is not a PDF.
    #[error("File is not a valid PDF: '{path}'\nFirst bytes: {magic:?}")]
    NotAPdf { path: PathBuf, magic: [u8; 4] },

    // ── Pipeline errors ───────────────────────────────────────────────────
    /// A rasterisation, encoding or assembly step failed. No output is produced.
    #[error("Compression pipeline failed: {0}")]
    PipelineFailed(#[source] BuildError),

    /// The caller raised the cancellation flag between two trials.
    #[error("Compression cancelled after {completed_trials} trial build(s)")]
    Cancelled { completed_trials: usize },

    // ── I/O errors ────────────────────────────────────────────────────────
    /// Could not create or write the output PDF file.
    #[error("Failed to write output file '{path}': {source}")]
    OutputWriteFailed {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    // ── Config errors ─────────────────────────────────────────────────────
    /// Builder validation failed.
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    // ── Pdfium binding errors ─────────────────────────────────────────────
    /// Could not bind to a pdfium library.
    #[error(
        "Failed to bind to pdfium library: {0}\n\n\
You can:\n\
  • Place libpdfium next to the executable or in the working directory.\n\
  • Install pdfium system-wide so the dynamic loader can find it.\n\
  • Set PDFIUM_LIB_PATH=/path/to/dir-containing-libpdfium (or pass --pdfium-lib).\n"
    )]
    PdfiumBindingFailed(String),

    // ── Catch-all ─────────────────────────────────────────────────────────
    /// Unexpected internal error (for example a panicked worker task).
    #[error("Internal error: {0}")]
    Internal(String),
}

/// A failure inside one candidate build.
///
/// Builds are fail-fast: the first `BuildError` aborts the build and, through
/// the orchestrator, the whole operation. Page numbers are 1-indexed.
#[derive(Debug, Clone, Error, serde::Serialize, serde::Deserialize)]
pub enum BuildError {
    /// The source could not be opened at all (corrupt header, xref, trailer).
    #[error("Source document cannot be read: {detail}")]
    UnreadableDocument { detail: String },

    /// The source is encrypted. Encrypted and signed documents are not supported.
    #[error("Source document is encrypted; decrypt it first (e.g. qpdf --decrypt in.pdf out.pdf)")]
    EncryptedDocument,

    /// A page uses content the renderer cannot decode.
    #[error("Page {page}: unsupported page content: {detail}")]
    UnsupportedPage { page: usize, detail: String },

    /// The JPEG codec failed on a page.
    #[error("Page {page}: image encoding failed: {detail}")]
    Encode { page: usize, detail: String },

    /// The output PDF could not be serialised.
    #[error("Output document assembly failed: {detail}")]
    Assembly { detail: String },

    /// A page worker panicked or was torn down before it returned.
    #[error("Page {page}: worker panicked: {detail}")]
    WorkerPanicked { page: usize, detail: String },
}

impl From<BuildError> for CompressError {
    fn from(err: BuildError) -> Self {
        match err {
            BuildError::WorkerPanicked { .. } => CompressError::Internal(err.to_string()),
            other => CompressError::PipelineFailed(other),
        }
    }
}

impl BuildError {
    /// `true` for failures tied to the source content rather than the codec or writer.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            BuildError::UnreadableDocument { .. }
                | BuildError::EncryptedDocument
                | BuildError::UnsupportedPage { .. }
        )
    }
}
