//! Compression entry points.
//!
//! [`compress_document`] is the orchestrator every other entry point funnels
//! into: it validates the request, wires an [`Assembler`] to the
//! [`SearchController`] (or runs a single fixed-quality build), reports
//! progress and collects statistics. The bytes/file/sync variants only differ
//! in where the source comes from and where the result goes.

use crate::config::{CompressionConfig, CompressionMode, RendererConfig};
use crate::error::CompressError;
use crate::output::{
    CompressionOutput, CompressionStats, CompressionStatus, DocumentMetadata, TrialRecord,
};
use crate::pipeline::assemble::Assembler;
use crate::pipeline::input;
use crate::pipeline::render::{PdfiumDocument, SourceDocument};
use crate::pipeline::search::{SearchController, SearchParams};
use std::path::Path;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// Compress an in-memory PDF.
///
/// The request is validated before pdfium is touched: an empty buffer, a
/// buffer over [`CompressionConfig::max_input_bytes`] or a zero byte budget
/// fails with [`CompressError::InvalidInput`] straight away.
///
/// # Returns
/// `Ok(CompressionOutput)` whenever a document was produced, including when
/// the budget could not be met (`status == BudgetUnreachable`); the caller
/// decides whether an oversized minimum-quality document is still useful.
///
/// # Errors
/// - [`CompressError::InvalidInput`] for an empty or oversized buffer, a zero
///   budget or a document with no pages
/// - [`CompressError::PdfiumBindingFailed`] when no pdfium library is found
/// - [`CompressError::PipelineFailed`] when the source cannot be read or any
///   page fails to render, encode or assemble
/// - [`CompressError::Cancelled`] when the cancellation flag was set
/// - [`CompressError::Internal`] when a page worker panicked
///
/// # Example
/// ```rust,no_run
/// use pdfshrink::{compress, CompressionConfig};
///
/// # #[tokio::main]
/// # async fn main() -> Result<(), Box<dyn std::error::Error>> {
/// let bytes = std::fs::read("scan.pdf")?;
/// let config = CompressionConfig::builder().target_bytes(100 * 1024).build()?;
/// let output = compress(bytes, &config).await?;
/// println!("{}", output.summary());
/// std::fs::write("scan-small.pdf", &output.artifact)?;
/// # Ok(())
/// # }
/// ```
pub async fn compress(
    bytes: impl Into<Vec<u8>>,
    config: &CompressionConfig,
) -> Result<CompressionOutput, CompressError> {
    let bytes = bytes.into();
    if bytes.is_empty() {
        return Err(CompressError::InvalidInput("source document is empty".into()));
    }
    input::check_input_size(bytes.len() as u64, config.max_input_bytes)?;
    validate_mode(config)?;

    let source = open_pdf(bytes, &config.renderer).await?;
    compress_document(Arc::new(source), config).await
}

/// Compress any [`SourceDocument`].
///
/// This is the core operation; it performs no I/O of its own apart from what
/// `source` does while rasterising.
pub async fn compress_document(
    source: Arc<dyn SourceDocument>,
    config: &CompressionConfig,
) -> Result<CompressionOutput, CompressError> {
    let total_start = Instant::now();
    validate_mode(config)?;

    let page_count = source.page_count();
    if page_count == 0 {
        return Err(CompressError::InvalidInput(
            "source document has no pages".into(),
        ));
    }

    let metadata = DocumentMetadata::from_page_sizes(source.page_sizes(), source.source_bytes());
    if metadata.mixed_orientation {
        warn!(
            "Pages mix portrait and landscape; every page will use {:?} framing",
            metadata.orientation
        );
    }
    info!(
        "Compressing {} pages ({:?}, scale {})",
        page_count, config.mode, config.scale
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_compression_start(page_count, config.target_bytes());
    }

    let mut assembler = Assembler::new(Arc::clone(&source), config.scale, config.concurrency);
    if config.cache_renders {
        assembler = assembler.with_render_cache();
    }
    let assembler = &assembler;

    let build_start = Instant::now();
    let (result, status, trials) = match config.mode {
        CompressionMode::TargetSize { target_bytes } => {
            let params = SearchParams {
                target_bytes,
                bounds: config.quality_bounds,
                window: config.convergence_window,
            };
            debug!("Search allows at most {} builds", params.max_trials());
            let outcome = SearchController::new(params)
                .with_cancellation(config.cancellation.clone())
                .with_progress(config.progress_callback.clone())
                .run(move |quality| assembler.build(quality))
                .await?;
            (outcome.result, outcome.status, outcome.trials)
        }
        CompressionMode::FixedQuality { quality } => {
            if config.cancellation.is_cancelled() {
                return Err(CompressError::Cancelled {
                    completed_trials: 0,
                });
            }
            if let Some(ref cb) = config.progress_callback {
                cb.on_trial_start(1, quality);
            }
            let result = assembler.build(quality).await?;
            if let Some(ref cb) = config.progress_callback {
                cb.on_trial_complete(1, quality, result.size_bytes, true);
            }
            let record = TrialRecord {
                quality,
                size_bytes: result.size_bytes,
                within_budget: true,
            };
            (result, CompressionStatus::FixedQuality, vec![record])
        }
    };
    let build_duration_ms = build_start.elapsed().as_millis() as u64;

    let stats = CompressionStats {
        page_count,
        source_bytes: metadata.source_bytes,
        output_bytes: result.size_bytes,
        trials,
        total_duration_ms: total_start.elapsed().as_millis() as u64,
        build_duration_ms,
    };

    info!(
        "Compression complete: {:?} at q={} → {} bytes, {} builds, {}ms total",
        status,
        result.quality,
        result.size_bytes,
        stats.trials.len(),
        stats.total_duration_ms
    );

    if let Some(ref cb) = config.progress_callback {
        cb.on_compression_complete(status, result.quality, result.size_bytes);
    }

    Ok(CompressionOutput {
        size_bytes: result.size_bytes,
        quality: result.quality,
        artifact: result.artifact,
        status,
        metadata,
        stats,
    })
}

/// Compress a PDF file and write the result to `output_path`.
///
/// Uses atomic write (temp file + rename) to prevent partial files. The
/// result is written even when the budget was unreachable; check
/// `output.status`.
pub async fn compress_file(
    input_path: impl AsRef<Path>,
    output_path: impl AsRef<Path>,
    config: &CompressionConfig,
) -> Result<CompressionOutput, CompressError> {
    let bytes = input::read_pdf(input_path.as_ref(), config.max_input_bytes).await?;
    let output = compress(bytes, config).await?;
    let path = output_path.as_ref();

    input::write_atomic(path, &output.artifact).await?;

    info!("Wrote {}", path.display());
    Ok(output)
}

/// Synchronous wrapper around [`compress`].
///
/// Creates a temporary tokio runtime internally.
pub fn compress_sync(
    bytes: impl Into<Vec<u8>>,
    config: &CompressionConfig,
) -> Result<CompressionOutput, CompressError> {
    tokio::runtime::Runtime::new()
        .map_err(|e| CompressError::Internal(format!("Failed to create tokio runtime: {}", e)))?
        .block_on(compress(bytes, config))
}

/// Page count, page sizes and orientation of a PDF, without compressing it.
pub async fn inspect(
    bytes: impl Into<Vec<u8>>,
    renderer: &RendererConfig,
) -> Result<DocumentMetadata, CompressError> {
    let source = open_pdf(bytes.into(), renderer).await?;
    Ok(DocumentMetadata::from_page_sizes(
        source.page_sizes(),
        source.source_bytes(),
    ))
}

// ── Internal helpers ─────────────────────────────────────────────────────

fn validate_mode(config: &CompressionConfig) -> Result<(), CompressError> {
    match config.mode {
        CompressionMode::TargetSize { target_bytes: 0 } => Err(CompressError::InvalidInput(
            "target size must be greater than zero bytes".into(),
        )),
        _ => Ok(()),
    }
}

/// Bind pdfium and open `bytes` on the blocking pool.
async fn open_pdf(bytes: Vec<u8>, renderer: &RendererConfig) -> Result<PdfiumDocument, CompressError> {
    let renderer = renderer.clone();
    tokio::task::spawn_blocking(move || PdfiumDocument::open(bytes, &renderer))
        .await
        .map_err(|e| CompressError::Internal(format!("PDF open task failed: {e}")))?
}
