//! Output types returned by the compression entry points.

use crate::config::Quality;
use crate::pipeline::assemble::Orientation;
use crate::pipeline::render::PageSize;
use serde::{Deserialize, Serialize};

/// How a compression ended. Every variant is a success.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionStatus {
    /// A build within the budget was found; its quality is within the
    /// convergence window of the best feasible quality.
    Converged,
    /// Even the minimum quality exceeds the budget. The minimum-quality build
    /// is returned so the caller can tell the user how close it got.
    BudgetUnreachable,
    /// Fixed-quality mode: one build, no budget.
    FixedQuality,
}

impl CompressionStatus {
    /// `true` when the returned document is guaranteed to fit the budget.
    pub fn within_budget(&self) -> bool {
        matches!(self, CompressionStatus::Converged)
    }
}

/// One full-document build performed by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub quality: Quality,
    pub size_bytes: u64,
    /// Always `true` in fixed-quality mode, which has no budget.
    pub within_budget: bool,
}

/// The complete result of a compression.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CompressionOutput {
    /// The output PDF. Not serialised; write it with `std::fs::write` or
    /// [`crate::compress::compress_file`].
    #[serde(skip)]
    pub artifact: Vec<u8>,
    /// Exact byte length of `artifact`.
    pub size_bytes: u64,
    /// JPEG quality every page was encoded at.
    pub quality: Quality,
    pub status: CompressionStatus,
    pub metadata: DocumentMetadata,
    pub stats: CompressionStats,
}

impl CompressionOutput {
    /// One-line human summary, suitable for a notification toast.
    pub fn summary(&self) -> String {
        match self.status {
            CompressionStatus::Converged => format!(
                "Compressed to {} using {}% quality",
                format_size(self.size_bytes),
                self.quality
            ),
            CompressionStatus::BudgetUnreachable => {
                let hint = if self.metadata.page_count > 1 {
                    "Try using fewer pages."
                } else {
                    "Try a lower render scale or a larger target."
                };
                format!(
                    "Target size not achievable: minimum possible size is {}. {hint}",
                    format_size(self.size_bytes)
                )
            }
            CompressionStatus::FixedQuality => {
                if self.stats.is_marginal() {
                    format!(
                        "Compressed to {}: this PDF was already optimised, minimal reduction achieved",
                        format_size(self.size_bytes)
                    )
                } else {
                    format!(
                        "Compressed to {} ({:.1}% smaller)",
                        format_size(self.size_bytes),
                        self.stats.reduction_percent()
                    )
                }
            }
        }
    }
}

/// Shape of the source document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub page_count: usize,
    /// Native size of every page, in PDF points.
    pub page_sizes: Vec<PageSize>,
    /// Orientation the output document will use (decided by the first page).
    pub orientation: Orientation,
    /// `true` when pages disagree with the first page's orientation and will
    /// be stretched into the document orientation.
    pub mixed_orientation: bool,
    /// Size of the source in bytes, when known.
    pub source_bytes: Option<u64>,
}

impl DocumentMetadata {
    pub fn from_page_sizes(page_sizes: Vec<PageSize>, source_bytes: Option<u64>) -> Self {
        let orientation = Orientation::from_first_page(&page_sizes);
        let mixed_orientation = page_sizes
            .iter()
            .any(|s| Orientation::of(*s) != orientation);
        Self {
            page_count: page_sizes.len(),
            page_sizes,
            orientation,
            mixed_orientation,
            source_bytes,
        }
    }
}

/// Aggregate statistics for a compression.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CompressionStats {
    pub page_count: usize,
    pub source_bytes: Option<u64>,
    pub output_bytes: u64,
    /// Every build in the order it ran.
    pub trials: Vec<TrialRecord>,
    pub total_duration_ms: u64,
    /// Time spent inside trial builds (render + encode + assemble).
    pub build_duration_ms: u64,
}

impl CompressionStats {
    /// Size reduction relative to the source, in percent. Negative when the
    /// output grew; `0.0` when the source size is unknown.
    pub fn reduction_percent(&self) -> f64 {
        match self.source_bytes {
            Some(src) if src > 0 => (src as f64 - self.output_bytes as f64) / src as f64 * 100.0,
            _ => 0.0,
        }
    }

    /// Less than 5 % smaller than the source: the source was already compact.
    pub fn is_marginal(&self) -> bool {
        self.source_bytes.is_some() && self.reduction_percent() < 5.0
    }
}

/// Human-readable byte size: `"512 B"`, `"97 KB"`, `"1.25 MB"`.
pub fn format_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = 1024 * 1024;
    if bytes < KB {
        format!("{bytes} B")
    } else if bytes < MB {
        format!("{:.0} KB", bytes as f64 / KB as f64)
    } else {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    }
}
