//! Progress-callback trait for per-trial compression events.
//!
//! Inject an [`Arc<dyn CompressionProgressCallback>`] via
//! [`crate::config::CompressionConfigBuilder::progress_callback`] to observe
//! the quality search as it runs, and to receive the final outcome once the
//! compression has completed.
//!
//! The callback is a read-only observer: the engine never reads anything back
//! from it, so a slow or failing UI cannot change which document is produced.
//!
//! # Example
//!
//! ```rust
//! use pdfshrink::{CompressionConfig, CompressionProgressCallback};
//! use std::sync::{Arc, atomic::{AtomicUsize, Ordering}};
//!
//! struct TrialCounter {
//!     trials: AtomicUsize,
//! }
//!
//! impl CompressionProgressCallback for TrialCounter {
//!     fn on_trial_complete(&self, trial: usize, quality: u8, size_bytes: u64, within_budget: bool) {
//!         self.trials.fetch_add(1, Ordering::SeqCst);
//!         eprintln!("trial {trial}: q={quality} → {size_bytes} bytes (fits: {within_budget})");
//!     }
//! }
//!
//! let counter = Arc::new(TrialCounter { trials: AtomicUsize::new(0) });
//!
//! let config = CompressionConfig::builder()
//!     .target_bytes(100 * 1024)
//!     .progress_callback(counter as Arc<dyn CompressionProgressCallback>)
//!     .build()
//!     .unwrap();
//! ```

use crate::output::CompressionStatus;
use std::sync::Arc;

/// Called by the compression pipeline as the search progresses.
///
/// All methods have default no-op implementations so callers only override
/// what they care about. Trials run sequentially, so calls never overlap
/// within one compression, but the same callback may be shared between
/// concurrent compressions and must therefore be `Send + Sync`.
pub trait CompressionProgressCallback: Send + Sync {
    /// Called once the source has been opened, before the first trial.
    ///
    /// # Arguments
    /// * `page_count`   — pages in the source document
    /// * `target_bytes` — the byte budget, or `None` in fixed-quality mode
    fn on_compression_start(&self, page_count: usize, target_bytes: Option<u64>) {
        let _ = (page_count, target_bytes);
    }

    /// Called just before a full-document build at `quality`.
    ///
    /// # Arguments
    /// * `trial`   — 1-indexed trial number
    /// * `quality` — JPEG quality used for this build
    fn on_trial_start(&self, trial: usize, quality: u8) {
        let _ = (trial, quality);
    }

    /// Called after each build with its exact size.
    ///
    /// # Arguments
    /// * `trial`         — 1-indexed trial number
    /// * `quality`       — JPEG quality used for this build
    /// * `size_bytes`    — encoded size of the candidate document
    /// * `within_budget` — whether the candidate fits the budget
    fn on_trial_complete(&self, trial: usize, quality: u8, size_bytes: u64, within_budget: bool) {
        let _ = (trial, quality, size_bytes, within_budget);
    }

    /// Called once with the final outcome, after all builds have finished.
    ///
    /// # Arguments
    /// * `status`     — how the search ended
    /// * `quality`    — quality of the returned document
    /// * `size_bytes` — size of the returned document
    fn on_compression_complete(&self, status: CompressionStatus, quality: u8, size_bytes: u64) {
        let _ = (status, quality, size_bytes);
    }
}

/// A no-op implementation for callers that don't need progress events.
pub struct NoopProgressCallback;

impl CompressionProgressCallback for NoopProgressCallback {}

/// Convenience alias matching the type stored in [`crate::config::CompressionConfig`].
pub type ProgressCallback = Arc<dyn CompressionProgressCallback>;
