//! Quality search: find the highest JPEG quality whose full document fits a
//! byte budget.
//!
//! Output size is treated as non-decreasing in quality, so the feasible
//! qualities form a prefix `[min, q*]` of the bounds. The search keeps an
//! interval `[low, high]` where `low` is known to fit and `high` is not yet
//! known to fit, and bisects it until it is no wider than the convergence
//! window.
//!
//! 1. Build at `bounds.min`. If that exceeds the budget nothing can fit; stop
//!    with [`CompressionStatus::BudgetUnreachable`] and that build.
//! 2. Otherwise record it as the best feasible build and bisect: a fitting
//!    midpoint raises `low` and replaces the best build, an oversized one
//!    lowers `high`.
//! 3. Return the best feasible build. Its quality is always `low`, so the
//!    answer is the lower bound of the final interval and never exceeds the
//!    budget.
//!
//! The number of builds is at most `ceil(log2(span / window)) + 1`, six with
//! the default bounds (5–95) and window (5). See [`max_trials`].
//!
//! Real encoders are only roughly monotone. A non-monotone curve can make the
//! search settle below the true optimum, but never above the budget: only
//! builds that were measured to fit are ever returned with
//! [`CompressionStatus::Converged`].

use crate::cancel::CancellationFlag;
use crate::config::{Quality, QualityBounds};
use crate::error::{BuildError, CompressError};
use crate::output::{CompressionStatus, TrialRecord};
use crate::pipeline::assemble::BuildResult;
use crate::progress::ProgressCallback;
use std::future::Future;
use tracing::{debug, info, warn};

/// Inputs of one search.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SearchParams {
    pub target_bytes: u64,
    pub bounds: QualityBounds,
    /// Stop once `high - low <= window`.
    pub window: u8,
}

impl SearchParams {
    pub fn max_trials(&self) -> usize {
        max_trials(self.bounds, self.window)
    }
}

/// Upper bound on the number of builds one search performs.
pub fn max_trials(bounds: QualityBounds, window: u8) -> usize {
    let span = bounds.span() as u32;
    let window = window.max(1) as u32;
    let mut width = span;
    let mut bisections = 0;
    while width > window {
        width = width.div_ceil(2);
        bisections += 1;
    }
    bisections + 1
}

/// The search interval. `best`, once set, is the build at `low`.
#[derive(Debug, Clone)]
pub struct SearchState {
    pub low: Quality,
    pub high: Quality,
    pub best: Option<BuildResult>,
}

impl SearchState {
    pub fn new(bounds: QualityBounds) -> Self {
        Self {
            low: bounds.min,
            high: bounds.max,
            best: None,
        }
    }

    pub fn is_converged(&self, window: u8) -> bool {
        self.high.saturating_sub(self.low) <= window
    }

    fn midpoint(&self) -> Quality {
        ((self.low as u16 + self.high as u16) / 2) as Quality
    }
}

/// What a finished search returns.
#[derive(Debug, Clone)]
pub struct SearchOutcome {
    pub result: BuildResult,
    pub status: CompressionStatus,
    /// Every build, in the order it ran.
    pub trials: Vec<TrialRecord>,
}

/// Drives builds through the bisection.
///
/// The build function is supplied by the caller, which keeps the controller
/// independent of rendering: tests drive it with plain size curves.
pub struct SearchController {
    params: SearchParams,
    cancellation: CancellationFlag,
    progress: Option<ProgressCallback>,
}

impl SearchController {
    pub fn new(params: SearchParams) -> Self {
        Self {
            params,
            cancellation: CancellationFlag::new(),
            progress: None,
        }
    }

    /// Checked before every build.
    pub fn with_cancellation(mut self, flag: CancellationFlag) -> Self {
        self.cancellation = flag;
        self
    }

    pub fn with_progress(mut self, progress: Option<ProgressCallback>) -> Self {
        self.progress = progress;
        self
    }

    /// Run the search to completion.
    ///
    /// # Errors
    /// - [`CompressError::PipelineFailed`] with the first build error; no
    ///   partial result is returned.
    /// - [`CompressError::Cancelled`] when the cancellation flag is set
    ///   before a build starts.
    pub async fn run<F, Fut>(&self, mut build: F) -> Result<SearchOutcome, CompressError>
    where
        F: FnMut(Quality) -> Fut,
        Fut: Future<Output = Result<BuildResult, BuildError>>,
    {
        let target = self.params.target_bytes;
        let mut state = SearchState::new(self.params.bounds);
        let mut trials = Vec::with_capacity(self.params.max_trials());

        let floor = self.trial(&mut build, state.low, &mut trials).await?;
        if floor.size_bytes > target {
            warn!(
                "Budget of {} bytes is unreachable: q={} already gives {} bytes",
                target, floor.quality, floor.size_bytes
            );
            return Ok(SearchOutcome {
                result: floor,
                status: CompressionStatus::BudgetUnreachable,
                trials,
            });
        }
        state.best = Some(floor);

        while !state.is_converged(self.params.window) {
            let mid = state.midpoint();
            let candidate = self.trial(&mut build, mid, &mut trials).await?;
            if candidate.size_bytes <= target {
                state.low = mid;
                state.best = Some(candidate);
            } else {
                state.high = mid;
            }
            debug!("Search interval now [{}, {}]", state.low, state.high);
        }

        let result = match state.best.take() {
            Some(best) => best,
            None => self.trial(&mut build, state.low, &mut trials).await?,
        };
        let status = if result.size_bytes <= target {
            CompressionStatus::Converged
        } else {
            CompressionStatus::BudgetUnreachable
        };

        info!(
            "Search finished after {} builds: q={} → {} bytes (budget {})",
            trials.len(),
            result.quality,
            result.size_bytes,
            target
        );
        Ok(SearchOutcome {
            result,
            status,
            trials,
        })
    }

    async fn trial<F, Fut>(
        &self,
        build: &mut F,
        quality: Quality,
        trials: &mut Vec<TrialRecord>,
    ) -> Result<BuildResult, CompressError>
    where
        F: FnMut(Quality) -> Fut,
        Fut: Future<Output = Result<BuildResult, BuildError>>,
    {
        if self.cancellation.is_cancelled() {
            return Err(CompressError::Cancelled {
                completed_trials: trials.len(),
            });
        }

        let number = trials.len() + 1;
        if let Some(cb) = &self.progress {
            cb.on_trial_start(number, quality);
        }

        let result = build(quality).await?;
        let within_budget = result.size_bytes <= self.params.target_bytes;
        trials.push(TrialRecord {
            quality,
            size_bytes: result.size_bytes,
            within_budget,
        });
        debug!(
            "Trial {}: q={} → {} bytes ({})",
            number,
            quality,
            result.size_bytes,
            if within_budget { "fits" } else { "too large" }
        );

        if let Some(cb) = &self.progress {
            cb.on_trial_complete(number, quality, result.size_bytes, within_budget);
        }
        Ok(result)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::KIB;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};

    fn fake(quality: Quality, size_bytes: u64) -> BuildResult {
        BuildResult {
            artifact: vec![0; 4],
            size_bytes,
            quality,
            page_count: 1,
        }
    }

    fn params(target_bytes: u64) -> SearchParams {
        SearchParams {
            target_bytes,
            bounds: QualityBounds::default(),
            window: 5,
        }
    }

    /// Linear size curve: `base + per_q * (q - 5)`.
    async fn run_linear(
        controller: &SearchController,
        base: u64,
        per_q: u64,
    ) -> Result<SearchOutcome, CompressError> {
        controller
            .run(|q| async move { Ok(fake(q, base + per_q * (q as u64 - 5))) })
            .await
    }

    #[test]
    fn max_trials_for_defaults() {
        assert_eq!(max_trials(QualityBounds::default(), 5), 6);
        assert_eq!(max_trials(QualityBounds::new(50, 52), 5), 1);
        assert_eq!(max_trials(QualityBounds::new(5, 95), 90), 1);
        assert_eq!(max_trials(QualityBounds::new(5, 95), 1), 8);
    }

    #[tokio::test]
    async fn converges_on_linear_curve() {
        // 80 KB at q=5 up to 500 KB at q=95; budget 100 KB.
        let base = 80 * KIB;
        let per_q = (420 * KIB) / 90;
        let target = 100 * KIB;
        let controller = SearchController::new(params(target));

        let out = run_linear(&controller, base, per_q).await.unwrap();
        assert_eq!(out.status, CompressionStatus::Converged);
        assert!(out.result.size_bytes <= target);
        assert!(out.trials.len() <= 6, "{} trials", out.trials.len());

        // The true optimum is the largest q whose size fits.
        let optimum = (5..=95u8)
            .filter(|&q| base + per_q * (q as u64 - 5) <= target)
            .max()
            .unwrap();
        assert!(out.result.quality <= optimum);
        assert!(optimum - out.result.quality <= 5);
    }

    #[tokio::test]
    async fn unreachable_budget_returns_floor_build() {
        let controller = SearchController::new(params(100 * KIB));
        let out = run_linear(&controller, 300 * KIB, 10 * KIB).await.unwrap();

        assert_eq!(out.status, CompressionStatus::BudgetUnreachable);
        assert_eq!(out.result.quality, 5);
        assert_eq!(out.result.size_bytes, 300 * KIB);
        assert_eq!(out.trials.len(), 1);
        assert!(!out.trials[0].within_budget);
    }

    #[tokio::test]
    async fn everything_fits_lands_near_the_top() {
        let controller = SearchController::new(params(10 * 1024 * KIB));
        let out = run_linear(&controller, 10 * KIB, KIB).await.unwrap();
        assert_eq!(out.status, CompressionStatus::Converged);
        assert!(out.result.quality >= 90);
        assert!(out.trials.len() <= 6);
    }

    #[tokio::test]
    async fn returned_quality_is_always_a_measured_fit() {
        // Non-monotone: a spike at q=50 that overshoots, everything else fits.
        let target = 100;
        let controller = SearchController::new(params(target));
        let out = controller
            .run(|q| async move {
                let size = if (45..=55).contains(&q) { 1000 } else { 50 };
                Ok(fake(q, size))
            })
            .await
            .unwrap();

        assert_eq!(out.status, CompressionStatus::Converged);
        assert!(out.result.size_bytes <= target);
        let recorded = out
            .trials
            .iter()
            .find(|t| t.quality == out.result.quality)
            .expect("returned quality was built");
        assert!(recorded.within_budget);
    }

    #[tokio::test]
    async fn trial_count_respects_bound_for_many_curves() {
        for target in [0u64, 1, 1_000, 5_000, 9_000, 20_000] {
            let controller = SearchController::new(params(target));
            let out = controller
                .run(|q| async move { Ok(fake(q, q as u64 * 100)) })
                .await
                .unwrap();
            assert!(out.trials.len() <= max_trials(QualityBounds::default(), 5));
            if out.status == CompressionStatus::Converged {
                assert!(out.result.size_bytes <= target);
            }
        }
    }

    #[tokio::test]
    async fn narrow_bounds_build_once() {
        let controller = SearchController::new(SearchParams {
            target_bytes: 1_000,
            bounds: QualityBounds::new(40, 43),
            window: 5,
        });
        let out = controller
            .run(|q| async move { Ok(fake(q, 10)) })
            .await
            .unwrap();
        assert_eq!(out.trials.len(), 1);
        assert_eq!(out.result.quality, 40);
    }

    #[tokio::test]
    async fn build_error_aborts_search() {
        let calls = AtomicUsize::new(0);
        let controller = SearchController::new(params(100));
        let err = controller
            .run(|q| {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n == 1 {
                        Err(BuildError::Encode {
                            page: 2,
                            detail: "codec".into(),
                        })
                    } else {
                        Ok(fake(q, 10))
                    }
                }
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompressError::PipelineFailed(BuildError::Encode { page: 2, .. })
        ));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn cancellation_stops_before_next_build() {
        let flag = CancellationFlag::new();
        let controller = SearchController::new(params(1_000)).with_cancellation(flag.clone());
        let err = controller
            .run(|q| {
                // Cancel during the first build.
                flag.cancel();
                async move { Ok(fake(q, 10)) }
            })
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            CompressError::Cancelled {
                completed_trials: 1
            }
        ));
    }

    #[derive(Default)]
    struct Recorder {
        events: Mutex<Vec<(usize, Quality, Option<bool>)>>,
    }

    impl crate::progress::CompressionProgressCallback for Recorder {
        fn on_trial_start(&self, trial: usize, quality: Quality) {
            self.events.lock().unwrap().push((trial, quality, None));
        }

        fn on_trial_complete(&self, trial: usize, quality: Quality, _size: u64, fits: bool) {
            self.events.lock().unwrap().push((trial, quality, Some(fits)));
        }
    }

    #[tokio::test]
    async fn progress_sees_every_trial_in_order() {
        let recorder = Arc::new(Recorder::default());
        let controller = SearchController::new(params(100 * KIB))
            .with_progress(Some(recorder.clone() as ProgressCallback));
        let out = run_linear(&controller, 80 * KIB, 5 * KIB).await.unwrap();

        let events = recorder.events.lock().unwrap();
        assert_eq!(events.len(), out.trials.len() * 2);
        for (i, pair) in events.chunks(2).enumerate() {
            assert_eq!(pair[0].0, i + 1);
            assert_eq!(pair[0].2, None);
            assert_eq!(pair[1].2, Some(out.trials[i].within_budget));
            assert_eq!(pair[0].1, out.trials[i].quality);
        }
    }
}
