//! Configuration types for target-size PDF compression.
//!
//! All compression behaviour is controlled through [`CompressionConfig`], built
//! via its [`CompressionConfigBuilder`]. One engine serves every profile: the
//! "100 KB", "200 KB" and "quick" variants are [`Preset`] values that fill in
//! the same handful of knobs, not separate code paths.
//!
//! # Design choice: builder over constructor
//! The builder lets callers set only what they care about and rely on
//! documented defaults for the rest. Setters clamp obviously out-of-range
//! values; [`CompressionConfigBuilder::build`] rejects combinations that cannot
//! be clamped into something meaningful (e.g. `min_quality > max_quality`).

use crate::cancel::CancellationFlag;
use crate::error::CompressError;
use crate::progress::ProgressCallback;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// JPEG quality level used for one trial build. Meaningful range: 1–100.
pub type Quality = u8;

/// One kibibyte, the unit every preset is expressed in.
pub const KIB: u64 = 1024;

/// Largest source document accepted by default: 50 MiB.
pub const DEFAULT_MAX_INPUT_BYTES: u64 = 50 * 1024 * KIB;

/// Configuration for one compression.
///
/// Built via [`CompressionConfig::builder()`] or using
/// [`CompressionConfig::default()`] (100 KB budget).
///
/// # Example
/// ```rust
/// use pdfshrink::CompressionConfig;
///
/// let config = CompressionConfig::builder()
///     .target_bytes(200 * 1024)
///     .scale(1.0)
///     .quality_bounds(5, 95)
///     .convergence_window(5)
///     .build()
///     .unwrap();
/// assert_eq!(config.target_bytes(), Some(200 * 1024));
/// ```
#[derive(Clone)]
pub struct CompressionConfig {
    /// What the engine optimises for. Default: 100 KB target.
    pub mode: CompressionMode,

    /// Geometric factor applied to every page's native size when rasterising.
    /// Range: 0.1–8.0. Default: 1.0 (one pixel per PDF point).
    ///
    /// The output page box always keeps the source page's native size; scale
    /// only changes how many pixels back it.
    pub scale: f32,

    /// Inclusive quality range explored by the search. Default: 5–95.
    pub quality_bounds: QualityBounds,

    /// Bracket width at which the bisection stops refining. Default: 5.
    ///
    /// Each halving costs one full re-render and re-encode of every page, so a
    /// wider window trades a little quality for fewer builds.
    pub convergence_window: u8,

    /// Pages rasterised/encoded concurrently within one build. Default: 4.
    pub concurrency: usize,

    /// Keep rasterised pages for the whole operation and only re-encode them
    /// on each trial. Default: true.
    ///
    /// Rasterisation does not depend on quality, so caching turns every trial
    /// after the first into a pure encode-and-assemble pass. Disable it to cap
    /// peak memory on very long documents.
    pub cache_renders: bool,

    /// Largest source document accepted, in bytes. Default: 50 MiB.
    ///
    /// Larger inputs are rejected with [`CompressError::InvalidInput`] before
    /// the file is read into memory or pdfium is bound.
    pub max_input_bytes: u64,

    /// How the pdfium renderer is located and bounded.
    pub renderer: RendererConfig,

    /// Optional observer for search progress and the final outcome.
    pub progress_callback: Option<ProgressCallback>,

    /// Checked before every trial build.
    pub cancellation: CancellationFlag,
}

impl Default for CompressionConfig {
    fn default() -> Self {
        Self {
            mode: CompressionMode::default(),
            scale: 1.0,
            quality_bounds: QualityBounds::default(),
            convergence_window: 5,
            concurrency: 4,
            cache_renders: true,
            max_input_bytes: DEFAULT_MAX_INPUT_BYTES,
            renderer: RendererConfig::default(),
            progress_callback: None,
            cancellation: CancellationFlag::new(),
        }
    }
}

impl fmt::Debug for CompressionConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CompressionConfig")
            .field("mode", &self.mode)
            .field("scale", &self.scale)
            .field("quality_bounds", &self.quality_bounds)
            .field("convergence_window", &self.convergence_window)
            .field("concurrency", &self.concurrency)
            .field("cache_renders", &self.cache_renders)
            .field("max_input_bytes", &self.max_input_bytes)
            .field("renderer", &self.renderer)
            .field(
                "progress_callback",
                &self
                    .progress_callback
                    .as_ref()
                    .map(|_| "<dyn CompressionProgressCallback>"),
            )
            .field("cancelled", &self.cancellation.is_cancelled())
            .finish()
    }
}

impl CompressionConfig {
    /// Create a new builder for `CompressionConfig`.
    pub fn builder() -> CompressionConfigBuilder {
        CompressionConfigBuilder {
            config: Self::default(),
        }
    }

    /// Builder pre-filled from a named preset.
    pub fn from_preset(preset: Preset) -> CompressionConfigBuilder {
        Self::builder().preset(preset)
    }

    /// The byte budget, or `None` in fixed-quality mode.
    pub fn target_bytes(&self) -> Option<u64> {
        match self.mode {
            CompressionMode::TargetSize { target_bytes } => Some(target_bytes),
            CompressionMode::FixedQuality { .. } => None,
        }
    }
}

/// Builder for [`CompressionConfig`].
#[derive(Debug)]
pub struct CompressionConfigBuilder {
    config: CompressionConfig,
}

impl CompressionConfigBuilder {
    /// Search for the best quality whose output fits in `bytes`.
    ///
    /// Zero is accepted here and rejected by the orchestrator as
    /// [`CompressError::InvalidInput`], before any page is rendered.
    pub fn target_bytes(mut self, bytes: u64) -> Self {
        self.config.mode = CompressionMode::TargetSize {
            target_bytes: bytes,
        };
        self
    }

    /// Skip the search and build once at `quality`.
    pub fn fixed_quality(mut self, quality: Quality) -> Self {
        self.config.mode = CompressionMode::FixedQuality {
            quality: quality.clamp(1, 100),
        };
        self
    }

    pub fn mode(mut self, mode: CompressionMode) -> Self {
        self.config.mode = mode;
        self
    }

    pub fn scale(mut self, scale: f32) -> Self {
        self.config.scale = if scale.is_finite() {
            scale.clamp(0.1, 8.0)
        } else {
            1.0
        };
        self
    }

    pub fn quality_bounds(mut self, min: Quality, max: Quality) -> Self {
        self.config.quality_bounds = QualityBounds {
            min: min.clamp(1, 100),
            max: max.clamp(1, 100),
        };
        self
    }

    pub fn convergence_window(mut self, window: u8) -> Self {
        self.config.convergence_window = window.max(1);
        self
    }

    pub fn concurrency(mut self, n: usize) -> Self {
        self.config.concurrency = n.max(1);
        self
    }

    pub fn cache_renders(mut self, v: bool) -> Self {
        self.config.cache_renders = v;
        self
    }

    pub fn max_input_bytes(mut self, bytes: u64) -> Self {
        self.config.max_input_bytes = bytes.max(1);
        self
    }

    pub fn max_rendered_pixels(mut self, px: u32) -> Self {
        self.config.renderer.max_rendered_pixels = px.max(100);
        self
    }

    pub fn pdfium_library_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.renderer.library_path = Some(path.into());
        self
    }

    pub fn renderer(mut self, renderer: RendererConfig) -> Self {
        self.config.renderer = renderer;
        self
    }

    pub fn progress_callback(mut self, cb: ProgressCallback) -> Self {
        self.config.progress_callback = Some(cb);
        self
    }

    pub fn cancellation(mut self, flag: CancellationFlag) -> Self {
        self.config.cancellation = flag;
        self
    }

    /// Apply every knob a preset defines. Later setters still override it.
    pub fn preset(self, preset: Preset) -> Self {
        match preset {
            Preset::Budget100Kb | Preset::Budget200Kb => self
                .target_bytes(preset.target_bytes().unwrap_or(100 * KIB))
                .scale(1.0)
                .quality_bounds(5, 95)
                .convergence_window(5),
            Preset::Quick => self.fixed_quality(55).scale(1.1),
        }
    }

    /// Build the configuration, validating constraints.
    pub fn build(self) -> Result<CompressionConfig, CompressError> {
        let c = &self.config;
        if !(c.scale > 0.0 && c.scale.is_finite()) {
            return Err(CompressError::InvalidConfig(format!(
                "Scale must be a positive number, got {}",
                c.scale
            )));
        }
        if c.quality_bounds.min == 0 || c.quality_bounds.max > 100 {
            return Err(CompressError::InvalidConfig(format!(
                "Quality bounds must lie within 1–100, got {}–{}",
                c.quality_bounds.min, c.quality_bounds.max
            )));
        }
        if c.quality_bounds.min > c.quality_bounds.max {
            return Err(CompressError::InvalidConfig(format!(
                "Minimum quality {} exceeds maximum quality {}",
                c.quality_bounds.min, c.quality_bounds.max
            )));
        }
        if c.convergence_window == 0 {
            return Err(CompressError::InvalidConfig(
                "Convergence window must be ≥ 1".into(),
            ));
        }
        if c.concurrency == 0 {
            return Err(CompressError::InvalidConfig(
                "Concurrency must be ≥ 1".into(),
            ));
        }
        if let CompressionMode::FixedQuality { quality } = c.mode {
            if !(1..=100).contains(&quality) {
                return Err(CompressError::InvalidConfig(format!(
                    "Fixed quality must be 1–100, got {quality}"
                )));
            }
        }
        Ok(self.config)
    }
}

// ── Plain-data types ─────────────────────────────────────────────────────

/// What a compression optimises for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompressionMode {
    /// Highest quality (within the convergence window) whose output fits.
    TargetSize { target_bytes: u64 },
    /// A single build at a caller-chosen quality; no size guarantee.
    FixedQuality { quality: Quality },
}

impl Default for CompressionMode {
    fn default() -> Self {
        CompressionMode::TargetSize {
            target_bytes: 100 * KIB,
        }
    }
}

/// Inclusive quality range explored by the search.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct QualityBounds {
    pub min: Quality,
    pub max: Quality,
}

impl QualityBounds {
    pub fn new(min: Quality, max: Quality) -> Self {
        Self { min, max }
    }

    /// Width of the range in quality units.
    pub fn span(&self) -> u8 {
        self.max.saturating_sub(self.min)
    }
}

impl Default for QualityBounds {
    fn default() -> Self {
        Self { min: 5, max: 95 }
    }
}

/// How the pdfium renderer is bound and bounded.
///
/// Passed explicitly to [`crate::pipeline::render::PdfiumDocument::open`];
/// nothing about the renderer lives in process-wide state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RendererConfig {
    /// Directory containing the pdfium shared library. When `None`, the
    /// working directory and then the system loader paths are searched.
    pub library_path: Option<PathBuf>,

    /// Longest rendered edge in pixels. Default: 4000.
    ///
    /// A 1.0-scale render of an A0 poster is already 2384 × 3370 px; larger
    /// scales would grow quadratically. This caps either dimension, scaling
    /// the other proportionally.
    pub max_rendered_pixels: u32,
}

impl Default for RendererConfig {
    fn default() -> Self {
        Self {
            library_path: None,
            max_rendered_pixels: 4000,
        }
    }
}

/// Named compression profiles.
///
/// | Preset | Mode | Scale | Quality |
/// |--------|------|-------|---------|
/// | `Budget100Kb` | ≤ 100 KB | 1.0 | search 5–95, window 5 |
/// | `Budget200Kb` | ≤ 200 KB | 1.0 | search 5–95, window 5 |
/// | `Quick` | fixed | 1.1 | 55 |
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Preset {
    /// Strict upload limits: exam forms, scholarship and government portals.
    #[default]
    Budget100Kb,
    /// Typical online-form limit.
    Budget200Kb,
    /// One aggressive but stable pass with no size target.
    Quick,
}

impl Preset {
    pub fn target_bytes(&self) -> Option<u64> {
        match self {
            Preset::Budget100Kb => Some(100 * KIB),
            Preset::Budget200Kb => Some(200 * KIB),
            Preset::Quick => None,
        }
    }

    /// Short label used in default output file names, e.g. `compressed_100kb_`.
    pub fn file_label(&self) -> Option<&'static str> {
        match self {
            Preset::Budget100Kb => Some("100kb"),
            Preset::Budget200Kb => Some("200kb"),
            Preset::Quick => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_match_100kb_profile() {
        let c = CompressionConfig::default();
        assert_eq!(c.target_bytes(), Some(100 * 1024));
        assert_eq!(c.quality_bounds, QualityBounds::new(5, 95));
        assert_eq!(c.convergence_window, 5);
        assert!((c.scale - 1.0).abs() < f32::EPSILON);
        assert!(c.cache_renders);
        assert_eq!(c.max_input_bytes, 50 * 1024 * 1024);
    }

    #[test]
    fn setters_clamp() {
        let c = CompressionConfig::builder()
            .scale(100.0)
            .concurrency(0)
            .convergence_window(0)
            .max_rendered_pixels(1)
            .max_input_bytes(0)
            .build()
            .unwrap();
        assert!((c.scale - 8.0).abs() < f32::EPSILON);
        assert_eq!(c.concurrency, 1);
        assert_eq!(c.convergence_window, 1);
        assert_eq!(c.renderer.max_rendered_pixels, 100);
        assert_eq!(c.max_input_bytes, 1);

        let c = CompressionConfig::builder().scale(f32::NAN).build().unwrap();
        assert!((c.scale - 1.0).abs() < f32::EPSILON);
    }

    #[test]
    fn inverted_bounds_are_rejected() {
        let err = CompressionConfig::builder()
            .quality_bounds(90, 10)
            .build()
            .unwrap_err();
        assert!(matches!(err, CompressError::InvalidConfig(_)));
        assert!(err.to_string().contains("exceeds"));
    }

    #[test]
    fn zero_target_is_left_for_the_orchestrator() {
        let c = CompressionConfig::builder().target_bytes(0).build().unwrap();
        assert_eq!(c.target_bytes(), Some(0));
    }

    #[test]
    fn presets_fill_in_knobs() {
        let c = CompressionConfig::from_preset(Preset::Budget200Kb)
            .build()
            .unwrap();
        assert_eq!(c.target_bytes(), Some(200 * 1024));

        let c = CompressionConfig::from_preset(Preset::Quick).build().unwrap();
        assert_eq!(c.mode, CompressionMode::FixedQuality { quality: 55 });
        assert!((c.scale - 1.1).abs() < 1e-6);
        assert_eq!(c.target_bytes(), None);
    }

    #[test]
    fn later_setters_override_preset() {
        let c = CompressionConfig::from_preset(Preset::Budget100Kb)
            .target_bytes(50 * 1024)
            .build()
            .unwrap();
        assert_eq!(c.target_bytes(), Some(50 * 1024));
    }

    #[test]
    fn fixed_quality_is_clamped() {
        let c = CompressionConfig::builder().fixed_quality(0).build().unwrap();
        assert_eq!(c.mode, CompressionMode::FixedQuality { quality: 1 });
    }

    #[test]
    fn preset_labels() {
        assert_eq!(Preset::Budget100Kb.file_label(), Some("100kb"));
        assert_eq!(Preset::Quick.file_label(), None);
        assert_eq!(QualityBounds::default().span(), 90);
    }
}
