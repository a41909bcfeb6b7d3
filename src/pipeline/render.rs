//! PDF rasterisation: turn one page into an RGB pixel buffer.
//!
//! ## The `SourceDocument` seam
//!
//! Everything downstream of the rasteriser (encoder, assembler, search) only
//! sees the [`SourceDocument`] trait: a page count, native page sizes and a
//! `rasterize` call. [`PdfiumDocument`] is the production implementation;
//! tests substitute synthetic documents with exactly controlled pixels, delays
//! and failures.
//!
//! ## Why no global pdfium binding?
//!
//! pdfium is bound from a [`RendererConfig`] passed to
//! [`PdfiumDocument::open`]. Two compressions with different library paths or
//! pixel caps never influence each other, and nothing needs to be initialised
//! at process start.
//!
//! ## Blocking
//!
//! `rasterize` is blocking and CPU-bound. Callers run it inside
//! `tokio::task::spawn_blocking` (see [`crate::pipeline::assemble`]).

use crate::config::RendererConfig;
use crate::error::{BuildError, CompressError};
use image::RgbImage;
use once_cell::sync::OnceCell;
use pdfium_render::prelude::*;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

/// Native page size in PDF points (1/72 inch).
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageSize {
    pub width: f32,
    pub height: f32,
}

impl PageSize {
    pub fn new(width: f32, height: f32) -> Self {
        Self { width, height }
    }

    pub fn is_landscape(&self) -> bool {
        self.width > self.height
    }
}

/// A rasterised page: RGB, 8 bits per channel, no alpha.
#[derive(Debug, Clone)]
pub struct RenderedPage {
    /// 0-based page index in the source document.
    pub index: usize,
    pub image: RgbImage,
}

impl RenderedPage {
    pub fn new(index: usize, image: RgbImage) -> Self {
        Self { index, image }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }
}

/// A paginated, read-only source that can be rasterised page by page.
///
/// Implementations are shared between concurrent page workers through `Arc`,
/// so they must be `Send + Sync` and must not mutate observable state in
/// `rasterize`.
pub trait SourceDocument: Send + Sync {
    /// Number of pages. The orchestrator rejects documents with zero pages.
    fn page_count(&self) -> usize;

    /// Native size of page `index` (0-based), or `None` when out of range.
    fn native_size(&self, index: usize) -> Option<PageSize>;

    /// Render page `index` (0-based) at `scale` × its native size.
    ///
    /// # Errors
    /// [`BuildError::UnsupportedPage`] when the page cannot be decoded.
    fn rasterize(&self, index: usize, scale: f32) -> Result<RenderedPage, BuildError>;

    /// Size of the encoded source, when known. Used only for reporting.
    fn source_bytes(&self) -> Option<u64> {
        None
    }

    /// Native sizes of all pages, in order.
    fn page_sizes(&self) -> Vec<PageSize> {
        (0..self.page_count())
            .filter_map(|i| self.native_size(i))
            .collect()
    }
}

/// Pixel dimensions for a page rendered at `scale`, capped so that neither
/// edge exceeds `max_pixels`. Never returns a zero dimension.
pub fn pixel_dimensions(size: PageSize, scale: f32, max_pixels: u32) -> (u32, u32) {
    let mut w = (size.width * scale).round().max(1.0);
    let mut h = (size.height * scale).round().max(1.0);
    let max = max_pixels.max(1) as f32;
    let longest = w.max(h);
    if longest > max {
        let shrink = max / longest;
        w = (w * shrink).round().max(1.0);
        h = (h * shrink).round().max(1.0);
    }
    (w as u32, h as u32)
}

/// Bind to a pdfium shared library.
///
/// With an explicit `library_path` only that directory is tried. Otherwise the
/// working directory is tried first and then the system loader paths.
pub fn bind_pdfium(config: &RendererConfig) -> Result<Pdfium, CompressError> {
    let bindings = match config.library_path.as_deref() {
        Some(dir) => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)),
        None => Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path("./"))
            .or_else(|_| Pdfium::bind_to_system_library()),
    }
    .map_err(|e| CompressError::PdfiumBindingFailed(format!("{e:?}")))?;

    Ok(Pdfium::new(bindings))
}

/// A PDF opened through pdfium.
///
/// Holds the source bytes and re-opens the document for each `rasterize`
/// call; pdfium's document handles borrow the library and cannot be shared
/// across worker threads, whereas the bytes and the bound library can.
pub struct PdfiumDocument {
    pdfium: Pdfium,
    bytes: Vec<u8>,
    page_sizes: Vec<PageSize>,
    max_rendered_pixels: u32,
}

impl PdfiumDocument {
    /// Bind pdfium from `config` and open `bytes`, recording every page size.
    ///
    /// Blocking; call it from `spawn_blocking`.
    pub fn open(bytes: Vec<u8>, config: &RendererConfig) -> Result<Self, CompressError> {
        let pdfium = bind_pdfium(config)?;
        Self::open_with(pdfium, bytes, config.max_rendered_pixels)
    }

    /// Open `bytes` with an already bound library.
    pub fn open_with(
        pdfium: Pdfium,
        bytes: Vec<u8>,
        max_rendered_pixels: u32,
    ) -> Result<Self, CompressError> {
        let page_sizes = {
            let document = pdfium
                .load_pdf_from_byte_slice(&bytes, None)
                .map_err(classify_load_error)?;
            document
                .pages()
                .iter()
                .map(|page| PageSize::new(page.width().value, page.height().value))
                .collect::<Vec<_>>()
        };
        info!("PDF loaded: {} pages", page_sizes.len());

        Ok(Self {
            pdfium,
            bytes,
            page_sizes,
            max_rendered_pixels,
        })
    }
}

impl SourceDocument for PdfiumDocument {
    fn page_count(&self) -> usize {
        self.page_sizes.len()
    }

    fn native_size(&self, index: usize) -> Option<PageSize> {
        self.page_sizes.get(index).copied()
    }

    fn source_bytes(&self) -> Option<u64> {
        Some(self.bytes.len() as u64)
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<RenderedPage, BuildError> {
        let page_num = index + 1;
        let unsupported = |detail: String| BuildError::UnsupportedPage {
            page: page_num,
            detail,
        };

        let size = self
            .native_size(index)
            .ok_or_else(|| unsupported(format!("page index {index} is out of range")))?;
        let (width, height) = pixel_dimensions(size, scale, self.max_rendered_pixels);

        let document = self
            .pdfium
            .load_pdf_from_byte_slice(&self.bytes, None)
            .map_err(|e| unsupported(format!("{e:?}")))?;
        let page = document
            .pages()
            .get(index as u16)
            .map_err(|e| unsupported(format!("{e:?}")))?;

        let render_config = PdfRenderConfig::new()
            .set_target_width(width as i32)
            .set_maximum_height(height as i32);

        let bitmap = page
            .render_with_config(&render_config)
            .map_err(|e| unsupported(format!("{e:?}")))?;

        let image = bitmap.as_image().to_rgb8();
        debug!(
            "Rendered page {} → {}x{} px",
            page_num,
            image.width(),
            image.height()
        );

        Ok(RenderedPage::new(index, image))
    }
}

fn classify_load_error(e: PdfiumError) -> CompressError {
    let err_str = format!("{e:?}");
    if err_str.contains("Password") || err_str.contains("password") {
        BuildError::EncryptedDocument.into()
    } else {
        BuildError::UnreadableDocument { detail: err_str }.into()
    }
}

// ── Render cache ─────────────────────────────────────────────────────────

/// Per-operation memo of rasterised pages.
///
/// Rasterisation does not depend on JPEG quality, so across the trials of one
/// search every page only needs rendering once. One slot per page; the first
/// worker to reach a slot renders it, later trials reuse the result. A failed
/// render leaves the slot empty.
pub struct RenderCache {
    scale: f32,
    slots: Vec<OnceCell<Arc<RenderedPage>>>,
}

impl RenderCache {
    pub fn new(page_count: usize, scale: f32) -> Self {
        Self {
            scale,
            slots: (0..page_count).map(|_| OnceCell::new()).collect(),
        }
    }

    /// The cached render of `index`, rendering it through `source` on first use.
    pub fn get_or_render(
        &self,
        source: &dyn SourceDocument,
        index: usize,
    ) -> Result<Arc<RenderedPage>, BuildError> {
        match self.slots.get(index) {
            Some(slot) => slot
                .get_or_try_init(|| source.rasterize(index, self.scale).map(Arc::new))
                .cloned(),
            None => source.rasterize(index, self.scale).map(Arc::new),
        }
    }

    /// Number of pages rendered so far.
    pub fn filled(&self) -> usize {
        self.slots.iter().filter(|s| s.get().is_some()).count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};

    fn assert_send_sync<T: Send + Sync>() {}

    /// Page workers share one `PdfiumDocument` across the blocking pool.
    #[test]
    fn pdfium_document_can_be_shared_between_workers() {
        assert_send_sync::<PdfiumDocument>();
        assert_send_sync::<Arc<dyn SourceDocument>>();
    }

    struct CountingDoc {
        calls: AtomicUsize,
        fail_page: Option<usize>,
    }

    impl SourceDocument for CountingDoc {
        fn page_count(&self) -> usize {
            2
        }

        fn native_size(&self, index: usize) -> Option<PageSize> {
            (index < 2).then(|| PageSize::new(20.0, 10.0))
        }

        fn rasterize(&self, index: usize, scale: f32) -> Result<RenderedPage, BuildError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if Some(index) == self.fail_page {
                return Err(BuildError::UnsupportedPage {
                    page: index + 1,
                    detail: "broken".into(),
                });
            }
            let (w, h) = pixel_dimensions(PageSize::new(20.0, 10.0), scale, 4000);
            Ok(RenderedPage::new(index, RgbImage::new(w, h)))
        }
    }

    #[test]
    fn pixel_dimensions_scale_and_cap() {
        let a4 = PageSize::new(595.0, 842.0);
        assert_eq!(pixel_dimensions(a4, 1.0, 4000), (595, 842));
        assert_eq!(pixel_dimensions(a4, 2.0, 4000), (1190, 1684));

        let (w, h) = pixel_dimensions(a4, 10.0, 1000);
        assert_eq!(h, 1000);
        assert_eq!(w, 707);

        assert_eq!(pixel_dimensions(PageSize::new(0.2, 0.2), 1.0, 4000), (1, 1));
    }

    #[test]
    fn orientation_helper() {
        assert!(PageSize::new(842.0, 595.0).is_landscape());
        assert!(!PageSize::new(595.0, 842.0).is_landscape());
        assert!(!PageSize::new(500.0, 500.0).is_landscape());
    }

    #[test]
    fn cache_renders_each_page_once() {
        let doc = CountingDoc {
            calls: AtomicUsize::new(0),
            fail_page: None,
        };
        let cache = RenderCache::new(doc.page_count(), 2.0);

        let first = cache.get_or_render(&doc, 0).unwrap();
        let again = cache.get_or_render(&doc, 0).unwrap();
        assert!(Arc::ptr_eq(&first, &again));
        assert_eq!(first.width(), 40);
        assert_eq!(doc.calls.load(Ordering::SeqCst), 1);

        cache.get_or_render(&doc, 1).unwrap();
        assert_eq!(cache.filled(), 2);
        assert_eq!(doc.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn cache_does_not_store_failures() {
        let doc = CountingDoc {
            calls: AtomicUsize::new(0),
            fail_page: Some(1),
        };
        let cache = RenderCache::new(2, 1.0);
        assert!(cache.get_or_render(&doc, 1).is_err());
        assert!(cache.get_or_render(&doc, 1).is_err());
        assert_eq!(cache.filled(), 0);
        assert_eq!(doc.calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn default_page_sizes_walks_all_pages() {
        let doc = CountingDoc {
            calls: AtomicUsize::new(0),
            fail_page: None,
        };
        assert_eq!(doc.page_sizes(), vec![PageSize::new(20.0, 10.0); 2]);
        assert_eq!(doc.source_bytes(), None);
    }
}
