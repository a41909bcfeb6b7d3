//! Synthetic source documents for unit tests.

use crate::error::BuildError;
use crate::pipeline::render::{pixel_dimensions, PageSize, RenderedPage, SourceDocument};
use image::{Rgb, RgbImage};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

/// Gradient plus deterministic noise, seeded per page.
pub(crate) fn textured_image(w: u32, h: u32, seed: u32) -> RgbImage {
    let mut state: u32 = 0x9E37_79B9 ^ seed.wrapping_mul(2_654_435_761);
    RgbImage::from_fn(w, h, |x, y| {
        state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
        let noise = (state >> 24) as u8 / 4;
        let base = ((x * 255) / w.max(1)) as u8 / 2;
        Rgb([base.wrapping_add(noise), (y % 256) as u8 / 2 + noise, noise * 2])
    })
}

/// An in-memory document with controllable page sizes, delays, failures and panics.
pub(crate) struct SyntheticDoc {
    sizes: Vec<PageSize>,
    delays_ms: Vec<u64>,
    fail_page: Option<usize>,
    panic_page: Option<usize>,
    calls: AtomicUsize,
}

impl SyntheticDoc {
    pub fn uniform(pages: usize, size: PageSize) -> Self {
        Self::with_sizes(vec![size; pages])
    }

    pub fn with_sizes(sizes: Vec<PageSize>) -> Self {
        Self {
            sizes,
            delays_ms: Vec::new(),
            fail_page: None,
            panic_page: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn with_delays(mut self, delays_ms: Vec<u64>) -> Self {
        self.delays_ms = delays_ms;
        self
    }

    pub fn failing_on(mut self, index: usize) -> Self {
        self.fail_page = Some(index);
        self
    }

    pub fn panicking_on(mut self, index: usize) -> Self {
        self.panic_page = Some(index);
        self
    }

    pub fn rasterize_calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

impl SourceDocument for SyntheticDoc {
    fn page_count(&self) -> usize {
        self.sizes.len()
    }

    fn native_size(&self, index: usize) -> Option<PageSize> {
        self.sizes.get(index).copied()
    }

    fn source_bytes(&self) -> Option<u64> {
        Some(self.sizes.len() as u64 * 1_000_000)
    }

    fn rasterize(&self, index: usize, scale: f32) -> Result<RenderedPage, BuildError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if let Some(ms) = self.delays_ms.get(index) {
            std::thread::sleep(Duration::from_millis(*ms));
        }
        if Some(index) == self.panic_page {
            panic!("renderer bug");
        }
        if Some(index) == self.fail_page {
            return Err(BuildError::UnsupportedPage {
                page: index + 1,
                detail: "synthetic failure".into(),
            });
        }
        let size = self.native_size(index).ok_or_else(|| BuildError::UnsupportedPage {
            page: index + 1,
            detail: "out of range".into(),
        })?;
        let (w, h) = pixel_dimensions(size, scale, 4000);
        Ok(RenderedPage::new(index, textured_image(w, h, index as u32)))
    }
}

/// `/Width` of the image drawn on each page of `pdf`, in page order.
pub(crate) fn page_image_widths(pdf: &[u8]) -> Vec<i64> {
    let doc = lopdf::Document::load_mem(pdf).expect("output should parse");
    doc.get_pages()
        .values()
        .map(|&id| {
            let page = doc.get_dictionary(id).unwrap();
            let xobjects = page
                .get(b"Resources")
                .and_then(|r| r.as_dict())
                .and_then(|r| r.get(b"XObject"))
                .and_then(|x| x.as_dict())
                .unwrap();
            let image_id = xobjects.get(b"Im0").unwrap().as_reference().unwrap();
            let stream = doc.get_object(image_id).unwrap().as_stream().unwrap();
            stream.dict.get(b"Width").unwrap().as_i64().unwrap()
        })
        .collect()
}
