//! Image encoding: `RenderedPage` → baseline JPEG at a given quality.
//!
//! JPEG is the only lossy codec a PDF viewer can decode without extra
//! filters (`DCTDecode`), and its quality knob gives the search a single,
//! roughly monotone dial between size and fidelity.
//!
//! The encoder is a pure function of `(pixels, quality)`: the `image` crate's
//! encoder has no randomness and no timestamps, so repeated calls return
//! byte-identical output. The search relies on that to make trial sizes
//! reproducible.

use crate::config::Quality;
use crate::error::BuildError;
use crate::pipeline::render::RenderedPage;
use image::codecs::jpeg::JpegEncoder;
use std::io::Cursor;
use tracing::debug;

/// One page encoded as JPEG.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EncodedPage {
    /// 0-based page index in the source document.
    pub index: usize,
    pub bytes: Vec<u8>,
    pub width: u32,
    pub height: u32,
}

impl EncodedPage {
    pub fn size_bytes(&self) -> u64 {
        self.bytes.len() as u64
    }
}

/// Encode a rasterised page as JPEG at `quality` (clamped to 1–100).
///
/// # Errors
/// [`BuildError::Encode`] only when the codec itself fails. A large result is
/// never an error; whether it fits is the caller's decision.
pub fn encode_page(page: &RenderedPage, quality: Quality) -> Result<EncodedPage, BuildError> {
    let quality = quality.clamp(1, 100);
    let mut buf = Cursor::new(Vec::new());
    let encoder = JpegEncoder::new_with_quality(&mut buf, quality);
    page.image
        .write_with_encoder(encoder)
        .map_err(|e| BuildError::Encode {
            page: page.index + 1,
            detail: e.to_string(),
        })?;

    let bytes = buf.into_inner();
    debug!(
        "Encoded page {} at q={} → {} bytes",
        page.index + 1,
        quality,
        bytes.len()
    );

    Ok(EncodedPage {
        index: page.index,
        bytes,
        width: page.width(),
        height: page.height(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    /// Gradient plus deterministic noise: compresses like a scanned page.
    fn textured_page(w: u32, h: u32) -> RenderedPage {
        let mut state: u32 = 0x1234_5678;
        let img = RgbImage::from_fn(w, h, |x, y| {
            state = state.wrapping_mul(1_664_525).wrapping_add(1_013_904_223);
            let noise = (state >> 24) as u8 / 4;
            let base = ((x * 255) / w.max(1)) as u8 / 2;
            Rgb([base.wrapping_add(noise), (y % 256) as u8 / 2 + noise, noise * 2])
        });
        RenderedPage::new(0, img)
    }

    #[test]
    fn encode_produces_jpeg_with_page_dimensions() {
        let page = textured_page(64, 48);
        let enc = encode_page(&page, 75).expect("encode should succeed");
        assert_eq!((enc.width, enc.height), (64, 48));
        assert_eq!(&enc.bytes[..2], &[0xFF, 0xD8], "JPEG SOI marker");
        assert_eq!(enc.size_bytes(), enc.bytes.len() as u64);

        let decoded = image::load_from_memory(&enc.bytes).expect("valid JPEG");
        assert_eq!((decoded.width(), decoded.height()), (64, 48));
    }

    #[test]
    fn encode_is_deterministic() {
        let page = textured_page(80, 60);
        for q in [5, 50, 95] {
            let a = encode_page(&page, q).unwrap();
            let b = encode_page(&page, q).unwrap();
            assert_eq!(a.bytes, b.bytes, "q={q} should be byte-identical");
        }
    }

    #[test]
    fn size_is_non_decreasing_in_quality() {
        let page = textured_page(120, 90);
        let samples = [5u8, 20, 35, 50, 65, 80, 95];
        let sizes: Vec<u64> = samples
            .iter()
            .map(|&q| encode_page(&page, q).unwrap().size_bytes())
            .collect();
        for (pair, qs) in sizes.windows(2).zip(samples.windows(2)) {
            assert!(
                pair[0] <= pair[1],
                "size at q={} ({}) exceeds size at q={} ({})",
                qs[0],
                pair[0],
                qs[1],
                pair[1]
            );
        }
        assert!(sizes[0] < sizes[sizes.len() - 1]);
    }

    #[test]
    fn quality_zero_is_clamped() {
        let page = textured_page(16, 16);
        let zero = encode_page(&page, 0).unwrap();
        let one = encode_page(&page, 1).unwrap();
        assert_eq!(zero.bytes, one.bytes);
    }

    #[test]
    fn index_is_carried_through() {
        let mut page = textured_page(8, 8);
        page.index = 4;
        assert_eq!(encode_page(&page, 40).unwrap().index, 4);
    }
}
