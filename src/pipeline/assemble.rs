//! Document assembly: one full candidate PDF per quality trial.
//!
//! [`Assembler::build`] rasterises every page (or takes it from the render
//! cache), JPEG-encodes it at the trial quality and writes the output PDF with
//! `lopdf`: one page per image, the image stretched over the page box.
//!
//! ## Concurrency and ordering
//!
//! Pages are independent, so each one is rendered and encoded in its own
//! `spawn_blocking` task, up to `concurrency` at a time. Tasks complete in any
//! order; the encoded pages are sorted back into source order before the PDF
//! is written, so output page *n* is always source page *n*.
//!
//! ## Orientation
//!
//! The output document has a single orientation, taken from the first page.
//! Every page box is normalised to it: a portrait page in a landscape document
//! gets a landscape box of the same two edge lengths, and its image is
//! stretched into that box. Sources mixing orientations therefore come out
//! with later pages in the wrong framing. This is a known limitation, kept
//! because the intended result for mixed documents was never defined.

use crate::config::Quality;
use crate::error::BuildError;
use crate::pipeline::encode::{encode_page, EncodedPage};
use crate::pipeline::render::{PageSize, RenderCache, SourceDocument};
use futures::stream::{self, StreamExt, TryStreamExt};
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Instant;
use tracing::debug;

/// Document-level page orientation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Orientation {
    #[default]
    Portrait,
    Landscape,
}

impl Orientation {
    /// Landscape when strictly wider than tall; square pages count as portrait.
    pub fn of(size: PageSize) -> Self {
        if size.is_landscape() {
            Orientation::Landscape
        } else {
            Orientation::Portrait
        }
    }

    /// The orientation of the first page, or portrait for an empty list.
    pub fn from_first_page(sizes: &[PageSize]) -> Self {
        sizes.first().copied().map(Self::of).unwrap_or_default()
    }

    /// The page box for `size` inside a document of this orientation.
    pub fn frame(&self, size: PageSize) -> PageSize {
        if Self::of(size) == *self || size.width == size.height {
            size
        } else {
            PageSize::new(size.height, size.width)
        }
    }
}

/// One complete candidate document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildResult {
    /// The serialised PDF.
    pub artifact: Vec<u8>,
    /// Exact byte length of `artifact`.
    pub size_bytes: u64,
    /// Quality every page was encoded at.
    pub quality: Quality,
    pub page_count: usize,
}

/// Builds candidate documents from one source at one scale.
pub struct Assembler {
    source: Arc<dyn SourceDocument>,
    scale: f32,
    concurrency: usize,
    cache: Option<Arc<RenderCache>>,
}

impl Assembler {
    pub fn new(source: Arc<dyn SourceDocument>, scale: f32, concurrency: usize) -> Self {
        Self {
            source,
            scale,
            concurrency: concurrency.max(1),
            cache: None,
        }
    }

    /// Reuse rasterised pages across builds.
    pub fn with_render_cache(mut self) -> Self {
        let cache = RenderCache::new(self.source.page_count(), self.scale);
        self.cache = Some(Arc::new(cache));
        self
    }

    pub fn page_count(&self) -> usize {
        self.source.page_count()
    }

    /// Render, encode and assemble every page at `quality`.
    ///
    /// Fails fast: the first page error aborts the build and is returned as is.
    pub async fn build(&self, quality: Quality) -> Result<BuildResult, BuildError> {
        let start = Instant::now();
        let total = self.source.page_count();

        let mut pages: Vec<EncodedPage> = stream::iter((0..total).map(|index| {
            let source = Arc::clone(&self.source);
            let cache = self.cache.clone();
            let scale = self.scale;
            async move {
                tokio::task::spawn_blocking(move || {
                    let rendered = match cache.as_deref() {
                        Some(cache) => cache.get_or_render(source.as_ref(), index)?,
                        None => Arc::new(source.rasterize(index, scale)?),
                    };
                    encode_page(&rendered, quality)
                })
                .await
                .map_err(|e| BuildError::WorkerPanicked {
                    page: index + 1,
                    detail: e.to_string(),
                })?
            }
        }))
        .buffer_unordered(self.concurrency)
        .try_collect()
        .await?;

        pages.sort_by_key(|p| p.index);

        let sizes = (0..total)
            .map(|index| {
                self.source
                    .native_size(index)
                    .ok_or_else(|| BuildError::UnsupportedPage {
                        page: index + 1,
                        detail: "page has no size".into(),
                    })
            })
            .collect::<Result<Vec<_>, _>>()?;

        let artifact = assemble_pdf(pages, &sizes)?;
        let size_bytes = artifact.len() as u64;
        debug!(
            "Built {} pages at q={} → {} bytes in {}ms",
            total,
            quality,
            size_bytes,
            start.elapsed().as_millis()
        );

        Ok(BuildResult {
            artifact,
            size_bytes,
            quality,
            page_count: total,
        })
    }
}

/// Write encoded pages, already in source order, into a new PDF.
///
/// `page_sizes[i]` is the native size of `pages[i]` in points. The output has
/// no info dictionary or timestamps, so identical input gives identical bytes.
pub fn assemble_pdf(pages: Vec<EncodedPage>, page_sizes: &[PageSize]) -> Result<Vec<u8>, BuildError> {
    if pages.len() != page_sizes.len() {
        return Err(BuildError::Assembly {
            detail: format!(
                "{} encoded pages but {} page sizes",
                pages.len(),
                page_sizes.len()
            ),
        });
    }

    let orientation = Orientation::from_first_page(page_sizes);
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();
    let mut kids: Vec<Object> = Vec::with_capacity(pages.len());

    for (page, size) in pages.into_iter().zip(page_sizes) {
        let frame = orientation.frame(*size);

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => page.width as i64,
                "Height" => page.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8_i64,
                "Filter" => "DCTDecode",
            },
            page.bytes,
        ));

        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![
                        frame.width.into(),
                        0_i64.into(),
                        0_i64.into(),
                        frame.height.into(),
                        0_i64.into(),
                        0_i64.into(),
                    ],
                ),
                Operation::new("Do", vec![Object::Name(b"Im0".to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_bytes = content.encode().map_err(|e| BuildError::Assembly {
            detail: format!("content stream for page {}: {e}", page.index + 1),
        })?;
        let content_id = doc.add_object(Stream::new(dictionary! {}, content_bytes));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0_i64.into(), 0_i64.into(), frame.width.into(), frame.height.into()],
            "Contents" => content_id,
            "Resources" => dictionary! {
                "XObject" => dictionary! {
                    "Im0" => image_id,
                },
            },
        });
        kids.push(page_id.into());
    }

    let count = kids.len() as i64;
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);

    let mut out = Vec::new();
    doc.save_to(&mut out).map_err(|e| BuildError::Assembly {
        detail: e.to_string(),
    })?;
    Ok(out)
}
