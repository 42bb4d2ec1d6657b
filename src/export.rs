//! Document export
//!
//! Turns the ordered keyframe images into a single document. The engine only
//! relies on the `DocumentExporter` contract; `PdfExporter` is the stock
//! implementation and lays out one image per page at the image's own size.

use std::path::{Path, PathBuf};
use anyhow::{bail, ensure, Context};
use lopdf::{
    content::{Content, Operation},
    dictionary, Document, Object, Stream,
};
use opencv::{core::Vector, imgcodecs, prelude::*};
use tracing::{debug, info, instrument};

const JPEG_QUALITY: i32 = 92;

/// Ordered list of image locations in, single document location out
pub trait DocumentExporter {
    fn export(&self, images: &[PathBuf], content_name: &str) -> anyhow::Result<PathBuf>;
}

/// Writes `<output_dir>/<content_name>_notes.pdf`
#[derive(Debug, Clone)]
pub struct PdfExporter {
    output_dir: PathBuf,
}

/// One page worth of image data
struct PageImage {
    width: i64,
    height: i64,
    jpeg: Vec<u8>,
}

impl PdfExporter {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self { output_dir: output_dir.into() }
    }

    /// Path of the document produced for `content_name`
    pub fn document_path(&self, content_name: &str) -> PathBuf {
        self.output_dir.join(format!("{}_notes.pdf", content_name))
    }

    fn load_page(path: &Path) -> anyhow::Result<PageImage> {
        let path_str = path.to_str()
            .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
        let image = imgcodecs::imread(path_str, imgcodecs::IMREAD_COLOR)
            .with_context(|| format!("reading {}", path.display()))?;
        if image.empty() {
            bail!("could not decode {}", path.display());
        }

        let mut encoded = Vector::<u8>::new();
        let params = Vector::<i32>::from_slice(&[imgcodecs::IMWRITE_JPEG_QUALITY, JPEG_QUALITY]);
        let ok = imgcodecs::imencode(".jpg", &image, &mut encoded, &params)
            .with_context(|| format!("encoding {}", path.display()))?;
        ensure!(ok, "JPEG encoder rejected {}", path.display());

        Ok(PageImage {
            width: image.cols() as i64,
            height: image.rows() as i64,
            jpeg: encoded.to_vec(),
        })
    }

    fn build(pages: Vec<PageImage>) -> anyhow::Result<Document> {
        let mut doc = Document::with_version("1.5");
        let pages_id = doc.new_object_id();
        let mut kids = Vec::with_capacity(pages.len());

        for page in pages {
            let image_id = doc.add_object(Stream::new(
                dictionary! {
                    "Type" => "XObject",
                    "Subtype" => "Image",
                    "Width" => page.width,
                    "Height" => page.height,
                    "ColorSpace" => "DeviceRGB",
                    "BitsPerComponent" => 8,
                    "Filter" => "DCTDecode",
                },
                page.jpeg,
            ));

            let content = Content {
                operations: vec![
                    Operation::new("q", vec![]),
                    Operation::new("cm", vec![
                        page.width.into(), 0.into(), 0.into(), page.height.into(), 0.into(), 0.into(),
                    ]),
                    Operation::new("Do", vec!["Im0".into()]),
                    Operation::new("Q", vec![]),
                ],
            };
            let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

            let page_id = doc.add_object(dictionary! {
                "Type" => "Page",
                "Parent" => pages_id,
                "MediaBox" => vec![0.into(), 0.into(), page.width.into(), page.height.into()],
                "Contents" => content_id,
                "Resources" => dictionary! {
                    "XObject" => dictionary! { "Im0" => image_id },
                },
            });
            kids.push(Object::from(page_id));
        }

        let count = kids.len() as i64;
        doc.objects.insert(pages_id, Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => count,
        }));
        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        Ok(doc)
    }
}

impl DocumentExporter for PdfExporter {
    #[instrument(skip(self, images), fields(pages = images.len()))]
    fn export(&self, images: &[PathBuf], content_name: &str) -> anyhow::Result<PathBuf> {
        ensure!(!images.is_empty(), "no images to export");

        let pages = images
            .iter()
            .map(|path| Self::load_page(path))
            .collect::<anyhow::Result<Vec<_>>>()?;
        debug!("Loaded {} page images", pages.len());

        let mut doc = Self::build(pages)?;

        std::fs::create_dir_all(&self.output_dir)
            .with_context(|| format!("creating {}", self.output_dir.display()))?;
        let target = self.document_path(content_name);
        doc.save(&target)
            .with_context(|| format!("writing {}", target.display()))?;

        info!("PDF created: {}", target.display());
        Ok(target)
    }
}
