//! Page Sequencer
//!
//! Final page order: optional raster page `1`, the generated content pages,
//! then raster pages `2`..`8` that exist. Each raster becomes one
//! full-bleed page in a transient single-page PDF, and the parts are merged
//! into the output. Transient files are removed on every path.

use std::fs;
use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegDecoder;
use image::{ExtendedColorType, GenericImageView, ImageDecoder, ImageFormat};
use lopdf::{dictionary, Dictionary, Document, Object, ObjectId, Stream};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assets::{find_raster, APPENDED_PAGES, PREPENDED_PAGE};
use crate::print::PageSize;

#[derive(Debug, Error)]
pub enum SequenceError {
    #[error("PDF error: {0}")]
    Pdf(#[from] lopdf::Error),

    #[error("Encrypted document cannot be merged: {0}")]
    Encrypted(PathBuf),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Error)]
enum RasterError {
    #[error("read failed: {0}")]
    Io(#[from] std::io::Error),

    #[error("decode failed: {0}")]
    Image(#[from] image::ImageError),
}

/// A file that is deleted when dropped. Removal failures are ignored.
#[derive(Debug)]
pub struct TransientFile {
    path: PathBuf,
}

impl TransientFile {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Drop for TransientFile {
    fn drop(&mut self) {
        if let Err(err) = fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                tracing::debug!(path = %self.path.display(), %err, "transient file not removed");
            }
        }
    }
}

/// `<dir>/<stem>_<suffix>.<extension>` next to `output`.
pub fn sibling_path(output: &Path, suffix: &str, extension: &str) -> PathBuf {
    let stem = output
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "quotation".to_string());
    output.with_file_name(format!("{}_{}.{}", stem, suffix, extension))
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SequenceReport {
    /// Raster base names placed before the content.
    pub prepended: Vec<u32>,
    pub content_pages: usize,
    /// Raster base names placed after the content, in order.
    pub appended: Vec<u32>,
    pub total_pages: usize,
}

pub struct PageSequencer {
    images_dir: PathBuf,
    page_size: PageSize,
}

impl PageSequencer {
    pub fn new(images_dir: impl Into<PathBuf>) -> Self {
        Self {
            images_dir: images_dir.into(),
            page_size: PageSize::A4,
        }
    }

    pub fn with_page_size(mut self, page_size: PageSize) -> Self {
        self.page_size = page_size;
        self
    }

    /// Merge raster pages around `content_pdf` and write the result to `output`.
    pub fn combine(&self, content_pdf: &Path, output: &Path) -> Result<SequenceReport, SequenceError> {
        let mut report = SequenceReport::default();
        let mut transients: Vec<TransientFile> = vec![];
        let mut parts: Vec<PathBuf> = vec![];

        if let Some(image) = find_raster(&self.images_dir, PREPENDED_PAGE) {
            let page = self.raster_part(&image, output, PREPENDED_PAGE)?;
            parts.push(page.path().to_path_buf());
            transients.push(page);
            report.prepended.push(PREPENDED_PAGE);
        }

        let content_index = parts.len();
        parts.push(content_pdf.to_path_buf());

        for base in APPENDED_PAGES {
            let Some(image) = find_raster(&self.images_dir, base) else {
                continue;
            };
            let page = self.raster_part(&image, output, base)?;
            parts.push(page.path().to_path_buf());
            transients.push(page);
            report.appended.push(base);
        }

        let counts = merge_documents(&parts, output)?;
        report.content_pages = counts[content_index];
        report.total_pages = counts.iter().sum();

        tracing::info!(
            output = %output.display(),
            prepended = report.prepended.len(),
            content = report.content_pages,
            appended = report.appended.len(),
            "pages sequenced"
        );

        Ok(report)
    }

    fn raster_part(&self, image: &Path, output: &Path, base: u32) -> Result<TransientFile, SequenceError> {
        let page = TransientFile::new(sibling_path(output, &format!("raster_{}", base), "pdf"));
        raster_to_pdf(image, page.path(), self.page_size)?;
        Ok(page)
    }
}

/// Write a one-page PDF with `image` scaled to fit and centred. A drawing
/// failure still yields a (blank) page.
pub fn raster_to_pdf(image: &Path, pdf_path: &Path, page_size: PageSize) -> Result<(), SequenceError> {
    let (page_w, page_h) = page_size.points();
    let mut doc = Document::with_version("1.5");
    let pages_id = doc.new_object_id();

    let mut resources = Dictionary::new();
    let content = match embed_image(&mut doc, image, page_w, page_h) {
        Ok((xobject_id, ops)) => {
            resources.set("XObject", dictionary! { "Im1" => xobject_id });
            ops
        }
        Err(err) => {
            tracing::warn!(image = %image.display(), %err, "could not draw image, emitting blank page");
            Vec::new()
        }
    };

    let content_id = doc.add_object(Stream::new(dictionary! {}, content));
    let page_id = doc.add_object(dictionary! {
        "Type" => "Page",
        "Parent" => pages_id,
        "Contents" => content_id,
        "Resources" => resources,
        "MediaBox" => vec![0.into(), 0.into(), Object::Real(page_w), Object::Real(page_h)],
    });
    doc.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => vec![page_id.into()],
            "Count" => 1,
        }),
    );
    let catalog_id = doc.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    doc.trailer.set("Root", catalog_id);
    doc.compress();
    doc.save(pdf_path)?;
    Ok(())
}

fn embed_image(
    doc: &mut Document,
    path: &Path,
    page_w: f32,
    page_h: f32,
) -> Result<(ObjectId, Vec<u8>), RasterError> {
    let bytes = fs::read(path)?;
    let format = image::guess_format(&bytes)?;
    let decoded = image::load_from_memory(&bytes)?;
    let (width, height) = decoded.dimensions();

    let jpeg_space = match format {
        ImageFormat::Jpeg => JpegDecoder::new(Cursor::new(bytes.as_slice()))
            .ok()
            .and_then(|decoder| passthrough_color_space(decoder.original_color_type())),
        _ => None,
    };

    let stream = match jpeg_space {
        Some(color_space) => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => color_space,
                "BitsPerComponent" => 8,
                "Filter" => "DCTDecode",
            },
            bytes,
        ),
        None => Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => i64::from(width),
                "Height" => i64::from(height),
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
            },
            flatten_on_white(&decoded),
        ),
    };
    let xobject_id = doc.add_object(stream);

    let scale = (page_w / width as f32).min(page_h / height as f32);
    let draw_w = width as f32 * scale;
    let draw_h = height as f32 * scale;
    let x = (page_w - draw_w) / 2.0;
    let y = (page_h - draw_h) / 2.0;
    let ops = format!("q {:.2} 0 0 {:.2} {:.2} {:.2} cm /Im1 Do Q", draw_w, draw_h, x, y).into_bytes();

    Ok((xobject_id, ops))
}

/// PDF colour space for embedding JPEG bytes as they are. CMYK and YCCK
/// sources are decoded to RGB first instead.
fn passthrough_color_space(original: ExtendedColorType) -> Option<&'static str> {
    match original {
        ExtendedColorType::L8 => Some("DeviceGray"),
        ExtendedColorType::Rgb8 => Some("DeviceRGB"),
        _ => None,
    }
}

/// RGB bytes with any transparency composited over white.
fn flatten_on_white(image: &image::DynamicImage) -> Vec<u8> {
    let rgba = image.to_rgba8();
    let mut rgb = Vec::with_capacity(rgba.len() / 4 * 3);
    for pixel in rgba.pixels() {
        let [r, g, b, a] = pixel.0;
        let alpha = u16::from(a);
        for channel in [r, g, b] {
            let blended = (u16::from(channel) * alpha + 255 * (255 - alpha)) / 255;
            rgb.push(blended as u8);
        }
    }
    rgb
}

/// Move every object of `src` into `dst` and return its page ids in order.
fn import_document_objects(dst: &mut Document, mut src: Document, origin: &Path) -> Result<Vec<ObjectId>, SequenceError> {
    if src.is_encrypted() {
        return Err(SequenceError::Encrypted(origin.to_path_buf()));
    }
    let start_id = dst.max_id + 1;
    src.renumber_objects_with(start_id);
    let page_ids: Vec<ObjectId> = src.get_pages().values().copied().collect();
    if src.max_id > dst.max_id {
        dst.max_id = src.max_id;
    }
    dst.objects.extend(src.objects);
    Ok(page_ids)
}

const INHERITABLE: &[&[u8]] = &[b"Resources", b"MediaBox", b"CropBox", b"Rotate"];

/// Attributes a page inherits from its original page tree and lacks itself.
fn inherited_attributes(doc: &Document, page_id: ObjectId) -> Vec<(&'static [u8], Object)> {
    let mut found: Vec<(&'static [u8], Object)> = vec![];
    let Ok(page) = doc.get_object(page_id).and_then(Object::as_dict) else {
        return found;
    };

    let mut parent = page.get(b"Parent").and_then(Object::as_reference).ok();
    let mut depth = 0;
    while let Some(parent_id) = parent {
        let Ok(node) = doc.get_object(parent_id).and_then(Object::as_dict) else {
            break;
        };
        for &key in INHERITABLE {
            if page.has(key) || found.iter().any(|(k, _)| *k == key) {
                continue;
            }
            if let Ok(value) = node.get(key) {
                found.push((key, value.clone()));
            }
        }
        depth += 1;
        if depth > 32 {
            break;
        }
        parent = node.get(b"Parent").and_then(Object::as_reference).ok();
    }
    found
}

/// Concatenate the pages of `parts` in order into `output`. Returns the
/// page count contributed by each part.
pub fn merge_documents(parts: &[PathBuf], output: &Path) -> Result<Vec<usize>, SequenceError> {
    let mut merged = Document::with_version("1.5");
    let mut page_ids: Vec<ObjectId> = vec![];
    let mut counts = Vec::with_capacity(parts.len());

    for part in parts {
        let src = Document::load(part)?;
        let ids = import_document_objects(&mut merged, src, part)?;
        counts.push(ids.len());
        page_ids.extend(ids);
    }

    let pages_id = merged.new_object_id();
    for &page_id in &page_ids {
        let inherited = inherited_attributes(&merged, page_id);
        if let Ok(Object::Dictionary(page)) = merged.get_object_mut(page_id) {
            for (key, value) in inherited {
                page.set(key.to_vec(), value);
            }
            page.set("Parent", pages_id);
        }
    }

    let kids: Vec<Object> = page_ids.iter().map(|&id| Object::Reference(id)).collect();
    merged.objects.insert(
        pages_id,
        Object::Dictionary(dictionary! {
            "Type" => "Pages",
            "Kids" => kids,
            "Count" => page_ids.len() as i64,
        }),
    );
    let catalog_id = merged.add_object(dictionary! {
        "Type" => "Catalog",
        "Pages" => pages_id,
    });
    merged.trailer.set("Root", catalog_id);
    merged.prune_objects();
    merged.renumber_objects();
    merged.compress();
    merged.save(output)?;

    Ok(counts)
}
