//! Single-page PDF assembly
//!
//! The captured bitmap becomes one DeviceRGB image XObject painted across the
//! whole MediaBox, so the page prints at the true physical size of the
//! configured geometry.

use crate::config::PageGeometry;
use crate::rendering::Bitmap;
use crate::{DocumentAssembler, Error, Result};
use flate2::write::ZlibEncoder;
use flate2::Compression;
use lopdf::content::{Content, Operation};
use lopdf::{dictionary, Document, Object, Stream};
use std::io::Write;
use std::path::{Path, PathBuf};

const DOCUMENT_TITLE: &str = "Declaracao de Transferencia";
const CREATOR: &str = concat!("declara ", env!("CARGO_PKG_VERSION"));
const IMAGE_NAME: &str = "Im0";

/// A document written to disk
#[derive(Debug, Clone, PartialEq)]
pub struct SavedDocument {
    pub path: PathBuf,
    /// Page size in PDF points
    pub width_pt: f64,
    pub height_pt: f64,
    pub pages: usize,
    /// Size of the file in bytes
    pub bytes: usize,
}

/// Build the output filename for a student.
///
/// Surrounding whitespace is trimmed before the remaining whitespace and
/// path-hostile characters become `_`, so a blank name uses `fallback`.
///
/// ```
/// use declara::output_filename;
/// let name = output_filename("Ana Maria", "declaracao-transferencia", "documento");
/// assert_eq!(name, "declaracao-transferencia-Ana_Maria.pdf");
/// assert_eq!(
///     output_filename("  ", "declaracao-transferencia", "documento"),
///     "declaracao-transferencia-documento.pdf"
/// );
/// ```
pub fn output_filename(student_name: &str, prefix: &str, fallback: &str) -> String {
    let normalized: String = student_name
        .trim()
        .chars()
        .map(|c| {
            if c.is_whitespace() || c.is_control() || matches!(c, '/' | '\\' | ':' | '*' | '?' | '"' | '<' | '>' | '|') {
                '_'
            } else {
                c
            }
        })
        .collect();
    let stem = if normalized.is_empty() { fallback } else { normalized.as_str() };
    format!("{}-{}.pdf", prefix, stem)
}

/// Writes one-page PDFs into a directory
#[derive(Debug, Clone)]
pub struct PdfAssembler {
    output_dir: PathBuf,
}

impl PdfAssembler {
    pub fn new(output_dir: impl Into<PathBuf>) -> Self {
        Self {
            output_dir: output_dir.into(),
        }
    }

    /// Build the PDF bytes without touching the filesystem
    pub fn render(&self, bitmap: &Bitmap, page: &PageGeometry) -> Result<Vec<u8>> {
        bitmap.validate()?;
        let (w_pt, h_pt) = (page.width_pt() as f32, page.height_pt() as f32);

        let mut doc = Document::with_version("1.4");
        let pages_id = doc.new_object_id();

        let image_id = doc.add_object(Stream::new(
            dictionary! {
                "Type" => "XObject",
                "Subtype" => "Image",
                "Width" => bitmap.width as i64,
                "Height" => bitmap.height as i64,
                "ColorSpace" => "DeviceRGB",
                "BitsPerComponent" => 8,
                "Filter" => "FlateDecode",
            },
            deflate_rgb(bitmap)?,
        ));

        // Scale the unit square image to the full page
        let content = Content {
            operations: vec![
                Operation::new("q", vec![]),
                Operation::new(
                    "cm",
                    vec![w_pt.into(), 0.into(), 0.into(), h_pt.into(), 0.into(), 0.into()],
                ),
                Operation::new("Do", vec![Object::Name(IMAGE_NAME.as_bytes().to_vec())]),
                Operation::new("Q", vec![]),
            ],
        };
        let content_id = doc.add_object(Stream::new(dictionary! {}, content.encode()?));

        let page_id = doc.add_object(dictionary! {
            "Type" => "Page",
            "Parent" => pages_id,
            "MediaBox" => vec![0.into(), 0.into(), w_pt.into(), h_pt.into()],
            "Resources" => dictionary! {
                "XObject" => dictionary! { IMAGE_NAME => image_id },
            },
            "Contents" => content_id,
        });
        doc.set_object(
            pages_id,
            dictionary! {
                "Type" => "Pages",
                "Kids" => vec![page_id.into()],
                "Count" => 1,
            },
        );

        let catalog_id = doc.add_object(dictionary! {
            "Type" => "Catalog",
            "Pages" => pages_id,
        });
        doc.trailer.set("Root", catalog_id);

        let created = chrono::Local::now().format("D:%Y%m%d%H%M%S").to_string();
        let info_id = doc.add_object(dictionary! {
            "Title" => Object::string_literal(DOCUMENT_TITLE),
            "Creator" => Object::string_literal(CREATOR),
            "CreationDate" => Object::string_literal(created),
        });
        doc.trailer.set("Info", info_id);

        let mut out = Vec::new();
        doc.save_to(&mut out)?;
        Ok(out)
    }
}

impl DocumentAssembler for PdfAssembler {
    fn assemble(&self, bitmap: &Bitmap, page: &PageGeometry, filename: &str) -> Result<SavedDocument> {
        let bytes = self.render(bitmap, page)?;
        let path = self.output_dir.join(filename);
        write_atomically(&path, &bytes)
            .map_err(|e| Error::AssemblyFailure(format!("cannot write {}: {}", path.display(), e)))?;
        log::debug!("wrote {} bytes to {}", bytes.len(), path.display());

        Ok(SavedDocument {
            path,
            width_pt: page.width_pt(),
            height_pt: page.height_pt(),
            pages: 1,
            bytes: bytes.len(),
        })
    }
}

/// Drop alpha (compositing over white) and zlib-compress the RGB samples
fn deflate_rgb(bitmap: &Bitmap) -> Result<Vec<u8>> {
    let mut enc = ZlibEncoder::new(Vec::new(), Compression::default());
    let mut row = Vec::with_capacity(bitmap.width as usize * 3);
    for line in bitmap.rgba.chunks_exact(bitmap.width as usize * 4) {
        row.clear();
        for px in line.chunks_exact(4) {
            let a = px[3] as u32;
            for &c in &px[..3] {
                row.push(((c as u32 * a + 255 * (255 - a) + 127) / 255) as u8);
            }
        }
        enc.write_all(&row)?;
    }
    Ok(enc.finish()?)
}

fn write_atomically(path: &Path, bytes: &[u8]) -> std::io::Result<()> {
    if let Some(dir) = path.parent() {
        std::fs::create_dir_all(dir)?;
    }
    let mut tmp = path.as_os_str().to_owned();
    tmp.push(".part");
    let tmp = PathBuf::from(tmp);
    let res = std::fs::write(&tmp, bytes).and_then(|_| std::fs::rename(&tmp, path));
    if res.is_err() {
        let _ = std::fs::remove_file(&tmp);
    }
    res
}
