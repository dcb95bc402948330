//! TrueType outline glyphs for page text.
//!
//! Layout stays on the monospaced cell grid of [`super::glyphs`]; an outline
//! glyph is drawn into its cell, narrowed when its own advance is wider than
//! the cell.

use super::glyphs;
use crate::{Error, Result};
use log::debug;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tiny_skia::{FillRule, Paint, Path as SkPath, PathBuilder, Pixmap, Transform};
use ttf_parser::{Face, GlyphId, OutlineBuilder};

/// Baseline position inside a glyph cell, matching the bitmap glyphs whose
/// last row holds descenders
const BASELINE: f32 = 7.0 / 8.0;

/// Common sans-serif files, relative to the font directories
const SANS_CANDIDATES: &[&str] = &[
    "truetype/dejavu/DejaVuSans.ttf",
    "dejavu/DejaVuSans.ttf",
    "TTF/DejaVuSans.ttf",
    "truetype/liberation/LiberationSans-Regular.ttf",
    "liberation-sans/LiberationSans-Regular.ttf",
    "truetype/noto/NotoSans-Regular.ttf",
    "noto/NotoSans-Regular.ttf",
    "Supplemental/Arial.ttf",
    "arial.ttf",
    "DejaVuSans.ttf",
];

/// A font file, validated on load and shared between rasterizer clones
#[derive(Clone)]
pub struct OutlineFont {
    data: Arc<Vec<u8>>,
    source: PathBuf,
}

impl std::fmt::Debug for OutlineFont {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OutlineFont")
            .field("source", &self.source)
            .field("bytes", &self.data.len())
            .finish()
    }
}

impl OutlineFont {
    /// Load a TrueType/OpenType file.
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| Error::ConfigError(format!("cannot read font {}: {}", path.display(), e)))?;
        Face::parse(&data, 0)
            .map_err(|e| Error::ConfigError(format!("{} is not a usable font: {}", path.display(), e)))?;
        Ok(Self {
            data: Arc::new(data),
            source: path.to_path_buf(),
        })
    }

    /// First common sans-serif font found on this machine
    pub fn system_sans() -> Option<Self> {
        for dir in font_dirs() {
            for name in SANS_CANDIDATES {
                let path = dir.join(name);
                if !path.is_file() {
                    continue;
                }
                match Self::from_file(&path) {
                    Ok(font) => {
                        debug!("using outline font {}", path.display());
                        return Some(font);
                    }
                    Err(err) => debug!("skipping {}: {}", path.display(), err),
                }
            }
        }
        None
    }

    pub(crate) fn face(&self) -> Option<Face<'_>> {
        Face::parse(&self.data, 0).ok()
    }
}

fn font_dirs() -> Vec<PathBuf> {
    let mut dirs = Vec::new();
    if let Ok(extra) = std::env::var("DECLARA_FONT_DIR") {
        dirs.extend(std::env::split_paths(&extra).filter(|p| !p.as_os_str().is_empty()));
    }

    #[cfg(target_os = "linux")]
    {
        dirs.push(PathBuf::from("/usr/share/fonts"));
        dirs.push(PathBuf::from("/usr/local/share/fonts"));
        if let Ok(home) = std::env::var("HOME") {
            dirs.push(PathBuf::from(home).join(".fonts"));
        }
    }

    #[cfg(target_os = "macos")]
    {
        dirs.push(PathBuf::from("/System/Library/Fonts"));
        dirs.push(PathBuf::from("/Library/Fonts"));
    }

    #[cfg(target_os = "windows")]
    {
        dirs.push(PathBuf::from(r"C:\Windows\Fonts"));
    }

    dirs
}

/// Draw `ch` into the cell whose top-left corner is (`x`, `y`).
///
/// Returns `false` when the face has no outline for `ch`, leaving the cell
/// to the bitmap glyphs. Whitespace counts as drawn.
#[allow(clippy::too_many_arguments)]
pub(crate) fn draw_char(
    pixmap: &mut Pixmap,
    face: &Face<'_>,
    ch: char,
    x: f32,
    y: f32,
    size: f32,
    bold: bool,
    paint: &Paint<'_>,
    transform: Transform,
) -> bool {
    if ch.is_whitespace() {
        return true;
    }
    let Some(id) = face.glyph_index(ch).filter(|id| id.0 != 0) else {
        return false;
    };
    let Some(path) = glyph_path(face, id, x, y, size) else {
        // A glyph without contours (e.g. a zero-width mark) has nothing to paint
        return true;
    };
    pixmap.fill_path(&path, paint, FillRule::Winding, transform, None);
    if bold {
        // Overstrike a hair to the right
        let shift = glyphs::advance(size) / 16.0;
        pixmap.fill_path(&path, paint, FillRule::Winding, transform.pre_translate(shift, 0.0), None);
    }
    true
}

fn glyph_path(face: &Face<'_>, id: GlyphId, x: f32, y: f32, size: f32) -> Option<SkPath> {
    let cell = glyphs::advance(size);
    let units = face.units_per_em() as f32;
    if units <= 0.0 {
        return None;
    }
    let sy = size / units;
    let advance = face.glyph_hor_advance(id).map(f32::from).unwrap_or(units * glyphs::ADVANCE_EM);
    let sx = if advance * sy > cell { cell / advance } else { sy };
    let left = x + (cell - advance * sx) / 2.0;

    let mut builder = GlyphPathBuilder::new(left, y + cell * BASELINE, sx, sy);
    face.outline_glyph(id, &mut builder)?;
    builder.finish()
}

/// Maps font units (y up) onto the page (y down)
struct GlyphPathBuilder {
    builder: PathBuilder,
    origin_x: f32,
    baseline: f32,
    sx: f32,
    sy: f32,
}

impl GlyphPathBuilder {
    fn new(origin_x: f32, baseline: f32, sx: f32, sy: f32) -> Self {
        Self {
            builder: PathBuilder::new(),
            origin_x,
            baseline,
            sx,
            sy,
        }
    }

    fn map(&self, x: f32, y: f32) -> (f32, f32) {
        (self.origin_x + x * self.sx, self.baseline - y * self.sy)
    }

    fn finish(self) -> Option<SkPath> {
        self.builder.finish()
    }
}

impl OutlineBuilder for GlyphPathBuilder {
    fn move_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.move_to(x, y);
    }

    fn line_to(&mut self, x: f32, y: f32) {
        let (x, y) = self.map(x, y);
        self.builder.line_to(x, y);
    }

    fn quad_to(&mut self, x1: f32, y1: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x, y) = self.map(x, y);
        self.builder.quad_to(x1, y1, x, y);
    }

    fn curve_to(&mut self, x1: f32, y1: f32, x2: f32, y2: f32, x: f32, y: f32) {
        let (x1, y1) = self.map(x1, y1);
        let (x2, y2) = self.map(x2, y2);
        let (x, y) = self.map(x, y);
        self.builder.cubic_to(x1, y1, x2, y2, x, y);
    }

    fn close(&mut self) {
        self.builder.close();
    }
}
