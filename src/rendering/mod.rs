//! Rendering: layout surface, display list and rasterization.
//!
//! A [`Surface`] is the laid-out page for one [`RenderMode`]. It is plain data;
//! the preview keeps the current one and hands it to a [`crate::Rasterizer`]
//! when a capture is requested.

pub mod glyphs;
pub mod layout;
pub mod outline;
pub mod paint;
pub mod raster;
pub mod template;

use crate::config::Rgba;
use crate::{Error, Result};

pub use layout::{layout_document, LayoutMetrics};

/// How the page is projected onto the surface
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum RenderMode {
    /// Pinned to the physical page in reference pixels; the only capturable mode
    FixedPhysical,
    /// Page scaled uniformly by the fit scale for on-screen browsing
    FitToContainer { scale: f64 },
}

impl RenderMode {
    pub fn is_fixed(&self) -> bool {
        matches!(self, RenderMode::FixedPhysical)
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Rect {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

impl Rect {
    pub fn new(x: f32, y: f32, width: f32, height: f32) -> Self {
        Self { x, y, width, height }
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }
}

/// Role of a block on the page
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ElementType {
    Logo,
    Address,
    Title,
    Body,
    Status,
    Note,
    DateLine,
    SignatureRule,
    Signatory,
    Footer,
}

/// A run of uniformly styled text on one line
#[derive(Debug, Clone, PartialEq)]
pub struct Span {
    /// Offset from the line's left edge
    pub x: f32,
    pub text: String,
    pub bold: bool,
    pub color: Rgba,
}

#[derive(Debug, Clone, PartialEq)]
pub struct TextLine {
    pub x: f32,
    /// Top of the line box
    pub y: f32,
    pub width: f32,
    pub spans: Vec<Span>,
}

impl TextLine {
    pub fn text(&self) -> String {
        self.spans.iter().map(|s| s.text.as_str()).collect()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum NodeKind {
    Fill {
        color: Rgba,
    },
    Text {
        size: f32,
        line_height: f32,
        underline: bool,
        lines: Vec<TextLine>,
    },
    /// Logo box; `None` draws the built-in logo
    Logo {
        source: Option<String>,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub struct LayoutNode {
    pub rect: Rect,
    pub elem_type: ElementType,
    pub kind: NodeKind,
}

/// A laid-out page
#[derive(Debug, Clone, PartialEq)]
pub struct Surface {
    pub mode: RenderMode,
    /// Size in layout pixels
    pub width: u32,
    pub height: u32,
    /// Bumped by the preview on every re-render
    pub epoch: u64,
    pub nodes: Vec<LayoutNode>,
}

impl Surface {
    /// Text of every block in page order, one block per entry, with
    /// whitespace collapsed so line wrapping does not affect the result.
    pub fn text_blocks(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter_map(|n| match &n.kind {
                NodeKind::Text { lines, .. } => {
                    let joined = lines.iter().map(|l| l.text()).collect::<Vec<_>>().join(" ");
                    Some(joined.split_whitespace().collect::<Vec<_>>().join(" "))
                }
                _ => None,
            })
            .collect()
    }

    /// All text on the page, one block per line
    pub fn text_content(&self) -> String {
        self.text_blocks().join("\n")
    }

    pub fn nodes_of(&self, elem_type: ElementType) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.iter().filter(move |n| n.elem_type == elem_type)
    }
}

/// A captured page image, straight (non-premultiplied) RGBA8, row-major
#[derive(Debug, Clone, PartialEq)]
pub struct Bitmap {
    pub width: u32,
    pub height: u32,
    pub rgba: Vec<u8>,
}

impl Bitmap {
    /// Uniformly filled bitmap
    pub fn filled(width: u32, height: u32, color: Rgba) -> Self {
        let px = [color.r, color.g, color.b, color.a];
        let rgba = px.repeat(width as usize * height as usize);
        Self { width, height, rgba }
    }

    pub fn pixel(&self, x: u32, y: u32) -> Option<[u8; 4]> {
        if x >= self.width || y >= self.height {
            return None;
        }
        let i = (y as usize * self.width as usize + x as usize) * 4;
        self.rgba.get(i..i + 4).map(|p| [p[0], p[1], p[2], p[3]])
    }

    /// Reject empty bitmaps and buffers that do not match the dimensions
    pub fn validate(&self) -> Result<()> {
        if self.width == 0 || self.height == 0 {
            return Err(Error::RasterizationFailure(format!(
                "empty bitmap {}x{}",
                self.width, self.height
            )));
        }
        let expected = self.width as usize * self.height as usize * 4;
        if self.rgba.len() != expected {
            return Err(Error::RasterizationFailure(format!(
                "corrupt bitmap: {} bytes for {}x{} (expected {})",
                self.rgba.len(),
                self.width,
                self.height,
                expected
            )));
        }
        Ok(())
    }

    /// True when every pixel has the same value
    pub fn is_blank(&self) -> bool {
        let mut px = self.rgba.chunks_exact(4);
        match px.next() {
            Some(first) => px.all(|p| p == first),
            None => true,
        }
    }

    pub fn encode_png(&self) -> Result<Vec<u8>> {
        use image::ImageEncoder;

        self.validate()?;
        let mut out = Vec::new();
        image::codecs::png::PngEncoder::new(&mut out).write_image(
            &self.rgba,
            self.width,
            self.height,
            image::ExtendedColorType::Rgba8,
        )?;
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bitmap_validation() {
        assert!(Bitmap::filled(4, 2, Rgba::WHITE).validate().is_ok());
        assert!(Bitmap::filled(0, 2, Rgba::WHITE).validate().is_err());
        let mut b = Bitmap::filled(4, 2, Rgba::WHITE);
        b.rgba.pop();
        assert!(matches!(b.validate(), Err(Error::RasterizationFailure(_))));
    }

    #[test]
    fn blank_detection() {
        let mut b = Bitmap::filled(3, 3, Rgba::WHITE);
        assert!(b.is_blank());
        b.rgba[4 * 4] = 0;
        assert!(!b.is_blank());
        assert_eq!(b.pixel(1, 1), Some([0, 255, 255, 255]));
        assert_eq!(b.pixel(3, 0), None);
    }

    #[test]
    fn png_has_signature() {
        let png = Bitmap::filled(8, 8, Rgba::BLACK).encode_png().unwrap();
        assert_eq!(&png[0..8], b"\x89PNG\r\n\x1a\n");
    }
}
