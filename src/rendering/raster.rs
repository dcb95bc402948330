/// tiny-skia rasterizer for laid-out surfaces

use super::glyphs;
use super::outline::{self, OutlineFont};
use super::paint::{display_list, PaintCommand};
use super::template as tpl;
use super::{Bitmap, Rect, Surface};
use crate::config::{CaptureOptions, GeneratorConfig, Rgba};
use crate::{Error, Rasterizer, Result};
use base64::Engine as _;
use log::{debug, warn};
use std::path::Path;
use tiny_skia::{
    FillRule, FilterQuality, Paint, PathBuilder, Pixmap, PixmapPaint, Stroke, Transform,
};

/// Built-in [`Rasterizer`] drawing the display list with tiny-skia
///
/// Text uses outline glyphs when a font is set, and 8×8 bitmap glyphs
/// otherwise or for characters the font lacks.
#[derive(Debug, Clone, Default)]
pub struct SkiaRasterizer {
    font: Option<OutlineFont>,
}

impl SkiaRasterizer {
    /// Bitmap glyphs only; output does not depend on installed fonts
    pub fn new() -> Self {
        Self { font: None }
    }

    pub fn with_font(font: OutlineFont) -> Self {
        Self { font: Some(font) }
    }

    /// Outline text from a font file
    pub fn with_font_file(path: impl AsRef<Path>) -> Result<Self> {
        Ok(Self::with_font(OutlineFont::from_file(path)?))
    }

    /// Outline text from a common system sans font, if one is installed
    pub fn with_system_font() -> Self {
        match OutlineFont::system_sans() {
            Some(font) => Self::with_font(font),
            None => {
                debug!("no system outline font found; using bitmap glyphs");
                Self::new()
            }
        }
    }

    /// The rasterizer `config` asks for: its font file, else a system font
    pub fn from_config(config: &GeneratorConfig) -> Result<Self> {
        match &config.font_path {
            Some(path) => Self::with_font_file(path),
            None => Ok(Self::with_system_font()),
        }
    }

    pub fn font(&self) -> Option<&OutlineFont> {
        self.font.as_ref()
    }
}

impl Rasterizer for SkiaRasterizer {
    fn capture(&self, surface: &Surface, options: &CaptureOptions) -> Result<Bitmap> {
        if !(options.scale.is_finite() && options.scale > 0.0) {
            return Err(Error::RasterizationFailure(format!(
                "invalid scale multiplier {}",
                options.scale
            )));
        }
        let width = (surface.width as f32 * options.scale).round() as u32;
        let height = (surface.height as f32 * options.scale).round() as u32;
        let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
            Error::RasterizationFailure(format!(
                "invalid raster size {}x{} at {}x",
                width, height, options.scale
            ))
        })?;
        pixmap.fill(to_sk_color(options.background));

        let transform = Transform::from_scale(options.scale, options.scale);
        let face = self.font.as_ref().and_then(|f| f.face());
        let text = TextPainter { face: face.as_ref() };
        for cmd in display_list(surface) {
            match cmd {
                PaintCommand::SolidRect { rect, rgba } => fill_rect(&mut pixmap, rect, rgba, transform),
                PaintCommand::Text {
                    x,
                    y,
                    size,
                    text: content,
                    bold,
                    rgba,
                } => text.draw(&mut pixmap, x, y, size, &content, bold, rgba, transform),
                PaintCommand::Image { rect, source: None } => {
                    draw_default_logo(&mut pixmap, rect, &text, transform)
                }
                PaintCommand::Image {
                    rect,
                    source: Some(source),
                } => match load_logo(&source) {
                    Ok(logo) => draw_contained(&mut pixmap, &logo, rect, transform),
                    Err(err) if options.allow_cross_origin => {
                        warn!("logo '{}' skipped: {}", abbreviate(&source), err);
                    }
                    Err(err) => return Err(err),
                },
            }
        }

        debug!(
            "rasterized surface epoch {} to {}x{}",
            surface.epoch, width, height
        );
        Ok(to_bitmap(&pixmap))
    }
}

fn to_sk_color(c: Rgba) -> tiny_skia::Color {
    tiny_skia::Color::from_rgba8(c.r, c.g, c.b, c.a)
}

fn paint_for(c: Rgba) -> Paint<'static> {
    let mut paint = Paint::default();
    paint.set_color(to_sk_color(c));
    paint.anti_alias = true;
    paint
}

fn fill_rect(pixmap: &mut Pixmap, rect: Rect, rgba: Rgba, transform: Transform) {
    if let Some(r) = tiny_skia::Rect::from_xywh(rect.x, rect.y, rect.width, rect.height) {
        pixmap.fill_rect(r, &paint_for(rgba), transform, None);
    }
}

/// Draws text on the glyph cell grid, outline first when a face is loaded
struct TextPainter<'f> {
    face: Option<&'f ttf_parser::Face<'f>>,
}

impl TextPainter<'_> {
    /// Glyph cells are `advance(size)` square.
    #[allow(clippy::too_many_arguments)]
    fn draw(
        &self,
        pixmap: &mut Pixmap,
        x: f32,
        y: f32,
        size: f32,
        text: &str,
        bold: bool,
        rgba: Rgba,
        transform: Transform,
    ) {
        let cell = glyphs::advance(size);
        let paint = paint_for(rgba);
        for (i, ch) in text.chars().enumerate() {
            let gx = x + i as f32 * cell;
            let drawn = self
                .face
                .is_some_and(|face| outline::draw_char(pixmap, face, ch, gx, y, size, bold, &paint, transform));
            if !drawn {
                draw_bitmap_glyph(pixmap, ch, gx, y, cell, bold, &paint, transform);
            }
        }
    }
}

/// Bold widens every run by half a bit.
#[allow(clippy::too_many_arguments)]
fn draw_bitmap_glyph(
    pixmap: &mut Pixmap,
    ch: char,
    x: f32,
    y: f32,
    cell: f32,
    bold: bool,
    paint: &Paint<'_>,
    transform: Transform,
) {
    let bit = cell / 8.0;
    let extra = if bold { bit * 0.5 } else { 0.0 };
    for (row, col, len) in glyphs::glyph_runs(ch) {
        let r = tiny_skia::Rect::from_xywh(
            x + col as f32 * bit,
            y + row as f32 * bit,
            len as f32 * bit + extra,
            bit,
        );
        if let Some(r) = r {
            pixmap.fill_rect(r, paint, transform, None);
        }
    }
}

/// The built-in logo: orange disc with a white "i" over the wordmark.
fn draw_default_logo(pixmap: &mut Pixmap, rect: Rect, text: &TextPainter<'_>, transform: Transform) {
    let (vw, vh) = tpl::LOGO_VIEWBOX;
    let s = (rect.width / vw).min(rect.height / vh);
    let ox = rect.x + (rect.width - vw * s) / 2.0;
    let oy = rect.y + (rect.height - vh * s) / 2.0;
    let t = transform.pre_translate(ox, oy).pre_scale(s, s);

    if let Some(disc) = PathBuilder::from_circle(100.0, 50.0, 42.0) {
        pixmap.fill_path(&disc, &paint_for(tpl::BRAND_ORANGE), FillRule::Winding, t, None);
    }
    if let Some(ring) = PathBuilder::from_circle(100.0, 50.0, 39.0) {
        let mut paint = paint_for(tpl::PAPER);
        paint.set_color(tiny_skia::Color::from_rgba8(255, 255, 255, 77));
        let stroke = Stroke {
            width: 0.5,
            ..Stroke::default()
        };
        pixmap.stroke_path(&ring, &paint, &stroke, t, None);
    }
    if let Some(dot) = PathBuilder::from_circle(100.0, 28.0, 8.0) {
        pixmap.fill_path(&dot, &paint_for(tpl::PAPER), FillRule::Winding, t, None);
    }
    if let Some(stem) = tiny_skia::Rect::from_xywh(92.0, 40.0, 16.0, 32.0) {
        pixmap.fill_rect(stem, &paint_for(tpl::PAPER), t, None);
    }

    let word_size = 46.0;
    let word_x = (vw - glyphs::text_width(tpl::LOGO_WORDMARK, word_size)) / 2.0;
    text.draw(pixmap, word_x, 92.0, word_size, tpl::LOGO_WORDMARK, true, tpl::LOGO_INK, t);
    let tag_size = 11.0;
    let tag_x = (vw - glyphs::text_width(tpl::LOGO_TAGLINE, tag_size)) / 2.0;
    text.draw(pixmap, tag_x, 138.0, tag_size, tpl::LOGO_TAGLINE, true, tpl::NOTE_GRAY, t);
}

/// Draw `image` centred in `rect`, scaled to fit without distortion.
fn draw_contained(pixmap: &mut Pixmap, image: &Pixmap, rect: Rect, transform: Transform) {
    let (iw, ih) = (image.width() as f32, image.height() as f32);
    let s = (rect.width / iw).min(rect.height / ih);
    let ox = rect.x + (rect.width - iw * s) / 2.0;
    let oy = rect.y + (rect.height - ih * s) / 2.0;
    let paint = PixmapPaint {
        quality: FilterQuality::Bicubic,
        ..PixmapPaint::default()
    };
    pixmap.draw_pixmap(
        0,
        0,
        image.as_ref(),
        &paint,
        transform.pre_translate(ox, oy).pre_scale(s, s),
        None,
    );
}

/// Resolve a logo reference. `data:` URIs and local paths are supported;
/// remote URLs are never fetched.
pub fn load_logo(source: &str) -> Result<Pixmap> {
    let bytes = if let Some((mime, data)) = parse_data_uri(source)? {
        if mime.contains("svg") {
            return Err(Error::RasterizationFailure(format!(
                "unsupported logo type {}",
                mime
            )));
        }
        data
    } else if source.starts_with("http://") || source.starts_with("https://") {
        return Err(Error::RasterizationFailure(
            "remote logo references are not fetched".into(),
        ));
    } else {
        std::fs::read(Path::new(source)).map_err(|e| {
            Error::RasterizationFailure(format!("cannot read logo {}: {}", source, e))
        })?
    };
    decode_to_pixmap(&bytes)
}

fn parse_data_uri(uri: &str) -> Result<Option<(String, Vec<u8>)>> {
    let Some(rest) = uri.strip_prefix("data:") else {
        return Ok(None);
    };
    let (header, payload) = rest
        .split_once(',')
        .ok_or_else(|| Error::RasterizationFailure("malformed data URI".into()))?;
    let mime = header.split(';').next().unwrap_or("").to_string();
    let data = if header.ends_with(";base64") {
        base64::engine::general_purpose::STANDARD
            .decode(payload.trim())
            .map_err(|e| Error::RasterizationFailure(format!("bad base64 in data URI: {}", e)))?
    } else {
        payload.as_bytes().to_vec()
    };
    Ok(Some((mime, data)))
}

fn decode_to_pixmap(data: &[u8]) -> Result<Pixmap> {
    let rgba = image::load_from_memory(data)?.to_rgba8();
    let (width, height) = rgba.dimensions();
    let mut pixmap = Pixmap::new(width, height).ok_or_else(|| {
        Error::RasterizationFailure(format!("invalid logo size {}x{}", width, height))
    })?;
    for (src, dst) in rgba.as_raw().chunks_exact(4).zip(pixmap.data_mut().chunks_exact_mut(4)) {
        let a = src[3];
        dst[0] = premul(src[0], a);
        dst[1] = premul(src[1], a);
        dst[2] = premul(src[2], a);
        dst[3] = a;
    }
    Ok(pixmap)
}

fn premul(channel: u8, alpha: u8) -> u8 {
    let prod = channel as u16 * alpha as u16 + 127;
    ((prod + (prod >> 8)) >> 8) as u8
}

fn to_bitmap(pixmap: &Pixmap) -> Bitmap {
    let mut rgba = Vec::with_capacity(pixmap.data().len());
    for px in pixmap.pixels() {
        let c = px.demultiply();
        rgba.extend_from_slice(&[c.red(), c.green(), c.blue(), c.alpha()]);
    }
    Bitmap {
        width: pixmap.width(),
        height: pixmap.height(),
        rgba,
    }
}

fn abbreviate(source: &str) -> String {
    if source.chars().count() > 48 {
        format!("{}...", source.chars().take(48).collect::<String>())
    } else {
        source.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentModel;
    use crate::rendering::{layout_document, RenderMode};
    use crate::PageGeometry;

    fn small_surface(logo: Option<String>) -> Surface {
        let mut model = DocumentModel::default();
        model.logo = logo;
        layout_document(
            &model,
            RenderMode::FitToContainer { scale: 0.25 },
            &PageGeometry::A4,
        )
    }

    fn png_data_uri() -> String {
        let png = Bitmap::filled(4, 4, Rgba::rgb(0, 0, 255)).encode_png().unwrap();
        format!(
            "data:image/png;base64,{}",
            base64::engine::general_purpose::STANDARD.encode(png)
        )
    }

    #[test]
    fn capture_scales_the_surface() {
        let s = small_surface(None);
        let opts = CaptureOptions {
            scale: 2.0,
            ..CaptureOptions::default()
        };
        let bmp = SkiaRasterizer::new().capture(&s, &opts).unwrap();
        assert_eq!(bmp.width, s.width * 2);
        assert_eq!(bmp.height, s.height * 2);
        assert!(bmp.validate().is_ok());
        assert!(!bmp.is_blank());
        // corner is background, footer band is orange-ish
        assert_eq!(bmp.pixel(0, 0), Some([255, 255, 255, 255]));
        let [r, g, b, a] = bmp.pixel(1, bmp.height - 2).unwrap();
        assert_eq!((r, g, b, a), (0xf9, 0x73, 0x16, 255));
    }

    #[test]
    fn background_is_opaque_everywhere() {
        let s = small_surface(None);
        let opts = CaptureOptions {
            scale: 2.0,
            background: Rgba::rgb(10, 20, 30),
            ..CaptureOptions::default()
        };
        let bmp = SkiaRasterizer::new().capture(&s, &opts).unwrap();
        assert!(bmp.rgba.chunks_exact(4).all(|p| p[3] == 255));
        assert_eq!(bmp.pixel(0, 0), Some([10, 20, 30, 255]));
    }

    #[test]
    fn data_uri_logo_is_drawn() {
        let s = small_surface(Some(png_data_uri()));
        let bmp = SkiaRasterizer::new()
            .capture(&s, &CaptureOptions { scale: 2.0, ..Default::default() })
            .unwrap();
        let blue = bmp
            .rgba
            .chunks_exact(4)
            .any(|p| p[0] < 16 && p[1] < 16 && p[2] > 240);
        assert!(blue, "expected the blue logo to be painted");
    }

    #[test]
    fn unresolvable_logo_is_tolerated_only_when_allowed() {
        let s = small_surface(Some("https://example.invalid/logo.png".into()));
        let tolerant = CaptureOptions { scale: 2.0, ..Default::default() };
        assert!(SkiaRasterizer::new().capture(&s, &tolerant).is_ok());

        let strict = CaptureOptions {
            allow_cross_origin: false,
            ..tolerant
        };
        let err = SkiaRasterizer::new().capture(&s, &strict).unwrap_err();
        assert!(matches!(err, Error::RasterizationFailure(_)));
    }

    #[test]
    fn data_uri_parsing() {
        let (mime, data) = parse_data_uri("data:text/plain,abc").unwrap().unwrap();
        assert_eq!(mime, "text/plain");
        assert_eq!(data, b"abc");
        assert!(parse_data_uri("logo.png").unwrap().is_none());
        assert!(parse_data_uri("data:image/png;base64").is_err());
        assert!(load_logo("data:image/svg+xml;base64,PHN2Zz4=").is_err());
    }

    #[test]
    fn missing_font_file_fails_and_default_has_no_font() {
        assert!(SkiaRasterizer::new().font().is_none());
        assert!(matches!(
            SkiaRasterizer::with_font_file("/nonexistent/declara/font.ttf"),
            Err(Error::ConfigError(_))
        ));
        let cfg = GeneratorConfig {
            font_path: Some("/nonexistent/declara/font.ttf".into()),
            ..Default::default()
        };
        assert!(SkiaRasterizer::from_config(&cfg).is_err());
    }

    #[test]
    fn system_font_capture_matches_bitmap_geometry() {
        // Outline or bitmap, the page keeps its size and its ink
        let s = small_surface(None);
        let opts = CaptureOptions { scale: 2.0, ..Default::default() };
        let outline = SkiaRasterizer::with_system_font().capture(&s, &opts).unwrap();
        let bitmap = SkiaRasterizer::new().capture(&s, &opts).unwrap();
        assert_eq!((outline.width, outline.height), (bitmap.width, bitmap.height));
        assert!(!outline.is_blank());
        assert_eq!(outline.pixel(0, 0), Some([255, 255, 255, 255]));
    }

    #[test]
    fn premultiply_rounds() {
        assert_eq!(premul(255, 255), 255);
        assert_eq!(premul(255, 0), 0);
        assert_eq!(premul(200, 128), 100);
    }
}
