/// Flat paint command list derived from a surface

use super::{NodeKind, Rect, Surface};
use crate::config::Rgba;

#[derive(Debug, Clone, PartialEq)]
pub enum PaintCommand {
    SolidRect {
        rect: Rect,
        rgba: Rgba,
    },
    Text {
        x: f32,
        /// Top of the glyph cells
        y: f32,
        size: f32,
        text: String,
        bold: bool,
        rgba: Rgba,
    },
    Image {
        rect: Rect,
        source: Option<String>,
    },
}

/// Flatten `surface` into paint order. Glyph cells are vertically centred in
/// their line box; underlines sit just below the cells.
pub fn display_list(surface: &Surface) -> Vec<PaintCommand> {
    let mut out = Vec::new();
    for node in &surface.nodes {
        match &node.kind {
            NodeKind::Fill { color } => out.push(PaintCommand::SolidRect {
                rect: node.rect,
                rgba: *color,
            }),
            NodeKind::Logo { source } => out.push(PaintCommand::Image {
                rect: node.rect,
                source: source.clone(),
            }),
            NodeKind::Text {
                size,
                line_height,
                underline,
                lines,
            } => {
                let cell = super::glyphs::advance(*size);
                for line in lines {
                    let top = line.y + (line_height - cell) / 2.0;
                    for span in &line.spans {
                        out.push(PaintCommand::Text {
                            x: line.x + span.x,
                            y: top,
                            size: *size,
                            text: span.text.clone(),
                            bold: span.bold,
                            rgba: span.color,
                        });
                    }
                    if *underline {
                        let color = line.spans.first().map(|s| s.color).unwrap_or(Rgba::BLACK);
                        out.push(PaintCommand::SolidRect {
                            rect: Rect::new(line.x, top + cell + cell / 8.0, line.width, (size / 14.0).max(0.5)),
                            rgba: color,
                        });
                    }
                }
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::DocumentModel;
    use crate::rendering::{layout_document, RenderMode};
    use crate::PageGeometry;

    #[test]
    fn display_list_starts_with_logo_and_underlines_title() {
        let model = DocumentModel::default();
        let s = layout_document(&model, RenderMode::FixedPhysical, &PageGeometry::A4);
        let cmds = display_list(&s);
        assert!(matches!(cmds[0], PaintCommand::Image { source: None, .. }));

        let title_at = cmds
            .iter()
            .position(|c| matches!(c, PaintCommand::Text { text, .. } if text.starts_with("DECLARA")))
            .unwrap();
        assert!(matches!(cmds[title_at + 1], PaintCommand::SolidRect { .. }));
    }

    #[test]
    fn footer_band_is_painted_before_its_text() {
        let s = layout_document(&DocumentModel::default(), RenderMode::FixedPhysical, &PageGeometry::A4);
        let cmds = display_list(&s);
        let band = cmds
            .iter()
            .position(|c| matches!(c, PaintCommand::SolidRect { rgba, .. } if *rgba == crate::rendering::template::BRAND_ORANGE))
            .unwrap();
        let text = cmds
            .iter()
            .position(|c| matches!(c, PaintCommand::Text { text, .. } if text.contains("iconecolegioecurso")))
            .unwrap();
        assert!(band < text);
    }
}
