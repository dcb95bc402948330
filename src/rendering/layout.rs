/// Page layout for the declaration.
///
/// A `RenderMode` resolves to a `LayoutMetrics`; everything below consumes the
/// metrics only, so both modes go through the same block routine and produce
/// the same text in the same order.

use super::glyphs;
use super::template as tpl;
use super::{ElementType, LayoutNode, NodeKind, Rect, RenderMode, Span, Surface, TextLine};
use crate::config::Rgba;
use crate::model::{DocumentModel, Field};
use crate::PageGeometry;

/// Sizes and spacing for one render mode, in surface pixels
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LayoutMetrics {
    pub width: f32,
    pub height: f32,
    /// Multiplier applied to every length below that is not page-relative
    pub unit: f32,
    pub pad_x: f32,
    pub pad_top: f32,
    pub logo_height: f32,
    pub address_size: f32,
    pub title_size: f32,
    pub body_size: f32,
    pub date_size: f32,
    pub footer_size: f32,
    pub footer_height: f32,
    /// Gap between the signature block and the footer band when the block is
    /// pinned to the page bottom; `None` lets it follow the body
    pub signature_anchor: Option<f32>,
}

impl LayoutMetrics {
    pub fn for_mode(mode: RenderMode, page: &PageGeometry) -> Self {
        match mode {
            RenderMode::FixedPhysical => {
                let (w, h) = page.size_px();
                let mm = page.px_per_mm() as f32;
                Self {
                    width: w as f32,
                    height: h as f32,
                    unit: 1.0,
                    pad_x: 20.0 * mm,
                    pad_top: 15.0 * mm,
                    logo_height: 96.0,
                    address_size: 10.0,
                    title_size: 18.0,
                    body_size: 14.0,
                    date_size: 16.0,
                    footer_size: 14.0,
                    footer_height: 80.0,
                    signature_anchor: Some(20.0 * mm),
                }
            }
            RenderMode::FitToContainer { scale } => {
                let k = scale as f32;
                Self {
                    width: (page.width_px() * scale).round().max(1.0) as f32,
                    height: (page.height_px() * scale).round().max(1.0) as f32,
                    unit: k,
                    pad_x: 48.0 * k,
                    pad_top: 48.0 * k,
                    logo_height: 72.0 * k,
                    address_size: 10.0 * k,
                    title_size: 18.0 * k,
                    body_size: 16.0 * k,
                    date_size: 16.0 * k,
                    footer_size: 14.0 * k,
                    footer_height: 56.0 * k,
                    signature_anchor: None,
                }
            }
        }
    }

    fn content_width(&self) -> f32 {
        (self.width - 2.0 * self.pad_x).max(1.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Align {
    Left,
    Center,
}

#[derive(Debug, Clone)]
struct Piece {
    text: String,
    bold: bool,
    color: Rgba,
}

fn plain(text: impl Into<String>) -> Piece {
    Piece {
        text: text.into(),
        bold: false,
        color: tpl::TEXT,
    }
}

fn bold(text: impl Into<String>) -> Piece {
    Piece {
        bold: true,
        ..plain(text)
    }
}

fn tinted(piece: Piece, color: Rgba) -> Piece {
    Piece { color, ..piece }
}

struct Block<'a> {
    elem_type: ElementType,
    pieces: &'a [Piece],
    size: f32,
    leading: f32,
    align: Align,
    indent: f32,
    underline: bool,
}

impl<'a> Block<'a> {
    fn new(elem_type: ElementType, pieces: &'a [Piece], size: f32) -> Self {
        Self {
            elem_type,
            pieces,
            size,
            leading: 1.5,
            align: Align::Left,
            indent: 0.0,
            underline: false,
        }
    }

    fn centered(mut self) -> Self {
        self.align = Align::Center;
        self
    }

    fn leading(mut self, leading: f32) -> Self {
        self.leading = leading;
        self
    }
}

struct Cursor {
    m: LayoutMetrics,
    y: f32,
    nodes: Vec<LayoutNode>,
}

impl Cursor {
    fn gap(&mut self, px: f32) {
        self.y += px * self.m.unit;
    }

    fn block(&mut self, b: Block<'_>) {
        let left = self.m.pad_x;
        let max_width = self.m.content_width();
        let line_height = b.size * b.leading;
        let lines = wrap(b.pieces, b.size, max_width, b.indent * self.m.unit)
            .into_iter()
            .enumerate()
            .map(|(i, (width, spans))| {
                let indent = if i == 0 { b.indent * self.m.unit } else { 0.0 };
                let x = match b.align {
                    Align::Left => left + indent,
                    Align::Center => left + (max_width - width) / 2.0,
                };
                TextLine {
                    x,
                    y: self.y + i as f32 * line_height,
                    width,
                    spans,
                }
            })
            .collect::<Vec<_>>();
        let height = lines.len() as f32 * line_height;
        self.nodes.push(LayoutNode {
            rect: Rect::new(left, self.y, max_width, height),
            elem_type: b.elem_type,
            kind: NodeKind::Text {
                size: b.size,
                line_height,
                underline: b.underline,
                lines,
            },
        });
        self.y += height;
    }

    fn fill(&mut self, elem_type: ElementType, rect: Rect, color: Rgba) {
        self.nodes.push(LayoutNode {
            rect,
            elem_type,
            kind: NodeKind::Fill { color },
        });
    }
}

/// Split pieces into words. Whitespace separates words; pieces that touch
/// without whitespace (a bold value followed by a comma) stay in one word.
fn words(pieces: &[Piece]) -> Vec<Vec<Piece>> {
    let mut words: Vec<Vec<Piece>> = Vec::new();
    let mut open = false;
    for p in pieces {
        let starts_ws = p.text.starts_with(char::is_whitespace);
        let mut any = false;
        for (i, part) in p.text.split_whitespace().enumerate() {
            let frag = Piece {
                text: part.to_string(),
                ..p.clone()
            };
            match words.last_mut() {
                Some(last) if i == 0 && open && !starts_ws => last.push(frag),
                _ => words.push(vec![frag]),
            }
            any = true;
        }
        if any {
            open = !p.text.ends_with(char::is_whitespace);
        } else if !p.text.is_empty() {
            open = false;
        }
    }
    words
}

/// Greedy line breaking. Returns each line's width and its spans.
fn wrap(pieces: &[Piece], size: f32, max_width: f32, first_indent: f32) -> Vec<(f32, Vec<Span>)> {
    let space = glyphs::advance(size);
    let mut lines: Vec<Vec<Piece>> = Vec::new();
    let mut current: Vec<Piece> = Vec::new();
    let mut current_width = 0.0f32;

    for word in words(pieces) {
        let word_width: f32 = word.iter().map(|p| glyphs::text_width(&p.text, size)).sum();
        let avail = if lines.is_empty() {
            max_width - first_indent
        } else {
            max_width
        };
        if !current.is_empty() && current_width + space + word_width > avail {
            lines.push(std::mem::take(&mut current));
            current_width = 0.0;
        }
        if let Some(prev) = current.last() {
            let sep = Piece {
                text: " ".to_string(),
                ..prev.clone()
            };
            current.push(sep);
            current_width += space;
        }
        current_width += word_width;
        current.extend(word);
    }
    if !current.is_empty() {
        lines.push(current);
    }

    lines
        .into_iter()
        .map(|pieces| {
            let mut spans: Vec<Span> = Vec::new();
            let mut x = 0.0f32;
            for p in pieces {
                let w = glyphs::text_width(&p.text, size);
                match spans.last_mut() {
                    Some(s) if s.bold == p.bold && s.color == p.color => s.text.push_str(&p.text),
                    _ => spans.push(Span {
                        x,
                        text: p.text,
                        bold: p.bold,
                        color: p.color,
                    }),
                }
                x += w;
            }
            (x, spans)
        })
        .collect()
}

fn shift(nodes: &mut [LayoutNode], dy: f32) {
    for n in nodes {
        n.rect.y += dy;
        if let NodeKind::Text { lines, .. } = &mut n.kind {
            for l in lines {
                l.y += dy;
            }
        }
    }
}

fn signature(m: LayoutMetrics, model: &DocumentModel) -> Vec<LayoutNode> {
    let mut c = Cursor {
        m,
        y: 0.0,
        nodes: Vec::new(),
    };
    let date = [plain(format!("{}.", model.display(Field::CityAndDate)))];
    c.block(Block::new(ElementType::DateLine, &date, m.date_size).centered());
    c.gap(24.0);

    let rule_width = (256.0 * m.unit).min(m.content_width());
    let rule = Rect::new((m.width - rule_width) / 2.0, c.y, rule_width, m.unit.max(0.5));
    c.fill(ElementType::SignatureRule, rule, tpl::TEXT);
    c.y += rule.height;
    c.gap(8.0);

    for (i, line) in tpl::SIGNATORY.iter().enumerate() {
        let piece = if i == 0 { bold(*line) } else { plain(*line) };
        c.block(Block::new(ElementType::Signatory, &[piece], m.body_size).centered().leading(1.4));
    }
    c.nodes
}

/// Lay out `model` for `mode` on `page`. The returned surface has epoch 0;
/// the preview stamps its own epoch.
pub fn layout_document(model: &DocumentModel, mode: RenderMode, page: &PageGeometry) -> Surface {
    let m = LayoutMetrics::for_mode(mode, page);
    let mut c = Cursor {
        m,
        y: m.pad_top,
        nodes: Vec::new(),
    };

    // Header
    let logo_w = m.logo_height * tpl::LOGO_VIEWBOX.0 / tpl::LOGO_VIEWBOX.1;
    c.nodes.push(LayoutNode {
        rect: Rect::new((m.width - logo_w) / 2.0, c.y, logo_w, m.logo_height),
        elem_type: ElementType::Logo,
        kind: NodeKind::Logo {
            source: model.logo.clone(),
        },
    });
    c.y += m.logo_height;
    c.gap(8.0);
    for line in tpl::ADDRESS_LINES {
        let piece = [tinted(plain(line), tpl::ADDRESS_GRAY)];
        c.block(Block::new(ElementType::Address, &piece, m.address_size).centered().leading(1.3));
    }

    // Body
    c.gap(40.0);
    let title = [bold(tpl::TITLE)];
    let mut title_block = Block::new(ElementType::Title, &title, m.title_size).centered();
    title_block.underline = true;
    c.block(title_block);
    c.gap(24.0);

    let v = |f: Field| bold(model.display(f));
    let body = [
        plain("Declaramos para devidos fins, que o(a) aluno(a) "),
        v(Field::StudentName),
        plain(", nascido(a) em "),
        v(Field::Dob),
        plain(", filho(a) de "),
        v(Field::Guardian1),
        plain(" e "),
        v(Field::Guardian2),
        plain(", esteve devidamente matriculado(a) na "),
        v(Field::ClassName),
        plain(" no ano letivo de "),
        v(Field::SchoolYear),
        plain("."),
    ];
    let mut body_block = Block::new(ElementType::Body, &body, m.body_size).leading(1.625);
    body_block.indent = 32.0;
    c.block(body_block);
    c.gap(32.0);

    let status = [bold(tpl::STATUS_LABEL), plain(" "), v(Field::Status)];
    c.block(Block::new(ElementType::Status, &status, m.body_size));
    c.gap(24.0);

    let note = [
        bold(tpl::NOTE_LABEL),
        tinted(plain(format!(" {}", tpl::NOTE_TEXT)), tpl::NOTE_GRAY),
    ];
    c.block(Block::new(ElementType::Note, &note, m.body_size));

    // Signature
    let mut sig = signature(m, model);
    let sig_height = sig.iter().map(|n| n.rect.bottom()).fold(0.0f32, f32::max);
    let footer_top = m.height - m.footer_height;
    let sig_top = match m.signature_anchor {
        Some(gap) => (footer_top - gap - sig_height).max(c.y + 32.0 * m.unit),
        None => c.y + 32.0 * m.unit,
    };
    shift(&mut sig, sig_top);
    c.nodes.extend(sig);

    // Footer band
    c.fill(
        ElementType::Footer,
        Rect::new(0.0, footer_top, m.width, m.footer_height),
        tpl::BRAND_ORANGE,
    );
    let mut footer = vec![tinted(bold(tpl::FOOTER_MARK), tpl::PAPER)];
    for (i, item) in tpl::FOOTER_ITEMS.iter().enumerate() {
        let text = if i == 0 {
            format!(" {}", item)
        } else {
            format!(" | {}", item)
        };
        footer.push(tinted(plain(text), tpl::PAPER));
    }
    let line_height = m.footer_size * 1.5;
    c.y = footer_top + (m.footer_height - line_height).max(0.0) / 2.0;
    c.block(Block::new(ElementType::Footer, &footer, m.footer_size).centered());

    Surface {
        mode,
        width: m.width.round() as u32,
        height: m.height.round() as u32,
        epoch: 0,
        nodes: c.nodes,
    }
}
