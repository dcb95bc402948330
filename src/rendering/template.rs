//! Fixed letterhead content of the declaration.

use crate::config::Rgba;

pub const ADDRESS_LINES: [&str; 5] = [
    "Estrada do Tindiba, 1782 - Taquara - Rio de Janeiro/RJ - CEP: 22.720-362 Tel: (21) 3900-8299",
    "CNPJ: 34.614.483/0001-36 - Inscrição Municipal: 1195944-0",
    "Parecer Favorável p/ Processo no E-03/038/571/2019",
    "Parecer No: 137/2023/SEEDUC/COOIEMVI - D.O 11/07/2023",
    "INEP: 33189935",
];

pub const TITLE: &str = "DECLARAÇÃO DE TRANSFERÊNCIA";

pub const STATUS_LABEL: &str = "Situação:";

pub const NOTE_LABEL: &str = "Obs:";
pub const NOTE_TEXT: &str = "Histórico escolar prazo previsto 30 a 45 dias úteis.";

pub const SIGNATORY: [&str; 4] = [
    "Andréa G. da S. Medeiros",
    "Secretária Escolar",
    "Colégio e Curso Ícone",
    "COOIEMVI/CAD.06001660/24",
];

pub const FOOTER_MARK: &str = "i";
pub const FOOTER_ITEMS: [&str; 3] = [
    "iconecolegioecurso.com.br",
    "(21) 3900-8299",
    "@iconecolegioecursooficial",
];

pub const TEXT: Rgba = Rgba::BLACK;
pub const ADDRESS_GRAY: Rgba = Rgba::rgb(0x9c, 0xa3, 0xaf);
pub const NOTE_GRAY: Rgba = Rgba::rgb(0x4b, 0x55, 0x63);
pub const BRAND_ORANGE: Rgba = Rgba::rgb(0xf9, 0x73, 0x16);
pub const LOGO_INK: Rgba = Rgba::rgb(0x37, 0x41, 0x51);
pub const PAPER: Rgba = Rgba::WHITE;

/// Built-in logo artboard (orange disc, white "i", wordmark)
pub const LOGO_VIEWBOX: (f32, f32) = (200.0, 160.0);
pub const LOGO_WORDMARK: &str = "ícone";
pub const LOGO_TAGLINE: &str = "COLÉGIO E CURSO";
