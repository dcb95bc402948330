/// Monospaced 8×8 bitmap glyphs used for page text.
///
/// Every character advances `ADVANCE_EM` of the font size and is drawn as an
/// 8×8 grid scaled to that advance. Characters outside Basic Latin and
/// Latin-1 fall back to `?`.

use font8x8::{UnicodeFonts, BASIC_FONTS, LATIN_FONTS};

/// Horizontal advance (and glyph cell size) as a fraction of the font size
pub const ADVANCE_EM: f32 = 0.6;

pub fn advance(size: f32) -> f32 {
    size * ADVANCE_EM
}

pub fn text_width(text: &str, size: f32) -> f32 {
    text.chars().count() as f32 * advance(size)
}

/// Row bitmaps for `ch`; bit 0 is the leftmost pixel
pub fn glyph_bits(ch: char) -> [u8; 8] {
    BASIC_FONTS
        .get(ch)
        .or_else(|| LATIN_FONTS.get(ch))
        .or_else(|| BASIC_FONTS.get('?'))
        .unwrap_or([0; 8])
}

/// Horizontal runs of set bits as `(row, first_column, length)`
pub fn glyph_runs(ch: char) -> Vec<(u8, u8, u8)> {
    let mut runs = Vec::new();
    for (row, bits) in glyph_bits(ch).iter().enumerate() {
        let mut col = 0u8;
        while col < 8 {
            if bits & (1 << col) != 0 {
                let start = col;
                while col < 8 && bits & (1 << col) != 0 {
                    col += 1;
                }
                runs.push((row as u8, start, col - start));
            } else {
                col += 1;
            }
        }
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn width_counts_chars_not_bytes() {
        assert_eq!(text_width("ação", 10.0), 4.0 * 6.0);
    }

    #[test]
    fn accented_and_ordinal_glyphs_exist() {
        for ch in ['ã', 'ç', 'Ê', 'º', 'é', 'Í'] {
            assert_ne!(glyph_bits(ch), [0; 8], "missing glyph for {}", ch);
        }
    }

    #[test]
    fn space_has_no_runs_and_letters_do() {
        assert!(glyph_runs(' ').is_empty());
        assert!(!glyph_runs('A').is_empty());
        assert_eq!(glyph_runs('\u{2603}'), glyph_runs('?'));
    }
}
