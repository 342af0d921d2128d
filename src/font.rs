//! Glyph tables and the text to raster conversion.
//!
//! Each glyph is six column bytes, the last one blank. Bit 0 of a column byte
//! is the top row of the matrix.

use crate::config::{GLYPH_COLUMNS, MATRIX_COLUMNS, MAX_PATTERN_LEN};
use heapless::Vec;

/// First character with a glyph
const FIRST_GLYPH: u8 = b' ';
const GLYPH_COUNT: usize = 96;

type Glyph = [u8; GLYPH_COLUMNS];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum Font {
    /// Seven rows, lowercase included
    #[default]
    Wide,
    /// Five rows, lowercase shown as uppercase
    Narrow,
}

impl Font {
    pub fn toggled(self) -> Self {
        match self {
            Font::Wide => Font::Narrow,
            Font::Narrow => Font::Wide,
        }
    }

    /// Indicator byte reported to the reader
    pub fn code(self) -> u8 {
        match self {
            Font::Wide => 0x57,
            Font::Narrow => 0x55,
        }
    }

    fn table(self) -> &'static [Glyph; GLYPH_COUNT] {
        match self {
            Font::Wide => &WIDE,
            Font::Narrow => &NARROW,
        }
    }

    /// Columns of one character, blank for anything without a glyph
    pub fn glyph(self, c: u8) -> &'static Glyph {
        let table = self.table();
        c.checked_sub(FIRST_GLYPH)
            .and_then(|i| table.get(i as usize))
            .unwrap_or(&table[0])
    }
}

/// Renders `text` into `pattern`, six bytes per character.
///
/// Returns the number of characters rendered, which is short of the text
/// only when the pattern is full.
pub fn render(text: &[u8], font: Font, pattern: &mut Vec<u8, MAX_PATTERN_LEN>) -> usize {
    pattern.clear();
    let mut rendered = 0;
    for &c in text {
        if pattern.extend_from_slice(font.glyph(c)).is_err() {
            warn!("Raster full after {=usize} characters", rendered);
            break;
        }
        rendered += 1;
    }
    rendered
}

/// Frames of the bouncing dot shown before any text, one column byte per
/// matrix column
pub const SPINNER: [[u8; MATRIX_COLUMNS]; 12] = [
    [0x00, 0x00, 0x01, 0x00, 0x00],
    [0x00, 0x00, 0x02, 0x00, 0x00],
    [0x00, 0x00, 0x04, 0x00, 0x00],
    [0x00, 0x00, 0x08, 0x00, 0x00],
    [0x00, 0x00, 0x10, 0x00, 0x00],
    [0x00, 0x00, 0x20, 0x00, 0x00],
    [0x00, 0x00, 0x40, 0x00, 0x00],
    [0x00, 0x00, 0x20, 0x00, 0x00],
    [0x00, 0x00, 0x10, 0x00, 0x00],
    [0x00, 0x00, 0x08, 0x00, 0x00],
    [0x00, 0x00, 0x04, 0x00, 0x00],
    [0x00, 0x00, 0x02, 0x00, 0x00],
];

#[rustfmt::skip]
static WIDE: [Glyph; GLYPH_COUNT] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x5F, 0x00, 0x00, 0x00], // '!'
    [0x00, 0x07, 0x00, 0x07, 0x00, 0x00], // '"'
    [0x14, 0x7F, 0x14, 0x7F, 0x14, 0x00], // '#'
    [0x24, 0x2A, 0x7F, 0x2A, 0x12, 0x00], // '$'
    [0x23, 0x13, 0x08, 0x64, 0x62, 0x00], // '%'
    [0x36, 0x49, 0x55, 0x22, 0x50, 0x00], // '&'
    [0x00, 0x05, 0x03, 0x00, 0x00, 0x00], // "'"
    [0x00, 0x1C, 0x22, 0x41, 0x00, 0x00], // '('
    [0x00, 0x41, 0x22, 0x1C, 0x00, 0x00], // ')'
    [0x08, 0x2A, 0x1C, 0x2A, 0x08, 0x00], // '*'
    [0x08, 0x08, 0x3E, 0x08, 0x08, 0x00], // '+'
    [0x00, 0x50, 0x30, 0x00, 0x00, 0x00], // ','
    [0x08, 0x08, 0x08, 0x08, 0x08, 0x00], // '-'
    [0x00, 0x60, 0x60, 0x00, 0x00, 0x00], // '.'
    [0x20, 0x10, 0x08, 0x04, 0x02, 0x00], // '/'
    [0x3E, 0x51, 0x49, 0x45, 0x3E, 0x00], // '0'
    [0x00, 0x42, 0x7F, 0x40, 0x00, 0x00], // '1'
    [0x42, 0x61, 0x51, 0x49, 0x46, 0x00], // '2'
    [0x21, 0x41, 0x45, 0x4B, 0x31, 0x00], // '3'
    [0x18, 0x14, 0x12, 0x7F, 0x10, 0x00], // '4'
    [0x27, 0x45, 0x45, 0x45, 0x39, 0x00], // '5'
    [0x3C, 0x4A, 0x49, 0x49, 0x30, 0x00], // '6'
    [0x01, 0x71, 0x09, 0x05, 0x03, 0x00], // '7'
    [0x36, 0x49, 0x49, 0x49, 0x36, 0x00], // '8'
    [0x06, 0x49, 0x49, 0x29, 0x1E, 0x00], // '9'
    [0x00, 0x36, 0x36, 0x00, 0x00, 0x00], // ':'
    [0x00, 0x56, 0x36, 0x00, 0x00, 0x00], // ';'
    [0x00, 0x08, 0x14, 0x22, 0x41, 0x00], // '<'
    [0x14, 0x14, 0x14, 0x14, 0x14, 0x00], // '='
    [0x41, 0x22, 0x14, 0x08, 0x00, 0x00], // '>'
    [0x02, 0x01, 0x51, 0x09, 0x06, 0x00], // '?'
    [0x32, 0x49, 0x79, 0x41, 0x3E, 0x00], // '@'
    [0x7E, 0x11, 0x11, 0x11, 0x7E, 0x00], // 'A'
    [0x7F, 0x49, 0x49, 0x49, 0x36, 0x00], // 'B'
    [0x3E, 0x41, 0x41, 0x41, 0x22, 0x00], // 'C'
    [0x7F, 0x41, 0x41, 0x22, 0x1C, 0x00], // 'D'
    [0x7F, 0x49, 0x49, 0x49, 0x41, 0x00], // 'E'
    [0x7F, 0x09, 0x09, 0x01, 0x01, 0x00], // 'F'
    [0x3E, 0x41, 0x41, 0x51, 0x32, 0x00], // 'G'
    [0x7F, 0x08, 0x08, 0x08, 0x7F, 0x00], // 'H'
    [0x00, 0x41, 0x7F, 0x41, 0x00, 0x00], // 'I'
    [0x20, 0x40, 0x41, 0x3F, 0x01, 0x00], // 'J'
    [0x7F, 0x08, 0x14, 0x22, 0x41, 0x00], // 'K'
    [0x7F, 0x40, 0x40, 0x40, 0x40, 0x00], // 'L'
    [0x7F, 0x02, 0x04, 0x02, 0x7F, 0x00], // 'M'
    [0x7F, 0x04, 0x08, 0x10, 0x7F, 0x00], // 'N'
    [0x3E, 0x41, 0x41, 0x41, 0x3E, 0x00], // 'O'
    [0x7F, 0x09, 0x09, 0x09, 0x06, 0x00], // 'P'
    [0x3E, 0x41, 0x51, 0x21, 0x5E, 0x00], // 'Q'
    [0x7F, 0x09, 0x19, 0x29, 0x46, 0x00], // 'R'
    [0x46, 0x49, 0x49, 0x49, 0x31, 0x00], // 'S'
    [0x01, 0x01, 0x7F, 0x01, 0x01, 0x00], // 'T'
    [0x3F, 0x40, 0x40, 0x40, 0x3F, 0x00], // 'U'
    [0x1F, 0x20, 0x40, 0x20, 0x1F, 0x00], // 'V'
    [0x7F, 0x20, 0x18, 0x20, 0x7F, 0x00], // 'W'
    [0x63, 0x14, 0x08, 0x14, 0x63, 0x00], // 'X'
    [0x03, 0x04, 0x78, 0x04, 0x03, 0x00], // 'Y'
    [0x61, 0x51, 0x49, 0x45, 0x43, 0x00], // 'Z'
    [0x00, 0x00, 0x7F, 0x41, 0x41, 0x00], // '['
    [0x02, 0x04, 0x08, 0x10, 0x20, 0x00], // '\\'
    [0x41, 0x41, 0x7F, 0x00, 0x00, 0x00], // ']'
    [0x04, 0x02, 0x01, 0x02, 0x04, 0x00], // '^'
    [0x40, 0x40, 0x40, 0x40, 0x40, 0x00], // '_'
    [0x00, 0x01, 0x02, 0x04, 0x00, 0x00], // '`'
    [0x20, 0x54, 0x54, 0x54, 0x78, 0x00], // 'a'
    [0x7F, 0x48, 0x44, 0x44, 0x38, 0x00], // 'b'
    [0x38, 0x44, 0x44, 0x44, 0x20, 0x00], // 'c'
    [0x38, 0x44, 0x44, 0x48, 0x7F, 0x00], // 'd'
    [0x38, 0x54, 0x54, 0x54, 0x18, 0x00], // 'e'
    [0x08, 0x7E, 0x09, 0x01, 0x02, 0x00], // 'f'
    [0x08, 0x14, 0x54, 0x54, 0x3C, 0x00], // 'g'
    [0x7F, 0x08, 0x04, 0x04, 0x78, 0x00], // 'h'
    [0x00, 0x44, 0x7D, 0x40, 0x00, 0x00], // 'i'
    [0x20, 0x40, 0x44, 0x3D, 0x00, 0x00], // 'j'
    [0x00, 0x7F, 0x10, 0x28, 0x44, 0x00], // 'k'
    [0x00, 0x41, 0x7F, 0x40, 0x00, 0x00], // 'l'
    [0x7C, 0x04, 0x18, 0x04, 0x78, 0x00], // 'm'
    [0x7C, 0x08, 0x04, 0x04, 0x78, 0x00], // 'n'
    [0x38, 0x44, 0x44, 0x44, 0x38, 0x00], // 'o'
    [0x7C, 0x14, 0x14, 0x14, 0x08, 0x00], // 'p'
    [0x08, 0x14, 0x14, 0x18, 0x7C, 0x00], // 'q'
    [0x7C, 0x08, 0x04, 0x04, 0x08, 0x00], // 'r'
    [0x48, 0x54, 0x54, 0x54, 0x20, 0x00], // 's'
    [0x04, 0x3F, 0x44, 0x40, 0x20, 0x00], // 't'
    [0x3C, 0x40, 0x40, 0x20, 0x7C, 0x00], // 'u'
    [0x1C, 0x20, 0x40, 0x20, 0x1C, 0x00], // 'v'
    [0x3C, 0x40, 0x30, 0x40, 0x3C, 0x00], // 'w'
    [0x44, 0x28, 0x10, 0x28, 0x44, 0x00], // 'x'
    [0x0C, 0x50, 0x50, 0x50, 0x3C, 0x00], // 'y'
    [0x44, 0x64, 0x54, 0x4C, 0x44, 0x00], // 'z'
    [0x00, 0x08, 0x36, 0x41, 0x00, 0x00], // '{'
    [0x00, 0x00, 0x7F, 0x00, 0x00, 0x00], // '|'
    [0x00, 0x41, 0x36, 0x08, 0x00, 0x00], // '}'
    [0x10, 0x04, 0x08, 0x10, 0x08, 0x00], // '~'
    [0x08, 0x1C, 0x2A, 0x08, 0x08, 0x00], // DEL
];

#[rustfmt::skip]
static NARROW: [Glyph; GLYPH_COUNT] = [
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // ' '
    [0x00, 0x00, 0x2E, 0x00, 0x00, 0x00], // '!'
    [0x00, 0x06, 0x00, 0x06, 0x00, 0x00], // '"'
    [0x14, 0x3E, 0x14, 0x3E, 0x14, 0x00], // '#'
    [0x2C, 0x2A, 0x3E, 0x2A, 0x1A, 0x00], // '$'
    [0x22, 0x10, 0x08, 0x04, 0x22, 0x00], // '%'
    [0x18, 0x24, 0x2A, 0x36, 0x30, 0x00], // '&'
    [0x00, 0x00, 0x04, 0x02, 0x00, 0x00], // "'"
    [0x00, 0x00, 0x1C, 0x22, 0x00, 0x00], // '('
    [0x00, 0x00, 0x22, 0x1C, 0x00, 0x00], // ')'
    [0x00, 0x2A, 0x1C, 0x1C, 0x2A, 0x00], // '*'
    [0x08, 0x08, 0x3E, 0x08, 0x08, 0x00], // '+'
    [0x00, 0x00, 0x20, 0x10, 0x00, 0x00], // ','
    [0x08, 0x08, 0x08, 0x08, 0x08, 0x00], // '-'
    [0x00, 0x00, 0x20, 0x00, 0x00, 0x00], // '.'
    [0x20, 0x10, 0x08, 0x04, 0x02, 0x00], // '/'
    [0x1C, 0x32, 0x2A, 0x26, 0x1C, 0x00], // '0'
    [0x00, 0x24, 0x3E, 0x20, 0x00, 0x00], // '1'
    [0x3A, 0x2A, 0x2A, 0x2A, 0x2E, 0x00], // '2'
    [0x22, 0x22, 0x2A, 0x2A, 0x3E, 0x00], // '3'
    [0x10, 0x18, 0x14, 0x3E, 0x10, 0x00], // '4'
    [0x2E, 0x2A, 0x2A, 0x2A, 0x12, 0x00], // '5'
    [0x3E, 0x2A, 0x2A, 0x2A, 0x3A, 0x00], // '6'
    [0x02, 0x02, 0x32, 0x0A, 0x06, 0x00], // '7'
    [0x3E, 0x2A, 0x2A, 0x2A, 0x3E, 0x00], // '8'
    [0x2E, 0x2A, 0x2A, 0x2A, 0x3E, 0x00], // '9'
    [0x00, 0x00, 0x00, 0x14, 0x00, 0x00], // ':'
    [0x00, 0x00, 0x20, 0x14, 0x00, 0x00], // ';'
    [0x00, 0x08, 0x14, 0x22, 0x00, 0x00], // '<'
    [0x00, 0x14, 0x14, 0x14, 0x14, 0x00], // '='
    [0x00, 0x22, 0x14, 0x08, 0x00, 0x00], // '>'
    [0x00, 0x04, 0x02, 0x2A, 0x04, 0x00], // '?'
    [0x3E, 0x22, 0x22, 0x2A, 0x2E, 0x00], // '@'
    [0x38, 0x14, 0x12, 0x14, 0x38, 0x00], // 'A'
    [0x3E, 0x2A, 0x2A, 0x2A, 0x14, 0x00], // 'B'
    [0x1C, 0x22, 0x22, 0x22, 0x14, 0x00], // 'C'
    [0x3E, 0x22, 0x22, 0x22, 0x1C, 0x00], // 'D'
    [0x3E, 0x2A, 0x2A, 0x22, 0x22, 0x00], // 'E'
    [0x3E, 0x0A, 0x0A, 0x02, 0x02, 0x00], // 'F'
    [0x1C, 0x22, 0x22, 0x2A, 0x18, 0x00], // 'G'
    [0x3E, 0x08, 0x08, 0x08, 0x3E, 0x00], // 'H'
    [0x00, 0x22, 0x3E, 0x22, 0x00, 0x00], // 'I'
    [0x12, 0x22, 0x22, 0x1E, 0x02, 0x00], // 'J'
    [0x3E, 0x08, 0x0C, 0x14, 0x22, 0x00], // 'K'
    [0x3E, 0x20, 0x20, 0x20, 0x20, 0x00], // 'L'
    [0x3E, 0x04, 0x08, 0x04, 0x3E, 0x00], // 'M'
    [0x3E, 0x04, 0x08, 0x10, 0x3E, 0x00], // 'N'
    [0x1C, 0x22, 0x22, 0x22, 0x1C, 0x00], // 'O'
    [0x3E, 0x0A, 0x0A, 0x0A, 0x04, 0x00], // 'P'
    [0x1C, 0x22, 0x2A, 0x12, 0x2C, 0x00], // 'Q'
    [0x3E, 0x0A, 0x0A, 0x1A, 0x2C, 0x00], // 'R'
    [0x24, 0x2A, 0x2A, 0x2A, 0x12, 0x00], // 'S'
    [0x02, 0x02, 0x3E, 0x02, 0x02, 0x00], // 'T'
    [0x1E, 0x20, 0x20, 0x20, 0x1E, 0x00], // 'U'
    [0x02, 0x0C, 0x30, 0x0C, 0x02, 0x00], // 'V'
    [0x3E, 0x10, 0x08, 0x10, 0x3E, 0x00], // 'W'
    [0x22, 0x14, 0x08, 0x14, 0x22, 0x00], // 'X'
    [0x02, 0x04, 0x38, 0x04, 0x02, 0x00], // 'Y'
    [0x22, 0x32, 0x2A, 0x26, 0x22, 0x00], // 'Z'
    [0x00, 0x3E, 0x22, 0x22, 0x00, 0x00], // '['
    [0x02, 0x04, 0x08, 0x10, 0x20, 0x00], // '\\'
    [0x00, 0x00, 0x22, 0x22, 0x3E, 0x00], // ']'
    [0x08, 0x04, 0x02, 0x04, 0x08, 0x00], // '^'
    [0x20, 0x20, 0x20, 0x20, 0x20, 0x00], // '_'
    [0x00, 0x00, 0x02, 0x04, 0x00, 0x00], // '`'
    [0x38, 0x14, 0x12, 0x14, 0x38, 0x00], // 'a'
    [0x3E, 0x2A, 0x2A, 0x2A, 0x14, 0x00], // 'b'
    [0x1C, 0x22, 0x22, 0x22, 0x14, 0x00], // 'c'
    [0x3E, 0x22, 0x22, 0x22, 0x1C, 0x00], // 'd'
    [0x3E, 0x2A, 0x2A, 0x22, 0x22, 0x00], // 'e'
    [0x3E, 0x0A, 0x0A, 0x02, 0x02, 0x00], // 'f'
    [0x1C, 0x22, 0x22, 0x2A, 0x18, 0x00], // 'g'
    [0x3E, 0x08, 0x08, 0x08, 0x3E, 0x00], // 'h'
    [0x00, 0x22, 0x3E, 0x22, 0x00, 0x00], // 'i'
    [0x12, 0x22, 0x22, 0x1E, 0x02, 0x00], // 'j'
    [0x3E, 0x08, 0x0C, 0x14, 0x22, 0x00], // 'k'
    [0x3E, 0x20, 0x20, 0x20, 0x20, 0x00], // 'l'
    [0x3E, 0x04, 0x08, 0x04, 0x3E, 0x00], // 'm'
    [0x3E, 0x04, 0x08, 0x10, 0x3E, 0x00], // 'n'
    [0x1C, 0x22, 0x22, 0x22, 0x1C, 0x00], // 'o'
    [0x3E, 0x0A, 0x0A, 0x0A, 0x04, 0x00], // 'p'
    [0x1C, 0x22, 0x2A, 0x12, 0x2C, 0x00], // 'q'
    [0x3E, 0x0A, 0x0A, 0x1A, 0x2C, 0x00], // 'r'
    [0x24, 0x2A, 0x2A, 0x2A, 0x12, 0x00], // 's'
    [0x02, 0x02, 0x3E, 0x02, 0x02, 0x00], // 't'
    [0x1E, 0x20, 0x20, 0x20, 0x1E, 0x00], // 'u'
    [0x02, 0x0C, 0x30, 0x0C, 0x02, 0x00], // 'v'
    [0x3E, 0x10, 0x08, 0x10, 0x3E, 0x00], // 'w'
    [0x22, 0x14, 0x08, 0x14, 0x22, 0x00], // 'x'
    [0x02, 0x04, 0x38, 0x04, 0x02, 0x00], // 'y'
    [0x22, 0x32, 0x2A, 0x26, 0x22, 0x00], // 'z'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '{'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '|'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '}'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // '~'
    [0x00, 0x00, 0x00, 0x00, 0x00, 0x00], // DEL
];
