//! Proportional 3x5 font
//!
//! Glyphs are drawn as five rows of three pixels (bit 2 is the leftmost
//! pixel) and converted at compile time into the column bytes the SSD1306
//! expects in page addressing mode, one byte per 8-pixel column with the
//! LSB at the top. Glyphs sit one pixel below the top of the page.

/// Blank columns sent after every glyph
pub const SYMBOL_SPACE: usize = 1;

/// Maximum glyph width in columns
pub const MAX_WIDTH: usize = 3;

/// One rendered character
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Glyph {
    width: u8,
    columns: [u8; MAX_WIDTH],
}

impl Glyph {
    /// Column bytes of the glyph, without spacing
    pub fn columns(&self) -> &[u8] {
        &self.columns[..self.width as usize]
    }
}

const fn glyph(width: u8, rows: [u8; 5]) -> Glyph {
    let mut columns = [0u8; MAX_WIDTH];
    let mut row = 0;
    while row < 5 {
        let mut col = 0;
        while col < MAX_WIDTH {
            if rows[row] & (0b100 >> col) != 0 {
                columns[col] |= 1 << (row + 1);
            }
            col += 1;
        }
        row += 1;
    }
    Glyph { width, columns }
}

static SPACE: Glyph = glyph(2, [0; 5]);
static BLANK: Glyph = glyph(3, [0; 5]);
static COLON: Glyph = glyph(1, [0b000, 0b100, 0b000, 0b100, 0b000]);
static PERIOD: Glyph = glyph(1, [0b000, 0b000, 0b000, 0b000, 0b100]);
static MINUS: Glyph = glyph(3, [0b000, 0b000, 0b111, 0b000, 0b000]);
static SLASH: Glyph = glyph(3, [0b001, 0b001, 0b010, 0b100, 0b100]);

static DIGITS: [Glyph; 10] = [
    glyph(3, [0b111, 0b101, 0b101, 0b101, 0b111]),
    glyph(3, [0b010, 0b110, 0b010, 0b010, 0b111]),
    glyph(3, [0b111, 0b001, 0b111, 0b100, 0b111]),
    glyph(3, [0b111, 0b001, 0b111, 0b001, 0b111]),
    glyph(3, [0b101, 0b101, 0b111, 0b001, 0b001]),
    glyph(3, [0b111, 0b100, 0b111, 0b001, 0b111]),
    glyph(3, [0b111, 0b100, 0b111, 0b101, 0b111]),
    glyph(3, [0b111, 0b001, 0b010, 0b010, 0b010]),
    glyph(3, [0b111, 0b101, 0b111, 0b101, 0b111]),
    glyph(3, [0b111, 0b101, 0b111, 0b001, 0b111]),
];

static LETTERS: [Glyph; 26] = [
    glyph(3, [0b010, 0b101, 0b111, 0b101, 0b101]), // A
    glyph(3, [0b110, 0b101, 0b110, 0b101, 0b110]),
    glyph(3, [0b011, 0b100, 0b100, 0b100, 0b011]),
    glyph(3, [0b110, 0b101, 0b101, 0b101, 0b110]),
    glyph(3, [0b111, 0b100, 0b110, 0b100, 0b111]), // E
    glyph(3, [0b111, 0b100, 0b110, 0b100, 0b100]),
    glyph(3, [0b011, 0b100, 0b101, 0b101, 0b011]),
    glyph(3, [0b101, 0b101, 0b111, 0b101, 0b101]),
    glyph(3, [0b111, 0b010, 0b010, 0b010, 0b111]),
    glyph(3, [0b001, 0b001, 0b001, 0b101, 0b010]), // J
    glyph(3, [0b101, 0b101, 0b110, 0b101, 0b101]),
    glyph(3, [0b100, 0b100, 0b100, 0b100, 0b111]),
    glyph(3, [0b101, 0b111, 0b111, 0b101, 0b101]),
    glyph(3, [0b110, 0b101, 0b101, 0b101, 0b101]),
    glyph(3, [0b010, 0b101, 0b101, 0b101, 0b010]), // O
    glyph(3, [0b110, 0b101, 0b110, 0b100, 0b100]),
    glyph(3, [0b010, 0b101, 0b101, 0b110, 0b011]),
    glyph(3, [0b110, 0b101, 0b110, 0b101, 0b101]),
    glyph(3, [0b011, 0b100, 0b010, 0b001, 0b110]),
    glyph(3, [0b111, 0b010, 0b010, 0b010, 0b010]), // T
    glyph(3, [0b101, 0b101, 0b101, 0b101, 0b111]),
    glyph(3, [0b101, 0b101, 0b101, 0b101, 0b010]),
    glyph(3, [0b101, 0b101, 0b111, 0b111, 0b101]),
    glyph(3, [0b101, 0b101, 0b010, 0b101, 0b101]),
    glyph(3, [0b101, 0b101, 0b010, 0b010, 0b010]), // Y
    glyph(3, [0b111, 0b001, 0b010, 0b100, 0b111]),
];

/// Look up the glyph for a character
///
/// Lower case renders as upper case; anything without a glyph renders as
/// a blank cell.
pub fn glyph_for(c: char) -> &'static Glyph {
    match c.to_ascii_uppercase() {
        ' ' => &SPACE,
        ':' => &COLON,
        '.' => &PERIOD,
        '-' => &MINUS,
        '/' => &SLASH,
        c @ '0'..='9' => &DIGITS[c as usize - '0' as usize],
        c @ 'A'..='Z' => &LETTERS[c as usize - 'A' as usize],
        _ => &BLANK,
    }
}
