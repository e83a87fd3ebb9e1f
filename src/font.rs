use std::fs;

use image::GrayImage;
use rusttype::{point, Font, PositionedGlyph, Scale};
use tracing::{debug, info, warn};

/// A font file the resolver may try to load.
///
/// - `path`: absolute path to a TTF/TTC file
/// - `symbols`: whether the font carries emoji/pictograph coverage
#[derive(Debug, Clone, Copy)]
pub struct FontCandidate {
    pub path: &'static str,
    pub symbols: bool,
}

/// Default candidate list, ordered macOS, Linux, Windows.
/// Both CLI entry points share this single list.
pub const FONT_CANDIDATES: &[FontCandidate] = &[
    FontCandidate { path: "/System/Library/Fonts/Apple Color Emoji.ttc", symbols: true },
    FontCandidate { path: "/System/Library/Fonts/Helvetica.ttc", symbols: false },
    FontCandidate { path: "/System/Library/Fonts/Arial.ttf", symbols: false },
    FontCandidate { path: "/usr/share/fonts/truetype/noto/NotoColorEmoji.ttf", symbols: true },
    FontCandidate {
        path: "/usr/share/fonts/truetype/liberation/LiberationSans-Regular.ttf",
        symbols: false,
    },
    FontCandidate { path: "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf", symbols: false },
    FontCandidate { path: "C:\\Windows\\Fonts\\seguiemj.ttf", symbols: true },
    FontCandidate { path: "C:\\Windows\\Fonts\\arial.ttf", symbols: false },
];

/// A usable font for measuring and drawing text.
///
/// Either a system TrueType font or the built-in 5x7 bitmap font the
/// resolver degrades to when no candidate loads.
pub enum FontHandle {
    Truetype { font: Font<'static>, scale: Scale },
    Builtin { size: u32 },
}

/// Resolves a font at the given pixel size from the default candidate list.
/// Never fails: exhausting the list degrades to the built-in bitmap font.
pub fn resolve(size: u32) -> FontHandle {
    resolve_with(FONT_CANDIDATES, size)
}

/// Resolves a font from an explicit candidate list.
///
/// Tries every candidate; a candidate counts only if its file loads as a
/// font. Among loaded candidates, symbol-capable ones win over plain ones.
///
/// - `candidates`: ordered font files to try
/// - `size`: font pixel size
///
/// Returns a usable FontHandle
pub fn resolve_with(candidates: &[FontCandidate], size: u32) -> FontHandle {
    let mut plain: Option<(Font<'static>, &'static str)> = None;
    let mut symbol: Option<(Font<'static>, &'static str)> = None;

    for candidate in candidates {
        let Ok(data) = fs::read(candidate.path) else {
            continue;
        };
        match Font::try_from_vec(data) {
            Some(font) => {
                if candidate.symbols {
                    if symbol.is_none() {
                        symbol = Some((font, candidate.path));
                    }
                } else if plain.is_none() {
                    plain = Some((font, candidate.path));
                }
            }
            None => {
                debug!(path = candidate.path, "font candidate failed to load, trying next");
            }
        }
    }

    match symbol.or(plain) {
        Some((font, path)) => {
            info!(path, size, "using font");
            FontHandle::Truetype { font, scale: Scale::uniform(size as f32) }
        }
        None => {
            warn!(size, "no system font found, using built-in bitmap font");
            FontHandle::Builtin { size }
        }
    }
}

impl FontHandle {
    /// Measures the rendered pixel width of a string.
    pub fn measure_width(&self, text: &str) -> u32 {
        match self {
            FontHandle::Truetype { font, scale } => {
                let mut w = 0.0f32;
                for ch in text.chars() {
                    w += font.glyph(ch).scaled(*scale).h_metrics().advance_width;
                }
                w.ceil() as u32
            }
            FontHandle::Builtin { size } => {
                let s = builtin_scale(*size);
                text.chars().count() as u32 * CELL_WIDTH * s
            }
        }
    }

    /// Measures the ink height of a single line. Lines without ink (all
    /// whitespace) fall back to the font's nominal line height.
    pub fn line_height(&self, text: &str) -> u32 {
        match self {
            FontHandle::Truetype { font, scale } => {
                let glyphs: Vec<PositionedGlyph> =
                    font.layout(text, *scale, point(0.0, 0.0)).collect();
                let mut min_y = i32::MAX;
                let mut max_y = i32::MIN;
                for glyph in &glyphs {
                    if let Some(bb) = glyph.pixel_bounding_box() {
                        min_y = min_y.min(bb.min.y);
                        max_y = max_y.max(bb.max.y);
                    }
                }
                if min_y <= max_y {
                    (max_y - min_y) as u32
                } else {
                    let v = font.v_metrics(*scale);
                    (v.ascent - v.descent).ceil() as u32
                }
            }
            FontHandle::Builtin { size } => GLYPH_ROWS * builtin_scale(*size),
        }
    }

    /// Draws one line of text, black on white, with the ink's top edge at
    /// `(x, y)`. Pixels outside the canvas are discarded.
    pub fn draw_line(&self, canvas: &mut GrayImage, text: &str, x: u32, y: u32) {
        match self {
            FontHandle::Truetype { font, scale } => {
                let glyphs: Vec<PositionedGlyph> =
                    font.layout(text, *scale, point(0.0, 0.0)).collect();
                let ink_top = glyphs
                    .iter()
                    .filter_map(|g| g.pixel_bounding_box())
                    .map(|bb| bb.min.y)
                    .min()
                    .unwrap_or(0);
                let (width, height) = canvas.dimensions();
                for glyph in &glyphs {
                    if let Some(bb) = glyph.pixel_bounding_box() {
                        glyph.draw(|gx, gy, v| {
                            let px = bb.min.x + gx as i32 + x as i32;
                            let py = bb.min.y + gy as i32 - ink_top + y as i32;
                            if px >= 0 && py >= 0 {
                                let (ux, uy) = (px as u32, py as u32);
                                if ux < width && uy < height && v > 0.3 {
                                    canvas.put_pixel(ux, uy, image::Luma([0]));
                                }
                            }
                        });
                    }
                }
            }
            FontHandle::Builtin { size } => {
                let s = builtin_scale(*size);
                let mut cursor = x;
                for ch in text.chars() {
                    draw_builtin_glyph(canvas, ch, cursor, y, s);
                    cursor += CELL_WIDTH * s;
                }
            }
        }
    }
}

const GLYPH_COLS: u32 = 5;
const GLYPH_ROWS: u32 = 7;
// glyph plus one column of spacing
const CELL_WIDTH: u32 = GLYPH_COLS + 1;

fn builtin_scale(size: u32) -> u32 {
    (size / (GLYPH_ROWS + 1)).max(1)
}

fn draw_builtin_glyph(canvas: &mut GrayImage, ch: char, x: u32, y: u32, s: u32) {
    let idx = match u32::from(ch) {
        0x20..=0x7E => (u32::from(ch) - 0x20) as usize,
        _ => (u32::from('?') - 0x20) as usize,
    };
    let columns = &GLYPHS_5X7[idx];
    let (width, height) = canvas.dimensions();
    for (col, bits) in columns.iter().enumerate() {
        for row in 0..GLYPH_ROWS {
            if bits & (1 << row) != 0 {
                for dx in 0..s {
                    for dy in 0..s {
                        let px = x + col as u32 * s + dx;
                        let py = y + row * s + dy;
                        if px < width && py < height {
                            canvas.put_pixel(px, py, image::Luma([0]));
                        }
                    }
                }
            }
        }
    }
}

// Classic 5x7 LCD font, printable ASCII 0x20..=0x7E.
// One byte per column, bit 0 = top row.
const GLYPHS_5X7: [[u8; 5]; 95] = [
    [0x00, 0x00, 0x00, 0x00, 0x00], // space
    [0x00, 0x00, 0x5F, 0x00, 0x00], // !
    [0x00, 0x07, 0x00, 0x07, 0x00], // "
    [0x14, 0x7F, 0x14, 0x7F, 0x14], // #
    [0x24, 0x2A, 0x7F, 0x2A, 0x12], // $
    [0x23, 0x13, 0x08, 0x64, 0x62], // %
    [0x36, 0x49, 0x55, 0x22, 0x50], // &
    [0x00, 0x05, 0x03, 0x00, 0x00], // '
    [0x00, 0x1C, 0x22, 0x41, 0x00], // (
    [0x00, 0x41, 0x22, 0x1C, 0x00], // )
    [0x08, 0x2A, 0x1C, 0x2A, 0x08], // *
    [0x08, 0x08, 0x3E, 0x08, 0x08], // +
    [0x00, 0x50, 0x30, 0x00, 0x00], // ,
    [0x08, 0x08, 0x08, 0x08, 0x08], // -
    [0x00, 0x60, 0x60, 0x00, 0x00], // .
    [0x20, 0x10, 0x08, 0x04, 0x02], // /
    [0x3E, 0x51, 0x49, 0x45, 0x3E], // 0
    [0x00, 0x42, 0x7F, 0x40, 0x00], // 1
    [0x42, 0x61, 0x51, 0x49, 0x46], // 2
    [0x21, 0x41, 0x45, 0x4B, 0x31], // 3
    [0x18, 0x14, 0x12, 0x7F, 0x10], // 4
    [0x27, 0x45, 0x45, 0x45, 0x39], // 5
    [0x3C, 0x4A, 0x49, 0x49, 0x30], // 6
    [0x01, 0x71, 0x09, 0x05, 0x03], // 7
    [0x36, 0x49, 0x49, 0x49, 0x36], // 8
    [0x06, 0x49, 0x49, 0x29, 0x1E], // 9
    [0x00, 0x36, 0x36, 0x00, 0x00], // :
    [0x00, 0x56, 0x36, 0x00, 0x00], // ;
    [0x00, 0x08, 0x14, 0x22, 0x41], // <
    [0x14, 0x14, 0x14, 0x14, 0x14], // =
    [0x41, 0x22, 0x14, 0x08, 0x00], // >
    [0x02, 0x01, 0x51, 0x09, 0x06], // ?
    [0x32, 0x49, 0x79, 0x41, 0x3E], // @
    [0x7E, 0x11, 0x11, 0x11, 0x7E], // A
    [0x7F, 0x49, 0x49, 0x49, 0x36], // B
    [0x3E, 0x41, 0x41, 0x41, 0x22], // C
    [0x7F, 0x41, 0x41, 0x22, 0x1C], // D
    [0x7F, 0x49, 0x49, 0x49, 0x41], // E
    [0x7F, 0x09, 0x09, 0x01, 0x01], // F
    [0x3E, 0x41, 0x41, 0x51, 0x32], // G
    [0x7F, 0x08, 0x08, 0x08, 0x7F], // H
    [0x00, 0x41, 0x7F, 0x41, 0x00], // I
    [0x20, 0x40, 0x41, 0x3F, 0x01], // J
    [0x7F, 0x08, 0x14, 0x22, 0x41], // K
    [0x7F, 0x40, 0x40, 0x40, 0x40], // L
    [0x7F, 0x02, 0x04, 0x02, 0x7F], // M
    [0x7F, 0x04, 0x08, 0x10, 0x7F], // N
    [0x3E, 0x41, 0x41, 0x41, 0x3E], // O
    [0x7F, 0x09, 0x09, 0x09, 0x06], // P
    [0x3E, 0x41, 0x51, 0x21, 0x5E], // Q
    [0x7F, 0x09, 0x19, 0x29, 0x46], // R
    [0x46, 0x49, 0x49, 0x49, 0x31], // S
    [0x01, 0x01, 0x7F, 0x01, 0x01], // T
    [0x3F, 0x40, 0x40, 0x40, 0x3F], // U
    [0x1F, 0x20, 0x40, 0x20, 0x1F], // V
    [0x7F, 0x20, 0x18, 0x20, 0x7F], // W
    [0x63, 0x14, 0x08, 0x14, 0x63], // X
    [0x03, 0x04, 0x78, 0x04, 0x03], // Y
    [0x61, 0x51, 0x49, 0x45, 0x43], // Z
    [0x00, 0x00, 0x7F, 0x41, 0x41], // [
    [0x02, 0x04, 0x08, 0x10, 0x20], // backslash
    [0x41, 0x41, 0x7F, 0x00, 0x00], // ]
    [0x04, 0x02, 0x01, 0x02, 0x04], // ^
    [0x40, 0x40, 0x40, 0x40, 0x40], // _
    [0x00, 0x01, 0x02, 0x04, 0x00], // `
    [0x20, 0x54, 0x54, 0x54, 0x78], // a
    [0x7F, 0x48, 0x44, 0x44, 0x38], // b
    [0x38, 0x44, 0x44, 0x44, 0x20], // c
    [0x38, 0x44, 0x44, 0x48, 0x7F], // d
    [0x38, 0x54, 0x54, 0x54, 0x18], // e
    [0x08, 0x7E, 0x09, 0x01, 0x02], // f
    [0x08, 0x14, 0x54, 0x54, 0x3C], // g
    [0x7F, 0x08, 0x04, 0x04, 0x78], // h
    [0x00, 0x44, 0x7D, 0x40, 0x00], // i
    [0x20, 0x40, 0x44, 0x3D, 0x00], // j
    [0x00, 0x7F, 0x10, 0x28, 0x44], // k
    [0x00, 0x41, 0x7F, 0x40, 0x00], // l
    [0x7C, 0x04, 0x18, 0x04, 0x78], // m
    [0x7C, 0x08, 0x04, 0x04, 0x78], // n
    [0x38, 0x44, 0x44, 0x44, 0x38], // o
    [0x7C, 0x14, 0x14, 0x14, 0x08], // p
    [0x08, 0x14, 0x14, 0x18, 0x7C], // q
    [0x7C, 0x08, 0x04, 0x04, 0x08], // r
    [0x48, 0x54, 0x54, 0x54, 0x20], // s
    [0x04, 0x3F, 0x44, 0x40, 0x20], // t
    [0x3C, 0x40, 0x40, 0x20, 0x7C], // u
    [0x1C, 0x20, 0x40, 0x20, 0x1C], // v
    [0x3C, 0x40, 0x30, 0x40, 0x3C], // w
    [0x44, 0x28, 0x10, 0x28, 0x44], // x
    [0x0C, 0x50, 0x50, 0x50, 0x3C], // y
    [0x44, 0x64, 0x54, 0x4C, 0x44], // z
    [0x00, 0x08, 0x36, 0x41, 0x00], // {
    [0x00, 0x00, 0x7F, 0x00, 0x00], // |
    [0x00, 0x41, 0x36, 0x08, 0x00], // }
    [0x08, 0x08, 0x2A, 0x1C, 0x08], // ~
];
