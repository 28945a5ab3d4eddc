use std::path::{Path, PathBuf};

use ab_glyph::{FontVec, PxScale};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_filled_rect_mut, draw_text_mut, text_size};
use imageproc::rect::Rect;
use tracing::{debug, trace, warn};

/// Tried in order after the font given on the command line.
pub const SYSTEM_FONT_CANDIDATES: [&str; 6] = [
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/Library/Fonts/Arial.ttf",
    "/usr/share/fonts/truetype/dejavu/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/TTF/DejaVuSans-Bold.ttf",
    "/usr/share/fonts/truetype/liberation/LiberationSans-Bold.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// The font the verdict text is rendered with.
pub enum OverlayFont {
    TrueType(FontVec),
    /// A 5x7 bitmap font compiled into the binary, scaled up in whole pixels.
    Builtin,
}

/// Picks the first loadable font, falling back to [`OverlayFont::Builtin`].
pub fn resolve_font(preferred: Option<&Path>) -> OverlayFont {
    let candidates = preferred
        .map(Path::to_path_buf)
        .into_iter()
        .chain(SYSTEM_FONT_CANDIDATES.iter().map(PathBuf::from));
    for path in candidates {
        match load_truetype(&path) {
            Ok(font) => {
                debug!(path = %path.display(), "Using font");
                return OverlayFont::TrueType(font);
            }
            Err(err) => trace!(path = %path.display(), %err, "Font not usable"),
        }
    }
    warn!("No TrueType font found, falling back to the built-in bitmap font");
    OverlayFont::Builtin
}

fn load_truetype(path: &Path) -> anyhow::Result<FontVec> {
    let bytes = std::fs::read(path)?;
    Ok(FontVec::try_from_vec(bytes)?)
}

const GLYPH_WIDTH: i32 = 5;
const GLYPH_HEIGHT: i32 = 7;
// One blank column between glyphs
const GLYPH_ADVANCE: i32 = GLYPH_WIDTH + 1;

impl OverlayFont {
    /// Width and height of `text` rendered at `px` pixels.
    pub fn text_size(&self, text: &str, px: f32) -> (u32, u32) {
        match self {
            OverlayFont::TrueType(font) => text_size(PxScale::from(px), font, text),
            OverlayFont::Builtin => {
                let cell = builtin_cell_size(px);
                let num_chars = text.chars().count() as i32;
                if num_chars == 0 {
                    return (0, 0);
                }
                let width = (num_chars * GLYPH_ADVANCE - 1) * cell;
                (width as u32, (GLYPH_HEIGHT * cell) as u32)
            }
        }
    }

    pub fn draw_text(&self, image: &mut RgbImage, color: Rgb<u8>, x: i32, y: i32, px: f32, text: &str) {
        match self {
            OverlayFont::TrueType(font) => {
                draw_text_mut(image, color, x, y, PxScale::from(px), font, text)
            }
            OverlayFont::Builtin => {
                let cell = builtin_cell_size(px);
                for (char_idx, c) in text.chars().enumerate() {
                    let origin_x = x + char_idx as i32 * GLYPH_ADVANCE * cell;
                    for (row, bits) in glyph(c).into_iter().enumerate() {
                        for col in 0..GLYPH_WIDTH {
                            if bits & (1u8 << (GLYPH_WIDTH - 1 - col)) == 0 {
                                continue;
                            }
                            let rect = Rect::at(origin_x + col * cell, y + row as i32 * cell)
                                .of_size(cell as u32, cell as u32);
                            draw_filled_rect_mut(image, rect, color);
                        }
                    }
                }
            }
        }
    }
}

fn builtin_cell_size(px: f32) -> i32 {
    ((px / (GLYPH_HEIGHT + 1) as f32).round() as i32).max(1)
}

/// Rows from top to bottom, the lowest five bits of each are the pixels from left to right.
fn glyph(c: char) -> [u8; 7] {
    match c.to_ascii_uppercase() {
        'A' => [0b01110, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'B' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10001, 0b10001, 0b11110],
        'C' => [0b01110, 0b10001, 0b10000, 0b10000, 0b10000, 0b10001, 0b01110],
        'D' => [0b11110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b11110],
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'F' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b10000],
        'G' => [0b01110, 0b10001, 0b10000, 0b10111, 0b10001, 0b10001, 0b01111],
        'H' => [0b10001, 0b10001, 0b10001, 0b11111, 0b10001, 0b10001, 0b10001],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'J' => [0b00111, 0b00010, 0b00010, 0b00010, 0b00010, 0b10010, 0b01100],
        'K' => [0b10001, 0b10010, 0b10100, 0b11000, 0b10100, 0b10010, 0b10001],
        'L' => [0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b10000, 0b11111],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'N' => [0b10001, 0b10001, 0b11001, 0b10101, 0b10011, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'P' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10000, 0b10000, 0b10000],
        'Q' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10101, 0b10010, 0b01101],
        'R' => [0b11110, 0b10001, 0b10001, 0b11110, 0b10100, 0b10010, 0b10001],
        'S' => [0b01111, 0b10000, 0b10000, 0b01110, 0b00001, 0b00001, 0b11110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'V' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01010, 0b00100],
        'W' => [0b10001, 0b10001, 0b10001, 0b10101, 0b10101, 0b10101, 0b01010],
        'X' => [0b10001, 0b10001, 0b01010, 0b00100, 0b01010, 0b10001, 0b10001],
        'Y' => [0b10001, 0b10001, 0b01010, 0b00100, 0b00100, 0b00100, 0b00100],
        'Z' => [0b11111, 0b00001, 0b00010, 0b00100, 0b01000, 0b10000, 0b11111],
        '!' => [0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00000, 0b00100],
        '?' => [0b01110, 0b10001, 0b00001, 0b00010, 0b00100, 0b00000, 0b00100],
        _ => [0; 7],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unusable_fonts_fall_back_to_builtin() {
        let dir = tempfile::tempdir().unwrap();
        let not_a_font = dir.path().join("font.ttf");
        std::fs::write(&not_a_font, b"definitely not a font").unwrap();
        // Only the preferred path is guaranteed to be bad, a system font may still be found
        let font = resolve_font(Some(&not_a_font));
        let (width, height) = font.text_size("WRONG!", 60.0);
        assert!(width > 0 && height > 0);
    }

    #[test]
    fn builtin_text_size_scales_with_px() {
        let font = OverlayFont::Builtin;
        // 60 px -> cells of 8 px, 6 glyphs are 35 columns wide
        assert_eq!(font.text_size("WRONG!", 60.0), (35 * 8, 7 * 8));
        assert_eq!(font.text_size("", 60.0), (0, 0));
        assert_eq!(font.text_size("A", 1.0), (5, 7));
    }

    #[test]
    fn builtin_draws_inside_its_box() {
        let background = Rgb([0, 0, 0]);
        let ink = Rgb([255, 0, 0]);
        let mut image = RgbImage::from_pixel(40, 20, background);
        OverlayFont::Builtin.draw_text(&mut image, ink, 2, 3, 8.0, "T");
        // The top bar of a T spans the whole first row
        for x in 2..7 {
            assert_eq!(*image.get_pixel(x, 3), ink);
        }
        assert_eq!(*image.get_pixel(2, 4), background);
        assert_eq!(*image.get_pixel(4, 9), ink);
        assert_eq!(*image.get_pixel(1, 3), background);
        assert_eq!(*image.get_pixel(7, 3), background);
    }

    #[test]
    fn builtin_clips_at_the_image_edge() {
        let mut image = RgbImage::new(10, 10);
        OverlayFont::Builtin.draw_text(&mut image, Rgb([255, 255, 255]), 5, 5, 60.0, "CORRECT!");
        OverlayFont::Builtin.draw_text(&mut image, Rgb([255, 255, 255]), -50, -50, 60.0, "WRONG!");
    }
}
