//! Diagnostic placeholder frame shown when a UDP read times out.
//!
//! The receiver returns this image (together with `success = false`) so a
//! viewer displays an obvious "TIMEOUT" card instead of freezing on the last
//! good frame.

use image::Rgb;

use super::Image;

pub const PLACEHOLDER_WIDTH: u32 = 320;
pub const PLACEHOLDER_HEIGHT: u32 = 240;

const BACKGROUND: Rgb<u8> = Rgb([32, 32, 32]);
const FOREGROUND: Rgb<u8> = Rgb([255, 255, 255]);
const LABEL: &str = "TIMEOUT";

const GLYPH_WIDTH: u32 = 5;
const GLYPH_HEIGHT: u32 = 7;
const SCALE: u32 = 4;

/// Builds the fixed-size timeout card.
pub fn timeout_placeholder() -> Image {
    let mut image = Image::from_pixel(PLACEHOLDER_WIDTH, PLACEHOLDER_HEIGHT, BACKGROUND);
    burn_label(&mut image, LABEL);
    image
}

/// Draws `label` centred on `image` with the built-in 5x7 bitmap font.
fn burn_label(image: &mut Image, label: &str) {
    let advance = (GLYPH_WIDTH + 1) * SCALE;
    let text_width = advance * label.len() as u32 - SCALE;
    let x0 = image.width().saturating_sub(text_width) / 2;
    let y0 = image.height().saturating_sub(GLYPH_HEIGHT * SCALE) / 2;

    for (i, ch) in label.chars().enumerate() {
        let Some(rows) = glyph(ch) else { continue };
        let gx = x0 + i as u32 * advance;
        for (row, bits) in rows.iter().enumerate() {
            for col in 0..GLYPH_WIDTH {
                if (bits >> (GLYPH_WIDTH - 1 - col)) & 1 == 0 {
                    continue;
                }
                for dy in 0..SCALE {
                    for dx in 0..SCALE {
                        let x = gx + col * SCALE + dx;
                        let y = y0 + row as u32 * SCALE + dy;
                        if x < image.width() && y < image.height() {
                            image.put_pixel(x, y, FOREGROUND);
                        }
                    }
                }
            }
        }
    }
}

/// Row bitmaps (MSB of the low 5 bits is the leftmost column).
fn glyph(ch: char) -> Option<[u8; 7]> {
    let rows = match ch {
        'E' => [0b11111, 0b10000, 0b10000, 0b11110, 0b10000, 0b10000, 0b11111],
        'I' => [0b01110, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b01110],
        'M' => [0b10001, 0b11011, 0b10101, 0b10101, 0b10001, 0b10001, 0b10001],
        'O' => [0b01110, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        'T' => [0b11111, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100, 0b00100],
        'U' => [0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b10001, 0b01110],
        _ => return None,
    };
    Some(rows)
}
