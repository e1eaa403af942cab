//! Bitmap text overlay and side-by-side preview composition.

use font8x8::{UnicodeFonts, BASIC_FONTS};
use image::{Rgb, RgbImage};

const GLYPH: i32 = 8;
const LINE_HEIGHT: i32 = 12;
const MARGIN: i32 = 4;

pub const WHITE: Rgb<u8> = Rgb([255, 255, 255]);
pub const BLACK: Rgb<u8> = Rgb([0, 0, 0]);

fn clamp_i32(value: i32, min_value: i32, max_value: i32) -> i32 {
    value.max(min_value).min(max_value)
}

fn blend_pixel(dst: Rgb<u8>, src: Rgb<u8>, alpha: f64) -> Rgb<u8> {
    if alpha <= 0.0 {
        return dst;
    }
    let a = alpha.min(1.0);
    let inv = 1.0 - a;
    let mix = |d: u8, s: u8| (f64::from(d) * inv + f64::from(s) * a).round().clamp(0.0, 255.0) as u8;
    Rgb([mix(dst[0], src[0]), mix(dst[1], src[1]), mix(dst[2], src[2])])
}

pub fn fill_rect_alpha(img: &mut RgbImage, x0: i32, y0: i32, x1: i32, y1: i32, color: Rgb<u8>, alpha: f64) {
    if img.width() == 0 || img.height() == 0 {
        return;
    }
    let min_x = clamp_i32(x0.min(x1), 0, img.width() as i32 - 1);
    let max_x = clamp_i32(x0.max(x1), 0, img.width() as i32 - 1);
    let min_y = clamp_i32(y0.min(y1), 0, img.height() as i32 - 1);
    let max_y = clamp_i32(y0.max(y1), 0, img.height() as i32 - 1);
    for y in min_y..=max_y {
        for x in min_x..=max_x {
            let dst = *img.get_pixel(x as u32, y as u32);
            img.put_pixel(x as u32, y as u32, blend_pixel(dst, color, alpha));
        }
    }
}

pub fn draw_bitmap_text(img: &mut RgbImage, x: i32, y: i32, text: &str, color: Rgb<u8>) {
    let mut cursor_x = x;
    for ch in text.chars() {
        let Some(glyph) = BASIC_FONTS.get(ch).or_else(|| BASIC_FONTS.get('?')) else {
            cursor_x += GLYPH;
            continue;
        };
        for (row_idx, row) in glyph.iter().enumerate() {
            for col_idx in 0..GLYPH {
                if (*row >> col_idx) & 1 == 0 {
                    continue;
                }
                let tx = cursor_x + col_idx;
                let ty = y + row_idx as i32;
                if tx >= 0 && ty >= 0 && tx < img.width() as i32 && ty < img.height() as i32 {
                    img.put_pixel(tx as u32, ty as u32, color);
                }
            }
        }
        cursor_x += GLYPH;
    }
}

/// White text with a dark backing strip so it reads on any capture.
pub fn hud_line(img: &mut RgbImage, line: usize, text: &str) {
    let y = MARGIN + line as i32 * LINE_HEIGHT;
    let width = text.chars().count() as i32 * GLYPH;
    fill_rect_alpha(img, MARGIN - 2, y - 2, MARGIN + width + 1, y + GLYPH + 1, BLACK, 0.6);
    draw_bitmap_text(img, MARGIN, y, text, WHITE);
}

/// Places `left` and `right` next to each other, padding the shorter one with black.
pub fn side_by_side(left: &RgbImage, right: &RgbImage) -> RgbImage {
    let height = left.height().max(right.height());
    let mut out = RgbImage::from_pixel(left.width() + right.width(), height, BLACK);
    image::imageops::replace(&mut out, left, 0, 0);
    image::imageops::replace(&mut out, right, i64::from(left.width()), 0);
    out
}

/// 0RGB words as expected by the preview window.
pub fn to_framebuffer(img: &RgbImage) -> Vec<u32> {
    img.pixels()
        .map(|p| (u32::from(p[0]) << 16) | (u32::from(p[1]) << 8) | u32::from(p[2]))
        .collect()
}
