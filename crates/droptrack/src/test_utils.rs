//! Synthetic frames for unit tests and benches.

use image::{DynamicImage, GrayImage, Luma, Rgb, RgbImage};

/// RGB frame with a gray `size`×`size` square of value `fg` on a uniform
/// `bg` background. The square's top-left corner is the rounded
/// `center - size / 2`; pixels outside the frame are clipped.
pub(crate) fn draw_square_frame(
    w: u32,
    h: u32,
    center_x: f64,
    center_y: f64,
    size: u32,
    fg: u8,
    bg: u8,
) -> DynamicImage {
    let half = size as f64 / 2.0;
    let left = (center_x - half).round() as i64;
    let top = (center_y - half).round() as i64;
    let mut img = RgbImage::from_pixel(w, h, Rgb([bg, bg, bg]));
    for y in top.max(0)..(top + size as i64).min(h as i64) {
        for x in left.max(0)..(left + size as i64).min(w as i64) {
            img.put_pixel(x as u32, y as u32, Rgb([fg, fg, fg]));
        }
    }
    DynamicImage::ImageRgb8(img)
}

/// Uniform frame with no droplet.
pub(crate) fn blank_frame(w: u32, h: u32, value: u8) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(w, h, Rgb([value, value, value])))
}

/// Gray image with filled rectangles `(x, y, width, height, value)`.
pub(crate) fn gray_with_rects(w: u32, h: u32, bg: u8, rects: &[(u32, u32, u32, u32, u8)]) -> GrayImage {
    let mut img = GrayImage::from_pixel(w, h, Luma([bg]));
    for &(rx, ry, rw, rh, value) in rects {
        for y in ry..(ry + rh).min(h) {
            for x in rx..(rx + rw).min(w) {
                img.put_pixel(x, y, Luma([value]));
            }
        }
    }
    img
}

/// One frame per entry: a dark 20×20 droplet centred at the given height,
/// or an empty frame for `None`.
pub(crate) fn droplet_frames(w: u32, h: u32, centers: &[Option<f64>]) -> Vec<DynamicImage> {
    centers
        .iter()
        .map(|c| match c {
            Some(cy) => draw_square_frame(w, h, w as f64 / 2.0, *cy, 20, 20, 200),
            None => blank_frame(w, h, 200),
        })
        .collect()
}
