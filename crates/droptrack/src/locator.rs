//! Droplet localization in a single frame.
//!
//! The frame is reduced to luminance, binarized with a fixed global cutoff,
//! and the outer borders of the foreground regions are traced. The largest
//! region is taken as the droplet and its bounding box gives the vertical
//! position. Horizontal position is discarded.

use std::borrow::Cow;

use image::{DynamicImage, GrayImage, Luma};
use imageproc::contours::{find_contours, BorderType, Contour};
use imageproc::point::Point;

/// Which side of the cutoff is treated as foreground.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ThresholdPolarity {
    /// Foreground where `luminance < threshold`: a dark droplet on a bright
    /// background.
    #[default]
    DarkForeground,
    /// Foreground where `luminance > threshold` (plain binary threshold).
    BrightForeground,
}

/// Configuration for the droplet locator.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct LocatorConfig {
    /// Global luminance cutoff on a 0–255 scale.
    pub threshold: u8,
    /// Mask polarity relative to `threshold`.
    pub polarity: ThresholdPolarity,
}

impl Default for LocatorConfig {
    fn default() -> Self {
        Self {
            threshold: 50,
            polarity: ThresholdPolarity::default(),
        }
    }
}

/// Axis-aligned bounding rectangle with inclusive pixel extents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct BoundingBox {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    /// Vertical center `y + height / 2`.
    pub fn center_y(&self) -> f64 {
        self.y as f64 + self.height as f64 / 2.0
    }
}

/// The droplet region found in one frame.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Polygon area enclosed by the region's outer border (px²).
    pub area: f64,
    /// Reported droplet position (pixels from the top of the frame).
    pub center_y: f64,
}

/// BT.601 luma, the weighting used for standard-definition video.
#[inline]
fn luma_bt601(r: u8, g: u8, b: u8) -> u8 {
    let y = 299 * r as u32 + 587 * g as u32 + 114 * b as u32;
    ((y + 500) / 1000).min(255) as u8
}

/// Single-channel luminance view of a frame.
///
/// 8-bit gray frames are borrowed as-is; everything else is converted to
/// RGB and weighted with BT.601 coefficients.
pub fn to_luminance(frame: &DynamicImage) -> Cow<'_, GrayImage> {
    match frame {
        DynamicImage::ImageLuma8(gray) => Cow::Borrowed(gray),
        other => {
            let rgb = other.to_rgb8();
            let (w, h) = rgb.dimensions();
            let mut out = GrayImage::new(w, h);
            for (dst, src) in out.pixels_mut().zip(rgb.pixels()) {
                *dst = Luma([luma_bt601(src[0], src[1], src[2])]);
            }
            Cow::Owned(out)
        }
    }
}

/// Binarize a luminance image: foreground pixels are 255, background 0.
pub fn threshold_mask(gray: &GrayImage, threshold: u8, polarity: ThresholdPolarity) -> GrayImage {
    let (w, h) = gray.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (dst, src) in mask.pixels_mut().zip(gray.pixels()) {
        let on = match polarity {
            ThresholdPolarity::DarkForeground => src[0] < threshold,
            ThresholdPolarity::BrightForeground => src[0] > threshold,
        };
        if on {
            *dst = Luma([255]);
        }
    }
    mask
}

/// Outer borders of top-level foreground regions; holes and regions nested
/// inside holes are dropped.
pub fn external_contours(mask: &GrayImage) -> Vec<Contour<i32>> {
    find_contours::<i32>(mask)
        .into_iter()
        .filter(|c| matches!(c.border_type, BorderType::Outer) && c.parent.is_none())
        .collect()
}

/// Shoelace area of the polygon traced by `points`.
pub fn contour_area(points: &[Point<i32>]) -> f64 {
    if points.len() < 3 {
        return 0.0;
    }
    let mut twice = 0i64;
    for (i, p) in points.iter().enumerate() {
        let q = &points[(i + 1) % points.len()];
        twice += p.x as i64 * q.y as i64 - q.x as i64 * p.y as i64;
    }
    twice.abs() as f64 / 2.0
}

/// Inclusive bounding box of `points`, or `None` for an empty border.
pub fn bounding_box(points: &[Point<i32>]) -> Option<BoundingBox> {
    let first = points.first()?;
    let (mut x0, mut y0, mut x1, mut y1) = (first.x, first.y, first.x, first.y);
    for p in &points[1..] {
        x0 = x0.min(p.x);
        y0 = y0.min(p.y);
        x1 = x1.max(p.x);
        y1 = y1.max(p.y);
    }
    Some(BoundingBox {
        x: x0.max(0) as u32,
        y: y0.max(0) as u32,
        width: (x1 - x0 + 1) as u32,
        height: (y1 - y0 + 1) as u32,
    })
}

/// Raster-order key of a border's starting point (top-most, then left-most).
fn start_key(contour: &Contour<i32>) -> (i32, i32) {
    contour.points.first().map(|p| (p.y, p.x)).unwrap_or((i32::MAX, i32::MAX))
}

/// Pick the largest contour. Equal areas resolve to the border that starts
/// first in raster order.
fn select_largest(contours: &[Contour<i32>]) -> Option<(&Contour<i32>, f64)> {
    let mut best: Option<(&Contour<i32>, f64)> = None;
    for contour in contours {
        let area = contour_area(&contour.points);
        let better = match best {
            None => true,
            Some((current, best_area)) => {
                area > best_area || (area == best_area && start_key(contour) < start_key(current))
            }
        };
        if better {
            best = Some((contour, area));
        }
    }
    best
}

/// Locate the droplet in a luminance image.
pub fn locate_in_gray(gray: &GrayImage, config: &LocatorConfig) -> Option<Detection> {
    let mask = threshold_mask(gray, config.threshold, config.polarity);
    let contours = external_contours(&mask);
    let (contour, area) = select_largest(&contours)?;
    let bbox = bounding_box(&contour.points)?;
    Some(Detection {
        bbox,
        area,
        center_y: bbox.center_y(),
    })
}

/// Locate the droplet in a decoded frame.
///
/// Returns `None` when the mask has no foreground region; the caller skips
/// such frames.
pub fn locate_droplet(frame: &DynamicImage, config: &LocatorConfig) -> Option<Detection> {
    let gray = to_luminance(frame);
    locate_in_gray(&gray, config)
}
