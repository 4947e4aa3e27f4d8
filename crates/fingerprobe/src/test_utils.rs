//! Shared test utilities for image-based unit tests.
//!
//! Synthetic micrographs: vertical or slanted stripes standing in for wires
//! and fingers, and thin straight lines standing in for the reference lines
//! drawn by hand.

use image::{GrayImage, Luma, Rgb, RgbImage};

/// Render vertical stripes of width `stripe_px`, alternating `lo` and `hi`.
///
/// Column `x` is `hi` when `(x / stripe_px)` is odd, `lo` otherwise.
pub(crate) fn draw_stripes(w: u32, h: u32, stripe_px: u32, lo: u8, hi: u8) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            let pix = if (x / stripe_px) % 2 == 1 { hi } else { lo };
            img.put_pixel(x, y, Luma([pix]));
        }
    }
    img
}

/// Mask with a straight segment of the given thickness.
///
/// A pixel is set when its distance to the segment `p0`-`p1` is at most
/// `half_thickness`.
pub(crate) fn draw_segment_mask(
    w: u32,
    h: u32,
    p0: [f32; 2],
    p1: [f32; 2],
    half_thickness: f32,
) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for y in 0..h {
        for x in 0..w {
            if segment_distance([x as f32, y as f32], p0, p1) <= half_thickness {
                img.put_pixel(x, y, Luma([255]));
            }
        }
    }
    img
}

/// Mask with only the listed pixels set.
pub(crate) fn mask_from_points(w: u32, h: u32, points: &[(u32, u32)]) -> GrayImage {
    let mut img = GrayImage::new(w, h);
    for &(x, y) in points {
        img.put_pixel(x, y, Luma([255]));
    }
    img
}

/// Gray background with a colored segment painted over it.
pub(crate) fn draw_colored_segment(
    w: u32,
    h: u32,
    p0: [f32; 2],
    p1: [f32; 2],
    half_thickness: f32,
    color: [u8; 3],
) -> RgbImage {
    let mut img = RgbImage::from_pixel(w, h, Rgb([128, 128, 128]));
    paint_segment(&mut img, p0, p1, half_thickness, color);
    img
}

/// Paint a segment over `img` in place.
pub(crate) fn paint_segment(
    img: &mut RgbImage,
    p0: [f32; 2],
    p1: [f32; 2],
    half_thickness: f32,
    color: [u8; 3],
) {
    let (w, h) = img.dimensions();
    for y in 0..h {
        for x in 0..w {
            if segment_distance([x as f32, y as f32], p0, p1) <= half_thickness {
                img.put_pixel(x, y, Rgb(color));
            }
        }
    }
}

/// Wires running at `angle_deg` to the image `x` axis.
///
/// Measured along any row, wires are `wire_px` wide and repeat every
/// `period_px`. On row `anchor[1]` a wire starts at column `anchor[0]`.
pub(crate) fn draw_slanted_wires(
    w: u32,
    h: u32,
    angle_deg: f32,
    wire_px: f32,
    period_px: f32,
    anchor: [f32; 2],
) -> GrayImage {
    let run = 1.0 / angle_deg.to_radians().tan();
    GrayImage::from_fn(w, h, |x, y| {
        let u = (x as f32 - anchor[0]) - (y as f32 - anchor[1]) * run;
        if u.rem_euclid(period_px) < wire_px {
            Luma([200])
        } else {
            Luma([40])
        }
    })
}

fn segment_distance(p: [f32; 2], a: [f32; 2], b: [f32; 2]) -> f32 {
    let ab = [b[0] - a[0], b[1] - a[1]];
    let ap = [p[0] - a[0], p[1] - a[1]];
    let len2 = ab[0] * ab[0] + ab[1] * ab[1];
    let t = if len2 > 0.0 {
        ((ap[0] * ab[0] + ap[1] * ab[1]) / len2).clamp(0.0, 1.0)
    } else {
        0.0
    };
    let dx = ap[0] - t * ab[0];
    let dy = ap[1] - t * ab[1];
    (dx * dx + dy * dy).sqrt()
}
