//! Masks of reference lines drawn into copies of a micrograph.
//!
//! The lab draws a saturated red (or pure black) line across the finger
//! pattern in an image editor and saves the copy next to the original with a
//! suffix such as `_line_1`.

use std::path::Path;

use image::{GrayImage, RgbImage};

use crate::edges::{crop_data_bar, open_image, SET};
use crate::error::Result;

/// Color of a hand-drawn reference line.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LineColor {
    /// Red channel saturated at 255.
    #[default]
    Red,
    /// All channels at 0. A zero red channel alone is not enough, so blue
    /// or cyan annotations stay out of the mask.
    Black,
}

impl LineColor {
    fn matches(self, rgb: [u8; 3]) -> bool {
        match self {
            Self::Red => rgb[0] == 255,
            Self::Black => rgb == [0, 0, 0],
        }
    }
}

/// Mask (0/255) of pixels painted in `color`.
pub fn drawn_line_mask(rgb: &RgbImage, color: LineColor) -> GrayImage {
    let (w, h) = rgb.dimensions();
    let mut mask = GrayImage::new(w, h);
    for (x, y, px) in rgb.enumerate_pixels() {
        if color.matches(px.0) {
            mask.put_pixel(x, y, SET);
        }
    }
    mask
}

/// Load the annotated copy at `path`, crop the data bar, and mask the line.
pub fn load_drawn_line(path: &Path, color: LineColor, data_bar_top: u32) -> Result<GrayImage> {
    let rgb = open_image(path)?.to_rgb8();
    let cropped = crop_data_bar(&rgb, data_bar_top)?;
    Ok(drawn_line_mask(&cropped, color))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::edges::count_set;
    use crate::test_utils::draw_colored_segment;

    #[test]
    fn red_line_is_isolated() {
        let img = draw_colored_segment(50, 40, [5.0, 20.0], [45.0, 20.0], 0.5, [255, 0, 0]);
        let mask = drawn_line_mask(&img, LineColor::Red);
        assert_eq!(count_set(&mask), 41);
        assert_eq!(mask.get_pixel(10, 20)[0], 255);
        assert_eq!(mask.get_pixel(10, 10)[0], 0);
    }

    #[test]
    fn black_line_ignores_dark_gray() {
        let mut img = draw_colored_segment(30, 30, [15.0, 2.0], [15.0, 27.0], 0.5, [0, 0, 0]);
        img.put_pixel(3, 3, image::Rgb([1, 0, 0]));
        let mask = drawn_line_mask(&img, LineColor::Black);
        assert_eq!(count_set(&mask), 26);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn black_line_needs_every_channel_at_zero() {
        let mut img = draw_colored_segment(30, 30, [15.0, 2.0], [15.0, 27.0], 0.5, [0, 0, 0]);
        img.put_pixel(3, 3, image::Rgb([0, 0, 255]));
        img.put_pixel(4, 3, image::Rgb([0, 200, 200]));
        img.put_pixel(5, 3, image::Rgb([0, 0, 0]));
        let mask = drawn_line_mask(&img, LineColor::Black);
        assert_eq!(count_set(&mask), 27);
        assert_eq!(mask.get_pixel(3, 3)[0], 0);
        assert_eq!(mask.get_pixel(4, 3)[0], 0);
        assert_eq!(mask.get_pixel(5, 3)[0], 255);
    }

    #[test]
    fn red_mask_misses_black_line() {
        let img = draw_colored_segment(30, 30, [2.0, 15.0], [27.0, 15.0], 1.0, [0, 0, 0]);
        assert_eq!(count_set(&drawn_line_mask(&img, LineColor::Red)), 0);
    }

    #[test]
    fn color_deserializes_from_snake_case() {
        let c: LineColor = serde_json::from_str("\"black\"").expect("json");
        assert_eq!(c, LineColor::Black);
    }
}
