//! Edge masks of SEM micrographs.
//!
//! The micrograph is cropped above the instrument data bar, smoothed,
//! binarized with Otsu's threshold and passed through Canny. The result is a
//! 0/255 mask whose set pixels trace the wire/finger boundaries.

use std::path::Path;

use image::{DynamicImage, GenericImageView, GrayImage, ImageBuffer, Luma, Pixel};
use imageproc::contrast::{otsu_level, threshold, ThresholdType};

use crate::error::{MeasureError, Result};

/// Row where the instrument data bar starts on the lab's SEM exports.
pub const DEFAULT_DATA_BAR_TOP: u32 = 690;

/// Edge detection parameters.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct EdgeConfig {
    /// Gaussian sigma applied before binarization (1.4 matches a 7x7 kernel).
    pub blur_sigma: f32,
    /// Canny low hysteresis threshold.
    pub canny_low: f32,
    /// Canny high hysteresis threshold.
    pub canny_high: f32,
}

impl Default for EdgeConfig {
    fn default() -> Self {
        Self {
            blur_sigma: 1.4,
            canny_low: 50.0,
            canny_high: 100.0,
        }
    }
}

/// Open an image file, attaching the path to decode errors.
pub fn open_image(path: &Path) -> Result<DynamicImage> {
    image::open(path).map_err(|source| MeasureError::Image {
        path: path.to_path_buf(),
        source,
    })
}

/// Keep rows `[0, data_bar_top)`; the data bar below is discarded.
pub fn crop_data_bar<I>(image: &I, data_bar_top: u32) -> Result<Buffer<I::Pixel>>
where
    I: GenericImageView + 'static,
{
    let (w, h) = image.dimensions();
    let rows = data_bar_top.min(h);
    if w == 0 || rows == 0 {
        return Err(MeasureError::EmptyImage);
    }
    Ok(image::imageops::crop_imm(image, 0, 0, w, rows).to_image())
}

type Buffer<P> = ImageBuffer<P, Vec<<P as Pixel>::Subpixel>>;

/// Blur and binarize with Otsu's threshold.
///
/// Pixels strictly above the Otsu level become 255, all others 0.
pub fn binarize(gray: &GrayImage, blur_sigma: f32) -> GrayImage {
    let smoothed = if blur_sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(gray, blur_sigma)
    } else {
        gray.clone()
    };
    let level = otsu_level(&smoothed);
    tracing::trace!("otsu level {}", level);
    threshold(&smoothed, level, ThresholdType::Binary)
}

/// Edge mask of a grayscale micrograph (already cropped).
pub fn detect_edges(gray: &GrayImage, config: &EdgeConfig) -> GrayImage {
    let binary = binarize(gray, config.blur_sigma);
    imageproc::edges::canny(&binary, config.canny_low, config.canny_high)
}

/// Load `path`, crop the data bar, and return the edge mask.
pub fn load_edges(path: &Path, data_bar_top: u32, config: &EdgeConfig) -> Result<GrayImage> {
    let gray = open_image(path)?.to_luma8();
    let cropped = crop_data_bar(&gray, data_bar_top)?;
    Ok(detect_edges(&cropped, config))
}

/// Number of set pixels in a mask.
pub fn count_set(mask: &GrayImage) -> usize {
    mask.pixels().filter(|p| p[0] != 0).count()
}

pub(crate) const SET: Luma<u8> = Luma([255]);

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::draw_stripes;

    #[test]
    fn crop_keeps_top_rows() {
        let img = GrayImage::new(40, 30);
        let cropped = crop_data_bar(&img, 20).expect("crop");
        assert_eq!(cropped.dimensions(), (40, 20));
    }

    #[test]
    fn crop_beyond_height_is_identity() {
        let img = GrayImage::new(40, 30);
        let cropped = crop_data_bar(&img, DEFAULT_DATA_BAR_TOP).expect("crop");
        assert_eq!(cropped.dimensions(), (40, 30));
    }

    #[test]
    fn crop_color_and_dynamic_images() {
        let rgb = image::RgbImage::from_pixel(40, 30, image::Rgb([255, 0, 0]));
        let cropped = crop_data_bar(&rgb, 25).expect("crop");
        assert_eq!(cropped.dimensions(), (40, 25));
        assert_eq!(cropped.get_pixel(0, 24).0, [255, 0, 0]);

        let dynamic = DynamicImage::ImageRgb8(rgb);
        let cropped = crop_data_bar(&dynamic, 10).expect("crop");
        assert_eq!(cropped.dimensions(), (40, 10));
        assert_eq!(cropped.get_pixel(5, 5).0, [255, 0, 0, 255]);
    }

    #[test]
    fn crop_to_zero_rows_is_error() {
        let img = GrayImage::new(40, 30);
        assert!(matches!(
            crop_data_bar(&img, 0),
            Err(MeasureError::EmptyImage)
        ));
    }

    #[test]
    fn binarize_separates_two_levels() {
        let img = draw_stripes(60, 40, 10, 40, 200);
        let bin = binarize(&img, 0.0);
        assert!(bin.pixels().all(|p| p[0] == 0 || p[0] == 255));
        assert_eq!(bin.get_pixel(2, 5)[0], 0);
        assert_eq!(bin.get_pixel(12, 5)[0], 255);
    }

    #[test]
    fn edges_follow_stripe_boundaries() {
        let img = draw_stripes(80, 60, 10, 30, 220);
        let edges = detect_edges(&img, &EdgeConfig::default());
        assert!(count_set(&edges) > 0);
        // Interior of a stripe, far from its boundaries, carries no edge.
        assert_eq!(edges.get_pixel(15, 30)[0], 0);
        // Every stripe boundary produces edge pixels within a pixel of it.
        for x_boundary in [10u32, 20, 30, 40, 50, 60, 70] {
            let hit = (x_boundary - 2..=x_boundary + 1).any(|x| edges.get_pixel(x, 30)[0] != 0);
            assert!(hit, "no edge near x={}", x_boundary);
        }
    }
}
