//! Crossings of two masks: the regions where an edge mask meets a reference
//! line, or where two reference lines meet.
//!
//! Every measurement in [`crate::measure`] consumes the centroids produced
//! here, so their order matters: crossings are sorted by centroid row (image
//! `y`), which walks along a reference line drawn across the wire array.

use std::collections::BTreeMap;

use image::{GrayImage, Luma};
use imageproc::region_labelling::{connected_components, Connectivity};
use nalgebra::Point2;

use crate::edges::SET;
use crate::error::{MeasureError, Result};

/// One labeled overlap region.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Crossing {
    /// Region label (1-based, assigned in raster order).
    pub label: u32,
    /// Centroid in pixel coordinates (x = column, y = row).
    pub centroid: Point2<f64>,
    /// Number of pixels in the region.
    pub area: usize,
}

/// Sort direction along image `y`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CrossingOrder {
    /// Top of the image first.
    #[default]
    Ascending,
    /// Bottom of the image first.
    Descending,
}

/// Pixelwise AND of two masks.
pub fn intersect(a: &GrayImage, b: &GrayImage) -> Result<GrayImage> {
    if a.dimensions() != b.dimensions() {
        return Err(MeasureError::DimensionMismatch {
            left: a.dimensions(),
            right: b.dimensions(),
        });
    }
    let (w, h) = a.dimensions();
    let mut out = GrayImage::new(w, h);
    for ((pa, pb), po) in a.pixels().zip(b.pixels()).zip(out.pixels_mut()) {
        if pa[0] != 0 && pb[0] != 0 {
            *po = SET;
        }
    }
    Ok(out)
}

/// Label 8-connected regions of `mask` and return them in label order.
pub fn label_crossings(mask: &GrayImage) -> Vec<Crossing> {
    let labels = connected_components(mask, Connectivity::Eight, Luma([0u8]));

    // label -> (sum_x, sum_y, count)
    let mut acc: BTreeMap<u32, (f64, f64, usize)> = BTreeMap::new();
    for (x, y, l) in labels.enumerate_pixels() {
        let label = l[0];
        if label == 0 {
            continue;
        }
        let e = acc.entry(label).or_insert((0.0, 0.0, 0));
        e.0 += x as f64;
        e.1 += y as f64;
        e.2 += 1;
    }

    acc.into_iter()
        .map(|(label, (sx, sy, n))| Crossing {
            label,
            centroid: Point2::new(sx / n as f64, sy / n as f64),
            area: n,
        })
        .collect()
}

/// Sort crossings by centroid `y`; ties keep label order.
pub fn sort_crossings(crossings: &mut [Crossing], order: CrossingOrder) {
    crossings.sort_by(|a, b| a.centroid.y.total_cmp(&b.centroid.y));
    if order == CrossingOrder::Descending {
        crossings.reverse();
    }
}

/// Intersect `a` with `b`, label the overlap, and sort the regions.
pub fn sorted_crossings(
    a: &GrayImage,
    b: &GrayImage,
    order: CrossingOrder,
) -> Result<Vec<Crossing>> {
    let overlap = intersect(a, b)?;
    let mut crossings = label_crossings(&overlap);
    sort_crossings(&mut crossings, order);
    tracing::debug!("{} crossings", crossings.len());
    for c in &crossings {
        tracing::trace!(
            "crossing label={} at ({:.2}, {:.2}) area={}",
            c.label,
            c.centroid.x,
            c.centroid.y,
            c.area
        );
    }
    Ok(crossings)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_utils::{draw_segment_mask, mask_from_points};
    use approx::assert_relative_eq;

    #[test]
    fn intersect_requires_equal_sizes() {
        let a = GrayImage::new(10, 10);
        let b = GrayImage::new(10, 11);
        assert!(matches!(
            intersect(&a, &b),
            Err(MeasureError::DimensionMismatch { .. })
        ));
    }

    #[test]
    fn intersect_keeps_common_pixels() {
        let a = mask_from_points(5, 5, &[(0, 0), (1, 1), (2, 2)]);
        let b = mask_from_points(5, 5, &[(1, 1), (2, 2), (3, 3)]);
        let out = intersect(&a, &b).expect("same size");
        assert_eq!(out.get_pixel(0, 0)[0], 0);
        assert_eq!(out.get_pixel(1, 1)[0], 255);
        assert_eq!(out.get_pixel(2, 2)[0], 255);
        assert_eq!(out.get_pixel(3, 3)[0], 0);
    }

    #[test]
    fn diagonal_neighbors_form_one_region() {
        let mask = mask_from_points(6, 6, &[(1, 1), (2, 2), (3, 3)]);
        let regions = label_crossings(&mask);
        assert_eq!(regions.len(), 1);
        assert_eq!(regions[0].area, 3);
        assert_relative_eq!(regions[0].centroid.x, 2.0);
        assert_relative_eq!(regions[0].centroid.y, 2.0);
    }

    #[test]
    fn labels_are_unique_and_one_based() {
        let mask = mask_from_points(10, 10, &[(0, 0), (5, 0), (0, 5), (9, 9)]);
        let regions = label_crossings(&mask);
        let mut labels: Vec<u32> = regions.iter().map(|c| c.label).collect();
        assert_eq!(labels.len(), 4);
        labels.sort_unstable();
        labels.dedup();
        assert_eq!(labels, (1..=4).collect::<Vec<u32>>());
    }

    #[test]
    fn crossings_sorted_top_to_bottom() {
        // Line running down-left across three horizontal bars.
        let line = draw_segment_mask(40, 40, [30.0, 2.0], [10.0, 38.0], 0.8);
        let mut bars = GrayImage::new(40, 40);
        for y in [30u32, 8, 20] {
            for x in 0..40 {
                bars.put_pixel(x, y, SET);
            }
        }
        let crossings = sorted_crossings(&line, &bars, CrossingOrder::Ascending).expect("ok");
        assert_eq!(crossings.len(), 3);
        assert_relative_eq!(crossings[0].centroid.y, 8.0);
        assert_relative_eq!(crossings[1].centroid.y, 20.0);
        assert_relative_eq!(crossings[2].centroid.y, 30.0);
        // Moving down the line moves left.
        assert!(crossings[0].centroid.x > crossings[1].centroid.x);
        assert!(crossings[1].centroid.x > crossings[2].centroid.x);
    }

    #[test]
    fn descending_reverses_ascending() {
        let mask = mask_from_points(10, 10, &[(1, 7), (4, 2), (8, 5)]);
        let full = GrayImage::from_pixel(10, 10, SET);
        let asc = sorted_crossings(&mask, &full, CrossingOrder::Ascending).expect("ok");
        let desc = sorted_crossings(&mask, &full, CrossingOrder::Descending).expect("ok");
        let rev: Vec<_> = asc.iter().rev().cloned().collect();
        assert_eq!(desc, rev);
        assert_relative_eq!(desc[0].centroid.y, 7.0);
    }

    #[test]
    fn equal_rows_keep_label_order() {
        let mask = mask_from_points(10, 10, &[(8, 4), (2, 4)]);
        let mut regions = label_crossings(&mask);
        sort_crossings(&mut regions, CrossingOrder::Ascending);
        assert!(regions[0].label < regions[1].label);
    }

    #[test]
    fn empty_overlap_has_no_crossings() {
        let a = mask_from_points(8, 8, &[(1, 1)]);
        let b = mask_from_points(8, 8, &[(6, 6)]);
        let crossings = sorted_crossings(&a, &b, CrossingOrder::Ascending).expect("ok");
        assert!(crossings.is_empty());
    }
}
