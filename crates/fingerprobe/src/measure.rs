//! Distances between sorted crossings, in physical units.
//!
//! Walking down a reference line that cuts across the wire array, the edge
//! crossings alternate between the two sides of each wire:
//!
//! ```text
//!   c0  c1    c2  c3    c4  c5
//!   |wire|    |wire|    |wire|
//!        finger    finger
//! ```
//!
//! so wire widths are the pairs `(2i, 2i+1)`, finger widths `(2i+1, 2i+2)`,
//! and periods `(2i, 2i+2)`. Distances measured along a line that is not
//! perpendicular to the wires are projected with `sin(|alpha| + |beta|)`.

use nalgebra::distance;

use crate::crossing::Crossing;
use crate::error::{MeasureError, Result};

fn pair_distance(c: &[Crossing], i: usize, j: usize, pixel_size_um: f64) -> f64 {
    distance(&c[i].centroid, &c[j].centroid) * pixel_size_um
}

/// Widths of wires along the line: one per complete crossing pair.
pub fn wire_widths(crossings: &[Crossing], pixel_size_um: f64) -> Vec<f64> {
    let n = crossings.len() / 2;
    (0..n)
        .map(|i| pair_distance(crossings, 2 * i, 2 * i + 1, pixel_size_um))
        .collect()
}

/// Widths of fingers (gaps between consecutive wires) along the line.
pub fn finger_widths(crossings: &[Crossing], pixel_size_um: f64) -> Vec<f64> {
    let n = (crossings.len() / 2).saturating_sub(1);
    (0..n)
        .map(|i| pair_distance(crossings, 2 * i + 1, 2 * i + 2, pixel_size_um))
        .collect()
}

/// Finger periods (leading edge to next leading edge) along the line.
pub fn finger_periods(crossings: &[Crossing], pixel_size_um: f64) -> Vec<f64> {
    let n = (crossings.len() / 2).saturating_sub(1);
    (0..n)
        .map(|i| pair_distance(crossings, 2 * i, 2 * i + 2, pixel_size_um))
        .collect()
}

/// Distance from each initial finger position to the matching tip.
///
/// `initial[i]` is paired with `tips[i]`; surplus tips are ignored.
pub fn propagation_distances(
    initial: &[Crossing],
    tips: &[Crossing],
    pixel_size_um: f64,
) -> Result<Vec<f64>> {
    if tips.len() < initial.len() {
        return Err(MeasureError::CountMismatch {
            expected: initial.len(),
            got: tips.len(),
        });
    }
    Ok(initial
        .iter()
        .zip(tips)
        .map(|(a, b)| distance(&a.centroid, &b.centroid) * pixel_size_um)
        .collect())
}

/// `sin(|alpha| + |beta|)` with both angles in degrees.
pub fn projection_factor(alpha_deg: f64, beta_deg: f64) -> f64 {
    (alpha_deg.abs() + beta_deg.abs()).to_radians().sin()
}

/// Checked projection factor: zero or non-finite factors are rejected.
pub fn checked_projection_factor(alpha_deg: f64, beta_deg: f64) -> Result<f64> {
    let m = projection_factor(alpha_deg, beta_deg);
    if !m.is_finite() || m.abs() < 1e-12 {
        return Err(MeasureError::DegenerateProjection {
            alpha_deg,
            beta_deg,
        });
    }
    Ok(m)
}

/// Scale each along-line value by the projection factor.
pub fn project(values: &[f64], factor: f64) -> Vec<f64> {
    values.iter().map(|v| v * factor).collect()
}

/// Propagation distances measured from the first crossing.
///
/// Entry `i >= 1` is `|c[i] - c[0]| * pixel_size / factor`; entry 0 has no
/// distance and is `None`.
pub fn distances_from_first(
    crossings: &[Crossing],
    pixel_size_um: f64,
    factor: f64,
) -> Result<Vec<Option<f64>>> {
    if !factor.is_finite() || factor.abs() < 1e-12 {
        return Err(MeasureError::DegenerateProjection {
            alpha_deg: f64::NAN,
            beta_deg: f64::NAN,
        });
    }
    let Some(first) = crossings.first() else {
        return Ok(Vec::new());
    };
    Ok(std::iter::once(None)
        .chain(
            crossings[1..]
                .iter()
                .map(|c| Some(distance(&first.centroid, &c.centroid) * pixel_size_um / factor)),
        )
        .collect())
}
