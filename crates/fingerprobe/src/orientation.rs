//! Orientation of fingers and of reference lines.
//!
//! Angles are measured in image coordinates (y down) as
//! `atan((y2 - y1) / (x2 - x1))`, in degrees, so they fall in `[-90, 90]`.
//! Line detection itself sits behind [`LineDetector`]; the default
//! implementation runs a Hough transform and clips each polar line to the
//! image to obtain a segment.

use image::{GrayImage, RgbImage};
use imageproc::hough::{detect_lines, LineDetectionOptions, PolarLine};

use crate::drawn_line::{drawn_line_mask, LineColor};
use crate::edges::{detect_edges, EdgeConfig};

/// A detected line segment with endpoints in pixel coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct LineSegment {
    pub x1: f64,
    pub y1: f64,
    pub x2: f64,
    pub y2: f64,
}

impl LineSegment {
    pub fn new(x1: f64, y1: f64, x2: f64, y2: f64) -> Self {
        Self { x1, y1, x2, y2 }
    }

    /// Orientation w.r.t. the x-axis in degrees.
    ///
    /// Vertical segments give `+90` or `-90` by the sign of `dy`;
    /// a zero-length segment has no orientation.
    pub fn angle_deg(&self) -> Option<f64> {
        let dx = self.x2 - self.x1;
        let dy = self.y2 - self.y1;
        if dx == 0.0 {
            if dy == 0.0 {
                return None;
            }
            return Some(90.0_f64.copysign(dy));
        }
        Some((dy / dx).atan().to_degrees())
    }

    /// Euclidean length in pixels.
    pub fn length(&self) -> f64 {
        (self.x2 - self.x1).hypot(self.y2 - self.y1)
    }
}

/// Finds straight lines in a binary mask.
pub trait LineDetector {
    /// Detected segments; empty when nothing passes the detector's gates.
    fn detect_lines(&self, mask: &GrayImage) -> Vec<LineSegment>;
}

/// Hough-transform line detector.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HoughLineDetector {
    /// Minimum accumulator votes for a line.
    pub vote_threshold: u32,
    /// Non-maximum suppression radius in accumulator cells.
    pub suppression_radius: u32,
    /// Minimum length in pixels of a line clipped to the image.
    pub min_length: f64,
}

impl Default for HoughLineDetector {
    fn default() -> Self {
        Self {
            vote_threshold: 100,
            suppression_radius: 8,
            min_length: 0.0,
        }
    }
}

impl LineDetector for HoughLineDetector {
    fn detect_lines(&self, mask: &GrayImage) -> Vec<LineSegment> {
        let options = LineDetectionOptions {
            vote_threshold: self.vote_threshold,
            suppression_radius: self.suppression_radius,
        };
        let (w, h) = mask.dimensions();
        let lines = detect_lines(mask, options);
        tracing::debug!("hough: {} lines", lines.len());
        lines
            .into_iter()
            .filter_map(|line| clip_polar_line(line, w, h))
            .filter(|seg| {
                let keep = seg.length() >= self.min_length;
                if !keep {
                    tracing::trace!("hough: dropping {:.1} px chord", seg.length());
                }
                keep
            })
            .collect()
    }
}

/// Clip `x cos(t) + y sin(t) = r` to the image rectangle (Liang-Barsky).
fn clip_polar_line(line: PolarLine, width: u32, height: u32) -> Option<LineSegment> {
    let theta = (line.angle_in_degrees as f64).to_radians();
    let (s, c) = theta.sin_cos();
    let r = line.r as f64;
    let p0 = [r * c, r * s];
    let dir = [-s, c];
    let bounds = [0.0, (width.max(1) - 1) as f64, 0.0, (height.max(1) - 1) as f64];

    let mut t_min = f64::NEG_INFINITY;
    let mut t_max = f64::INFINITY;
    for (axis, (lo, hi)) in [(0usize, (bounds[0], bounds[1])), (1, (bounds[2], bounds[3]))] {
        let d = dir[axis];
        let p = p0[axis];
        if d.abs() < 1e-12 {
            if p < lo || p > hi {
                return None;
            }
            continue;
        }
        let (mut ta, mut tb) = ((lo - p) / d, (hi - p) / d);
        if ta > tb {
            std::mem::swap(&mut ta, &mut tb);
        }
        t_min = t_min.max(ta);
        t_max = t_max.min(tb);
    }
    if t_min >= t_max {
        return None;
    }
    Some(LineSegment::new(
        p0[0] + t_min * dir[0],
        p0[1] + t_min * dir[1],
        p0[0] + t_max * dir[0],
        p0[1] + t_max * dir[1],
    ))
}

/// Open interval of accepted angles in degrees.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct AngleWindow {
    pub lower: f64,
    pub upper: f64,
}

impl Default for AngleWindow {
    fn default() -> Self {
        Self {
            lower: 0.0,
            upper: 50.0,
        }
    }
}

impl AngleWindow {
    pub fn contains(&self, angle_deg: f64) -> bool {
        angle_deg > self.lower && angle_deg < self.upper
    }

    /// Keep the angles strictly inside the window.
    pub fn filter(&self, angles: &[f64]) -> Vec<f64> {
        angles.iter().copied().filter(|&a| self.contains(a)).collect()
    }
}

/// Orientations of all segments that have one.
pub fn segment_angles(segments: &[LineSegment]) -> Vec<f64> {
    segments.iter().filter_map(LineSegment::angle_deg).collect()
}

/// Arithmetic mean, or `None` for no angles.
pub fn mean_angle(angles: &[f64]) -> Option<f64> {
    if angles.is_empty() {
        return None;
    }
    Some(angles.iter().sum::<f64>() / angles.len() as f64)
}

/// Finger orientations (propagation direction candidates) of a cropped
/// grayscale micrograph.
pub fn finger_orientations(
    gray: &GrayImage,
    edge_config: &EdgeConfig,
    detector: &dyn LineDetector,
) -> Vec<f64> {
    let edges = detect_edges(gray, edge_config);
    segment_angles(&detector.detect_lines(&edges))
}

/// Orientations of the reference line drawn in `color`.
pub fn drawn_line_orientations(
    rgb: &RgbImage,
    color: LineColor,
    detector: &dyn LineDetector,
) -> Vec<f64> {
    let mask = drawn_line_mask(rgb, color);
    segment_angles(&detector.detect_lines(&mask))
}
