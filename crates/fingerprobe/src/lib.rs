//! fingerprobe: geometric measurement of finger dewetting patterns.
//!
//! SEM micrographs of a dewetting thin film show an array of wires
//! separated by fingers. A reference line drawn across the array (in red or
//! black, on a copy of the micrograph) crosses the finger edges; the ordered
//! centroids of those crossings give wire widths, finger widths, finger
//! periods and propagation distances. The pipeline stages are:
//!
//! 1. **Edges**: data-bar crop, blur, Otsu binarization, Canny.
//! 2. **Crossings**: mask intersection, 8-connected labeling, centroids
//!    sorted along image `y`.
//! 3. **Measure**: ordered-pair distances scaled by the pixel size and
//!    projected with `sin(|alpha| + |beta|)`.
//! 4. **Orientation**: reference line angle alpha and finger angle beta from
//!    a [`LineDetector`].
//! 5. **Calibration**: pixel size from a fixed value, the scale bar, or the
//!    OCR'd data-bar text.
//!
//! [`Batch`] runs these stages over numbered image sets and collects
//! [`MeasurementTable`]s. The [`afm`] module covers the AFM side of the
//! analysis: rim heights and side slopes from exported height profiles.

pub mod afm;
mod batch;
mod calibration;
mod config;
mod crossing;
mod drawn_line;
mod edges;
mod error;
mod measure;
mod orientation;
mod stats;
mod table;

#[cfg(test)]
pub(crate) mod test_utils;

pub use afm::{analyze_profile_set, analyze_profile_sets, rim_table, RimSummary};
pub use batch::{names_from_glob, numbered_names, Batch, ImageSet, WidthTables};
pub use calibration::{
    measure_scale_bar_pixels, parse_data_bar_text, parse_scale_bar_label, Calibration,
    CalibrationSource, Calibrator, LengthUnit, PixelSize, ScaleBar, ScaleBarConfig,
};
pub use config::MeasureConfig;
pub use crossing::{
    intersect, label_crossings, sort_crossings, sorted_crossings, Crossing, CrossingOrder,
};
pub use drawn_line::{drawn_line_mask, load_drawn_line, LineColor};
pub use edges::{
    binarize, count_set, crop_data_bar, detect_edges, load_edges, open_image, EdgeConfig,
    DEFAULT_DATA_BAR_TOP,
};
pub use error::{MeasureError, Result};
pub use measure::{
    checked_projection_factor, distances_from_first, finger_periods, finger_widths,
    project, projection_factor, propagation_distances, wire_widths,
};
pub use orientation::{
    drawn_line_orientations, finger_orientations, mean_angle, segment_angles, AngleWindow,
    HoughLineDetector, LineDetector, LineSegment,
};
pub use stats::Summary;
pub use table::{output_stem, write_run_parameters, MeasurementTable, SampleTag, TableRow};
