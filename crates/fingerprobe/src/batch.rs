//! Batch runs over a set of SEM images.
//!
//! Every image `name` of an [`ImageSet`] lives at `dir/name.tif`; annotated
//! copies with a reference line drawn in live at `dir/name{suffix}.tif`.
//! A run measures each image independently and stacks the results into
//! [`MeasurementTable`]s keyed by image name. An image whose measurement
//! fails is logged and skipped; a run in which every image fails is an error.

use std::path::{Path, PathBuf};

use image::GrayImage;

use crate::calibration::Calibrator;
use crate::config::MeasureConfig;
use crate::crossing::{sorted_crossings, CrossingOrder};
use crate::drawn_line::load_drawn_line;
use crate::edges::{crop_data_bar, load_edges, open_image};
use crate::error::{MeasureError, Result};
use crate::measure::{
    checked_projection_factor, distances_from_first, finger_periods, finger_widths,
    project, propagation_distances, wire_widths,
};
use crate::orientation::{drawn_line_orientations, finger_orientations, mean_angle};
use crate::table::MeasurementTable;

/// `base` followed by each number zero-padded to `zeropad` digits.
pub fn numbered_names(base: &str, numbers: &[u32], zeropad: usize) -> Vec<String> {
    numbers
        .iter()
        .map(|n| format!("{}{:0width$}", base, n, width = zeropad))
        .collect()
}

/// Files matching `pattern`, sorted, with their extension removed, minus
/// the names listed in `exclude`.
pub fn names_from_glob(pattern: &str, exclude: &[String]) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in glob::glob(pattern)? {
        let path = entry.map_err(|e| MeasureError::Io(e.into()))?;
        let name = path.with_extension("").to_string_lossy().into_owned();
        if !exclude.contains(&name) {
            names.push(name);
        }
    }
    names.sort();
    Ok(names)
}

/// Image names and the directory holding them.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ImageSet {
    pub dir: PathBuf,
    pub names: Vec<String>,
}

impl ImageSet {
    pub fn new(dir: impl Into<PathBuf>, names: Vec<String>) -> Self {
        Self {
            dir: dir.into(),
            names,
        }
    }

    /// `base001`, `base002`, ... in `dir`.
    pub fn numbered(dir: impl Into<PathBuf>, base: &str, numbers: &[u32], zeropad: usize) -> Self {
        Self::new(dir, numbered_names(base, numbers, zeropad))
    }

    /// Path of `name` with `suffix` appended (`""` for the micrograph itself).
    pub fn path(&self, name: &str, suffix: &str) -> PathBuf {
        self.dir.join(format!("{}{}.tif", name, suffix))
    }
}

/// Wire width, finger width and finger period tables of one run.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct WidthTables {
    pub wire_width: MeasurementTable,
    pub finger_width: MeasurementTable,
    pub finger_period: MeasurementTable,
    /// Per image: alpha, beta and the projection factor used.
    pub angles: MeasurementTable,
}

/// Runs measurements over an [`ImageSet`] with one [`MeasureConfig`].
#[derive(Debug, Clone)]
pub struct Batch {
    images: ImageSet,
    config: MeasureConfig,
    calibrator: Calibrator,
}

impl Batch {
    /// Prepare a batch; loads the calibration source up front.
    pub fn new(images: ImageSet, config: MeasureConfig) -> Result<Self> {
        let calibrator = config.calibration.load()?;
        Ok(Self {
            images,
            config,
            calibrator,
        })
    }

    pub fn images(&self) -> &ImageSet {
        &self.images
    }

    pub fn config(&self) -> &MeasureConfig {
        &self.config
    }

    /// Windowed finger orientations of every image.
    pub fn propagation_direction(&self) -> Result<MeasurementTable> {
        let mut table = MeasurementTable::new("propagation_direction", &["finger_orientation_deg"]);
        for (name, angles) in self.each_image("propagation direction", |name| self.finger_angles(name))? {
            table.push_image(name, &[column(angles)]);
        }
        Ok(table)
    }

    /// Distance from the initial edge to each finger tip.
    ///
    /// Initial positions are the crossings of the two drawn lines; tips are
    /// the crossings of the finger edges with the second line.
    pub fn propagation_distance(&self, suffix_1: &str, suffix_2: &str) -> Result<MeasurementTable> {
        let order = self.config.order;
        let mut table = MeasurementTable::new("propagation_distance", &["distance_um"]);
        let rows = self.each_image("propagation distance", |name| {
            let edges = self.edges(name)?;
            let line_1 = self.line(name, suffix_1)?;
            let line_2 = self.line(name, suffix_2)?;
            let initial = sorted_crossings(&line_1, &line_2, order)?;
            let tips = sorted_crossings(&edges, &line_2, order)?;
            let px = self.pixel_size_um(name)?;
            propagation_distances(&initial, &tips, px)
        })?;
        for (name, d) in rows {
            table.push_image(name, &[column(d)]);
        }
        Ok(table)
    }

    /// Wire widths, finger widths and finger periods along the line drawn
    /// in `name{suffix}`, and perpendicular to the wires.
    pub fn widths_and_periods(&self, suffix: &str) -> Result<WidthTables> {
        let order = self.config.order;
        let rows = self.each_image("widths and periods", |name| {
            let alpha = self.alpha(name, suffix)?;
            let beta = self.beta(name)?;
            let factor = checked_projection_factor(alpha, beta)?;
            let edges = self.edges(name)?;
            let line = self.line(name, suffix)?;
            let crossings = sorted_crossings(&edges, &line, order)?;
            let px = self.pixel_size_um(name)?;
            tracing::debug!(
                "{}: alpha={:.2} beta={:.2} factor={:.4} crossings={}",
                name,
                alpha,
                beta,
                factor,
                crossings.len()
            );
            Ok((
                [alpha, beta, factor],
                wire_widths(&crossings, px),
                finger_widths(&crossings, px),
                finger_periods(&crossings, px),
            ))
        })?;

        let mut out = WidthTables {
            wire_width: MeasurementTable::new("wire_width", &["wire_width_along_line_um", "wire_width_um"]),
            finger_width: MeasurementTable::new(
                "finger_width",
                &["finger_width_along_line_um", "finger_width_um"],
            ),
            finger_period: MeasurementTable::new(
                "finger_period",
                &["finger_period_along_line_um", "finger_period_um"],
            ),
            angles: MeasurementTable::new("angles", &["alpha_deg", "beta_deg", "projection_factor"]),
        };
        for (name, (angles, a, b, p)) in rows {
            let m = angles[2];
            out.angles.push_image(name, &angles.map(|v| vec![Some(v)]));
            out.wire_width
                .push_image(name, &[column(a.clone()), column(project(&a, m))]);
            out.finger_width
                .push_image(name, &[column(b.clone()), column(project(&b, m))]);
            out.finger_period
                .push_image(name, &[column(p.clone()), column(project(&p, m))]);
        }
        Ok(out)
    }

    /// Propagation distance of each crossing of the two drawn lines from the
    /// first one, corrected by `sin(|alpha| + |beta|)`.
    ///
    /// `reverse` walks the crossings from the bottom of the image, on top of
    /// the configured order.
    pub fn projected_propagation_distance(
        &self,
        suffix_1: &str,
        suffix_2: &str,
        reverse: bool,
    ) -> Result<MeasurementTable> {
        let order = match (self.config.order, reverse) {
            (o, false) => o,
            (CrossingOrder::Ascending, true) => CrossingOrder::Descending,
            (CrossingOrder::Descending, true) => CrossingOrder::Ascending,
        };
        let mut table = MeasurementTable::new("projected_propagation_distance", &["distance_um"]);
        let rows = self.each_image("projected propagation distance", |name| {
            let alpha = self.alpha(name, suffix_1)?;
            let beta = self.beta(name)?;
            let factor = checked_projection_factor(alpha, beta)?;
            let px = self.pixel_size_um(name)?;
            let line_1 = self.line(name, suffix_1)?;
            let line_2 = self.line(name, suffix_2)?;
            let crossings = sorted_crossings(&line_1, &line_2, order)?;
            distances_from_first(&crossings, px, factor)
        })?;
        for (name, d) in rows {
            table.push_image(name, &[d]);
        }
        Ok(table)
    }

    /// Pixel size of every image, with the scale-bar reading when one was
    /// measured.
    pub fn check_calibration(&self) -> Result<MeasurementTable> {
        let mut table = MeasurementTable::new(
            "calibration",
            &["pixel_size_um", "scale_bar_label", "scale_bar_pixels"],
        );
        let rows = self.each_image("calibration", |name| {
            self.calibrator.calibrate(name, &self.images.path(name, ""))
        })?;
        for (name, cal) in rows {
            let bar = cal.scale_bar.as_ref();
            table.push_image(
                name,
                &[
                    vec![Some(cal.pixel_size_um)],
                    vec![bar.map(|b| b.label_value)],
                    vec![bar.map(|b| b.bar_pixels as f64)],
                ],
            );
        }
        Ok(table)
    }

    fn each_image<'s, T>(
        &'s self,
        stage: &str,
        mut f: impl FnMut(&str) -> Result<T>,
    ) -> Result<Vec<(&'s str, T)>> {
        tracing::info!("{}: {} images", stage, self.images.names.len());
        let mut out = Vec::with_capacity(self.images.names.len());
        for name in &self.images.names {
            match f(name) {
                Ok(v) => {
                    tracing::debug!("{}: {} done", stage, name);
                    out.push((name.as_str(), v));
                }
                Err(e) => tracing::warn!("{}: skipping {}: {}", stage, name, e),
            }
        }
        if out.is_empty() {
            return Err(MeasureError::EmptyBatch);
        }
        tracing::info!("{}: {}/{} images measured", stage, out.len(), self.images.names.len());
        Ok(out)
    }

    fn path(&self, name: &str, suffix: &str) -> PathBuf {
        self.images.path(name, suffix)
    }

    fn gray(&self, path: &Path) -> Result<GrayImage> {
        let gray = open_image(path)?.to_luma8();
        crop_data_bar(&gray, self.config.data_bar_top)
    }

    fn edges(&self, name: &str) -> Result<GrayImage> {
        load_edges(&self.path(name, ""), self.config.data_bar_top, &self.config.edges)
    }

    fn line(&self, name: &str, suffix: &str) -> Result<GrayImage> {
        load_drawn_line(
            &self.path(name, suffix),
            self.config.line_color,
            self.config.data_bar_top,
        )
    }

    fn pixel_size_um(&self, name: &str) -> Result<f64> {
        self.calibrator.pixel_size_um(name, &self.path(name, ""))
    }

    fn finger_angles(&self, name: &str) -> Result<Vec<f64>> {
        let gray = self.gray(&self.path(name, ""))?;
        let angles = finger_orientations(&gray, &self.config.edges, &self.config.finger_lines);
        Ok(self.config.window.filter(&angles))
    }

    /// Mean orientation of the drawn line.
    fn alpha(&self, name: &str, suffix: &str) -> Result<f64> {
        let rgb = open_image(&self.path(name, suffix))?.to_rgb8();
        let rgb = crop_data_bar(&rgb, self.config.data_bar_top)?;
        let angles =
            drawn_line_orientations(&rgb, self.config.line_color, &self.config.reference_lines);
        mean_angle(&angles).ok_or(MeasureError::NoLines)
    }

    /// Mean windowed finger orientation.
    fn beta(&self, name: &str) -> Result<f64> {
        mean_angle(&self.finger_angles(name)?).ok_or(MeasureError::NoLines)
    }
}

fn column(values: Vec<f64>) -> Vec<Option<f64>> {
    values.into_iter().map(Some).collect()
}
