//! Run configuration shared by the batch runs and the CLI.

use std::path::Path;

use crate::calibration::CalibrationSource;
use crate::crossing::CrossingOrder;
use crate::drawn_line::LineColor;
use crate::edges::{EdgeConfig, DEFAULT_DATA_BAR_TOP};
use crate::error::Result;
use crate::orientation::{AngleWindow, HoughLineDetector};

/// Every tunable of a measurement run. Missing JSON fields take defaults.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct MeasureConfig {
    /// First row of the SEM data bar; rows from here down are cropped.
    pub data_bar_top: u32,
    pub edges: EdgeConfig,
    /// Line detector on finger edges (propagation direction).
    pub finger_lines: HoughLineDetector,
    /// Line detector on drawn reference lines.
    pub reference_lines: HoughLineDetector,
    /// Accepted finger orientations.
    pub window: AngleWindow,
    pub line_color: LineColor,
    pub order: CrossingOrder,
    /// Digits of the image number in numbered image names.
    pub zeropad: usize,
    pub calibration: CalibrationSource,
}

impl Default for MeasureConfig {
    fn default() -> Self {
        Self {
            data_bar_top: DEFAULT_DATA_BAR_TOP,
            edges: EdgeConfig::default(),
            finger_lines: HoughLineDetector::default(),
            reference_lines: HoughLineDetector {
                vote_threshold: 50,
                ..HoughLineDetector::default()
            },
            window: AngleWindow::default(),
            line_color: LineColor::Red,
            order: CrossingOrder::Ascending,
            zeropad: 3,
            calibration: CalibrationSource::default(),
        }
    }
}

impl MeasureConfig {
    /// Load from a JSON file.
    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn partial_json_keeps_defaults() {
        let cfg: MeasureConfig = serde_json::from_str(
            r#"{
                "data_bar_top": 512,
                "edges": { "canny_high": 120.0 },
                "calibration": { "kind": "fixed", "pixel_size_um": 0.05 }
            }"#,
        )
        .expect("parse");
        assert_eq!(cfg.data_bar_top, 512);
        assert_eq!(cfg.edges.canny_high, 120.0);
        assert_eq!(cfg.edges.blur_sigma, EdgeConfig::default().blur_sigma);
        assert_eq!(cfg.zeropad, 3);
        assert_eq!(
            cfg.calibration,
            CalibrationSource::Fixed {
                pixel_size_um: 0.05
            }
        );
    }

    #[test]
    fn scale_bar_source_from_json() {
        let cfg: MeasureConfig = serde_json::from_str(
            r#"{ "calibration": { "kind": "scale_bar", "label_um": 2.0 } }"#,
        )
        .expect("parse");
        match cfg.calibration {
            CalibrationSource::ScaleBar { label_um, bar } => {
                assert_eq!(label_um, 2.0);
                assert_eq!(bar.roi, [5, 190, 730, 760]);
            }
            other => panic!("unexpected source {:?}", other),
        }
    }

    #[test]
    fn from_json_file_round_trip() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        let cfg = MeasureConfig {
            line_color: LineColor::Black,
            order: CrossingOrder::Descending,
            ..MeasureConfig::default()
        };
        std::fs::write(&path, serde_json::to_string(&cfg).expect("ser")).expect("write");
        assert_eq!(MeasureConfig::from_json_file(&path).expect("load"), cfg);
        assert!(MeasureConfig::from_json_file(&dir.path().join("missing.json")).is_err());
    }
}
