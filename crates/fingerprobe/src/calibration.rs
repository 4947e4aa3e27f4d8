//! Pixel-size calibration.
//!
//! SEM exports carry a data bar below the micrograph with a "Pixel Size"
//! readout and a scale bar with a number above it. Reading those characters
//! is left to an external OCR pass; this module parses the text it produces,
//! measures the scale bar length in pixels, and resolves a pixel size in
//! micrometres for each image of a batch.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use image::GrayImage;
use regex::Regex;

use crate::edges::open_image;
use crate::error::{MeasureError, Result};

/// Length unit of a data-bar readout.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LengthUnit {
    Nanometre,
    Micrometre,
}

impl LengthUnit {
    /// Unit from the SI prefix preceding `m` (`n`, `u`, `µ`).
    pub fn from_prefix(prefix: char) -> Option<Self> {
        match prefix {
            'n' => Some(Self::Nanometre),
            'u' | 'µ' | 'μ' => Some(Self::Micrometre),
            _ => None,
        }
    }

    fn per_micrometre(self) -> f64 {
        match self {
            Self::Nanometre => 1e-3,
            Self::Micrometre => 1.0,
        }
    }
}

/// A pixel size as read from the instrument.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct PixelSize {
    pub value: f64,
    pub unit: LengthUnit,
}

impl PixelSize {
    pub fn to_micrometres(self) -> f64 {
        self.value * self.unit.per_micrometre()
    }
}

const PIXEL_SIZE_KEY: &str = "pixelsize";

/// Parse the "Pixel Size" readout from OCR text of the data bar.
///
/// Whitespace is dropped and the text lowercased. The value sits between
/// `pixelsize` plus one separator character and the unit prefix, which is the
/// character right before the first `m` after the key.
pub fn parse_data_bar_text(text: &str) -> Result<PixelSize> {
    let compact: Vec<char> = text
        .chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_lowercase)
        .collect();
    let key: Vec<char> = PIXEL_SIZE_KEY.chars().collect();
    let start = compact
        .windows(key.len())
        .position(|w| w == key.as_slice())
        .ok_or_else(|| MeasureError::MissingField("pixel size".to_string()))?;

    let m_idx = compact[start..]
        .iter()
        .position(|&c| c == 'm')
        .map(|i| start + i)
        .ok_or_else(|| MeasureError::MissingField("pixel size unit".to_string()))?;

    let value_start = start + key.len() + 1;
    if m_idx < value_start + 2 {
        return Err(MeasureError::parse(
            "pixel size",
            "no value between key and unit",
        ));
    }
    let prefix = compact[m_idx - 1];
    let unit = LengthUnit::from_prefix(prefix)
        .ok_or_else(|| MeasureError::parse("pixel size unit", format!("prefix '{}'", prefix)))?;
    let number: String = compact[value_start..m_idx - 1].iter().collect();
    let value = number
        .parse::<f64>()
        .map_err(|e| MeasureError::parse(format!("pixel size '{}'", number), e))?;
    Ok(PixelSize { value, unit })
}

/// First run of digits in OCR text of the scale-bar label.
pub fn parse_scale_bar_label(text: &str) -> Result<u32> {
    let re = Regex::new(r"\d+").map_err(|e| MeasureError::parse("digit pattern", e))?;
    let digits = re
        .find(text)
        .ok_or_else(|| MeasureError::MissingField("scale bar label".to_string()))?;
    digits
        .as_str()
        .parse::<u32>()
        .map_err(|e| MeasureError::parse("scale bar label", e))
}

/// Where to look for the scale bar and how to trim its end caps.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct ScaleBarConfig {
    /// Region of interest `[x_min, x_max, y_min, y_max]` (max exclusive).
    pub roi: [u32; 4],
    /// Width in pixels of each end-cap edge.
    pub edge_width: u32,
    /// Stroke width of the bar ends.
    pub stroke_width: u32,
    pub canny_low: f32,
    pub canny_high: f32,
}

impl Default for ScaleBarConfig {
    fn default() -> Self {
        Self {
            roi: [5, 190, 730, 760],
            edge_width: 1,
            stroke_width: 1,
            canny_low: 125.0,
            canny_high: 255.0,
        }
    }
}

/// Length of the scale bar in pixels.
///
/// The longest horizontal run of edge pixels inside the ROI spans the bar
/// including its end caps; `2 * edge_width + stroke_width` is removed.
pub fn measure_scale_bar_pixels(gray: &GrayImage, config: &ScaleBarConfig) -> Result<u32> {
    let [x_min, x_max, y_min, y_max] = config.roi;
    let (w, h) = gray.dimensions();
    let (x_max, y_max) = (x_max.min(w), y_max.min(h));
    if x_min >= x_max || y_min >= y_max {
        return Err(MeasureError::EmptyImage);
    }
    let roi = image::imageops::crop_imm(gray, x_min, y_min, x_max - x_min, y_max - y_min)
        .to_image();
    let edges = imageproc::edges::canny(&roi, config.canny_low, config.canny_high);

    let span = longest_row_run(&edges)
        .ok_or_else(|| MeasureError::MissingField("scale bar".to_string()))?;
    let trim = 2 * config.edge_width + config.stroke_width;
    let pixels = span
        .checked_sub(trim)
        .filter(|&p| p > 0)
        .ok_or_else(|| MeasureError::MissingField("scale bar".to_string()))?;
    tracing::debug!("scale bar span {} px, {} px after trim", span, pixels);
    Ok(pixels)
}

/// `x2 - x1` of the longest horizontal run of set pixels over all rows.
fn longest_row_run(mask: &GrayImage) -> Option<u32> {
    let (w, h) = mask.dimensions();
    let mut best: Option<u32> = None;
    for y in 0..h {
        let mut run_start: Option<u32> = None;
        for x in 0..=w {
            let set = x < w && mask.get_pixel(x, y)[0] != 0;
            match (set, run_start) {
                (true, None) => run_start = Some(x),
                (false, Some(x1)) => {
                    let span = x - 1 - x1;
                    if best.map_or(true, |b| span > b) {
                        best = Some(span);
                    }
                    run_start = None;
                }
                _ => {}
            }
        }
    }
    best
}

/// Scale bar reading: the label value and the bar length in pixels.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScaleBar {
    pub label_value: f64,
    pub bar_pixels: u32,
}

impl ScaleBar {
    /// Pixel size in the unit of the label.
    pub fn pixel_size(&self) -> f64 {
        self.label_value / self.bar_pixels as f64
    }
}

/// How a batch obtains the pixel size of each image.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CalibrationSource {
    /// Same pixel size for every image.
    Fixed { pixel_size_um: f64 },
    /// Measure the scale bar of every image; the label value is known.
    ScaleBar {
        label_um: f64,
        #[serde(default)]
        bar: ScaleBarConfig,
    },
    /// JSON object mapping image name to its OCR'd data-bar text.
    DataBarTable { path: PathBuf },
    /// JSON object mapping image name to its OCR'd scale-bar label, in
    /// micrometres; the bar itself is measured on every image.
    ScaleBarLabelTable {
        path: PathBuf,
        #[serde(default)]
        bar: ScaleBarConfig,
    },
}

impl Default for CalibrationSource {
    fn default() -> Self {
        Self::Fixed { pixel_size_um: 1.0 }
    }
}

impl CalibrationSource {
    /// Load whatever the source needs up front.
    pub fn load(&self) -> Result<Calibrator> {
        Ok(match self {
            Self::Fixed { pixel_size_um } => Calibrator::Fixed(*pixel_size_um),
            Self::ScaleBar { label_um, bar } => Calibrator::ScaleBar {
                label_um: *label_um,
                bar: *bar,
            },
            Self::DataBarTable { path } => Calibrator::DataBar(read_text_table(path)?),
            Self::ScaleBarLabelTable { path, bar } => Calibrator::ScaleBarLabels {
                labels: read_text_table(path)?,
                bar: *bar,
            },
        })
    }
}

fn read_text_table(path: &Path) -> Result<HashMap<String, String>> {
    let data = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&data)?)
}

/// Per-image calibration outcome.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Calibration {
    pub pixel_size_um: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scale_bar: Option<ScaleBar>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub readout: Option<PixelSize>,
}

/// A loaded [`CalibrationSource`].
#[derive(Debug, Clone)]
pub enum Calibrator {
    Fixed(f64),
    ScaleBar { label_um: f64, bar: ScaleBarConfig },
    DataBar(HashMap<String, String>),
    ScaleBarLabels {
        labels: HashMap<String, String>,
        bar: ScaleBarConfig,
    },
}

impl Calibrator {
    /// Calibrate the image `name` stored at `image_path` (full frame,
    /// data bar included).
    pub fn calibrate(&self, name: &str, image_path: &Path) -> Result<Calibration> {
        match self {
            Self::Fixed(px) => Ok(Calibration {
                pixel_size_um: *px,
                scale_bar: None,
                readout: None,
            }),
            Self::ScaleBar { label_um, bar } => scale_bar_calibration(*label_um, bar, image_path),
            Self::ScaleBarLabels { labels, bar } => {
                let text = labels
                    .get(name)
                    .ok_or_else(|| MeasureError::MissingField(format!("scale bar label for {}", name)))?;
                let label_um = parse_scale_bar_label(text)? as f64;
                scale_bar_calibration(label_um, bar, image_path)
            }
            Self::DataBar(texts) => {
                let text = texts
                    .get(name)
                    .ok_or_else(|| MeasureError::MissingField(format!("data bar text for {}", name)))?;
                let readout = parse_data_bar_text(text)?;
                Ok(Calibration {
                    pixel_size_um: readout.to_micrometres(),
                    scale_bar: None,
                    readout: Some(readout),
                })
            }
        }
    }

    /// Pixel size in micrometres for one image.
    pub fn pixel_size_um(&self, name: &str, image_path: &Path) -> Result<f64> {
        self.calibrate(name, image_path).map(|c| c.pixel_size_um)
    }
}

fn scale_bar_calibration(label_um: f64, bar: &ScaleBarConfig, image_path: &Path) -> Result<Calibration> {
    let gray = open_image(image_path)?.to_luma8();
    let scale_bar = ScaleBar {
        label_value: label_um,
        bar_pixels: measure_scale_bar_pixels(&gray, bar)?,
    };
    Ok(Calibration {
        pixel_size_um: scale_bar.pixel_size(),
        scale_bar: Some(scale_bar),
        readout: None,
    })
}
