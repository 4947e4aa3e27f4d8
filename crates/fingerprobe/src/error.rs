//! Error type shared by all measurement stages.

use std::path::PathBuf;

/// Errors that can occur while loading inputs or deriving measurements.
#[derive(Debug)]
pub enum MeasureError {
    /// Filesystem failure.
    Io(std::io::Error),
    /// Image could not be opened or decoded.
    Image {
        /// Offending file.
        path: PathBuf,
        /// Decoder error.
        source: image::ImageError,
    },
    /// JSON (de)serialization failure.
    Json(serde_json::Error),
    /// Invalid glob pattern for image listing.
    Pattern(glob::PatternError),
    /// Two masks that must overlap pixel-for-pixel have different sizes.
    DimensionMismatch {
        /// Size of the first mask (width, height).
        left: (u32, u32),
        /// Size of the second mask (width, height).
        right: (u32, u32),
    },
    /// Cropping or loading produced an image with no pixels.
    EmptyImage,
    /// Paired centroid lists are too short to be matched index by index.
    CountMismatch {
        /// Number of reference points.
        expected: usize,
        /// Number of points available for pairing.
        got: usize,
    },
    /// The projection factor `sin(|alpha| + |beta|)` is zero or not finite.
    DegenerateProjection {
        /// Reference line orientation (degrees).
        alpha_deg: f64,
        /// Finger orientation (degrees).
        beta_deg: f64,
    },
    /// No usable angle survived detection and windowing.
    NoLines,
    /// A required field was not found in a text source.
    MissingField(String),
    /// A text value could not be parsed.
    Parse {
        /// What was being parsed.
        context: String,
        /// Parser message.
        message: String,
    },
    /// An AFM profile has no samples.
    EmptyProfile,
    /// An AFM side profile cannot be cropped between corner and root.
    DegenerateProfile(String),
    /// Every image in a batch failed.
    EmptyBatch,
}

impl std::fmt::Display for MeasureError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Io(e) => write!(f, "i/o error: {}", e),
            Self::Image { path, source } => {
                write!(f, "failed to open image {}: {}", path.display(), source)
            }
            Self::Json(e) => write!(f, "json error: {}", e),
            Self::Pattern(e) => write!(f, "invalid glob pattern: {}", e),
            Self::DimensionMismatch { left, right } => write!(
                f,
                "mask sizes differ: {}x{} vs {}x{}",
                left.0, left.1, right.0, right.1
            ),
            Self::EmptyImage => write!(f, "image has no pixels"),
            Self::CountMismatch { expected, got } => write!(
                f,
                "cannot pair points: need at least {}, got {}",
                expected, got
            ),
            Self::DegenerateProjection {
                alpha_deg,
                beta_deg,
            } => write!(
                f,
                "degenerate projection for alpha={} deg, beta={} deg",
                alpha_deg, beta_deg
            ),
            Self::NoLines => write!(f, "no lines detected"),
            Self::MissingField(what) => write!(f, "missing field: {}", what),
            Self::Parse { context, message } => {
                write!(f, "failed to parse {}: {}", context, message)
            }
            Self::EmptyProfile => write!(f, "profile has no samples"),
            Self::DegenerateProfile(why) => write!(f, "degenerate side profile: {}", why),
            Self::EmptyBatch => write!(f, "no image in the batch produced a measurement"),
        }
    }
}

impl std::error::Error for MeasureError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Io(e) => Some(e),
            Self::Image { source, .. } => Some(source),
            Self::Json(e) => Some(e),
            Self::Pattern(e) => Some(e),
            _ => None,
        }
    }
}

impl From<std::io::Error> for MeasureError {
    fn from(e: std::io::Error) -> Self {
        Self::Io(e)
    }
}

impl From<serde_json::Error> for MeasureError {
    fn from(e: serde_json::Error) -> Self {
        Self::Json(e)
    }
}

impl From<glob::PatternError> for MeasureError {
    fn from(e: glob::PatternError) -> Self {
        Self::Pattern(e)
    }
}

impl MeasureError {
    pub(crate) fn parse(context: impl Into<String>, message: impl ToString) -> Self {
        Self::Parse {
            context: context.into(),
            message: message.to_string(),
        }
    }
}

/// Result alias used across the crate.
pub type Result<T> = std::result::Result<T, MeasureError>;
