//! Rim heights and side profiles from AFM line profiles.
//!
//! Profiles are exported as text from the AFM viewer: three header lines, then
//! two whitespace-separated columns holding position and height in metres.
//! Heights are referenced to the exposed substrate inside the finger, whose
//! average height comes from a separate statistics export.
//!
//! Per profile number `k` a directory holds:
//!
//! | file | content |
//! |---|---|
//! | `flat_k_stat.txt` | statistics of the finger region (average height) |
//! | `corner_k.txt` | profile along the retraction direction, across the corner |
//! | `root1_k.txt`, `root2_k.txt` | profiles across the two roots |
//! | `side1_k.txt`, `side2_k.txt` | profiles along the rim of each side, corner to root |

use std::path::{Path, PathBuf};

use crate::error::{MeasureError, Result};
use crate::table::MeasurementTable;

const PROFILE_HEADER_LINES: usize = 3;
const STAT_LINE_INDEX: usize = 6;
const STAT_AVERAGE_FIELD: usize = 13;

/// A height profile: position in micrometres, height in nanometres.
#[derive(Debug, Clone, PartialEq, Default, serde::Serialize, serde::Deserialize)]
pub struct Profile {
    pub x_um: Vec<f64>,
    pub height_nm: Vec<f64>,
}

impl Profile {
    /// Parse a profile export (metres in, µm / nm out).
    pub fn parse(text: &str) -> Result<Self> {
        let mut profile = Self::default();
        for (idx, line) in text.lines().enumerate().skip(PROFILE_HEADER_LINES) {
            let mut fields = line.split_whitespace();
            let (Some(x), Some(y)) = (fields.next(), fields.next()) else {
                if line.trim().is_empty() {
                    continue;
                }
                return Err(MeasureError::parse(
                    format!("profile line {}", idx + 1),
                    "expected two columns",
                ));
            };
            let x: f64 = x
                .parse()
                .map_err(|e| MeasureError::parse(format!("profile line {}", idx + 1), e))?;
            let y: f64 = y
                .parse()
                .map_err(|e| MeasureError::parse(format!("profile line {}", idx + 1), e))?;
            profile.x_um.push(x * 1e6);
            profile.height_nm.push(y * 1e9);
        }
        Ok(profile)
    }

    pub fn from_file(path: &Path) -> Result<Self> {
        Self::parse(&std::fs::read_to_string(path)?)
    }

    pub fn len(&self) -> usize {
        self.height_nm.len()
    }

    pub fn is_empty(&self) -> bool {
        self.height_nm.is_empty()
    }

    /// Heights with `offset_nm` subtracted.
    pub fn shifted(&self, offset_nm: f64) -> Self {
        Self {
            x_um: self.x_um.clone(),
            height_nm: self.height_nm.iter().map(|h| h - offset_nm).collect(),
        }
    }

    /// Maximum height: the rim height once referenced to the substrate.
    pub fn rim_height(&self) -> Result<f64> {
        self.height_nm
            .iter()
            .copied()
            .reduce(f64::max)
            .ok_or(MeasureError::EmptyProfile)
    }

    /// Index of the first sample whose height is closest to `target_nm`.
    fn closest_index(&self, target_nm: f64) -> Option<usize> {
        let mut best: Option<(usize, f64)> = None;
        for (i, h) in self.height_nm.iter().enumerate() {
            let d = (h - target_nm).abs();
            if best.map_or(true, |(_, bd)| d < bd) {
                best = Some((i, d));
            }
        }
        best.map(|(i, _)| i)
    }
}

/// Average height of the finger region from a statistics export.
///
/// The value is the 14th space-separated field (runs of spaces produce empty
/// fields) on the seventh line.
pub fn parse_average_height(text: &str) -> Result<f64> {
    let line = text
        .lines()
        .nth(STAT_LINE_INDEX)
        .ok_or_else(|| MeasureError::MissingField("average height line".to_string()))?;
    let field = line
        .split(' ')
        .nth(STAT_AVERAGE_FIELD)
        .ok_or_else(|| MeasureError::MissingField("average height value".to_string()))?;
    field
        .trim()
        .parse()
        .map_err(|e| MeasureError::parse(format!("average height '{}'", field), e))
}

pub fn read_average_height(path: &Path) -> Result<f64> {
    parse_average_height(&std::fs::read_to_string(path)?)
}

/// A side profile cropped from the corner to the root.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SideAnalysis {
    /// Side length (µm): the last position of the cropped profile.
    pub length_um: f64,
    /// Slope of the straight corner-to-root simplification, in nm/µm / 1000.
    pub slope_rad: f64,
    /// Cropped profile with `x` starting at the corner.
    pub cropped: Profile,
}

/// Crop `side` between the samples closest to the corner and root rim
/// heights and derive its length and slope.
pub fn analyze_side(side: &Profile, rim_corner_nm: f64, rim_root_nm: f64) -> Result<SideAnalysis> {
    let start = side.closest_index(rim_corner_nm).ok_or(MeasureError::EmptyProfile)?;
    let end = side.closest_index(rim_root_nm).ok_or(MeasureError::EmptyProfile)? + 1;
    if end <= start + 1 {
        return Err(MeasureError::DegenerateProfile(format!(
            "root sample {} does not follow corner sample {}",
            end - 1,
            start
        )));
    }

    let x0 = side.x_um[start];
    let cropped = Profile {
        x_um: side.x_um[start..end].iter().map(|x| x - x0).collect(),
        height_nm: side.height_nm[start..end].to_vec(),
    };
    let length_um = cropped.x_um[cropped.len() - 1];
    if length_um == 0.0 || !length_um.is_finite() {
        return Err(MeasureError::DegenerateProfile(
            "zero side length".to_string(),
        ));
    }
    let rise = cropped.height_nm[cropped.len() - 1] - cropped.height_nm[0];
    let slope = rise / length_um;

    Ok(SideAnalysis {
        length_um,
        slope_rad: slope / 1000.0,
        cropped,
    })
}

/// File set for one profile number.
#[derive(Debug, Clone)]
pub struct ProfileSet {
    dir: PathBuf,
    number: usize,
}

impl ProfileSet {
    pub fn new(dir: impl Into<PathBuf>, number: usize) -> Self {
        Self {
            dir: dir.into(),
            number,
        }
    }

    fn file(&self, stem: &str) -> PathBuf {
        self.dir.join(format!("{}_{}.txt", stem, self.number))
    }

    pub fn flat_stat(&self) -> PathBuf {
        self.dir.join(format!("flat_{}_stat.txt", self.number))
    }

    pub fn corner(&self) -> PathBuf {
        self.file("corner")
    }

    /// `root1` or `root2`.
    pub fn root(&self, side: u8) -> PathBuf {
        self.file(&format!("root{}", side))
    }

    /// `side1` or `side2`.
    pub fn side(&self, side: u8) -> PathBuf {
        self.file(&format!("side{}", side))
    }
}

/// Rim geometry of one profile number.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct RimSummary {
    pub profile: usize,
    /// Rim height at the corner (nm).
    pub rc_nm: f64,
    /// Rim height at root 1 (nm).
    pub rm1_nm: f64,
    /// Rim height at root 2 (nm).
    pub rm2_nm: f64,
    /// Length of side 1 (µm).
    pub m1_um: f64,
    /// Length of side 2 (µm).
    pub m2_um: f64,
    /// Slope of side 1 (rad).
    pub q1_rad: f64,
    /// Slope of side 2 (rad).
    pub q2_rad: f64,
}

impl RimSummary {
    pub const COLUMNS: [&'static str; 8] = [
        "profile_number",
        "rc (nm)",
        "rm_1 (nm)",
        "rm_2 (nm)",
        "m_1 (µm)",
        "m_2 (µm)",
        "q_1 (rad)",
        "q_2 (rad)",
    ];

    pub fn values(&self) -> [f64; 8] {
        [
            self.profile as f64,
            self.rc_nm,
            self.rm1_nm,
            self.rm2_nm,
            self.m1_um,
            self.m2_um,
            self.q1_rad,
            self.q2_rad,
        ]
    }
}

/// Rim heights, side lengths and slopes for profile number `number` in `dir`.
pub fn analyze_profile_set(dir: &Path, number: usize) -> Result<RimSummary> {
    let set = ProfileSet::new(dir, number);
    let flat = read_average_height(&set.flat_stat())?;

    let rc = Profile::from_file(&set.corner())?.shifted(flat).rim_height()?;
    let rm1 = Profile::from_file(&set.root(1))?.shifted(flat).rim_height()?;
    let rm2 = Profile::from_file(&set.root(2))?.shifted(flat).rim_height()?;

    let side1 = analyze_side(&Profile::from_file(&set.side(1))?.shifted(flat), rc, rm1)?;
    let side2 = analyze_side(&Profile::from_file(&set.side(2))?.shifted(flat), rc, rm2)?;

    tracing::debug!(
        "profile {}: rc={:.2} nm, rm1={:.2} nm, rm2={:.2} nm",
        number,
        rc,
        rm1,
        rm2
    );

    Ok(RimSummary {
        profile: number,
        rc_nm: rc,
        rm1_nm: rm1,
        rm2_nm: rm2,
        m1_um: side1.length_um,
        m2_um: side2.length_um,
        q1_rad: side1.slope_rad,
        q2_rad: side2.slope_rad,
    })
}

/// [`analyze_profile_set`] for profile numbers `1..=count`.
pub fn analyze_profile_sets(dir: &Path, count: usize) -> Result<Vec<RimSummary>> {
    let out = (1..=count)
        .map(|k| analyze_profile_set(dir, k))
        .collect::<Result<Vec<_>>>()?;
    tracing::info!("analyzed {} AFM profile sets", out.len());
    Ok(out)
}

/// One row per profile set, keyed `profile_{k}`.
pub fn rim_table(summaries: &[RimSummary]) -> MeasurementTable {
    let mut table = MeasurementTable::new("afm_rim", &RimSummary::COLUMNS[1..]);
    for s in summaries {
        let values = s.values();
        let columns: Vec<Vec<Option<f64>>> = values[1..].iter().map(|&v| vec![Some(v)]).collect();
        table.push_image(&format!("profile_{}", s.profile), &columns);
    }
    table
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    fn profile_text(points: &[(f64, f64)]) -> String {
        let mut s = String::from("Profile\nx y\n[m] [m]\n");
        for (x, y) in points {
            s.push_str(&format!("{:e}  {:e}\n", x, y));
        }
        s
    }

    fn stat_text(avg_nm: f64) -> String {
        let mut s = String::new();
        for i in 0..6 {
            s.push_str(&format!("header line {}\n", i));
        }
        // 13 separators before the value; runs of spaces count as fields.
        s.push_str(&format!("Average{}{} nm\n", " ".repeat(13), avg_nm));
        s
    }

    #[test]
    fn profile_converts_units() {
        let p = Profile::parse(&profile_text(&[(0.0, 1e-9), (1e-6, 2.5e-8)])).expect("parse");
        assert_eq!(p.len(), 2);
        assert_relative_eq!(p.x_um[1], 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.height_nm[0], 1.0, epsilon = 1e-9);
        assert_relative_eq!(p.height_nm[1], 25.0, epsilon = 1e-9);
    }

    #[test]
    fn profile_rejects_single_column() {
        let text = "a\nb\nc\n1.0  2.0\n3.0\n";
        assert!(matches!(
            Profile::parse(text),
            Err(MeasureError::Parse { .. })
        ));
    }

    #[test]
    fn stat_field_thirteen_is_average() {
        assert_relative_eq!(parse_average_height(&stat_text(4.25)).expect("avg"), 4.25);
        assert!(parse_average_height("too\nshort\n").is_err());
    }

    #[test]
    fn rim_height_after_shift() {
        let p = Profile {
            x_um: vec![0.0, 1.0, 2.0],
            height_nm: vec![10.0, 60.0, 30.0],
        };
        assert_relative_eq!(p.shifted(10.0).rim_height().expect("rim"), 50.0);
        assert!(matches!(
            Profile::default().rim_height(),
            Err(MeasureError::EmptyProfile)
        ));
    }

    #[test]
    fn side_crop_between_corner_and_root() {
        let side = Profile {
            x_um: vec![0.0, 0.5, 1.0, 1.5, 2.0, 2.5],
            height_nm: vec![5.0, 80.0, 70.0, 60.0, 50.0, 3.0],
        };
        let a = analyze_side(&side, 81.0, 49.0).expect("side");
        assert_eq!(a.cropped.len(), 4);
        assert_relative_eq!(a.length_um, 1.5);
        assert_relative_eq!(a.slope_rad, -20.0 / 1000.0);
        assert_relative_eq!(a.cropped.height_nm[0], 80.0);
        assert_relative_eq!(a.cropped.height_nm[3], 50.0);
    }

    #[test]
    fn side_with_root_before_corner_is_degenerate() {
        let side = Profile {
            x_um: vec![0.0, 1.0, 2.0],
            height_nm: vec![50.0, 70.0, 80.0],
        };
        assert!(matches!(
            analyze_side(&side, 80.0, 50.0),
            Err(MeasureError::DegenerateProfile(_))
        ));
    }

    #[test]
    fn profile_set_summary_from_files() {
        let dir = tempfile::tempdir().expect("tempdir");
        let write = |name: &str, body: String| {
            std::fs::write(dir.path().join(name), body).expect("write");
        };
        write("flat_1_stat.txt", stat_text(2.0));
        write(
            "corner_1.txt",
            profile_text(&[(0.0, 2e-9), (1e-6, 92e-9), (2e-6, 10e-9)]),
        );
        write(
            "root1_1.txt",
            profile_text(&[(0.0, 2e-9), (1e-6, 42e-9), (2e-6, 2e-9)]),
        );
        write(
            "root2_1.txt",
            profile_text(&[(0.0, 2e-9), (1e-6, 32e-9), (2e-6, 2e-9)]),
        );
        write(
            "side1_1.txt",
            profile_text(&[(0.0, 2e-9), (1e-6, 92e-9), (3e-6, 62e-9), (5e-6, 42e-9), (6e-6, 2e-9)]),
        );
        write(
            "side2_1.txt",
            profile_text(&[(0.0, 92e-9), (2e-6, 32e-9), (3e-6, 2e-9)]),
        );

        let s = analyze_profile_set(dir.path(), 1).expect("summary");
        assert_eq!(s.profile, 1);
        assert_relative_eq!(s.rc_nm, 90.0, epsilon = 1e-6);
        assert_relative_eq!(s.rm1_nm, 40.0, epsilon = 1e-6);
        assert_relative_eq!(s.rm2_nm, 30.0, epsilon = 1e-6);
        assert_relative_eq!(s.m1_um, 4.0, epsilon = 1e-6);
        assert_relative_eq!(s.q1_rad, -50.0 / 4.0 / 1000.0, epsilon = 1e-9);
        assert_relative_eq!(s.m2_um, 2.0, epsilon = 1e-6);
        assert_relative_eq!(s.q2_rad, -60.0 / 2.0 / 1000.0, epsilon = 1e-9);

        let all = analyze_profile_sets(dir.path(), 1).expect("all");
        assert_eq!(all, vec![s.clone()]);
        assert!(analyze_profile_sets(dir.path(), 2).is_err());

        let table = rim_table(&all);
        assert_eq!(table.columns.len(), 7);
        assert_eq!(table.images(), vec!["profile_1"]);
        assert_eq!(table.rows[0].values[0], Some(s.rc_nm));
    }
}
