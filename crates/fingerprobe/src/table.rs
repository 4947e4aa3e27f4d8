//! Measurement tables keyed by image name, persisted as JSON.

use std::path::{Path, PathBuf};

use crate::error::{MeasureError, Result};
use crate::stats::Summary;

/// One row: the `index`-th value set measured on `image`.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TableRow {
    pub image: String,
    pub index: usize,
    pub values: Vec<Option<f64>>,
}

/// Rows from one or more images sharing the same columns.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MeasurementTable {
    pub name: String,
    pub columns: Vec<String>,
    pub rows: Vec<TableRow>,
}

impl MeasurementTable {
    pub fn new(name: impl Into<String>, columns: &[&str]) -> Self {
        Self {
            name: name.into(),
            columns: columns.iter().map(|c| c.to_string()).collect(),
            rows: Vec::new(),
        }
    }

    /// Append the columns of one image side by side.
    ///
    /// Shorter columns are padded with `None`.
    pub fn push_image(&mut self, image: &str, columns: &[Vec<Option<f64>>]) {
        debug_assert_eq!(columns.len(), self.columns.len());
        let n = columns.iter().map(Vec::len).max().unwrap_or(0);
        for index in 0..n {
            let values = columns
                .iter()
                .map(|col| col.get(index).copied().flatten())
                .collect();
            self.rows.push(TableRow {
                image: image.to_string(),
                index,
                values,
            });
        }
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Distinct image names in row order.
    pub fn images(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for row in &self.rows {
            if out.last() != Some(&row.image.as_str()) {
                out.push(&row.image);
            }
        }
        out
    }

    /// All values of column `idx`.
    pub fn column_values(&self, idx: usize) -> impl Iterator<Item = Option<f64>> + '_ {
        self.rows
            .iter()
            .map(move |r| r.values.get(idx).copied().flatten())
    }

    /// Index of the column named `name`.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c == name)
    }

    pub fn summary(&self, idx: usize) -> Option<Summary> {
        Summary::of(self.column_values(idx))
    }

    /// Write `dir/stem.json`, creating `dir` when missing.
    pub fn write_json(&self, dir: &Path, stem: &str) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)?;
        let path = dir.join(format!("{}.json", stem));
        std::fs::write(&path, serde_json::to_string_pretty(self)?)?;
        tracing::info!("{} rows written to {}", self.rows.len(), path.display());
        Ok(path)
    }

    pub fn from_json_file(path: &Path) -> Result<Self> {
        let data = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&data)?)
    }
}

/// Write the parameters of a run next to its table as `dir/stem_variables.json`.
pub fn write_run_parameters<T: serde::Serialize>(
    dir: &Path,
    stem: &str,
    params: &T,
) -> Result<PathBuf> {
    std::fs::create_dir_all(dir)?;
    let path = dir.join(format!("{}_variables.json", stem));
    std::fs::write(&path, serde_json::to_string_pretty(params)?)?;
    Ok(path)
}

/// `"{h}nm_{alpha}deg_{t}h_{label}"`: file stem shared by the tables of one run.
pub fn output_stem(thickness_nm: f64, edge_deg: f64, anneal_h: f64, label: &str) -> String {
    format!("{}nm_{}deg_{}h_{}", thickness_nm, edge_deg, anneal_h, label)
}

/// Sample naming used for result files: film thickness (nm), initial edge
/// orientation (deg), annealing time (h), and a free label.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct SampleTag {
    pub thickness_nm: f64,
    pub edge_deg: f64,
    pub anneal_h: f64,
    pub label: String,
}

impl Default for SampleTag {
    fn default() -> Self {
        Self {
            thickness_nm: 120.0,
            edge_deg: 33.0,
            anneal_h: 6.0,
            label: "2_p1".to_string(),
        }
    }
}

impl SampleTag {
    pub fn output_stem(&self) -> String {
        output_stem(self.thickness_nm, self.edge_deg, self.anneal_h, &self.label)
    }
}

impl std::str::FromStr for SampleTag {
    type Err = MeasureError;

    /// Parse `h,alpha,t,label`.
    fn from_str(s: &str) -> Result<Self> {
        let parts: Vec<&str> = s.splitn(4, ',').map(str::trim).collect();
        let [h, a, t, label] = parts.as_slice() else {
            return Err(MeasureError::parse(
                "sample tag",
                "expected thickness_nm,edge_deg,anneal_h,label",
            ));
        };
        let num = |v: &str| {
            v.parse::<f64>()
                .map_err(|e| MeasureError::parse(format!("sample tag '{}'", v), e))
        };
        Ok(Self {
            thickness_nm: num(h)?,
            edge_deg: num(a)?,
            anneal_h: num(t)?,
            label: label.to_string(),
        })
    }
}
