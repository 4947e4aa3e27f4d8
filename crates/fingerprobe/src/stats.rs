//! Summary statistics of a measurement column.

/// Mean, sample standard deviation and count.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Summary {
    pub mean: f64,
    /// Sample standard deviation (n - 1); `None` with fewer than two values.
    pub std: Option<f64>,
    pub count: usize,
}

impl Summary {
    /// Summarize the finite values of `values`; `None` entries and NaNs are
    /// skipped. Returns `None` when nothing remains.
    pub fn of<I>(values: I) -> Option<Self>
    where
        I: IntoIterator<Item = Option<f64>>,
    {
        let vals: Vec<f64> = values
            .into_iter()
            .flatten()
            .filter(|v| v.is_finite())
            .collect();
        if vals.is_empty() {
            return None;
        }
        let n = vals.len();
        let mean = vals.iter().sum::<f64>() / n as f64;
        let std = (n > 1).then(|| {
            let ss: f64 = vals.iter().map(|v| (v - mean) * (v - mean)).sum();
            (ss / (n - 1) as f64).sqrt()
        });
        Some(Self {
            mean,
            std,
            count: n,
        })
    }
}
