//! The model seam: anything that names its features and scores rows

use anyhow::Result;

/// Pre-trained binary classifier shared read-only across requests.
///
/// Implementations must be deterministic for identical input.
pub trait ModelArtifact: Send + Sync {
    /// Required input columns, in the order the model was trained on
    fn feature_names(&self) -> &[String];

    /// Fraud probability in `[0, 1]` for every row of `rows`
    fn predict_probability(&self, rows: &FeatureMatrix) -> Result<Vec<f64>>;
}

/// Dense row-major `f32` matrix whose columns follow `feature_names()`
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    columns: Vec<String>,
    values: Vec<f32>,
    n_rows: usize,
}

impl FeatureMatrix {
    /// Build from row-major values; `values.len()` must equal rows × columns
    pub fn new(columns: Vec<String>, values: Vec<f32>) -> Result<Self> {
        let n_cols = columns.len();
        if n_cols == 0 {
            anyhow::bail!("feature matrix needs at least one column");
        }
        if values.len() % n_cols != 0 {
            anyhow::bail!(
                "{} values do not fill rows of {} features",
                values.len(),
                n_cols
            );
        }
        let n_rows = values.len() / n_cols;
        Ok(Self {
            columns,
            values,
            n_rows,
        })
    }

    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn values(&self) -> &[f32] {
        &self.values
    }

    pub fn n_rows(&self) -> usize {
        self.n_rows
    }

    pub fn n_cols(&self) -> usize {
        self.columns.len()
    }

    pub fn row(&self, index: usize) -> Option<&[f32]> {
        if index >= self.n_rows {
            return None;
        }
        let width = self.n_cols();
        Some(&self.values[index * width..(index + 1) * width])
    }
}
