//! Feature validation and extraction for model inference.
//!
//! The uploaded table must carry every column the model was trained on.
//! Extra columns are ignored; required columns are pulled out in the
//! exact order the model expects.

use crate::error::PipelineError;
use crate::models::artifact::FeatureMatrix;
use crate::table::ParsedTable;

/// Cells read as missing values rather than conversion errors.
const MISSING_MARKERS: &[&str] = &["", "NA", "N/A", "NaN", "nan", "null", "NULL", "None"];

/// Checks and projects a parsed table onto the model's feature list.
pub struct FeatureExtractor {
    required: Vec<String>,
}

impl FeatureExtractor {
    /// Create an extractor for the given required feature names.
    pub fn new(required: Vec<String>) -> Self {
        Self { required }
    }

    /// Required features absent from the table, in model order.
    pub fn missing(&self, table: &ParsedTable) -> Vec<String> {
        self.required
            .iter()
            .filter(|name| !table.has_column(name))
            .cloned()
            .collect()
    }

    /// Fail with the exact missing names when the table is not a superset.
    pub fn validate(&self, table: &ParsedTable) -> Result<(), PipelineError> {
        let missing = self.missing(table);
        if missing.is_empty() {
            Ok(())
        } else {
            Err(PipelineError::MissingFeatures(missing))
        }
    }

    /// Extract the numeric feature matrix from a validated table.
    ///
    /// Conversion failures are prediction errors: the columns exist but
    /// their content cannot be fed to the model.
    pub fn extract(&self, table: &ParsedTable) -> Result<FeatureMatrix, PipelineError> {
        self.validate(table)?;

        if table.row_count() == 0 {
            return Err(PipelineError::Prediction(
                "input table has no rows to score".to_string(),
            ));
        }

        let indices: Vec<usize> = self
            .required
            .iter()
            .filter_map(|name| table.column_index(name))
            .collect();

        let mut values = Vec::with_capacity(table.row_count() * indices.len());
        for (row_idx, row) in table.rows().iter().enumerate() {
            for (&col_idx, name) in indices.iter().zip(&self.required) {
                let cell = row.get(col_idx).map(String::as_str).unwrap_or("");
                values.push(parse_cell(cell).ok_or_else(|| {
                    PipelineError::Prediction(format!(
                        "could not convert string to float: '{}' (column '{}', row {})",
                        cell,
                        name,
                        row_idx + 1
                    ))
                })?);
            }
        }

        FeatureMatrix::new(self.required.clone(), values)
            .map_err(|e| PipelineError::Prediction(e.to_string()))
    }

    /// Get the number of features the model consumes.
    pub fn feature_count(&self) -> usize {
        self.required.len()
    }

    /// Get feature names (model order).
    pub fn feature_names(&self) -> &[String] {
        &self.required
    }
}

fn parse_cell(cell: &str) -> Option<f32> {
    let cell = cell.trim();
    if MISSING_MARKERS.contains(&cell) {
        return Some(f32::NAN);
    }
    match cell {
        "True" | "true" => Some(1.0),
        "False" | "false" => Some(0.0),
        _ => cell.parse::<f32>().ok(),
    }
}
