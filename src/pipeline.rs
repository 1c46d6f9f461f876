//! Request pipeline: upload → parse → validate → predict → label.
//!
//! Each stage either hands its product to the next or stops the request
//! with a [`PipelineError`] whose text is shown to the user verbatim.

use crate::error::PipelineError;
use crate::feature_extractor::FeatureExtractor;
use crate::models::artifact::ModelArtifact;
use crate::table::parse_csv_file;
use crate::types::prediction::PredictionOutcome;
use crate::upload::{IncomingFile, UploadStore};
use std::sync::Arc;
use tracing::debug;

/// Prefix on successful result messages
pub const SUCCESS_MARK: &str = "✅";
/// Prefix on failure messages
pub const WARNING_MARK: &str = "⚠️";

/// Stateless per-request orchestration over a shared model
pub struct PredictionPipeline {
    model: Arc<dyn ModelArtifact>,
    extractor: FeatureExtractor,
    uploads: UploadStore,
    threshold: f64,
}

impl PredictionPipeline {
    pub fn new(model: Arc<dyn ModelArtifact>, uploads: UploadStore, threshold: f64) -> Self {
        let extractor = FeatureExtractor::new(model.feature_names().to_vec());
        Self {
            model,
            extractor,
            uploads,
            threshold,
        }
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    pub fn uploads(&self) -> &UploadStore {
        &self.uploads
    }

    /// Run every stage in order. Blocking: file I/O and inference happen inline.
    pub fn run(&self, file: Option<IncomingFile>) -> Result<PredictionOutcome, PipelineError> {
        let path = self.uploads.save(file)?;

        let table = parse_csv_file(&path)?;
        debug!(
            path = %path.display(),
            rows = table.row_count(),
            columns = table.columns().len(),
            "Upload parsed"
        );

        // Validation runs first so a missing column never reaches the model
        self.extractor.validate(&table)?;
        let features = self.extractor.extract(&table)?;

        let probabilities = self
            .model
            .predict_probability(&features)
            .map_err(|e| PipelineError::Prediction(format!("{e:#}")))?;
        check_probabilities(&probabilities, features.n_rows())?;

        Ok(PredictionOutcome::new(probabilities, self.threshold))
    }
}

fn check_probabilities(probabilities: &[f64], n_rows: usize) -> Result<(), PipelineError> {
    if probabilities.len() != n_rows {
        return Err(PipelineError::Prediction(format!(
            "model returned {} probabilities for {} rows",
            probabilities.len(),
            n_rows
        )));
    }
    if let Some(bad) = probabilities
        .iter()
        .find(|p| !(0.0..=1.0).contains(*p))
    {
        return Err(PipelineError::Prediction(format!(
            "probability {bad} is outside [0, 1]"
        )));
    }
    Ok(())
}

/// The single line shown on the page for a pipeline result.
///
/// Only the first row's label is surfaced; the rest stay in the outcome.
pub fn render_message(result: &Result<PredictionOutcome, PipelineError>) -> String {
    match result {
        Ok(outcome) => match outcome.first_label() {
            Some(label) => format!("{SUCCESS_MARK} {}", label.sentence()),
            None => format!(
                "{WARNING_MARK} {}",
                PipelineError::Prediction("model returned no rows".to_string())
            ),
        },
        Err(e) => format!("{WARNING_MARK} {e}"),
    }
}
