//! Error taxonomy for the upload → parse → validate → predict pipeline

use std::path::PathBuf;
use thiserror::Error;

/// A request-level failure. `Display` is the exact reason shown on the page.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum PipelineError {
    /// The request carried no `file` field
    #[error("No file uploaded!")]
    NoFileProvided,

    /// A `file` field was sent without a filename
    #[error("No file selected!")]
    EmptyFilename,

    /// The upload could not be persisted to the upload directory
    #[error("Error saving file: {0}")]
    Storage(String),

    /// The stored file is not readable as CSV
    #[error("Error reading file: {0}")]
    Parse(String),

    /// Required feature columns are absent, in model order
    #[error("Missing columns: {}", format_name_list(.0))]
    MissingFeatures(Vec<String>),

    /// The model (or the conversion of the table into model input) failed
    #[error("Error in prediction: {0}")]
    Prediction(String),
}

impl PipelineError {
    /// Short stage tag used for metrics and log fields
    pub fn stage(&self) -> &'static str {
        match self {
            PipelineError::NoFileProvided => "no_file",
            PipelineError::EmptyFilename => "empty_filename",
            PipelineError::Storage(_) => "storage",
            PipelineError::Parse(_) => "parse",
            PipelineError::MissingFeatures(_) => "missing_features",
            PipelineError::Prediction(_) => "prediction",
        }
    }
}

/// Fatal conditions that keep the server from starting
#[derive(Debug, Error)]
pub enum StartupError {
    #[error("Model file not found: {}. Please upload it.", .0.display())]
    ModelNotFound(PathBuf),
}

/// Render names the way operators expect to paste them back: `['a', 'b']`
pub fn format_name_list(names: &[String]) -> String {
    let quoted: Vec<String> = names.iter().map(|name| quote_name(name)).collect();
    format!("[{}]", quoted.join(", "))
}

/// Python string literal quoting: single quotes unless only the
/// single quote appears in the name
fn quote_name(name: &str) -> String {
    let escaped = name.replace('\\', "\\\\");
    if name.contains('\'') && !name.contains('"') {
        format!("\"{escaped}\"")
    } else {
        format!("'{}'", escaped.replace('\'', "\\'"))
    }
}
