//! Fraud Upload Classifier Library
//!
//! Accepts an uploaded transactions CSV, scores it with a pre-trained
//! ONNX classifier and reports a fraud/non-fraud label for the first row.

pub mod config;
pub mod error;
pub mod feature_extractor;
pub mod http;
pub mod metrics;
pub mod models;
pub mod pipeline;
pub mod table;
pub mod types;
pub mod upload;

pub use config::AppConfig;
pub use error::{PipelineError, StartupError};
pub use feature_extractor::FeatureExtractor;
pub use http::{build_router, AppState};
pub use models::{FeatureMatrix, ModelArtifact, OnnxModel};
pub use pipeline::PredictionPipeline;
pub use types::prediction::{Label, PredictionOutcome};
pub use upload::{IncomingFile, UploadStore};
