//! Type definitions shared across the pipeline

pub mod prediction;

pub use prediction::{Label, PredictionOutcome};
