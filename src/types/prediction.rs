//! Prediction labels and per-request outcome

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary classification label
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum Label {
    Fraud,
    NonFraud,
}

impl Label {
    /// Map a probability to a label; the threshold itself is non-fraud
    pub fn from_probability(probability: f64, threshold: f64) -> Self {
        if probability > threshold {
            Label::Fraud
        } else {
            Label::NonFraud
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Label::Fraud => "fraud",
            Label::NonFraud => "non-fraud",
        }
    }

    /// Human-readable sentence shown on the page
    pub fn sentence(&self) -> String {
        format!("Transaction is {}", self.as_str())
    }
}

impl fmt::Display for Label {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Labels and probabilities for every row of one uploaded table
#[derive(Debug, Clone)]
pub struct PredictionOutcome {
    /// Fraud probability per row, in table order
    pub probabilities: Vec<f64>,

    /// Label per row, in table order
    pub labels: Vec<Label>,

    /// Threshold the labels were derived with
    pub threshold: f64,

    /// When the model produced the probabilities
    pub predicted_at: DateTime<Utc>,
}

impl PredictionOutcome {
    /// Build an outcome from raw probabilities. Callers guarantee at least one row.
    pub fn new(probabilities: Vec<f64>, threshold: f64) -> Self {
        let labels = probabilities
            .iter()
            .map(|&p| Label::from_probability(p, threshold))
            .collect();

        Self {
            probabilities,
            labels,
            threshold,
            predicted_at: Utc::now(),
        }
    }

    /// The first row's label, the only one surfaced to the caller
    pub fn first_label(&self) -> Option<Label> {
        self.labels.first().copied()
    }

    pub fn first_probability(&self) -> Option<f64> {
        self.probabilities.first().copied()
    }

    pub fn row_count(&self) -> usize {
        self.labels.len()
    }

    pub fn fraud_count(&self) -> usize {
        self.labels.iter().filter(|l| **l == Label::Fraud).count()
    }
}
