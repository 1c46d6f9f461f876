//! HTTP surface: the upload form and the predict endpoint

use crate::error::PipelineError;
use crate::metrics::PipelineMetrics;
use crate::pipeline::{render_message, PredictionPipeline};
use crate::types::prediction::{Label, PredictionOutcome};
use crate::upload::IncomingFile;
use axum::extract::multipart::MultipartRejection;
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Html;
use axum::routing::{get, post};
use axum::Router;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

/// Multipart field carrying the CSV
pub const FILE_FIELD: &str = "file";

/// Shared, read-only state handed to every request
#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PredictionPipeline>,
    pub metrics: Arc<PipelineMetrics>,
}

impl AppState {
    pub fn new(pipeline: PredictionPipeline) -> Self {
        Self {
            pipeline: Arc::new(pipeline),
            metrics: Arc::new(PipelineMetrics::new()),
        }
    }
}

pub fn build_router(state: AppState, max_upload_bytes: usize) -> Router {
    Router::new()
        .route("/", get(index_handler))
        .route("/predict", post(predict_handler))
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .with_state(state)
}

async fn index_handler() -> Html<String> {
    Html(render_page(None))
}

async fn predict_handler(
    State(state): State<AppState>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Html<String> {
    let started = Instant::now();

    // A body that is not multipart carries no file field at all
    let upload = match multipart {
        Ok(multipart) => read_file_field(multipart).await,
        Err(rejection) => {
            warn!(error = %rejection, "Predict request without multipart body");
            Ok(None)
        }
    };

    let result = match upload {
        Ok(file) => {
            let pipeline = state.pipeline.clone();
            tokio::task::spawn_blocking(move || pipeline.run(file))
                .await
                .unwrap_or_else(|e| Err(PipelineError::Prediction(e.to_string())))
        }
        Err(e) => Err(e),
    };

    let elapsed = started.elapsed();
    let outcome = outcome_tag(&result);
    state.metrics.record_request(elapsed, outcome);

    match &result {
        Ok(prediction) => {
            if let Some(p) = prediction.first_probability() {
                state.metrics.record_probability(p);
            }
            info!(
                outcome,
                rows = prediction.row_count(),
                fraud_rows = prediction.fraud_count(),
                first_probability = prediction.first_probability(),
                predicted_at = %prediction.predicted_at,
                latency_us = elapsed.as_micros() as u64,
                "Prediction served"
            );
        }
        Err(e) => {
            warn!(
                stage = e.stage(),
                error = %e,
                latency_us = elapsed.as_micros() as u64,
                "Prediction request rejected"
            );
        }
    }

    Html(render_page(Some(&render_message(&result))))
}

/// Pull the first `file` field out of the form; other fields are ignored.
async fn read_file_field(mut multipart: Multipart) -> Result<Option<IncomingFile>, PipelineError> {
    loop {
        let field = match multipart.next_field().await {
            Ok(Some(field)) => field,
            Ok(None) => return Ok(None),
            Err(e) => return Err(PipelineError::Parse(e.body_text())),
        };

        if field.name() != Some(FILE_FIELD) {
            continue;
        }

        let filename = field.file_name().map(str::to_owned);
        let bytes = field
            .bytes()
            .await
            .map_err(|e| PipelineError::Parse(e.body_text()))?;
        return Ok(Some(IncomingFile::new(filename, bytes.to_vec())));
    }
}

fn outcome_tag(result: &Result<PredictionOutcome, PipelineError>) -> &'static str {
    match result {
        Ok(outcome) => match outcome.first_label() {
            Some(Label::Fraud) => "fraud",
            Some(Label::NonFraud) => "non_fraud",
            None => "prediction",
        },
        Err(e) => e.stage(),
    }
}

/// The single page: upload form plus an optional result line.
pub fn render_page(prediction_text: Option<&str>) -> String {
    let result = prediction_text
        .map(|text| format!("<p id=\"prediction\">{}</p>", escape_html(text)))
        .unwrap_or_default();

    format!(
        "<!doctype html><html><head><meta charset=\"utf-8\"><title>Fraud Detection</title></head><body>\
<h1>Transaction Fraud Detection</h1>\
<form action=\"/predict\" method=\"post\" enctype=\"multipart/form-data\">\
<input type=\"file\" name=\"{FILE_FIELD}\" accept=\".csv\">\
<button type=\"submit\">Predict</button>\
</form>\
{result}\
</body></html>"
    )
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            _ => out.push(c),
        }
    }
    out
}
