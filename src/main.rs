//! Fraud Upload Classifier - Main Entry Point
//!
//! Loads the ONNX classifier once, then serves the upload form and the
//! predict endpoint until interrupted.

use anyhow::{Context, Result};
use fraud_upload_classifier::{
    build_router,
    config::{AppConfig, LoggingConfig},
    metrics::MetricsReporter,
    AppState, ModelArtifact, OnnxModel, PredictionPipeline, StartupError, UploadStore,
};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load()?;
    init_tracing(&config.logging)?;

    info!("Starting Fraud Upload Classifier");
    info!(
        threshold = config.detection.threshold,
        uploads = %config.uploads.dir.display(),
        "Configuration loaded"
    );

    // A missing artifact is fatal: nothing can be served without it
    let model = OnnxModel::load(
        &config.model.path,
        &config.model.feature_info_path,
        config.model.onnx_threads,
    )
    .inspect_err(|e| {
        if let Some(StartupError::ModelNotFound(path)) = e.downcast_ref::<StartupError>() {
            error!(path = %path.display(), "Model file not found, refusing to start");
        }
    })?;
    info!(
        model = %model.name(),
        features = model.feature_names().len(),
        "Model loaded successfully"
    );

    let uploads = UploadStore::new(&config.uploads.dir);
    uploads
        .ensure_dir()
        .with_context(|| format!("Failed to create upload directory {}", config.uploads.dir.display()))?;

    let pipeline = PredictionPipeline::new(Arc::new(model), uploads, config.detection.threshold);
    let state = AppState::new(pipeline);

    let metrics = state.metrics.clone();
    let reporter = MetricsReporter::new(metrics.clone(), config.metrics.report_interval_secs);
    tokio::spawn(reporter.start());

    let app = build_router(state, config.uploads.max_upload_bytes);
    let listener = TcpListener::bind((config.server.host.as_str(), config.server.port))
        .await
        .with_context(|| format!("Failed to bind {}:{}", config.server.host, config.server.port))?;
    info!(addr = %listener.local_addr()?, "Listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Server shutting down...");
    metrics.print_summary();

    Ok(())
}

fn init_tracing(logging: &LoggingConfig) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::from_default_env()
        .add_directive(format!("fraud_upload_classifier={}", logging.level).parse()?);
    let builder = tracing_subscriber::fmt().with_env_filter(filter);

    match logging.format.as_str() {
        "json" => builder.json().init(),
        _ => builder.init(),
    }
    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        error!(error = %e, "Failed to listen for shutdown signal");
        std::future::pending::<()>().await;
    }
}
