//! ONNX model loader

use crate::error::StartupError;
use anyhow::{Context, Result};
use ort::session::{builder::GraphOptimizationLevel, Session};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::info;

/// Loaded ONNX session with the names needed to run it
pub struct LoadedModel {
    /// Model name (file stem)
    pub name: String,
    /// ONNX Runtime session
    pub session: Session,
    /// Input name for the feature tensor
    pub input_name: String,
    /// Output name for probabilities
    pub output_name: String,
}

/// Training-time feature list shipped next to the ONNX file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureInfo {
    pub feature_names: Vec<String>,
}

impl FeatureInfo {
    /// Read and check a `feature_info.json` sidecar
    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read feature info from {}", path.display()))?;
        let info: FeatureInfo = serde_json::from_str(&text)
            .with_context(|| format!("Failed to parse feature info in {}", path.display()))?;

        if info.feature_names.is_empty() {
            anyhow::bail!("Feature info {} lists no features", path.display());
        }
        if let Some(blank) = info.feature_names.iter().position(|n| n.trim().is_empty()) {
            anyhow::bail!(
                "Feature info {} has a blank name at position {}",
                path.display(),
                blank
            );
        }
        Ok(info)
    }
}

/// Fail fast when either artifact file is absent
pub fn ensure_artifacts_present(model_path: &Path, feature_info_path: &Path) -> Result<(), StartupError> {
    for path in [model_path, feature_info_path] {
        if !path.is_file() {
            return Err(StartupError::ModelNotFound(path.to_path_buf()));
        }
    }
    Ok(())
}

/// Loader for ONNX models
pub struct ModelLoader {
    /// Number of threads for ONNX inference
    onnx_threads: usize,
}

impl ModelLoader {
    /// Create a new model loader with specified number of threads
    pub fn with_threads(onnx_threads: usize) -> Result<Self> {
        ort::init().commit()?;
        info!(onnx_threads = onnx_threads, "ONNX Runtime initialized");
        Ok(Self { onnx_threads })
    }

    /// Load the classifier and its feature list.
    ///
    /// A missing file surfaces as [`StartupError::ModelNotFound`] inside the
    /// returned error so callers can tell absence from corruption.
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        &self,
        model_path: P,
        feature_info_path: Q,
    ) -> Result<(LoadedModel, FeatureInfo)> {
        let model_path = model_path.as_ref();
        let feature_info_path = feature_info_path.as_ref();
        ensure_artifacts_present(model_path, feature_info_path)?;

        let info = FeatureInfo::from_path(feature_info_path)?;
        let name = model_path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("model");
        let model = self.load_model(model_path, name)?;

        info!(
            model = %model.name,
            features = info.feature_names.len(),
            "Model artifact ready"
        );

        Ok((model, info))
    }

    /// Load a single ONNX model from file
    pub fn load_model<P: AsRef<Path>>(&self, path: P, name: &str) -> Result<LoadedModel> {
        let path = path.as_ref();

        info!(model = %name, path = %path.display(), threads = self.onnx_threads, "Loading ONNX model");

        let session = Session::builder()?
            .with_optimization_level(GraphOptimizationLevel::Level3)?
            .with_intra_threads(self.onnx_threads)?
            .commit_from_file(path)
            .with_context(|| format!("Failed to load model from {}", path.display()))?;

        let input_name = session
            .inputs
            .first()
            .map(|i| i.name.clone())
            .unwrap_or_else(|| "float_input".to_string());

        // LightGBM/CatBoost exports name it "probabilities", sklearn "output_probability"
        let output_name = session
            .outputs
            .iter()
            .find(|o| o.name.contains("prob"))
            .map(|o| o.name.clone())
            .unwrap_or_else(|| {
                session
                    .outputs
                    .last()
                    .map(|o| o.name.clone())
                    .unwrap_or_else(|| "probabilities".to_string())
            });

        info!(
            model = %name,
            input = %input_name,
            output = %output_name,
            "Model loaded successfully"
        );

        Ok(LoadedModel {
            name: name.to_string(),
            session,
            input_name,
            output_name,
        })
    }
}
