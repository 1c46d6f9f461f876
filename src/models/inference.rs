//! ONNX-backed model artifact

use crate::models::artifact::{FeatureMatrix, ModelArtifact};
use crate::models::loader::{FeatureInfo, LoadedModel, ModelLoader};
use anyhow::{Context, Result};
use ort::memory::Allocator;
use ort::value::{DowncastableTarget, DynMapValueType, DynSequenceValueType, Tensor};
use std::path::Path;
use std::sync::Mutex;
use tracing::debug;

/// Pre-trained classifier served through ONNX Runtime
pub struct OnnxModel {
    /// Session plus IO names; running a session needs exclusive access
    model: Mutex<LoadedModel>,
    /// Model name, kept outside the lock for logging
    name: String,
    /// Required features in training order
    feature_names: Vec<String>,
}

impl OnnxModel {
    /// Load the ONNX file and its feature sidecar
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(
        model_path: P,
        feature_info_path: Q,
        onnx_threads: usize,
    ) -> Result<Self> {
        let loader = ModelLoader::with_threads(onnx_threads)?;
        let (model, info) = loader.load(model_path, feature_info_path)?;
        Ok(Self::from_parts(model, info))
    }

    pub fn from_parts(model: LoadedModel, info: FeatureInfo) -> Self {
        Self {
            name: model.name.clone(),
            model: Mutex::new(model),
            feature_names: info.feature_names,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    fn run_batch(&self, rows: &FeatureMatrix) -> Result<Vec<f64>> {
        let shape = vec![rows.n_rows() as i64, rows.n_cols() as i64];
        let input_tensor = Tensor::from_array((shape, rows.values().to_vec()))
            .context("Failed to create input tensor")?;

        let mut guard = self
            .model
            .lock()
            .map_err(|e| anyhow::anyhow!("Lock error: {}", e))?;
        let model: &mut LoadedModel = &mut guard;

        let outputs = model
            .session
            .run(ort::inputs![model.input_name.as_str() => input_tensor])?;

        let probabilities =
            extract_probabilities(&outputs, &model.output_name, rows.n_rows(), &model.name)?;

        debug!(
            model = %model.name,
            rows = rows.n_rows(),
            "Batch inference complete"
        );

        Ok(probabilities)
    }
}

impl ModelArtifact for OnnxModel {
    fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    fn predict_probability(&self, rows: &FeatureMatrix) -> Result<Vec<f64>> {
        if rows.n_cols() != self.feature_names.len() {
            anyhow::bail!(
                "model {} expects {} features, got {}",
                self.name,
                self.feature_names.len(),
                rows.n_cols()
            );
        }
        self.run_batch(rows)
    }
}

/// Extract per-row fraud probabilities from session outputs.
/// Handles tensor outputs (XGBoost, sklearn) and seq(map) outputs (LightGBM, CatBoost).
fn extract_probabilities(
    outputs: &ort::session::SessionOutputs,
    output_name: &str,
    n_rows: usize,
    model_name: &str,
) -> Result<Vec<f64>> {
    if let Some(output) = outputs.get(output_name) {
        if let Some(probs) = try_extract(&output, n_rows, model_name)? {
            return Ok(probs);
        }
    }

    for (name, output) in outputs.iter() {
        if name.contains("label") {
            continue;
        }
        if let Some(probs) = try_extract(&output, n_rows, model_name)? {
            debug!(model = %model_name, output = %name, "Extracted from fallback output");
            return Ok(probs);
        }
    }

    anyhow::bail!("model {} produced no probability output", model_name)
}

fn try_extract(
    output: &ort::value::DynValue,
    n_rows: usize,
    model_name: &str,
) -> Result<Option<Vec<f64>>> {
    if let Ok((shape, data)) = output.try_extract_tensor::<f32>() {
        let dims: Vec<i64> = shape.iter().copied().collect();
        return probabilities_from_tensor(&dims, data, n_rows).map(Some);
    }

    let dtype = output.dtype();
    if DynSequenceValueType::can_downcast(&dtype) {
        return extract_from_sequence_map(output, model_name).map(Some);
    }

    Ok(None)
}

/// Read class-1 probabilities out of seq(map(int64, float)), one map per row
fn extract_from_sequence_map(output: &ort::value::DynValue, model_name: &str) -> Result<Vec<f64>> {
    let allocator = Allocator::default();

    let sequence = output
        .downcast_ref::<DynSequenceValueType>()
        .map_err(|e| anyhow::anyhow!("Failed to downcast to sequence: {}", e))?;
    let maps = sequence.try_extract_sequence::<DynMapValueType>(&allocator)?;

    let mut probabilities = Vec::with_capacity(maps.len());
    for map_value in &maps {
        let kv_pairs = map_value.try_extract_key_values::<i64, f32>()?;
        probabilities.push(class_one_probability(&kv_pairs)?);
    }

    debug!(model = %model_name, rows = probabilities.len(), "Extracted from seq(map)");
    Ok(probabilities)
}

fn class_one_probability(kv_pairs: &[(i64, f32)]) -> Result<f64> {
    if let Some((_, p)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 1) {
        return Ok(*p as f64);
    }
    if let Some((_, p)) = kv_pairs.iter().find(|(class_id, _)| *class_id == 0) {
        return Ok(1.0 - *p as f64);
    }
    anyhow::bail!("No probability found in map")
}

/// Pull the fraud column out of a probability tensor.
///
/// `[N, C]` with C ≥ 2 reads column 1, `[N, 1]` and `[N]` read the value as-is.
fn probabilities_from_tensor(dims: &[i64], data: &[f32], n_rows: usize) -> Result<Vec<f64>> {
    match dims {
        [rows, cols] if *rows as usize == n_rows && *cols >= 1 => {
            let cols = *cols as usize;
            let column = if cols >= 2 { 1 } else { 0 };
            Ok((0..n_rows).map(|r| data[r * cols + column] as f64).collect())
        }
        [rows] if *rows as usize == n_rows => Ok(data.iter().map(|&v| v as f64).collect()),
        _ => anyhow::bail!(
            "unexpected probability tensor shape {:?} for {} rows",
            dims,
            n_rows
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_two_class_tensor_reads_column_one() {
        let data = [0.9, 0.1, 0.18, 0.82];
        let probs = probabilities_from_tensor(&[2, 2], &data, 2).unwrap();

        assert!((probs[0] - 0.1).abs() < 1e-6);
        assert!((probs[1] - 0.82).abs() < 1e-6);
    }

    #[test]
    fn test_single_column_tensor() {
        let probs = probabilities_from_tensor(&[3, 1], &[0.2, 0.5, 0.7], 3).unwrap();
        assert_eq!(probs.len(), 3);
        assert!((probs[2] - 0.7).abs() < 1e-6);

        let probs = probabilities_from_tensor(&[2], &[0.3, 0.4], 2).unwrap();
        assert!((probs[0] - 0.3).abs() < 1e-6);
    }

    #[test]
    fn test_shape_row_mismatch_is_error() {
        assert!(probabilities_from_tensor(&[1, 2], &[0.5, 0.5], 2).is_err());
        assert!(probabilities_from_tensor(&[2, 2, 2], &[0.0; 8], 2).is_err());
    }

    #[test]
    fn test_class_one_from_map() {
        let p = class_one_probability(&[(0, 0.25), (1, 0.75)]).unwrap();
        assert!((p - 0.75).abs() < 1e-6);

        let p = class_one_probability(&[(0, 0.25)]).unwrap();
        assert!((p - 0.75).abs() < 1e-6);

        assert!(class_one_probability(&[]).is_err());
    }
}
