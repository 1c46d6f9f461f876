//! Sample Upload Generator
//!
//! Writes a CSV shaped for the loaded model so the upload form can be
//! exercised by hand. Optionally drops one column to provoke the
//! missing-columns path.
//!
//! Usage: generate_sample [feature_info.json] [out.csv] [rows] [fraud_rate] [drop_column]

use anyhow::{bail, Context, Result};
use fraud_upload_classifier::models::FeatureInfo;
use rand::Rng;
use tracing::info;

/// Random rows resembling anonymized card transactions
struct RowGenerator {
    rng: rand::rngs::ThreadRng,
}

impl RowGenerator {
    fn new() -> Self {
        Self {
            rng: rand::thread_rng(),
        }
    }

    fn value_for(&mut self, feature: &str, suspicious: bool) -> f64 {
        match feature.to_ascii_lowercase().as_str() {
            "amount" if suspicious => self.rng.gen_range(1000.0..10000.0),
            "amount" => self.rng.gen_range(1.0..500.0),
            "time" => self.rng.gen_range(0.0..172_800.0),
            // PCA-style components: wider spread for suspicious rows
            _ if suspicious => self.rng.gen_range(-8.0..8.0),
            _ => self.rng.gen_range(-2.0..2.0),
        }
    }

    /// Draw whether the next row should look fraudulent
    fn suspicious(&mut self, fraud_rate: f64) -> bool {
        self.rng.gen_bool(fraud_rate)
    }

    fn row(&mut self, features: &[String], suspicious: bool) -> Vec<String> {
        features
            .iter()
            .map(|f| format!("{:.6}", self.value_for(f, suspicious)))
            .collect()
    }
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("generate_sample=info".parse()?),
        )
        .init();

    let args: Vec<String> = std::env::args().collect();
    let info_path = args.get(1).map(|s| s.as_str()).unwrap_or("models/feature_info.json");
    let out_path = args.get(2).map(|s| s.as_str()).unwrap_or("sample.csv");
    let rows: usize = args.get(3).and_then(|s| s.parse().ok()).unwrap_or(10);
    let fraud_rate = parse_fraud_rate(args.get(4).map(|s| s.as_str()))?;
    let drop_column = args.get(5).cloned();

    let info = FeatureInfo::from_path(info_path)?;
    let keep: Vec<usize> = info
        .feature_names
        .iter()
        .enumerate()
        .filter(|(_, name)| drop_column.as_deref() != Some(name.as_str()))
        .map(|(i, _)| i)
        .collect();

    let mut writer = csv::Writer::from_path(out_path)
        .with_context(|| format!("Failed to create {out_path}"))?;
    writer.write_record(keep.iter().map(|&i| &info.feature_names[i]))?;

    let mut generator = RowGenerator::new();
    let mut suspicious_count = 0;

    for _ in 0..rows {
        let suspicious = generator.suspicious(fraud_rate);
        if suspicious {
            suspicious_count += 1;
        }
        let row = generator.row(&info.feature_names, suspicious);
        writer.write_record(keep.iter().map(|&i| &row[i]))?;
    }
    writer.flush()?;

    info!(
        out = %out_path,
        rows,
        suspicious = suspicious_count,
        columns = keep.len(),
        dropped = ?drop_column,
        "Sample written"
    );

    Ok(())
}

/// Fraud rate argument, clamped to `[0, 1]`. Defaults to 0.1 when absent.
fn parse_fraud_rate(arg: Option<&str>) -> Result<f64> {
    let Some(raw) = arg else {
        return Ok(0.1);
    };
    let rate: f64 = raw
        .parse()
        .with_context(|| format!("Invalid fraud rate {raw:?}"))?;
    if rate.is_nan() {
        bail!("Fraud rate must be a number between 0 and 1, got {raw:?}");
    }
    Ok(rate.clamp(0.0, 1.0))
}
