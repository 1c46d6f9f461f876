use std::net::SocketAddr;
use std::path::Path;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

use fraud_upload_classifier::{
    build_router, AppState, FeatureMatrix, ModelArtifact, PredictionPipeline, UploadStore,
};
use tempfile::tempdir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};

const BOUNDARY: &str = "----fraudtestboundary7MA4YWxkTrZu0gW";

const FEATURES: &[&str] = &["amount", "time", "v1", "v2", "v3", "v4", "v5"];

/// Scores each row with its `amount` value and counts invocations
struct AmountModel {
    features: Vec<String>,
    calls: AtomicUsize,
}

impl AmountModel {
    fn new() -> Self {
        Self {
            features: FEATURES.iter().map(|s| s.to_string()).collect(),
            calls: AtomicUsize::new(0),
        }
    }
}

impl ModelArtifact for AmountModel {
    fn feature_names(&self) -> &[String] {
        &self.features
    }

    fn predict_probability(&self, rows: &FeatureMatrix) -> anyhow::Result<Vec<f64>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Ok((0..rows.n_rows())
            .map(|r| rows.row(r).map(|row| row[0] as f64).unwrap_or(0.0))
            .collect())
    }
}

struct BrokenModel(Vec<String>);

impl ModelArtifact for BrokenModel {
    fn feature_names(&self) -> &[String] {
        &self.0
    }

    fn predict_probability(&self, _rows: &FeatureMatrix) -> anyhow::Result<Vec<f64>> {
        anyhow::bail!("Expected 7 features, got float64 object")
    }
}

async fn start_server(model: Arc<dyn ModelArtifact>, uploads: &Path) -> SocketAddr {
    let pipeline = PredictionPipeline::new(model, UploadStore::new(uploads), 0.5);
    let app = build_router(AppState::new(pipeline), 1024 * 1024);
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0")
        .await
        .expect("bind listener");
    let addr = listener.local_addr().expect("local addr");
    tokio::spawn(async move { axum::serve(listener, app).await.expect("serve app") });
    addr
}

fn multipart_body(name: &str, filename: Option<&str>, content: &[u8]) -> Vec<u8> {
    let mut body = format!("--{BOUNDARY}\r\n").into_bytes();
    let disposition = match filename {
        Some(f) => format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{f}\"\r\nContent-Type: text/csv\r\n\r\n"
        ),
        None => format!("Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"),
    };
    body.extend_from_slice(disposition.as_bytes());
    body.extend_from_slice(content);
    body.extend_from_slice(format!("\r\n--{BOUNDARY}--\r\n").as_bytes());
    body
}

async fn send_raw(
    addr: SocketAddr,
    method: &str,
    path: &str,
    content_type: Option<&str>,
    body: &[u8],
) -> (u16, String, String) {
    let mut stream = tokio::net::TcpStream::connect(addr)
        .await
        .expect("connect server");
    let mut req = format!("{method} {path} HTTP/1.1\r\nHost: {addr}\r\nConnection: close\r\n");
    if let Some(ct) = content_type {
        req.push_str(&format!("Content-Type: {ct}\r\n"));
    }
    req.push_str(&format!("Content-Length: {}\r\n\r\n", body.len()));
    stream
        .write_all(req.as_bytes())
        .await
        .expect("write request head");
    stream.write_all(body).await.expect("write request body");

    let mut raw = Vec::new();
    stream
        .read_to_end(&mut raw)
        .await
        .expect("read response");
    let response = String::from_utf8(raw).expect("utf-8 response");
    let (head, body) = response
        .split_once("\r\n\r\n")
        .expect("http response must have separator");
    let status = head
        .lines()
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|s| s.parse::<u16>().ok())
        .expect("http status");
    (status, head.to_string(), body.to_string())
}

async fn upload(
    addr: SocketAddr,
    name: &str,
    filename: Option<&str>,
    content: &[u8],
) -> (u16, String) {
    let body = multipart_body(name, filename, content);
    let content_type = format!("multipart/form-data; boundary={BOUNDARY}");
    let (status, _, body) = send_raw(addr, "POST", "/predict", Some(&content_type), &body).await;
    (status, body)
}

fn csv_with(header: &str, first_row: &str) -> Vec<u8> {
    format!("{header}\n{first_row}\n0.01,1,0,0,0,0,0\n").into_bytes()
}

const FULL_HEADER: &str = "amount,time,v1,v2,v3,v4,v5";

#[tokio::test]
async fn index_serves_upload_form() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let (status, head, body) = send_raw(addr, "GET", "/", None, b"").await;
    assert_eq!(status, 200);
    assert!(head.to_ascii_lowercase().contains("content-type: text/html"));
    assert!(body.contains("enctype=\"multipart/form-data\""));
    assert!(body.contains("name=\"file\""));
}

#[tokio::test]
async fn fraud_first_row_reports_fraud() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = csv_with(FULL_HEADER, "0.82,0,-1.3,0.2,1.1,0.4,-0.5");
    let (status, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert_eq!(status, 200);
    assert!(body.contains("✅ Transaction is fraud"), "body: {body}");
}

#[tokio::test]
async fn threshold_probability_is_non_fraud() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = csv_with(FULL_HEADER, "0.5,0,0,0,0,0,0");
    let (_, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert!(body.contains("✅ Transaction is non-fraud"), "body: {body}");
}

#[tokio::test]
async fn only_first_row_is_reported() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = format!("{FULL_HEADER}\n0.1,0,0,0,0,0,0\n0.99,0,0,0,0,0,0\n0.97,0,0,0,0,0,0\n");
    let (_, body) = upload(addr, "file", Some("tx.csv"), csv.as_bytes()).await;

    assert!(body.contains("✅ Transaction is non-fraud"));
    assert!(!body.contains("Transaction is fraud"));
}

#[tokio::test]
async fn missing_file_field() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let (status, body) = upload(addr, "comment", None, b"hello").await;
    assert_eq!(status, 200);
    assert!(body.contains("⚠️ No file uploaded!"));

    let (status, _, body) = send_raw(addr, "POST", "/predict", None, b"").await;
    assert_eq!(status, 200);
    assert!(body.contains("⚠️ No file uploaded!"));
}

#[tokio::test]
async fn empty_filename() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let (_, body) = upload(addr, "file", Some(""), b"").await;
    assert!(body.contains("⚠️ No file selected!"));
}

#[tokio::test]
async fn missing_column_is_listed_and_model_not_called() {
    let dir = tempdir().expect("tempdir");
    let model = Arc::new(AmountModel::new());
    let addr = start_server(model.clone(), dir.path()).await;

    let csv = b"amount,time,v1,v2,v3,v4,extra\n0.9,0,0,0,0,0,7\n".to_vec();
    let (_, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert!(body.contains("⚠️ Missing columns: ['v5']"), "body: {body}");
    assert_eq!(model.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn several_missing_columns_listed_exactly() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = b"time,v1,v3,v4\n0,0,0,0\n".to_vec();
    let (_, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert!(
        body.contains("⚠️ Missing columns: ['amount', 'v2', 'v5']"),
        "body: {body}"
    );
}

#[tokio::test]
async fn malformed_csv_reports_read_error() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = format!("{FULL_HEADER}\n\"0.82,0,0,0,0,0,0\n");
    let (_, body) = upload(addr, "file", Some("bad.csv"), csv.as_bytes()).await;

    assert!(body.contains("⚠️ Error reading file:"), "body: {body}");
}

#[tokio::test]
async fn literal_quote_in_extra_column_still_predicts() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = format!("{FULL_HEADER},note\n0.91,0,0,0,0,0,0,12\" screen\n");
    let (_, body) = upload(addr, "file", Some("tx.csv"), csv.as_bytes()).await;

    assert!(body.contains("✅ Transaction is fraud"), "body: {body}");
}

#[tokio::test]
async fn short_row_is_scored_with_missing_values() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = format!("{FULL_HEADER}\n0.64,0,0\n");
    let (_, body) = upload(addr, "file", Some("short.csv"), csv.as_bytes()).await;

    assert!(body.contains("✅ Transaction is fraud"), "body: {body}");
}

#[tokio::test]
async fn long_row_reports_read_error() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = format!("{FULL_HEADER}\n0.64,0,0,0,0,0,0,9\n");
    let (_, body) = upload(addr, "file", Some("long.csv"), csv.as_bytes()).await;

    assert!(
        body.contains("⚠️ Error reading file: Error tokenizing data. Expected 7 fields in line 2, saw 8"),
        "body: {body}"
    );
}

#[tokio::test]
async fn model_failure_reports_prediction_error() {
    let dir = tempdir().expect("tempdir");
    let model = Arc::new(BrokenModel(FEATURES.iter().map(|s| s.to_string()).collect()));
    let addr = start_server(model, dir.path()).await;

    let csv = csv_with(FULL_HEADER, "0.82,0,0,0,0,0,0");
    let (_, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert!(
        body.contains("⚠️ Error in prediction: Expected 7 features, got float64 object"),
        "body: {body}"
    );
}

#[tokio::test]
async fn non_numeric_cell_reports_prediction_error() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = csv_with(FULL_HEADER, "lots,0,0,0,0,0,0");
    let (_, body) = upload(addr, "file", Some("tx.csv"), &csv).await;

    assert!(body.contains("⚠️ Error in prediction: could not convert string to float: 'lots'"));
}

#[tokio::test]
async fn same_upload_twice_same_label_and_separate_files() {
    let dir = tempdir().expect("tempdir");
    let addr = start_server(Arc::new(AmountModel::new()), dir.path()).await;

    let csv = csv_with(FULL_HEADER, "0.73,0,0,0,0,0,0");
    let (_, first) = upload(addr, "file", Some("same.csv"), &csv).await;
    let (_, second) = upload(addr, "file", Some("same.csv"), &csv).await;

    assert!(first.contains("✅ Transaction is fraud"));
    assert_eq!(first, second);

    let stored: Vec<_> = std::fs::read_dir(dir.path())
        .expect("read uploads")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(stored.len(), 2);
    assert!(stored
        .iter()
        .all(|e| e.file_name().to_string_lossy().ends_with("_same.csv")));
}

#[tokio::test]
async fn hostile_filename_stays_inside_upload_dir() {
    let dir = tempdir().expect("tempdir");
    let uploads = dir.path().join("uploads");
    let addr = start_server(Arc::new(AmountModel::new()), &uploads).await;

    let csv = csv_with(FULL_HEADER, "0.2,0,0,0,0,0,0");
    let (_, body) = upload(addr, "file", Some("../../escape.csv"), &csv).await;

    assert!(body.contains("✅ Transaction is non-fraud"));
    assert!(!dir.path().join("escape.csv").exists());
    let stored: Vec<_> = std::fs::read_dir(&uploads)
        .expect("upload dir created on demand")
        .filter_map(|e| e.ok())
        .collect();
    assert_eq!(stored.len(), 1);
}
