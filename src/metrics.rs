//! Request metrics and periodic summaries for the prediction endpoint.

use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, RwLock};
use std::time::{Duration, Instant};
use tracing::info;

/// Latency samples kept before the oldest half is dropped
const MAX_LATENCY_SAMPLES: usize = 10_000;

/// Metrics collector for the predict pipeline
pub struct PipelineMetrics {
    /// Total predict requests handled
    pub requests_handled: AtomicU64,
    /// Requests that produced a label
    pub predictions_made: AtomicU64,
    /// Outcome counts keyed by stage tag (`fraud`, `non_fraud`, `parse`, ...)
    outcomes: RwLock<BTreeMap<&'static str, u64>>,
    /// End-to-end request times (in microseconds)
    processing_times: RwLock<Vec<u64>>,
    /// First-row probability distribution buckets
    score_buckets: RwLock<[u64; 10]>,
    /// Start time for rate calculation
    start_time: Instant,
}

impl PipelineMetrics {
    pub fn new() -> Self {
        Self {
            requests_handled: AtomicU64::new(0),
            predictions_made: AtomicU64::new(0),
            outcomes: RwLock::new(BTreeMap::new()),
            processing_times: RwLock::new(Vec::with_capacity(1000)),
            score_buckets: RwLock::new([0; 10]),
            start_time: Instant::now(),
        }
    }

    /// Record a handled request and how it ended
    pub fn record_request(&self, processing_time: Duration, outcome: &'static str) {
        self.requests_handled.fetch_add(1, Ordering::Relaxed);

        if let Ok(mut times) = self.processing_times.write() {
            times.push(processing_time.as_micros() as u64);
            if times.len() > MAX_LATENCY_SAMPLES {
                times.drain(0..MAX_LATENCY_SAMPLES / 2);
            }
        }

        if let Ok(mut outcomes) = self.outcomes.write() {
            *outcomes.entry(outcome).or_insert(0) += 1;
        }
    }

    /// Record the probability behind a surfaced label
    pub fn record_probability(&self, probability: f64) {
        self.predictions_made.fetch_add(1, Ordering::Relaxed);

        let bucket = (probability.clamp(0.0, 1.0) * 10.0).min(9.0) as usize;
        if let Ok(mut buckets) = self.score_buckets.write() {
            buckets[bucket] += 1;
        }
    }

    /// Get processing time statistics
    pub fn get_processing_stats(&self) -> ProcessingStats {
        let mut sorted = match self.processing_times.read() {
            Ok(times) => times.clone(),
            Err(_) => return ProcessingStats::default(),
        };
        if sorted.is_empty() {
            return ProcessingStats::default();
        }
        sorted.sort_unstable();

        let sum: u64 = sorted.iter().sum();
        let count = sorted.len();
        let at = |q: f64| sorted[((count as f64 * q) as usize).min(count - 1)];

        ProcessingStats {
            count: count as u64,
            mean_us: sum / count as u64,
            p50_us: at(0.50),
            p95_us: at(0.95),
            p99_us: at(0.99),
            max_us: sorted[count - 1],
        }
    }

    /// Outcome counts by stage tag
    pub fn get_outcomes(&self) -> BTreeMap<&'static str, u64> {
        self.outcomes
            .read()
            .map(|o| o.clone())
            .unwrap_or_default()
    }

    /// Get score distribution
    pub fn get_score_distribution(&self) -> [u64; 10] {
        self.score_buckets.read().map(|b| *b).unwrap_or([0; 10])
    }

    /// Requests per second since start
    pub fn get_throughput(&self) -> f64 {
        let elapsed = self.start_time.elapsed().as_secs_f64();
        if elapsed > 0.0 {
            self.requests_handled.load(Ordering::Relaxed) as f64 / elapsed
        } else {
            0.0
        }
    }

    /// Log a summary of everything recorded so far
    pub fn print_summary(&self) {
        let handled = self.requests_handled.load(Ordering::Relaxed);
        let predicted = self.predictions_made.load(Ordering::Relaxed);
        let processing = self.get_processing_stats();

        info!(
            requests = handled,
            predictions = predicted,
            throughput = format!("{:.2} req/s", self.get_throughput()),
            mean_us = processing.mean_us,
            p50_us = processing.p50_us,
            p95_us = processing.p95_us,
            p99_us = processing.p99_us,
            max_us = processing.max_us,
            "Predict endpoint summary"
        );

        for (outcome, count) in self.get_outcomes() {
            info!(outcome, count, "Outcome count");
        }

        let dist = self.get_score_distribution();
        let total: u64 = dist.iter().sum();
        if total > 0 {
            let buckets: Vec<String> = dist
                .iter()
                .enumerate()
                .map(|(i, count)| format!("{:.1}-{:.1}:{}", i as f64 / 10.0, (i + 1) as f64 / 10.0, count))
                .collect();
            info!(buckets = %buckets.join(" "), "First-row probability distribution");
        }
    }
}

impl Default for PipelineMetrics {
    fn default() -> Self {
        Self::new()
    }
}

/// Processing time statistics
#[derive(Debug, Default)]
pub struct ProcessingStats {
    pub count: u64,
    pub mean_us: u64,
    pub p50_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    pub max_us: u64,
}

/// Prints periodic summaries
pub struct MetricsReporter {
    metrics: Arc<PipelineMetrics>,
    interval_secs: u64,
}

impl MetricsReporter {
    pub fn new(metrics: Arc<PipelineMetrics>, interval_secs: u64) -> Self {
        Self {
            metrics,
            interval_secs,
        }
    }

    /// Start the periodic reporting task; returns immediately when disabled
    pub async fn start(self) {
        if self.interval_secs == 0 {
            return;
        }
        let mut interval = tokio::time::interval(Duration::from_secs(self.interval_secs));
        // First tick fires immediately
        interval.tick().await;
        loop {
            interval.tick().await;
            self.metrics.print_summary();
        }
    }
}
