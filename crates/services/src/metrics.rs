use std::collections::BTreeMap;
use std::time::{Duration, Instant};
use chrono::{DateTime, Utc};
use prometheus::{
    Encoder, HistogramOpts, HistogramVec, IntCounterVec, Opts, Registry, TextEncoder,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use xai_models::{PredictionKind, Result, XaiError};

const OUTCOME_OK: &str = "ok";
const OUTCOME_ERROR: &str = "error";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct KindMetrics {
    pub predictions: u64,
    pub errors: u64,
    pub explanations_unavailable: u64,
    pub avg_latency_ms: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceMetrics {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub predictions_generated: u64,
    pub prediction_errors: u64,
    pub explanations_unavailable: u64,
    pub error_rate_percent: f64,
    pub by_kind: BTreeMap<PredictionKind, KindMetrics>,
}

#[derive(Debug)]
pub struct LatencyTracker {
    start_time: Instant,
    kind: PredictionKind,
}

impl LatencyTracker {
    pub fn new(kind: PredictionKind) -> Self {
        Self {
            start_time: Instant::now(),
            kind,
        }
    }

    pub fn finish(self, metrics: &MetricsCollector) {
        metrics.record_latency(self.kind, self.start_time.elapsed());
    }
}

fn metrics_error(e: prometheus::Error) -> XaiError {
    XaiError::Metrics(e.to_string())
}

/// Prometheus-backed counters for the prediction service.
pub struct MetricsCollector {
    start_time: Instant,
    registry: Registry,
    predictions: IntCounterVec,
    explanations_unavailable: IntCounterVec,
    latency: HistogramVec,
}

impl MetricsCollector {
    pub fn new() -> Result<Self> {
        let registry =
            Registry::new_custom(Some("football_xai".to_string()), None).map_err(metrics_error)?;

        let predictions = IntCounterVec::new(
            Opts::new("predictions_total", "Predictions served, by kind and outcome"),
            &["kind", "outcome"],
        )
        .map_err(metrics_error)?;
        let explanations_unavailable = IntCounterVec::new(
            Opts::new(
                "explanations_unavailable_total",
                "Predictions served without an explanation",
            ),
            &["kind"],
        )
        .map_err(metrics_error)?;
        let latency = HistogramVec::new(
            HistogramOpts::new("prediction_latency_seconds", "End-to-end prediction latency")
                .buckets(vec![0.0005, 0.001, 0.0025, 0.005, 0.01, 0.025, 0.05, 0.1, 0.25]),
            &["kind"],
        )
        .map_err(metrics_error)?;

        registry
            .register(Box::new(predictions.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(explanations_unavailable.clone()))
            .map_err(metrics_error)?;
        registry
            .register(Box::new(latency.clone()))
            .map_err(metrics_error)?;

        Ok(Self {
            start_time: Instant::now(),
            registry,
            predictions,
            explanations_unavailable,
            latency,
        })
    }

    pub fn record_prediction(&self, kind: PredictionKind, success: bool) {
        let outcome = if success { OUTCOME_OK } else { OUTCOME_ERROR };
        self.predictions
            .with_label_values(&[kind.as_str(), outcome])
            .inc();
    }

    pub fn record_explanation_unavailable(&self, kind: PredictionKind) {
        self.explanations_unavailable
            .with_label_values(&[kind.as_str()])
            .inc();
    }

    pub fn record_latency(&self, kind: PredictionKind, duration: Duration) {
        self.latency
            .with_label_values(&[kind.as_str()])
            .observe(duration.as_secs_f64());
    }

    pub fn start_latency_tracking(&self, kind: PredictionKind) -> LatencyTracker {
        LatencyTracker::new(kind)
    }

    fn kind_metrics(&self, kind: PredictionKind) -> KindMetrics {
        let label = kind.as_str();
        let histogram = self.latency.with_label_values(&[label]);
        let samples = histogram.get_sample_count();
        let avg_latency_ms = if samples > 0 {
            histogram.get_sample_sum() * 1000.0 / samples as f64
        } else {
            0.0
        };

        KindMetrics {
            predictions: self.predictions.with_label_values(&[label, OUTCOME_OK]).get(),
            errors: self.predictions.with_label_values(&[label, OUTCOME_ERROR]).get(),
            explanations_unavailable: self.explanations_unavailable.with_label_values(&[label]).get(),
            avg_latency_ms,
        }
    }

    pub fn snapshot(&self) -> ServiceMetrics {
        let by_kind: BTreeMap<PredictionKind, KindMetrics> = PredictionKind::ALL
            .iter()
            .map(|kind| (*kind, self.kind_metrics(*kind)))
            .collect();

        let predictions_generated = by_kind.values().map(|m| m.predictions).sum();
        let prediction_errors: u64 = by_kind.values().map(|m| m.errors).sum();
        let attempts = predictions_generated + prediction_errors;
        let error_rate_percent = if attempts > 0 {
            prediction_errors as f64 * 100.0 / attempts as f64
        } else {
            0.0
        };

        ServiceMetrics {
            timestamp: Utc::now(),
            uptime_seconds: self.start_time.elapsed().as_secs(),
            predictions_generated,
            prediction_errors,
            explanations_unavailable: by_kind.values().map(|m| m.explanations_unavailable).sum(),
            error_rate_percent,
            by_kind,
        }
    }

    /// Prometheus text exposition of every registered metric.
    pub fn render(&self) -> Result<String> {
        let mut buffer = Vec::new();
        TextEncoder::new()
            .encode(&self.registry.gather(), &mut buffer)
            .map_err(metrics_error)?;
        String::from_utf8(buffer).map_err(|e| XaiError::Metrics(e.to_string()))
    }

    pub fn log_performance_summary(&self) {
        let metrics = self.snapshot();

        info!("📈 Performance Summary:");
        info!("   Predictions generated: {}", metrics.predictions_generated);
        info!("   Prediction errors: {}", metrics.prediction_errors);
        info!("   Explanations unavailable: {}", metrics.explanations_unavailable);
        for (kind, stats) in &metrics.by_kind {
            info!("   {} avg latency: {:.2}ms", kind, stats.avg_latency_ms);
        }
        info!("   Error rate: {:.2}%", metrics.error_rate_percent);
        info!("   Uptime: {} seconds", metrics.uptime_seconds);
    }
}
