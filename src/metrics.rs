//! Engine-wide metrics collection.
//!
//! Adapted from the teacher crate's `core::metrics::MetricsCollector`: same
//! record/aggregate/percentile API, ported from `std::sync::Mutex` to
//! `parking_lot::Mutex` to match the rest of this crate's lock usage. The
//! teacher's `Logger`/`StorageContext` stub types are not carried forward —
//! logging uses `tracing` directly at call sites instead.

use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

/// Aggregation applied to a metric's recorded samples.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AggregationType {
    Sum,
    Avg,
    Min,
    Max,
    P50,
    P95,
    P99,
}

/// Thread-safe metrics collector shared across the engine and its operators.
pub struct MetricsCollector {
    metrics: Arc<Mutex<HashMap<String, Vec<f64>>>>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            metrics: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn record(&self, metric_id: &str, value: f64) {
        self.metrics
            .lock()
            .entry(metric_id.to_string())
            .or_default()
            .push(value);
    }

    pub fn increment(&self, metric_id: &str) {
        self.record(metric_id, 1.0);
    }

    pub fn get_values(&self, metric_id: &str) -> Vec<f64> {
        self.metrics.lock().get(metric_id).cloned().unwrap_or_default()
    }

    pub fn aggregate(&self, metric_id: &str, agg_type: AggregationType) -> Option<f64> {
        let values = self.get_values(metric_id);
        if values.is_empty() {
            return None;
        }
        match agg_type {
            AggregationType::Sum => Some(values.iter().sum()),
            AggregationType::Avg => Some(values.iter().sum::<f64>() / values.len() as f64),
            AggregationType::Min => values.iter().cloned().min_by(|a, b| a.partial_cmp(b).unwrap()),
            AggregationType::Max => values.iter().cloned().max_by(|a, b| a.partial_cmp(b).unwrap()),
            AggregationType::P50 => Self::percentile(&values, 0.5),
            AggregationType::P95 => Self::percentile(&values, 0.95),
            AggregationType::P99 => Self::percentile(&values, 0.99),
        }
    }

    fn percentile(values: &[f64], p: f64) -> Option<f64> {
        if values.is_empty() {
            return None;
        }
        let mut sorted = values.to_vec();
        sorted.sort_by(|a, b| a.partial_cmp(b).unwrap_or(std::cmp::Ordering::Equal));
        let idx = (sorted.len() as f64 - 1.0) * p;
        let lower = idx.floor() as usize;
        let upper = idx.ceil() as usize;
        if lower == upper {
            sorted.get(lower).copied()
        } else {
            let fraction = idx - lower as f64;
            Some(sorted[lower] + (sorted[upper] - sorted[lower]) * fraction)
        }
    }

    pub fn clear(&self) {
        self.metrics.lock().clear();
    }

    pub fn get_count(&self, metric_id: &str) -> usize {
        self.metrics.lock().get(metric_id).map(Vec::len).unwrap_or(0)
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

impl Clone for MetricsCollector {
    fn clone(&self) -> Self {
        Self { metrics: self.metrics.clone() }
    }
}
