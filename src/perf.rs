//! Timing samples for one mounted gallery.
//!
//! The monitor is an ordinary value: the caller creates it, hands a clone to
//! the gallery, and reads the report when it is done. Clones share samples.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;

use crate::preload::PreloadResult;

pub const LAYOUT: &str = "layout";
pub const RESOLVE: &str = "resolve";
pub const PRELOAD_DECODE: &str = "preload_decode";
pub const PRELOAD_FAILED: &str = "preload_failed";

#[derive(Debug, Clone, Default)]
pub struct PerformanceMonitor {
    samples: Arc<Mutex<BTreeMap<&'static str, Vec<f64>>>>,
}

/// Summary of one metric, all values in milliseconds.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricSummary {
    pub name: &'static str,
    pub count: usize,
    pub avg_ms: f64,
    pub p50_ms: f64,
    pub p95_ms: f64,
    pub max_ms: f64,
}

impl PerformanceMonitor {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn record(&self, name: &'static str, elapsed: Duration) {
        self.samples
            .lock()
            .entry(name)
            .or_default()
            .push(elapsed.as_secs_f64() * 1000.0);
    }

    /// Record a finished preload under the decode or failure metric.
    pub fn record_preload(&self, result: &PreloadResult) {
        let name = if result.is_ok() { PRELOAD_DECODE } else { PRELOAD_FAILED };
        self.record(name, result.elapsed);
    }

    /// Run `f` and record how long it took.
    pub fn time<T>(&self, name: &'static str, f: impl FnOnce() -> T) -> T {
        let started = Instant::now();
        let out = f();
        self.record(name, started.elapsed());
        out
    }

    pub fn count(&self, name: &str) -> usize {
        self.samples.lock().get(name).map_or(0, Vec::len)
    }

    pub fn summary(&self, name: &'static str) -> Option<MetricSummary> {
        let samples = self.samples.lock();
        samples.get(name).map(|values| summarize(name, values))
    }

    pub fn report(&self) -> Vec<MetricSummary> {
        self.samples
            .lock()
            .iter()
            .map(|(name, values)| summarize(name, values))
            .collect()
    }

    pub fn reset(&self) {
        self.samples.lock().clear();
    }
}

fn summarize(name: &'static str, values: &[f64]) -> MetricSummary {
    let count = values.len();
    let avg_ms = if count == 0 {
        0.0
    } else {
        values.iter().sum::<f64>() / count as f64
    };
    MetricSummary {
        name,
        count,
        avg_ms,
        p50_ms: percentile_ms(values, 0.50),
        p95_ms: percentile_ms(values, 0.95),
        max_ms: values.iter().copied().fold(0.0, f64::max),
    }
}

fn percentile_ms(values: &[f64], p: f64) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    let clamped = p.clamp(0.0, 1.0);
    let idx = ((sorted.len() - 1) as f64 * clamped).round() as usize;
    sorted[idx]
}
