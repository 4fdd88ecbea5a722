//! Per-request ingestion metrics.
//!
//! The sink is a seam; exposition backends live elsewhere. The in-process
//! implementation keeps atomic counters per (hook type, error code) pair and
//! accumulates handling time for successful requests.

use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Observation sink, called exactly once per handled request.
pub trait HookMetrics: Send + Sync {
    /// `error_code` is empty for successful requests.
    fn record(&self, hook_type: &str, hook_id: &str, error_code: &str, elapsed: Duration);
}

#[derive(Default)]
struct Counters {
    requests: AtomicU64,
    duration_nanos: AtomicU64,
}

/// Atomic in-process metrics.
#[derive(Default)]
pub struct InProcessMetrics {
    by_key: RwLock<HashMap<(String, String), Arc<Counters>>>,
}

/// One row of the metrics snapshot.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct MetricsEntry {
    pub hook_type: String,
    pub error_code: String,
    pub requests: u64,
    pub duration_nanos: u64,
}

impl InProcessMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    fn counters(&self, hook_type: &str, error_code: &str) -> Arc<Counters> {
        let key = (hook_type.to_string(), error_code.to_string());
        if let Some(counters) = self.by_key.read().get(&key) {
            return Arc::clone(counters);
        }
        let mut by_key = self.by_key.write();
        Arc::clone(by_key.entry(key).or_default())
    }

    /// Point-in-time snapshot, sorted for stable output.
    pub fn snapshot(&self) -> Vec<MetricsEntry> {
        let mut entries: Vec<MetricsEntry> = self
            .by_key
            .read()
            .iter()
            .map(|((hook_type, error_code), counters)| MetricsEntry {
                hook_type: hook_type.clone(),
                error_code: error_code.clone(),
                requests: counters.requests.load(Ordering::Relaxed),
                duration_nanos: counters.duration_nanos.load(Ordering::Relaxed),
            })
            .collect();
        entries.sort_by(|a, b| {
            (&a.hook_type, &a.error_code).cmp(&(&b.hook_type, &b.error_code))
        });
        entries
    }
}

impl HookMetrics for InProcessMetrics {
    fn record(&self, hook_type: &str, _hook_id: &str, error_code: &str, elapsed: Duration) {
        let counters = self.counters(hook_type, error_code);
        counters.requests.fetch_add(1, Ordering::Relaxed);
        if error_code.is_empty() {
            counters
                .duration_nanos
                .fetch_add(elapsed.as_nanos() as u64, Ordering::Relaxed);
        }
    }
}
