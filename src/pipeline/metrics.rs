use std::collections::HashMap;
use std::sync::Mutex;

use serde::Serialize;

/// Process-wide operational telemetry for the pipeline.
///
/// Pure in-memory aggregator: created once with the orchestrator and never
/// persisted. Writers take a short-lived lock; [`MetricsCollector::summary`]
/// reads a point-in-time aggregate, so snapshots taken while queries are in
/// flight are approximate rather than linearizable.
#[derive(Default)]
pub struct MetricsCollector {
    inner: Mutex<MetricsInner>,
}

#[derive(Default)]
struct MetricsInner {
    cache_hits: u64,
    cache_misses: u64,
    retries: Vec<RetryRecord>,
    stage_durations: HashMap<String, Vec<f64>>,
    collaborator_failures: HashMap<String, u64>,
}

struct RetryRecord {
    attempts: u32,
    resolved: bool,
}

/// Computed snapshot of the collected metrics.
#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    /// Cache hits since startup.
    pub cache_hits: u64,
    /// Cache misses since startup.
    pub cache_misses: u64,
    /// Hits divided by total lookups (0.0 when none).
    pub cache_hit_rate: f64,
    /// Mean regeneration attempts per mitigation episode.
    pub avg_retries: f64,
    /// Fraction of mitigation episodes that cleared the review flags.
    pub mitigation_success_rate: f64,
    /// Mean duration per stage, in milliseconds.
    pub avg_stage_durations: HashMap<String, f64>,
    /// Failure counts per collaborator.
    pub collaborator_failures: HashMap<String, u64>,
}

impl MetricsCollector {
    /// Create an empty collector
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a cache hit.
    pub fn record_cache_hit(&self) {
        self.inner.lock().expect("metrics lock poisoned").cache_hits += 1;
    }

    /// Record a cache miss.
    pub fn record_cache_miss(&self) {
        self.inner.lock().expect("metrics lock poisoned").cache_misses += 1;
    }

    /// Record a completed mitigation episode.
    pub fn record_retry(&self, attempts: u32, resolved: bool) {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .retries
            .push(RetryRecord { attempts, resolved });
    }

    /// Record one duration sample for a stage.
    pub fn record_stage_duration(&self, stage: &str, duration_ms: f64) {
        self.inner
            .lock()
            .expect("metrics lock poisoned")
            .stage_durations
            .entry(stage.to_string())
            .or_default()
            .push(duration_ms);
    }

    /// Record a collaborator failure.
    pub fn record_collaborator_failure(&self, collaborator: &str) {
        *self
            .inner
            .lock()
            .expect("metrics lock poisoned")
            .collaborator_failures
            .entry(collaborator.to_string())
            .or_default() += 1;
    }

    /// Compute a snapshot of all aggregates.
    pub fn summary(&self) -> MetricsSnapshot {
        let inner = self.inner.lock().expect("metrics lock poisoned");

        let lookups = inner.cache_hits + inner.cache_misses;
        let cache_hit_rate = if lookups == 0 {
            0.0
        } else {
            round2(inner.cache_hits as f64 / lookups as f64)
        };

        let (avg_retries, mitigation_success_rate) = if inner.retries.is_empty() {
            (0.0, 0.0)
        } else {
            let total_attempts: u32 = inner.retries.iter().map(|r| r.attempts).sum();
            let resolved = inner.retries.iter().filter(|r| r.resolved).count();
            (
                round2(total_attempts as f64 / inner.retries.len() as f64),
                round2(resolved as f64 / inner.retries.len() as f64),
            )
        };

        let avg_stage_durations = inner
            .stage_durations
            .iter()
            .filter(|(_, samples)| !samples.is_empty())
            .map(|(stage, samples)| {
                let avg = samples.iter().sum::<f64>() / samples.len() as f64;
                (stage.clone(), round2(avg))
            })
            .collect();

        MetricsSnapshot {
            cache_hits: inner.cache_hits,
            cache_misses: inner.cache_misses,
            cache_hit_rate,
            avg_retries,
            mitigation_success_rate,
            avg_stage_durations,
            collaborator_failures: inner.collaborator_failures.clone(),
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
