//! Thread-safe metrics collection system
//!
//! Atomic counters for the execution path plus mutex-protected per-module
//! statistics. The audit-failure counter is the only place a swallowed
//! audit-log write becomes observable.

use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Global metrics collector instance
pub static METRICS: Lazy<MetricsCollector> = Lazy::new(MetricsCollector::new);

/// Get reference to global metrics collector
pub fn metrics() -> &'static MetricsCollector {
    &METRICS
}

/// Keep at most this many duration samples per module
const MAX_DURATION_SAMPLES: usize = 1000;

/// Thread-safe metrics collector using atomics and mutexes
pub struct MetricsCollector {
    executions_received: AtomicU64,
    executions_completed: AtomicU64,
    executions_failed: AtomicU64,
    faults: AtomicU64,
    unknown_modules: AtomicU64,
    unauthorized_requests: AtomicU64,
    audit_writes: AtomicU64,
    audit_failures: AtomicU64,

    module_stats: Mutex<HashMap<String, ModuleStats>>,
    started_at: Mutex<DateTime<Utc>>,
}

#[derive(Debug, Default)]
struct ModuleStats {
    executions: u64,
    failures: u64,
    durations_ms: Vec<u64>,
}

impl MetricsCollector {
    pub fn new() -> Self {
        Self {
            executions_received: AtomicU64::new(0),
            executions_completed: AtomicU64::new(0),
            executions_failed: AtomicU64::new(0),
            faults: AtomicU64::new(0),
            unknown_modules: AtomicU64::new(0),
            unauthorized_requests: AtomicU64::new(0),
            audit_writes: AtomicU64::new(0),
            audit_failures: AtomicU64::new(0),
            module_stats: Mutex::new(HashMap::new()),
            started_at: Mutex::new(Utc::now()),
        }
    }

    pub fn execution_received(&self) {
        self.executions_received.fetch_add(1, Ordering::Relaxed);
    }

    /// Record the outcome of a resolved module execution
    pub fn execution_finished(&self, module_id: &str, duration: Duration, success: bool) {
        if success {
            self.executions_completed.fetch_add(1, Ordering::Relaxed);
        } else {
            self.executions_failed.fetch_add(1, Ordering::Relaxed);
        }

        if let Ok(mut stats) = self.module_stats.lock() {
            let entry = stats.entry(module_id.to_string()).or_default();
            entry.executions += 1;
            if !success {
                entry.failures += 1;
            }
            entry.durations_ms.push(duration.as_millis() as u64);
            if entry.durations_ms.len() > MAX_DURATION_SAMPLES {
                entry.durations_ms.remove(0);
            }
        }
    }

    /// A handler raised instead of returning a domain outcome
    pub fn fault(&self) {
        self.faults.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unknown_module(&self) {
        self.unknown_modules.fetch_add(1, Ordering::Relaxed);
        self.executions_failed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn unauthorized_request(&self) {
        self.unauthorized_requests.fetch_add(1, Ordering::Relaxed);
    }

    pub fn audit_written(&self) {
        self.audit_writes.fetch_add(1, Ordering::Relaxed);
    }

    pub fn audit_failed(&self) {
        self.audit_failures.fetch_add(1, Ordering::Relaxed);
    }

    // Reset all metrics (useful for testing)
    pub fn reset(&self) {
        for counter in [
            &self.executions_received,
            &self.executions_completed,
            &self.executions_failed,
            &self.faults,
            &self.unknown_modules,
            &self.unauthorized_requests,
            &self.audit_writes,
            &self.audit_failures,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
        if let Ok(mut stats) = self.module_stats.lock() {
            stats.clear();
        }
        if let Ok(mut started_at) = self.started_at.lock() {
            *started_at = Utc::now();
        }
    }

    /// Point-in-time copy of every counter
    pub fn get_metrics(&self) -> MetricsSnapshot {
        let now = Utc::now();
        let started_at = self.started_at.lock().map(|s| *s).unwrap_or(now);

        let modules: HashMap<String, ModuleStatsSnapshot> = self
            .module_stats
            .lock()
            .map(|stats| {
                stats
                    .iter()
                    .map(|(id, s)| (id.clone(), Self::module_snapshot(s)))
                    .collect()
            })
            .unwrap_or_default();

        MetricsSnapshot {
            timestamp: now,
            uptime_seconds: (now - started_at).num_seconds().max(0) as u64,
            executions: ExecutionMetrics {
                received: self.executions_received.load(Ordering::Relaxed),
                completed: self.executions_completed.load(Ordering::Relaxed),
                failed: self.executions_failed.load(Ordering::Relaxed),
                faults: self.faults.load(Ordering::Relaxed),
                unknown_modules: self.unknown_modules.load(Ordering::Relaxed),
            },
            auth: AuthMetrics {
                unauthorized_requests: self.unauthorized_requests.load(Ordering::Relaxed),
            },
            audit: AuditMetrics {
                writes: self.audit_writes.load(Ordering::Relaxed),
                failures: self.audit_failures.load(Ordering::Relaxed),
            },
            modules,
        }
    }

    fn module_snapshot(stats: &ModuleStats) -> ModuleStatsSnapshot {
        let mut sorted = stats.durations_ms.clone();
        sorted.sort_unstable();

        let avg_duration_ms = if sorted.is_empty() {
            0.0
        } else {
            sorted.iter().sum::<u64>() as f64 / sorted.len() as f64
        };

        ModuleStatsSnapshot {
            executions: stats.executions,
            failures: stats.failures,
            avg_duration_ms,
            p95_duration_ms: percentile(&sorted, 95.0),
        }
    }
}

impl Default for MetricsCollector {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct MetricsSnapshot {
    pub timestamp: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub executions: ExecutionMetrics,
    pub auth: AuthMetrics,
    pub audit: AuditMetrics,
    pub modules: HashMap<String, ModuleStatsSnapshot>,
}

#[derive(Debug, Clone, Serialize)]
pub struct ExecutionMetrics {
    pub received: u64,
    pub completed: u64,
    pub failed: u64,
    pub faults: u64,
    pub unknown_modules: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuthMetrics {
    pub unauthorized_requests: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct AuditMetrics {
    pub writes: u64,
    pub failures: u64,
}

#[derive(Debug, Clone, Serialize)]
pub struct ModuleStatsSnapshot {
    pub executions: u64,
    pub failures: u64,
    pub avg_duration_ms: f64,
    pub p95_duration_ms: f64,
}

/// Percentile with linear interpolation over sorted data
fn percentile(sorted_data: &[u64], percentile: f64) -> f64 {
    if sorted_data.is_empty() {
        return 0.0;
    }

    let rank = (percentile / 100.0) * (sorted_data.len() - 1) as f64;
    let lower = rank.floor() as usize;
    let upper = rank.ceil() as usize;

    if lower == upper {
        sorted_data[lower] as f64
    } else {
        let weight = rank - lower as f64;
        sorted_data[lower] as f64 * (1.0 - weight) + sorted_data[upper] as f64 * weight
    }
}
