use crate::core::wallet_api::BalanceReconciliation;
use crate::core::Sample;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::Duration;

/// Distinct error messages kept for the summary
const MAX_ERROR_KINDS: usize = 16;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LatencyStats {
    pub min_ms: f64,
    pub avg_ms: f64,
    pub med_ms: f64,
    pub p90_ms: f64,
    pub p95_ms: f64,
    pub p99_ms: f64,
    pub max_ms: f64,
}

impl LatencyStats {
    pub fn from_micros(mut samples: Vec<u64>) -> Self {
        if samples.is_empty() {
            return Self::default();
        }
        samples.sort_unstable();

        let to_ms = |us: u64| us as f64 / 1000.0;
        let total: u128 = samples.iter().map(|&us| u128::from(us)).sum();

        Self {
            min_ms: to_ms(samples[0]),
            avg_ms: total as f64 / samples.len() as f64 / 1000.0,
            med_ms: to_ms(percentile(&samples, 50.0)),
            p90_ms: to_ms(percentile(&samples, 90.0)),
            p95_ms: to_ms(percentile(&samples, 95.0)),
            p99_ms: to_ms(percentile(&samples, 99.0)),
            max_ms: to_ms(samples[samples.len() - 1]),
        }
    }
}

/// Nearest-rank percentile over an ascending slice
pub fn percentile(sorted: &[u64], p: f64) -> u64 {
    if sorted.is_empty() {
        return 0;
    }
    let n = sorted.len();
    let rank = ((p / 100.0) * n as f64).ceil() as usize;
    sorted[rank.clamp(1, n) - 1]
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CheckSummary {
    pub name: String,
    pub passes: u64,
    pub fails: u64,
}

impl CheckSummary {
    pub fn pass_rate(&self) -> f64 {
        rate(self.passes, self.passes + self.fails)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceUsage {
    pub samples: u64,
    pub average_cpu_percent: f64,
    pub peak_cpu_percent: f64,
    pub peak_memory_mb: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSummary {
    pub scenario: String,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed_secs: f64,
    pub vus: usize,
    pub rps_limit: Option<u32>,
    /// Completed requests, including those that ended in a transport error
    pub requests: u64,
    pub transport_errors: u64,
    pub interrupted_iterations: u64,
    pub failed_iterations: u64,
    pub requests_per_second: f64,
    pub latency: LatencyStats,
    /// `0` counts requests that never got a response
    pub status_codes: BTreeMap<u16, u64>,
    pub checks: Vec<CheckSummary>,
    pub errors: BTreeMap<String, u64>,
    pub resources: Option<ResourceUsage>,
    pub balance: Option<BalanceReconciliation>,
}

impl RunSummary {
    pub fn checks_pass_rate(&self) -> f64 {
        let passes: u64 = self.checks.iter().map(|c| c.passes).sum();
        let fails: u64 = self.checks.iter().map(|c| c.fails).sum();
        rate(passes, passes + fails)
    }

    pub fn transport_error_rate(&self) -> f64 {
        rate(self.transport_errors, self.requests)
    }

    pub fn status_count(&self, status: u16) -> u64 {
        self.status_codes.get(&status).copied().unwrap_or(0)
    }

    pub fn check(&self, name: &str) -> Option<&CheckSummary> {
        self.checks.iter().find(|c| c.name == name)
    }
}

fn rate(part: u64, total: u64) -> f64 {
    if total == 0 {
        0.0
    } else {
        part as f64 / total as f64
    }
}

/// Live counters for the progress line.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Progress {
    pub requests: u64,
    pub failed_iterations: u64,
    pub transport_errors: u64,
}

#[derive(Debug, Default)]
struct Recorded {
    latencies_us: Vec<u64>,
    status_codes: BTreeMap<u16, u64>,
    check_passes: Vec<u64>,
    check_fails: Vec<u64>,
    errors: BTreeMap<String, u64>,
}

/// Shared sink every VU reports its samples into.
pub struct MetricsCollector {
    check_names: Vec<String>,
    requests: AtomicU64,
    transport_errors: AtomicU64,
    failed_iterations: AtomicU64,
    interrupted: AtomicU64,
    recorded: Mutex<Recorded>,
}

impl MetricsCollector {
    pub fn new(check_names: Vec<String>) -> Self {
        let checks = check_names.len();
        Self {
            check_names,
            requests: AtomicU64::new(0),
            transport_errors: AtomicU64::new(0),
            failed_iterations: AtomicU64::new(0),
            interrupted: AtomicU64::new(0),
            recorded: Mutex::new(Recorded {
                check_passes: vec![0; checks],
                check_fails: vec![0; checks],
                ..Recorded::default()
            }),
        }
    }

    pub fn record(&self, sample: &Sample) {
        self.requests.fetch_add(1, Ordering::Relaxed);
        if sample.status.is_none() {
            self.transport_errors.fetch_add(1, Ordering::Relaxed);
        }
        if !sample.all_checks_passed() {
            self.failed_iterations.fetch_add(1, Ordering::Relaxed);
        }

        let Ok(mut recorded) = self.recorded.lock() else {
            return;
        };
        recorded
            .latencies_us
            .push(u64::try_from(sample.latency.as_micros()).unwrap_or(u64::MAX));
        *recorded
            .status_codes
            .entry(sample.status.unwrap_or(0))
            .or_insert(0) += 1;

        for (idx, passed) in sample.check_results.iter().enumerate() {
            let tally = if *passed {
                recorded.check_passes.get_mut(idx)
            } else {
                recorded.check_fails.get_mut(idx)
            };
            if let Some(count) = tally {
                *count += 1;
            }
        }

        if let Some(error) = &sample.error {
            if recorded.errors.contains_key(error) || recorded.errors.len() < MAX_ERROR_KINDS {
                *recorded.errors.entry(error.clone()).or_insert(0) += 1;
            }
        }
    }

    pub fn record_interrupted(&self, count: u64) {
        self.interrupted.fetch_add(count, Ordering::Relaxed);
    }

    pub fn progress(&self) -> Progress {
        Progress {
            requests: self.requests.load(Ordering::Relaxed),
            failed_iterations: self.failed_iterations.load(Ordering::Relaxed),
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
        }
    }

    pub fn summarize(&self, run: RunInfo) -> RunSummary {
        let recorded = match self.recorded.lock() {
            Ok(mut guard) => std::mem::take(&mut *guard),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        };

        let requests = self.requests.load(Ordering::Relaxed);
        let elapsed_secs = run.elapsed.as_secs_f64();
        let checks = self
            .check_names
            .iter()
            .enumerate()
            .map(|(idx, name)| CheckSummary {
                name: name.clone(),
                passes: recorded.check_passes.get(idx).copied().unwrap_or(0),
                fails: recorded.check_fails.get(idx).copied().unwrap_or(0),
            })
            .collect();

        RunSummary {
            scenario: run.scenario,
            target_url: run.target_url,
            started_at: run.started_at,
            elapsed_secs,
            vus: run.vus,
            rps_limit: run.rps_limit,
            requests,
            transport_errors: self.transport_errors.load(Ordering::Relaxed),
            interrupted_iterations: self.interrupted.load(Ordering::Relaxed),
            failed_iterations: self.failed_iterations.load(Ordering::Relaxed),
            requests_per_second: if elapsed_secs > 0.0 {
                requests as f64 / elapsed_secs
            } else {
                0.0
            },
            latency: LatencyStats::from_micros(recorded.latencies_us),
            status_codes: recorded.status_codes,
            checks,
            errors: recorded.errors,
            resources: None,
            balance: None,
        }
    }
}

/// Run facts the collector cannot observe itself.
#[derive(Debug, Clone)]
pub struct RunInfo {
    pub scenario: String,
    pub target_url: String,
    pub started_at: DateTime<Utc>,
    pub elapsed: Duration,
    pub vus: usize,
    pub rps_limit: Option<u32>,
}
