use crate::core::metrics::{MetricsCollector, RunInfo, RunSummary};
use crate::core::rate_limit::RateLimiter;
use crate::core::{ConfigProvider, Scenario};
use crate::utils::error::{LoadError, Result};
use crate::utils::monitor::SystemMonitor;
use chrono::Utc;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio::time::{interval, sleep_until, Instant, MissedTickBehavior};

pub const DEFAULT_PROGRESS_INTERVAL: Duration = Duration::from_secs(5);

#[derive(Debug, Clone, PartialEq)]
pub struct RunOptions {
    pub vus: usize,
    pub duration: Duration,
    pub rps: Option<u32>,
    pub graceful_stop: Duration,
    pub progress_interval: Duration,
}

impl RunOptions {
    pub fn from_config<C: ConfigProvider>(config: &C) -> Self {
        Self {
            vus: config.vus(),
            duration: config.duration(),
            rps: config.rps(),
            graceful_stop: config.graceful_stop(),
            progress_interval: DEFAULT_PROGRESS_INTERVAL,
        }
    }

    pub fn with_progress_interval(mut self, every: Duration) -> Self {
        self.progress_interval = every;
        self
    }
}

/// Drives a fixed pool of virtual users against a scenario for a fixed time.
pub struct LoadEngine<S: Scenario + 'static> {
    scenario: Arc<S>,
    options: RunOptions,
    monitor: Arc<SystemMonitor>,
}

impl<S: Scenario + 'static> LoadEngine<S> {
    pub fn new(scenario: S, options: RunOptions) -> Self {
        Self::new_with_monitoring(scenario, options, false)
    }

    pub fn new_with_monitoring(scenario: S, options: RunOptions, monitor_enabled: bool) -> Self {
        Self {
            scenario: Arc::new(scenario),
            options,
            monitor: Arc::new(SystemMonitor::new(monitor_enabled)),
        }
    }

    pub fn scenario(&self) -> &S {
        &self.scenario
    }

    pub async fn run(&self) -> Result<RunSummary> {
        let options = &self.options;
        tracing::info!(
            "🚀 Starting scenario '{}': {} VUs for {} against {}",
            self.scenario.name(),
            options.vus,
            humantime::format_duration(options.duration),
            self.scenario.target_url()
        );
        match options.rps {
            Some(rps) => tracing::info!("🚦 Request rate capped at {} req/s", rps),
            None => tracing::info!("🚦 Request rate uncapped"),
        }
        self.monitor.log_stats("Start");

        let collector = Arc::new(MetricsCollector::new(self.scenario.check_names()));
        let limiter = options.rps.map(|rps| Arc::new(RateLimiter::new(rps)));

        let started_at = Utc::now();
        let start = Instant::now();
        let window = start.checked_add(options.duration).and_then(|deadline| {
            Some((deadline, deadline.checked_add(options.graceful_stop)?))
        });
        let Some((deadline, hard_stop)) = window else {
            return Err(LoadError::RuntimeError {
                message: format!(
                    "run window of {} plus {} grace is out of range",
                    humantime::format_duration(options.duration),
                    humantime::format_duration(options.graceful_stop)
                ),
            });
        };

        let mut vus = JoinSet::new();
        for vu in 0..options.vus {
            vus.spawn(run_vu(
                vu,
                Arc::clone(&self.scenario),
                Arc::clone(&collector),
                limiter.clone(),
                deadline,
            ));
        }
        tracing::debug!("Spawned {} VUs", options.vus);

        let reporter = tokio::spawn(report_progress(
            Arc::clone(&collector),
            Arc::clone(&self.monitor),
            options.progress_interval,
            start,
        ));

        loop {
            tokio::select! {
                joined = vus.join_next() => match joined {
                    None => break,
                    Some(Ok(())) => {}
                    Some(Err(e)) if e.is_panic() => {
                        tracing::error!("❌ A VU panicked and stopped early: {}", e);
                    }
                    Some(Err(e)) => {
                        tracing::warn!("⚠️ A VU ended abnormally: {}", e);
                    }
                },
                _ = sleep_until(hard_stop) => {
                    let in_flight = vus.len() as u64;
                    tracing::warn!(
                        "⚠️ Graceful stop of {} elapsed, interrupting {} in-flight iterations",
                        humantime::format_duration(options.graceful_stop),
                        in_flight
                    );
                    collector.record_interrupted(in_flight);
                    vus.shutdown().await;
                    break;
                }
            }
        }
        reporter.abort();

        let elapsed = start.elapsed();
        self.monitor.log_stats("Finish");

        let mut summary = collector.summarize(RunInfo {
            scenario: self.scenario.name().to_string(),
            target_url: self.scenario.target_url().to_string(),
            started_at,
            elapsed,
            vus: options.vus,
            rps_limit: options.rps,
        });
        summary.resources = self.monitor.usage();

        tracing::info!(
            "✅ Run finished: {} requests in {:.1}s ({:.1} req/s)",
            summary.requests,
            summary.elapsed_secs,
            summary.requests_per_second
        );

        Ok(summary)
    }
}

async fn run_vu<S: Scenario + 'static>(
    vu: usize,
    scenario: Arc<S>,
    collector: Arc<MetricsCollector>,
    limiter: Option<Arc<RateLimiter>>,
    deadline: Instant,
) {
    while Instant::now() < deadline {
        if let Some(limiter) = &limiter {
            tokio::select! {
                _ = limiter.acquire() => {}
                _ = sleep_until(deadline) => break,
            }
        }

        let sample = scenario.iteration(vu).await;
        collector.record(&sample);
    }
}

async fn report_progress(
    collector: Arc<MetricsCollector>,
    monitor: Arc<SystemMonitor>,
    every: Duration,
    start: Instant,
) {
    let mut ticker = interval(every);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    // 第一個 tick 立即觸發，跳過
    ticker.tick().await;

    let mut last_requests = 0;
    loop {
        ticker.tick().await;
        let progress = collector.progress();
        let window = progress.requests.saturating_sub(last_requests);
        last_requests = progress.requests;

        tracing::info!(
            "⏱️ {:.0}s elapsed: {} requests ({:.1} req/s), {} failed iterations, {} transport errors",
            start.elapsed().as_secs_f64(),
            progress.requests,
            window as f64 / every.as_secs_f64(),
            progress.failed_iterations,
            progress.transport_errors
        );
        if monitor.is_enabled() {
            monitor.log_stats("Progress");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::Sample;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Scenario with a fixed per-iteration delay and alternating outcomes.
    struct FakeScenario {
        delay: Duration,
        calls: AtomicUsize,
    }

    impl FakeScenario {
        fn new(delay: Duration) -> Self {
            Self {
                delay,
                calls: AtomicUsize::new(0),
            }
        }
    }

    #[async_trait::async_trait]
    impl Scenario for FakeScenario {
        fn name(&self) -> &str {
            "fake"
        }

        fn target_url(&self) -> &str {
            "http://fake/api/v1/wallets/x/operation"
        }

        fn check_names(&self) -> Vec<String> {
            vec!["status is 200".to_string()]
        }

        async fn iteration(&self, _vu: usize) -> Sample {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            let ok = call % 2 == 0;
            Sample {
                latency: self.delay,
                status: Some(if ok { 200 } else { 500 }),
                check_results: vec![ok],
                error: None,
            }
        }
    }

    fn options(vus: usize, duration: Duration, rps: Option<u32>) -> RunOptions {
        RunOptions {
            vus,
            duration,
            rps,
            graceful_stop: Duration::from_secs(30),
            progress_interval: Duration::from_secs(1),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_rate_cap_bounds_request_count() {
        let engine = LoadEngine::new(
            FakeScenario::new(Duration::from_millis(1)),
            options(50, Duration::from_secs(2), Some(10)),
        );

        let summary = engine.run().await.unwrap();

        // 10 req/s over 2s, first permit immediate
        assert!(summary.requests >= 19 && summary.requests <= 21, "{}", summary.requests);
        assert_eq!(summary.interrupted_iterations, 0);
        assert_eq!(summary.vus, 50);
        assert_eq!(summary.rps_limit, Some(10));
    }

    #[tokio::test(start_paused = true)]
    async fn test_uncapped_vus_loop_until_deadline() {
        let engine = LoadEngine::new(
            FakeScenario::new(Duration::from_millis(100)),
            options(2, Duration::from_secs(1), None),
        );

        let summary = engine.run().await.unwrap();

        // 每個 VU 10 次迭代
        assert_eq!(summary.requests, 20);
        let check = summary.check("status is 200").unwrap();
        assert_eq!(check.passes + check.fails, 20);
        assert_eq!(check.passes, 10);
        assert_eq!(summary.status_count(500), 10);
    }

    #[tokio::test(start_paused = true)]
    async fn test_graceful_stop_interrupts_slow_iterations() {
        let mut opts = options(3, Duration::from_secs(1), None);
        opts.graceful_stop = Duration::from_secs(2);
        let engine = LoadEngine::new(FakeScenario::new(Duration::from_secs(60)), opts);

        let summary = engine.run().await.unwrap();

        assert_eq!(summary.requests, 0);
        assert_eq!(summary.interrupted_iterations, 3);
        assert!(summary.elapsed_secs >= 3.0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_iteration_completes_within_grace() {
        let engine = LoadEngine::new(
            FakeScenario::new(Duration::from_millis(1500)),
            options(1, Duration::from_secs(1), None),
        );

        let summary = engine.run().await.unwrap();

        assert_eq!(summary.requests, 1);
        assert_eq!(summary.interrupted_iterations, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_out_of_range_run_window_is_rejected() {
        let scenario = FakeScenario::new(Duration::from_millis(1));
        let engine = LoadEngine::new(scenario, options(1, Duration::MAX, None));

        let err = engine.run().await.unwrap_err();

        assert!(matches!(err, LoadError::RuntimeError { .. }));
        assert_eq!(engine.scenario().calls.load(Ordering::SeqCst), 0);
    }
}
