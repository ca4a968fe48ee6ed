use crate::core::metrics::ResourceUsage;

#[cfg(feature = "cli")]
use std::sync::Mutex;
#[cfg(feature = "cli")]
use std::time::{Duration, Instant};
#[cfg(feature = "cli")]
use sysinfo::{Pid, RefreshKind, System};

#[cfg(feature = "cli")]
#[derive(Debug, Clone)]
pub struct SystemStats {
    pub cpu_usage: f32,
    pub memory_usage_mb: u64,
    pub memory_usage_percent: f32,
    pub elapsed_time: Duration,
}

#[cfg(feature = "cli")]
#[derive(Debug, Default)]
struct Accumulated {
    samples: u64,
    cpu_total: f64,
    peak_cpu: f32,
    peak_memory_mb: u64,
}

/// Samples this process's CPU and memory while a run is in progress.
///
/// The load generator itself can become the bottleneck at high VU counts;
/// the peaks end up in the run summary so a saturated client is visible.
#[cfg(feature = "cli")]
pub struct SystemMonitor {
    system: Mutex<System>,
    pid: Option<Pid>,
    start_time: Instant,
    accumulated: Mutex<Accumulated>,
    enabled: bool,
}

#[cfg(feature = "cli")]
impl SystemMonitor {
    pub fn new(enabled: bool) -> Self {
        let mut system = System::new_with_specifics(RefreshKind::everything());

        let pid = match sysinfo::get_current_pid() {
            Ok(pid) => Some(pid),
            Err(e) => {
                tracing::warn!("⚠️ System monitoring unavailable: {}", e);
                None
            }
        };

        // 初始刷新，讓第一次 CPU 取樣有基準
        if enabled {
            system.refresh_all();
        }

        Self {
            system: Mutex::new(system),
            pid,
            start_time: Instant::now(),
            accumulated: Mutex::new(Accumulated::default()),
            enabled: enabled && pid.is_some(),
        }
    }

    pub fn sample(&self) -> Option<SystemStats> {
        if !self.enabled {
            return None;
        }

        let mut system = self.system.lock().ok()?;
        system.refresh_all();

        let process = system.process(self.pid?)?;
        let memory_mb = process.memory() / 1024 / 1024;
        let total_memory = system.total_memory() / 1024 / 1024;
        let memory_percent = if total_memory > 0 {
            (memory_mb as f32 / total_memory as f32) * 100.0
        } else {
            0.0
        };
        let cpu_usage = process.cpu_usage();

        let mut acc = self.accumulated.lock().ok()?;
        acc.samples += 1;
        acc.cpu_total += f64::from(cpu_usage);
        acc.peak_cpu = acc.peak_cpu.max(cpu_usage);
        acc.peak_memory_mb = acc.peak_memory_mb.max(memory_mb);

        Some(SystemStats {
            cpu_usage,
            memory_usage_mb: memory_mb,
            memory_usage_percent: memory_percent,
            elapsed_time: self.start_time.elapsed(),
        })
    }

    pub fn log_stats(&self, phase: &str) {
        if let Some(stats) = self.sample() {
            tracing::info!(
                "📊 {} - CPU: {:.1}%, Memory: {}MB ({:.1}%), Time: {:?}",
                phase,
                stats.cpu_usage,
                stats.memory_usage_mb,
                stats.memory_usage_percent,
                stats.elapsed_time
            );
        }
    }

    pub fn usage(&self) -> Option<ResourceUsage> {
        if !self.enabled {
            return None;
        }
        let acc = self.accumulated.lock().ok()?;
        if acc.samples == 0 {
            return None;
        }
        Some(ResourceUsage {
            samples: acc.samples,
            average_cpu_percent: acc.cpu_total / acc.samples as f64,
            peak_cpu_percent: f64::from(acc.peak_cpu),
            peak_memory_mb: acc.peak_memory_mb,
        })
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }
}

#[cfg(feature = "cli")]
impl Default for SystemMonitor {
    fn default() -> Self {
        Self::new(false)
    }
}

// 非 CLI 環境的空實現
#[cfg(not(feature = "cli"))]
#[derive(Default)]
pub struct SystemMonitor;

#[cfg(not(feature = "cli"))]
impl SystemMonitor {
    pub fn new(_enabled: bool) -> Self {
        Self
    }

    pub fn log_stats(&self, _phase: &str) {}

    pub fn usage(&self) -> Option<ResourceUsage> {
        None
    }

    pub fn is_enabled(&self) -> bool {
        false
    }
}

#[cfg(all(test, feature = "cli"))]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_monitor_reports_nothing() {
        let monitor = SystemMonitor::new(false);
        assert!(!monitor.is_enabled());
        assert!(monitor.sample().is_none());
        assert!(monitor.usage().is_none());
    }

    #[test]
    fn test_enabled_monitor_tracks_peaks() {
        let monitor = SystemMonitor::new(true);
        if !monitor.is_enabled() {
            return;
        }
        monitor.sample();
        monitor.sample();
        let usage = monitor.usage().unwrap();
        assert_eq!(usage.samples, 2);
        assert!(usage.peak_memory_mb > 0);
        assert!(usage.peak_cpu_percent >= usage.average_cpu_percent);
    }
}
