//! Per-tool rolling performance statistics
//!
//! Each tool gets a sliding window of recent invocation outcomes (last N
//! samples or last T seconds, whichever is smaller). Writes for the same
//! tool are serialized behind a per-tool lock; reads take a copy of the
//! window so they never block writers.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, RwLock};
use std::time::{Duration, Instant};

/// Sliding window bounds
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WindowConfig {
    /// Maximum samples retained per tool
    pub max_samples: usize,

    /// Maximum sample age
    #[serde(with = "humantime_serde")]
    pub max_age: Duration,
}

impl Default for WindowConfig {
    fn default() -> Self {
        Self {
            max_samples: 50,
            max_age: Duration::from_secs(60),
        }
    }
}

/// One recorded invocation outcome
#[derive(Debug, Clone, Copy)]
struct OutcomeSample {
    latency: Duration,
    success: bool,
    at: Instant,
}

/// Read-only statistics snapshot for a tool
#[derive(Debug, Clone, PartialEq)]
pub struct ToolStats {
    /// Median latency over the window
    pub p50: Duration,

    /// 95th percentile latency over the window
    pub p95: Duration,

    /// Fraction of successful invocations in [0, 1]
    pub success_rate: f64,

    /// Invocations completed within the window, scaled to one minute
    pub throughput_per_minute: f64,

    /// Number of samples the snapshot was computed from
    pub sample_count: usize,
}

#[derive(Debug, Default)]
struct SampleWindow {
    samples: VecDeque<OutcomeSample>,
}

impl SampleWindow {
    fn push(&mut self, sample: OutcomeSample, config: &WindowConfig) {
        self.evict(config, sample.at);
        if self.samples.len() >= config.max_samples {
            self.samples.pop_front();
        }
        self.samples.push_back(sample);
    }

    fn evict(&mut self, config: &WindowConfig, now: Instant) {
        while let Some(front) = self.samples.front() {
            if now.duration_since(front.at) > config.max_age {
                self.samples.pop_front();
            } else {
                break;
            }
        }
    }

    fn snapshot(&self, config: &WindowConfig, now: Instant) -> Vec<OutcomeSample> {
        self.samples
            .iter()
            .filter(|s| now.duration_since(s.at) <= config.max_age)
            .copied()
            .collect()
    }
}

/// Rolling latency/success/throughput statistics per tool
pub struct PerformanceMonitor {
    windows: RwLock<HashMap<String, Arc<Mutex<SampleWindow>>>>,
    config: WindowConfig,
}

impl PerformanceMonitor {
    /// Create a monitor with default window bounds
    pub fn new() -> Self {
        Self::with_config(WindowConfig::default())
    }

    /// Create a monitor with custom window bounds
    pub fn with_config(config: WindowConfig) -> Self {
        Self {
            windows: RwLock::new(HashMap::new()),
            config,
        }
    }

    /// Record one invocation outcome for a tool
    ///
    /// Appends to the tool's window, evicting the oldest sample when the
    /// window is full. Concurrent recordings for the same tool are
    /// serialized; recordings for different tools do not contend.
    pub fn record_outcome(&self, tool_id: &str, latency: Duration, success: bool) {
        let window = self.window_for(tool_id);
        let sample = OutcomeSample {
            latency,
            success,
            at: Instant::now(),
        };
        window.lock().unwrap().push(sample, &self.config);
    }

    /// Read-only statistics snapshot for a tool
    ///
    /// Returns `None` when no samples are in the window. The snapshot is
    /// computed from a copy of the window and never blocks writers beyond
    /// the copy itself.
    pub fn stats(&self, tool_id: &str) -> Option<ToolStats> {
        let window = {
            let windows = self.windows.read().unwrap();
            windows.get(tool_id).cloned()?
        };
        let now = Instant::now();
        let samples = window.lock().unwrap().snapshot(&self.config, now);
        if samples.is_empty() {
            return None;
        }

        let mut latencies: Vec<Duration> = samples.iter().map(|s| s.latency).collect();
        latencies.sort_unstable();
        let successes = samples.iter().filter(|s| s.success).count();
        let window_minutes = self.config.max_age.as_secs_f64() / 60.0;

        Some(ToolStats {
            p50: percentile(&latencies, 0.50),
            p95: percentile(&latencies, 0.95),
            success_rate: successes as f64 / samples.len() as f64,
            throughput_per_minute: samples.len() as f64 / window_minutes.max(f64::EPSILON),
            sample_count: samples.len(),
        })
    }

    /// Drop all samples for a tool (used on deregistration)
    pub fn forget(&self, tool_id: &str) {
        self.windows.write().unwrap().remove(tool_id);
    }

    fn window_for(&self, tool_id: &str) -> Arc<Mutex<SampleWindow>> {
        if let Some(window) = self.windows.read().unwrap().get(tool_id) {
            return window.clone();
        }
        let mut windows = self.windows.write().unwrap();
        windows
            .entry(tool_id.to_string())
            .or_insert_with(|| Arc::new(Mutex::new(SampleWindow::default())))
            .clone()
    }
}

impl Default for PerformanceMonitor {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for PerformanceMonitor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PerformanceMonitor")
            .field("tracked_tools", &self.windows.read().unwrap().len())
            .field("config", &self.config)
            .finish()
    }
}

/// Nearest-rank percentile over sorted latencies
fn percentile(sorted: &[Duration], q: f64) -> Duration {
    if sorted.is_empty() {
        return Duration::ZERO;
    }
    let rank = (q * sorted.len() as f64).ceil() as usize;
    sorted[rank.saturating_sub(1).min(sorted.len() - 1)]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_stats_empty() {
        let monitor = PerformanceMonitor::new();
        assert!(monitor.stats("places").is_none());
    }

    #[test]
    fn test_record_and_stats() {
        let monitor = PerformanceMonitor::new();
        for latency_ms in [100, 200, 300, 400] {
            monitor.record_outcome("places", Duration::from_millis(latency_ms), true);
        }
        monitor.record_outcome("places", Duration::from_millis(500), false);

        let stats = monitor.stats("places").unwrap();
        assert_eq!(stats.sample_count, 5);
        assert_eq!(stats.success_rate, 0.8);
        assert_eq!(stats.p95, Duration::from_millis(500));
        assert_eq!(stats.p50, Duration::from_millis(300));
        assert!(stats.throughput_per_minute > 0.0);
    }

    #[test]
    fn test_window_evicts_oldest_when_full() {
        let config = WindowConfig {
            max_samples: 3,
            max_age: Duration::from_secs(60),
        };
        let monitor = PerformanceMonitor::with_config(config);

        monitor.record_outcome("places", Duration::from_millis(10), false);
        for _ in 0..3 {
            monitor.record_outcome("places", Duration::from_millis(10), true);
        }

        // The initial failure was evicted
        let stats = monitor.stats("places").unwrap();
        assert_eq!(stats.sample_count, 3);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[test]
    fn test_window_evicts_by_age() {
        let config = WindowConfig {
            max_samples: 50,
            max_age: Duration::from_millis(0),
        };
        let monitor = PerformanceMonitor::with_config(config);
        monitor.record_outcome("places", Duration::from_millis(10), true);

        std::thread::sleep(Duration::from_millis(5));
        assert!(monitor.stats("places").is_none());
    }

    #[test]
    fn test_tools_are_independent() {
        let monitor = PerformanceMonitor::new();
        monitor.record_outcome("a", Duration::from_millis(10), true);
        monitor.record_outcome("b", Duration::from_millis(10), false);

        assert_eq!(monitor.stats("a").unwrap().success_rate, 1.0);
        assert_eq!(monitor.stats("b").unwrap().success_rate, 0.0);
    }

    #[test]
    fn test_forget() {
        let monitor = PerformanceMonitor::new();
        monitor.record_outcome("places", Duration::from_millis(10), true);
        monitor.forget("places");
        assert!(monitor.stats("places").is_none());
    }

    #[test]
    fn test_concurrent_recording_does_not_corrupt_window() {
        let monitor = Arc::new(PerformanceMonitor::new());
        let mut handles = Vec::new();
        for _ in 0..8 {
            let monitor = monitor.clone();
            handles.push(std::thread::spawn(move || {
                for _ in 0..100 {
                    monitor.record_outcome("places", Duration::from_millis(5), true);
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = monitor.stats("places").unwrap();
        assert_eq!(stats.sample_count, 50);
        assert_eq!(stats.success_rate, 1.0);
    }

    #[test]
    fn test_percentile_nearest_rank() {
        let latencies: Vec<Duration> = (1..=100).map(Duration::from_millis).collect();
        assert_eq!(percentile(&latencies, 0.95), Duration::from_millis(95));
        assert_eq!(percentile(&latencies, 0.50), Duration::from_millis(50));
    }
}
