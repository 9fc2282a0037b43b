//! Latency tracker — lock-free lifetime aggregates plus a windowed profile.
//!
//! Recording is safe from any thread. Lifetime count/sum/min/max are plain
//! atomics; min and max use explicit compare-exchange retry loops to stay off
//! any lock on the per-sample path. The sliding window used for percentiles
//! and jitter is a separate mutex-guarded buffer, appended only when
//! profiling is enabled.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

/// Tuning for the tracker.
#[derive(Debug, Clone)]
pub struct LatencyConfig {
    /// Advisory per-token latency budget, surfaced in status reporting.
    pub target_latency: Duration,
    /// Sliding-window capacity (samples).
    pub sample_window: usize,
    /// When false, only lifetime aggregates are kept.
    pub enable_profiling: bool,
}

impl Default for LatencyConfig {
    fn default() -> Self {
        Self {
            target_latency: Duration::from_micros(1000),
            sample_window: 1000,
            enable_profiling: true,
        }
    }
}

/// Snapshot of tracker state. All zero when nothing has been recorded.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct LatencyStats {
    pub avg_us: u64,
    pub min_us: u64,
    pub max_us: u64,
    pub p95_us: u64,
    pub p99_us: u64,
    /// Standard deviation of the window around the lifetime mean, in ms.
    pub jitter_ms: f64,
    pub measurements: u64,
}

/// Concurrent latency recorder with streaming percentile snapshots.
pub struct LatencyTracker {
    config: LatencyConfig,
    count: AtomicU64,
    sum_us: AtomicU64,
    min_us: AtomicU64,
    max_us: AtomicU64,
    window: Mutex<VecDeque<u64>>,
}

impl LatencyTracker {
    pub fn new(config: LatencyConfig) -> Self {
        let capacity = config.sample_window;
        Self {
            config,
            count: AtomicU64::new(0),
            sum_us: AtomicU64::new(0),
            min_us: AtomicU64::new(u64::MAX),
            max_us: AtomicU64::new(0),
            window: Mutex::new(VecDeque::with_capacity(capacity)),
        }
    }

    pub fn target_latency(&self) -> Duration {
        self.config.target_latency
    }

    /// Starts a scoped measurement; the elapsed time is recorded when the
    /// returned span is dropped or explicitly finished.
    pub fn start_span(&self) -> LatencySpan<'_> {
        LatencySpan {
            tracker: self,
            start: Instant::now(),
        }
    }

    /// Records one duration from any thread.
    pub fn record(&self, latency: Duration) {
        let latency_us = latency.as_micros() as u64;

        self.count.fetch_add(1, Ordering::Relaxed);
        self.sum_us.fetch_add(latency_us, Ordering::Relaxed);

        let mut current = self.min_us.load(Ordering::Relaxed);
        while latency_us < current {
            match self.min_us.compare_exchange_weak(
                current,
                latency_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        let mut current = self.max_us.load(Ordering::Relaxed);
        while latency_us > current {
            match self.max_us.compare_exchange_weak(
                current,
                latency_us,
                Ordering::Relaxed,
                Ordering::Relaxed,
            ) {
                Ok(_) => break,
                Err(observed) => current = observed,
            }
        }

        if self.config.enable_profiling {
            let mut window = self.window.lock().expect("latency window poisoned");
            window.push_back(latency_us);
            if window.len() > self.config.sample_window {
                window.pop_front();
            }
        }
    }

    /// Snapshots lifetime aggregates plus window percentiles and jitter.
    pub fn stats(&self) -> LatencyStats {
        let measurements = self.count.load(Ordering::Relaxed);
        if measurements == 0 {
            return LatencyStats::default();
        }

        let avg_us = self.sum_us.load(Ordering::Relaxed) / measurements;
        let mut stats = LatencyStats {
            avg_us,
            min_us: self.min_us.load(Ordering::Relaxed),
            max_us: self.max_us.load(Ordering::Relaxed),
            measurements,
            ..LatencyStats::default()
        };

        if self.config.enable_profiling {
            let window = self.window.lock().expect("latency window poisoned");
            if !window.is_empty() {
                let mut sorted: Vec<u64> = window.iter().copied().collect();
                sorted.sort_unstable();

                let last = sorted.len() - 1;
                let p95_idx = ((sorted.len() as f64 * 0.95) as usize).min(last);
                let p99_idx = ((sorted.len() as f64 * 0.99) as usize).min(last);
                stats.p95_us = sorted[p95_idx];
                stats.p99_us = sorted[p99_idx];

                let mean = avg_us as f64;
                let variance: f64 = sorted
                    .iter()
                    .map(|&s| {
                        let diff = s as f64 - mean;
                        diff * diff
                    })
                    .sum::<f64>()
                    / sorted.len() as f64;
                stats.jitter_ms = variance.sqrt() / 1000.0;
            }
        }

        stats
    }

    /// Clears lifetime counters and the window.
    ///
    /// The window lock is held across the counter stores so a concurrent
    /// snapshot never pairs a pre-reset window with post-reset counters.
    pub fn reset(&self) {
        let mut window = self.window.lock().expect("latency window poisoned");
        self.count.store(0, Ordering::Relaxed);
        self.sum_us.store(0, Ordering::Relaxed);
        self.min_us.store(u64::MAX, Ordering::Relaxed);
        self.max_us.store(0, Ordering::Relaxed);
        window.clear();
    }
}

/// RAII measurement scope. Records elapsed time into its tracker on drop.
pub struct LatencySpan<'a> {
    tracker: &'a LatencyTracker,
    start: Instant,
}

impl LatencySpan<'_> {
    /// Ends the measurement now. Equivalent to dropping the span.
    pub fn finish(self) {}

    pub fn elapsed(&self) -> Duration {
        self.start.elapsed()
    }
}

impl Drop for LatencySpan<'_> {
    fn drop(&mut self) {
        self.tracker.record(self.start.elapsed());
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    fn tracker_with_window(n: usize) -> LatencyTracker {
        LatencyTracker::new(LatencyConfig {
            sample_window: n,
            ..LatencyConfig::default()
        })
    }

    #[test]
    fn empty_tracker_reports_zeros() {
        let tracker = tracker_with_window(10);
        assert_eq!(tracker.stats(), LatencyStats::default());
    }

    #[test]
    fn five_sample_snapshot() {
        let tracker = tracker_with_window(100);
        for us in [10, 20, 30, 40, 50] {
            tracker.record(Duration::from_micros(us));
        }

        let stats = tracker.stats();
        assert_eq!(stats.min_us, 10);
        assert_eq!(stats.max_us, 50);
        assert_eq!(stats.avg_us, 30);
        // floor(5 * 0.95) = 4 → last element for both percentiles.
        assert_eq!(stats.p95_us, 50);
        assert_eq!(stats.p99_us, 50);
        assert_eq!(stats.measurements, 5);
    }

    #[test]
    fn window_evicts_oldest() {
        let tracker = tracker_with_window(3);
        for us in [100, 1, 2, 3] {
            tracker.record(Duration::from_micros(us));
        }

        let stats = tracker.stats();
        // Lifetime max survives eviction; the window no longer holds 100.
        assert_eq!(stats.max_us, 100);
        assert_eq!(stats.p99_us, 3);
    }

    #[test]
    fn profiling_disabled_skips_window() {
        let tracker = LatencyTracker::new(LatencyConfig {
            enable_profiling: false,
            ..LatencyConfig::default()
        });
        tracker.record(Duration::from_micros(42));

        let stats = tracker.stats();
        assert_eq!(stats.avg_us, 42);
        assert_eq!(stats.p95_us, 0);
        assert_eq!(stats.jitter_ms, 0.0);
    }

    #[test]
    fn span_records_on_drop() {
        let tracker = tracker_with_window(10);
        {
            let _span = tracker.start_span();
        }
        assert_eq!(tracker.stats().measurements, 1);
    }

    #[test]
    fn reset_clears_everything() {
        let tracker = tracker_with_window(10);
        tracker.record(Duration::from_micros(10));
        tracker.reset();
        assert_eq!(tracker.stats(), LatencyStats::default());
    }

    #[test]
    fn concurrent_recorders_agree_on_totals() {
        let tracker = Arc::new(tracker_with_window(10_000));
        let mut handles = Vec::new();
        for _ in 0..4 {
            let tracker = Arc::clone(&tracker);
            handles.push(std::thread::spawn(move || {
                for us in 1..=500u64 {
                    tracker.record(Duration::from_micros(us));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        let stats = tracker.stats();
        assert_eq!(stats.measurements, 2000);
        assert_eq!(stats.min_us, 1);
        assert_eq!(stats.max_us, 500);
    }
}
