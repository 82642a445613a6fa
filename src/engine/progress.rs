//! Run-scoped counters.
//!
//! One `RunState` is built per run and dropped with it, so repeated or
//! concurrent runs never share counters. All fields are lock-free atomics;
//! they are advisory and never gate an outcome.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

/// Throughput snapshot emitted at most once per reporting interval.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Progress {
    pub processed: u64,
    pub elapsed: Duration,
    pub rate_per_sec: f64,
}

#[derive(Debug)]
pub struct RunState {
    started: Instant,
    interval_ms: u64,
    /// Milliseconds since `started` of the last emitted report.
    last_report_ms: AtomicU64,
    processed: AtomicU64,
    dropped_items: AtomicU64,
    dropped_dealers: AtomicU64,
}

impl RunState {
    pub fn new(interval: Duration) -> Self {
        Self {
            started: Instant::now(),
            interval_ms: interval.as_millis() as u64,
            last_report_ms: AtomicU64::new(0),
            processed: AtomicU64::new(0),
            dropped_items: AtomicU64::new(0),
            dropped_dealers: AtomicU64::new(0),
        }
    }

    /// Count one completed item. Returns a progress snapshot when this
    /// caller won the right to report for the current interval.
    pub fn record_completed(&self) -> Option<Progress> {
        self.record_completed_at(self.started.elapsed())
    }

    pub(crate) fn record_completed_at(&self, elapsed: Duration) -> Option<Progress> {
        let processed = self.processed.fetch_add(1, Ordering::Relaxed) + 1;
        let now_ms = elapsed.as_millis() as u64;
        let last = self.last_report_ms.load(Ordering::Relaxed);
        if now_ms.saturating_sub(last) < self.interval_ms {
            return None;
        }
        // Only one worker per window gets to report.
        self.last_report_ms
            .compare_exchange(last, now_ms, Ordering::AcqRel, Ordering::Relaxed)
            .ok()?;

        let secs = elapsed.as_secs_f64();
        let rate_per_sec = if secs > 0.0 {
            processed as f64 / secs
        } else {
            0.0
        };
        Some(Progress {
            processed,
            elapsed,
            rate_per_sec,
        })
    }

    pub fn record_dropped_item(&self) {
        self.dropped_items.fetch_add(1, Ordering::Relaxed);
    }

    pub fn record_dropped_dealers(&self, n: u64) {
        self.dropped_dealers.fetch_add(n, Ordering::Relaxed);
    }

    pub fn processed(&self) -> u64 {
        self.processed.load(Ordering::Relaxed)
    }

    pub fn dropped_items(&self) -> u64 {
        self.dropped_items.load(Ordering::Relaxed)
    }

    pub fn dropped_dealers(&self) -> u64 {
        self.dropped_dealers.load(Ordering::Relaxed)
    }

    pub fn elapsed(&self) -> Duration {
        self.started.elapsed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reports_at_most_once_per_interval() {
        let state = RunState::new(Duration::from_secs(5));

        assert!(state.record_completed_at(Duration::from_secs(1)).is_none());
        assert!(state.record_completed_at(Duration::from_millis(4_999)).is_none());

        let report = state
            .record_completed_at(Duration::from_secs(5))
            .expect("first report due at 5s");
        assert_eq!(report.processed, 3);
        assert!((report.rate_per_sec - 0.6).abs() < 1e-9);

        assert!(state.record_completed_at(Duration::from_secs(6)).is_none());
        assert!(state.record_completed_at(Duration::from_secs(10)).is_some());
        assert_eq!(state.processed(), 5);
    }

    #[test]
    fn fresh_state_per_run() {
        let first = RunState::new(Duration::from_secs(5));
        first.record_completed();
        first.record_dropped_item();

        let second = RunState::new(Duration::from_secs(5));
        assert_eq!(second.processed(), 0);
        assert_eq!(second.dropped_items(), 0);
    }
}
