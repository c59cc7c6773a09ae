//! Running engine statistics.

use std::time::Duration;

use serde::Serialize;

/// Fallback average used by wait estimates before any entry has completed.
const DEFAULT_AVG_PROCESSING_MS: f64 = 3000.0;

/// Counters and running mean, updated on terminal transitions.
#[derive(Debug, Clone, Default)]
pub struct EngineStats {
    total_processed: u64,
    total_failed: u64,
    /// Incremental mean over successful completions only.
    average_processing_ms: f64,
}

impl EngineStats {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a terminal success and fold its duration into the mean.
    pub fn record_success(&mut self, elapsed: Duration) {
        self.total_processed += 1;
        let n = self.total_processed as f64;
        let this = elapsed.as_millis() as f64;
        self.average_processing_ms = (self.average_processing_ms * (n - 1.0) + this) / n;
    }

    /// Record a terminal failure (retries exhausted).
    pub fn record_failure(&mut self) {
        self.total_failed += 1;
    }

    pub fn total_processed(&self) -> u64 {
        self.total_processed
    }

    pub fn total_failed(&self) -> u64 {
        self.total_failed
    }

    /// Mean processing duration, defaulting to 3000 ms with no history.
    pub fn average_processing(&self) -> Duration {
        if self.total_processed == 0 {
            Duration::from_millis(DEFAULT_AVG_PROCESSING_MS as u64)
        } else {
            Duration::from_millis(self.average_processing_ms as u64)
        }
    }

    /// Advisory wait estimate for a queued entry at `position` (1-based):
    /// `ceil(position / max_concurrent) * average_processing`.
    pub fn estimate_wait(&self, position: usize, max_concurrent: usize) -> Duration {
        let slots = max_concurrent.max(1);
        let rounds = position.div_ceil(slots) as u32;
        self.average_processing() * rounds
    }

    /// Build a serializable snapshot with on-demand load figures.
    pub fn snapshot(
        &self,
        queued: usize,
        in_flight: usize,
        max_concurrent: usize,
    ) -> StatsSnapshot {
        let load = if max_concurrent == 0 {
            0.0
        } else {
            in_flight as f64 / max_concurrent as f64 * 100.0
        };
        StatsSnapshot {
            total_processed: self.total_processed,
            total_failed: self.total_failed,
            average_processing_ms: self.average_processing().as_millis() as u64,
            current_load_pct: load,
            queued,
            in_flight,
        }
    }
}

/// Point-in-time view of engine statistics for the API layer.
#[derive(Debug, Clone, Serialize)]
pub struct StatsSnapshot {
    pub total_processed: u64,
    pub total_failed: u64,
    pub average_processing_ms: u64,
    /// `in_flight / max_concurrent` as a percentage.
    pub current_load_pct: f64,
    pub queued: usize,
    pub in_flight: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn average_defaults_to_3000ms_without_history() {
        let stats = EngineStats::new();
        assert_eq!(stats.average_processing(), Duration::from_millis(3000));
    }

    #[test]
    fn running_mean_over_successes() {
        let mut stats = EngineStats::new();
        stats.record_success(Duration::from_millis(100));
        assert_eq!(stats.average_processing(), Duration::from_millis(100));

        stats.record_success(Duration::from_millis(300));
        assert_eq!(stats.average_processing(), Duration::from_millis(200));

        stats.record_success(Duration::from_millis(200));
        assert_eq!(stats.average_processing(), Duration::from_millis(200));
        assert_eq!(stats.total_processed(), 3);
    }

    #[test]
    fn failures_do_not_touch_the_mean() {
        let mut stats = EngineStats::new();
        stats.record_success(Duration::from_millis(500));
        stats.record_failure();
        stats.record_failure();

        assert_eq!(stats.total_failed(), 2);
        assert_eq!(stats.average_processing(), Duration::from_millis(500));
    }

    #[test]
    fn wait_estimate_rounds_up_by_slot_count() {
        let mut stats = EngineStats::new();
        stats.record_success(Duration::from_millis(1000));

        // 10 slots: positions 1-10 wait one round, 11 waits two.
        assert_eq!(stats.estimate_wait(1, 10), Duration::from_millis(1000));
        assert_eq!(stats.estimate_wait(10, 10), Duration::from_millis(1000));
        assert_eq!(stats.estimate_wait(11, 10), Duration::from_millis(2000));
        // max_concurrent of 0 is treated as 1 rather than dividing by zero.
        assert_eq!(stats.estimate_wait(2, 0), Duration::from_millis(2000));
    }

    #[test]
    fn snapshot_computes_load_percentage() {
        let stats = EngineStats::new();
        let snap = stats.snapshot(5, 4, 10);
        assert_eq!(snap.queued, 5);
        assert_eq!(snap.in_flight, 4);
        assert!((snap.current_load_pct - 40.0).abs() < f64::EPSILON);

        let idle = stats.snapshot(0, 0, 0);
        assert_eq!(idle.current_load_pct, 0.0);
    }
}
