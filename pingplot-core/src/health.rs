use chrono::{DateTime, Utc};
use serde::Serialize;
use std::sync::atomic::AtomicU64;
use std::sync::atomic::Ordering::Relaxed;

use crate::probe::ProbeError;

/// Counters updated by the scheduler and its probe tasks.
#[derive(Debug, Default)]
pub struct SchedulerStats {
    ticks: AtomicU64,
    ticks_missed: AtomicU64,
    probes_issued: AtomicU64,
    probes_ok: AtomicU64,
    probes_failed: AtomicU64,
    probes_timed_out: AtomicU64,
    probes_skipped: AtomicU64,
    probe_panics: AtomicU64,
    restarts: AtomicU64,
    faults: AtomicU64,
}

/// Point-in-time copy of [`SchedulerStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct StatsSnapshot {
    pub ticks: u64,
    pub ticks_missed: u64,
    pub probes_issued: u64,
    pub probes_ok: u64,
    /// Includes timeouts and panics.
    pub probes_failed: u64,
    pub probes_timed_out: u64,
    pub probes_skipped: u64,
    pub probe_panics: u64,
    pub restarts: u64,
    pub faults: u64,
}

impl SchedulerStats {
    pub(crate) fn record_tick(&self) {
        self.ticks.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_missed(&self, count: u64) {
        self.ticks_missed.fetch_add(count, Relaxed);
    }

    pub(crate) fn record_issued(&self) {
        self.probes_issued.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_skipped(&self) {
        self.probes_skipped.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_outcome(&self, outcome: &Result<u32, ProbeError>) {
        match outcome {
            Ok(_) => {
                self.probes_ok.fetch_add(1, Relaxed);
            }
            Err(e) => {
                self.probes_failed.fetch_add(1, Relaxed);
                if e.is_timeout() {
                    self.probes_timed_out.fetch_add(1, Relaxed);
                }
                if e.is_panic() {
                    self.probe_panics.fetch_add(1, Relaxed);
                }
            }
        }
    }

    pub(crate) fn record_restart(&self) {
        self.restarts.fetch_add(1, Relaxed);
    }

    pub(crate) fn record_fault(&self) {
        self.faults.fetch_add(1, Relaxed);
    }

    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ticks: self.ticks.load(Relaxed),
            ticks_missed: self.ticks_missed.load(Relaxed),
            probes_issued: self.probes_issued.load(Relaxed),
            probes_ok: self.probes_ok.load(Relaxed),
            probes_failed: self.probes_failed.load(Relaxed),
            probes_timed_out: self.probes_timed_out.load(Relaxed),
            probes_skipped: self.probes_skipped.load(Relaxed),
            probe_panics: self.probe_panics.load(Relaxed),
            restarts: self.restarts.load(Relaxed),
            faults: self.faults.load(Relaxed),
        }
    }
}

/// Health report for presenters, see `PingMonitor::health`.
#[derive(Debug, Clone, Serialize)]
pub struct MonitorHealth {
    pub started_at: DateTime<Utc>,
    pub uptime_seconds: u64,
    pub hosts_tracked: usize,
    pub capacity: usize,
    pub current_tick: usize,
    pub running: bool,
    pub stats: StatsSnapshot,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_outcomes_are_classified() {
        let stats = SchedulerStats::default();
        stats.record_outcome(&Ok(12));
        stats.record_outcome(&Err(ProbeError::Timeout(Duration::from_secs(5))));
        stats.record_outcome(&Err(ProbeError::Panicked("boom".into())));
        stats.record_outcome(&Err(ProbeError::Unreachable("x".into())));

        let snap = stats.snapshot();
        assert_eq!(snap.probes_ok, 1);
        assert_eq!(snap.probes_failed, 3);
        assert_eq!(snap.probes_timed_out, 1);
        assert_eq!(snap.probe_panics, 1);
    }

    #[test]
    fn test_snapshot_serializes() {
        let stats = SchedulerStats::default();
        stats.record_tick();
        stats.record_missed(2);
        let json = serde_json::to_value(stats.snapshot()).unwrap();
        assert_eq!(json["ticks"], 1);
        assert_eq!(json["ticks_missed"], 2);
    }
}
