/*!
Test harness for the monitor

Wires a `PingMonitor` to a `ScriptedProbe` and offers slot-level assertions:
- raw ring contents in slot order (slot 0 first)
- per-slot and per-ring expectations that fail with a readable dump
- paused-clock helpers for stepping through ticks
*/

use anyhow::{bail, Result};
use pingplot_core::{Order, PingMonitor, Sample, Settings};
use std::time::Duration;
use tracing_subscriber::EnvFilter;

use crate::probe_stub::ScriptedProbe;

/// Route tracing output through the test writer. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("pingplot_core=debug")))
        .with_test_writer()
        .try_init();
}

pub struct TestHarness {
    pub probe: ScriptedProbe,
    pub monitor: PingMonitor,
}

impl TestHarness {
    pub fn new(settings: Settings, probe: ScriptedProbe) -> Result<Self> {
        init_tracing();
        let monitor = PingMonitor::new(&settings, probe.shared())?;
        Ok(Self { probe, monitor })
    }

    /// Build and start in one go.
    pub fn started(settings: Settings, probe: ScriptedProbe) -> Result<Self> {
        let harness = Self::new(settings, probe)?;
        harness.monitor.start()?;
        Ok(harness)
    }

    /// Let the (paused) clock run forward.
    pub async fn run_for(&self, duration: Duration) {
        tokio::time::sleep(duration).await;
    }

    /// Sleep until `period × ticks + period / 2`, the middle of a tick.
    pub async fn run_ticks(&self, ticks: u32) -> Result<()> {
        let period = self.monitor.timing().period()?;
        self.run_for(period * ticks + period / 2).await;
        Ok(())
    }

    /// Ring contents in slot order, slot 0 first.
    pub fn ring(&self, host: &str) -> Result<Vec<Sample>> {
        let capacity = self.monitor.capacity();
        let samples = self
            .monitor
            .reader()
            .read(host, None, Some(capacity - 1), Order::OldestFirst)?;
        Ok(samples)
    }

    pub fn count(&self, host: &str, wanted: Sample) -> Result<usize> {
        Ok(self.ring(host)?.into_iter().filter(|s| *s == wanted).count())
    }

    pub fn assert_slot(&self, host: &str, slot: usize, expected: Sample) -> Result<()> {
        let ring = self.ring(host)?;
        match ring.get(slot) {
            Some(actual) if *actual == expected => Ok(()),
            Some(actual) => bail!(
                "slot {slot} of {host}: expected {expected:?}, got {actual:?} (ring: {})",
                dump(&ring)
            ),
            None => bail!("slot {slot} out of range for {host} (capacity {})", ring.len()),
        }
    }

    pub fn assert_ring(&self, host: &str, expected: &[Sample]) -> Result<()> {
        let ring = self.ring(host)?;
        if ring != expected {
            bail!("ring of {host} mismatch:\n  expected {}\n  actual   {}", dump(expected), dump(&ring));
        }
        Ok(())
    }
}

fn dump(samples: &[Sample]) -> String {
    samples.iter().map(|s| s.to_string().trim().to_string()).collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::settings;
    use crate::probe_stub::Behavior;

    #[tokio::test(start_paused = true)]
    async fn test_harness_reads_rings_in_slot_order() {
        let harness = TestHarness::started(settings(&["a"], 4), ScriptedProbe::always(Behavior::Reply(3))).unwrap();
        harness.run_ticks(2).await.unwrap();

        harness
            .assert_ring("a", &[Sample::Pending, Sample::Latency(3), Sample::Latency(3), Sample::Pending])
            .unwrap();
        harness.assert_slot("a", 1, Sample::Latency(3)).unwrap();
        assert!(harness.assert_slot("a", 0, Sample::Latency(3)).is_err());
        assert_eq!(harness.count("a", Sample::Latency(3)).unwrap(), 2);
        assert_eq!(harness.probe.call_count(), 2);
    }

    #[tokio::test]
    async fn test_unknown_host_is_an_error() {
        let harness = TestHarness::new(settings(&["a"], 4), ScriptedProbe::default()).unwrap();
        assert!(harness.ring("zzz").is_err());
    }
}
