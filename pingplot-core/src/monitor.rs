/*!
 * PING MONITOR - the one handle presenters hold
 *
 * Wires registry, scheduler and reader together and owns the rule that every
 * membership change restarts a running scheduler with the new layout.
 * Mutations and start/stop are serialised so a restart always sees the layout
 * its own mutation produced.
 */

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::path::Path;
use std::sync::Arc;
use tracing::info;

use crate::config::{ConfigError, Settings};
use crate::health::{MonitorHealth, StatsSnapshot};
use crate::models::{Host, Sample};
use crate::probe::SharedProbe;
use crate::reader::{HostSeries, Order, SeriesReader};
use crate::registry::{HostRegistry, RegistryError};
use crate::scheduler::{ProbeScheduler, SchedulerError, Timing};

#[derive(Debug, thiserror::Error)]
pub enum MonitorError {
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    Scheduler(#[from] SchedulerError),
    #[error(transparent)]
    Config(#[from] ConfigError),
}

pub struct PingMonitor {
    registry: Arc<HostRegistry>,
    scheduler: ProbeScheduler,
    reader: SeriesReader,
    mutation: Mutex<()>,
    settings: Settings,
    started_at: DateTime<Utc>,
}

impl PingMonitor {
    /// Build a stopped monitor. Timing is validated here so a bad settings
    /// file fails before anything runs.
    pub fn new(settings: &Settings, probe: SharedProbe) -> Result<Self, MonitorError> {
        let timing = settings.timing();
        timing.period()?;

        let capacity = settings.num_of_values;
        let registry = Arc::new(HostRegistry::new(capacity, settings.addresses.iter().cloned())?);
        let scheduler = ProbeScheduler::new(probe, timing, capacity);
        let reader = SeriesReader::new(registry.clone(), scheduler.ticks());

        Ok(Self {
            registry,
            scheduler,
            reader,
            mutation: Mutex::new(()),
            settings: settings.clone(),
            started_at: Utc::now(),
        })
    }

    /// Start probing, or restart if already running.
    pub fn start(&self) -> Result<(), MonitorError> {
        let _guard = self.mutation.lock();
        self.scheduler.start(self.registry.layout())?;
        Ok(())
    }

    pub fn stop(&self) {
        let _guard = self.mutation.lock();
        self.scheduler.stop();
    }

    pub fn is_running(&self) -> bool {
        self.scheduler.is_running()
    }

    pub fn addresses(&self) -> Vec<Host> {
        self.registry.hosts()
    }

    pub fn append_address(&self, address: &str) -> Result<Host, MonitorError> {
        self.mutate(|registry| registry.append(address))
    }

    pub fn remove_address(&self, address: &str) -> Result<Host, MonitorError> {
        self.mutate(|registry| registry.remove(address))
    }

    pub fn remove_address_index(&self, index: usize) -> Result<Host, MonitorError> {
        self.mutate(|registry| registry.remove_at(index))
    }

    fn mutate<F>(&self, change: F) -> Result<Host, MonitorError>
    where
        F: FnOnce(&HostRegistry) -> Result<Host, RegistryError>,
    {
        let _guard = self.mutation.lock();
        let host = change(&self.registry)?;
        let restarted = self.scheduler.reload(self.registry.layout())?;
        info!(host = %host, hosts = self.registry.len(), restarted, "host list changed");
        Ok(host)
    }

    /// Newest-first samples for every host, walking back from `start_entry`
    /// (default the current tick) for `num_entries` slots (default and cap:
    /// the capacity).
    pub fn data_array(
        &self,
        start_entry: Option<usize>,
        num_entries: Option<usize>,
    ) -> Result<Vec<HostSeries>, MonitorError> {
        Ok(self.reader.read_all(num_entries, start_entry, Order::NewestFirst)?)
    }

    pub fn latest(&self, address: &str) -> Result<Sample, MonitorError> {
        Ok(self.reader.latest(address)?)
    }

    pub fn reader(&self) -> &SeriesReader {
        &self.reader
    }

    pub fn current_tick(&self) -> usize {
        self.reader.current_tick()
    }

    pub fn capacity(&self) -> usize {
        self.registry.capacity()
    }

    pub fn timing(&self) -> Timing {
        self.scheduler.timing()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.scheduler.stats()
    }

    pub fn health(&self) -> MonitorHealth {
        MonitorHealth {
            started_at: self.started_at,
            uptime_seconds: (Utc::now() - self.started_at).num_seconds().max(0) as u64,
            hosts_tracked: self.registry.len(),
            capacity: self.registry.capacity(),
            current_tick: self.current_tick(),
            running: self.is_running(),
            stats: self.scheduler.stats(),
        }
    }

    /// Settings reflecting the current host list, ready to be stored.
    pub fn settings(&self) -> Settings {
        Settings {
            addresses: self.registry.hosts(),
            ..self.settings.clone()
        }
    }

    pub async fn store_settings(&self, path: impl AsRef<Path>) -> Result<(), MonitorError> {
        self.settings().store(path).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::{Probe, ProbeError};
    use crate::storage::StoreError;
    use async_trait::async_trait;
    use std::time::Duration;

    struct Fixed(u32);

    #[async_trait]
    impl Probe for Fixed {
        async fn probe(&self, _host: &Host) -> Result<u32, ProbeError> {
            Ok(self.0)
        }
    }

    fn settings(addresses: &[&str], capacity: usize) -> Settings {
        Settings {
            addresses: addresses.iter().map(|a| Host::new(a).unwrap()).collect(),
            num_of_values: capacity,
            ..Settings::default()
        }
    }

    #[test]
    fn test_new_rejects_bad_timing() {
        let bad = Settings {
            ping_frequency: 0.0,
            ..Settings::default()
        };
        assert!(matches!(
            PingMonitor::new(&bad, Arc::new(Fixed(1))),
            Err(MonitorError::Scheduler(SchedulerError::InvalidTiming(_)))
        ));
    }

    #[test]
    fn test_new_rejects_oversized_ring() {
        let huge = settings(&["a", "b"], usize::MAX);
        assert!(matches!(
            PingMonitor::new(&huge, Arc::new(Fixed(1))),
            Err(MonitorError::Registry(RegistryError::Store(StoreError::TooLarge { hosts: 2, .. })))
        ));
    }

    #[test]
    fn test_mutations_while_stopped_do_not_start() {
        let monitor = PingMonitor::new(&settings(&["a"], 4), Arc::new(Fixed(1))).unwrap();
        monitor.append_address("b").unwrap();
        assert!(!monitor.is_running());
        assert_eq!(monitor.addresses(), vec![Host::new("a").unwrap(), Host::new("b").unwrap()]);

        assert!(matches!(
            monitor.remove_address_index(7),
            Err(MonitorError::Registry(RegistryError::IndexNotFound { index: 7, len: 2 }))
        ));
        assert_eq!(monitor.remove_address_index(0).unwrap(), "a");
        assert_eq!(monitor.settings().addresses, vec![Host::new("b").unwrap()]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_append_while_running_restarts() {
        let monitor = PingMonitor::new(&settings(&["a"], 8), Arc::new(Fixed(4))).unwrap();
        monitor.start().unwrap();
        tokio::time::sleep(Duration::from_millis(1250)).await;

        monitor.append_address("b").unwrap();
        assert!(monitor.is_running());
        assert_eq!(monitor.stats().restarts, 1);

        tokio::time::sleep(Duration::from_millis(600)).await;
        let data = monitor.data_array(None, Some(1)).unwrap();
        assert_eq!(data.len(), 2);
        assert!(data.iter().all(|series| series.samples == vec![Sample::Latency(4)]));

        let health = monitor.health();
        assert!(health.running);
        assert_eq!(health.hosts_tracked, 2);
        assert_eq!(health.capacity, 8);
        assert_eq!(health.current_tick, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_reports_not_running() {
        let monitor = PingMonitor::new(&settings(&["a"], 4), Arc::new(Fixed(4))).unwrap();
        monitor.start().unwrap();
        monitor.stop();
        assert!(!monitor.is_running());
        assert!(!monitor.health().running);
    }
}
