/*!
 * PINGPLOT CORE - rolling latency sampling for a set of hosts
 *
 * A fixed-rate scheduler probes every registered host once per tick and
 * records the result in a per-host ring of `capacity` slots. All rings share
 * the same tick cursor, so slot `n` of every ring holds the same moment in
 * time. Readers walk the rings backward from the cursor without ever blocking
 * the scheduler.
 *
 *   PingMonitor ── HostRegistry ── Layout { hosts, SampleStore }
 *        │                                     ▲
 *        ├──────── ProbeScheduler ─────────────┤ (writes)
 *        │              │ TickPublisher        │
 *        └──────── SeriesReader ── TickReader ─┘ (reads)
 */

pub mod config;
pub mod health;
pub mod models;
pub mod monitor;
pub mod probe;
pub mod reader;
pub mod registry;
pub mod scheduler;
pub mod storage;
pub mod tick;

pub use config::{ConfigError, ParsedSettings, Settings};
pub use health::{MonitorHealth, SchedulerStats, StatsSnapshot};
pub use models::{Host, Sample};
pub use monitor::{MonitorError, PingMonitor};
pub use probe::{bounded_probe, Probe, ProbeError, SharedProbe};
pub use reader::{HostSeries, Order, SeriesReader};
pub use registry::{HostRegistry, Layout, RegistryError};
pub use scheduler::{ProbeScheduler, SchedulerError, Timing};
pub use storage::{SampleStore, StoreError};
pub use tick::TickReader;
