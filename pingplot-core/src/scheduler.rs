/*!
 * PROBE SCHEDULER - fixed-cadence fan-out of latency probes
 *
 * One tokio task per run drives the tick loop. Tick `n` fires at
 * `origin + n × period`, so a late wake-up never shifts later ticks. Each tick:
 *   1. resets the tick's slot (and any skipped ticks' slots) to Pending,
 *   2. publishes the tick on the shared cursor,
 *   3. spawns one bounded probe per host, each carrying the slot of the tick
 *      that issued it.
 *
 * Probe tasks live in a JoinSet owned by the loop: aborting the loop drops the
 * set and abandons them. Every storage write goes through the run's write
 * gate, and `stop()` closes the gate before aborting, so nothing lands in
 * storage once `stop()` has returned.
 */

use parking_lot::{Mutex, RwLock, RwLockReadGuard};
use std::sync::Arc;
use std::time::Duration;
use tokio::runtime::Handle;
use tokio::sync::Semaphore;
use tokio::task::{JoinHandle, JoinSet};
use tokio::time::{sleep_until, Instant};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::health::{SchedulerStats, StatsSnapshot};
use crate::models::{Host, Sample};
use crate::probe::{bounded_probe, SharedProbe};
use crate::registry::Layout;
use crate::storage::{SampleStore, StoreError};
use crate::tick::{TickPublisher, TickReader};

/// Default headroom multiplier for the probe worker pool.
pub const DEFAULT_SAFETY_FACTOR: u32 = 3;

#[derive(Debug, thiserror::Error)]
pub enum SchedulerError {
    #[error("invalid timing: {0}")]
    InvalidTiming(String),
    #[error("no tokio runtime available to run the scheduler")]
    NoRuntime,
    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Cadence, deadline and worker provisioning for a scheduler.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Timing {
    /// Ticks per second.
    pub frequency_hz: f64,
    /// Deadline for a single probe.
    pub timeout: Duration,
    /// Multiplier in the worker pool formula.
    pub safety_factor: u32,
    /// Absolute pool size, overrides the formula when set.
    pub workers: Option<usize>,
}

impl Default for Timing {
    fn default() -> Self {
        Self {
            frequency_hz: 2.0,
            timeout: Duration::from_secs(5),
            safety_factor: DEFAULT_SAFETY_FACTOR,
            workers: None,
        }
    }
}

impl Timing {
    pub fn new(frequency_hz: f64, timeout: Duration) -> Self {
        Self {
            frequency_hz,
            timeout,
            ..Self::default()
        }
    }

    /// Length of one tick. Fails on a non-positive frequency or a zero timeout.
    pub fn period(&self) -> Result<Duration, SchedulerError> {
        if !self.frequency_hz.is_finite() || self.frequency_hz <= 0.0 {
            return Err(SchedulerError::InvalidTiming(format!(
                "frequency must be positive, got {}",
                self.frequency_hz
            )));
        }
        if self.timeout.is_zero() {
            return Err(SchedulerError::InvalidTiming("probe timeout must be non-zero".into()));
        }
        let period = Duration::try_from_secs_f64(1.0 / self.frequency_hz)
            .map_err(|e| SchedulerError::InvalidTiming(e.to_string()))?;
        if period.is_zero() {
            return Err(SchedulerError::InvalidTiming(format!(
                "frequency {} Hz is too high",
                self.frequency_hz
            )));
        }
        Ok(period)
    }

    /// Worker pool size: `ceil(timeout / period) × hosts × safety_factor`,
    /// unless `workers` is set. Clamped to `1..=Semaphore::MAX_PERMITS`.
    pub fn pool_size(&self, hosts: usize) -> usize {
        let size = match self.workers {
            Some(workers) => workers,
            None => {
                let rounds = (self.timeout.as_secs_f64() * self.frequency_hz).ceil().max(1.0) as usize;
                rounds
                    .saturating_mul(hosts)
                    .saturating_mul(self.safety_factor.max(1) as usize)
            }
        };
        size.clamp(1, Semaphore::MAX_PERMITS)
    }
}

/// Keeps storage writes from racing `stop()`.
#[derive(Debug)]
struct WriteGate {
    open: RwLock<bool>,
}

impl WriteGate {
    fn new() -> Self {
        Self {
            open: RwLock::new(true),
        }
    }

    /// `close()` cannot return while the returned guard is alive.
    fn enter(&self) -> Option<RwLockReadGuard<'_, bool>> {
        let guard = self.open.read();
        if *guard {
            Some(guard)
        } else {
            None
        }
    }

    fn close(&self) {
        *self.open.write() = false;
    }
}

struct Run {
    id: Uuid,
    gate: Arc<WriteGate>,
    task: JoinHandle<()>,
}

impl Run {
    fn is_alive(&self) -> bool {
        !self.task.is_finished()
    }

    fn halt(self) {
        self.gate.close();
        self.task.abort();
    }
}

#[derive(Default)]
struct RunState {
    runtime: Option<Handle>,
    current: Option<Run>,
}

pub struct ProbeScheduler {
    probe: SharedProbe,
    timing: Timing,
    ticks: Arc<TickPublisher>,
    stats: Arc<SchedulerStats>,
    state: Mutex<RunState>,
}

impl ProbeScheduler {
    pub fn new(probe: SharedProbe, timing: Timing, capacity: usize) -> Self {
        Self {
            probe,
            timing,
            ticks: Arc::new(TickPublisher::new(capacity)),
            stats: Arc::new(SchedulerStats::default()),
            state: Mutex::new(RunState::default()),
        }
    }

    pub fn timing(&self) -> Timing {
        self.timing
    }

    pub fn ticks(&self) -> TickReader {
        self.ticks.reader()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.stats.snapshot()
    }

    pub fn is_running(&self) -> bool {
        self.state.lock().current.as_ref().is_some_and(Run::is_alive)
    }

    /// Start probing `layout`. A scheduler that is already running is
    /// restarted with the new layout.
    ///
    /// Called outside a tokio runtime, the runtime of an earlier start is
    /// reused; without one this fails with [`SchedulerError::NoRuntime`].
    pub fn start(&self, layout: Arc<Layout>) -> Result<(), SchedulerError> {
        let period = self.timing.period()?;
        let mut state = self.state.lock();
        let runtime = match Handle::try_current() {
            Ok(handle) => handle,
            Err(_) => state.runtime.clone().ok_or(SchedulerError::NoRuntime)?,
        };

        if let Some(previous) = state.current.take() {
            let was_alive = previous.is_alive();
            let previous_id = previous.id;
            previous.halt();
            if was_alive {
                self.stats.record_restart();
                info!(run_id = %previous_id, "probe scheduler stopped for restart");
            }
        }

        let id = Uuid::new_v4();
        let gate = Arc::new(WriteGate::new());
        let hosts = layout.hosts().len();
        let workers = self.timing.pool_size(hosts);
        let tick_loop = TickLoop {
            id,
            layout,
            probe: self.probe.clone(),
            deadline: self.timing.timeout,
            period,
            workers: Arc::new(Semaphore::new(workers)),
            ticks: self.ticks.clone(),
            stats: self.stats.clone(),
            gate: gate.clone(),
        };
        let task = runtime.spawn(tick_loop.run());
        info!(
            run_id = %id,
            hosts,
            workers,
            period_ms = period.as_millis() as u64,
            "probe scheduler started"
        );

        state.runtime = Some(runtime);
        state.current = Some(Run { id, gate, task });
        Ok(())
    }

    /// Restart with `layout` if a run is alive. Returns whether it restarted;
    /// a stopped or faulted scheduler stays stopped.
    pub fn reload(&self, layout: Arc<Layout>) -> Result<bool, SchedulerError> {
        if !self.is_running() {
            return Ok(false);
        }
        self.start(layout)?;
        Ok(true)
    }

    /// Halt the loop and abandon in-flight probes without waiting for them.
    pub fn stop(&self) {
        let Some(run) = self.state.lock().current.take() else {
            return;
        };
        let id = run.id;
        run.halt();
        info!(run_id = %id, "probe scheduler stopped");
    }
}

impl Drop for ProbeScheduler {
    fn drop(&mut self) {
        self.stop();
    }
}

struct TickLoop {
    id: Uuid,
    layout: Arc<Layout>,
    probe: SharedProbe,
    deadline: Duration,
    period: Duration,
    workers: Arc<Semaphore>,
    ticks: Arc<TickPublisher>,
    stats: Arc<SchedulerStats>,
    gate: Arc<WriteGate>,
}

impl TickLoop {
    async fn run(self) {
        match self.drive().await {
            Ok(()) => debug!(run_id = %self.id, "tick loop halted"),
            Err(e) => {
                self.stats.record_fault();
                error!(run_id = %self.id, error = %e, "tick loop failed, scheduler stopped until restarted");
            }
        }
    }

    async fn drive(&self) -> Result<(), SchedulerError> {
        let origin = Instant::now();
        let base = self.ticks.absolute();
        let mut probes: JoinSet<()> = JoinSet::new();
        let mut last = 0u64;

        loop {
            let boundary = origin + tick_offset(self.period, last + 1);
            tokio::select! {
                _ = sleep_until(boundary) => {}
                Some(joined) = probes.join_next() => {
                    if let Err(e) = joined {
                        error!(run_id = %self.id, error = %e, "probe task did not complete");
                    }
                    continue;
                }
            }

            let tick = ticks_elapsed(origin.elapsed(), self.period).max(last + 1);
            {
                let Some(_open) = self.gate.enter() else {
                    return Ok(());
                };
                self.advance(base, last, tick, &mut probes)?;
            }
            last = tick;
        }
    }

    /// Everything one tick does before going back to sleep. Runs under the
    /// write gate.
    fn advance(&self, base: u64, last: u64, tick: u64, probes: &mut JoinSet<()>) -> Result<(), SchedulerError> {
        let store = self.layout.store();
        let capacity = store.capacity() as u64;

        let missed = tick - last - 1;
        if missed > 0 {
            warn!(run_id = %self.id, missed, "scheduler woke late, skipped ticks left pending");
            self.stats.record_missed(missed);
            for skipped in (last + 1..tick).rev().take(store.capacity()) {
                store.reset_slot(((base + skipped) % capacity) as usize)?;
            }
        }

        let absolute = base + tick;
        let slot = (absolute % capacity) as usize;
        store.reset_slot(slot)?;
        self.ticks.publish(absolute);
        self.stats.record_tick();

        for (host_index, host) in self.layout.hosts().iter().enumerate() {
            let Ok(permit) = self.workers.clone().try_acquire_owned() else {
                warn!(run_id = %self.id, host = %host, slot, "no free probe worker, probe skipped");
                self.stats.record_skipped();
                continue;
            };
            self.stats.record_issued();
            let job = ProbeJob {
                run_id: self.id,
                host: host.clone(),
                host_index,
                slot,
                store: store.clone(),
                probe: self.probe.clone(),
                deadline: self.deadline,
                gate: self.gate.clone(),
                stats: self.stats.clone(),
            };
            probes.spawn(async move {
                let _permit = permit;
                job.run().await;
            });
        }
        Ok(())
    }
}

/// One probe, bound to the slot of the tick that issued it.
struct ProbeJob {
    run_id: Uuid,
    host: Host,
    host_index: usize,
    slot: usize,
    store: Arc<SampleStore>,
    probe: SharedProbe,
    deadline: Duration,
    gate: Arc<WriteGate>,
    stats: Arc<SchedulerStats>,
}

impl ProbeJob {
    async fn run(self) {
        let outcome = bounded_probe(self.probe.as_ref(), &self.host, self.deadline).await;

        let Some(_open) = self.gate.enter() else {
            debug!(run_id = %self.run_id, host = %self.host, "scheduler stopped, probe result discarded");
            return;
        };
        self.stats.record_outcome(&outcome);
        let sample = match &outcome {
            Ok(ms) => Sample::Latency(*ms),
            Err(e) if e.is_panic() => {
                error!(run_id = %self.run_id, host = %self.host, error = %e, "probe panicked");
                Sample::Failed
            }
            Err(e) => {
                debug!(run_id = %self.run_id, host = %self.host, error = %e, "probe failed");
                Sample::Failed
            }
        };
        if let Err(e) = self.store.write(self.host_index, self.slot, sample) {
            error!(run_id = %self.run_id, host = %self.host, error = %e, "failed to record probe result");
        }
    }
}

fn tick_offset(period: Duration, ticks: u64) -> Duration {
    let nanos = period.as_nanos().saturating_mul(u128::from(ticks));
    Duration::from_nanos(u64::try_from(nanos).unwrap_or(u64::MAX))
}

fn ticks_elapsed(elapsed: Duration, period: Duration) -> u64 {
    u64::try_from(elapsed.as_nanos() / period.as_nanos().max(1)).unwrap_or(u64::MAX)
}
