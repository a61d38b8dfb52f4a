/*!
Scripted probe for tests

Each host follows its own script of behaviours; the last entry repeats once
the script runs out. Every call is recorded so tests can assert how often and
when the scheduler probed.
*/

use async_trait::async_trait;
use parking_lot::Mutex;
use pingplot_core::{Host, Probe, ProbeError, SharedProbe};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;

/// What one probe call does.
#[derive(Debug, Clone, PartialEq)]
pub enum Behavior {
    /// Answer immediately with this latency.
    Reply(u32),
    /// Answer after a delay, which may be longer than the probe deadline.
    ReplyAfter(Duration, u32),
    /// Report the host unreachable.
    Fail,
    /// Never answer.
    Hang,
    Panic,
}

#[derive(Debug, Clone)]
pub struct ProbeCall {
    pub host: Host,
    pub at: Instant,
    pub behavior: Behavior,
}

#[derive(Debug, Default)]
struct Script {
    steps: Vec<Behavior>,
    cursor: usize,
}

impl Script {
    fn new(steps: Vec<Behavior>) -> Self {
        Self { steps, cursor: 0 }
    }

    fn next(&mut self) -> Behavior {
        let step = self
            .steps
            .get(self.cursor)
            .or_else(|| self.steps.last())
            .cloned()
            .unwrap_or(Behavior::Fail);
        self.cursor += 1;
        step
    }
}

#[derive(Debug, Default)]
struct Inner {
    default_steps: Vec<Behavior>,
    scripts: HashMap<String, Script>,
    calls: Vec<ProbeCall>,
}

/// Clones share scripts and call records.
#[derive(Debug, Clone, Default)]
pub struct ScriptedProbe {
    inner: Arc<Mutex<Inner>>,
}

impl ScriptedProbe {
    /// Every host runs `steps`, each with its own cursor.
    pub fn script(steps: Vec<Behavior>) -> Self {
        let probe = Self::default();
        probe.inner.lock().default_steps = steps;
        probe
    }

    pub fn always(behavior: Behavior) -> Self {
        Self::script(vec![behavior])
    }

    /// Give `host` its own script instead of the default one.
    pub fn for_host(self, host: &str, steps: Vec<Behavior>) -> Self {
        self.inner.lock().scripts.insert(host.to_string(), Script::new(steps));
        self
    }

    pub fn shared(&self) -> SharedProbe {
        Arc::new(self.clone())
    }

    pub fn calls(&self) -> Vec<ProbeCall> {
        self.inner.lock().calls.clone()
    }

    pub fn call_count(&self) -> usize {
        self.inner.lock().calls.len()
    }

    pub fn calls_for(&self, host: &str) -> usize {
        self.inner.lock().calls.iter().filter(|call| call.host == host).count()
    }

    fn next(&self, host: &Host) -> Behavior {
        let mut inner = self.inner.lock();
        let defaults = inner.default_steps.clone();
        let behavior = inner
            .scripts
            .entry(host.to_string())
            .or_insert_with(|| Script::new(defaults))
            .next();
        inner.calls.push(ProbeCall {
            host: host.clone(),
            at: Instant::now(),
            behavior: behavior.clone(),
        });
        behavior
    }
}

#[async_trait]
impl Probe for ScriptedProbe {
    async fn probe(&self, host: &Host) -> Result<u32, ProbeError> {
        match self.next(host) {
            Behavior::Reply(ms) => Ok(ms),
            Behavior::ReplyAfter(delay, ms) => {
                tokio::time::sleep(delay).await;
                Ok(ms)
            }
            Behavior::Fail => Err(ProbeError::Unreachable(host.to_string())),
            Behavior::Hang => std::future::pending().await,
            Behavior::Panic => panic!("scripted panic probing {host}"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn host(name: &str) -> Host {
        Host::new(name).unwrap()
    }

    #[tokio::test]
    async fn test_last_step_repeats() {
        let probe = ScriptedProbe::script(vec![Behavior::Reply(1), Behavior::Reply(2)]);
        let a = host("a");
        assert_eq!(probe.probe(&a).await.unwrap(), 1);
        assert_eq!(probe.probe(&a).await.unwrap(), 2);
        assert_eq!(probe.probe(&a).await.unwrap(), 2);
        assert_eq!(probe.call_count(), 3);
    }

    #[tokio::test]
    async fn test_hosts_keep_separate_cursors() {
        let probe = ScriptedProbe::script(vec![Behavior::Reply(1), Behavior::Fail]).for_host("b", vec![Behavior::Reply(9)]);

        assert_eq!(probe.probe(&host("a")).await.unwrap(), 1);
        assert_eq!(probe.probe(&host("b")).await.unwrap(), 9);
        assert_eq!(probe.probe(&host("c")).await.unwrap(), 1);
        assert!(probe.probe(&host("a")).await.is_err());

        assert_eq!(probe.calls_for("a"), 2);
        assert_eq!(probe.calls_for("b"), 1);
    }

    #[tokio::test]
    async fn test_empty_script_fails() {
        let probe = ScriptedProbe::default();
        assert!(matches!(probe.probe(&host("a")).await, Err(ProbeError::Unreachable(_))));
    }

    #[tokio::test(start_paused = true)]
    async fn test_reply_after_waits() {
        let probe = ScriptedProbe::always(Behavior::ReplyAfter(Duration::from_secs(2), 5));
        let started = Instant::now();
        assert_eq!(probe.probe(&host("a")).await.unwrap(), 5);
        assert!(started.elapsed() >= Duration::from_secs(2));
    }
}
