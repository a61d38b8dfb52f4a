//! Probe collaborator seam.
//!
//! The core never knows how latency is measured. It hands a [`Host`] to a
//! [`Probe`] and gets back milliseconds or a [`ProbeError`]. Deadlines and
//! panics are handled here so every implementation gets the same contract.

use async_trait::async_trait;
use futures::FutureExt;
use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Duration;

use crate::models::Host;

#[derive(Debug, thiserror::Error)]
pub enum ProbeError {
    #[error("no reply within {0:?}")]
    Timeout(Duration),
    #[error("host unreachable: {0}")]
    Unreachable(String),
    #[error("failed to run probe: {0}")]
    Io(#[from] std::io::Error),
    #[error("unrecognised probe output: {0}")]
    Parse(String),
    #[error("probe panicked: {0}")]
    Panicked(String),
}

impl ProbeError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, ProbeError::Timeout(_))
    }

    pub fn is_panic(&self) -> bool {
        matches!(self, ProbeError::Panicked(_))
    }
}

/// Measures the round-trip latency to one host, in whole milliseconds.
#[async_trait]
pub trait Probe: Send + Sync + 'static {
    async fn probe(&self, host: &Host) -> Result<u32, ProbeError>;
}

pub type SharedProbe = Arc<dyn Probe>;

/// Run `probe` against `host`, turning an expired deadline into
/// [`ProbeError::Timeout`] and a panic into [`ProbeError::Panicked`].
pub async fn bounded_probe(probe: &dyn Probe, host: &Host, deadline: Duration) -> Result<u32, ProbeError> {
    let guarded = AssertUnwindSafe(probe.probe(host)).catch_unwind();
    match tokio::time::timeout(deadline, guarded).await {
        Err(_) => Err(ProbeError::Timeout(deadline)),
        Ok(Err(panic)) => Err(ProbeError::Panicked(panic_message(panic.as_ref()))),
        Ok(Ok(result)) => result,
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(msg) = payload.downcast_ref::<&'static str>() {
        (*msg).to_string()
    } else if let Some(msg) = payload.downcast_ref::<String>() {
        msg.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
