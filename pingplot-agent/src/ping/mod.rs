//! System ping probe
//!
//! Runs the platform `ping` once per probe and pulls the round-trip time out
//! of the reply line. Works with:
//! - Linux iputils / busybox (`time=12.3 ms`)
//! - macOS / BSD (`time=12.345 ms`)
//! - Windows (`time=12ms`, `time<1ms`, localized `Zeit=`, `время=`)

use async_trait::async_trait;
use pingplot_core::{Host, Probe, ProbeError};
use regex::Regex;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::debug;

/// Number (group 2) right after `=` or `<` (group 1), followed by a
/// millisecond unit.
const REPLY_TIME_PATTERN: &str = r"(?i)([=<])\s*(\d+(?:[.,]\d+)?)\s*(?:ms|мс)";

pub struct SystemPing {
    timeout: Duration,
    reply_time: Regex,
}

impl SystemPing {
    pub fn new(timeout: Duration) -> Result<Self, regex::Error> {
        Ok(Self {
            timeout,
            reply_time: Regex::new(REPLY_TIME_PATTERN)?,
        })
    }

    fn command(&self, host: &Host) -> Command {
        let mut cmd = Command::new("ping");
        if cfg!(target_os = "windows") {
            let millis = self.timeout.as_millis().max(1).to_string();
            cmd.args(["-n", "1", "-w", millis.as_str()]);
        } else {
            // whole seconds, rounded up; the probe deadline still applies
            let secs = self.timeout.as_secs_f64().ceil().max(1.0) as u64;
            cmd.args(["-c", "1"]);
            if cfg!(target_os = "linux") {
                cmd.args(["-W", secs.to_string().as_str()]);
            } else if cfg!(target_os = "macos") {
                cmd.args(["-t", secs.to_string().as_str()]);
            }
            cmd.env("LC_ALL", "C");
        }
        cmd.arg(host.as_str())
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        cmd
    }

    /// Round-trip time from ping output, in whole milliseconds. Only lines
    /// carrying a TTL are replies; `<` means under the given value and reads
    /// as 0.
    pub fn parse_reply(&self, output: &str) -> Option<u32> {
        output
            .lines()
            .filter(|line| line.to_ascii_lowercase().contains("ttl"))
            .find_map(|line| {
                let caps = self.reply_time.captures(line)?;
                if &caps[1] == "<" {
                    return Some(0);
                }
                let value: f64 = caps[2].replace(',', ".").parse().ok()?;
                Some(value.round() as u32)
            })
    }
}

#[async_trait]
impl Probe for SystemPing {
    async fn probe(&self, host: &Host) -> Result<u32, ProbeError> {
        if host.as_str().starts_with('-') {
            return Err(ProbeError::Unreachable(format!("refusing to ping option-like address {host}")));
        }

        let output = self.command(host).output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout);

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            debug!(host = %host, status = %output.status, stderr = %stderr.trim(), "ping failed");
            return Err(ProbeError::Unreachable(format!("{host}: ping exited with {}", output.status)));
        }

        self.parse_reply(&stdout).ok_or_else(|| {
            let first = stdout.lines().find(|l| !l.trim().is_empty()).unwrap_or_default();
            ProbeError::Parse(format!("{host}: no reply line in {:?}", first.trim()))
        })
    }
}
