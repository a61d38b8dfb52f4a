//! Terminal presenter: a latency table or JSON frames.

use anyhow::Result;
use chrono::{DateTime, Utc};
use pingplot_core::{HostSeries, MonitorHealth, PingMonitor};
use serde::Serialize;
use std::io::{IsTerminal, Write};

#[derive(Debug, Serialize)]
struct Frame<'a> {
    at: DateTime<Utc>,
    series: &'a [HostSeries],
    health: &'a MonitorHealth,
}

pub struct Presenter {
    columns: usize,
    json: bool,
    clear: bool,
}

impl Presenter {
    pub fn new(columns: usize, json: bool) -> Self {
        Self {
            columns: columns.max(1),
            json,
            clear: !json && std::io::stdout().is_terminal(),
        }
    }

    /// One refresh worth of output. Samples start at the newest completed
    /// tick, so the in-flight slot is never shown.
    pub fn frame(&self, monitor: &PingMonitor) -> Result<String> {
        let capacity = monitor.capacity();
        let from = (monitor.current_tick() + capacity - 1) % capacity;
        let series = monitor.data_array(Some(from), Some(self.columns))?;
        let health = monitor.health();

        if self.json {
            let frame = Frame {
                at: Utc::now(),
                series: &series,
                health: &health,
            };
            return Ok(serde_json::to_string(&frame)?);
        }
        Ok(render_table(&series, &health))
    }

    pub fn draw(&self, monitor: &PingMonitor) -> Result<()> {
        let frame = self.frame(monitor)?;
        let mut out = std::io::stdout().lock();
        if self.clear {
            write!(out, "\x1b[2J\x1b[H")?;
        }
        writeln!(out, "{frame}")?;
        out.flush()?;
        Ok(())
    }
}

pub fn render_table(series: &[HostSeries], health: &MonitorHealth) -> String {
    let mut out = String::new();
    if series.is_empty() {
        out.push_str("no hosts configured, add one with `pingplot add <address>`\n");
    } else {
        let width = series
            .iter()
            .map(|s| s.host.as_str().chars().count())
            .max()
            .unwrap_or(0)
            .max("host".len());
        out.push_str(&format!("{:<width$}  latency ms, newest first (. pending, x failed)\n", "host"));
        for row in series {
            let cells: String = row.samples.iter().map(|sample| format!(" {sample:>5}")).collect();
            out.push_str(&format!("{:<width$} {cells}\n", row.host.as_str()));
        }
    }

    let stats = &health.stats;
    out.push_str(&format!(
        "\n{} | tick {}/{} | up {}s | ok {} failed {} timed out {} skipped {}",
        if health.running { "running" } else { "stopped" },
        health.current_tick,
        health.capacity,
        health.uptime_seconds,
        stats.probes_ok,
        stats.probes_failed,
        stats.probes_timed_out,
        stats.probes_skipped,
    ));
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingplot_core::{Host, Sample, StatsSnapshot};
    use pingplot_devkit::{settings, ScriptedProbe, TestHarness};

    fn health() -> MonitorHealth {
        MonitorHealth {
            started_at: Utc::now(),
            uptime_seconds: 12,
            hosts_tracked: 2,
            capacity: 60,
            current_tick: 7,
            running: true,
            stats: StatsSnapshot {
                probes_ok: 10,
                probes_failed: 2,
                ..StatsSnapshot::default()
            },
        }
    }

    #[test]
    fn test_table_rows_and_footer() {
        let series = vec![
            HostSeries {
                host: Host::new("example.test").unwrap(),
                samples: vec![Sample::Latency(12), Sample::Failed, Sample::Pending],
            },
            HostSeries {
                host: Host::new("a").unwrap(),
                samples: vec![Sample::Latency(1500), Sample::Latency(3), Sample::Latency(0)],
            },
        ];
        let table = render_table(&series, &health());
        let lines: Vec<&str> = table.lines().collect();

        assert!(lines[0].starts_with("host         "));
        assert_eq!(lines[1], "example.test     12     x     .");
        assert_eq!(lines[2], "a              1500     3     0");
        assert!(table.ends_with("running | tick 7/60 | up 12s | ok 10 failed 2 timed out 0 skipped 0"));
    }

    #[test]
    fn test_empty_table_hints_at_add() {
        let table = render_table(&[], &health());
        assert!(table.starts_with("no hosts configured"));
    }

    #[tokio::test]
    async fn test_json_frame_shape() {
        let harness = TestHarness::new(settings(&["a", "b"], 8), ScriptedProbe::default()).unwrap();
        let presenter = Presenter::new(3, true);

        let frame: serde_json::Value = serde_json::from_str(&presenter.frame(&harness.monitor).unwrap()).unwrap();
        assert_eq!(frame["series"].as_array().unwrap().len(), 2);
        assert_eq!(frame["series"][0]["host"], "a");
        assert_eq!(frame["series"][0]["samples"][0], "pending");
        assert_eq!(frame["series"][0]["samples"].as_array().unwrap().len(), 3);
        assert_eq!(frame["health"]["running"], false);
    }
}
