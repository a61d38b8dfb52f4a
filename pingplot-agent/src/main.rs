//! PingPlot Agent - terminal front end for the latency monitor
//!
//! - `run`: probe every configured host with the system `ping` and redraw a
//!   rolling latency table (or JSON frames) until Ctrl-C
//! - `add` / `remove` / `list`: edit the host list in the settings file

mod cli;
mod display;
mod ping;

use anyhow::{Context, Result};
use clap::Parser;
use pingplot_core::{ConfigError, PingMonitor, Settings};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::cli::{Cli, Command, RemoveTarget, RunArgs};
use crate::display::Presenter;
use crate::ping::SystemPing;

#[tokio::main]
async fn main() -> Result<()> {
    // .env is optional
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("pingplot_agent=info,pingplot_core=info")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let path = Settings::path_or_default(cli.settings);

    match cli.command.unwrap_or_default() {
        Command::Run(args) => run(&path, args).await,
        Command::Add { address } => add(&path, &address).await,
        Command::Remove { target } => remove(&path, &target).await,
        Command::List => list(&path).await,
    }
}

/// Monitor over `settings`, not started.
fn monitor_for(path: &Path, settings: &Settings) -> Result<PingMonitor> {
    let probe = SystemPing::new(settings.timing().timeout).context("Failed to build ping probe")?;
    PingMonitor::new(settings, Arc::new(probe)).with_context(|| format!("Invalid settings in {}", path.display()))
}

/// Settings for a command that rewrites the file, plus the line numbers the
/// rewrite will lose. An unreadable file is an error so it is never replaced.
async fn load_for_edit(path: &Path) -> Result<(Settings, Vec<usize>)> {
    match Settings::try_load(path).await {
        Ok(parsed) => {
            for issue in &parsed.issues {
                warn!(path = %path.display(), "{issue}");
            }
            let dropped = parsed.dropped_lines();
            Ok((parsed.settings, dropped))
        }
        Err(ConfigError::NotFound(_)) => Ok((Settings::default(), Vec::new())),
        Err(e) => Err(e).with_context(|| format!("Cannot read {}", path.display())),
    }
}

async fn monitor_for_edit(path: &Path) -> Result<PingMonitor> {
    let (settings, dropped) = load_for_edit(path).await?;
    if !dropped.is_empty() {
        warn!(
            path = %path.display(),
            lines = ?dropped,
            "comments and unrecognised lines will not be kept when the file is rewritten"
        );
    }
    monitor_for(path, &settings)
}

async fn run(path: &Path, args: RunArgs) -> Result<()> {
    let monitor = monitor_for(path, &Settings::load(path).await)?;
    if monitor.addresses().is_empty() {
        warn!(path = %path.display(), "no hosts configured, nothing will be probed");
    }
    monitor.start().context("Failed to start probe scheduler")?;
    info!(hosts = monitor.addresses().len(), capacity = monitor.capacity(), "🚀 monitoring started");

    let presenter = Presenter::new(args.columns, args.json);
    let mut refresh = tokio::time::interval(args.refresh.max(Duration::from_millis(50)));
    let shutdown = tokio::signal::ctrl_c();
    tokio::pin!(shutdown);

    loop {
        tokio::select! {
            signal = &mut shutdown => {
                if let Err(e) = signal {
                    warn!(error = %e, "failed to listen for Ctrl-C, shutting down");
                }
                break;
            }
            _ = refresh.tick() => {
                presenter.draw(&monitor).context("Failed to draw frame")?;
            }
        }
    }

    monitor.stop();
    info!("monitoring stopped");
    Ok(())
}

async fn add(path: &Path, address: &str) -> Result<()> {
    let monitor = monitor_for_edit(path).await?;
    let host = monitor.append_address(address).context("Cannot add host")?;
    save(&monitor, path).await?;
    println!("✅ added {host}");
    Ok(())
}

async fn remove(path: &Path, target: &str) -> Result<()> {
    let monitor = monitor_for_edit(path).await?;
    let removed = match RemoveTarget::parse(target) {
        RemoveTarget::Index(index) => monitor.remove_address_index(index),
        RemoveTarget::Address(address) => monitor.remove_address(&address),
    }
    .context("Cannot remove host")?;
    save(&monitor, path).await?;
    println!("🗑️  removed {removed}");
    Ok(())
}

async fn list(path: &Path) -> Result<()> {
    let monitor = monitor_for(path, &Settings::load(path).await)?;
    let hosts = monitor.addresses();
    if hosts.is_empty() {
        println!("no hosts configured in {}", path.display());
    }
    for (index, host) in hosts.iter().enumerate() {
        println!("{index:>3}  {host}");
    }
    Ok(())
}

async fn save(monitor: &PingMonitor, path: &Path) -> Result<()> {
    monitor
        .store_settings(path)
        .await
        .with_context(|| format!("Failed to write {}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use pingplot_core::Host;
    use pingplot_devkit::SettingsFixture;

    #[tokio::test]
    async fn test_edit_reports_lines_lost_on_rewrite() {
        let fixture = SettingsFixture::with_contents("# lab\naddress:a\ncolour:blue\nnumOfValues:8\n").unwrap();

        let (settings, dropped) = load_for_edit(fixture.path()).await.unwrap();
        assert_eq!(settings.addresses, vec![Host::new("a").unwrap()]);
        assert_eq!(settings.num_of_values, 8);
        assert_eq!(dropped, vec![1, 3]);
    }

    #[tokio::test]
    async fn test_edit_of_missing_file_starts_from_defaults() {
        let fixture = SettingsFixture::missing().unwrap();

        let (settings, dropped) = load_for_edit(fixture.path()).await.unwrap();
        assert_eq!(settings, Settings::default());
        assert!(dropped.is_empty());
    }

    #[tokio::test]
    async fn test_add_keeps_known_settings() {
        let fixture = SettingsFixture::with_contents("# lab\naddress:a\nnumOfValues:8\n").unwrap();

        add(fixture.path(), "b").await.unwrap();

        let written = fixture.read().unwrap();
        assert!(written.starts_with("address:a\naddress:b\nnumOfValues:8\n"), "{written}");
        assert!(!written.contains("# lab"));
    }
}
