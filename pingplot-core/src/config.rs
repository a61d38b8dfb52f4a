//! Settings file: flat `key:value` lines.
//!
//! ```text
//! address:example.test
//! address:192.168.1.1
//! numOfValues:60
//! pingTimeout:5
//! pingFrequency:2
//! ```
//!
//! Problems with individual lines are collected as issues and never abort
//! loading; the affected setting keeps its default.

use serde::Serialize;
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;
use tokio::fs;
use tokio::sync::Semaphore;
use tracing::{info, warn};

use crate::models::Host;
use crate::scheduler::{Timing, DEFAULT_SAFETY_FACTOR};
use crate::storage::MAX_CAPACITY;

pub const SETTINGS_ENV: &str = "PINGPLOT_SETTINGS";
pub const DEFAULT_SETTINGS_FILE: &str = "settings.txt";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("line {line}: unrecognised setting {text:?}")]
    Unrecognized { line: usize, text: String },
    #[error("line {line}: invalid value {value:?} for {key}: {reason}")]
    InvalidValue {
        line: usize,
        key: String,
        value: String,
        reason: String,
    },
    #[error("settings file not found: {}", .0.display())]
    NotFound(PathBuf),
    #[error("settings file error: {0}")]
    Io(#[from] std::io::Error),
}

impl ConfigError {
    /// Line the issue was found on, for per-line issues.
    pub fn line(&self) -> Option<usize> {
        match self {
            ConfigError::Unrecognized { line, .. } | ConfigError::InvalidValue { line, .. } => Some(*line),
            ConfigError::NotFound(_) | ConfigError::Io(_) => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Settings {
    /// Hosts in file order. Duplicates are kept here and dropped by the registry.
    pub addresses: Vec<Host>,
    /// Ring capacity, in ticks.
    pub num_of_values: usize,
    pub ping_timeout_secs: f64,
    /// Ticks per second.
    pub ping_frequency: f64,
    pub worker_safety_factor: u32,
    pub workers: Option<usize>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            addresses: Vec::new(),
            num_of_values: 60,
            ping_timeout_secs: 5.0,
            ping_frequency: 2.0,
            worker_safety_factor: DEFAULT_SAFETY_FACTOR,
            workers: None,
        }
    }
}

#[derive(Debug)]
pub struct ParsedSettings {
    pub settings: Settings,
    pub issues: Vec<ConfigError>,
    /// Line numbers of `#` comments.
    pub comments: Vec<usize>,
}

impl ParsedSettings {
    /// Lines that `Settings::render` will not write back: comments and every
    /// line that produced an issue. Sorted.
    pub fn dropped_lines(&self) -> Vec<usize> {
        let mut lines: Vec<usize> = self
            .issues
            .iter()
            .filter_map(ConfigError::line)
            .chain(self.comments.iter().copied())
            .collect();
        lines.sort_unstable();
        lines.dedup();
        lines
    }
}

impl Settings {
    /// `explicit`, else `$PINGPLOT_SETTINGS`, else `settings.txt`.
    pub fn path_or_default(explicit: Option<PathBuf>) -> PathBuf {
        explicit
            .or_else(|| std::env::var_os(SETTINGS_ENV).map(PathBuf::from))
            .unwrap_or_else(|| PathBuf::from(DEFAULT_SETTINGS_FILE))
    }

    pub fn parse(text: &str) -> ParsedSettings {
        let mut settings = Settings::default();
        let mut issues = Vec::new();
        let mut comments = Vec::new();

        for (index, raw) in text.lines().enumerate() {
            let line = index + 1;
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                continue;
            }
            if trimmed.starts_with('#') {
                comments.push(line);
                continue;
            }
            let Some((key, value)) = trimmed.split_once(':') else {
                issues.push(ConfigError::Unrecognized {
                    line,
                    text: trimmed.to_string(),
                });
                continue;
            };
            let key = key.trim();
            let value: String = value.chars().filter(|c| !c.is_whitespace()).collect();

            let applied = match key {
                "address" => Host::new(&value)
                    .map(|host| settings.addresses.push(host))
                    .map_err(|e| e.to_string()),
                "numOfValues" => positive::<usize>(&value)
                    .and_then(|v| at_most(v, MAX_CAPACITY))
                    .map(|v| settings.num_of_values = v),
                "pingTimeout" => positive_finite(&value).map(|v| settings.ping_timeout_secs = v),
                "pingFrequency" => positive_finite(&value).map(|v| settings.ping_frequency = v),
                "workerSafetyFactor" => positive::<u32>(&value).map(|v| settings.worker_safety_factor = v),
                "workers" => positive::<usize>(&value)
                    .and_then(|v| at_most(v, Semaphore::MAX_PERMITS))
                    .map(|v| settings.workers = Some(v)),
                _ => {
                    issues.push(ConfigError::Unrecognized {
                        line,
                        text: trimmed.to_string(),
                    });
                    continue;
                }
            };
            if let Err(reason) = applied {
                issues.push(ConfigError::InvalidValue {
                    line,
                    key: key.to_string(),
                    value,
                    reason,
                });
            }
        }

        ParsedSettings {
            settings,
            issues,
            comments,
        }
    }

    /// Load and parse `path`. Line issues are returned, not logged.
    pub async fn try_load(path: impl AsRef<Path>) -> Result<ParsedSettings, ConfigError> {
        let path = path.as_ref();
        match fs::read_to_string(path).await {
            Ok(text) => Ok(Self::parse(&text)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Err(ConfigError::NotFound(path.to_path_buf())),
            Err(e) => Err(e.into()),
        }
    }

    /// Load `path`, logging every issue. A missing or unreadable file yields
    /// the defaults.
    pub async fn load(path: impl AsRef<Path>) -> Settings {
        let path = path.as_ref();
        match Self::try_load(path).await {
            Ok(parsed) => {
                for issue in &parsed.issues {
                    warn!(path = %path.display(), "{issue}");
                }
                info!(
                    path = %path.display(),
                    hosts = parsed.settings.addresses.len(),
                    "settings loaded"
                );
                parsed.settings
            }
            Err(ConfigError::NotFound(_)) => {
                info!(path = %path.display(), "no settings file, using defaults");
                Settings::default()
            }
            Err(e) => {
                warn!(path = %path.display(), error = %e, "settings unreadable, using defaults");
                Settings::default()
            }
        }
    }

    pub async fn store(&self, path: impl AsRef<Path>) -> Result<(), ConfigError> {
        fs::write(path.as_ref(), self.render()).await?;
        Ok(())
    }

    /// Addresses first, then the numeric keys.
    pub fn render(&self) -> String {
        let mut out: String = self.addresses.iter().map(|host| format!("address:{host}\n")).collect();
        out.push_str(&format!(
            "numOfValues:{}\npingTimeout:{}\npingFrequency:{}\nworkerSafetyFactor:{}\n",
            self.num_of_values, self.ping_timeout_secs, self.ping_frequency, self.worker_safety_factor
        ));
        if let Some(workers) = self.workers {
            out.push_str(&format!("workers:{workers}\n"));
        }
        out
    }

    pub fn timing(&self) -> Timing {
        Timing {
            frequency_hz: self.ping_frequency,
            timeout: Duration::try_from_secs_f64(self.ping_timeout_secs).unwrap_or(Duration::ZERO),
            safety_factor: self.worker_safety_factor,
            workers: self.workers,
        }
    }
}

fn positive<T>(value: &str) -> Result<T, String>
where
    T: FromStr + PartialOrd + Default,
    T::Err: Display,
{
    let parsed: T = value.parse().map_err(|e: T::Err| e.to_string())?;
    if parsed > T::default() {
        Ok(parsed)
    } else {
        Err("must be greater than zero".into())
    }
}

fn at_most(value: usize, max: usize) -> Result<usize, String> {
    if value <= max {
        Ok(value)
    } else {
        Err(format!("must be at most {max}"))
    }
}

fn positive_finite(value: &str) -> Result<f64, String> {
    let parsed = positive::<f64>(value)?;
    if parsed.is_finite() {
        Ok(parsed)
    } else {
        Err("must be finite".into())
    }
}
