use serde::Serialize;
use std::fmt;

use crate::registry::RegistryError;

/// Address of a monitored host (hostname or IP literal).
///
/// Identity is plain string equality. Surrounding whitespace is trimmed; an
/// empty address or one with inner whitespace cannot be stored in the
/// settings file and is rejected.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct Host(String);

impl Host {
    pub fn new(address: impl AsRef<str>) -> Result<Self, RegistryError> {
        let address = address.as_ref().trim();
        if address.is_empty() || address.chars().any(char::is_whitespace) {
            return Err(RegistryError::InvalidHost(address.to_string()));
        }
        Ok(Self(address.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Host {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Host {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl PartialEq<str> for Host {
    fn eq(&self, other: &str) -> bool {
        self.0 == other
    }
}

impl PartialEq<&str> for Host {
    fn eq(&self, other: &&str) -> bool {
        self.0 == *other
    }
}

impl From<Host> for String {
    fn from(host: Host) -> Self {
        host.0
    }
}

/// One latency sample as seen by readers.
///
/// Storage keeps samples as raw `i32`: non-negative values are milliseconds,
/// the two negative sentinels encode `Pending` and `Failed`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Sample {
    /// Nothing recorded for this slot yet: never written, probe in flight,
    /// probe skipped, or tick missed.
    #[default]
    Pending,
    /// The probe errored, panicked or ran past its deadline.
    Failed,
    /// Round-trip time in milliseconds.
    Latency(u32),
}

impl Sample {
    pub const PENDING_RAW: i32 = -1;
    pub const FAILED_RAW: i32 = -2;

    pub fn from_raw(raw: i32) -> Self {
        match raw {
            ms if ms >= 0 => Sample::Latency(ms as u32),
            Self::FAILED_RAW => Sample::Failed,
            _ => Sample::Pending,
        }
    }

    pub fn to_raw(self) -> i32 {
        match self {
            Sample::Pending => Self::PENDING_RAW,
            Sample::Failed => Self::FAILED_RAW,
            // values past i32::MAX ms are clamped, ~24 days is not a round trip
            Sample::Latency(ms) => i32::try_from(ms).unwrap_or(i32::MAX),
        }
    }

    pub fn latency_ms(self) -> Option<u32> {
        match self {
            Sample::Latency(ms) => Some(ms),
            _ => None,
        }
    }

    pub fn is_pending(self) -> bool {
        matches!(self, Sample::Pending)
    }

    pub fn is_failed(self) -> bool {
        matches!(self, Sample::Failed)
    }
}

impl fmt::Display for Sample {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Sample::Pending => f.pad("."),
            Sample::Failed => f.pad("x"),
            Sample::Latency(ms) => f.pad(&ms.to_string()),
        }
    }
}
