/*!
Settings fixtures

Settings files live in a private temp directory removed on drop.
*/

use anyhow::{Context, Result};
use pingplot_core::{Host, Settings};
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// Default settings with the given hosts and ring capacity.
///
/// Panics on an invalid address; fixtures are for tests only.
pub fn settings(hosts: &[&str], capacity: usize) -> Settings {
    Settings {
        addresses: hosts
            .iter()
            .map(|h| Host::new(h).unwrap_or_else(|e| panic!("bad fixture host {h:?}: {e}")))
            .collect(),
        num_of_values: capacity,
        ..Settings::default()
    }
}

pub struct SettingsFixture {
    _dir: TempDir,
    path: PathBuf,
}

impl SettingsFixture {
    /// A settings file holding `contents`.
    pub fn with_contents(contents: &str) -> Result<Self> {
        let fixture = Self::missing()?;
        std::fs::write(&fixture.path, contents).with_context(|| format!("writing {}", fixture.path.display()))?;
        Ok(fixture)
    }

    /// A path inside a fresh directory where no file exists yet.
    pub fn missing() -> Result<Self> {
        let dir = tempfile::tempdir().context("creating temp dir")?;
        let path = dir.path().join("settings.txt");
        Ok(Self { _dir: dir, path })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn read(&self) -> Result<String> {
        std::fs::read_to_string(&self.path).with_context(|| format!("reading {}", self.path.display()))
    }
}
