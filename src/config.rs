//! Configuration file handling.

use anyhow::{bail, Context, Result};
use serde::Deserialize;
use std::{path::Path, time::Duration};

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub tool: ToolConfig,
    pub sync: SyncConfig,
}

/// How the external backlight tool is invoked.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ToolConfig {
    pub command: String,
    pub args: Vec<String>,
    pub device: Option<String>,
    /// Zero disables the timeout.
    pub timeout_ms: u64,
    pub set_unit: SetUnit,
}

impl Default for ToolConfig {
    fn default() -> Self {
        ToolConfig {
            command: "brightnessctl".to_owned(),
            args: Vec::new(),
            device: None,
            timeout_ms: 2000,
            set_unit: SetUnit::Raw,
        }
    }
}

impl ToolConfig {
    pub fn timeout(&self) -> Option<Duration> {
        if self.timeout_ms == 0 {
            None
        } else {
            Some(Duration::from_millis(self.timeout_ms))
        }
    }
}

/// Unit in which new levels are handed to the tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SetUnit {
    /// Device units, `round(fraction * max)`.
    Raw,
    /// Whole percent, sent with a `%` suffix.
    Percent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PollStrategy {
    /// Poll periodically.
    Interval,
    /// Re-read the device once the debounce window after a local change ends.
    AfterSet,
    /// Only poll when the host asks to.
    Manual,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SyncConfig {
    pub debounce_ms: u64,
    pub poll: PollStrategy,
    pub poll_interval_ms: u64,
}

impl Default for SyncConfig {
    fn default() -> Self {
        SyncConfig {
            debounce_ms: 1000,
            poll: PollStrategy::Interval,
            poll_interval_ms: 1000,
        }
    }
}

impl SyncConfig {
    pub fn debounce(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_millis(self.poll_interval_ms)
    }
}

impl Config {
    pub fn load(path: &Path) -> Result<Config> {
        let contents = std::fs::read_to_string(path)
            .with_context(|| format!("Couldn't read config file {}", path.display()))?;
        Self::parse(&contents).with_context(|| format!("Invalid config file {}", path.display()))
    }

    pub fn parse(contents: &str) -> Result<Config> {
        let config: Config = toml::from_str(contents)?;
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.tool.command.trim().is_empty() {
            bail!("tool.command must not be empty");
        }
        if self.sync.poll == PollStrategy::Interval && self.sync.poll_interval_ms == 0 {
            bail!("sync.poll_interval_ms must be positive when polling periodically");
        }
        Ok(())
    }
}
