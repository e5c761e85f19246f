use std::env;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

/// Environment variable overriding `reload_interval`
pub const RELOAD_INTERVAL_ENV: &str = "TYPEGATE_RELOAD_INTERVAL";

/// Settings read from the CLI configuration file
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct CliConfig {
    /// How often watched policy files are checked, e.g. "6s" or "500ms"
    pub reload_interval: String,
    pub log_level: Option<String>,
    /// Turn would-be blocks in profiling mode into warnings
    pub warn_when_profiling: bool,
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            reload_interval: humantime::format_duration(
                typegate_policy_center::DEFAULT_RELOAD_INTERVAL,
            )
            .to_string(),
            log_level: None,
            warn_when_profiling: false,
        }
    }
}

impl CliConfig {
    /// Effective reload interval, with the environment taking precedence
    pub fn reload_interval(&self) -> Result<Duration> {
        match env::var(RELOAD_INTERVAL_ENV) {
            Ok(raw) if !raw.trim().is_empty() => parse_interval(&raw)
                .with_context(|| format!("Invalid {RELOAD_INTERVAL_ENV}")),
            _ => parse_interval(&self.reload_interval).context("Invalid reload_interval"),
        }
    }
}

pub fn parse_interval(raw: &str) -> Result<Duration> {
    let interval = humantime::parse_duration(raw.trim())
        .with_context(|| format!("'{}' is not a duration", raw.trim()))?;
    anyhow::ensure!(!interval.is_zero(), "reload interval must be positive");
    Ok(interval)
}
