//! Core types for the type gate

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use typegate_core_types::OriginId;
use typegate_policy_center::Policy;

/// Channel an event is reported on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EventLevel {
    /// Profiling observations and allow matches
    Info,
    /// Blocking decisions
    Error,
}

/// What the gate observed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GateEventKind {
    /// A deny pattern matched while profiling
    BlacklistMatch,
    /// An allow pattern matched while profiling
    WhitelistMatch,
    /// No allow pattern matched while profiling
    WhitelistMiss,
    /// A deny pattern matched and the type was refused
    BlockedByBlacklist,
    /// No allow pattern matched and the type was refused
    BlockedByWhitelist,
}

/// Structured diagnostic event emitted during a check
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GateEvent {
    pub level: EventLevel,
    pub kind: GateEventKind,
    pub origin: OriginId,
    pub type_name: String,
    /// Pattern that produced the event, if any
    pub pattern: Option<String>,
    pub policy_version: u64,
    pub at: DateTime<Utc>,
}

impl GateEvent {
    /// Build an event against the snapshot being evaluated
    pub fn new(
        policy: &Policy,
        level: EventLevel,
        kind: GateEventKind,
        type_name: &str,
        pattern: Option<&str>,
    ) -> Self {
        Self {
            level,
            kind,
            origin: policy.origin().clone(),
            type_name: type_name.to_string(),
            pattern: pattern.map(str::to_string),
            policy_version: policy.version(),
            at: Utc::now(),
        }
    }

    /// Human readable one-line description
    pub fn message(&self) -> String {
        let pattern = self.pattern.as_deref().unwrap_or("");
        match self.kind {
            GateEventKind::BlacklistMatch => {
                format!("Blacklist match '{}' for '{}'", pattern, self.type_name)
            }
            GateEventKind::WhitelistMatch => {
                format!("Whitelist match '{}' for '{}'", pattern, self.type_name)
            }
            GateEventKind::WhitelistMiss => {
                format!("No whitelist match for '{}'", self.type_name)
            }
            GateEventKind::BlockedByBlacklist => format!(
                "Blocked by blacklist '{}'. Match found for '{}'",
                pattern, self.type_name
            ),
            GateEventKind::BlockedByWhitelist => format!(
                "Blocked by whitelist. No match found for '{}'",
                self.type_name
            ),
        }
    }
}

/// Tuning knobs for a gate
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GateOptions {
    /// In profiling mode, answer `AllowWithWarning` instead of `Allow` for
    /// types that blocking mode would refuse
    pub warn_when_profiling: bool,
}

impl GateOptions {
    /// Enable warnings for would-be blocks while profiling
    pub fn warn_when_profiling(mut self) -> Self {
        self.warn_when_profiling = true;
        self
    }
}
