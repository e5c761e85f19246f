use std::fmt;
use std::path::Path;

use thiserror::Error;

/// Shared error type for the typegate crates.
#[derive(Debug, Error, Clone)]
pub enum TypegateError {
    #[error("{message}")]
    Message { message: String },
}

impl TypegateError {
    pub fn new(message: impl Into<String>) -> Self {
        Self::Message {
            message: message.into(),
        }
    }
}

/// Identifier of the external configuration source a policy is loaded from.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq, Hash, PartialOrd, Ord)]
pub struct OriginId(pub String);

impl OriginId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OriginId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OriginId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for OriginId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl From<&Path> for OriginId {
    fn from(value: &Path) -> Self {
        Self(value.to_string_lossy().into_owned())
    }
}

impl From<&OriginId> for OriginId {
    fn from(value: &OriginId) -> Self {
        value.clone()
    }
}

/// Why a type was refused.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum BlockReason {
    /// A deny pattern matched the type name.
    Blacklist { pattern: String },
    /// No allow pattern matched the type name.
    NotWhitelisted,
}

impl BlockReason {
    /// Pattern responsible for the block, when there is one.
    pub fn pattern(&self) -> Option<&str> {
        match self {
            BlockReason::Blacklist { pattern } => Some(pattern),
            BlockReason::NotWhitelisted => None,
        }
    }
}

impl fmt::Display for BlockReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BlockReason::Blacklist { .. } => f.write_str("denied by blacklist"),
            BlockReason::NotWhitelisted => f.write_str("not in whitelist"),
        }
    }
}

/// Outcome of consulting the gate for a single type name.
#[cfg_attr(feature = "serde-full", derive(serde::Serialize, serde::Deserialize))]
#[derive(Clone, Debug, Eq, PartialEq)]
pub enum Decision {
    Allow,
    Block(BlockReason),
    AllowWithWarning(String),
}

impl Decision {
    /// Whether reconstruction may proceed.
    pub fn permits(&self) -> bool {
        !self.is_blocked()
    }

    pub fn is_blocked(&self) -> bool {
        matches!(self, Decision::Block(_))
    }

    /// Stable lowercase label, used for metrics and CLI output.
    pub fn label(&self) -> &'static str {
        match self {
            Decision::Allow => "allow",
            Decision::Block(_) => "block",
            Decision::AllowWithWarning(_) => "allow_with_warning",
        }
    }
}

impl fmt::Display for Decision {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Decision::Allow => f.write_str("allow"),
            Decision::Block(reason) => write!(f, "block ({reason})"),
            Decision::AllowWithWarning(reason) => write!(f, "allow with warning ({reason})"),
        }
    }
}
