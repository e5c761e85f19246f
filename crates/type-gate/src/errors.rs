//! Error types for the type gate

use thiserror::Error;
use typegate_core_types::{BlockReason, TypegateError};
use typegate_policy_center::PolicyError;

/// Errors raised while setting up a gate
#[derive(Debug, Error, Clone)]
pub enum GateError {
    /// The configuration source could not be loaded at construction time
    #[error("gate not properly configured: {0}")]
    Config(#[from] PolicyError),
}

impl GateError {
    /// The underlying policy error
    pub fn policy_error(&self) -> &PolicyError {
        match self {
            GateError::Config(err) => err,
        }
    }
}

impl From<GateError> for TypegateError {
    fn from(value: GateError) -> Self {
        TypegateError::new(value.to_string())
    }
}

/// Faults surfaced by a guarded reconstructor
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ReconstructError {
    /// The gate refused the type; nothing was instantiated
    #[error("deserialization of '{type_name}' rejected: {reason}{}", pattern_suffix(.reason))]
    Rejected {
        type_name: String,
        reason: BlockReason,
    },

    /// The underlying stream failed independently of any gate decision
    #[error("stream error: {0}")]
    Stream(String),
}

impl ReconstructError {
    /// Whether this is a gate refusal rather than an I/O or format problem
    pub fn is_rejection(&self) -> bool {
        matches!(self, ReconstructError::Rejected { .. })
    }
}

fn pattern_suffix(reason: &BlockReason) -> String {
    reason
        .pattern()
        .map(|pattern| format!(" '{pattern}'"))
        .unwrap_or_default()
}
