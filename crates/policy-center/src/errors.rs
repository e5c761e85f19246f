use typegate_core_types::TypegateError;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PolicyError {
    #[error("invalid pattern '{pattern}': {detail}")]
    InvalidPattern { pattern: String, detail: String },
    #[error("configuration source unavailable: {0}")]
    SourceUnavailable(String),
    #[error("configuration source is empty: {0}")]
    EmptySource(String),
    #[error("invalid policy: {0}")]
    Invalid(String),
    #[error("io error: {0}")]
    Io(String),
}

impl PolicyError {
    /// Source problems can clear up on their own; bad content needs an operator.
    pub fn is_source_error(&self) -> bool {
        matches!(
            self,
            PolicyError::SourceUnavailable(_) | PolicyError::Io(_) | PolicyError::EmptySource(_)
        )
    }
}

impl From<PolicyError> for TypegateError {
    fn from(value: PolicyError) -> Self {
        TypegateError::new(value.to_string())
    }
}
