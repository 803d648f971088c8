// Domain Error Types

use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum DomainError {
    #[error("Invalid job state transition: {from} -> {to}")]
    InvalidStateTransition { from: String, to: String },

    #[error("Unsupported {kind} strategy index: {index}")]
    UnsupportedStrategy { kind: &'static str, index: u32 },

    #[error("Unsupported strategy combination: {0}")]
    UnsupportedCombination(String),

    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Malformed input at line {line}: {message}")]
    MalformedInput { line: usize, message: String },
}

pub type Result<T> = std::result::Result<T, DomainError>;
