//! Domain error model.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type used across the domain layer.
pub type DomainResult<T> = Result<T, DomainError>;

/// Coarse classification of a failure, stable enough for a UI to branch on.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    Conflict,
    NotFound,
    Transport,
    Authorization,
}

impl core::fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            ErrorKind::Validation => "validation",
            ErrorKind::Conflict => "conflict",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Transport => "transport",
            ErrorKind::Authorization => "authorization",
        })
    }
}

/// Domain-level error.
///
/// Keep this focused on deterministic, business/domain failures (validation,
/// invariants, conflicts). Transport failures against the remote store belong
/// to the infrastructure layer.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// A value failed validation (e.g. negative quantity).
    #[error("validation failed: {0}")]
    Validation(String),

    /// A domain invariant was violated (e.g. a transition not allowed from the current state).
    #[error("invariant violated: {0}")]
    InvariantViolation(String),

    /// An identifier was invalid (e.g. empty key or a key containing a path separator).
    #[error("invalid identifier: {0}")]
    InvalidId(String),

    /// A referenced record is missing from the current snapshot.
    #[error("not found: {0}")]
    NotFound(String),

    /// A conflict occurred (frozen item, record in use, stale revision).
    #[error("conflict: {0}")]
    Conflict(String),

    /// Authorization failure at the domain boundary.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
}

impl DomainError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn invariant(msg: impl Into<String>) -> Self {
        Self::InvariantViolation(msg.into())
    }

    pub fn invalid_id(msg: impl Into<String>) -> Self {
        Self::InvalidId(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    /// Classification used by callers that only care about the failure family.
    ///
    /// Invariant violations are reported as conflicts: they mean the request
    /// does not fit the record's current state.
    pub fn kind(&self) -> ErrorKind {
        match self {
            DomainError::Validation(_) | DomainError::InvalidId(_) => ErrorKind::Validation,
            DomainError::InvariantViolation(_) | DomainError::Conflict(_) => ErrorKind::Conflict,
            DomainError::NotFound(_) => ErrorKind::NotFound,
            DomainError::Unauthorized(_) => ErrorKind::Authorization,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn invariant_violations_classify_as_conflicts() {
        assert_eq!(DomainError::invariant("count is completed").kind(), ErrorKind::Conflict);
        assert_eq!(DomainError::invalid_id("a/b").kind(), ErrorKind::Validation);
        assert_eq!(DomainError::unauthorized("nope").kind(), ErrorKind::Authorization);
    }

    #[test]
    fn display_carries_the_message() {
        let err = DomainError::not_found("inventory item 'x'");
        assert_eq!(err.to_string(), "not found: inventory item 'x'");
    }
}
