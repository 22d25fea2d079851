use thiserror::Error;

use stockroom_auth::AuthzError;
use stockroom_core::{DomainError, ErrorKind};

use crate::collection_store::StoreError;
use crate::sync::SyncError;

/// Error returned by every outbound command.
///
/// `Display` is the human-readable message shown to the operator; `kind()`
/// is the stable classification callers branch on.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum CommandError {
    #[error("{0}")]
    Validation(String),

    #[error("{0}")]
    Conflict(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{message}")]
    Transport { message: String, retryable: bool },
}

impl CommandError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            CommandError::Validation(_) => ErrorKind::Validation,
            CommandError::Conflict(_) => ErrorKind::Conflict,
            CommandError::NotFound(_) => ErrorKind::NotFound,
            CommandError::Unauthorized(_) => ErrorKind::Authorization,
            CommandError::Transport { .. } => ErrorKind::Transport,
        }
    }

    /// Whether the caller may retry the same command unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(self, CommandError::Transport { retryable: true, .. })
    }

    pub fn no_session() -> Self {
        CommandError::Unauthorized("no open session; sign in first".to_string())
    }
}

impl From<DomainError> for CommandError {
    fn from(value: DomainError) -> Self {
        match value {
            DomainError::Validation(msg) | DomainError::InvalidId(msg) => CommandError::Validation(msg),
            DomainError::InvariantViolation(msg) | DomainError::Conflict(msg) => CommandError::Conflict(msg),
            DomainError::NotFound(msg) => CommandError::NotFound(format!("{msg} not found")),
            DomainError::Unauthorized(msg) => CommandError::Unauthorized(msg),
        }
    }
}

impl From<AuthzError> for CommandError {
    fn from(value: AuthzError) -> Self {
        CommandError::Unauthorized(value.to_string())
    }
}

impl From<StoreError> for CommandError {
    fn from(value: StoreError) -> Self {
        match value {
            StoreError::PreconditionFailed { path, .. } => CommandError::Conflict(format!(
                "the record at '{path}' changed since it was read; reload and try again"
            )),
            StoreError::PermissionDenied(what) => {
                CommandError::Unauthorized(format!("the store denied access to '{what}'"))
            }
            StoreError::InvalidPath(path) => CommandError::Validation(format!("invalid record path '{path}'")),
            StoreError::Encode(msg) => CommandError::Validation(msg),
            other => CommandError::Transport {
                retryable: other.is_retryable(),
                message: other.to_string(),
            },
        }
    }
}

impl From<SyncError> for CommandError {
    fn from(value: SyncError) -> Self {
        CommandError::Transport {
            message: value.to_string(),
            retryable: matches!(value, SyncError::Timeout(_)),
        }
    }
}
