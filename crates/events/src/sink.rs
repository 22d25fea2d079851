//! Audit trail destination (mechanics only).
//!
//! The sink is the logging collaborator every successful mutation reports to.
//! Callers treat it as fire-and-forget: a failed `record` is logged by the
//! caller and never surfaces as a failure of the mutation itself.

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::AuditEntry;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// The destination rejected or could not receive the entry.
    #[error("audit write failed: {0}")]
    Write(String),

    /// Internal lock poisoning in an in-process sink.
    #[error("audit sink poisoned")]
    Poisoned,
}

/// Destination for audit-trail entries.
///
/// The trait requires `Send + Sync` so a single sink can be shared by every
/// service of a session and invoked from spawned tasks.
#[async_trait]
pub trait AuditSink: Send + Sync {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError>;
}

#[async_trait]
impl<S> AuditSink for Arc<S>
where
    S: AuditSink + ?Sized,
{
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        (**self).record(entry).await
    }
}
