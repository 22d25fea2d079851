//! In-memory audit sink for tests/dev.

use std::sync::Mutex;

use async_trait::async_trait;

use crate::sink::{AuditError, AuditSink};
use crate::AuditEntry;

/// In-memory audit sink.
///
/// - No IO
/// - Keeps entries in arrival order
/// - Can be switched into a failing mode to exercise fire-and-forget callers
#[derive(Debug, Default)]
pub struct InMemoryAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
    failing: Mutex<bool>,
}

impl InMemoryAuditSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every `record` call fails.
    pub fn failing() -> Self {
        Self {
            entries: Mutex::new(Vec::new()),
            failing: Mutex::new(true),
        }
    }

    pub fn set_failing(&self, failing: bool) {
        if let Ok(mut flag) = self.failing.lock() {
            *flag = failing;
        }
    }

    /// Snapshot of the recorded entries.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().map(|e| e.clone()).unwrap_or_default()
    }

    /// Recorded entries whose action matches `action`.
    pub fn entries_for(&self, action: &str) -> Vec<AuditEntry> {
        self.entries()
            .into_iter()
            .filter(|e| e.action == action)
            .collect()
    }
}

#[async_trait]
impl AuditSink for InMemoryAuditSink {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let failing = *self.failing.lock().map_err(|_| AuditError::Poisoned)?;
        if failing {
            return Err(AuditError::Write("sink configured to fail".to_string()));
        }

        let mut entries = self.entries.lock().map_err(|_| AuditError::Poisoned)?;
        entries.push(entry);
        Ok(())
    }
}
