//! Fire-and-forget audit emission.

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use tokio::task::JoinHandle;
use tracing::warn;

use stockroom_auth::Actor;
use stockroom_events::{AuditActor, AuditEntry, AuditError, AuditSink, Event};

use crate::collection_store::{record_path, CollectionStore, WriteBatch};
use crate::sync::CollectionName;

/// Emits one audit entry per successful mutation without blocking it.
#[derive(Clone)]
pub struct AuditTrail {
    sink: Arc<dyn AuditSink>,
}

impl AuditTrail {
    pub fn new(sink: Arc<dyn AuditSink>) -> Self {
        Self { sink }
    }

    /// Spawn the write of an entry describing `event`.
    ///
    /// The returned handle may be awaited by tests; production callers drop it.
    pub fn emit<E>(&self, actor: &Actor, event: &E) -> JoinHandle<()>
    where
        E: Event + Serialize,
    {
        let entry = AuditEntry::from_event(
            &AuditActor {
                actor_id: actor.id.clone(),
                actor_name: actor.display_name.clone(),
                facility_id: actor.facility_id.clone(),
            },
            event,
        );
        let sink = Arc::clone(&self.sink);

        tokio::spawn(async move {
            let action = entry.action.clone();
            if let Err(e) = sink.record(entry).await {
                warn!(action = %action, error = %e, "audit entry dropped");
            }
        })
    }
}

impl core::fmt::Debug for AuditTrail {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("AuditTrail").finish_non_exhaustive()
    }
}

/// Audit sink writing entries to the `auditTrail` collection.
#[derive(Debug)]
pub struct StoreAuditSink<S> {
    store: Arc<S>,
}

impl<S> StoreAuditSink<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl<S: CollectionStore> AuditSink for StoreAuditSink<S> {
    async fn record(&self, entry: AuditEntry) -> Result<(), AuditError> {
        let path = record_path(CollectionName::AuditTrail, &entry.id);
        let mut batch = WriteBatch::new();
        batch
            .put(path.clone(), &entry)
            .map_err(|e| AuditError::Write(e.to_string()))?;
        batch.expect_absent(path);

        self.store
            .atomic_write(batch)
            .await
            .map_err(|e| AuditError::Write(e.to_string()))
    }
}
