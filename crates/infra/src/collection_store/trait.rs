use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value as JsonValue;
use thiserror::Error;
use tokio::sync::mpsc;

use super::write::WriteBatch;

/// Raw records of one collection, keyed by server key.
pub type RawRecords = BTreeMap<String, JsonValue>;

/// A full-collection replacement pushed by the store.
#[derive(Debug, Clone, PartialEq)]
pub struct CollectionSnapshot {
    pub collection: String,
    pub records: RawRecords,
}

/// Handle identifying one listener registration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriptionId(pub u64);

impl core::fmt::Display for SubscriptionId {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

pub type SnapshotResult = Result<CollectionSnapshot, StoreError>;

/// A live listener on one collection.
///
/// The stream ends when the store drops the registration (after
/// `unsubscribe`) or after a terminal error.
#[derive(Debug)]
pub struct Subscription {
    id: SubscriptionId,
    collection: String,
    receiver: mpsc::UnboundedReceiver<SnapshotResult>,
}

impl Subscription {
    pub fn new(
        id: SubscriptionId,
        collection: impl Into<String>,
        receiver: mpsc::UnboundedReceiver<SnapshotResult>,
    ) -> Self {
        Self {
            id,
            collection: collection.into(),
            receiver,
        }
    }

    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    pub fn collection(&self) -> &str {
        &self.collection
    }

    /// Next snapshot or error, in delivery order.
    pub async fn next(&mut self) -> Option<SnapshotResult> {
        self.receiver.recv().await
    }
}

/// Collection store operation error.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum StoreError {
    #[error("transport failure: {0}")]
    Transport(String),

    #[error("store did not answer within {0:?}")]
    Timeout(Duration),

    /// A guarded value changed between the read and the write.
    #[error("precondition failed at '{path}': expected {expected}, found {actual}")]
    PreconditionFailed {
        path: String,
        expected: String,
        actual: String,
    },

    #[error("invalid path '{0}'")]
    InvalidPath(String),

    #[error("permission denied for '{0}'")]
    PermissionDenied(String),

    #[error("failed to encode record: {0}")]
    Encode(String),

    #[error("store connection closed")]
    Closed,
}

impl StoreError {
    /// Whether retrying the same operation later may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            StoreError::Transport(_) | StoreError::Timeout(_) | StoreError::Closed
        )
    }
}

/// Remote, schemaless, push-updating document collection store.
///
/// ## Semantics
///
/// - `subscribe` registers a listener; the store pushes the whole collection
///   on registration and after every change. A terminal error is delivered on
///   the stream instead of a snapshot.
/// - `unsubscribe` releases a registration; unknown ids are ignored.
/// - `atomic_write` applies every operation of the batch or none of them, and
///   fails with `PreconditionFailed` if any guard does not hold.
#[async_trait]
pub trait CollectionStore: Send + Sync {
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError>;

    fn unsubscribe(&self, id: SubscriptionId);

    async fn atomic_write(&self, batch: WriteBatch) -> Result<(), StoreError>;
}

#[async_trait]
impl<S> CollectionStore for Arc<S>
where
    S: CollectionStore + ?Sized,
{
    async fn subscribe(&self, collection: &str) -> Result<Subscription, StoreError> {
        (**self).subscribe(collection).await
    }

    fn unsubscribe(&self, id: SubscriptionId) {
        (**self).unsubscribe(id)
    }

    async fn atomic_write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        (**self).atomic_write(batch).await
    }
}
