//! Remote collection store boundary.
//!
//! This module defines the infrastructure-facing abstraction over a schemaless,
//! push-updating document store: full-collection subscriptions and guarded,
//! all-or-nothing multi-path writes. It makes no assumption about the backend.

pub mod in_memory;
pub mod r#trait;
pub mod write;

use std::time::Duration;

pub use in_memory::InMemoryCollectionStore;
pub use r#trait::{
    CollectionSnapshot, CollectionStore, RawRecords, SnapshotResult, StoreError, Subscription,
    SubscriptionId,
};
pub use write::{field_path, record_path, Guard, WriteBatch, WriteOp};

/// Run `atomic_write` under a deadline.
///
/// An elapsed deadline is reported as `StoreError::Timeout`: the outcome of
/// the write is unknown, and the batch guards make a retry safe.
pub async fn write_within<S>(store: &S, batch: WriteBatch, deadline: Duration) -> Result<(), StoreError>
where
    S: CollectionStore + ?Sized,
{
    match tokio::time::timeout(deadline, store.atomic_write(batch)).await {
        Ok(result) => result,
        Err(_) => Err(StoreError::Timeout(deadline)),
    }
}
