//! Infrastructure layer: remote collection store, synchronized view, and the
//! ledger and count services that write back to the store.

pub mod audit;
pub mod collection_store;
pub mod config;
pub mod counts;
pub mod error;
pub mod ledger;
pub mod session;
pub mod sync;

#[cfg(test)]
mod integration_tests;
#[cfg(test)]
mod test_support;

pub use audit::{AuditTrail, StoreAuditSink};
pub use collection_store::{CollectionStore, InMemoryCollectionStore, StoreError, WriteBatch};
pub use config::{ConfigError, StockroomConfig};
pub use counts::{ApprovalOutcome, CountEngine, NewCount};
pub use error::CommandError;
pub use ledger::StockLedger;
pub use session::Stockroom;
pub use sync::{CollectionName, MaterializedView, Readiness, StockSnapshot, SyncError};
