//! Materialized view synchronizer.
//!
//! Mirrors the collections an actor may read into one typed, composite
//! snapshot that commands read their decisions from.

pub mod collections;
pub mod normalize;
pub mod records;
pub mod snapshot;
pub mod synchronizer;

pub use collections::{subscription_plan, CollectionName};
pub use normalize::FacilityScoped;
pub use records::{Presence, UserRecord};
pub use snapshot::StockSnapshot;
pub use synchronizer::{MaterializedView, Readiness, SyncError};
