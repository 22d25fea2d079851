//! `stockroom-core`: domain foundation building blocks.
//!
//! This crate contains **pure domain** primitives (no infrastructure concerns):
//! identifiers keyed the way the remote collection store keys its records,
//! the domain error model, and the aggregate traits used by state machines.

pub mod aggregate;
pub mod error;
pub mod id;

pub use aggregate::{Aggregate, AggregateRoot, ExpectedVersion};
pub use error::{DomainError, DomainResult, ErrorKind};
pub use id::{
    ActorId, AdjustmentId, AuditEntryId, CountId, FacilityId, FundSourceId, InventoryItemId,
    ItemMasterId, LocationId, MovementId, ProgramId, SupplierId,
};
