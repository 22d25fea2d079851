//! Domain events and the audit trail they feed.
//!
//! Every successful mutation in the stock core is described by a domain event.
//! The event's type name doubles as the audit action kind, and its serialized
//! form becomes the structured details of the audit entry.

pub mod audit;
pub mod event;
pub mod in_memory_sink;
pub mod sink;

pub use audit::{AuditActor, AuditEntry};
pub use event::Event;
pub use in_memory_sink::InMemoryAuditSink;
pub use sink::{AuditError, AuditSink};
