//! Inventory domain module.
//!
//! This crate contains business rules for stock batches, the adjustment log
//! and the physical-count workflow, implemented purely as deterministic domain
//! logic (no IO, no async, no storage). The infrastructure layer reads records
//! from the synchronized snapshot, asks this crate what a mutation means, and
//! writes the result back atomically.

pub mod adjustment;
pub mod count;
pub mod freeze;
pub mod item;
pub mod ledger;
pub mod movement;
pub mod summary;

pub use adjustment::{AdjustmentLogEntry, AdjustmentReason};
pub use count::{
    ApproveCount, CancelCount, CountCommand, CountEntry, CountEvent, CountHistoryPurged,
    CountLine, CountStatus, InitiateCount, LineCorrection, PhysicalCount, RecordQuantities,
    RejectCount, Rejection, SubmitCount,
};
pub use freeze::{FreezePolicy, FreezeSet};
pub use item::{Facility, InventoryItem, ItemMaster, StorageLocation};
pub use ledger::{
    AdjustQuantity, DispenseStock, ItemPurged, LedgerEvent, ReceiveStock, StockTransferred,
    TransferKeys, TransferPlan, TransferStock,
};
pub use movement::{MovementKind, StockMovement};
pub use summary::StockTotals;
