//! Stock ledger decisions.
//!
//! Each `plan_*` function validates a requested mutation against the current
//! batch and returns the records the mutation will write. Nothing here touches
//! storage: the infrastructure layer turns a plan into one atomic write,
//! guarded on the quantities the plan was computed from.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    ActorId, AdjustmentId, DomainError, DomainResult, FacilityId, FundSourceId, InventoryItemId,
    ItemMasterId, LocationId, MovementId, ProgramId, SupplierId,
};
use stockroom_events::Event;

use crate::adjustment::control_number;
use crate::{AdjustmentLogEntry, AdjustmentReason, InventoryItem, MovementKind, StockMovement, StorageLocation};

// ─────────────────────────────────────────────────────────────────────────────
// Requests
// ─────────────────────────────────────────────────────────────────────────────

/// Set a batch to an absolute quantity, explained by a reason.
///
/// `new_quantity` is signed so a negative request can be rejected as a
/// validation error instead of failing to parse.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdjustQuantity {
    pub item_id: InventoryItemId,
    pub new_quantity: i64,
    pub reason: AdjustmentReason,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DispenseStock {
    pub item_id: InventoryItemId,
    pub quantity: u64,
    pub notes: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStock {
    pub item_id: InventoryItemId,
    pub destination: LocationId,
    pub quantity: u64,
    pub notes: String,
}

/// A new batch arriving at a storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceiveStock {
    pub item_master_id: ItemMasterId,
    pub location_id: LocationId,
    pub quantity: u64,
    pub batch_number: String,
    pub expiry_date: Option<chrono::NaiveDate>,
    pub unit_cost: u64,
    pub supplier_id: Option<SupplierId>,
    pub program_id: Option<ProgramId>,
    pub fund_source_id: Option<FundSourceId>,
    pub is_consignment: bool,
    pub notes: String,
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockTransferred {
    pub outbound: StockMovement,
    pub inbound: StockMovement,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemPurged {
    pub inventory_item_id: InventoryItemId,
    pub item_master_id: ItemMasterId,
    pub quantity: u64,
    pub facility_id: FacilityId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum LedgerEvent {
    QuantityAdjusted(AdjustmentLogEntry),
    StockReceived(StockMovement),
    StockDispensed(StockMovement),
    StockTransferred(StockTransferred),
    ItemPurged(ItemPurged),
}

impl Event for LedgerEvent {
    fn event_type(&self) -> &'static str {
        match self {
            LedgerEvent::QuantityAdjusted(_) => "inventory.quantity_adjusted",
            LedgerEvent::StockReceived(_) => "inventory.stock_received",
            LedgerEvent::StockDispensed(_) => "inventory.stock_dispensed",
            LedgerEvent::StockTransferred(_) => "inventory.stock_transferred",
            LedgerEvent::ItemPurged(_) => "inventory.item_purged",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            LedgerEvent::QuantityAdjusted(e) => e.adjusted_at,
            LedgerEvent::StockReceived(m) | LedgerEvent::StockDispensed(m) => m.occurred_at,
            LedgerEvent::StockTransferred(t) => t.outbound.occurred_at,
            LedgerEvent::ItemPurged(e) => e.occurred_at,
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Plans
// ─────────────────────────────────────────────────────────────────────────────

/// Build the log entry for an adjustment of `item`.
pub fn plan_adjustment(
    item: &InventoryItem,
    cmd: &AdjustQuantity,
    actor_id: &ActorId,
    entry_id: AdjustmentId,
    at: DateTime<Utc>,
) -> DomainResult<AdjustmentLogEntry> {
    if cmd.item_id != item.id {
        return Err(DomainError::invariant("inventory item mismatch"));
    }
    if cmd.new_quantity < 0 {
        return Err(DomainError::validation(format!(
            "quantity cannot be negative (requested {})",
            cmd.new_quantity
        )));
    }
    if cmd.reason.as_str().trim().is_empty() {
        return Err(DomainError::validation("an adjustment reason is required"));
    }

    let to_quantity = cmd.new_quantity as u64;
    if to_quantity == item.quantity {
        return Err(DomainError::validation(format!(
            "inventory item '{}' already has quantity {to_quantity}",
            item.id
        )));
    }

    Ok(AdjustmentLogEntry {
        control_number: control_number(&entry_id, at),
        id: entry_id,
        inventory_item_id: item.id.clone(),
        item_master_id: item.item_master_id.clone(),
        from_quantity: item.quantity,
        to_quantity,
        reason: cmd.reason.clone(),
        notes: cmd.notes.clone(),
        actor_id: actor_id.clone(),
        facility_id: item.facility_id.clone(),
        adjusted_at: at,
        is_consignment: item.is_consignment,
    })
}

fn ensure_withdrawable(item: &InventoryItem, quantity: u64) -> DomainResult<()> {
    if quantity == 0 {
        return Err(DomainError::validation("quantity must be greater than zero"));
    }
    if quantity > item.quantity {
        return Err(DomainError::validation(format!(
            "insufficient stock in '{}': requested {quantity}, available {}",
            item.id, item.quantity
        )));
    }
    Ok(())
}

fn movement(
    id: MovementId,
    kind: MovementKind,
    item: &InventoryItem,
    quantity: u64,
    actor_id: &ActorId,
    at: DateTime<Utc>,
    notes: &str,
) -> StockMovement {
    StockMovement {
        id,
        kind,
        inventory_item_id: item.id.clone(),
        item_master_id: item.item_master_id.clone(),
        quantity,
        facility_id: item.facility_id.clone(),
        actor_id: actor_id.clone(),
        occurred_at: at,
        notes: notes.to_string(),
        counterpart_item_id: None,
    }
}

/// Validate a dispense and return its movement record.
pub fn plan_dispense(
    item: &InventoryItem,
    cmd: &DispenseStock,
    actor_id: &ActorId,
    movement_id: MovementId,
    at: DateTime<Utc>,
) -> DomainResult<StockMovement> {
    if cmd.item_id != item.id {
        return Err(DomainError::invariant("inventory item mismatch"));
    }
    ensure_withdrawable(item, cmd.quantity)?;
    Ok(movement(movement_id, MovementKind::Dispense, item, cmd.quantity, actor_id, at, &cmd.notes))
}

/// Keys for the records a transfer may create.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferKeys {
    pub new_item_id: InventoryItemId,
    pub outbound_id: MovementId,
    pub inbound_id: MovementId,
}

impl TransferKeys {
    pub fn generate() -> Self {
        Self {
            new_item_id: InventoryItemId::generate(),
            outbound_id: MovementId::generate(),
            inbound_id: MovementId::generate(),
        }
    }
}

/// Result of planning a transfer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferPlan {
    pub source_quantity: u64,
    /// Quantity the source had when planned (write guard).
    pub source_expected: u64,
    /// Destination batch after the transfer.
    pub destination: InventoryItem,
    /// `None` when the destination batch is created by the transfer.
    pub destination_expected: Option<u64>,
    pub outbound: StockMovement,
    pub inbound: StockMovement,
}

impl TransferPlan {
    pub fn creates_destination(&self) -> bool {
        self.destination_expected.is_none()
    }

    pub fn event(&self) -> LedgerEvent {
        LedgerEvent::StockTransferred(StockTransferred {
            outbound: self.outbound.clone(),
            inbound: self.inbound.clone(),
        })
    }
}

/// Move stock from `source` to `destination`, merging into a matching batch
/// among `destination_items` or creating a new one.
pub fn plan_transfer<'a, I>(
    source: &InventoryItem,
    destination: &StorageLocation,
    destination_items: I,
    cmd: &TransferStock,
    actor_id: &ActorId,
    keys: TransferKeys,
    at: DateTime<Utc>,
) -> DomainResult<TransferPlan>
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    if cmd.item_id != source.id || cmd.destination != destination.id {
        return Err(DomainError::invariant("transfer request does not match the records"));
    }
    if destination.id == source.location_id {
        return Err(DomainError::validation(
            "destination must differ from the source location",
        ));
    }
    ensure_withdrawable(source, cmd.quantity)?;

    let existing = destination_items
        .into_iter()
        .find(|i| i.location_id == destination.id && i.id != source.id && i.is_same_stock(source));

    let (target, destination_expected) = match existing {
        Some(batch) => {
            let mut merged = batch.clone();
            merged.quantity = batch.quantity.saturating_add(cmd.quantity);
            (merged, Some(batch.quantity))
        }
        None => {
            let mut created = source.clone();
            created.id = keys.new_item_id;
            created.location_id = destination.id.clone();
            created.facility_id = destination.facility_id.clone();
            created.quantity = cmd.quantity;
            (created, None)
        }
    };

    let mut outbound = movement(
        keys.outbound_id,
        MovementKind::TransferOut,
        source,
        cmd.quantity,
        actor_id,
        at,
        &cmd.notes,
    );
    outbound.counterpart_item_id = Some(target.id.clone());

    let mut inbound = movement(
        keys.inbound_id,
        MovementKind::TransferIn,
        &target,
        cmd.quantity,
        actor_id,
        at,
        &cmd.notes,
    );
    inbound.counterpart_item_id = Some(source.id.clone());

    Ok(TransferPlan {
        source_quantity: source.quantity - cmd.quantity,
        source_expected: source.quantity,
        destination: target,
        destination_expected,
        outbound,
        inbound,
    })
}

/// Build the new batch and its receive movement.
pub fn plan_receipt(
    location: &StorageLocation,
    cmd: &ReceiveStock,
    actor_id: &ActorId,
    item_id: InventoryItemId,
    movement_id: MovementId,
    at: DateTime<Utc>,
) -> DomainResult<(InventoryItem, StockMovement)> {
    if cmd.location_id != location.id {
        return Err(DomainError::invariant("storage location mismatch"));
    }
    if cmd.quantity == 0 {
        return Err(DomainError::validation("received quantity must be greater than zero"));
    }

    let item = InventoryItem {
        id: item_id,
        item_master_id: cmd.item_master_id.clone(),
        quantity: cmd.quantity,
        location_id: location.id.clone(),
        facility_id: location.facility_id.clone(),
        batch_number: cmd.batch_number.trim().to_string(),
        expiry_date: cmd.expiry_date,
        unit_cost: cmd.unit_cost,
        supplier_id: cmd.supplier_id.clone(),
        program_id: cmd.program_id.clone(),
        fund_source_id: cmd.fund_source_id.clone(),
        is_consignment: cmd.is_consignment,
    };
    let receipt = movement(movement_id, MovementKind::Receive, &item, cmd.quantity, actor_id, at, &cmd.notes);
    Ok((item, receipt))
}
