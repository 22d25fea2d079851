//! Stock ledger service.
//!
//! Reads batches from the latest snapshot, asks the inventory domain what a
//! mutation means, and commits the result as one guarded atomic write:
//!
//! ```text
//! authorize → look up → validate → freeze check → atomic write → audit
//! ```
//!
//! Every quantity write is guarded on the quantity the decision was made from,
//! so a retry after an unknown outcome cannot apply twice. It is also guarded
//! on the batch's `heldBy` marker, which an active count sets when it is
//! initiated, so a client whose view has not seen the count yet still cannot
//! change a frozen batch.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde_json::json;
use tracing::{info, warn};

use stockroom_auth::{authorize, authorize_in_facility, Actor, Permission};
use stockroom_core::{
    AdjustmentId, CountId, DomainError, InventoryItemId, MovementId,
};
use stockroom_inventory::ledger::{plan_adjustment, plan_dispense, plan_receipt, plan_transfer};
use stockroom_inventory::{
    AdjustQuantity, AdjustmentLogEntry, DispenseStock, InventoryItem, ItemPurged, LedgerEvent,
    ReceiveStock, StockMovement, TransferKeys, TransferPlan, TransferStock,
};

use crate::audit::AuditTrail;
use crate::collection_store::{field_path, record_path, write_within, CollectionStore, WriteBatch};
use crate::config::StockroomConfig;
use crate::error::CommandError;
use crate::sync::{CollectionName, StockSnapshot};

pub(crate) fn lookup_item<'a>(snapshot: &'a StockSnapshot, id: &InventoryItemId) -> Result<&'a InventoryItem, CommandError> {
    snapshot
        .item(id)
        .ok_or_else(|| DomainError::not_found(format!("inventory item '{id}'")).into())
}

pub(crate) fn quantity_path(id: &InventoryItemId) -> String {
    field_path(CollectionName::InventoryItems, id, "quantity")
}

/// Store-side marker naming the active count that holds a batch.
pub(crate) fn hold_path(id: &InventoryItemId) -> String {
    field_path(CollectionName::InventoryItems, id, "heldBy")
}

/// Set a batch quantity, guarded on the value it was read at.
fn stage_quantity(batch: &mut WriteBatch, id: &InventoryItemId, from: u64, to: u64) {
    batch
        .set(quantity_path(id), json!(to))
        .expect(quantity_path(id), json!(from));
}

/// Inventory batches and the adjustment log.
pub struct StockLedger<S> {
    store: Arc<S>,
    audit: AuditTrail,
    config: StockroomConfig,
}

impl<S> Clone for StockLedger<S> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            audit: self.audit.clone(),
            config: self.config.clone(),
        }
    }
}

impl<S: CollectionStore + 'static> StockLedger<S> {
    pub fn new(store: Arc<S>, audit: AuditTrail, config: StockroomConfig) -> Self {
        Self { store, audit, config }
    }

    pub fn config(&self) -> &StockroomConfig {
        &self.config
    }

    pub(crate) fn audit(&self) -> &AuditTrail {
        &self.audit
    }

    pub(crate) async fn commit(&self, batch: WriteBatch) -> Result<(), CommandError> {
        write_within(self.store.as_ref(), batch, self.config.write_timeout)
            .await
            .map_err(CommandError::from)
    }

    /// Freeze rule for a quantity change on `item`.
    ///
    /// `exempt` is the count whose own approval is writing the change.
    pub(crate) fn check_freeze(
        &self,
        snapshot: &StockSnapshot,
        item: &InventoryItemId,
        exempt: Option<&CountId>,
    ) -> Result<(), CommandError> {
        match snapshot.freeze.ensure_unfrozen(item, exempt) {
            Ok(()) => Ok(()),
            Err(e) if !self.config.freeze_policy.is_enforced() => {
                warn!(item = %item, reason = %e, "advisory freeze: allowing change to a frozen item");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// Write-time half of the freeze rule: the batch's hold marker must be
    /// absent, or name the `exempt` count. Advisory policy only guards approvals.
    fn guard_hold(&self, batch: &mut WriteBatch, item: &InventoryItemId, exempt: Option<&CountId>) {
        match exempt {
            Some(count) => {
                batch.expect(hold_path(item), json!(count.as_str()));
            }
            None if self.config.freeze_policy.is_enforced() => {
                batch.expect_absent(hold_path(item));
            }
            None => {}
        }
    }

    /// Add an adjustment (quantity set + log entry) to `batch`.
    pub(crate) fn stage_adjustment(
        &self,
        batch: &mut WriteBatch,
        snapshot: &StockSnapshot,
        actor: &Actor,
        permission: &Permission,
        cmd: &AdjustQuantity,
        exempt: Option<&CountId>,
        at: DateTime<Utc>,
    ) -> Result<AdjustmentLogEntry, CommandError> {
        let item = lookup_item(snapshot, &cmd.item_id)?;
        authorize_in_facility(actor, permission, &item.facility_id)?;

        let entry = plan_adjustment(item, cmd, &actor.id, AdjustmentId::generate(), at)?;
        self.check_freeze(snapshot, &item.id, exempt)?;

        stage_quantity(batch, &item.id, entry.from_quantity, entry.to_quantity);
        self.guard_hold(batch, &item.id, exempt);
        batch.put(record_path(CollectionName::AdjustmentLogs, &entry.id), &entry)?;
        Ok(entry)
    }

    /// Set a batch to an absolute quantity with a reason.
    pub async fn adjust_quantity(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        cmd: AdjustQuantity,
    ) -> Result<AdjustmentLogEntry, CommandError> {
        authorize(actor, &Permission::INVENTORY_ADJUST)?;

        let mut batch = WriteBatch::new();
        let entry = self.stage_adjustment(
            &mut batch,
            snapshot,
            actor,
            &Permission::INVENTORY_ADJUST,
            &cmd,
            None,
            Utc::now(),
        )?;

        self.commit(batch).await.inspect_err(|e| {
            warn!(item = %cmd.item_id, error = %e, "quantity adjustment not committed");
        })?;

        info!(
            item = %entry.inventory_item_id,
            from = entry.from_quantity,
            to = entry.to_quantity,
            reason = %entry.reason,
            control_number = %entry.control_number,
            actor = %actor.id,
            "quantity adjusted"
        );
        self.audit.emit(actor, &LedgerEvent::QuantityAdjusted(entry.clone()));
        Ok(entry)
    }

    pub async fn dispense(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        cmd: DispenseStock,
    ) -> Result<StockMovement, CommandError> {
        authorize(actor, &Permission::INVENTORY_DISPENSE)?;
        let item = lookup_item(snapshot, &cmd.item_id)?;
        authorize_in_facility(actor, &Permission::INVENTORY_DISPENSE, &item.facility_id)?;

        let movement = plan_dispense(item, &cmd, &actor.id, MovementId::generate(), Utc::now())?;
        self.check_freeze(snapshot, &item.id, None)?;

        let mut batch = WriteBatch::new();
        stage_quantity(&mut batch, &item.id, item.quantity, item.quantity - movement.quantity);
        self.guard_hold(&mut batch, &item.id, None);
        batch.put(record_path(CollectionName::StockMovements, &movement.id), &movement)?;
        self.commit(batch).await?;

        info!(item = %item.id, quantity = movement.quantity, actor = %actor.id, "stock dispensed");
        self.audit.emit(actor, &LedgerEvent::StockDispensed(movement.clone()));
        Ok(movement)
    }

    /// Move stock to another location, merging into a matching batch there.
    pub async fn transfer(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        cmd: TransferStock,
    ) -> Result<TransferPlan, CommandError> {
        authorize(actor, &Permission::INVENTORY_TRANSFER)?;
        let source = lookup_item(snapshot, &cmd.item_id)?;
        authorize_in_facility(actor, &Permission::INVENTORY_TRANSFER, &source.facility_id)?;

        let destination = snapshot.location(&cmd.destination).ok_or_else(|| {
            CommandError::from(DomainError::not_found(format!("storage location '{}'", cmd.destination)))
        })?;
        authorize_in_facility(actor, &Permission::INVENTORY_TRANSFER, &destination.facility_id)?;

        let plan = plan_transfer(
            source,
            destination,
            snapshot.items_at(&destination.id),
            &cmd,
            &actor.id,
            TransferKeys::generate(),
            Utc::now(),
        )?;
        self.check_freeze(snapshot, &source.id, None)?;

        let mut batch = WriteBatch::new();
        stage_quantity(&mut batch, &source.id, plan.source_expected, plan.source_quantity);
        self.guard_hold(&mut batch, &source.id, None);
        match plan.destination_expected {
            Some(before) => {
                self.check_freeze(snapshot, &plan.destination.id, None)?;
                stage_quantity(&mut batch, &plan.destination.id, before, plan.destination.quantity);
                self.guard_hold(&mut batch, &plan.destination.id, None);
            }
            None => {
                let path = record_path(CollectionName::InventoryItems, &plan.destination.id);
                batch.put(path.clone(), &plan.destination)?.expect_absent(path);
            }
        }
        batch.put(record_path(CollectionName::StockMovements, &plan.outbound.id), &plan.outbound)?;
        batch.put(record_path(CollectionName::StockMovements, &plan.inbound.id), &plan.inbound)?;
        self.commit(batch).await?;

        info!(
            source = %source.id,
            destination = %plan.destination.id,
            location = %destination.id,
            quantity = cmd.quantity,
            merged = !plan.creates_destination(),
            actor = %actor.id,
            "stock transferred"
        );
        self.audit.emit(actor, &plan.event());
        Ok(plan)
    }

    /// Create a new batch from an incoming delivery.
    pub async fn receive(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        cmd: ReceiveStock,
    ) -> Result<InventoryItem, CommandError> {
        authorize(actor, &Permission::INVENTORY_RECEIVE)?;
        let location = snapshot.location(&cmd.location_id).ok_or_else(|| {
            CommandError::from(DomainError::not_found(format!("storage location '{}'", cmd.location_id)))
        })?;
        authorize_in_facility(actor, &Permission::INVENTORY_RECEIVE, &location.facility_id)?;

        if snapshot.item_master(&cmd.item_master_id).is_none() {
            return Err(DomainError::not_found(format!("item master '{}'", cmd.item_master_id)).into());
        }

        let (item, movement) = plan_receipt(
            location,
            &cmd,
            &actor.id,
            InventoryItemId::generate(),
            MovementId::generate(),
            Utc::now(),
        )?;

        let path = record_path(CollectionName::InventoryItems, &item.id);
        let mut batch = WriteBatch::new();
        batch.put(path.clone(), &item)?.expect_absent(path);
        batch.put(record_path(CollectionName::StockMovements, &movement.id), &movement)?;
        self.commit(batch).await?;

        info!(item = %item.id, master = %item.item_master_id, quantity = item.quantity, location = %item.location_id, "stock received");
        self.audit.emit(actor, &LedgerEvent::StockReceived(movement));
        Ok(item)
    }

    /// Hard-delete a batch. Refused while any active count references it.
    pub async fn purge_item(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        item_id: &InventoryItemId,
    ) -> Result<(), CommandError> {
        authorize(actor, &Permission::INVENTORY_PURGE)?;
        let item = lookup_item(snapshot, item_id)?;
        authorize_in_facility(actor, &Permission::INVENTORY_PURGE, &item.facility_id)?;

        if let Some(count) = snapshot.freezing_count(item_id) {
            return Err(DomainError::conflict(format!(
                "inventory item '{item_id}' is referenced by active physical count '{count}'"
            ))
            .into());
        }

        let mut batch = WriteBatch::new();
        batch
            .delete(record_path(CollectionName::InventoryItems, item_id))
            .expect(quantity_path(item_id), json!(item.quantity))
            .expect_absent(hold_path(item_id));
        self.commit(batch).await?;

        warn!(item = %item_id, quantity = item.quantity, actor = %actor.id, "inventory item purged");
        self.audit.emit(
            actor,
            &LedgerEvent::ItemPurged(ItemPurged {
                inventory_item_id: item.id.clone(),
                item_master_id: item.item_master_id.clone(),
                quantity: item.quantity,
                facility_id: item.facility_id.clone(),
                actor_id: actor.id.clone(),
                occurred_at: Utc::now(),
            }),
        );
        Ok(())
    }
}
