//! Physical-count reconciliation service.
//!
//! Each command loads the count from the latest snapshot, runs it through the
//! `PhysicalCount` state machine, and writes the whole document back guarded
//! on the revision it was loaded at. Approval folds every correcting
//! adjustment into that same write.
//!
//! Initiation marks every counted batch with `heldBy = <count id>` in the
//! store, guarded on the marker being absent, so two counts can never hold the
//! same batch even when both were started from stale views. Approval and
//! cancellation clear the markers in the write that ends the count.

use chrono::Utc;
use serde_json::json;
use tracing::{debug, info, warn};

use stockroom_auth::{authorize, authorize_in_facility, Actor, Permission, Role};
use stockroom_core::aggregate::execute;
use stockroom_core::{ActorId, CountId, DomainError, ExpectedVersion, LocationId};
use stockroom_inventory::{
    AdjustQuantity, AdjustmentLogEntry, AdjustmentReason, ApproveCount, CancelCount, CountCommand,
    CountEntry, CountEvent, CountHistoryPurged, InitiateCount, InventoryItem, LedgerEvent,
    PhysicalCount, RecordQuantities, RejectCount, SubmitCount,
};

use crate::collection_store::{field_path, record_path, CollectionStore, WriteBatch};
use crate::error::CommandError;
use crate::ledger::{hold_path, lookup_item, quantity_path, StockLedger};
use crate::sync::{CollectionName, StockSnapshot};

/// Request to start a count at a storage location.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCount {
    pub name: String,
    pub location_id: LocationId,
    /// Defaults to the initiating actor.
    pub counter_id: Option<ActorId>,
    pub notes: String,
}

/// Result of a successful approval.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApprovalOutcome {
    pub count: PhysicalCount,
    /// One entry per discrepant line that still differed from the live quantity.
    pub adjustments: Vec<AdjustmentLogEntry>,
}

fn revision_path(id: &CountId) -> String {
    field_path(CollectionName::PhysicalCounts, id, "revision")
}

/// Put the whole count document, guarded on the revision it was read at.
fn stage_count(batch: &mut WriteBatch, count: &PhysicalCount, read_at: u64) -> Result<(), CommandError> {
    batch
        .put(record_path(CollectionName::PhysicalCounts, &count.id), count)?
        .expect_version(revision_path(&count.id), ExpectedVersion::of(read_at));
    Ok(())
}

/// Clear the hold markers of a count that is ending.
fn release_holds(batch: &mut WriteBatch, count: &PhysicalCount) {
    for line in &count.lines {
        batch.delete(hold_path(&line.inventory_item_id));
    }
}

fn ensure_counter(count: &PhysicalCount, actor: &Actor) -> Result<(), CommandError> {
    let overrides = matches!(actor.role, Role::Administrator | Role::SystemAdministrator);
    if actor.id == count.counter_id || overrides {
        Ok(())
    } else {
        Err(CommandError::Unauthorized(format!(
            "only the assigned counter may record quantities on count '{}'",
            count.id
        )))
    }
}

pub struct CountEngine<S> {
    ledger: StockLedger<S>,
}

impl<S> Clone for CountEngine<S> {
    fn clone(&self) -> Self {
        Self {
            ledger: self.ledger.clone(),
        }
    }
}

impl<S: CollectionStore + 'static> CountEngine<S> {
    pub fn new(ledger: StockLedger<S>) -> Self {
        Self { ledger }
    }

    fn load<'a>(
        &self,
        snapshot: &'a StockSnapshot,
        actor: &Actor,
        permission: &Permission,
        id: &CountId,
    ) -> Result<&'a PhysicalCount, CommandError> {
        authorize(actor, permission)?;
        let count = snapshot
            .count(id)
            .ok_or_else(|| CommandError::from(DomainError::not_found(format!("physical count '{id}'"))))?;
        authorize_in_facility(actor, permission, &count.facility_id)?;
        Ok(count)
    }

    async fn commit_transition(
        &self,
        actor: &Actor,
        current: &PhysicalCount,
        command: CountCommand,
    ) -> Result<PhysicalCount, CommandError> {
        let mut count = current.clone();
        let events = execute(&mut count, &command)?;

        let mut batch = WriteBatch::new();
        stage_count(&mut batch, &count, current.revision)?;
        if count.status.is_terminal() {
            release_holds(&mut batch, &count);
        }
        self.ledger.commit(batch).await?;

        info!(count = %count.id, from = %current.status, to = %count.status, actor = %actor.id, "physical count updated");
        for event in &events {
            self.ledger.audit().emit(actor, event);
        }
        Ok(count)
    }

    /// Snapshot every batch at the location into a new pending count.
    pub async fn initiate_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        request: NewCount,
    ) -> Result<PhysicalCount, CommandError> {
        authorize(actor, &Permission::COUNTS_INITIATE)?;
        let location = snapshot.location(&request.location_id).ok_or_else(|| {
            CommandError::from(DomainError::not_found(format!("storage location '{}'", request.location_id)))
        })?;
        authorize_in_facility(actor, &Permission::COUNTS_INITIATE, &location.facility_id)?;

        let items: Vec<InventoryItem> = snapshot.items_at(&location.id).cloned().collect();
        if let Some((item, holder)) = items
            .iter()
            .find_map(|i| snapshot.freezing_count(&i.id).map(|c| (&i.id, c)))
        {
            return Err(DomainError::conflict(format!(
                "inventory item '{item}' is already being counted by active physical count '{holder}'"
            ))
            .into());
        }

        let count_id = CountId::generate();
        let mut count = PhysicalCount::empty(count_id.clone());
        let events = execute(
            &mut count,
            &CountCommand::Initiate(InitiateCount {
                count_id,
                name: request.name,
                facility_id: location.facility_id.clone(),
                location_id: location.id.clone(),
                counter_id: request.counter_id.unwrap_or_else(|| actor.id.clone()),
                initiated_by: actor.id.clone(),
                items,
                notes: request.notes,
                occurred_at: Utc::now(),
            }),
        )?;

        let mut batch = WriteBatch::new();
        batch
            .put(record_path(CollectionName::PhysicalCounts, &count.id), &count)?
            .expect_version(revision_path(&count.id), ExpectedVersion::Absent);
        for line in &count.lines {
            let id = &line.inventory_item_id;
            batch
                .set(hold_path(id), json!(count.id.as_str()))
                .expect_absent(hold_path(id))
                .expect(quantity_path(id), json!(line.system_quantity));
        }
        self.ledger.commit(batch).await.inspect_err(|e| {
            warn!(location = %count.location_id, error = %e, "physical count not initiated");
        })?;

        info!(
            count = %count.id,
            location = %count.location_id,
            facility = %count.facility_id,
            lines = count.lines.len(),
            counter = %count.counter_id,
            "physical count initiated"
        );
        for event in &events {
            self.ledger.audit().emit(actor, event);
        }
        Ok(count)
    }

    pub async fn record_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
        entries: Vec<CountEntry>,
    ) -> Result<PhysicalCount, CommandError> {
        let current = self.load(snapshot, actor, &Permission::COUNTS_RECORD, count_id)?;
        ensure_counter(current, actor)?;

        self.commit_transition(
            actor,
            current,
            CountCommand::Record(RecordQuantities {
                actor_id: actor.id.clone(),
                entries,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Hand a fully counted sheet to review.
    pub async fn submit_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
    ) -> Result<PhysicalCount, CommandError> {
        let current = self.load(snapshot, actor, &Permission::COUNTS_RECORD, count_id)?;
        ensure_counter(current, actor)?;

        self.commit_transition(
            actor,
            current,
            CountCommand::Submit(SubmitCount {
                actor_id: actor.id.clone(),
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Complete the count and correct every discrepant batch in one write.
    ///
    /// Corrections are computed from the live quantity, not the baseline. A
    /// failed write leaves the count in review with nothing applied.
    pub async fn approve_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
    ) -> Result<ApprovalOutcome, CommandError> {
        let current = self.load(snapshot, actor, &Permission::COUNTS_REVIEW, count_id)?;

        let at = Utc::now();
        let mut count = current.clone();
        let events = execute(
            &mut count,
            &CountCommand::Approve(ApproveCount {
                reviewer_id: actor.id.clone(),
                require_distinct_reviewer: self.ledger.config().require_distinct_reviewer,
                occurred_at: at,
            }),
        )?;
        let corrections = events
            .iter()
            .find_map(|e| match e {
                CountEvent::Approved(approved) => Some(approved.corrections.as_slice()),
                _ => None,
            })
            .unwrap_or_default();

        let mut batch = WriteBatch::new();
        let mut adjustments = Vec::with_capacity(corrections.len());
        for correction in corrections {
            let item = lookup_item(snapshot, &correction.inventory_item_id)?;
            if item.quantity == correction.counted_quantity {
                debug!(count = %count.id, item = %item.id, "live quantity already matches the count");
                continue;
            }
            let new_quantity = i64::try_from(correction.counted_quantity).map_err(|_| {
                DomainError::validation(format!(
                    "counted quantity {} for inventory item '{}' is out of range",
                    correction.counted_quantity, item.id
                ))
            })?;
            let cmd = AdjustQuantity {
                item_id: item.id.clone(),
                new_quantity,
                reason: AdjustmentReason::PhysicalCountCorrection,
                notes: format!("physical count '{}' ({})", count.name, count.id),
            };
            adjustments.push(self.ledger.stage_adjustment(
                &mut batch,
                snapshot,
                actor,
                &Permission::COUNTS_REVIEW,
                &cmd,
                Some(&count.id),
                at,
            )?);
        }
        stage_count(&mut batch, &count, current.revision)?;
        release_holds(&mut batch, &count);

        self.ledger.commit(batch).await.inspect_err(|e| {
            warn!(count = %count.id, error = %e, "approval not committed; count stays in review");
        })?;

        info!(
            count = %count.id,
            reviewer = %actor.id,
            corrections = adjustments.len(),
            "physical count approved"
        );
        for event in &events {
            self.ledger.audit().emit(actor, event);
        }
        for entry in &adjustments {
            self.ledger.audit().emit(actor, &LedgerEvent::QuantityAdjusted(entry.clone()));
        }
        Ok(ApprovalOutcome { count, adjustments })
    }

    /// Send the count back for re-counting.
    pub async fn reject_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
        reason: &str,
    ) -> Result<PhysicalCount, CommandError> {
        let current = self.load(snapshot, actor, &Permission::COUNTS_REVIEW, count_id)?;

        self.commit_transition(
            actor,
            current,
            CountCommand::Reject(RejectCount {
                reviewer_id: actor.id.clone(),
                reason: reason.to_string(),
                require_distinct_reviewer: self.ledger.config().require_distinct_reviewer,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    pub async fn cancel_count(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
        reason: Option<String>,
    ) -> Result<PhysicalCount, CommandError> {
        let current = self.load(snapshot, actor, &Permission::COUNTS_CANCEL, count_id)?;

        self.commit_transition(
            actor,
            current,
            CountCommand::Cancel(CancelCount {
                actor_id: actor.id.clone(),
                reason,
                occurred_at: Utc::now(),
            }),
        )
        .await
    }

    /// Hard-delete a completed or cancelled count.
    pub async fn purge_count_history(
        &self,
        snapshot: &StockSnapshot,
        actor: &Actor,
        count_id: &CountId,
    ) -> Result<(), CommandError> {
        let count = self.load(snapshot, actor, &Permission::COUNTS_PURGE, count_id)?;
        if !count.status.is_terminal() {
            return Err(DomainError::conflict(format!(
                "physical count '{count_id}' is still {}; only completed or cancelled counts can be purged",
                count.status
            ))
            .into());
        }

        let mut batch = WriteBatch::new();
        batch
            .delete(record_path(CollectionName::PhysicalCounts, count_id))
            .expect_version(revision_path(count_id), ExpectedVersion::of(count.revision));
        self.ledger.commit(batch).await?;

        warn!(count = %count_id, status = %count.status, actor = %actor.id, "physical count history purged");
        self.ledger.audit().emit(
            actor,
            &CountHistoryPurged {
                count_id: count.id.clone(),
                name: count.name.clone(),
                final_status: count.status,
                purged_by: actor.id.clone(),
                occurred_at: Utc::now(),
            },
        );
        Ok(())
    }
}
