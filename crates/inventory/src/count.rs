//! Physical count aggregate.
//!
//! A count freezes the batches of one storage location, captures their
//! recorded quantity as an immutable baseline, and walks through
//! `pending → in_progress → pending_review → completed`, or to `cancelled`
//! from any active state.
//!
//! Rejection by the reviewer sends the count back to `in_progress` with the
//! reason recorded, keeping the counted values so the counter only has to
//! revisit the disputed lines.

use std::collections::{BTreeMap, HashSet};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{
    ActorId, Aggregate, AggregateRoot, CountId, DomainError, FacilityId, InventoryItemId,
    ItemMasterId, LocationId,
};
use stockroom_events::Event;

use crate::InventoryItem;

// ─────────────────────────────────────────────────────────────────────────────
// State
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CountStatus {
    #[default]
    Pending,
    InProgress,
    PendingReview,
    Completed,
    Cancelled,
}

impl CountStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, CountStatus::Completed | CountStatus::Cancelled)
    }

    /// Active counts freeze the items they reference.
    pub fn is_active(&self) -> bool {
        !self.is_terminal()
    }
}

impl core::fmt::Display for CountStatus {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(match self {
            CountStatus::Pending => "pending",
            CountStatus::InProgress => "in_progress",
            CountStatus::PendingReview => "pending_review",
            CountStatus::Completed => "completed",
            CountStatus::Cancelled => "cancelled",
        })
    }
}

/// One batch on the count sheet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountLine {
    pub inventory_item_id: InventoryItemId,
    pub item_master_id: ItemMasterId,
    #[serde(default)]
    pub batch_number: String,
    /// Recorded quantity at initiation. Never recomputed.
    pub system_quantity: u64,
    #[serde(default)]
    pub counted_quantity: Option<u64>,
}

impl CountLine {
    /// Counted minus baseline, once counted.
    pub fn discrepancy(&self) -> Option<i64> {
        self.counted_quantity.map(|c| {
            let diff = i128::from(c) - i128::from(self.system_quantity);
            i64::try_from(diff).unwrap_or(if diff < 0 { i64::MIN } else { i64::MAX })
        })
    }

    pub fn is_discrepant(&self) -> bool {
        self.discrepancy().is_some_and(|d| d != 0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Rejection {
    pub reason: String,
    pub rejected_by: ActorId,
    pub rejected_at: DateTime<Utc>,
}

/// Aggregate root: PhysicalCount.
///
/// Persisted as a whole document; `revision` is the aggregate version and is
/// the optimistic-concurrency guard for every write.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PhysicalCount {
    pub id: CountId,
    pub name: String,
    pub facility_id: FacilityId,
    pub location_id: LocationId,
    pub counter_id: ActorId,
    pub initiated_by: ActorId,
    pub initiated_at: DateTime<Utc>,
    #[serde(default)]
    pub status: CountStatus,
    #[serde(default)]
    pub lines: Vec<CountLine>,
    #[serde(default)]
    pub notes: String,
    #[serde(default)]
    pub submitted_by: Option<ActorId>,
    #[serde(default)]
    pub submitted_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub reviewed_by: Option<ActorId>,
    #[serde(default)]
    pub reviewed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub rejection: Option<Rejection>,
    #[serde(default)]
    pub cancelled_by: Option<ActorId>,
    #[serde(default)]
    pub cancelled_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub cancellation_reason: Option<String>,
    #[serde(default)]
    pub revision: u64,
}

impl PhysicalCount {
    /// Create an empty, not-yet-initiated aggregate instance.
    pub fn empty(id: CountId) -> Self {
        Self {
            id,
            name: String::new(),
            facility_id: FacilityId::new(""),
            location_id: LocationId::new(""),
            counter_id: ActorId::new(""),
            initiated_by: ActorId::new(""),
            initiated_at: DateTime::<Utc>::default(),
            status: CountStatus::Pending,
            lines: Vec::new(),
            notes: String::new(),
            submitted_by: None,
            submitted_at: None,
            reviewed_by: None,
            reviewed_at: None,
            rejection: None,
            cancelled_by: None,
            cancelled_at: None,
            cancellation_reason: None,
            revision: 0,
        }
    }

    pub fn is_initiated(&self) -> bool {
        self.revision > 0
    }

    pub fn is_active(&self) -> bool {
        self.is_initiated() && self.status.is_active()
    }

    pub fn line(&self, item_id: &InventoryItemId) -> Option<&CountLine> {
        self.lines.iter().find(|l| &l.inventory_item_id == item_id)
    }

    pub fn references(&self, item_id: &InventoryItemId) -> bool {
        self.line(item_id).is_some()
    }

    /// Lines whose counted quantity differs from the baseline.
    pub fn discrepant_lines(&self) -> impl Iterator<Item = &CountLine> {
        self.lines.iter().filter(|l| l.is_discrepant())
    }

    pub fn uncounted_lines(&self) -> usize {
        self.lines
            .iter()
            .filter(|l| l.counted_quantity.is_none())
            .count()
    }
}

impl AggregateRoot for PhysicalCount {
    type Id = CountId;

    fn id(&self) -> &Self::Id {
        &self.id
    }

    fn version(&self) -> u64 {
        self.revision
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Commands
// ─────────────────────────────────────────────────────────────────────────────

/// Command: InitiateCount.
///
/// `items` are the batches currently at the location, read from the latest
/// snapshot by the caller.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InitiateCount {
    pub count_id: CountId,
    pub name: String,
    pub facility_id: FacilityId,
    pub location_id: LocationId,
    pub counter_id: ActorId,
    pub initiated_by: ActorId,
    pub items: Vec<InventoryItem>,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

/// A counted quantity as entered by the counter (validated non-negative).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountEntry {
    pub inventory_item_id: InventoryItemId,
    pub counted_quantity: i64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordQuantities {
    pub actor_id: ActorId,
    pub entries: Vec<CountEntry>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmitCount {
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApproveCount {
    pub reviewer_id: ActorId,
    pub require_distinct_reviewer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RejectCount {
    pub reviewer_id: ActorId,
    pub reason: String,
    pub require_distinct_reviewer: bool,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CancelCount {
    pub actor_id: ActorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CountCommand {
    Initiate(InitiateCount),
    Record(RecordQuantities),
    Submit(SubmitCount),
    Approve(ApproveCount),
    Reject(RejectCount),
    Cancel(CancelCount),
}

// ─────────────────────────────────────────────────────────────────────────────
// Events
// ─────────────────────────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountInitiated {
    pub count_id: CountId,
    pub name: String,
    pub facility_id: FacilityId,
    pub location_id: LocationId,
    pub counter_id: ActorId,
    pub initiated_by: ActorId,
    pub lines: Vec<CountLine>,
    pub notes: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecordedQuantity {
    pub inventory_item_id: InventoryItemId,
    pub counted_quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QuantitiesRecorded {
    pub count_id: CountId,
    pub actor_id: ActorId,
    pub quantities: Vec<RecordedQuantity>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountSubmitted {
    pub count_id: CountId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
}

/// A discrepancy the approval corrects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LineCorrection {
    pub inventory_item_id: InventoryItemId,
    pub system_quantity: u64,
    pub counted_quantity: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountApproved {
    pub count_id: CountId,
    pub reviewer_id: ActorId,
    pub corrections: Vec<LineCorrection>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountRejected {
    pub count_id: CountId,
    pub reviewer_id: ActorId,
    pub reason: String,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountCancelled {
    pub count_id: CountId,
    pub actor_id: ActorId,
    pub reason: Option<String>,
    pub occurred_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum CountEvent {
    Initiated(CountInitiated),
    QuantitiesRecorded(QuantitiesRecorded),
    Submitted(CountSubmitted),
    Approved(CountApproved),
    Rejected(CountRejected),
    Cancelled(CountCancelled),
}

impl Event for CountEvent {
    fn event_type(&self) -> &'static str {
        match self {
            CountEvent::Initiated(_) => "counts.count_initiated",
            CountEvent::QuantitiesRecorded(_) => "counts.quantities_recorded",
            CountEvent::Submitted(_) => "counts.count_submitted",
            CountEvent::Approved(_) => "counts.count_approved",
            CountEvent::Rejected(_) => "counts.count_rejected",
            CountEvent::Cancelled(_) => "counts.count_cancelled",
        }
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        match self {
            CountEvent::Initiated(e) => e.occurred_at,
            CountEvent::QuantitiesRecorded(e) => e.occurred_at,
            CountEvent::Submitted(e) => e.occurred_at,
            CountEvent::Approved(e) => e.occurred_at,
            CountEvent::Rejected(e) => e.occurred_at,
            CountEvent::Cancelled(e) => e.occurred_at,
        }
    }
}

/// Event: a terminal count was removed by an administrator.
///
/// Not part of the state machine; recorded only for the audit trail.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CountHistoryPurged {
    pub count_id: CountId,
    pub name: String,
    pub final_status: CountStatus,
    pub purged_by: ActorId,
    pub occurred_at: DateTime<Utc>,
}

impl Event for CountHistoryPurged {
    fn event_type(&self) -> &'static str {
        "counts.count_purged"
    }

    fn version(&self) -> u32 {
        1
    }

    fn occurred_at(&self) -> DateTime<Utc> {
        self.occurred_at
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Decisions
// ─────────────────────────────────────────────────────────────────────────────

impl Aggregate for PhysicalCount {
    type Command = CountCommand;
    type Event = CountEvent;
    type Error = DomainError;

    fn apply(&mut self, event: &Self::Event) {
        match event {
            CountEvent::Initiated(e) => {
                self.id = e.count_id.clone();
                self.name = e.name.clone();
                self.facility_id = e.facility_id.clone();
                self.location_id = e.location_id.clone();
                self.counter_id = e.counter_id.clone();
                self.initiated_by = e.initiated_by.clone();
                self.initiated_at = e.occurred_at;
                self.lines = e.lines.clone();
                self.notes = e.notes.clone();
                self.status = CountStatus::Pending;
            }
            CountEvent::QuantitiesRecorded(e) => {
                for q in &e.quantities {
                    if let Some(line) = self
                        .lines
                        .iter_mut()
                        .find(|l| l.inventory_item_id == q.inventory_item_id)
                    {
                        line.counted_quantity = Some(q.counted_quantity);
                    }
                }
                if self.status == CountStatus::Pending {
                    self.status = CountStatus::InProgress;
                }
            }
            CountEvent::Submitted(e) => {
                self.status = CountStatus::PendingReview;
                self.submitted_by = Some(e.actor_id.clone());
                self.submitted_at = Some(e.occurred_at);
            }
            CountEvent::Approved(e) => {
                self.status = CountStatus::Completed;
                self.reviewed_by = Some(e.reviewer_id.clone());
                self.reviewed_at = Some(e.occurred_at);
            }
            CountEvent::Rejected(e) => {
                self.status = CountStatus::InProgress;
                self.submitted_by = None;
                self.submitted_at = None;
                self.rejection = Some(Rejection {
                    reason: e.reason.clone(),
                    rejected_by: e.reviewer_id.clone(),
                    rejected_at: e.occurred_at,
                });
            }
            CountEvent::Cancelled(e) => {
                self.status = CountStatus::Cancelled;
                self.cancelled_by = Some(e.actor_id.clone());
                self.cancelled_at = Some(e.occurred_at);
                self.cancellation_reason = e.reason.clone();
            }
        }

        // Deterministic version tracking: +1 per applied event.
        self.revision += 1;
    }

    fn handle(&self, command: &Self::Command) -> Result<Vec<Self::Event>, Self::Error> {
        match command {
            CountCommand::Initiate(cmd) => self.handle_initiate(cmd),
            CountCommand::Record(cmd) => self.handle_record(cmd),
            CountCommand::Submit(cmd) => self.handle_submit(cmd),
            CountCommand::Approve(cmd) => self.handle_approve(cmd),
            CountCommand::Reject(cmd) => self.handle_reject(cmd),
            CountCommand::Cancel(cmd) => self.handle_cancel(cmd),
        }
    }
}

impl PhysicalCount {
    fn ensure_initiated(&self) -> Result<(), DomainError> {
        if !self.is_initiated() {
            return Err(DomainError::not_found(format!("physical count '{}'", self.id)));
        }
        Ok(())
    }

    fn ensure_status(&self, allowed: &[CountStatus], action: &str) -> Result<(), DomainError> {
        self.ensure_initiated()?;
        if !allowed.contains(&self.status) {
            return Err(DomainError::invariant(format!(
                "cannot {action} count '{}' while it is {}",
                self.id, self.status
            )));
        }
        Ok(())
    }

    fn ensure_distinct_reviewer(&self, reviewer: &ActorId, required: bool) -> Result<(), DomainError> {
        if required && reviewer == &self.counter_id {
            return Err(DomainError::unauthorized(
                "the reviewer must be a different person from the assigned counter",
            ));
        }
        Ok(())
    }

    fn handle_initiate(&self, cmd: &InitiateCount) -> Result<Vec<CountEvent>, DomainError> {
        if self.is_initiated() {
            return Err(DomainError::conflict(format!("count '{}' already exists", self.id)));
        }
        if cmd.count_id != self.id {
            return Err(DomainError::invariant("count_id mismatch"));
        }
        if cmd.name.trim().is_empty() {
            return Err(DomainError::validation("count name cannot be empty"));
        }
        if cmd.items.is_empty() {
            return Err(DomainError::validation(format!(
                "storage location '{}' has no inventory items to count",
                cmd.location_id
            )));
        }

        let mut seen = HashSet::new();
        let mut lines = Vec::with_capacity(cmd.items.len());
        for item in &cmd.items {
            if item.location_id != cmd.location_id || item.facility_id != cmd.facility_id {
                return Err(DomainError::invariant(format!(
                    "inventory item '{}' is not stored at location '{}'",
                    item.id, cmd.location_id
                )));
            }
            if !seen.insert(item.id.clone()) {
                continue;
            }
            lines.push(CountLine {
                inventory_item_id: item.id.clone(),
                item_master_id: item.item_master_id.clone(),
                batch_number: item.batch_number.clone(),
                system_quantity: item.quantity,
                counted_quantity: None,
            });
        }

        Ok(vec![CountEvent::Initiated(CountInitiated {
            count_id: cmd.count_id.clone(),
            name: cmd.name.trim().to_string(),
            facility_id: cmd.facility_id.clone(),
            location_id: cmd.location_id.clone(),
            counter_id: cmd.counter_id.clone(),
            initiated_by: cmd.initiated_by.clone(),
            lines,
            notes: cmd.notes.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_record(&self, cmd: &RecordQuantities) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_status(&[CountStatus::Pending, CountStatus::InProgress], "record quantities on")?;

        if cmd.entries.is_empty() {
            return Err(DomainError::validation("no counted quantities supplied"));
        }

        // Last entry wins for repeated items.
        let mut quantities: BTreeMap<InventoryItemId, u64> = BTreeMap::new();
        for entry in &cmd.entries {
            if entry.counted_quantity < 0 {
                return Err(DomainError::validation(format!(
                    "counted quantity for '{}' cannot be negative",
                    entry.inventory_item_id
                )));
            }
            if !self.references(&entry.inventory_item_id) {
                return Err(DomainError::validation(format!(
                    "inventory item '{}' is not part of count '{}'",
                    entry.inventory_item_id, self.id
                )));
            }
            quantities.insert(entry.inventory_item_id.clone(), entry.counted_quantity.unsigned_abs());
        }

        // Keep the count sheet order.
        let quantities = self
            .lines
            .iter()
            .filter_map(|l| {
                quantities.get(&l.inventory_item_id).map(|q| RecordedQuantity {
                    inventory_item_id: l.inventory_item_id.clone(),
                    counted_quantity: *q,
                })
            })
            .collect();

        Ok(vec![CountEvent::QuantitiesRecorded(QuantitiesRecorded {
            count_id: self.id.clone(),
            actor_id: cmd.actor_id.clone(),
            quantities,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_submit(&self, cmd: &SubmitCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_status(&[CountStatus::InProgress], "submit")?;

        let uncounted = self.uncounted_lines();
        if uncounted > 0 {
            return Err(DomainError::validation(format!(
                "{uncounted} line(s) of count '{}' have no counted quantity",
                self.id
            )));
        }

        Ok(vec![CountEvent::Submitted(CountSubmitted {
            count_id: self.id.clone(),
            actor_id: cmd.actor_id.clone(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_approve(&self, cmd: &ApproveCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_status(&[CountStatus::PendingReview], "approve")?;
        self.ensure_distinct_reviewer(&cmd.reviewer_id, cmd.require_distinct_reviewer)?;

        let corrections = self
            .discrepant_lines()
            .filter_map(|l| {
                l.counted_quantity.map(|counted| LineCorrection {
                    inventory_item_id: l.inventory_item_id.clone(),
                    system_quantity: l.system_quantity,
                    counted_quantity: counted,
                })
            })
            .collect();

        Ok(vec![CountEvent::Approved(CountApproved {
            count_id: self.id.clone(),
            reviewer_id: cmd.reviewer_id.clone(),
            corrections,
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_reject(&self, cmd: &RejectCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_status(&[CountStatus::PendingReview], "reject")?;
        self.ensure_distinct_reviewer(&cmd.reviewer_id, cmd.require_distinct_reviewer)?;

        if cmd.reason.trim().is_empty() {
            return Err(DomainError::validation("a rejection reason is required"));
        }

        Ok(vec![CountEvent::Rejected(CountRejected {
            count_id: self.id.clone(),
            reviewer_id: cmd.reviewer_id.clone(),
            reason: cmd.reason.trim().to_string(),
            occurred_at: cmd.occurred_at,
        })])
    }

    fn handle_cancel(&self, cmd: &CancelCount) -> Result<Vec<CountEvent>, DomainError> {
        self.ensure_status(
            &[CountStatus::Pending, CountStatus::InProgress, CountStatus::PendingReview],
            "cancel",
        )?;

        Ok(vec![CountEvent::Cancelled(CountCancelled {
            count_id: self.id.clone(),
            actor_id: cmd.actor_id.clone(),
            reason: cmd.reason.clone().filter(|r| !r.trim().is_empty()),
            occurred_at: cmd.occurred_at,
        })])
    }
}
