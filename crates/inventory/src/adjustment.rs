use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ActorId, AdjustmentId, FacilityId, InventoryItemId, ItemMasterId};

/// Why a quantity was corrected outside of a receive/dispense/transfer.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum AdjustmentReason {
    Damage,
    Loss,
    Expiry,
    Correction,
    PhysicalCountCorrection,
    /// Free-text reason entered by the operator.
    Other(String),
}

impl AdjustmentReason {
    pub fn as_str(&self) -> &str {
        match self {
            AdjustmentReason::Damage => "damage",
            AdjustmentReason::Loss => "loss",
            AdjustmentReason::Expiry => "expiry",
            AdjustmentReason::Correction => "correction",
            AdjustmentReason::PhysicalCountCorrection => "physical-count-correction",
            AdjustmentReason::Other(s) => s,
        }
    }

    /// Write-offs remove stock from use (as opposed to correcting a miscount).
    pub fn is_write_off(&self) -> bool {
        matches!(
            self,
            AdjustmentReason::Damage | AdjustmentReason::Loss | AdjustmentReason::Expiry
        )
    }
}

impl From<String> for AdjustmentReason {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_lowercase().as_str() {
            "damage" | "damaged" => AdjustmentReason::Damage,
            "loss" | "lost" => AdjustmentReason::Loss,
            "expiry" | "expired" => AdjustmentReason::Expiry,
            "correction" => AdjustmentReason::Correction,
            "physical-count-correction" | "physical_count_correction" => {
                AdjustmentReason::PhysicalCountCorrection
            }
            _ => AdjustmentReason::Other(value),
        }
    }
}

impl From<&str> for AdjustmentReason {
    fn from(value: &str) -> Self {
        AdjustmentReason::from(value.to_string())
    }
}

impl From<AdjustmentReason> for String {
    fn from(value: AdjustmentReason) -> Self {
        match value {
            AdjustmentReason::Other(s) => s,
            other => other.as_str().to_string(),
        }
    }
}

impl core::fmt::Display for AdjustmentReason {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Append-only record explaining one quantity correction.
///
/// Written in the same atomic operation as the quantity change it explains;
/// `from_quantity`/`to_quantity` always match the item's before/after values.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentLogEntry {
    pub id: AdjustmentId,
    pub control_number: String,
    pub inventory_item_id: InventoryItemId,
    pub item_master_id: ItemMasterId,
    pub from_quantity: u64,
    pub to_quantity: u64,
    pub reason: AdjustmentReason,
    #[serde(default)]
    pub notes: String,
    pub actor_id: ActorId,
    pub facility_id: FacilityId,
    pub adjusted_at: DateTime<Utc>,
    #[serde(default)]
    pub is_consignment: bool,
}

impl AdjustmentLogEntry {
    /// Signed change applied by this entry.
    pub fn delta(&self) -> i64 {
        self.to_quantity as i64 - self.from_quantity as i64
    }
}

/// Human-facing control number: `ADJ-YYYYMMDD-<last 8 chars of the key>`.
pub fn control_number(id: &AdjustmentId, at: DateTime<Utc>) -> String {
    let key = id.as_str();
    let suffix = &key[key.len().saturating_sub(8)..];
    format!("ADJ-{}-{}", at.format("%Y%m%d"), suffix.to_ascii_uppercase())
}
