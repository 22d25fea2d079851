use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_core::{ActorId, FacilityId, InventoryItemId, ItemMasterId, MovementId};

/// Transactional stock movement kinds. These change quantities without an
/// adjustment log entry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovementKind {
    Receive,
    Dispense,
    TransferOut,
    TransferIn,
}

impl MovementKind {
    /// +1 for inbound movements, -1 for outbound.
    pub fn sign(&self) -> i64 {
        match self {
            MovementKind::Receive | MovementKind::TransferIn => 1,
            MovementKind::Dispense | MovementKind::TransferOut => -1,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StockMovement {
    pub id: MovementId,
    pub kind: MovementKind,
    pub inventory_item_id: InventoryItemId,
    pub item_master_id: ItemMasterId,
    pub quantity: u64,
    pub facility_id: FacilityId,
    pub actor_id: ActorId,
    pub occurred_at: DateTime<Utc>,
    #[serde(default)]
    pub notes: String,
    /// The other leg of a transfer.
    #[serde(default)]
    pub counterpart_item_id: Option<InventoryItemId>,
}

impl StockMovement {
    pub fn signed_quantity(&self) -> i64 {
        self.kind.sign() * self.quantity as i64
    }
}
