//! Runs the reference count scenario against an in-memory store.
//!
//! 100 units of paracetamol are on record at shelf A; the counter finds 95;
//! the reviewer approves and the ledger is corrected.

use std::sync::Arc;
use std::time::Duration;

use anyhow::{bail, Context};
use chrono::NaiveDate;
use tracing::{info, warn};

use stockroom_auth::{Actor, Role};
use stockroom_core::{CountId, InventoryItemId};
use stockroom_inventory::{
    AdjustQuantity, AdjustmentReason, CountEntry, CountStatus, Facility, InventoryItem, ItemMaster,
    StorageLocation,
};
use stockroom_infra::{InMemoryCollectionStore, NewCount, StockSnapshot, Stockroom, StockroomConfig};
use stockroom_observability::LogFormat;

const WAIT: Duration = Duration::from_secs(2);

fn seed(store: &InMemoryCollectionStore) -> anyhow::Result<()> {
    store.seed(
        "facilities",
        "north",
        &Facility {
            id: "north".into(),
            name: "North Clinic".to_string(),
        },
    )?;
    store.seed(
        "storageLocations",
        "shelf-a",
        &StorageLocation {
            id: "shelf-a".into(),
            name: "Shelf A".to_string(),
            facility_id: "north".into(),
        },
    )?;
    store.seed(
        "itemMasters",
        "para",
        &ItemMaster {
            id: "para".into(),
            name: "Paracetamol 500mg".to_string(),
            category: "Medicines".to_string(),
            unit: "tablet".to_string(),
            item_type: "medicine".to_string(),
        },
    )?;
    store.seed(
        "inventoryItems",
        "x",
        &InventoryItem {
            id: "x".into(),
            item_master_id: "para".into(),
            quantity: 100,
            location_id: "shelf-a".into(),
            facility_id: "north".into(),
            batch_number: "LOT-A".to_string(),
            expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30),
            unit_cost: 25,
            supplier_id: None,
            program_id: None,
            fund_source_id: None,
            is_consignment: false,
        },
    )?;
    Ok(())
}

async fn until_status(
    room: &Stockroom<InMemoryCollectionStore>,
    id: &CountId,
    status: CountStatus,
) -> anyhow::Result<Arc<StockSnapshot>> {
    room.wait_for(|s| s.count(id).map(|c| c.status) == Some(status), WAIT)
        .await
        .with_context(|| format!("count {id} never reached {status}"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    match LogFormat::from_env() {
        LogFormat::Pretty => stockroom_observability::init_pretty(),
        LogFormat::Json => stockroom_observability::init(),
    }
    let config = StockroomConfig::from_env().context("invalid configuration")?;

    let store = Arc::new(InMemoryCollectionStore::new());
    seed(&store)?;

    let admin = Actor::new("admin", "Ada Admin", Role::Administrator);
    let counter = Actor::new("enc-north", "Nico Encoder", Role::Encoder).with_facility("north");
    let item = InventoryItemId::new("x");

    let mut room = Stockroom::with_store_audit(store.clone(), config);
    let readiness = room.open(admin.clone()).await;
    if !readiness.is_ready() {
        warn!(?readiness, "starting with a partial snapshot");
    }

    let count = room
        .initiate_count(NewCount {
            name: "Quarter-end shelf A".to_string(),
            location_id: "shelf-a".into(),
            counter_id: Some(counter.id.clone()),
            notes: String::new(),
        })
        .await?;
    until_status(&room, &count.id, CountStatus::Pending).await?;

    match room
        .adjust_quantity(AdjustQuantity {
            item_id: item.clone(),
            new_quantity: 98,
            reason: AdjustmentReason::Damage,
            notes: String::new(),
        })
        .await
    {
        Ok(_) => bail!("adjustment of a frozen item was accepted"),
        Err(e) => info!(kind = %e.kind(), error = %e, "concurrent adjustment rejected"),
    }

    room.switch_actor(counter).await;
    room.record_count(
        &count.id,
        vec![CountEntry {
            inventory_item_id: item.clone(),
            counted_quantity: 95,
        }],
    )
    .await?;
    until_status(&room, &count.id, CountStatus::InProgress).await?;
    room.submit_count(&count.id).await?;

    room.switch_actor(admin).await;
    until_status(&room, &count.id, CountStatus::PendingReview).await?;
    let outcome = room.approve_count(&count.id).await?;

    let snapshot = room
        .wait_for(|s| s.item(&item).map(|i| i.quantity) == Some(95), WAIT)
        .await
        .context("corrected quantity never arrived")?;
    for entry in &outcome.adjustments {
        info!(
            control_number = %entry.control_number,
            from = entry.from_quantity,
            to = entry.to_quantity,
            reason = %entry.reason,
            "ledger corrected"
        );
    }
    info!(
        count = %outcome.count.id,
        status = %outcome.count.status,
        on_hand = snapshot.total_for_master(&"para".into()).quantity,
        "scenario complete"
    );

    room.close();
    Ok(())
}
