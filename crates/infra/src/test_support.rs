//! Shared fixtures for the infra tests.

use std::sync::Arc;
use std::time::Duration;

use chrono::{NaiveDate, Utc};

use stockroom_auth::{Actor, Role};
use stockroom_core::{CountId, InventoryItemId};
use stockroom_events::InMemoryAuditSink;
use stockroom_inventory::{
    AdjustQuantity, AdjustmentReason, CountLine, CountStatus, Facility, InventoryItem, ItemMaster,
    PhysicalCount, ReceiveStock, StorageLocation,
};

use crate::audit::AuditTrail;
use crate::collection_store::InMemoryCollectionStore;
use crate::config::StockroomConfig;
use crate::counts::CountEngine;
use crate::ledger::StockLedger;
use crate::sync::{MaterializedView, StockSnapshot};

pub(crate) const WAIT: Duration = Duration::from_secs(2);

pub(crate) fn admin() -> Actor {
    Actor::new("admin", "Ada Admin", Role::Administrator)
}

pub(crate) fn sysadmin() -> Actor {
    Actor::new("root", "Sam Root", Role::SystemAdministrator)
}

pub(crate) fn encoder_north() -> Actor {
    Actor::new("enc-north", "Nico Encoder", Role::Encoder).with_facility("north")
}

pub(crate) fn encoder_south() -> Actor {
    Actor::new("enc-south", "Sol Encoder", Role::Encoder).with_facility("south")
}

pub(crate) fn auditor() -> Actor {
    Actor::new("aud", "Aria Auditor", Role::Auditor)
}

pub(crate) fn item(id: &str, master: &str, quantity: u64, location: &str, facility: &str, batch: &str) -> InventoryItem {
    InventoryItem {
        id: id.into(),
        item_master_id: master.into(),
        quantity,
        location_id: location.into(),
        facility_id: facility.into(),
        batch_number: batch.to_string(),
        expiry_date: NaiveDate::from_ymd_opt(2027, 6, 30),
        unit_cost: 25,
        supplier_id: None,
        program_id: None,
        fund_source_id: None,
        is_consignment: false,
    }
}

/// Two facilities, three locations, two masters and three batches:
///
/// - `x`: 100 × paracetamol at north/shelf-a
/// - `y`: 40 × gloves at north/shelf-a
/// - `z`: 10 × paracetamol at south/cold-1
pub(crate) fn seed_reference_data(store: &InMemoryCollectionStore) {
    for (id, name) in [("north", "North Clinic"), ("south", "South Clinic")] {
        store
            .seed("facilities", id, &Facility { id: id.into(), name: name.to_string() })
            .unwrap();
    }
    for (id, facility) in [("shelf-a", "north"), ("shelf-b", "north"), ("cold-1", "south")] {
        let location = StorageLocation {
            id: id.into(),
            name: id.to_uppercase(),
            facility_id: facility.into(),
        };
        store.seed("storageLocations", id, &location).unwrap();
    }
    for (id, name, category) in [("para", "Paracetamol 500mg", "Medicines"), ("gloves", "Nitrile gloves", "PPE")] {
        let master = ItemMaster {
            id: id.into(),
            name: name.to_string(),
            category: category.to_string(),
            unit: "piece".to_string(),
            item_type: "consumable".to_string(),
        };
        store.seed("itemMasters", id, &master).unwrap();
    }
    for record in [
        item("x", "para", 100, "shelf-a", "north", "LOT-A"),
        item("y", "gloves", 40, "shelf-a", "north", "LOT-G"),
        item("z", "para", 10, "cold-1", "south", "LOT-S"),
    ] {
        store.seed("inventoryItems", record.id.as_str(), &record).unwrap();
    }
}

/// Audit entries are written by spawned tasks; poll until `expected` arrive.
pub(crate) async fn audited(sink: &InMemoryAuditSink, action: &str, expected: usize) -> usize {
    for _ in 0..100 {
        if sink.entries_for(action).len() >= expected {
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    sink.entries_for(action).len()
}

pub(crate) fn adjust(item: &str, new_quantity: i64, reason: AdjustmentReason) -> AdjustQuantity {
    AdjustQuantity {
        item_id: item.into(),
        new_quantity,
        reason,
        notes: String::new(),
    }
}

pub(crate) fn receipt(location: &str, quantity: u64) -> ReceiveStock {
    ReceiveStock {
        item_master_id: "para".into(),
        location_id: location.into(),
        quantity,
        batch_number: "LOT-NEW".to_string(),
        expiry_date: NaiveDate::from_ymd_opt(2028, 1, 31),
        unit_cost: 30,
        supplier_id: None,
        program_id: None,
        fund_source_id: None,
        is_consignment: false,
        notes: String::new(),
    }
}

/// Seeded store plus an admin view over it.
pub(crate) struct Fixture {
    pub store: Arc<InMemoryCollectionStore>,
    pub audit: Arc<InMemoryAuditSink>,
    pub view: MaterializedView<InMemoryCollectionStore>,
    pub config: StockroomConfig,
}

impl Fixture {
    pub async fn new(config: StockroomConfig) -> Self {
        let store = Arc::new(InMemoryCollectionStore::new());
        seed_reference_data(&store);

        let mut view = MaterializedView::new(store.clone(), config.readiness_timeout);
        view.open(admin()).await;
        assert!(view.wait_ready().await.is_ready());

        Self {
            store,
            audit: Arc::new(InMemoryAuditSink::new()),
            view,
            config,
        }
    }

    pub fn ledger(&self) -> StockLedger<InMemoryCollectionStore> {
        StockLedger::new(
            self.store.clone(),
            AuditTrail::new(self.audit.clone()),
            self.config.clone(),
        )
    }

    pub fn counts(&self) -> CountEngine<InMemoryCollectionStore> {
        CountEngine::new(self.ledger())
    }

    pub fn snapshot(&self) -> Arc<StockSnapshot> {
        self.view.snapshot()
    }

    pub async fn quantity_becomes(&self, item: &str, quantity: u64) -> Arc<StockSnapshot> {
        let id = InventoryItemId::new(item);
        self.view
            .wait_for(|s| s.item(&id).map(|i| i.quantity) == Some(quantity), WAIT)
            .await
            .unwrap()
    }

    pub async fn frozen(&self, item: &str) -> Arc<StockSnapshot> {
        let id = InventoryItemId::new(item);
        self.view.wait_for(|s| s.freeze.is_frozen(&id), WAIT).await.unwrap()
    }

    pub async fn count_status_becomes(&self, count: &CountId, status: CountStatus) -> Arc<StockSnapshot> {
        self.view
            .wait_for(|s| s.count(count).map(|c| c.status) == Some(status), WAIT)
            .await
            .unwrap()
    }

    /// Write an in-progress count at shelf-a covering `items`, with the hold
    /// markers initiation would have set.
    pub fn seed_active_count(&self, id: &str, items: &[&str]) {
        let mut count = PhysicalCount::empty(id.into());
        count.name = format!("count {id}");
        count.facility_id = "north".into();
        count.location_id = "shelf-a".into();
        count.counter_id = "enc-north".into();
        count.initiated_by = "admin".into();
        count.initiated_at = Utc::now();
        count.status = CountStatus::InProgress;
        count.revision = 2;
        count.lines = items
            .iter()
            .map(|i| CountLine {
                inventory_item_id: (*i).into(),
                item_master_id: "para".into(),
                batch_number: String::new(),
                system_quantity: 0,
                counted_quantity: None,
            })
            .collect();
        self.store.seed("physicalCounts", id, &count).unwrap();

        let batches = self.store.records("inventoryItems");
        for held in items {
            let mut record = batches[*held].clone();
            record["heldBy"] = serde_json::json!(id);
            self.store.seed_value("inventoryItems", held, record).unwrap();
        }
    }
}
