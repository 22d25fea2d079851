use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde_json::Value as JsonValue;

use stockroom_core::{CountId, FacilityId, InventoryItemId, ItemMasterId, LocationId, ProgramId};
use stockroom_events::AuditEntry;
use stockroom_inventory::summary;
use stockroom_inventory::{
    AdjustmentLogEntry, Facility, FreezeSet, InventoryItem, ItemMaster, PhysicalCount,
    StockMovement, StockTotals, StorageLocation,
};

use crate::collection_store::RawRecords;

use super::collections::CollectionName;
use super::normalize::{decode_list, decode_map, retain_scope};
use super::records::{Presence, UserRecord};

/// Composite, read-only view of every mirrored collection.
///
/// Each collection is replaced wholesale when the store pushes a new
/// snapshot of it; there is no transaction across collections.
#[derive(Debug, Clone, Default)]
pub struct StockSnapshot {
    pub items: Arc<Vec<InventoryItem>>,
    pub item_masters: Arc<Vec<ItemMaster>>,
    pub locations: Arc<Vec<StorageLocation>>,
    pub facilities: Arc<Vec<Facility>>,
    pub adjustment_logs: Arc<Vec<AdjustmentLogEntry>>,
    pub counts: Arc<Vec<PhysicalCount>>,
    pub movements: Arc<Vec<StockMovement>>,
    pub users: Arc<Vec<UserRecord>>,
    pub audit_trail: Arc<Vec<AuditEntry>>,
    pub settings: Arc<BTreeMap<String, JsonValue>>,
    pub presence: Arc<BTreeMap<String, Presence>>,
    pub fiscal_years: Arc<BTreeMap<String, bool>>,
    /// Derived from `counts` whenever they change.
    pub freeze: Arc<FreezeSet>,
    /// Every subscribed collection delivered once (or failed).
    pub ready: bool,
    /// The readiness deadline passed before `ready`.
    pub degraded: bool,
    /// Session generation this snapshot belongs to.
    pub generation: u64,
}

impl StockSnapshot {
    /// Replace one collection from a raw store snapshot.
    pub fn replace(&mut self, collection: CollectionName, raw: &RawRecords, scope: Option<&FacilityId>) {
        match collection {
            CollectionName::InventoryItems => self.items = Arc::new(scoped(collection, raw, scope)),
            CollectionName::ItemMasters => self.item_masters = Arc::new(decode_list(collection, raw)),
            CollectionName::StorageLocations => self.locations = Arc::new(scoped(collection, raw, scope)),
            CollectionName::Facilities => self.facilities = Arc::new(scoped(collection, raw, scope)),
            CollectionName::AdjustmentLogs => {
                self.adjustment_logs = Arc::new(scoped(collection, raw, scope))
            }
            CollectionName::PhysicalCounts => {
                let counts: Vec<PhysicalCount> = scoped(collection, raw, scope);
                self.freeze = Arc::new(FreezeSet::from_counts(&counts));
                self.counts = Arc::new(counts);
            }
            CollectionName::StockMovements => self.movements = Arc::new(scoped(collection, raw, scope)),
            CollectionName::Users => self.users = Arc::new(decode_list(collection, raw)),
            CollectionName::AuditTrail => self.audit_trail = Arc::new(decode_list(collection, raw)),
            CollectionName::Settings => self.settings = Arc::new(decode_map(collection, raw)),
            CollectionName::Presence => self.presence = Arc::new(decode_map(collection, raw)),
            CollectionName::FiscalYears => self.fiscal_years = Arc::new(decode_map(collection, raw)),
        }
    }

    pub fn item(&self, id: &InventoryItemId) -> Option<&InventoryItem> {
        self.items.iter().find(|i| &i.id == id)
    }

    pub fn items_at(&self, location: &LocationId) -> impl Iterator<Item = &InventoryItem> {
        self.items.iter().filter(move |i| &i.location_id == location)
    }

    pub fn item_master(&self, id: &ItemMasterId) -> Option<&ItemMaster> {
        self.item_masters.iter().find(|m| &m.id == id)
    }

    pub fn location(&self, id: &LocationId) -> Option<&StorageLocation> {
        self.locations.iter().find(|l| &l.id == id)
    }

    pub fn count(&self, id: &CountId) -> Option<&PhysicalCount> {
        self.counts.iter().find(|c| &c.id == id)
    }

    pub fn active_counts(&self) -> impl Iterator<Item = &PhysicalCount> {
        self.counts.iter().filter(|c| c.is_active())
    }

    /// The active count holding `item`, if any.
    pub fn freezing_count(&self, item: &InventoryItemId) -> Option<&CountId> {
        self.freeze.holder(item)
    }

    /// Adjustment history of one batch, oldest first.
    pub fn adjustments_for(&self, item: &InventoryItemId) -> Vec<&AdjustmentLogEntry> {
        let mut entries: Vec<&AdjustmentLogEntry> = self
            .adjustment_logs
            .iter()
            .filter(|e| &e.inventory_item_id == item)
            .collect();
        entries.sort_by_key(|e| e.adjusted_at);
        entries
    }

    pub fn setting(&self, key: &str) -> Option<&JsonValue> {
        self.settings.get(key)
    }

    pub fn is_fiscal_year_open(&self, year: &str) -> bool {
        self.fiscal_years.get(year).copied().unwrap_or(false)
    }

    pub fn total_for_master(&self, master: &ItemMasterId) -> StockTotals {
        summary::total_for_master(self.items.iter(), master)
    }

    pub fn stock_by_category(&self) -> BTreeMap<String, StockTotals> {
        summary::by_category(self.items.iter(), self.item_masters.iter())
    }

    pub fn stock_by_program(&self) -> BTreeMap<Option<ProgramId>, StockTotals> {
        summary::by_program(self.items.iter())
    }

    pub fn stock_by_facility(&self) -> BTreeMap<FacilityId, StockTotals> {
        summary::by_facility(self.items.iter())
    }

    pub fn expiring_within(&self, today: NaiveDate, days: u32) -> Vec<&InventoryItem> {
        summary::expiring_within(self.items.iter(), today, days)
    }
}

fn scoped<T>(collection: CollectionName, raw: &RawRecords, scope: Option<&FacilityId>) -> Vec<T>
where
    T: serde::de::DeserializeOwned + super::normalize::FacilityScoped,
{
    let mut records = decode_list(collection, raw);
    retain_scope(&mut records, scope);
    records
}
