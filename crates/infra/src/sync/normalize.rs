//! Raw collection snapshots → typed records.
//!
//! Bad records are skipped with a warning; the rest of the collection is kept.

use std::collections::BTreeMap;

use serde::de::DeserializeOwned;
use serde_json::Value as JsonValue;
use tracing::warn;

use stockroom_core::id::validate_key;
use stockroom_core::FacilityId;
use stockroom_events::AuditEntry;
use stockroom_inventory::{
    AdjustmentLogEntry, Facility, InventoryItem, PhysicalCount, StockMovement, StorageLocation,
};

use crate::collection_store::RawRecords;

use super::collections::CollectionName;

/// Decode a list-shaped collection, injecting each server key as `id`.
pub fn decode_list<T: DeserializeOwned>(collection: CollectionName, raw: &RawRecords) -> Vec<T> {
    let mut out = Vec::with_capacity(raw.len());
    for (key, value) in raw {
        if let Err(e) = validate_key(collection.as_str(), key) {
            warn!(collection = %collection, key = %key, error = %e, "skipping record with invalid key");
            continue;
        }
        let JsonValue::Object(fields) = value else {
            warn!(collection = %collection, key = %key, "skipping non-object record");
            continue;
        };

        let mut fields = fields.clone();
        fields.insert("id".to_string(), JsonValue::String(key.clone()));
        match serde_json::from_value::<T>(JsonValue::Object(fields)) {
            Ok(record) => out.push(record),
            Err(e) => {
                warn!(collection = %collection, key = %key, error = %e, "skipping undecodable record");
            }
        }
    }
    out
}

/// Decode a map-shaped collection, keeping keys as they are.
pub fn decode_map<T: DeserializeOwned>(collection: CollectionName, raw: &RawRecords) -> BTreeMap<String, T> {
    let mut out = BTreeMap::new();
    for (key, value) in raw {
        match serde_json::from_value::<T>(value.clone()) {
            Ok(v) => {
                out.insert(key.clone(), v);
            }
            Err(e) => {
                warn!(collection = %collection, key = %key, error = %e, "skipping undecodable entry");
            }
        }
    }
    out
}

/// Records that belong to one facility.
pub trait FacilityScoped {
    fn facility(&self) -> Option<&FacilityId>;
}

impl FacilityScoped for InventoryItem {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.facility_id)
    }
}

impl FacilityScoped for StorageLocation {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.facility_id)
    }
}

impl FacilityScoped for Facility {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.id)
    }
}

impl FacilityScoped for AdjustmentLogEntry {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.facility_id)
    }
}

impl FacilityScoped for PhysicalCount {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.facility_id)
    }
}

impl FacilityScoped for StockMovement {
    fn facility(&self) -> Option<&FacilityId> {
        Some(&self.facility_id)
    }
}

impl FacilityScoped for AuditEntry {
    fn facility(&self) -> Option<&FacilityId> {
        self.facility_id.as_ref()
    }
}

/// Keep only records of `scope`; no scope keeps everything.
pub fn retain_scope<T: FacilityScoped>(records: &mut Vec<T>, scope: Option<&FacilityId>) {
    if let Some(scope) = scope {
        records.retain(|r| r.facility() == Some(scope));
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    fn raw(entries: &[(&str, JsonValue)]) -> RawRecords {
        entries
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect()
    }

    #[test]
    fn injects_key_and_skips_bad_records() {
        let records = raw(&[
            ("b1", json!({ "itemMasterId": "m1", "quantity": 5, "locationId": "s", "facilityId": "north" })),
            ("b2", json!({ "itemMasterId": "m1", "quantity": -3, "locationId": "s", "facilityId": "north" })),
            ("b3", json!("not an object")),
            ("b4", json!({ "id": "spoofed", "itemMasterId": "m2", "quantity": 1, "locationId": "s", "facilityId": "south" })),
        ]);

        let items: Vec<InventoryItem> = decode_list(CollectionName::InventoryItems, &records);
        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["b1", "b4"]);
    }

    #[test]
    fn scope_filters_by_facility() {
        let records = raw(&[
            ("s1", json!({ "name": "Shelf 1", "facilityId": "north" })),
            ("s2", json!({ "name": "Shelf 2", "facilityId": "south" })),
        ]);
        let mut locations: Vec<StorageLocation> = decode_list(CollectionName::StorageLocations, &records);
        retain_scope(&mut locations, Some(&FacilityId::new("north")));
        assert_eq!(locations.len(), 1);
        assert_eq!(locations[0].name, "Shelf 1");
    }

    #[test]
    fn map_collections_keep_keys() {
        let records = raw(&[("2026", json!(true)), ("2025", json!(false)), ("bad", json!("yes"))]);
        let years: BTreeMap<String, bool> = decode_map(CollectionName::FiscalYears, &records);
        assert_eq!(years.len(), 2);
        assert_eq!(years["2026"], true);
    }
}
