use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use stockroom_core::{
    FacilityId, FundSourceId, InventoryItemId, ItemMasterId, LocationId, ProgramId, SupplierId,
};

/// A stocked batch of an item master at one storage location.
///
/// `quantity` is unsigned: a negative stock level cannot be represented, and a
/// stored record with a negative quantity fails to decode at the sync boundary.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InventoryItem {
    pub id: InventoryItemId,
    pub item_master_id: ItemMasterId,
    pub quantity: u64,
    pub location_id: LocationId,
    pub facility_id: FacilityId,
    #[serde(default)]
    pub batch_number: String,
    #[serde(default)]
    pub expiry_date: Option<NaiveDate>,
    /// Cost basis per unit at acquisition, in minor currency units.
    #[serde(default)]
    pub unit_cost: u64,
    #[serde(default)]
    pub supplier_id: Option<SupplierId>,
    #[serde(default)]
    pub program_id: Option<ProgramId>,
    #[serde(default)]
    pub fund_source_id: Option<FundSourceId>,
    /// Supplier-owned until consumed; excluded from owned-value totals.
    #[serde(default)]
    pub is_consignment: bool,
}

impl InventoryItem {
    /// Value of the batch at cost basis.
    pub fn stock_value(&self) -> u64 {
        self.quantity.saturating_mul(self.unit_cost)
    }

    /// Whether another batch is the same stock (same catalog entry, batch,
    /// expiry and ownership), so a transfer can merge into it.
    pub fn is_same_stock(&self, other: &InventoryItem) -> bool {
        self.item_master_id == other.item_master_id
            && self.batch_number == other.batch_number
            && self.expiry_date == other.expiry_date
            && self.is_consignment == other.is_consignment
            && self.unit_cost == other.unit_cost
    }

    pub fn is_expired_on(&self, day: NaiveDate) -> bool {
        self.expiry_date.is_some_and(|d| d < day)
    }
}

/// Catalog definition of a trackable good.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ItemMaster {
    pub id: ItemMasterId,
    pub name: String,
    #[serde(default)]
    pub category: String,
    #[serde(default)]
    pub unit: String,
    #[serde(default)]
    pub item_type: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StorageLocation {
    pub id: LocationId,
    pub name: String,
    pub facility_id: FacilityId,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Facility {
    pub id: FacilityId,
    pub name: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn decodes_camel_case_record_with_defaults() {
        let item: InventoryItem = serde_json::from_value(json!({
            "id": "b1",
            "itemMasterId": "m1",
            "quantity": 12,
            "locationId": "shelf-a",
            "facilityId": "north",
            "expiryDate": "2027-03-31"
        }))
        .unwrap();

        assert_eq!(item.quantity, 12);
        assert_eq!(item.expiry_date, NaiveDate::from_ymd_opt(2027, 3, 31));
        assert!(!item.is_consignment);
        assert_eq!(item.unit_cost, 0);
    }

    #[test]
    fn negative_quantity_does_not_decode() {
        let result = serde_json::from_value::<InventoryItem>(json!({
            "id": "b1",
            "itemMasterId": "m1",
            "quantity": -1,
            "locationId": "shelf-a",
            "facilityId": "north"
        }));
        assert!(result.is_err());
    }
}
