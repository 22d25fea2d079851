//! Read-side aggregates over stock batches.
//!
//! Recomputed from the current snapshot on every read; nothing is cached.

use std::collections::{BTreeMap, HashMap};

use chrono::{Duration, NaiveDate};

use stockroom_core::{FacilityId, ItemMasterId, ProgramId};

use crate::{InventoryItem, ItemMaster};

/// Quantities and values for a group of batches.
///
/// Consignment stock is counted but kept out of the owned value.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StockTotals {
    pub quantity: u64,
    pub owned_value: u64,
    pub consignment_quantity: u64,
    pub consignment_value: u64,
    pub batches: usize,
}

impl StockTotals {
    pub fn add(&mut self, item: &InventoryItem) {
        self.quantity = self.quantity.saturating_add(item.quantity);
        self.batches += 1;
        if item.is_consignment {
            self.consignment_quantity = self.consignment_quantity.saturating_add(item.quantity);
            self.consignment_value = self.consignment_value.saturating_add(item.stock_value());
        } else {
            self.owned_value = self.owned_value.saturating_add(item.stock_value());
        }
    }

    pub fn of<'a, I>(items: I) -> Self
    where
        I: IntoIterator<Item = &'a InventoryItem>,
    {
        let mut totals = Self::default();
        for item in items {
            totals.add(item);
        }
        totals
    }
}

pub fn total_for_master<'a, I>(items: I, master: &ItemMasterId) -> StockTotals
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    StockTotals::of(items.into_iter().filter(|i| &i.item_master_id == master))
}

pub fn by_facility<'a, I>(items: I) -> BTreeMap<FacilityId, StockTotals>
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    let mut out: BTreeMap<FacilityId, StockTotals> = BTreeMap::new();
    for item in items {
        out.entry(item.facility_id.clone()).or_default().add(item);
    }
    out
}

/// Grouped by funding program; batches without one land under `None`.
pub fn by_program<'a, I>(items: I) -> BTreeMap<Option<ProgramId>, StockTotals>
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    let mut out: BTreeMap<Option<ProgramId>, StockTotals> = BTreeMap::new();
    for item in items {
        out.entry(item.program_id.clone()).or_default().add(item);
    }
    out
}

/// Grouped by item master category. Unknown masters or blank categories are
/// reported as "uncategorized".
pub fn by_category<'a, 'm, I, M>(items: I, masters: M) -> BTreeMap<String, StockTotals>
where
    I: IntoIterator<Item = &'a InventoryItem>,
    M: IntoIterator<Item = &'m ItemMaster>,
{
    let categories: HashMap<&ItemMasterId, &str> = masters
        .into_iter()
        .map(|m| (&m.id, m.category.as_str()))
        .collect();

    let mut out: BTreeMap<String, StockTotals> = BTreeMap::new();
    for item in items {
        let category = categories
            .get(&item.item_master_id)
            .map(|c| c.trim())
            .filter(|c| !c.is_empty())
            .unwrap_or("uncategorized");
        out.entry(category.to_string()).or_default().add(item);
    }
    out
}

/// In-stock batches whose expiry falls within `days` of `today` (inclusive),
/// soonest first. Already-expired batches are included.
pub fn expiring_within<'a, I>(items: I, today: NaiveDate, days: u32) -> Vec<&'a InventoryItem>
where
    I: IntoIterator<Item = &'a InventoryItem>,
{
    let horizon = today + Duration::days(i64::from(days));
    let mut out: Vec<&InventoryItem> = items
        .into_iter()
        .filter(|i| i.quantity > 0)
        .filter(|i| i.expiry_date.is_some_and(|d| d <= horizon))
        .collect();
    out.sort_by_key(|i| i.expiry_date);
    out
}
