use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use stockroom_core::{CountId, DomainError, DomainResult, InventoryItemId};

use crate::PhysicalCount;

/// How strictly a freeze blocks quantity changes.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FreezePolicy {
    /// Quantity changes to a frozen item are rejected with a conflict.
    #[default]
    Enforced,
    /// Frozen items stay writable; callers only get a warning.
    Advisory,
}

impl FreezePolicy {
    pub fn is_enforced(&self) -> bool {
        matches!(self, FreezePolicy::Enforced)
    }
}

impl core::str::FromStr for FreezePolicy {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "enforced" | "strict" => Ok(FreezePolicy::Enforced),
            "advisory" | "warn" => Ok(FreezePolicy::Advisory),
            other => Err(DomainError::validation(format!("unknown freeze policy '{other}'"))),
        }
    }
}

/// Items currently held by an active physical count.
///
/// Derived from the count documents on every snapshot; never stored.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FreezeSet {
    holders: HashMap<InventoryItemId, CountId>,
}

impl FreezeSet {
    pub fn from_counts<'a, I>(counts: I) -> Self
    where
        I: IntoIterator<Item = &'a PhysicalCount>,
    {
        let mut holders = HashMap::new();
        for count in counts.into_iter().filter(|c| c.is_active()) {
            for line in &count.lines {
                holders
                    .entry(line.inventory_item_id.clone())
                    .or_insert_with(|| count.id.clone());
            }
        }
        Self { holders }
    }

    /// The active count freezing `item_id`, if any.
    pub fn holder(&self, item_id: &InventoryItemId) -> Option<&CountId> {
        self.holders.get(item_id)
    }

    pub fn is_frozen(&self, item_id: &InventoryItemId) -> bool {
        self.holders.contains_key(item_id)
    }

    pub fn len(&self) -> usize {
        self.holders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.holders.is_empty()
    }

    /// Fails with a conflict naming the holding count, unless the holder is
    /// `exempt` (the count whose approval is writing the correction).
    pub fn ensure_unfrozen(
        &self,
        item_id: &InventoryItemId,
        exempt: Option<&CountId>,
    ) -> DomainResult<()> {
        match self.holder(item_id) {
            Some(count) if Some(count) != exempt => Err(DomainError::conflict(format!(
                "inventory item '{item_id}' is frozen by active physical count '{count}'"
            ))),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use stockroom_core::{ActorId, FacilityId, ItemMasterId, LocationId};

    use super::*;
    use crate::{CountLine, CountStatus};

    fn count(id: &str, status: CountStatus, items: &[&str]) -> PhysicalCount {
        let mut c = PhysicalCount::empty(CountId::new(id));
        c.name = id.to_string();
        c.facility_id = FacilityId::new("north");
        c.location_id = LocationId::new("shelf-a");
        c.counter_id = ActorId::new("counter");
        c.initiated_at = Utc::now();
        c.status = status;
        c.revision = 1;
        c.lines = items
            .iter()
            .map(|i| CountLine {
                inventory_item_id: InventoryItemId::new(*i),
                item_master_id: ItemMasterId::new("m"),
                batch_number: String::new(),
                system_quantity: 1,
                counted_quantity: None,
            })
            .collect();
        c
    }

    #[test]
    fn only_active_counts_freeze() {
        let counts = [
            count("c1", CountStatus::InProgress, &["x"]),
            count("c2", CountStatus::Completed, &["y"]),
            count("c3", CountStatus::Cancelled, &["z"]),
            count("c4", CountStatus::PendingReview, &["w"]),
        ];
        let set = FreezeSet::from_counts(&counts);

        assert!(set.is_frozen(&"x".into()));
        assert!(set.is_frozen(&"w".into()));
        assert!(!set.is_frozen(&"y".into()));
        assert!(!set.is_frozen(&"z".into()));
        assert_eq!(set.holder(&"x".into()), Some(&CountId::new("c1")));
    }

    #[test]
    fn conflict_names_the_holding_count_unless_exempt() {
        let counts = [count("c1", CountStatus::Pending, &["x"])];
        let set = FreezeSet::from_counts(&counts);

        let err = set.ensure_unfrozen(&"x".into(), None).unwrap_err();
        assert!(matches!(&err, DomainError::Conflict(msg) if msg.contains("c1")));

        assert!(set.ensure_unfrozen(&"x".into(), Some(&CountId::new("c1"))).is_ok());
        assert!(set.ensure_unfrozen(&"x".into(), Some(&CountId::new("c9"))).is_err());
        assert!(set.ensure_unfrozen(&"free".into(), None).is_ok());
    }

    #[test]
    fn uninitiated_documents_do_not_freeze() {
        let mut c = count("c1", CountStatus::Pending, &["x"]);
        c.revision = 0;
        assert!(FreezeSet::from_counts([&c]).is_empty());
    }

    #[test]
    fn policy_parses_from_config_strings() {
        assert_eq!("Advisory".parse::<FreezePolicy>().unwrap(), FreezePolicy::Advisory);
        assert_eq!("enforced".parse::<FreezePolicy>().unwrap(), FreezePolicy::Enforced);
        assert!("loose".parse::<FreezePolicy>().is_err());
    }
}
