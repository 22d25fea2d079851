use stockroom_auth::{authorize, Actor, Permission};
use stockroom_core::DomainError;

/// Collections mirrored by the synchronized view.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum CollectionName {
    InventoryItems,
    ItemMasters,
    StorageLocations,
    Facilities,
    AdjustmentLogs,
    PhysicalCounts,
    StockMovements,
    Users,
    AuditTrail,
    Settings,
    Presence,
    FiscalYears,
}

impl CollectionName {
    pub const ALL: [CollectionName; 12] = [
        CollectionName::InventoryItems,
        CollectionName::ItemMasters,
        CollectionName::StorageLocations,
        CollectionName::Facilities,
        CollectionName::AdjustmentLogs,
        CollectionName::PhysicalCounts,
        CollectionName::StockMovements,
        CollectionName::Users,
        CollectionName::AuditTrail,
        CollectionName::Settings,
        CollectionName::Presence,
        CollectionName::FiscalYears,
    ];

    /// Name of the collection in the remote store.
    pub fn as_str(&self) -> &'static str {
        match self {
            CollectionName::InventoryItems => "inventoryItems",
            CollectionName::ItemMasters => "itemMasters",
            CollectionName::StorageLocations => "storageLocations",
            CollectionName::Facilities => "facilities",
            CollectionName::AdjustmentLogs => "adjustmentLogs",
            CollectionName::PhysicalCounts => "physicalCounts",
            CollectionName::StockMovements => "stockMovements",
            CollectionName::Users => "users",
            CollectionName::AuditTrail => "auditTrail",
            CollectionName::Settings => "settings",
            CollectionName::Presence => "presence",
            CollectionName::FiscalYears => "fiscalYears",
        }
    }

    /// Readable only with `audit.read`; forced empty for everyone else.
    pub fn is_privileged(&self) -> bool {
        matches!(self, CollectionName::Users | CollectionName::AuditTrail)
    }

    /// Records carry a facility and are filtered for facility-restricted actors.
    pub fn is_facility_scoped(&self) -> bool {
        matches!(
            self,
            CollectionName::InventoryItems
                | CollectionName::StorageLocations
                | CollectionName::Facilities
                | CollectionName::AdjustmentLogs
                | CollectionName::PhysicalCounts
                | CollectionName::StockMovements
        )
    }

    /// Kept as key → value maps instead of record lists.
    pub fn is_map(&self) -> bool {
        matches!(
            self,
            CollectionName::Settings | CollectionName::Presence | CollectionName::FiscalYears
        )
    }
}

impl core::fmt::Display for CollectionName {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AsRef<str> for CollectionName {
    fn as_ref(&self) -> &str {
        self.as_str()
    }
}

impl core::str::FromStr for CollectionName {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CollectionName::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| DomainError::validation(format!("unknown collection '{s}'")))
    }
}

/// Collections an actor subscribes to, in subscription order.
pub fn subscription_plan(actor: &Actor) -> Vec<CollectionName> {
    let privileged = authorize(actor, &Permission::AUDIT_READ).is_ok();
    CollectionName::ALL
        .into_iter()
        .filter(|c| privileged || !c.is_privileged())
        .collect()
}
