//! Strongly-typed identifiers used across the domain.
//!
//! The remote store keys every record with an opaque server-assigned string,
//! so identifiers wrap a `String` rather than a `Uuid`. Keys generated locally
//! (new log entries, new counts) are UUIDv7 rendered without hyphens, which
//! keeps them time-ordered like the store's own push keys.

use core::str::FromStr;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::DomainError;

/// Identifier of an inventory item (a stock batch).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct InventoryItemId(String);

/// Identifier of an item master (catalog entry).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ItemMasterId(String);

/// Identifier of a storage location inside a facility.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LocationId(String);

/// Identifier of a facility (the multi-facility boundary).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FacilityId(String);

/// Identifier of a physical count.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CountId(String);

/// Identifier of an adjustment log entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AdjustmentId(String);

/// Identifier of a stock movement (receive, dispense, transfer leg).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct MovementId(String);

/// Identifier of an audit-trail entry.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AuditEntryId(String);

/// Identifier of an actor (authenticated user identity).
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ActorId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SupplierId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProgramId(String);

#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FundSourceId(String);

/// Check that a key can be used as a single path segment in the store.
pub fn validate_key(name: &str, key: &str) -> Result<(), DomainError> {
    if key.trim().is_empty() {
        return Err(DomainError::invalid_id(format!("{name}: key cannot be empty")));
    }
    if key.contains('/') {
        return Err(DomainError::invalid_id(format!(
            "{name}: key '{key}' contains a path separator"
        )));
    }
    Ok(())
}

macro_rules! impl_key_newtype {
    ($t:ty, $name:literal) => {
        impl $t {
            /// Wrap an existing key without validation.
            ///
            /// Use `str::parse` for keys that come from outside the process.
            pub fn new(key: impl Into<String>) -> Self {
                Self(key.into())
            }

            /// Generate a fresh, time-ordered key.
            pub fn generate() -> Self {
                Self(Uuid::now_v7().simple().to_string())
            }

            pub fn as_str(&self) -> &str {
                &self.0
            }

            pub fn into_string(self) -> String {
                self.0
            }
        }

        impl core::fmt::Display for $t {
            fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
                f.write_str(&self.0)
            }
        }

        impl From<&str> for $t {
            fn from(value: &str) -> Self {
                Self(value.to_string())
            }
        }

        impl From<String> for $t {
            fn from(value: String) -> Self {
                Self(value)
            }
        }

        impl AsRef<str> for $t {
            fn as_ref(&self) -> &str {
                &self.0
            }
        }

        impl FromStr for $t {
            type Err = DomainError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                validate_key($name, s)?;
                Ok(Self(s.to_string()))
            }
        }
    };
}

impl_key_newtype!(InventoryItemId, "InventoryItemId");
impl_key_newtype!(ItemMasterId, "ItemMasterId");
impl_key_newtype!(LocationId, "LocationId");
impl_key_newtype!(FacilityId, "FacilityId");
impl_key_newtype!(CountId, "CountId");
impl_key_newtype!(AdjustmentId, "AdjustmentId");
impl_key_newtype!(MovementId, "MovementId");
impl_key_newtype!(AuditEntryId, "AuditEntryId");
impl_key_newtype!(ActorId, "ActorId");
impl_key_newtype!(SupplierId, "SupplierId");
impl_key_newtype!(ProgramId, "ProgramId");
impl_key_newtype!(FundSourceId, "FundSourceId");
