use std::borrow::Cow;

use serde::{Deserialize, Serialize};

use crate::Role;

/// Permission identifier.
///
/// Permissions are modeled as opaque strings (e.g. "inventory.adjust").
/// The wildcard permission `"*"` grants everything and is reserved for the
/// system administrator role.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Permission(Cow<'static, str>);

impl Permission {
    pub const WILDCARD: Permission = Permission(Cow::Borrowed("*"));

    pub const INVENTORY_READ: Permission = Permission(Cow::Borrowed("inventory.read"));
    pub const INVENTORY_ADJUST: Permission = Permission(Cow::Borrowed("inventory.adjust"));
    pub const INVENTORY_RECEIVE: Permission = Permission(Cow::Borrowed("inventory.receive"));
    pub const INVENTORY_DISPENSE: Permission = Permission(Cow::Borrowed("inventory.dispense"));
    pub const INVENTORY_TRANSFER: Permission = Permission(Cow::Borrowed("inventory.transfer"));
    pub const INVENTORY_PURGE: Permission = Permission(Cow::Borrowed("inventory.purge"));

    pub const COUNTS_INITIATE: Permission = Permission(Cow::Borrowed("counts.initiate"));
    pub const COUNTS_RECORD: Permission = Permission(Cow::Borrowed("counts.record"));
    pub const COUNTS_REVIEW: Permission = Permission(Cow::Borrowed("counts.review"));
    pub const COUNTS_CANCEL: Permission = Permission(Cow::Borrowed("counts.cancel"));
    pub const COUNTS_PURGE: Permission = Permission(Cow::Borrowed("counts.purge"));

    pub const AUDIT_READ: Permission = Permission(Cow::Borrowed("audit.read"));

    pub fn new(name: impl Into<Cow<'static, str>>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_wildcard(&self) -> bool {
        self.as_str() == "*"
    }
}

impl core::fmt::Display for Permission {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str(&self.0)
    }
}

/// Default role → permission policy.
pub fn role_permissions(role: Role) -> Vec<Permission> {
    match role {
        Role::SystemAdministrator => vec![Permission::WILDCARD],
        Role::Administrator => vec![
            Permission::INVENTORY_READ,
            Permission::INVENTORY_ADJUST,
            Permission::INVENTORY_RECEIVE,
            Permission::INVENTORY_DISPENSE,
            Permission::INVENTORY_TRANSFER,
            Permission::INVENTORY_PURGE,
            Permission::COUNTS_INITIATE,
            Permission::COUNTS_RECORD,
            Permission::COUNTS_REVIEW,
            Permission::COUNTS_CANCEL,
            Permission::AUDIT_READ,
        ],
        Role::Encoder => vec![
            Permission::INVENTORY_READ,
            Permission::INVENTORY_ADJUST,
            Permission::INVENTORY_RECEIVE,
            Permission::INVENTORY_DISPENSE,
            Permission::INVENTORY_TRANSFER,
            Permission::COUNTS_INITIATE,
            Permission::COUNTS_RECORD,
            Permission::COUNTS_CANCEL,
        ],
        Role::Auditor => vec![Permission::INVENTORY_READ, Permission::AUDIT_READ],
        Role::User => vec![
            Permission::INVENTORY_READ,
            Permission::INVENTORY_DISPENSE,
            Permission::COUNTS_RECORD,
        ],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auditor_is_read_only() {
        let perms = role_permissions(Role::Auditor);
        assert!(perms.contains(&Permission::AUDIT_READ));
        assert!(!perms.contains(&Permission::INVENTORY_ADJUST));
        assert!(!perms.contains(&Permission::COUNTS_RECORD));
    }

    #[test]
    fn only_system_administrator_gets_the_wildcard() {
        assert!(role_permissions(Role::SystemAdministrator)[0].is_wildcard());
        for role in [Role::Administrator, Role::Encoder, Role::Auditor, Role::User] {
            assert!(role_permissions(role).iter().all(|p| !p.is_wildcard()));
        }
    }
}
