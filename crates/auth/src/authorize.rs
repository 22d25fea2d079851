use thiserror::Error;

use stockroom_core::{DomainError, FacilityId};

use crate::{role_permissions, Actor, Permission};

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthzError {
    #[error("forbidden: role '{role}' lacks permission '{permission}'")]
    Forbidden { role: String, permission: String },

    #[error("facility mismatch: actor is restricted to '{home}', record belongs to '{requested}'")]
    FacilityMismatch { home: String, requested: String },

    #[error("facility-restricted actor has no home facility")]
    MissingFacilityScope,
}

impl From<AuthzError> for DomainError {
    fn from(value: AuthzError) -> Self {
        DomainError::unauthorized(value.to_string())
    }
}

/// Authorize an actor for a permission.
///
/// - No IO
/// - No panics
/// - No business logic (pure policy check)
pub fn authorize(actor: &Actor, required: &Permission) -> Result<(), AuthzError> {
    if actor.role.is_facility_restricted() && actor.facility_id.is_none() {
        return Err(AuthzError::MissingFacilityScope);
    }

    let granted = role_permissions(actor.role);
    if granted.iter().any(|p| p.is_wildcard() || p == required) {
        Ok(())
    } else {
        Err(AuthzError::Forbidden {
            role: actor.role.to_string(),
            permission: required.to_string(),
        })
    }
}

/// Authorize an actor for a permission on a record owned by `facility_id`.
pub fn authorize_in_facility(
    actor: &Actor,
    required: &Permission,
    facility_id: &FacilityId,
) -> Result<(), AuthzError> {
    authorize(actor, required)?;

    if !actor.can_access_facility(facility_id) {
        return Err(AuthzError::FacilityMismatch {
            home: actor
                .facility_id
                .as_ref()
                .map(|f| f.to_string())
                .unwrap_or_default(),
            requested: facility_id.to_string(),
        });
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Role;

    #[test]
    fn system_administrator_passes_everything() {
        let actor = Actor::new("root", "Root", Role::SystemAdministrator);
        assert!(authorize(&actor, &Permission::COUNTS_PURGE).is_ok());
        assert!(authorize_in_facility(&actor, &Permission::INVENTORY_PURGE, &"f1".into()).is_ok());
    }

    #[test]
    fn auditor_cannot_adjust() {
        let actor = Actor::new("a1", "Ann", Role::Auditor);
        let err = authorize(&actor, &Permission::INVENTORY_ADJUST).unwrap_err();
        assert_eq!(
            err,
            AuthzError::Forbidden {
                role: "auditor".to_string(),
                permission: "inventory.adjust".to_string(),
            }
        );
    }

    #[test]
    fn encoder_is_bound_to_home_facility() {
        let actor = Actor::new("e1", "Eve", Role::Encoder).with_facility("north");
        assert!(authorize_in_facility(&actor, &Permission::INVENTORY_ADJUST, &"north".into()).is_ok());
        assert!(matches!(
            authorize_in_facility(&actor, &Permission::INVENTORY_ADJUST, &"south".into()),
            Err(AuthzError::FacilityMismatch { .. })
        ));
    }

    #[test]
    fn encoder_without_facility_is_rejected() {
        let actor = Actor::new("e2", "Ed", Role::Encoder);
        assert_eq!(
            authorize(&actor, &Permission::INVENTORY_READ),
            Err(AuthzError::MissingFacilityScope)
        );
    }

    #[test]
    fn authz_error_maps_to_unauthorized_domain_error() {
        let err: DomainError = AuthzError::MissingFacilityScope.into();
        assert!(matches!(err, DomainError::Unauthorized(_)));
    }
}
