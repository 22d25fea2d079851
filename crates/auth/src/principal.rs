use serde::{Deserialize, Serialize};

use stockroom_core::{ActorId, FacilityId};

use crate::Role;

/// The authenticated identity a session acts as.
///
/// Supplied by the external authentication collaborator. Changing the actor
/// (login, logout, impersonation) requires closing and re-opening the
/// synchronized view so one actor's scope is never served to another.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub id: ActorId,
    pub display_name: String,
    pub role: Role,
    /// Home facility; required for facility-restricted roles.
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
}

impl Actor {
    pub fn new(id: impl Into<ActorId>, display_name: impl Into<String>, role: Role) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            role,
            facility_id: None,
        }
    }

    pub fn with_facility(mut self, facility_id: impl Into<FacilityId>) -> Self {
        self.facility_id = Some(facility_id.into());
        self
    }

    /// Facility the actor's reads are restricted to, if any.
    pub fn facility_scope(&self) -> Option<&FacilityId> {
        if self.role.is_facility_restricted() {
            self.facility_id.as_ref()
        } else {
            None
        }
    }

    /// Whether records of `facility_id` are within this actor's reach.
    pub fn can_access_facility(&self, facility_id: &FacilityId) -> bool {
        if !self.role.is_facility_restricted() {
            return true;
        }
        self.facility_id.as_ref() == Some(facility_id)
    }
}
