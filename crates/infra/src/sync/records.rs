use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use stockroom_auth::Role;
use stockroom_core::{ActorId, FacilityId};

/// Entry of the privileged `users` collection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserRecord {
    pub id: ActorId,
    #[serde(default)]
    pub display_name: String,
    pub role: Role,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
}

/// Value of the `presence` map.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "camelCase")]
pub struct Presence {
    #[serde(default)]
    pub online: bool,
    #[serde(default)]
    pub last_seen: Option<DateTime<Utc>>,
}
