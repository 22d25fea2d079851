use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use stockroom_core::{ActorId, AuditEntryId, FacilityId};

use crate::Event;

/// Who performed an audited action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditActor {
    pub actor_id: ActorId,
    pub actor_name: String,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
}

/// One entry of the system-wide audit trail.
///
/// Entries are append-only and written fire-and-forget after the primary
/// mutation has committed:
/// - `action` is the event type of the mutation (e.g. "counts.count_approved")
/// - `details` is the serialized event payload
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuditEntry {
    pub id: AuditEntryId,
    pub action: String,
    pub actor_id: ActorId,
    pub actor_name: String,
    #[serde(default)]
    pub facility_id: Option<FacilityId>,
    #[serde(default)]
    pub details: JsonValue,
    pub recorded_at: DateTime<Utc>,
}

impl AuditEntry {
    /// Build an entry describing `event`, performed by `actor`.
    ///
    /// Serialization failures are folded into the details instead of failing:
    /// the audit trail must never block the mutation it describes.
    pub fn from_event<E>(actor: &AuditActor, event: &E) -> Self
    where
        E: Event + Serialize,
    {
        let details = serde_json::to_value(event).unwrap_or_else(|e| {
            serde_json::json!({ "serializationError": e.to_string() })
        });

        Self {
            id: AuditEntryId::generate(),
            action: event.event_type().to_string(),
            actor_id: actor.actor_id.clone(),
            actor_name: actor.actor_name.clone(),
            facility_id: actor.facility_id.clone(),
            details,
            recorded_at: event.occurred_at(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug, Clone, Serialize)]
    struct Purged {
        item: String,
        at: DateTime<Utc>,
    }

    impl Event for Purged {
        fn event_type(&self) -> &'static str {
            "inventory.item_purged"
        }

        fn version(&self) -> u32 {
            1
        }

        fn occurred_at(&self) -> DateTime<Utc> {
            self.at
        }
    }

    #[test]
    fn entry_carries_event_type_and_payload() {
        let actor = AuditActor {
            actor_id: ActorId::new("u1"),
            actor_name: "Una".to_string(),
            facility_id: None,
        };
        let at = Utc::now();
        let entry = AuditEntry::from_event(
            &actor,
            &Purged {
                item: "batch-7".to_string(),
                at,
            },
        );

        assert_eq!(entry.action, "inventory.item_purged");
        assert_eq!(entry.details["item"], "batch-7");
        assert_eq!(entry.recorded_at, at);
        assert_eq!(entry.actor_id.as_str(), "u1");
    }
}
