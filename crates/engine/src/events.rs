//! Lifecycle events broadcast to the API layer.
//!
//! Emitted at every state transition; delivery beyond the broadcast
//! channel (polling endpoints, push channels) is the subscriber's concern.

use serde::Serialize;
use uuid::Uuid;

use crate::entry::Lane;

/// One event per state transition, each carrying the entry and owner ids
/// plus transition-specific data.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum LifecycleEvent {
    Queued {
        entry_id: Uuid,
        owner_id: String,
        lane: Lane,
        position: usize,
        estimated_wait_ms: u64,
    },
    Started {
        entry_id: Uuid,
        owner_id: String,
        attempt: u32,
    },
    Completed {
        entry_id: Uuid,
        owner_id: String,
        elapsed_ms: u64,
    },
    Retrying {
        entry_id: Uuid,
        owner_id: String,
        attempt: u32,
        delay_ms: u64,
        error: String,
    },
    Failed {
        entry_id: Uuid,
        owner_id: String,
        error: String,
        attempts: u32,
    },
}

impl LifecycleEvent {
    pub fn entry_id(&self) -> Uuid {
        match self {
            LifecycleEvent::Queued { entry_id, .. }
            | LifecycleEvent::Started { entry_id, .. }
            | LifecycleEvent::Completed { entry_id, .. }
            | LifecycleEvent::Retrying { entry_id, .. }
            | LifecycleEvent::Failed { entry_id, .. } => *entry_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_tag() {
        let id = Uuid::new_v4();
        let event = LifecycleEvent::Queued {
            entry_id: id,
            owner_id: "u1".to_string(),
            lane: Lane::High,
            position: 1,
            estimated_wait_ms: 3000,
        };

        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["event"], "queued");
        assert_eq!(json["lane"], "high");
        assert_eq!(json["position"], 1);
        assert_eq!(json["entry_id"], id.to_string());
    }

    #[test]
    fn entry_id_accessor_covers_all_variants() {
        let id = Uuid::new_v4();
        let failed = LifecycleEvent::Failed {
            entry_id: id,
            owner_id: "u1".to_string(),
            error: "backend error: boom".to_string(),
            attempts: 3,
        };
        assert_eq!(failed.entry_id(), id);
    }
}
