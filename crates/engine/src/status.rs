//! Status snapshots returned by [`Engine::status`](crate::engine::Engine::status).

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::entry::Lane;

/// Point-in-time view of one entry, shaped for the polling API.
///
/// `NotFound` is a normal outcome (unknown id, or evicted after the
/// retention window), not a fault.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum StatusSnapshot {
    Queued {
        lane: Lane,
        position: usize,
        estimated_wait_ms: u64,
    },
    Processing {
        started_at: DateTime<Utc>,
        estimated_completion: DateTime<Utc>,
    },
    Completed {
        result: serde_json::Value,
        elapsed_ms: u64,
    },
    Failed {
        error: String,
        attempts: u32,
    },
    NotFound,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn snapshot_serializes_with_status_tag() {
        let snap = StatusSnapshot::Queued {
            lane: Lane::Normal,
            position: 3,
            estimated_wait_ms: 9000,
        };
        let json = serde_json::to_value(&snap).unwrap();
        assert_eq!(json["status"], "queued");
        assert_eq!(json["lane"], "normal");
        assert_eq!(json["position"], 3);

        let json = serde_json::to_value(StatusSnapshot::NotFound).unwrap();
        assert_eq!(json["status"], "not_found");
    }
}
