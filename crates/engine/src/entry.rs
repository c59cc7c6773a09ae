//! Queue entry types and lane resolution.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use schleuse_core::{GenerationRequest, PriorityHint, Tier};

/// One of the three FIFO priority classes holding queued entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Lane {
    High,
    Normal,
    Low,
}

impl fmt::Display for Lane {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Lane::High => write!(f, "high"),
            Lane::Normal => write!(f, "normal"),
            Lane::Low => write!(f, "low"),
        }
    }
}

/// Resolve the lane for a new entry from tier and optional hint.
///
/// Evaluated in order: premium tier or an `urgent` hint wins `high`;
/// paid tier or a `high` hint wins `normal`; everything else lands in
/// `low`. Total function, no ambiguity.
pub fn resolve_lane(tier: Tier, hint: Option<PriorityHint>) -> Lane {
    match (tier, hint) {
        (Tier::Premium, _) | (_, Some(PriorityHint::Urgent)) => Lane::High,
        (Tier::Paid, _) | (_, Some(PriorityHint::High)) => Lane::Normal,
        _ => Lane::Low,
    }
}

/// Lifecycle state of a queue entry.
///
/// `Queued` and `Processing` are non-terminal; `Completed` and `Failed`
/// are terminal and never regress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntryStatus {
    Queued,
    Processing,
    Completed,
    Failed,
}

impl EntryStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, EntryStatus::Completed | EntryStatus::Failed)
    }
}

/// The unit of work tracked by the engine.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueEntry {
    pub id: Uuid,
    pub owner_id: String,
    pub tier: Tier,
    pub priority_hint: Option<PriorityHint>,
    /// Opaque work-type tag, used for diagnostics and stats only.
    pub kind: String,
    /// Opaque payload handed to the backend unchanged.
    pub payload: serde_json::Value,
    /// Maximum duration a single execution attempt may take.
    pub timeout: Duration,
    /// Lane resolved once at admission; retries re-enter the same lane.
    pub lane: Lane,
    pub created_at: DateTime<Utc>,
    pub started_at: Option<DateTime<Utc>>,
    /// Set at the terminal transition (completed or failed).
    pub finished_at: Option<DateTime<Utc>>,
    /// Execution attempts so far. Starts at 0, only ever increases.
    pub attempts: u32,
    pub status: EntryStatus,
    pub last_error: Option<String>,
    /// Present only once `status == Completed`.
    pub result: Option<serde_json::Value>,
}

impl QueueEntry {
    /// Build a freshly admitted entry from a request.
    ///
    /// `default_timeout` applies when the request carries none.
    pub fn admit(request: GenerationRequest, default_timeout: Duration) -> Self {
        let lane = resolve_lane(request.tier, request.priority_hint);
        Self {
            id: Uuid::new_v4(),
            owner_id: request.owner_id,
            tier: request.tier,
            priority_hint: request.priority_hint,
            kind: request.kind,
            payload: request.payload,
            timeout: request.timeout.unwrap_or(default_timeout),
            lane,
            created_at: Utc::now(),
            started_at: None,
            finished_at: None,
            attempts: 0,
            status: EntryStatus::Queued,
            last_error: None,
            result: None,
        }
    }

    /// Wall-clock processing duration, once both timestamps are set.
    pub fn elapsed_ms(&self) -> Option<u64> {
        match (self.started_at, self.finished_at) {
            (Some(start), Some(end)) => {
                Some(end.signed_duration_since(start).num_milliseconds().max(0) as u64)
            }
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lane_resolution_matrix() {
        use PriorityHint::*;
        // Premium always wins high, regardless of hint.
        assert_eq!(resolve_lane(Tier::Premium, None), Lane::High);
        assert_eq!(resolve_lane(Tier::Premium, Some(High)), Lane::High);
        // Urgent hint promotes any tier to high.
        assert_eq!(resolve_lane(Tier::Free, Some(Urgent)), Lane::High);
        assert_eq!(resolve_lane(Tier::Paid, Some(Urgent)), Lane::High);
        // Paid tier or high hint lands in normal.
        assert_eq!(resolve_lane(Tier::Paid, None), Lane::Normal);
        assert_eq!(resolve_lane(Tier::Free, Some(High)), Lane::Normal);
        // Default is low.
        assert_eq!(resolve_lane(Tier::Free, None), Lane::Low);
    }

    #[test]
    fn admitted_entry_starts_queued_with_zero_attempts() {
        let req = GenerationRequest::new("u1", Tier::Free, "note_summary", serde_json::json!({}));
        let entry = QueueEntry::admit(req, Duration::from_secs(60));

        assert_eq!(entry.status, EntryStatus::Queued);
        assert_eq!(entry.attempts, 0);
        assert_eq!(entry.lane, Lane::Low);
        assert_eq!(entry.timeout, Duration::from_secs(60));
        assert!(entry.started_at.is_none());
        assert!(entry.result.is_none());
        assert!(entry.last_error.is_none());
    }

    #[test]
    fn caller_timeout_overrides_default() {
        let req = GenerationRequest::new("u1", Tier::Premium, "draft", serde_json::json!({}))
            .with_timeout(Duration::from_secs(5));
        let entry = QueueEntry::admit(req, Duration::from_secs(60));
        assert_eq!(entry.timeout, Duration::from_secs(5));
    }

    #[test]
    fn terminal_statuses() {
        assert!(!EntryStatus::Queued.is_terminal());
        assert!(!EntryStatus::Processing.is_terminal());
        assert!(EntryStatus::Completed.is_terminal());
        assert!(EntryStatus::Failed.is_terminal());
    }

    #[test]
    fn elapsed_requires_both_timestamps() {
        let req = GenerationRequest::new("u1", Tier::Free, "draft", serde_json::json!({}));
        let mut entry = QueueEntry::admit(req, Duration::from_secs(60));
        assert_eq!(entry.elapsed_ms(), None);

        let start = Utc::now();
        entry.started_at = Some(start);
        entry.finished_at = Some(start + chrono::Duration::milliseconds(150));
        assert_eq!(entry.elapsed_ms(), Some(150));
    }
}
