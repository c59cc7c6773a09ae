//! Request vocabulary shared between the API layer and the queue engine.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Service tier of the submitting principal.
///
/// Resolved by the API layer before submission; the engine only uses it
/// for lane placement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Tier {
    Free,
    Paid,
    Premium,
}

/// Optional explicit priority override supplied by the caller.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriorityHint {
    Urgent,
    High,
}

/// A unit of generation work presented to the engine for admission.
///
/// `kind` and `payload` are opaque to the engine: `kind` feeds diagnostics
/// and stats, `payload` is handed to the backend unchanged.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub owner_id: String,
    pub tier: Tier,
    pub kind: String,
    pub payload: serde_json::Value,
    #[serde(default)]
    pub priority_hint: Option<PriorityHint>,
    /// Per-entry execution timeout; engine default applies when `None`.
    #[serde(default)]
    pub timeout: Option<Duration>,
}

impl GenerationRequest {
    pub fn new(
        owner_id: impl Into<String>,
        tier: Tier,
        kind: impl Into<String>,
        payload: serde_json::Value,
    ) -> Self {
        Self {
            owner_id: owner_id.into(),
            tier,
            kind: kind.into(),
            payload,
            priority_hint: None,
            timeout: None,
        }
    }

    pub fn with_priority_hint(mut self, hint: PriorityHint) -> Self {
        self.priority_hint = Some(hint);
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn builder_sets_optional_fields() {
        let req = GenerationRequest::new(
            "user-1",
            Tier::Paid,
            "note_summary",
            serde_json::json!({"note_id": 42}),
        )
        .with_priority_hint(PriorityHint::Urgent)
        .with_timeout(Duration::from_secs(5));

        assert_eq!(req.owner_id, "user-1");
        assert_eq!(req.tier, Tier::Paid);
        assert_eq!(req.priority_hint, Some(PriorityHint::Urgent));
        assert_eq!(req.timeout, Some(Duration::from_secs(5)));
    }

    #[test]
    fn tier_serde_uses_lowercase() {
        assert_eq!(serde_json::to_string(&Tier::Premium).unwrap(), r#""premium""#);
        let tier: Tier = serde_json::from_str(r#""free""#).unwrap();
        assert_eq!(tier, Tier::Free);
    }

    #[test]
    fn request_deserializes_without_optional_fields() {
        let req: GenerationRequest = serde_json::from_str(
            r#"{"owner_id":"u1","tier":"free","kind":"task_suggest","payload":{}}"#,
        )
        .unwrap();
        assert!(req.priority_hint.is_none());
        assert!(req.timeout.is_none());
    }
}
