//! The backend seam: the injected work function the engine schedules.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;

/// Trait for generation backends — the engine wraps each call in the
/// entry's timeout and retries on failure.
///
/// The engine guarantees at most `retry_attempts` invocations per entry,
/// not exactly-once execution: under a timeout-triggered retry the
/// underlying side effect may run more than once, so implementations must
/// be safely abandonable or idempotent.
#[async_trait]
pub trait GenerationBackend: Send + Sync {
    /// Perform the generation work for one entry.
    ///
    /// `kind` is the entry's diagnostic tag; `payload` is passed through
    /// from the submitter unchanged.
    async fn generate(
        &self,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError>;
}

#[derive(Debug, thiserror::Error)]
pub enum BackendError {
    #[error("backend request failed: {0}")]
    Request(String),
    #[error("backend returned malformed output: {0}")]
    Malformed(String),
}

// ── Simulated backend ────────────────────────────────────────────────

/// Stand-in for a real generation provider: fixed latency, deterministic
/// failure cycle. Used by the demo binary and as a test double.
pub struct SimulatedBackend {
    latency: Duration,
    /// Every `failure_cycle`-th call fails (0 disables failures).
    failure_cycle: u64,
    calls: AtomicU64,
}

impl SimulatedBackend {
    pub fn new(latency: Duration, failure_cycle: u64) -> Self {
        Self {
            latency,
            failure_cycle,
            calls: AtomicU64::new(0),
        }
    }

    /// Backend that always succeeds after `latency`.
    pub fn reliable(latency: Duration) -> Self {
        Self::new(latency, 0)
    }

    pub fn call_count(&self) -> u64 {
        self.calls.load(Ordering::Relaxed)
    }
}

#[async_trait]
impl GenerationBackend for SimulatedBackend {
    async fn generate(
        &self,
        kind: &str,
        payload: &serde_json::Value,
    ) -> Result<serde_json::Value, BackendError> {
        let call = self.calls.fetch_add(1, Ordering::Relaxed) + 1;
        tokio::time::sleep(self.latency).await;

        if self.failure_cycle > 0 && call % self.failure_cycle == 0 {
            return Err(BackendError::Request(format!(
                "simulated provider failure on call {call}"
            )));
        }

        Ok(serde_json::json!({
            "kind": kind,
            "input": payload,
            "text": format!("generated output for {kind} (call {call})"),
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reliable_backend_echoes_kind_and_payload() {
        let backend = SimulatedBackend::reliable(Duration::from_millis(1));
        let payload = serde_json::json!({"note_id": 7});

        let result = backend.generate("note_summary", &payload).await.unwrap();
        assert_eq!(result["kind"], "note_summary");
        assert_eq!(result["input"], payload);
        assert_eq!(backend.call_count(), 1);
    }

    #[tokio::test]
    async fn failure_cycle_fails_every_nth_call() {
        let backend = SimulatedBackend::new(Duration::from_millis(1), 2);
        let payload = serde_json::json!({});

        assert!(backend.generate("t", &payload).await.is_ok());
        assert!(backend.generate("t", &payload).await.is_err());
        assert!(backend.generate("t", &payload).await.is_ok());
        assert!(backend.generate("t", &payload).await.is_err());
    }
}
