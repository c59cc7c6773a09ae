use std::time::Duration;

use thiserror::Error;

/// Errors surfaced synchronously to submitters.
///
/// Execution-time failures never reach the submitter; they are handled by
/// the retry decision and show up only in the entry's terminal status.
#[derive(Debug, Error)]
pub enum EngineError {
    #[error("queue capacity exceeded: {tracked} entries tracked, limit {limit}")]
    CapacityExceeded { tracked: usize, limit: usize },
}

/// Outcome of a single failed execution attempt.
#[derive(Debug, Clone, Error)]
pub enum AttemptError {
    #[error("attempt timed out after {0:?}")]
    Timeout(Duration),

    #[error("backend error: {0}")]
    Backend(String),
}
