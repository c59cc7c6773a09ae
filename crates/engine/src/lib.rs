//! schleuse-engine — admission control and request scheduling for a
//! rate-limited generation backend.
//!
//! The [`Engine`] owns three priority lanes, a bounded in-flight set, and
//! completed/failed stores. Submissions pass a single admission-time
//! capacity check, a dispatcher task fills free execution slots in strict
//! lane priority, and failed attempts are retried with exponential backoff
//! until exhaustion. All state transitions are broadcast as
//! [`LifecycleEvent`]s for the surrounding API layer to correlate.
//!
//! There is no cancellation API for queued or in-flight entries; callers
//! can only observe terminal status. Adding one is a possible future
//! extension.

pub mod backend;
pub mod engine;
pub mod entry;
pub mod error;
pub mod events;
pub mod lanes;
pub mod stats;
pub mod status;

pub use backend::{BackendError, GenerationBackend, SimulatedBackend};
pub use engine::{Admission, Engine, EngineHandles};
pub use entry::{resolve_lane, EntryStatus, Lane, QueueEntry};
pub use error::{AttemptError, EngineError};
pub use events::LifecycleEvent;
pub use lanes::LaneSet;
pub use stats::{EngineStats, StatsSnapshot};
pub use status::StatusSnapshot;
