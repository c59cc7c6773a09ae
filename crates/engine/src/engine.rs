//! The queue engine: admission, dispatch, execution, retry, eviction.
//!
//! All mutable state (lanes, in-flight set, retry-pending map, terminal
//! stores, statistics) lives behind a single mutex inside [`Engine`]; the
//! lock is never held across an await point. One long-lived dispatcher
//! task fills free execution slots in strict lane priority, each attempt
//! runs as its own tokio task under the entry's timeout, and a cleanup
//! task bounds the terminal stores to a retention window.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use chrono::Utc;
use serde::Serialize;
use tokio::sync::{broadcast, Notify};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use schleuse_core::{EngineConfig, EngineConfigUpdate, GenerationRequest};

use crate::backend::GenerationBackend;
use crate::entry::{EntryStatus, Lane, QueueEntry};
use crate::error::{AttemptError, EngineError};
use crate::events::LifecycleEvent;
use crate::lanes::LaneSet;
use crate::stats::{EngineStats, StatsSnapshot};
use crate::status::StatusSnapshot;

/// Dispatcher poll interval. The `Notify` wake-up path makes dispatch
/// near-immediate; the tick is a fallback.
const DISPATCH_TICK: Duration = Duration::from_millis(100);

/// Lifecycle event fan-out buffer per subscriber.
const EVENT_CHANNEL_CAPACITY: usize = 256;

// ── Admission result ─────────────────────────────────────────────────

/// Returned by [`Engine::submit`] on successful admission.
#[derive(Debug, Clone, Serialize)]
pub struct Admission {
    pub entry_id: Uuid,
    pub lane: Lane,
    /// 1-based cross-lane serve position at admission time.
    pub position: usize,
    /// Advisory only, never a guarantee.
    pub estimated_wait_ms: u64,
}

// ── Shared state ─────────────────────────────────────────────────────

/// Every entry lives in exactly one of: a lane, `in_flight`,
/// `retry_pending`, `completed`, or `failed`.
struct EngineState {
    config: EngineConfig,
    lanes: LaneSet,
    in_flight: HashMap<Uuid, QueueEntry>,
    /// Entries waiting out their backoff delay before lane re-insertion.
    /// Their `status` field stays `Processing` until the moment of
    /// re-insertion; status queries report them as queued at the front of
    /// their lane, where they are about to re-enter.
    retry_pending: HashMap<Uuid, QueueEntry>,
    completed: HashMap<Uuid, QueueEntry>,
    failed: HashMap<Uuid, QueueEntry>,
    stats: EngineStats,
}

struct Inner {
    state: Mutex<EngineState>,
    backend: Arc<dyn GenerationBackend>,
    events: broadcast::Sender<LifecycleEvent>,
    /// Wakes the dispatcher on submission, slot release, retry
    /// re-insertion, and config change.
    wake: Notify,
    /// Interrupts the cleanup task's sleep when `cleanup_interval` changes.
    cleanup_wake: Notify,
    stop: Notify,
    shutdown: AtomicBool,
}

/// Handles for the engine's background tasks, returned by [`Engine::start`].
pub struct EngineHandles {
    pub dispatcher: JoinHandle<()>,
    pub cleanup: JoinHandle<()>,
}

// ── Engine ───────────────────────────────────────────────────────────

/// Admission-control and request-scheduling engine. Cheap to clone; all
/// clones share the same state.
#[derive(Clone)]
pub struct Engine {
    inner: Arc<Inner>,
}

impl Engine {
    pub fn new(config: EngineConfig, backend: Arc<dyn GenerationBackend>) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            inner: Arc::new(Inner {
                state: Mutex::new(EngineState {
                    config,
                    lanes: LaneSet::new(),
                    in_flight: HashMap::new(),
                    retry_pending: HashMap::new(),
                    completed: HashMap::new(),
                    failed: HashMap::new(),
                    stats: EngineStats::new(),
                }),
                backend,
                events,
                wake: Notify::new(),
                cleanup_wake: Notify::new(),
                stop: Notify::new(),
                shutdown: AtomicBool::new(false),
            }),
        }
    }

    /// Spawn the dispatcher and cleanup tasks. Call once.
    pub fn start(&self) -> EngineHandles {
        info!("engine starting");
        let dispatcher = tokio::spawn(Self::dispatch_loop(Arc::clone(&self.inner)));
        let cleanup = tokio::spawn(Self::cleanup_loop(Arc::clone(&self.inner)));
        EngineHandles { dispatcher, cleanup }
    }

    /// Signal background tasks to exit. In-flight attempts run to
    /// completion; queued entries are lost with the process (state is
    /// in-memory by design).
    pub fn shutdown(&self) {
        info!("engine shutdown requested");
        self.inner.shutdown.store(true, Ordering::Relaxed);
        self.inner.stop.notify_waiters();
        self.inner.wake.notify_one();
    }

    /// Subscribe to lifecycle events. Events are best-effort fan-out:
    /// a lagging subscriber misses events, the engine never blocks.
    pub fn subscribe(&self) -> broadcast::Receiver<LifecycleEvent> {
        self.inner.events.subscribe()
    }

    // ── Admission ────────────────────────────────────────────────────

    /// Admit a request, or reject it when the global capacity ceiling is
    /// reached. This is the sole backpressure mechanism: once admitted,
    /// an entry always reaches a terminal state and is never dropped.
    pub fn submit(&self, request: GenerationRequest) -> Result<Admission, EngineError> {
        let admission = {
            let mut state = self.inner.state.lock().unwrap();
            let tracked =
                state.lanes.len() + state.retry_pending.len() + state.in_flight.len();
            if tracked >= state.config.max_queue_size {
                return Err(EngineError::CapacityExceeded {
                    tracked,
                    limit: state.config.max_queue_size,
                });
            }

            let entry = QueueEntry::admit(request, state.config.request_timeout);
            let entry_id = entry.id;
            let lane = entry.lane;
            let owner_id = entry.owner_id.clone();
            state.lanes.push_back(entry);

            let position = state
                .lanes
                .serve_position(entry_id)
                .unwrap_or_else(|| state.lanes.len());
            let wait = state.stats.estimate_wait(position, state.config.max_concurrent);
            let estimated_wait_ms = wait.as_millis() as u64;

            // Emitted under the lock: a dispatcher woken by an earlier
            // submission must not broadcast `started` for this entry
            // before its `queued` event is out.
            let _ = self.inner.events.send(LifecycleEvent::Queued {
                entry_id,
                owner_id,
                lane,
                position,
                estimated_wait_ms,
            });

            Admission {
                entry_id,
                lane,
                position,
                estimated_wait_ms,
            }
        };

        info!(
            entry_id = %admission.entry_id,
            lane = %admission.lane,
            position = admission.position,
            "entry admitted"
        );
        self.inner.wake.notify_one();
        Ok(admission)
    }

    // ── Status query ─────────────────────────────────────────────────

    /// Snapshot the current state of one entry.
    ///
    /// Lookup order: in-flight, completed, failed, retry-pending, then a
    /// lane scan (lanes are bounded by the capacity ceiling). An entry
    /// waiting out its backoff reports as queued at the front of its lane.
    pub fn status(&self, entry_id: Uuid) -> StatusSnapshot {
        let state = self.inner.state.lock().unwrap();

        if let Some(entry) = state.in_flight.get(&entry_id) {
            let started_at = entry.started_at.unwrap_or(entry.created_at);
            let avg = chrono::Duration::from_std(state.stats.average_processing())
                .unwrap_or_else(|_| chrono::Duration::seconds(3));
            return StatusSnapshot::Processing {
                started_at,
                estimated_completion: started_at + avg,
            };
        }

        if let Some(entry) = state.completed.get(&entry_id) {
            return StatusSnapshot::Completed {
                result: entry.result.clone().unwrap_or(serde_json::Value::Null),
                elapsed_ms: entry.elapsed_ms().unwrap_or(0),
            };
        }

        if let Some(entry) = state.failed.get(&entry_id) {
            return StatusSnapshot::Failed {
                error: entry.last_error.clone().unwrap_or_default(),
                attempts: entry.attempts,
            };
        }

        if let Some(entry) = state.retry_pending.get(&entry_id) {
            let wait = state.stats.estimate_wait(1, state.config.max_concurrent);
            return StatusSnapshot::Queued {
                lane: entry.lane,
                position: 1,
                estimated_wait_ms: wait.as_millis() as u64,
            };
        }

        if let Some(position) = state.lanes.serve_position(entry_id) {
            if let Some(entry) = state.lanes.find(entry_id) {
                let wait = state.stats.estimate_wait(position, state.config.max_concurrent);
                return StatusSnapshot::Queued {
                    lane: entry.lane,
                    position,
                    estimated_wait_ms: wait.as_millis() as u64,
                };
            }
        }

        StatusSnapshot::NotFound
    }

    /// Point-in-time statistics for the API layer.
    pub fn stats(&self) -> StatsSnapshot {
        let state = self.inner.state.lock().unwrap();
        state.stats.snapshot(
            state.lanes.len() + state.retry_pending.len(),
            state.in_flight.len(),
            state.config.max_concurrent,
        )
    }

    /// Apply a partial config update at runtime and wake the background
    /// tasks so a raised `max_concurrent` or a shortened
    /// `cleanup_interval` takes effect immediately.
    pub fn update_config(&self, update: EngineConfigUpdate) {
        if update.is_empty() {
            return;
        }
        {
            let mut state = self.inner.state.lock().unwrap();
            update.apply(&mut state.config);
            info!(
                max_concurrent = state.config.max_concurrent,
                max_queue_size = state.config.max_queue_size,
                "engine config updated"
            );
        }
        self.inner.wake.notify_one();
        self.inner.cleanup_wake.notify_one();
    }

    // ── Dispatcher ───────────────────────────────────────────────────

    async fn dispatch_loop(inner: Arc<Inner>) {
        info!("dispatcher started");
        let mut ticker = tokio::time::interval(DISPATCH_TICK);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = ticker.tick() => {}
                _ = inner.wake.notified() => {}
                _ = inner.stop.notified() => break,
            }
            if inner.shutdown.load(Ordering::Relaxed) {
                break;
            }
            Self::fill_slots(&inner);
        }
        info!("dispatcher stopped");
    }

    /// Move entries from the lanes into execution until all slots are
    /// taken or the lanes are empty. Never blocks on the attempts it
    /// spawns.
    fn fill_slots(inner: &Arc<Inner>) {
        loop {
            let dispatched = {
                let mut state = inner.state.lock().unwrap();
                if state.in_flight.len() >= state.config.max_concurrent {
                    None
                } else if let Some(mut entry) = state.lanes.next() {
                    entry.status = EntryStatus::Processing;
                    entry.started_at = Some(Utc::now());
                    let event = LifecycleEvent::Started {
                        entry_id: entry.id,
                        owner_id: entry.owner_id.clone(),
                        attempt: entry.attempts + 1,
                    };
                    let entry_id = entry.id;
                    state.in_flight.insert(entry_id, entry);
                    Some((entry_id, event))
                } else {
                    None
                }
            };

            match dispatched {
                Some((entry_id, event)) => {
                    debug!(entry_id = %entry_id, "dispatching entry");
                    let _ = inner.events.send(event);
                    tokio::spawn(Self::run_attempt(Arc::clone(inner), entry_id));
                }
                None => break,
            }
        }
    }

    // ── Execution adapter ────────────────────────────────────────────

    /// Run one execution attempt under the entry's timeout, then route
    /// the outcome to the success or retry path and free the slot.
    async fn run_attempt(inner: Arc<Inner>, entry_id: Uuid) {
        let (kind, payload, timeout) = {
            let state = inner.state.lock().unwrap();
            match state.in_flight.get(&entry_id) {
                Some(entry) => (entry.kind.clone(), entry.payload.clone(), entry.timeout),
                None => return,
            }
        };

        let started = Instant::now();
        let outcome =
            match tokio::time::timeout(timeout, inner.backend.generate(&kind, &payload)).await {
                Ok(Ok(value)) => Ok(value),
                Ok(Err(err)) => Err(AttemptError::Backend(err.to_string())),
                Err(_) => Err(AttemptError::Timeout(timeout)),
            };

        match outcome {
            Ok(value) => Self::finish_success(&inner, entry_id, value, started.elapsed()),
            Err(err) => Self::finish_failure(&inner, entry_id, err),
        }
        inner.wake.notify_one();
    }

    fn finish_success(
        inner: &Arc<Inner>,
        entry_id: Uuid,
        value: serde_json::Value,
        elapsed: Duration,
    ) {
        let event;
        {
            let mut state = inner.state.lock().unwrap();
            let mut entry = match state.in_flight.remove(&entry_id) {
                Some(entry) => entry,
                None => return,
            };
            entry.status = EntryStatus::Completed;
            entry.finished_at = Some(Utc::now());
            entry.result = Some(value);
            entry.last_error = None;
            state.stats.record_success(elapsed);
            event = LifecycleEvent::Completed {
                entry_id,
                owner_id: entry.owner_id.clone(),
                elapsed_ms: elapsed.as_millis() as u64,
            };
            state.completed.insert(entry_id, entry);
        }
        info!(entry_id = %entry_id, elapsed_ms = elapsed.as_millis() as u64, "entry completed");
        let _ = inner.events.send(event);
    }

    // ── Retry decision ───────────────────────────────────────────────

    fn finish_failure(inner: &Arc<Inner>, entry_id: Uuid, err: AttemptError) {
        // (event to emit, retry delay if re-queueing)
        let (event, retry_after): (LifecycleEvent, Option<Duration>);
        {
            let mut state = inner.state.lock().unwrap();
            let mut entry = match state.in_flight.remove(&entry_id) {
                Some(entry) => entry,
                None => return,
            };
            entry.attempts += 1;
            entry.last_error = Some(err.to_string());

            if entry.attempts < state.config.retry_attempts {
                // Exponential backoff: base * 2^(attempt-1).
                let delay =
                    state.config.retry_delay * 2u32.saturating_pow(entry.attempts - 1);
                event = LifecycleEvent::Retrying {
                    entry_id,
                    owner_id: entry.owner_id.clone(),
                    attempt: entry.attempts,
                    delay_ms: delay.as_millis() as u64,
                    error: err.to_string(),
                };
                retry_after = Some(delay);
                state.retry_pending.insert(entry_id, entry);
            } else {
                entry.status = EntryStatus::Failed;
                entry.finished_at = Some(Utc::now());
                state.stats.record_failure();
                event = LifecycleEvent::Failed {
                    entry_id,
                    owner_id: entry.owner_id.clone(),
                    error: err.to_string(),
                    attempts: entry.attempts,
                };
                retry_after = None;
                state.failed.insert(entry_id, entry);
            }
        }

        match retry_after {
            Some(delay) => {
                warn!(entry_id = %entry_id, error = %err, delay_ms = delay.as_millis() as u64, "attempt failed, scheduling retry");
                let _ = inner.events.send(event);
                tokio::spawn(Self::requeue_after(Arc::clone(inner), entry_id, delay));
            }
            None => {
                warn!(entry_id = %entry_id, error = %err, "retries exhausted, entry failed");
                let _ = inner.events.send(event);
            }
        }
    }

    /// After the backoff delay, move the entry back to the front of its
    /// lane (status flips to queued at this moment, not before).
    async fn requeue_after(inner: Arc<Inner>, entry_id: Uuid, delay: Duration) {
        tokio::time::sleep(delay).await;
        {
            let mut state = inner.state.lock().unwrap();
            if let Some(mut entry) = state.retry_pending.remove(&entry_id) {
                entry.status = EntryStatus::Queued;
                debug!(entry_id = %entry_id, lane = %entry.lane, attempt = entry.attempts, "re-queued for retry");
                state.lanes.push_front(entry);
            }
        }
        inner.wake.notify_one();
    }

    // ── Terminal-store eviction ──────────────────────────────────────

    async fn cleanup_loop(inner: Arc<Inner>) {
        info!("cleanup task started");
        loop {
            if inner.shutdown.load(Ordering::Relaxed) {
                break;
            }
            let interval = {
                let state = inner.state.lock().unwrap();
                state.config.cleanup_interval
            };
            tokio::select! {
                _ = tokio::time::sleep(interval) => {}
                // Re-read the interval instead of sleeping out the old one.
                _ = inner.cleanup_wake.notified() => continue,
                _ = inner.stop.notified() => break,
            }
            if inner.shutdown.load(Ordering::Relaxed) {
                break;
            }
            Self::sweep_stores(&inner);
        }
        info!("cleanup task stopped");
    }

    /// Evict terminal entries older than the retention window (twice the
    /// cleanup interval) so accumulated history stays bounded.
    fn sweep_stores(inner: &Arc<Inner>) {
        let mut state = inner.state.lock().unwrap();
        let retention = state.config.cleanup_interval * 2;
        let cutoff = Utc::now()
            - chrono::Duration::from_std(retention)
                .unwrap_or_else(|_| chrono::Duration::seconds(600));

        let before = state.completed.len() + state.failed.len();
        state
            .completed
            .retain(|_, entry| entry.finished_at.map_or(true, |t| t > cutoff));
        state
            .failed
            .retain(|_, entry| entry.finished_at.map_or(true, |t| t > cutoff));
        let evicted = before - (state.completed.len() + state.failed.len());

        if evicted > 0 {
            debug!(evicted, "evicted terminal entries past retention window");
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────────
