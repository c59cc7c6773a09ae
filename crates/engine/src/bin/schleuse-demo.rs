//! schleuse-demo — drives the queue engine against a simulated backend.
//!
//! Submits a small mixed-tier batch, tails the lifecycle event stream
//! until every entry is terminal, and prints the final statistics.
//! Config comes from the environment (`SCHLEUSE_*` keys, `.env` honored).

use std::sync::Arc;
use std::time::Duration;

use tracing::info;

use schleuse_core::{load_dotenv, EngineConfig, GenerationRequest, PriorityHint, Tier};
use schleuse_engine::{Engine, LifecycleEvent, SimulatedBackend};

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    load_dotenv();
    let config = EngineConfig::from_env();
    config.log_summary();

    // Every 4th backend call fails, so retries and backoff show up in the
    // event stream.
    let backend = Arc::new(SimulatedBackend::new(Duration::from_millis(400), 4));
    let engine = Engine::new(config, backend);
    let mut events = engine.subscribe();
    let handles = engine.start();

    let submissions = [
        ("alice", Tier::Premium, "note_summary", None),
        ("bob", Tier::Free, "task_suggest", None),
        ("carol", Tier::Paid, "draft_reply", None),
        ("dave", Tier::Free, "note_summary", Some(PriorityHint::Urgent)),
        ("erin", Tier::Paid, "ocr_caption", Some(PriorityHint::High)),
        ("frank", Tier::Free, "task_suggest", None),
    ];

    let mut pending = 0usize;
    for (owner, tier, kind, hint) in submissions {
        let mut request =
            GenerationRequest::new(owner, tier, kind, serde_json::json!({ "owner": owner }));
        if let Some(hint) = hint {
            request = request.with_priority_hint(hint);
        }
        match engine.submit(request) {
            Ok(admission) => {
                pending += 1;
                info!(
                    owner,
                    entry_id = %admission.entry_id,
                    lane = %admission.lane,
                    estimated_wait_ms = admission.estimated_wait_ms,
                    "submitted"
                );
            }
            Err(err) => info!(owner, error = %err, "submission rejected"),
        }
    }

    // Tail events until every submitted entry reaches a terminal state.
    while pending > 0 {
        match events.recv().await {
            Ok(LifecycleEvent::Completed { entry_id, elapsed_ms, .. }) => {
                info!(%entry_id, elapsed_ms, "terminal: completed");
                pending -= 1;
            }
            Ok(LifecycleEvent::Failed { entry_id, attempts, error, .. }) => {
                info!(%entry_id, attempts, %error, "terminal: failed");
                pending -= 1;
            }
            Ok(_) => {}
            Err(_) => break,
        }
    }

    let snapshot = engine.stats();
    info!(
        processed = snapshot.total_processed,
        failed = snapshot.total_failed,
        average_processing_ms = snapshot.average_processing_ms,
        "run finished"
    );

    engine.shutdown();
    let _ = handles.dispatcher.await;
    let _ = handles.cleanup.await;
}
