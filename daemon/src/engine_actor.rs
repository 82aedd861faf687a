//! Engine actor / service host (C9).
//!
//! Owns the single-shard [`AttachEngine`] and runs it as one task, draining
//! a control channel alongside the engine's own timer events rather than
//! splitting them across tasks. Two event sources feed the same engine:
//! external Attach events from whatever is in front of this process
//! (a test harness, a future AS-layer bridge) and the engine's own T3450
//! expiries. Keeping them on one task is what makes the engine's per-UE
//! serialization guarantee (§5) hold in practice.

use std::sync::Arc;

use tokio::sync::mpsc::{Receiver, Sender};
use tokio::sync::RwLock;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;

use emm_attach::attach::{AttachEngine, AttachRequest, T3450Expiry};
use emm_attach::context::UeId;
use log::{error, info};

use crate::server::StatusSnapshot;

/// Inbound events the host accepts on behalf of the engine. The message
/// codec and AS/transport layers that would produce these are out of
/// scope; whatever sits in front of this daemon constructs them directly.
pub enum EngineCommand {
    AttachRequest(AttachRequest),
    AttachComplete {
        ue_id: UeId,
        esm_container: Vec<u8>,
    },
}

pub fn run_engine_actor(
    task_tracker: &TaskTracker,
    mut engine: AttachEngine,
    mut commands: Receiver<EngineCommand>,
    mut timer_events: Receiver<T3450Expiry>,
    status: Arc<RwLock<StatusSnapshot>>,
    shutdown_token: CancellationToken,
) {
    task_tracker.spawn(async move {
        info!("engine actor started");
        loop {
            tokio::select! {
                _ = shutdown_token.cancelled() => {
                    info!("engine actor shutting down");
                    break;
                }
                cmd = commands.recv() => {
                    match cmd {
                        Some(EngineCommand::AttachRequest(req)) => {
                            if let Err(err) = engine.on_attach_request(req).await {
                                error!("attach request handling failed: {err}");
                            }
                        }
                        Some(EngineCommand::AttachComplete { ue_id, esm_container }) => {
                            if let Err(err) = engine.on_attach_complete(ue_id, esm_container).await {
                                error!("attach complete handling failed: {err}");
                            }
                        }
                        None => {
                            info!("command channel closed, engine actor exiting");
                            break;
                        }
                    }
                }
                expiry = timer_events.recv() => {
                    match expiry {
                        Some(T3450Expiry(ue_id)) => {
                            if let Err(err) = engine.on_t3450_expired(ue_id).await {
                                error!("t3450 expiry handling failed for ue_id {ue_id}: {err}");
                            }
                        }
                        None => {
                            error!("timer channel closed unexpectedly");
                            break;
                        }
                    }
                }
            }
            status.write().await.active_contexts = engine.context_count();
        }
    });
}

/// Convenience handle the daemon hands out to whatever submits Attach
/// events (tests, a future AS-layer bridge).
pub type EngineHandle = Sender<EngineCommand>;
