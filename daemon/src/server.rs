//! Minimal operational status surface (§4.7): a single endpoint exposing
//! the engine's live context count and build metadata, grounded on the
//! teacher's `ServerState`/handler pattern trimmed to what §4.7 actually
//! asks for (process-level visibility, not a full control-plane API).

use std::sync::Arc;

use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Serialize;
use tokio::sync::RwLock;

use emm_attach::util::EngineMetadata;

/// Kept up to date by the engine actor after each processed event.
#[derive(Debug, Clone, Default)]
pub struct StatusSnapshot {
    pub active_contexts: usize,
}

pub struct ServerState {
    pub status: Arc<RwLock<StatusSnapshot>>,
    pub metadata: EngineMetadata,
}

#[derive(Serialize)]
pub struct StatusResponse {
    pub name: String,
    pub version: String,
    pub os: String,
    pub arch: String,
    pub active_contexts: usize,
}

pub async fn get_status(
    State(state): State<Arc<ServerState>>,
) -> Result<Json<StatusResponse>, (StatusCode, String)> {
    let snapshot = state.status.read().await;
    Ok(Json(StatusResponse {
        name: state.metadata.name.clone(),
        version: state.metadata.version.clone(),
        os: state.metadata.os.clone(),
        arch: state.metadata.arch.clone(),
        active_contexts: snapshot.active_contexts,
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn status_reports_metadata_and_count() {
        let state = Arc::new(ServerState {
            status: Arc::new(RwLock::new(StatusSnapshot { active_contexts: 3 })),
            metadata: EngineMetadata::default(),
        });

        let response = get_status(State(state)).await.unwrap();
        assert_eq!(response.0.active_contexts, 3);
        assert!(!response.0.name.is_empty());
    }
}
