use axum::{
    extract::{Path, State},
    Json,
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::{error::ApiResult, state::AppState};

#[derive(Debug, Serialize, Deserialize)]
pub struct ToggleMemoryResponse {
    pub thread_id: String,
    pub memory_enabled: bool,
}

/// Toggle rolling-summary memory for a thread
///
/// Creates the thread's entry on first toggle and reports the new state.
pub async fn toggle_memory(
    State(state): State<Arc<AppState>>,
    Path(thread_id): Path<String>,
) -> ApiResult<Json<ToggleMemoryResponse>> {
    let memory_enabled = state.store().toggle_memory(&thread_id).await;

    tracing::info!(thread_id, memory_enabled, "memory toggled");

    Ok(Json(ToggleMemoryResponse {
        thread_id,
        memory_enabled,
    }))
}
