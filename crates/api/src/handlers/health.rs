//! Liveness and readiness probes.

use axum::extract::State;
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;

use crate::error::AppResult;
use crate::state::AppState;

/// GET /health
///
/// Confirms the process is serving and the database answers a trivial
/// round trip.
pub async fn health(State(state): State<AppState>) -> AppResult<impl IntoResponse> {
    atelier_db::health_check(&state.pool).await?;
    Ok(Json(json!({ "status": "ok" })))
}
