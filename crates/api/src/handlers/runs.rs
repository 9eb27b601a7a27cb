//! Handlers for starting, inspecting, approving and cancelling runs.

use std::sync::Arc;

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use serde::{Deserialize, Serialize};

use atelier_core::error::CoreError;
use atelier_core::types::DbId;
use atelier_db::models::node_result::NodeResult;
use atelier_db::models::run::Run;
use atelier_db::repositories::{NodeResultRepo, RunRepo};
use atelier_engine::supervisor;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workflows/{id}/runs
///
/// Create a run for an active workflow and hand it to the runner on a
/// supervised background task. Returns 202: the run executes
/// asynchronously and is polled via `GET /runs/{id}`.
pub async fn start_run(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = state.runner.start_run(workflow_id).await?;
    supervisor::spawn_run(Arc::clone(&state.runner), run.id);

    tracing::info!(workflow_id, run_id = run.id, "Run started via API");
    Ok((StatusCode::ACCEPTED, Json(DataResponse { data: run })))
}

/// A run together with its per-node execution records.
#[derive(Debug, Serialize)]
pub struct RunDetail {
    #[serde(flatten)]
    pub run: Run,
    pub node_results: Vec<NodeResult>,
}

/// GET /api/v1/runs/{id}
pub async fn get_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let run = RunRepo::find_by_id(&state.pool, run_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Run",
            id: run_id,
        }))?;
    let node_results = NodeResultRepo::list_for_run(&state.pool, run_id).await?;

    Ok(Json(DataResponse {
        data: RunDetail { run, node_results },
    }))
}

/// Request body for `POST /api/v1/runs/{id}/approve`.
#[derive(Debug, Deserialize)]
pub struct ApproveRequest {
    /// The gate node the run is paused on.
    pub node_id: String,
    /// Optional index narrowing a batch output to one item.
    pub selection: Option<usize>,
}

/// POST /api/v1/runs/{id}/approve
///
/// Valid only while the run is `waiting_for_review` and `node_id` is the
/// paused gate. Completes that node result (applying the selection) and
/// resumes the run in the background.
pub async fn approve_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
    Json(input): Json<ApproveRequest>,
) -> AppResult<impl IntoResponse> {
    Arc::clone(&state.runner)
        .approve_and_resume(run_id, &input.node_id, input.selection)
        .await?;
    Ok(StatusCode::ACCEPTED)
}

/// POST /api/v1/runs/{id}/cancel
///
/// Marks the run cancelled and skips all open node results. Cooperative:
/// an in-flight node call is not force-aborted, but its result cannot
/// resurrect the run.
pub async fn cancel_run(
    State(state): State<AppState>,
    Path(run_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    state.runner.cancel(run_id).await?;
    Ok(StatusCode::NO_CONTENT)
}
