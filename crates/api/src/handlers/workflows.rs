//! Handlers for the `/workflows` resource.
//!
//! The graph endpoint replaces nodes and edges atomically as a whole;
//! partial graph patches do not exist. All structural validation (node
//! configs, port compatibility, acyclicity) happens here at save time,
//! and the runner re-checks acyclicity defensively at execution time.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;

use atelier_core::error::CoreError;
use atelier_core::graph;
use atelier_core::types::DbId;
use atelier_db::models::status::WorkflowStatus;
use atelier_db::models::workflow::{CreateWorkflow, ReplaceGraph};
use atelier_db::repositories::WorkflowRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// POST /api/v1/workflows
///
/// Create an empty workflow shell in `draft` status.
pub async fn create_workflow(
    State(state): State<AppState>,
    Json(input): Json<CreateWorkflow>,
) -> AppResult<impl IntoResponse> {
    if input.name.trim().is_empty() {
        return Err(AppError::BadRequest("Workflow name must not be empty".into()));
    }

    let workflow = WorkflowRepo::create(&state.pool, &input).await?;
    tracing::info!(workflow_id = workflow.id, "Workflow created");
    Ok((StatusCode::CREATED, Json(DataResponse { data: workflow })))
}

/// GET /api/v1/workflows/{id}
pub async fn get_workflow(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let workflow = WorkflowRepo::find_by_id(&state.pool, workflow_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id: workflow_id,
        }))?;
    Ok(Json(DataResponse { data: workflow }))
}

/// PUT /api/v1/workflows/{id}/graph
///
/// Atomic full-graph swap. Rejects invalid configs, incompatible ports,
/// dangling edges and cycles before anything is written.
pub async fn replace_graph(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(input): Json<ReplaceGraph>,
) -> AppResult<impl IntoResponse> {
    graph::validate_graph(&input.nodes, &input.edges)?;

    let workflow = WorkflowRepo::replace_graph(&state.pool, workflow_id, &input.nodes, &input.edges)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id: workflow_id,
        }))?;

    tracing::info!(
        workflow_id,
        nodes = input.nodes.len(),
        edges = input.edges.len(),
        "Workflow graph replaced",
    );
    Ok(Json(DataResponse { data: workflow }))
}

/// Request body for `PATCH /api/v1/workflows/{id}/status`.
#[derive(Debug, serde::Deserialize)]
pub struct SetStatus {
    pub status: String,
}

/// PATCH /api/v1/workflows/{id}/status
pub async fn set_status(
    State(state): State<AppState>,
    Path(workflow_id): Path<DbId>,
    Json(input): Json<SetStatus>,
) -> AppResult<impl IntoResponse> {
    let status = match input.status.as_str() {
        "draft" => WorkflowStatus::Draft,
        "active" => WorkflowStatus::Active,
        "paused" => WorkflowStatus::Paused,
        "archived" => WorkflowStatus::Archived,
        other => {
            return Err(AppError::BadRequest(format!(
                "Unknown workflow status \"{other}\""
            )))
        }
    };

    let updated = WorkflowRepo::set_status(&state.pool, workflow_id, status.id()).await?;
    if !updated {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Workflow",
            id: workflow_id,
        }));
    }

    tracing::info!(workflow_id, status = %input.status, "Workflow status changed");
    Ok(StatusCode::NO_CONTENT)
}
