use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;

use atelier_core::error::CoreError;
use atelier_engine::store::StoreError;
use atelier_engine::EngineError;

/// Application-level error type for HTTP handlers.
///
/// Wraps domain errors from the core and engine crates and adds
/// HTTP-specific variants. Implements [`IntoResponse`] to produce
/// consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `atelier-core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// An orchestration error from `atelier-engine`.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// A database error from sqlx.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Engine(engine) => classify_engine_error(engine),
            AppError::Database(err) => classify_sqlx_error(err),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Cycle(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "CYCLE_ERROR",
            format!("Workflow graph contains a cycle: {msg}"),
        ),
        CoreError::PortIncompatibility(msg) => (
            StatusCode::UNPROCESSABLE_ENTITY,
            "PORT_INCOMPATIBILITY",
            format!("Incompatible ports: {msg}"),
        ),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

fn classify_engine_error(engine: &EngineError) -> (StatusCode, &'static str, String) {
    match engine {
        EngineError::Core(core) => classify_core_error(core),
        EngineError::Store(StoreError::NotFound { entity, id }) => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        EngineError::Store(StoreError::Database(err)) => classify_sqlx_error(err),
        EngineError::RunTerminal(run_id) => (
            StatusCode::CONFLICT,
            "RUN_TERMINAL",
            format!("Run {run_id} is already in a terminal state"),
        ),
        EngineError::InvalidApproval(msg) => {
            (StatusCode::CONFLICT, "INVALID_APPROVAL", msg.clone())
        }
        EngineError::InsufficientCredits { needed } => (
            StatusCode::PAYMENT_REQUIRED,
            "INSUFFICIENT_CREDITS",
            format!("Insufficient credits: {needed} required"),
        ),
        EngineError::Compute(err) => (
            StatusCode::BAD_GATEWAY,
            "BACKEND_ERROR",
            err.to_string(),
        ),
        EngineError::Hosted(err) => (
            StatusCode::BAD_GATEWAY,
            "BACKEND_ERROR",
            err.to_string(),
        ),
        EngineError::EmptyOutput { model } => (
            StatusCode::BAD_GATEWAY,
            "EMPTY_OUTPUT",
            format!("Backend {model} returned no usable output"),
        ),
    }
}

/// Classify a sqlx error into an HTTP status, error code, and message.
///
/// - `RowNotFound` maps to 404.
/// - Unique constraint violations (constraint name starting with `uq_`)
///   map to 409.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> (StatusCode, &'static str, String) {
    match err {
        sqlx::Error::RowNotFound => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            "Resource not found".to_string(),
        ),
        sqlx::Error::Database(db_err) => {
            // PostgreSQL unique constraint violation: error code 23505
            if db_err.code().as_deref() == Some("23505") {
                let constraint = db_err.constraint().unwrap_or("unknown");
                if constraint.starts_with("uq_") {
                    return (
                        StatusCode::CONFLICT,
                        "CONFLICT",
                        format!("Duplicate value violates unique constraint: {constraint}"),
                    );
                }
            }
            tracing::error!(error = %db_err, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
        other => {
            tracing::error!(error = %other, "Database error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}
