//! Handlers for trigger CRUD.
//!
//! `next_trigger_at` is recomputed on every create and on every update
//! that can affect future firing; the scheduler recomputes it again on
//! every fire decision.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chrono::Utc;
use validator::Validate;

use atelier_core::error::CoreError;
use atelier_core::schedule::Schedule;
use atelier_core::types::{DbId, Timestamp};
use atelier_db::models::trigger::{
    validate_trigger_type, CreateTrigger, Trigger, UpdateTrigger, TRIGGER_TYPE_SCHEDULED,
};
use atelier_db::repositories::TriggerRepo;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

/// Parse and validate a trigger's schedule columns, returning the next
/// fire time. Webhook triggers have no schedule and yield `None`.
fn compute_next(
    trigger_type: &str,
    frequency: Option<&str>,
    days: &[i16],
    time_of_day: Option<&str>,
    timezone: Option<&str>,
) -> AppResult<Option<Timestamp>> {
    if trigger_type != TRIGGER_TYPE_SCHEDULED {
        return Ok(None);
    }

    let frequency = frequency.ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Scheduled triggers require a frequency".into(),
        ))
    })?;
    let time_of_day = time_of_day.ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Scheduled triggers require a time (HH:MM)".into(),
        ))
    })?;
    let timezone = timezone.ok_or_else(|| {
        AppError::Core(CoreError::Validation(
            "Scheduled triggers require a timezone".into(),
        ))
    })?;

    let schedule = Schedule::parse(frequency, days, time_of_day, timezone)?;
    Ok(Some(schedule.next_trigger_at(Utc::now())?))
}

/// POST /api/v1/triggers
pub async fn create_trigger(
    State(state): State<AppState>,
    Json(input): Json<CreateTrigger>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;
    validate_trigger_type(&input.trigger_type)
        .map_err(|e| AppError::Core(CoreError::Validation(e)))?;

    let next = compute_next(
        &input.trigger_type,
        input.frequency.as_deref(),
        &input.days,
        input.time_of_day.as_deref(),
        input.timezone.as_deref(),
    )?;

    let trigger = TriggerRepo::create(&state.pool, &input, next).await?;
    tracing::info!(
        trigger_id = trigger.id,
        workflow_id = trigger.workflow_id,
        trigger_type = %trigger.trigger_type,
        "Trigger created",
    );
    Ok((StatusCode::CREATED, Json(DataResponse { data: trigger })))
}

/// GET /api/v1/triggers/{id}
pub async fn get_trigger(
    State(state): State<AppState>,
    Path(trigger_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let trigger = find_trigger(&state, trigger_id).await?;
    Ok(Json(DataResponse { data: trigger }))
}

/// PATCH /api/v1/triggers/{id}
///
/// Partial update; absent fields are left unchanged. Any change to the
/// schedule fields (or re-enabling) recomputes `next_trigger_at`.
pub async fn update_trigger(
    State(state): State<AppState>,
    Path(trigger_id): Path<DbId>,
    Json(input): Json<UpdateTrigger>,
) -> AppResult<impl IntoResponse> {
    input
        .validate()
        .map_err(|e| AppError::BadRequest(e.to_string()))?;

    let mut trigger = find_trigger(&state, trigger_id).await?;

    if let Some(frequency) = input.frequency {
        trigger.frequency = Some(frequency);
    }
    if let Some(days) = input.days {
        trigger.days = days;
    }
    if let Some(time_of_day) = input.time_of_day {
        trigger.time_of_day = Some(time_of_day);
    }
    if let Some(timezone) = input.timezone {
        trigger.timezone = Some(timezone);
    }
    if let Some(enabled) = input.enabled {
        trigger.enabled = enabled;
    }
    if let Some(cap) = input.max_concurrent_runs {
        trigger.max_concurrent_runs = cap;
    }

    trigger.next_trigger_at = compute_next(
        &trigger.trigger_type,
        trigger.frequency.as_deref(),
        &trigger.days,
        trigger.time_of_day.as_deref(),
        trigger.timezone.as_deref(),
    )?;

    let trigger = TriggerRepo::update(&state.pool, &trigger).await?;
    tracing::info!(trigger_id, "Trigger updated");
    Ok(Json(DataResponse { data: trigger }))
}

/// DELETE /api/v1/triggers/{id}
pub async fn delete_trigger(
    State(state): State<AppState>,
    Path(trigger_id): Path<DbId>,
) -> AppResult<impl IntoResponse> {
    let deleted = TriggerRepo::delete(&state.pool, trigger_id).await?;
    if !deleted {
        return Err(AppError::Core(CoreError::NotFound {
            entity: "Trigger",
            id: trigger_id,
        }));
    }
    tracing::info!(trigger_id, "Trigger deleted");
    Ok(StatusCode::NO_CONTENT)
}

async fn find_trigger(state: &AppState, trigger_id: DbId) -> AppResult<Trigger> {
    TriggerRepo::find_by_id(&state.pool, trigger_id)
        .await?
        .ok_or(AppError::Core(CoreError::NotFound {
            entity: "Trigger",
            id: trigger_id,
        }))
}
