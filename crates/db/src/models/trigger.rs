//! Trigger entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use validator::Validate;

use atelier_core::types::{DbId, Timestamp};

/// Trigger fired on a schedule by the poller.
pub const TRIGGER_TYPE_SCHEDULED: &str = "scheduled";

/// Trigger fired by an external webhook call.
pub const TRIGGER_TYPE_WEBHOOK: &str = "webhook";

/// All valid trigger types.
pub const VALID_TRIGGER_TYPES: &[&str] = &[TRIGGER_TYPE_SCHEDULED, TRIGGER_TYPE_WEBHOOK];

/// A row from the `triggers` table.
///
/// Schedule columns (`frequency`, `days`, `time_of_day`, `timezone`) are
/// only meaningful for `scheduled` triggers; `next_trigger_at` is
/// recomputed on every create, update and fire decision.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Trigger {
    pub id: DbId,
    pub workflow_id: DbId,
    pub trigger_type: String,
    pub frequency: Option<String>,
    /// Weekdays, 0 = Sunday through 6 = Saturday.
    pub days: Vec<i16>,
    /// 24-hour `HH:MM` local time.
    pub time_of_day: Option<String>,
    /// IANA timezone name, e.g. `America/New_York`.
    pub timezone: Option<String>,
    pub enabled: bool,
    pub next_trigger_at: Option<Timestamp>,
    pub last_triggered_at: Option<Timestamp>,
    pub max_concurrent_runs: i32,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for `POST /api/v1/triggers`.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateTrigger {
    pub workflow_id: DbId,
    pub trigger_type: String,
    pub frequency: Option<String>,
    #[serde(default)]
    pub days: Vec<i16>,
    pub time_of_day: Option<String>,
    pub timezone: Option<String>,
    #[serde(default = "default_enabled")]
    pub enabled: bool,
    #[validate(range(min = 1, max = 16))]
    #[serde(default = "default_max_concurrent_runs")]
    pub max_concurrent_runs: i32,
}

fn default_enabled() -> bool {
    true
}

fn default_max_concurrent_runs() -> i32 {
    1
}

/// DTO for `PATCH /api/v1/triggers/{id}`. Absent fields are left
/// unchanged.
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateTrigger {
    pub frequency: Option<String>,
    pub days: Option<Vec<i16>>,
    pub time_of_day: Option<String>,
    pub timezone: Option<String>,
    pub enabled: Option<bool>,
    #[validate(range(min = 1, max = 16))]
    pub max_concurrent_runs: Option<i32>,
}

/// Validate that a trigger type string is one of the accepted values.
pub fn validate_trigger_type(trigger_type: &str) -> Result<(), String> {
    if VALID_TRIGGER_TYPES.contains(&trigger_type) {
        Ok(())
    } else {
        Err(format!(
            "Invalid trigger type '{trigger_type}'. Must be one of: {}",
            VALID_TRIGGER_TYPES.join(", ")
        ))
    }
}
