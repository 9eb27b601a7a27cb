//! Repository for the `triggers` table.

use sqlx::PgPool;

use atelier_core::types::{DbId, Timestamp};

use crate::models::trigger::{CreateTrigger, Trigger, TRIGGER_TYPE_SCHEDULED};

/// Column list for `triggers` queries.
const COLUMNS: &str = "\
    id, workflow_id, trigger_type, frequency, days, time_of_day, timezone, \
    enabled, next_trigger_at, last_triggered_at, max_concurrent_runs, \
    created_at, updated_at";

/// CRUD operations for triggers.
pub struct TriggerRepo;

impl TriggerRepo {
    /// Create a trigger. `next_trigger_at` is computed by the caller
    /// (the schedule math lives in `atelier_core::schedule`).
    pub async fn create(
        pool: &PgPool,
        input: &CreateTrigger,
        next_trigger_at: Option<Timestamp>,
    ) -> Result<Trigger, sqlx::Error> {
        let query = format!(
            "INSERT INTO triggers \
                 (workflow_id, trigger_type, frequency, days, time_of_day, \
                  timezone, enabled, next_trigger_at, max_concurrent_runs) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(input.workflow_id)
            .bind(&input.trigger_type)
            .bind(&input.frequency)
            .bind(&input.days)
            .bind(&input.time_of_day)
            .bind(&input.timezone)
            .bind(input.enabled)
            .bind(next_trigger_at)
            .bind(input.max_concurrent_runs)
            .fetch_one(pool)
            .await
    }

    /// Find a trigger by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Trigger>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM triggers WHERE id = $1");
        sqlx::query_as::<_, Trigger>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Persist an updated trigger (schedule fields, enabled flag, cap,
    /// and the recomputed `next_trigger_at`).
    pub async fn update(pool: &PgPool, trigger: &Trigger) -> Result<Trigger, sqlx::Error> {
        let query = format!(
            "UPDATE triggers \
             SET frequency = $2, days = $3, time_of_day = $4, timezone = $5, \
                 enabled = $6, next_trigger_at = $7, max_concurrent_runs = $8, \
                 updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(trigger.id)
            .bind(&trigger.frequency)
            .bind(&trigger.days)
            .bind(&trigger.time_of_day)
            .bind(&trigger.timezone)
            .bind(trigger.enabled)
            .bind(trigger.next_trigger_at)
            .bind(trigger.max_concurrent_runs)
            .fetch_one(pool)
            .await
    }

    /// Delete a trigger. Returns `true` if a row was removed.
    pub async fn delete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM triggers WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Enabled scheduled triggers whose next fire time is due.
    pub async fn list_due(pool: &PgPool, now: Timestamp) -> Result<Vec<Trigger>, sqlx::Error> {
        let query = format!(
            "SELECT {COLUMNS} FROM triggers \
             WHERE enabled \
               AND trigger_type = $1 \
               AND next_trigger_at IS NOT NULL \
               AND next_trigger_at <= $2 \
             ORDER BY next_trigger_at"
        );
        sqlx::query_as::<_, Trigger>(&query)
            .bind(TRIGGER_TYPE_SCHEDULED)
            .bind(now)
            .fetch_all(pool)
            .await
    }

    /// Record a fire decision: always advances `next_trigger_at`; sets
    /// `last_triggered_at` only when a run was actually started.
    pub async fn record_decision(
        pool: &PgPool,
        id: DbId,
        next_trigger_at: Option<Timestamp>,
        fired_at: Option<Timestamp>,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE triggers \
             SET next_trigger_at = $2, \
                 last_triggered_at = COALESCE($3, last_triggered_at), \
                 updated_at = NOW() \
             WHERE id = $1",
        )
        .bind(id)
        .bind(next_trigger_at)
        .bind(fired_at)
        .execute(pool)
        .await?;
        Ok(())
    }
}
