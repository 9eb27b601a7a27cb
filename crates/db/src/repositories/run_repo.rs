//! Repository for the `runs` table.
//!
//! Terminal transitions are guarded in the WHERE clause so a run that has
//! been cancelled (or completed/failed concurrently) is never overwritten:
//! status updates are monotonic at the database level, not just in the
//! runner's control flow.

use sqlx::PgPool;

use atelier_core::types::DbId;

use crate::models::run::Run;
use crate::models::status::{RunStatus, StatusId};

/// Column list for `runs` queries.
const COLUMNS: &str = "\
    id, workflow_id, agency_id, model_profile_id, status_id, credits_used, \
    error, failed_node_id, started_at, completed_at, created_at, updated_at";

/// Terminal statuses: completed, failed, cancelled.
const TERMINAL_STATUSES: [StatusId; 3] = [
    RunStatus::Completed as StatusId,
    RunStatus::Failed as StatusId,
    RunStatus::Cancelled as StatusId,
];

/// CRUD and status transitions for runs.
pub struct RunRepo;

impl RunRepo {
    /// Create a run in `running` status.
    pub async fn create(
        pool: &PgPool,
        workflow_id: DbId,
        agency_id: DbId,
        model_profile_id: DbId,
    ) -> Result<Run, sqlx::Error> {
        let query = format!(
            "INSERT INTO runs (workflow_id, agency_id, model_profile_id, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Run>(&query)
            .bind(workflow_id)
            .bind(agency_id)
            .bind(model_profile_id)
            .bind(RunStatus::Running.id())
            .fetch_one(pool)
            .await
    }

    /// Find a run by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Run>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM runs WHERE id = $1");
        sqlx::query_as::<_, Run>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Pause the run for human review. Only a running run can pause.
    pub async fn set_waiting_for_review(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(pool, id, RunStatus::Running, RunStatus::WaitingForReview).await
    }

    /// Resume a paused run. Only a waiting run can resume.
    pub async fn set_running(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        Self::transition(pool, id, RunStatus::WaitingForReview, RunStatus::Running).await
    }

    /// Mark the run completed. No-op if the run already reached a
    /// terminal state (e.g. cancelled while the last node executed).
    pub async fn complete(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE runs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(RunStatus::Completed.id())
        .bind(RunStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Mark the run failed with the failing node (if any) and message.
    pub async fn fail(
        pool: &PgPool,
        id: DbId,
        failed_node_id: Option<&str>,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE runs \
             SET status_id = $2, failed_node_id = $3, error = $4, \
                 completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($5, $6, $7)",
        )
        .bind(id)
        .bind(RunStatus::Failed.id())
        .bind(failed_node_id)
        .bind(error)
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Cancel the run if it is not already terminal.
    ///
    /// Returns `true` if the run was cancelled, `false` if it had already
    /// completed, failed, or been cancelled.
    pub async fn cancel(pool: &PgPool, id: DbId) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE runs \
             SET status_id = $2, completed_at = NOW(), updated_at = NOW() \
             WHERE id = $1 AND status_id NOT IN ($3, $4, $5)",
        )
        .bind(id)
        .bind(RunStatus::Cancelled.id())
        .bind(TERMINAL_STATUSES[0])
        .bind(TERMINAL_STATUSES[1])
        .bind(TERMINAL_STATUSES[2])
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Add a completed node's cost to the run's running total.
    pub async fn add_credits_used(
        pool: &PgPool,
        id: DbId,
        delta: i64,
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "UPDATE runs SET credits_used = credits_used + $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(delta)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Number of non-terminal runs for a workflow (running or paused).
    ///
    /// Used by the trigger scheduler to enforce the per-trigger
    /// concurrency cap.
    pub async fn count_active_for_workflow(
        pool: &PgPool,
        workflow_id: DbId,
    ) -> Result<i64, sqlx::Error> {
        sqlx::query_scalar::<_, i64>(
            "SELECT COUNT(*) FROM runs WHERE workflow_id = $1 AND status_id IN ($2, $3)",
        )
        .bind(workflow_id)
        .bind(RunStatus::Running.id())
        .bind(RunStatus::WaitingForReview.id())
        .fetch_one(pool)
        .await
    }

    /// Guarded single-step transition helper.
    async fn transition(
        pool: &PgPool,
        id: DbId,
        from: RunStatus,
        to: RunStatus,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE runs SET status_id = $2, updated_at = NOW() \
             WHERE id = $1 AND status_id = $3",
        )
        .bind(id)
        .bind(to.id())
        .bind(from.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
