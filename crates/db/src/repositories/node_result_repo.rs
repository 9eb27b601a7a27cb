//! Repository for the `node_results` table.
//!
//! All transition statements carry the expected current status in their
//! WHERE clause, mirroring `atelier_core::lifecycle::node`: a terminal
//! result can never be rewritten, and a skip (from cancellation) only
//! touches open results.

use sqlx::PgPool;

use atelier_core::types::DbId;

use crate::models::node_result::NodeResult;
use crate::models::status::{NodeResultStatus, StatusId};

/// Column list for `node_results` queries.
const COLUMNS: &str = "\
    id, run_id, node_id, status_id, output, error, credits_used, \
    created_at, updated_at";

/// CRUD and status transitions for per-node execution records.
pub struct NodeResultRepo;

impl NodeResultRepo {
    /// Create one pending result per node id, in a single statement.
    ///
    /// Called exactly once, when the run is created, so the result set
    /// mirrors the workflow's node set at that moment.
    pub async fn create_pending(
        pool: &PgPool,
        run_id: DbId,
        node_ids: &[String],
    ) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO node_results (run_id, node_id, status_id) \
             SELECT $1, node_id, $2 FROM UNNEST($3::text[]) AS t(node_id)",
        )
        .bind(run_id)
        .bind(NodeResultStatus::Pending.id())
        .bind(node_ids)
        .execute(pool)
        .await?;
        Ok(())
    }

    /// All results for a run, in creation order.
    pub async fn list_for_run(pool: &PgPool, run_id: DbId) -> Result<Vec<NodeResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM node_results WHERE run_id = $1 ORDER BY id");
        sqlx::query_as::<_, NodeResult>(&query)
            .bind(run_id)
            .fetch_all(pool)
            .await
    }

    /// Find one node's result within a run.
    pub async fn find(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
    ) -> Result<Option<NodeResult>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM node_results WHERE run_id = $1 AND node_id = $2");
        sqlx::query_as::<_, NodeResult>(&query)
            .bind(run_id)
            .bind(node_id)
            .fetch_optional(pool)
            .await
    }

    /// Transition a pending result to running.
    pub async fn mark_running(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
    ) -> Result<bool, sqlx::Error> {
        Self::transition(
            pool,
            run_id,
            node_id,
            NodeResultStatus::Pending.id(),
            NodeResultStatus::Running.id(),
        )
        .await
    }

    /// Complete a running or waiting result with its output and cost.
    pub async fn complete(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
        output: &serde_json::Value,
        credits_used: i64,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_results \
             SET status_id = $3, output = $4, credits_used = $5, updated_at = NOW() \
             WHERE run_id = $1 AND node_id = $2 AND status_id IN ($6, $7)",
        )
        .bind(run_id)
        .bind(node_id)
        .bind(NodeResultStatus::Completed.id())
        .bind(output)
        .bind(credits_used)
        .bind(NodeResultStatus::Running.id())
        .bind(NodeResultStatus::WaitingForReview.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Fail a running or waiting result with an error message.
    pub async fn fail(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
        error: &str,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_results \
             SET status_id = $3, error = $4, updated_at = NOW() \
             WHERE run_id = $1 AND node_id = $2 AND status_id IN ($5, $6)",
        )
        .bind(run_id)
        .bind(node_id)
        .bind(NodeResultStatus::Failed.id())
        .bind(error)
        .bind(NodeResultStatus::Running.id())
        .bind(NodeResultStatus::WaitingForReview.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Park a running gate result with its pass-through output.
    pub async fn set_waiting_for_review(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
        output: &serde_json::Value,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_results \
             SET status_id = $3, output = $4, updated_at = NOW() \
             WHERE run_id = $1 AND node_id = $2 AND status_id = $5",
        )
        .bind(run_id)
        .bind(node_id)
        .bind(NodeResultStatus::WaitingForReview.id())
        .bind(output)
        .bind(NodeResultStatus::Running.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    /// Flip every open (pending/running/waiting) result of a run to
    /// skipped. Used by cancellation; terminal results are untouched.
    pub async fn skip_open(pool: &PgPool, run_id: DbId) -> Result<u64, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_results \
             SET status_id = $2, updated_at = NOW() \
             WHERE run_id = $1 AND status_id IN ($3, $4, $5)",
        )
        .bind(run_id)
        .bind(NodeResultStatus::Skipped.id())
        .bind(NodeResultStatus::Pending.id())
        .bind(NodeResultStatus::Running.id())
        .bind(NodeResultStatus::WaitingForReview.id())
        .execute(pool)
        .await?;
        Ok(result.rows_affected())
    }

    /// Guarded single-step transition helper.
    async fn transition(
        pool: &PgPool,
        run_id: DbId,
        node_id: &str,
        from: StatusId,
        to: StatusId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE node_results \
             SET status_id = $3, updated_at = NOW() \
             WHERE run_id = $1 AND node_id = $2 AND status_id = $4",
        )
        .bind(run_id)
        .bind(node_id)
        .bind(to)
        .bind(from)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
