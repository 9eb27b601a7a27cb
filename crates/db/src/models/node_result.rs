//! Per-node-per-run execution records.

use serde::Serialize;
use sqlx::FromRow;

use atelier_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `node_results` table.
///
/// One row exists per node of the workflow, created in `pending` state
/// together with the run. Status transitions are monotonic (see
/// `atelier_core::lifecycle::node`).
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct NodeResult {
    pub id: DbId,
    pub run_id: DbId,
    /// Graph-level node identifier (not a database foreign key; node ids
    /// live inside the workflow's JSONB graph).
    pub node_id: String,
    pub status_id: StatusId,
    /// Object keyed by the node's output port names.
    pub output: Option<serde_json::Value>,
    pub error: Option<String>,
    pub credits_used: i64,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
