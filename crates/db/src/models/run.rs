//! Run entity models.

use serde::Serialize;
use sqlx::FromRow;

use atelier_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `runs` table: one execution instance of a workflow
/// graph.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Run {
    pub id: DbId,
    pub workflow_id: DbId,
    pub agency_id: DbId,
    pub model_profile_id: DbId,
    pub status_id: StatusId,
    /// Sum of completed node results' credits.
    pub credits_used: i64,
    pub error: Option<String>,
    /// Set when the run failed executing a specific node.
    pub failed_node_id: Option<String>,
    pub started_at: Timestamp,
    pub completed_at: Option<Timestamp>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}
