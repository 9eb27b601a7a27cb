//! Workflow entity models and DTOs.

use serde::{Deserialize, Serialize};
use sqlx::types::Json;
use sqlx::FromRow;

use atelier_core::graph::{EdgeDef, NodeDef};
use atelier_core::types::{DbId, Timestamp};

use super::status::StatusId;

/// A row from the `workflows` table. The graph (nodes + edges) is stored
/// as JSONB and only ever replaced as a whole.
#[derive(Debug, Clone, FromRow, Serialize)]
pub struct Workflow {
    pub id: DbId,
    pub agency_id: DbId,
    /// `None` marks a reusable template not yet bound to a model.
    pub model_profile_id: Option<DbId>,
    pub name: String,
    pub status_id: StatusId,
    pub nodes: Json<Vec<NodeDef>>,
    pub edges: Json<Vec<EdgeDef>>,
    pub created_at: Timestamp,
    pub updated_at: Timestamp,
}

/// DTO for creating a workflow shell (graph starts empty).
#[derive(Debug, Deserialize)]
pub struct CreateWorkflow {
    pub agency_id: DbId,
    pub model_profile_id: Option<DbId>,
    pub name: String,
}

/// DTO for the atomic full-graph swap.
#[derive(Debug, Deserialize)]
pub struct ReplaceGraph {
    pub nodes: Vec<NodeDef>,
    pub edges: Vec<EdgeDef>,
}
