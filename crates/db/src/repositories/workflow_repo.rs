//! Repository for the `workflows` table.

use sqlx::types::Json;
use sqlx::PgPool;

use atelier_core::graph::{EdgeDef, NodeDef};
use atelier_core::types::DbId;

use crate::models::status::{StatusId, WorkflowStatus};
use crate::models::workflow::{CreateWorkflow, Workflow};

/// Column list for `workflows` queries.
const COLUMNS: &str = "\
    id, agency_id, model_profile_id, name, status_id, nodes, edges, \
    created_at, updated_at";

/// CRUD operations for workflows. The graph is replaced atomically as a
/// whole (one UPDATE swapping both JSONB arrays), never patched.
pub struct WorkflowRepo;

impl WorkflowRepo {
    /// Create a workflow shell with an empty graph in `draft` status.
    pub async fn create(pool: &PgPool, input: &CreateWorkflow) -> Result<Workflow, sqlx::Error> {
        let query = format!(
            "INSERT INTO workflows (agency_id, model_profile_id, name, status_id) \
             VALUES ($1, $2, $3, $4) \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(input.agency_id)
            .bind(input.model_profile_id)
            .bind(&input.name)
            .bind(WorkflowStatus::Draft.id())
            .fetch_one(pool)
            .await
    }

    /// Find a workflow by its ID.
    pub async fn find_by_id(pool: &PgPool, id: DbId) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!("SELECT {COLUMNS} FROM workflows WHERE id = $1");
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Atomically swap the whole graph (nodes + edges) in one statement.
    pub async fn replace_graph(
        pool: &PgPool,
        id: DbId,
        nodes: &[NodeDef],
        edges: &[EdgeDef],
    ) -> Result<Option<Workflow>, sqlx::Error> {
        let query = format!(
            "UPDATE workflows \
             SET nodes = $2, edges = $3, updated_at = NOW() \
             WHERE id = $1 \
             RETURNING {COLUMNS}"
        );
        sqlx::query_as::<_, Workflow>(&query)
            .bind(id)
            .bind(Json(nodes))
            .bind(Json(edges))
            .fetch_optional(pool)
            .await
    }

    /// Change the workflow lifecycle status.
    pub async fn set_status(
        pool: &PgPool,
        id: DbId,
        status: StatusId,
    ) -> Result<bool, sqlx::Error> {
        let result = sqlx::query(
            "UPDATE workflows SET status_id = $2, updated_at = NOW() WHERE id = $1",
        )
        .bind(id)
        .bind(status)
        .execute(pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}
