//! The persistence seam between the engine and its data store.
//!
//! The orchestrator only ever talks to [`OrchestratorStore`]; the
//! Postgres implementation in [`pg`] delegates to the `atelier-db`
//! repositories, and the engine's integration tests substitute an
//! in-memory store. Every method is a narrow, single-purpose operation;
//! in particular [`OrchestratorStore::debit_credits`] is atomic
//! decrement-if-sufficient, never read-then-write.

mod pg;

pub use pg::PgStore;

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::types::{DbId, Timestamp};
use atelier_db::models::agency::{Agency, ModelProfile};
use atelier_db::models::node_result::NodeResult;
use atelier_db::models::run::Run;
use atelier_db::models::trigger::Trigger;
use atelier_db::models::workflow::Workflow;

/// Errors from the persistence collaborator.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// The underlying database call failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// A required row is missing.
    #[error("{entity} {id} not found")]
    NotFound { entity: &'static str, id: DbId },
}

/// CRUD-by-id access to the orchestration entities.
#[async_trait]
pub trait OrchestratorStore: Send + Sync {
    // -- reads ---------------------------------------------------------------

    async fn workflow(&self, id: DbId) -> Result<Workflow, StoreError>;
    async fn agency(&self, id: DbId) -> Result<Agency, StoreError>;
    async fn model_profile(&self, id: DbId) -> Result<ModelProfile, StoreError>;
    async fn run(&self, id: DbId) -> Result<Run, StoreError>;
    async fn node_results(&self, run_id: DbId) -> Result<Vec<NodeResult>, StoreError>;

    // -- run lifecycle -------------------------------------------------------

    /// Create a run for a workflow, with one pending node result per
    /// node of the graph as it exists right now.
    async fn create_run(
        &self,
        workflow: &Workflow,
        model_profile_id: DbId,
    ) -> Result<Run, StoreError>;

    async fn set_run_waiting(&self, run_id: DbId) -> Result<(), StoreError>;
    async fn set_run_running(&self, run_id: DbId) -> Result<(), StoreError>;
    async fn complete_run(&self, run_id: DbId) -> Result<(), StoreError>;
    async fn fail_run(
        &self,
        run_id: DbId,
        failed_node_id: Option<&str>,
        error: &str,
    ) -> Result<(), StoreError>;

    /// Cancel a run if it is not already terminal; `true` when the run
    /// was actually cancelled by this call.
    async fn cancel_run(&self, run_id: DbId) -> Result<bool, StoreError>;

    /// Add a completed node's cost to the run's total.
    async fn add_run_credits(&self, run_id: DbId, delta: i64) -> Result<(), StoreError>;

    // -- node results --------------------------------------------------------

    async fn mark_node_running(&self, run_id: DbId, node_id: &str) -> Result<(), StoreError>;
    async fn complete_node(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
        credits_used: i64,
    ) -> Result<(), StoreError>;
    async fn fail_node(&self, run_id: DbId, node_id: &str, error: &str)
        -> Result<(), StoreError>;

    /// Park a gate node's pass-through output pending approval.
    async fn park_node_for_review(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
    ) -> Result<(), StoreError>;

    /// Flip all open node results of a run to skipped (cancellation).
    async fn skip_open_nodes(&self, run_id: DbId) -> Result<u64, StoreError>;

    // -- credits -------------------------------------------------------------

    /// Atomically deduct credits if the agency's balance covers them.
    /// `false` means insufficient funds and no change.
    async fn debit_credits(&self, agency_id: DbId, amount: i64) -> Result<bool, StoreError>;

    /// Current balance (scheduler precondition check).
    async fn credit_balance(&self, agency_id: DbId) -> Result<i64, StoreError>;

    // -- triggers ------------------------------------------------------------

    async fn active_run_count(&self, workflow_id: DbId) -> Result<i64, StoreError>;
    async fn due_triggers(&self, now: Timestamp) -> Result<Vec<Trigger>, StoreError>;

    /// Record a fire decision: always advances the schedule, and stamps
    /// `last_triggered_at` when a run was actually started.
    async fn record_trigger_decision(
        &self,
        trigger_id: DbId,
        next_trigger_at: Option<Timestamp>,
        fired_at: Option<Timestamp>,
    ) -> Result<(), StoreError>;
}
