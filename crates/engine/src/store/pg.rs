//! Postgres implementation of the orchestrator store, delegating to the
//! `atelier-db` repositories.

use async_trait::async_trait;
use serde_json::Value;
use sqlx::PgPool;

use atelier_core::types::{DbId, Timestamp};
use atelier_db::models::agency::{Agency, ModelProfile};
use atelier_db::models::node_result::NodeResult;
use atelier_db::models::run::Run;
use atelier_db::models::trigger::Trigger;
use atelier_db::models::workflow::Workflow;
use atelier_db::repositories::{AgencyRepo, NodeResultRepo, RunRepo, TriggerRepo, WorkflowRepo};

use super::{OrchestratorStore, StoreError};

/// Store backed by the shared connection pool.
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl OrchestratorStore for PgStore {
    async fn workflow(&self, id: DbId) -> Result<Workflow, StoreError> {
        WorkflowRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "Workflow",
                id,
            })
    }

    async fn agency(&self, id: DbId) -> Result<Agency, StoreError> {
        AgencyRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "Agency",
                id,
            })
    }

    async fn model_profile(&self, id: DbId) -> Result<ModelProfile, StoreError> {
        AgencyRepo::find_profile(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound {
                entity: "ModelProfile",
                id,
            })
    }

    async fn run(&self, id: DbId) -> Result<Run, StoreError> {
        RunRepo::find_by_id(&self.pool, id)
            .await?
            .ok_or(StoreError::NotFound { entity: "Run", id })
    }

    async fn node_results(&self, run_id: DbId) -> Result<Vec<NodeResult>, StoreError> {
        Ok(NodeResultRepo::list_for_run(&self.pool, run_id).await?)
    }

    async fn create_run(
        &self,
        workflow: &Workflow,
        model_profile_id: DbId,
    ) -> Result<Run, StoreError> {
        let run = RunRepo::create(
            &self.pool,
            workflow.id,
            workflow.agency_id,
            model_profile_id,
        )
        .await?;

        let node_ids: Vec<String> = workflow.nodes.0.iter().map(|n| n.id.clone()).collect();
        NodeResultRepo::create_pending(&self.pool, run.id, &node_ids).await?;

        Ok(run)
    }

    async fn set_run_waiting(&self, run_id: DbId) -> Result<(), StoreError> {
        RunRepo::set_waiting_for_review(&self.pool, run_id).await?;
        Ok(())
    }

    async fn set_run_running(&self, run_id: DbId) -> Result<(), StoreError> {
        RunRepo::set_running(&self.pool, run_id).await?;
        Ok(())
    }

    async fn complete_run(&self, run_id: DbId) -> Result<(), StoreError> {
        RunRepo::complete(&self.pool, run_id).await?;
        Ok(())
    }

    async fn fail_run(
        &self,
        run_id: DbId,
        failed_node_id: Option<&str>,
        error: &str,
    ) -> Result<(), StoreError> {
        RunRepo::fail(&self.pool, run_id, failed_node_id, error).await?;
        Ok(())
    }

    async fn cancel_run(&self, run_id: DbId) -> Result<bool, StoreError> {
        Ok(RunRepo::cancel(&self.pool, run_id).await?)
    }

    async fn add_run_credits(&self, run_id: DbId, delta: i64) -> Result<(), StoreError> {
        Ok(RunRepo::add_credits_used(&self.pool, run_id, delta).await?)
    }

    async fn mark_node_running(&self, run_id: DbId, node_id: &str) -> Result<(), StoreError> {
        NodeResultRepo::mark_running(&self.pool, run_id, node_id).await?;
        Ok(())
    }

    async fn complete_node(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
        credits_used: i64,
    ) -> Result<(), StoreError> {
        NodeResultRepo::complete(&self.pool, run_id, node_id, output, credits_used).await?;
        Ok(())
    }

    async fn fail_node(
        &self,
        run_id: DbId,
        node_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        NodeResultRepo::fail(&self.pool, run_id, node_id, error).await?;
        Ok(())
    }

    async fn park_node_for_review(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
    ) -> Result<(), StoreError> {
        NodeResultRepo::set_waiting_for_review(&self.pool, run_id, node_id, output).await?;
        Ok(())
    }

    async fn skip_open_nodes(&self, run_id: DbId) -> Result<u64, StoreError> {
        Ok(NodeResultRepo::skip_open(&self.pool, run_id).await?)
    }

    async fn debit_credits(&self, agency_id: DbId, amount: i64) -> Result<bool, StoreError> {
        Ok(AgencyRepo::debit_credits(&self.pool, agency_id, amount).await?)
    }

    async fn credit_balance(&self, agency_id: DbId) -> Result<i64, StoreError> {
        Ok(AgencyRepo::credit_balance(&self.pool, agency_id).await?)
    }

    async fn active_run_count(&self, workflow_id: DbId) -> Result<i64, StoreError> {
        Ok(RunRepo::count_active_for_workflow(&self.pool, workflow_id).await?)
    }

    async fn due_triggers(&self, now: Timestamp) -> Result<Vec<Trigger>, StoreError> {
        Ok(TriggerRepo::list_due(&self.pool, now).await?)
    }

    async fn record_trigger_decision(
        &self,
        trigger_id: DbId,
        next_trigger_at: Option<Timestamp>,
        fired_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        Ok(TriggerRepo::record_decision(&self.pool, trigger_id, next_trigger_at, fired_at).await?)
    }
}
