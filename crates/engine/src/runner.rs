//! The run orchestrator.
//!
//! Executes one run's nodes strictly sequentially in topological order,
//! suspending at gates, metering credits through the atomic debit, and
//! recording every outcome on the run's node results. Entry points are
//! safe to re-invoke: terminal runs are rejected, terminal node results
//! are skipped, so resuming after a gate approval re-executes only what
//! is still pending.

use std::collections::HashMap;
use std::sync::Arc;

use serde_json::Value;

use atelier_core::graph::{self, EdgeDef, NodeDef};
use atelier_core::lifecycle;
use atelier_core::nodes;
use atelier_core::template;
use atelier_core::types::DbId;
use atelier_db::models::run::Run;
use atelier_db::models::status::{NodeResultStatus, RunStatus, WorkflowStatus};
use atelier_db::models::workflow::Workflow;

use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;
use crate::executors::ExecutorRegistry;
use crate::supervisor;

/// Local view of a node's progress while the loop advances.
struct ResultView {
    status_id: i16,
    output: Option<Value>,
}

/// Drives workflow runs from creation to a terminal state.
pub struct Runner {
    services: Arc<EngineServices>,
    registry: ExecutorRegistry,
}

impl Runner {
    pub fn new(services: Arc<EngineServices>) -> Self {
        Self {
            services,
            registry: ExecutorRegistry::new(),
        }
    }

    pub fn services(&self) -> &Arc<EngineServices> {
        &self.services
    }

    // -----------------------------------------------------------------------
    // Run creation
    // -----------------------------------------------------------------------

    /// Validate a workflow's readiness and create a run with one pending
    /// node result per node. Does not execute anything.
    pub async fn start_run(&self, workflow_id: DbId) -> Result<Run, EngineError> {
        let workflow = self.services.store.workflow(workflow_id).await?;
        let model_profile_id = Self::check_runnable(&workflow)?;

        let run = self
            .services
            .store
            .create_run(&workflow, model_profile_id)
            .await?;

        tracing::info!(
            run_id = run.id,
            workflow_id,
            node_count = workflow.nodes.0.len(),
            "Run created",
        );
        Ok(run)
    }

    /// A workflow may run when it is active, bound to a model profile,
    /// and non-empty. Returns the profile id.
    fn check_runnable(workflow: &Workflow) -> Result<DbId, EngineError> {
        if workflow.status_id != WorkflowStatus::Active.id() {
            return Err(EngineError::Core(atelier_core::error::CoreError::Validation(
                "Workflow must be active to run".into(),
            )));
        }
        let Some(model_profile_id) = workflow.model_profile_id else {
            return Err(EngineError::Core(atelier_core::error::CoreError::Validation(
                "Workflow has no target model profile".into(),
            )));
        };
        if workflow.nodes.0.is_empty() {
            return Err(EngineError::Core(atelier_core::error::CoreError::Validation(
                "Workflow graph is empty".into(),
            )));
        }
        Ok(model_profile_id)
    }

    // -----------------------------------------------------------------------
    // Execution
    // -----------------------------------------------------------------------

    /// Execute (or resume) a run until it completes, pauses at a gate,
    /// or fails.
    pub async fn run_workflow(&self, run_id: DbId) -> Result<(), EngineError> {
        let store = &self.services.store;

        let run = store.run(run_id).await?;
        if lifecycle::run::is_terminal(run.status_id) {
            return Err(EngineError::RunTerminal(run_id));
        }

        let workflow = store.workflow(run.workflow_id).await?;
        let agency = store.agency(run.agency_id).await?;
        let profile = store.model_profile(run.model_profile_id).await?;

        let node_defs: &[NodeDef] = &workflow.nodes.0;
        let edges: &[EdgeDef] = &workflow.edges.0;

        // Defensive re-sort at run time; the graph was validated at save
        // but the runner never trusts that.
        let order = match graph::execution_order(node_defs, edges) {
            Ok(order) => order,
            Err(e) => {
                let message = e.to_string();
                store.fail_run(run_id, None, &message).await?;
                tracing::error!(run_id, error = %message, "Run failed: graph not executable");
                return Err(e.into());
            }
        };

        let node_map: HashMap<&str, &NodeDef> =
            node_defs.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut results: HashMap<String, ResultView> = HashMap::new();
        for r in store.node_results(run_id).await? {
            results.insert(
                r.node_id.clone(),
                ResultView {
                    status_id: r.status_id,
                    output: r.output,
                },
            );
        }

        let ctx = RunContext {
            run_id,
            agency,
            profile,
        };
        let vars = ctx.template_vars();

        for node_id in order {
            // Cooperative cancellation: a run cancelled mid-flight stops
            // before the next node; the guarded updates below make sure
            // a straggling write cannot resurrect it either way.
            let current = store.run(run_id).await?;
            if lifecycle::run::is_terminal(current.status_id) {
                tracing::info!(run_id, "Run reached a terminal state mid-execution, stopping");
                return Ok(());
            }

            let node = node_map
                .get(node_id)
                .expect("execution order only contains known nodes");
            let view = results.get(node_id).ok_or_else(|| {
                EngineError::Core(atelier_core::error::CoreError::Internal(format!(
                    "Run {run_id} has no node result for node \"{node_id}\""
                )))
            })?;

            // Resume support: completed/failed/skipped nodes are never
            // re-executed.
            if lifecycle::node::is_terminal(view.status_id) {
                continue;
            }

            // A result already parked for review means the approval has
            // not arrived yet; leave the run paused.
            if view.status_id == NodeResultStatus::WaitingForReview.id() {
                tracing::debug!(run_id, node_id, "Run still paused at gate");
                return Ok(());
            }

            // Gather inputs from upstream outputs along incoming edges.
            let inputs = match Self::gather_inputs(node_id, edges, &results) {
                Ok(inputs) => inputs,
                Err(message) => {
                    store.fail_node(run_id, node_id, &message).await?;
                    store.fail_run(run_id, Some(node_id), &message).await?;
                    return Err(EngineError::Core(
                        atelier_core::error::CoreError::Internal(message),
                    ));
                }
            };

            // Resolve config: schema defaults, then template variables.
            let config = nodes::apply_defaults(node.kind, &node.config);
            let config = template::resolve(&config, &vars);

            store.mark_node_running(run_id, node_id).await?;
            tracing::info!(run_id, node_id, kind = node.kind.as_str(), "Executing node");

            let executor = self.registry.executor(node.kind);
            let output = match executor.execute(&self.services, &ctx, &config, &inputs).await {
                Ok(output) => output,
                Err(e) => {
                    let message = e.to_string();
                    store.fail_node(run_id, node_id, &message).await?;
                    store.fail_run(run_id, Some(node_id), &message).await?;
                    tracing::error!(run_id, node_id, error = %message, "Node execution failed");
                    return Err(e);
                }
            };

            // Gates suspend the run; execution resumes via approve().
            if node.kind.is_gate() {
                store.park_node_for_review(run_id, node_id, &output).await?;
                store.set_run_waiting(run_id).await?;
                tracing::info!(run_id, node_id, "Run paused for review");
                return Ok(());
            }

            // Meter credits before persisting success. Costs are a pure
            // function of kind + resolved config; the debit is a single
            // atomic decrement-if-sufficient.
            let cost = node.kind.credit_cost(&config);
            if cost > 0 {
                let debited = store.debit_credits(ctx.agency.id, cost).await?;
                if !debited {
                    let message = format!(
                        "Insufficient credits: node \"{node_id}\" costs {cost}"
                    );
                    store.fail_node(run_id, node_id, &message).await?;
                    store.fail_run(run_id, Some(node_id), &message).await?;
                    tracing::warn!(run_id, node_id, cost, "Run failed: insufficient credits");
                    return Err(EngineError::InsufficientCredits { needed: cost });
                }
            }

            store.complete_node(run_id, node_id, &output, cost).await?;
            if cost > 0 {
                store.add_run_credits(run_id, cost).await?;
            }

            results.insert(
                node_id.to_string(),
                ResultView {
                    status_id: NodeResultStatus::Completed.id(),
                    output: Some(output),
                },
            );
        }

        store.complete_run(run_id).await?;
        tracing::info!(run_id, "Run completed");
        Ok(())
    }

    /// Read, for each incoming edge, the upstream output at the source
    /// port into the input map at the target port.
    fn gather_inputs(
        node_id: &str,
        edges: &[EdgeDef],
        results: &HashMap<String, ResultView>,
    ) -> Result<Value, String> {
        let mut inputs = serde_json::Map::new();

        for edge in graph::incoming_edges(node_id, edges) {
            let upstream = results.get(&edge.source).ok_or_else(|| {
                format!("Upstream node \"{}\" has no result", edge.source)
            })?;
            if upstream.status_id != NodeResultStatus::Completed.id() {
                return Err(format!(
                    "Upstream node \"{}\" has not completed",
                    edge.source
                ));
            }
            let output = upstream.output.as_ref().ok_or_else(|| {
                format!("Upstream node \"{}\" completed without output", edge.source)
            })?;
            let value = output.get(&edge.source_port).ok_or_else(|| {
                format!(
                    "Upstream node \"{}\" output has no port \"{}\"",
                    edge.source, edge.source_port
                )
            })?;
            inputs.insert(edge.target_port.clone(), value.clone());
        }

        Ok(Value::Object(inputs))
    }

    // -----------------------------------------------------------------------
    // Approval
    // -----------------------------------------------------------------------

    /// Approve the gate a run is paused on, optionally narrowing a batch
    /// output to one selected item. Completes the gate's node result and
    /// flips the run back to running; the caller resumes execution (see
    /// [`Runner::approve_and_resume`]).
    pub async fn approve(
        &self,
        run_id: DbId,
        node_id: &str,
        selection: Option<usize>,
    ) -> Result<(), EngineError> {
        let store = &self.services.store;

        let run = store.run(run_id).await?;
        if run.status_id != RunStatus::WaitingForReview.id() {
            return Err(EngineError::InvalidApproval(format!(
                "Run {run_id} is not waiting for review"
            )));
        }

        let results = store.node_results(run_id).await?;
        let target = results
            .iter()
            .find(|r| r.node_id == node_id)
            .ok_or_else(|| {
                EngineError::InvalidApproval(format!(
                    "Run {run_id} has no node \"{node_id}\""
                ))
            })?;
        if target.status_id != NodeResultStatus::WaitingForReview.id() {
            return Err(EngineError::InvalidApproval(format!(
                "Node \"{node_id}\" is not the node awaiting review"
            )));
        }

        let parked = target.output.clone().unwrap_or_else(|| serde_json::json!({}));
        let output = Self::narrow_output(&parked, selection)?;

        store.complete_node(run_id, node_id, &output, 0).await?;
        store.set_run_running(run_id).await?;
        tracing::info!(run_id, node_id, ?selection, "Gate approved");
        Ok(())
    }

    /// [`Runner::approve`], then hand the run back to the runner on a
    /// supervised background task.
    pub async fn approve_and_resume(
        self: Arc<Self>,
        run_id: DbId,
        node_id: &str,
        selection: Option<usize>,
    ) -> Result<(), EngineError> {
        self.approve(run_id, node_id, selection).await?;
        supervisor::spawn_run(self, run_id);
        Ok(())
    }

    /// Apply an optional selection index to a parked gate output.
    ///
    /// A `pick` gate parks `{"candidates": [...]}` and must resolve to
    /// the declared `image` port; other gates pass their output through.
    /// A selection on a non-batch output is an error rather than being
    /// silently ignored.
    fn narrow_output(parked: &Value, selection: Option<usize>) -> Result<Value, EngineError> {
        match parked.get("candidates").and_then(Value::as_array) {
            Some(candidates) => {
                let index = selection.unwrap_or(0);
                let chosen = candidates.get(index).ok_or_else(|| {
                    EngineError::InvalidApproval(format!(
                        "Selection {index} out of range ({} candidates)",
                        candidates.len()
                    ))
                })?;
                Ok(serde_json::json!({ "image": chosen }))
            }
            None => {
                if selection.is_some() {
                    return Err(EngineError::InvalidApproval(
                        "Selection only applies to batch outputs".into(),
                    ));
                }
                Ok(parked.clone())
            }
        }
    }

    // -----------------------------------------------------------------------
    // Cancellation
    // -----------------------------------------------------------------------

    /// Cancel a run and skip its open node results.
    ///
    /// Cooperative: a node call already in flight is not aborted, but the
    /// cancelled state is terminal and guarded, so that call's outcome
    /// cannot resurrect the run.
    pub async fn cancel(&self, run_id: DbId) -> Result<(), EngineError> {
        let store = &self.services.store;

        let cancelled = store.cancel_run(run_id).await?;
        if !cancelled {
            return Err(EngineError::RunTerminal(run_id));
        }

        let skipped = store.skip_open_nodes(run_id).await?;
        tracing::info!(run_id, skipped, "Run cancelled");
        Ok(())
    }
}
