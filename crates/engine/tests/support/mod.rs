//! Shared test fixtures: an in-memory orchestrator store and scripted
//! backends, wired into a full engine harness.
#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use serde_json::Value;

use atelier_compute::poll::PollConfig;
use atelier_compute::{ComputeError, JobBackend, JobPoll, JobRouter, JobRouteTracker, JobState};
use atelier_core::backoff::RetryPolicy;
use atelier_core::graph::{EdgeDef, NodeDef, Position};
use atelier_core::nodes::NodeKind;
use atelier_core::types::{DbId, Timestamp};
use atelier_db::models::agency::{Agency, ModelProfile};
use atelier_db::models::node_result::NodeResult;
use atelier_db::models::run::Run;
use atelier_db::models::status::{NodeResultStatus, RunStatus, WorkflowStatus};
use atelier_db::models::trigger::Trigger;
use atelier_db::models::workflow::Workflow;
use atelier_engine::hosted::{HostedError, HostedMediaApi, HostedRequest};
use atelier_engine::store::{OrchestratorStore, StoreError};
use atelier_engine::throttle::RequestThrottle;
use atelier_engine::{EngineServices, Runner};

// ---------------------------------------------------------------------------
// Graph builders
// ---------------------------------------------------------------------------

pub fn node(id: &str, kind: NodeKind, config: Value) -> NodeDef {
    NodeDef {
        id: id.into(),
        kind,
        config,
        position: Position::default(),
    }
}

pub fn edge(source: &str, source_port: &str, target: &str, target_port: &str) -> EdgeDef {
    EdgeDef {
        source: source.into(),
        source_port: source_port.into(),
        target: target.into(),
        target_port: target_port.into(),
    }
}

// ---------------------------------------------------------------------------
// In-memory store
// ---------------------------------------------------------------------------

#[derive(Default)]
struct State {
    agencies: HashMap<DbId, Agency>,
    profiles: HashMap<DbId, ModelProfile>,
    workflows: HashMap<DbId, Workflow>,
    runs: HashMap<DbId, Run>,
    results: HashMap<DbId, Vec<NodeResult>>,
    triggers: HashMap<DbId, Trigger>,
    next_id: DbId,
}

/// In-memory [`OrchestratorStore`] with the same transition guards as
/// the Postgres repositories (single mutex = every operation atomic).
#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

fn now() -> Timestamp {
    Utc::now()
}

impl MemoryStore {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn add_agency(&self, id: DbId, name: &str, credits: i64) {
        let mut state = self.state.lock().unwrap();
        state.agencies.insert(
            id,
            Agency {
                id,
                name: name.into(),
                credit_balance: credits,
                created_at: now(),
                updated_at: now(),
            },
        );
    }

    pub fn add_profile(&self, id: DbId, agency_id: DbId, name: &str) {
        let mut state = self.state.lock().unwrap();
        state.profiles.insert(
            id,
            ModelProfile {
                id,
                agency_id,
                name: name.into(),
                persona: Some("adventurous".into()),
                appearance: None,
                style: Some("film noir".into()),
                created_at: now(),
                updated_at: now(),
            },
        );
    }

    pub fn add_workflow(
        &self,
        id: DbId,
        agency_id: DbId,
        model_profile_id: Option<DbId>,
        status: WorkflowStatus,
        nodes: Vec<NodeDef>,
        edges: Vec<EdgeDef>,
    ) {
        let mut state = self.state.lock().unwrap();
        state.workflows.insert(
            id,
            Workflow {
                id,
                agency_id,
                model_profile_id,
                name: format!("workflow-{id}"),
                status_id: status.id(),
                nodes: sqlx::types::Json(nodes),
                edges: sqlx::types::Json(edges),
                created_at: now(),
                updated_at: now(),
            },
        );
    }

    pub fn add_trigger(&self, trigger: Trigger) {
        let mut state = self.state.lock().unwrap();
        state.triggers.insert(trigger.id, trigger);
    }

    /// Snapshot helpers for assertions.
    pub fn trigger(&self, id: DbId) -> Trigger {
        self.state.lock().unwrap().triggers[&id].clone()
    }

    pub fn all_runs(&self) -> Vec<Run> {
        let state = self.state.lock().unwrap();
        let mut runs: Vec<Run> = state.runs.values().cloned().collect();
        runs.sort_by_key(|r| r.id);
        runs
    }
}

fn not_found(entity: &'static str, id: DbId) -> StoreError {
    StoreError::NotFound { entity, id }
}

#[async_trait]
impl OrchestratorStore for MemoryStore {
    async fn workflow(&self, id: DbId) -> Result<Workflow, StoreError> {
        self.state
            .lock()
            .unwrap()
            .workflows
            .get(&id)
            .cloned()
            .ok_or(not_found("Workflow", id))
    }

    async fn agency(&self, id: DbId) -> Result<Agency, StoreError> {
        self.state
            .lock()
            .unwrap()
            .agencies
            .get(&id)
            .cloned()
            .ok_or(not_found("Agency", id))
    }

    async fn model_profile(&self, id: DbId) -> Result<ModelProfile, StoreError> {
        self.state
            .lock()
            .unwrap()
            .profiles
            .get(&id)
            .cloned()
            .ok_or(not_found("ModelProfile", id))
    }

    async fn run(&self, id: DbId) -> Result<Run, StoreError> {
        self.state
            .lock()
            .unwrap()
            .runs
            .get(&id)
            .cloned()
            .ok_or(not_found("Run", id))
    }

    async fn node_results(&self, run_id: DbId) -> Result<Vec<NodeResult>, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .results
            .get(&run_id)
            .cloned()
            .unwrap_or_default())
    }

    async fn create_run(
        &self,
        workflow: &Workflow,
        model_profile_id: DbId,
    ) -> Result<Run, StoreError> {
        let mut state = self.state.lock().unwrap();
        state.next_id += 1;
        let run_id = state.next_id;

        let run = Run {
            id: run_id,
            workflow_id: workflow.id,
            agency_id: workflow.agency_id,
            model_profile_id,
            status_id: RunStatus::Running.id(),
            credits_used: 0,
            error: None,
            failed_node_id: None,
            started_at: now(),
            completed_at: None,
            created_at: now(),
            updated_at: now(),
        };
        state.runs.insert(run_id, run.clone());

        let results = workflow
            .nodes
            .0
            .iter()
            .enumerate()
            .map(|(i, n)| NodeResult {
                id: run_id * 1_000 + i as DbId,
                run_id,
                node_id: n.id.clone(),
                status_id: NodeResultStatus::Pending.id(),
                output: None,
                error: None,
                credits_used: 0,
                created_at: now(),
                updated_at: now(),
            })
            .collect();
        state.results.insert(run_id, results);

        Ok(run)
    }

    async fn set_run_waiting(&self, run_id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            if run.status_id == RunStatus::Running.id() {
                run.status_id = RunStatus::WaitingForReview.id();
            }
        }
        Ok(())
    }

    async fn set_run_running(&self, run_id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            if run.status_id == RunStatus::WaitingForReview.id() {
                run.status_id = RunStatus::Running.id();
            }
        }
        Ok(())
    }

    async fn complete_run(&self, run_id: DbId) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            if run.status_id == RunStatus::Running.id() {
                run.status_id = RunStatus::Completed.id();
                run.completed_at = Some(now());
            }
        }
        Ok(())
    }

    async fn fail_run(
        &self,
        run_id: DbId,
        failed_node_id: Option<&str>,
        error: &str,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            if !atelier_core::lifecycle::run::is_terminal(run.status_id) {
                run.status_id = RunStatus::Failed.id();
                run.failed_node_id = failed_node_id.map(Into::into);
                run.error = Some(error.into());
                run.completed_at = Some(now());
            }
        }
        Ok(())
    }

    async fn cancel_run(&self, run_id: DbId) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            if !atelier_core::lifecycle::run::is_terminal(run.status_id) {
                run.status_id = RunStatus::Cancelled.id();
                run.completed_at = Some(now());
                return Ok(true);
            }
        }
        Ok(false)
    }

    async fn add_run_credits(&self, run_id: DbId, delta: i64) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(run) = state.runs.get_mut(&run_id) {
            run.credits_used += delta;
        }
        Ok(())
    }

    async fn mark_node_running(&self, run_id: DbId, node_id: &str) -> Result<(), StoreError> {
        self.update_result(run_id, node_id, |r| {
            if r.status_id == NodeResultStatus::Pending.id() {
                r.status_id = NodeResultStatus::Running.id();
            }
        })
    }

    async fn complete_node(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
        credits_used: i64,
    ) -> Result<(), StoreError> {
        self.update_result(run_id, node_id, |r| {
            if r.status_id == NodeResultStatus::Running.id()
                || r.status_id == NodeResultStatus::WaitingForReview.id()
            {
                r.status_id = NodeResultStatus::Completed.id();
                r.output = Some(output.clone());
                r.credits_used = credits_used;
            }
        })
    }

    async fn fail_node(
        &self,
        run_id: DbId,
        node_id: &str,
        error: &str,
    ) -> Result<(), StoreError> {
        self.update_result(run_id, node_id, |r| {
            if !atelier_core::lifecycle::node::is_terminal(r.status_id) {
                r.status_id = NodeResultStatus::Failed.id();
                r.error = Some(error.into());
            }
        })
    }

    async fn park_node_for_review(
        &self,
        run_id: DbId,
        node_id: &str,
        output: &Value,
    ) -> Result<(), StoreError> {
        self.update_result(run_id, node_id, |r| {
            if r.status_id == NodeResultStatus::Running.id() {
                r.status_id = NodeResultStatus::WaitingForReview.id();
                r.output = Some(output.clone());
            }
        })
    }

    async fn skip_open_nodes(&self, run_id: DbId) -> Result<u64, StoreError> {
        let mut state = self.state.lock().unwrap();
        let mut skipped = 0;
        if let Some(results) = state.results.get_mut(&run_id) {
            for r in results.iter_mut() {
                if !atelier_core::lifecycle::node::is_terminal(r.status_id) {
                    r.status_id = NodeResultStatus::Skipped.id();
                    skipped += 1;
                }
            }
        }
        Ok(skipped)
    }

    async fn debit_credits(&self, agency_id: DbId, amount: i64) -> Result<bool, StoreError> {
        let mut state = self.state.lock().unwrap();
        let agency = state
            .agencies
            .get_mut(&agency_id)
            .ok_or(not_found("Agency", agency_id))?;
        if agency.credit_balance >= amount {
            agency.credit_balance -= amount;
            Ok(true)
        } else {
            Ok(false)
        }
    }

    async fn credit_balance(&self, agency_id: DbId) -> Result<i64, StoreError> {
        Ok(self
            .state
            .lock()
            .unwrap()
            .agencies
            .get(&agency_id)
            .map(|a| a.credit_balance)
            .unwrap_or(0))
    }

    async fn active_run_count(&self, workflow_id: DbId) -> Result<i64, StoreError> {
        let state = self.state.lock().unwrap();
        Ok(state
            .runs
            .values()
            .filter(|r| {
                r.workflow_id == workflow_id
                    && !atelier_core::lifecycle::run::is_terminal(r.status_id)
            })
            .count() as i64)
    }

    async fn due_triggers(&self, now: Timestamp) -> Result<Vec<Trigger>, StoreError> {
        let state = self.state.lock().unwrap();
        let mut due: Vec<Trigger> = state
            .triggers
            .values()
            .filter(|t| {
                t.enabled
                    && t.trigger_type == "scheduled"
                    && t.next_trigger_at.is_some_and(|at| at <= now)
            })
            .cloned()
            .collect();
        due.sort_by_key(|t| t.id);
        Ok(due)
    }

    async fn record_trigger_decision(
        &self,
        trigger_id: DbId,
        next_trigger_at: Option<Timestamp>,
        fired_at: Option<Timestamp>,
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(trigger) = state.triggers.get_mut(&trigger_id) {
            trigger.next_trigger_at = next_trigger_at;
            if fired_at.is_some() {
                trigger.last_triggered_at = fired_at;
            }
        }
        Ok(())
    }
}

impl MemoryStore {
    fn update_result(
        &self,
        run_id: DbId,
        node_id: &str,
        apply: impl FnOnce(&mut NodeResult),
    ) -> Result<(), StoreError> {
        let mut state = self.state.lock().unwrap();
        if let Some(results) = state.results.get_mut(&run_id) {
            if let Some(result) = results.iter_mut().find(|r| r.node_id == node_id) {
                apply(result);
            }
        }
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Scripted backends
// ---------------------------------------------------------------------------

/// Self-hosted pool double: every submission is recorded and completes
/// on the first status poll with a task-appropriate payload.
#[derive(Default)]
pub struct FakeJobBackend {
    pub submissions: Mutex<Vec<Value>>,
}

#[async_trait]
impl JobBackend for FakeJobBackend {
    async fn submit(&self, payload: &Value) -> Result<String, ComputeError> {
        let mut submissions = self.submissions.lock().unwrap();
        submissions.push(payload.clone());
        Ok(format!("job-{}", submissions.len()))
    }

    async fn status(&self, job_id: &str) -> Result<JobPoll, ComputeError> {
        let index: usize = job_id
            .strip_prefix("job-")
            .and_then(|n| n.parse().ok())
            .unwrap_or(1);
        let task = {
            let submissions = self.submissions.lock().unwrap();
            submissions
                .get(index - 1)
                .and_then(|p| p.get("task"))
                .and_then(Value::as_str)
                .unwrap_or("image")
                .to_string()
        };

        let output = match task.as_str() {
            "image" => serde_json::json!([
                "https://cdn.example/gen-1.png",
                "https://cdn.example/gen-2.png"
            ]),
            "upscale" => serde_json::json!({"image": "https://cdn.example/upscaled.png"}),
            "video" => serde_json::json!({"image": "https://cdn.example/clip.mp4"}),
            _ => serde_json::json!([]),
        };

        Ok(JobPoll {
            state: JobState::Completed,
            output: Some(output),
            error: None,
        })
    }
}

impl FakeJobBackend {
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().unwrap().len()
    }

    pub fn submissions(&self) -> Vec<Value> {
        self.submissions.lock().unwrap().clone()
    }
}

/// Hosted gateway double: records requests, answers per task family.
#[derive(Default)]
pub struct FakeHosted {
    pub requests: Mutex<Vec<HostedRequest>>,
}

#[async_trait]
impl HostedMediaApi for FakeHosted {
    async fn run(&self, request: &HostedRequest) -> Result<Value, HostedError> {
        self.requests.lock().unwrap().push(request.clone());
        Ok(match request.task {
            "image" => serde_json::json!({"images": ["https://cdn.example/hosted-1.png"]}),
            "edit" => serde_json::json!({"image": "https://cdn.example/edited.png"}),
            "video" => serde_json::json!({"image": "https://cdn.example/hosted-clip.mp4"}),
            "caption" => serde_json::json!({"text": "Golden hour, every hour."}),
            _ => serde_json::json!({}),
        })
    }
}

impl FakeHosted {
    pub fn request_count(&self) -> usize {
        self.requests.lock().unwrap().len()
    }
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub runner: Arc<Runner>,
    pub pool: Arc<FakeJobBackend>,
    pub hosted: Arc<FakeHosted>,
}

/// Build a runner over the store with fast test timings and scripted
/// backends.
pub fn harness(store: Arc<MemoryStore>) -> Harness {
    let pool = Arc::new(FakeJobBackend::default());
    let hosted = Arc::new(FakeHosted::default());

    let router = Arc::new(
        JobRouter::new(
            Arc::clone(&pool) as Arc<dyn JobBackend>,
            Arc::clone(&pool) as Arc<dyn JobBackend>,
            Arc::new(JobRouteTracker::default()),
        )
        .with_submit_timeout(Duration::from_millis(200)),
    );

    let services = Arc::new(EngineServices {
        store: Arc::clone(&store) as Arc<dyn OrchestratorStore>,
        router,
        throttle: Arc::new(RequestThrottle::new(
            Duration::from_millis(1),
            Duration::from_secs(60),
        )),
        hosted: Arc::clone(&hosted) as Arc<dyn HostedMediaApi>,
        retry_policy: RetryPolicy {
            max_attempts: 2,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            multiplier: 2.0,
            jitter_fraction: 0.0,
        },
        poll: PollConfig {
            interval: Duration::from_millis(1),
            max_attempts: 10,
        },
    });

    Harness {
        store,
        runner: Arc::new(Runner::new(services)),
        pool,
        hosted,
    }
}

/// A fully seeded store: agency 1 ("Northlight", 100 credits), profile
/// 10 ("Lena"), and an active workflow 100 with the given graph.
pub fn seeded(nodes: Vec<NodeDef>, edges: Vec<EdgeDef>) -> Arc<MemoryStore> {
    let store = MemoryStore::new();
    store.add_agency(1, "Northlight", 100);
    store.add_profile(10, 1, "Lena");
    store.add_workflow(100, 1, Some(10), WorkflowStatus::Active, nodes, edges);
    store
}
