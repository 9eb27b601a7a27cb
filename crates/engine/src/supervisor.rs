//! Supervised background execution of runs.
//!
//! Triggers and approvals hand runs to the runner fire-and-forget, but
//! never as unobserved dangling calls: every spawned run logs its own
//! outcome, and the join handle is returned for callers (mostly tests)
//! that want to await completion.

use std::sync::Arc;

use atelier_core::types::DbId;

use crate::runner::Runner;

/// Execute a run on its own Tokio task with outcome logging.
pub fn spawn_run(runner: Arc<Runner>, run_id: DbId) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        match runner.run_workflow(run_id).await {
            Ok(()) => {
                tracing::debug!(run_id, "Background run execution finished");
            }
            Err(e) => {
                // The runner already recorded the failure on the run;
                // this is the supervision channel for operators.
                tracing::error!(run_id, error = %e, "Background run execution failed");
            }
        }
    })
}
