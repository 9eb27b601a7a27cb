//! The narrow contract a compute pool must satisfy.

use async_trait::async_trait;
use serde_json::Value;

use crate::error::ComputeError;

/// Which pool a job was (or would be) routed to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PoolKind {
    /// Warm shared capacity, tried first.
    Dedicated,
    /// Always-available pay-per-use capacity, the fallback.
    Serverless,
}

impl PoolKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            PoolKind::Dedicated => "dedicated",
            PoolKind::Serverless => "serverless",
        }
    }
}

impl std::fmt::Display for PoolKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Coarse job state as reported by a pool.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum JobState {
    Queued,
    Running,
    Completed,
    Failed,
}

impl JobState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, JobState::Completed | JobState::Failed)
    }
}

/// One status poll's worth of information about a job.
#[derive(Debug, Clone)]
pub struct JobPoll {
    pub state: JobState,
    /// Completion payload; only meaningful when `state` is `Completed`.
    pub output: Option<Value>,
    /// Failure message; only meaningful when `state` is `Failed`.
    pub error: Option<String>,
}

/// Asynchronous "submit, poll by job id until terminal" contract.
///
/// Implementations must not retry internally; retry and fallback policy
/// belong to the [`JobRouter`](crate::router::JobRouter) above them.
#[async_trait]
pub trait JobBackend: Send + Sync {
    /// Submit a job payload; returns the backend-assigned job id.
    async fn submit(&self, payload: &Value) -> Result<String, ComputeError>;

    /// Poll the current state of a previously submitted job.
    async fn status(&self, job_id: &str) -> Result<JobPoll, ComputeError>;
}
