//! Primary/fallback job submission across the two compute pools.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;

use crate::backend::{JobBackend, JobPoll, PoolKind};
use crate::error::ComputeError;
use crate::tracker::JobRouteTracker;

/// Default bound on a dedicated-pool submission. Generous enough to
/// absorb wake-up latency; hitting it is the de facto health check (no
/// separate probe call is made).
const DEFAULT_SUBMIT_TIMEOUT: Duration = Duration::from_secs(45);

/// Outcome of a routed submission.
#[derive(Debug, Clone)]
pub struct Submission {
    pub job_id: String,
    /// The pool that accepted the job.
    pub pool: PoolKind,
    pub used_fallback: bool,
    /// Why the dedicated attempt was abandoned, when it was.
    pub fallback_reason: Option<String>,
}

/// Routes job submissions: dedicated pool first, serverless on failure
/// or timeout, with the accepting pool recorded for later status polls.
pub struct JobRouter {
    dedicated: Arc<dyn JobBackend>,
    serverless: Arc<dyn JobBackend>,
    routes: Arc<JobRouteTracker>,
    submit_timeout: Duration,
}

impl JobRouter {
    pub fn new(
        dedicated: Arc<dyn JobBackend>,
        serverless: Arc<dyn JobBackend>,
        routes: Arc<JobRouteTracker>,
    ) -> Self {
        Self {
            dedicated,
            serverless,
            routes,
            submit_timeout: DEFAULT_SUBMIT_TIMEOUT,
        }
    }

    /// Override the dedicated submission timeout (tests use millisecond
    /// bounds).
    pub fn with_submit_timeout(mut self, timeout: Duration) -> Self {
        self.submit_timeout = timeout;
        self
    }

    /// Submit a job, preferring the dedicated pool.
    ///
    /// The identical payload is resubmitted to the serverless pool when
    /// the dedicated attempt errors or exceeds the submission timeout.
    pub async fn submit(&self, payload: &Value) -> Result<Submission, ComputeError> {
        let dedicated_failure =
            match tokio::time::timeout(self.submit_timeout, self.dedicated.submit(payload)).await {
                Ok(Ok(job_id)) => {
                    self.routes.record(&job_id, PoolKind::Dedicated);
                    tracing::debug!(job_id = %job_id, "Job accepted by dedicated pool");
                    return Ok(Submission {
                        job_id,
                        pool: PoolKind::Dedicated,
                        used_fallback: false,
                        fallback_reason: None,
                    });
                }
                Ok(Err(e)) => e.to_string(),
                Err(_) => format!(
                    "dedicated submission timed out after {}s",
                    self.submit_timeout.as_secs_f64()
                ),
            };

        tracing::warn!(
            reason = %dedicated_failure,
            "Dedicated pool unavailable, falling back to serverless",
        );

        match self.serverless.submit(payload).await {
            Ok(job_id) => {
                self.routes.record(&job_id, PoolKind::Serverless);
                tracing::info!(job_id = %job_id, "Job accepted by serverless pool (fallback)");
                Ok(Submission {
                    job_id,
                    pool: PoolKind::Serverless,
                    used_fallback: true,
                    fallback_reason: Some(dedicated_failure),
                })
            }
            Err(e) => Err(ComputeError::BackendUnavailable {
                dedicated: dedicated_failure,
                serverless: e.to_string(),
            }),
        }
    }

    /// Poll a job's status on the pool that accepted it.
    ///
    /// Unknown job ids (evicted or pre-restart) are asked of the
    /// serverless pool.
    pub async fn status(&self, job_id: &str) -> Result<JobPoll, ComputeError> {
        match self.routes.pool_for(job_id) {
            PoolKind::Dedicated => self.dedicated.status(job_id).await,
            PoolKind::Serverless => self.serverless.status(job_id).await,
        }
    }
}
