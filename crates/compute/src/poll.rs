//! Bounded fixed-interval polling of a submitted job.

use std::time::Duration;

use serde_json::Value;

use crate::backend::JobState;
use crate::error::ComputeError;
use crate::router::JobRouter;

/// Polling cadence and budget for job completion.
#[derive(Debug, Clone)]
pub struct PollConfig {
    /// Delay between consecutive status polls.
    pub interval: Duration,
    /// Maximum number of polls before giving up with a timeout.
    pub max_attempts: u32,
}

impl Default for PollConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(2),
            // 2s * 150 = five minutes of generation time.
            max_attempts: 150,
        }
    }
}

/// Poll a job until it reaches a terminal state.
///
/// Returns the completion payload on success, [`ComputeError::JobFailed`]
/// when the backend reports failure, and [`ComputeError::JobTimeout`]
/// when the attempt budget runs out. Transport errors on individual
/// polls propagate immediately; transient-retry policy belongs to the
/// layers below the router, not here.
pub async fn poll_job(
    router: &JobRouter,
    job_id: &str,
    config: &PollConfig,
) -> Result<Value, ComputeError> {
    for attempt in 1..=config.max_attempts {
        let poll = router.status(job_id).await?;

        match poll.state {
            JobState::Completed => {
                tracing::debug!(job_id, attempt, "Job completed");
                return Ok(poll.output.unwrap_or(Value::Null));
            }
            JobState::Failed => {
                return Err(ComputeError::JobFailed {
                    job_id: job_id.to_string(),
                    message: poll.error.unwrap_or_else(|| "unknown backend failure".into()),
                });
            }
            JobState::Queued | JobState::Running => {
                tokio::time::sleep(config.interval).await;
            }
        }
    }

    Err(ComputeError::JobTimeout {
        job_id: job_id.to_string(),
        attempts: config.max_attempts,
    })
}
