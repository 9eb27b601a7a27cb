//! HTTP client for a single compute pool.
//!
//! Both pool flavours speak the same API: `POST {base}/run` queues a job
//! and returns its id, `GET {base}/status/{id}` reports progress and, on
//! completion, the output payload. Requests authenticate with a bearer
//! token and carry an explicit timeout.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;

use crate::backend::{JobBackend, JobPoll, JobState};
use crate::error::ComputeError;

/// Per-request HTTP timeout for status polls. Submissions use the
/// router's own bounded timeout on top of this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// HTTP client for one compute pool endpoint.
pub struct HttpPool {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

/// Response returned by the pool's `/run` endpoint.
#[derive(Debug, Deserialize)]
struct SubmitResponse {
    id: String,
}

/// Response returned by the pool's `/status/{id}` endpoint.
#[derive(Debug, Deserialize)]
struct StatusResponse {
    status: String,
    #[serde(default)]
    output: Option<Value>,
    #[serde(default)]
    error: Option<String>,
}

impl HttpPool {
    /// Create a pool client.
    ///
    /// * `base_url` - e.g. `https://pool.example.com/v2/abc123`.
    pub fn new(base_url: String, api_key: String) -> Self {
        let client = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .expect("Failed to build reqwest HTTP client");
        Self {
            client,
            base_url,
            api_key,
        }
    }

    /// Map the pool's status string onto [`JobState`]. Unknown strings
    /// are treated as still queued so polling keeps going until its own
    /// attempt budget runs out.
    fn parse_state(status: &str) -> JobState {
        match status {
            "COMPLETED" => JobState::Completed,
            "FAILED" | "CANCELLED" | "TIMED_OUT" => JobState::Failed,
            "IN_PROGRESS" => JobState::Running,
            _ => JobState::Queued,
        }
    }

    /// Ensure a success status; on failure capture the body for the error.
    async fn ensure_success(
        response: reqwest::Response,
    ) -> Result<reqwest::Response, ComputeError> {
        let status = response.status();
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(ComputeError::Api {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }
}

#[async_trait]
impl JobBackend for HttpPool {
    async fn submit(&self, payload: &Value) -> Result<String, ComputeError> {
        let body = serde_json::json!({
            "input": payload,
            "client_ref": uuid::Uuid::new_v4().to_string(),
        });

        let response = self
            .client
            .post(format!("{}/run", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let submit: SubmitResponse = response.json().await?;
        Ok(submit.id)
    }

    async fn status(&self, job_id: &str) -> Result<JobPoll, ComputeError> {
        let response = self
            .client
            .get(format!("{}/status/{}", self.base_url, job_id))
            .bearer_auth(&self.api_key)
            .send()
            .await?;

        let response = Self::ensure_success(response).await?;
        let status: StatusResponse = response.json().await?;

        Ok(JobPoll {
            state: Self::parse_state(&status.status),
            output: status.output,
            error: status.error,
        })
    }
}
