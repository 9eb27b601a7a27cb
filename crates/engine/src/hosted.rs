//! Client for hosted generation APIs (synchronous "run, get result").
//!
//! Hosted models (`flux-pro`, `flux-kontext`, `kling`, `caption-v1`) are
//! reached through a single provider gateway. Calls go through the
//! per-agency throttle and the retry wrapper; this client itself performs
//! exactly one HTTP request per invocation.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;

use crate::retry::{Classify, RetryClass};

/// Per-request timeout for hosted generation calls. Video generation is
/// the slow path and bounds this.
const REQUEST_TIMEOUT: Duration = Duration::from_secs(120);

/// A single hosted generation request.
#[derive(Debug, Clone)]
pub struct HostedRequest {
    /// Model identifier, e.g. `flux-pro`.
    pub model: String,
    /// Task family: `image`, `edit`, `video` or `caption`.
    pub task: &'static str,
    /// Task-specific parameters merged into the request body.
    pub params: Value,
}

/// Errors from hosted API calls.
#[derive(Debug, thiserror::Error)]
pub enum HostedError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The provider asked us to slow down.
    #[error("Hosted API rate limited (HTTP 429)")]
    RateLimited,

    /// The provider returned another non-2xx status.
    #[error("Hosted API error ({status}): {body}")]
    Api { status: u16, body: String },
}

impl Classify for HostedError {
    fn retry_class(&self) -> RetryClass {
        match self {
            HostedError::RateLimited => RetryClass::RateLimited,
            HostedError::Request(e) if e.is_timeout() || e.is_connect() => RetryClass::Transient,
            HostedError::Request(_) => RetryClass::Permanent,
            HostedError::Api { status, .. } if *status >= 500 => RetryClass::Transient,
            HostedError::Api { .. } => RetryClass::Permanent,
        }
    }
}

/// Narrow synchronous contract for hosted generation providers.
#[async_trait]
pub trait HostedMediaApi: Send + Sync {
    /// Run one generation request and return the provider's raw JSON
    /// response (shape-normalization happens in the executors).
    async fn run(&self, request: &HostedRequest) -> Result<Value, HostedError>;
}

/// HTTP implementation against the provider gateway.
pub struct HttpHostedApi {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
}

impl HttpHostedApi {
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
}

#[async_trait]
impl HostedMediaApi for HttpHostedApi {
    async fn run(&self, request: &HostedRequest) -> Result<Value, HostedError> {
        let mut body = serde_json::json!({ "model": request.model });
        if let (Some(body_map), Some(params)) = (body.as_object_mut(), request.params.as_object())
        {
            for (k, v) in params {
                body_map.insert(k.clone(), v.clone());
            }
        }

        let response = self
            .client
            .post(format!("{}/v1/{}", self.base_url, request.task))
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await?;

        let status = response.status();
        if status.as_u16() == 429 {
            return Err(HostedError::RateLimited);
        }
        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "<unreadable body>".to_string());
            return Err(HostedError::Api {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response.json().await?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_classifies_as_rate_limited() {
        assert_eq!(HostedError::RateLimited.retry_class(), RetryClass::RateLimited);
    }

    #[test]
    fn server_errors_are_transient() {
        let err = HostedError::Api {
            status: 503,
            body: "overloaded".into(),
        };
        assert_eq!(err.retry_class(), RetryClass::Transient);
    }

    #[test]
    fn client_errors_are_permanent() {
        let err = HostedError::Api {
            status: 422,
            body: "bad prompt".into(),
        };
        assert_eq!(err.retry_class(), RetryClass::Permanent);
    }
}
