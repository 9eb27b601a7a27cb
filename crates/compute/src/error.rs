/// Errors from the compute routing layer.
#[derive(Debug, thiserror::Error)]
pub enum ComputeError {
    /// The HTTP request itself failed (network, DNS, TLS, timeout).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// The pool API returned a non-2xx status code.
    #[error("Pool API error ({status}): {body}")]
    Api {
        /// HTTP status code.
        status: u16,
        /// Raw response body for debugging.
        body: String,
    },

    /// Both the dedicated and the serverless pool rejected the job.
    #[error("Both compute pools unavailable (dedicated: {dedicated}; serverless: {serverless})")]
    BackendUnavailable {
        dedicated: String,
        serverless: String,
    },

    /// The backend reported the job as failed.
    #[error("Job {job_id} failed on the backend: {message}")]
    JobFailed { job_id: String, message: String },

    /// Polling exhausted its attempt budget without a terminal state.
    #[error("Job {job_id} did not finish within {attempts} status polls")]
    JobTimeout { job_id: String, attempts: u32 },
}
