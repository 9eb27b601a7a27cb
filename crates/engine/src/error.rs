use atelier_compute::ComputeError;
use atelier_core::error::CoreError;
use atelier_core::types::DbId;

use crate::hosted::HostedError;
use crate::store::StoreError;

/// Errors surfaced by the orchestration engine.
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// A domain-level error (validation, cycle, port mismatch, ...).
    #[error(transparent)]
    Core(#[from] CoreError),

    /// The persistence collaborator failed.
    #[error("Persistence error: {0}")]
    Store(#[from] StoreError),

    /// A self-hosted compute call failed (both pools down, job failed,
    /// or polling timed out).
    #[error(transparent)]
    Compute(#[from] ComputeError),

    /// A hosted API call failed after retries.
    #[error(transparent)]
    Hosted(#[from] HostedError),

    /// A backend answered, but nothing usable could be extracted from
    /// its payload.
    #[error("Backend {model} returned no usable output")]
    EmptyOutput { model: String },

    /// The tenant's balance did not cover a node's credit cost.
    #[error("Insufficient credits: node costs {needed}")]
    InsufficientCredits { needed: i64 },

    /// The run has already completed, failed or been cancelled.
    #[error("Run {0} is already in a terminal state")]
    RunTerminal(DbId),

    /// An approval call that does not match the paused state.
    #[error("Invalid approval: {0}")]
    InvalidApproval(String),
}
