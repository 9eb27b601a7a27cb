use crate::types::DbId;

/// Domain-level errors shared across all crates.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    /// An entity lookup by id failed.
    #[error("{entity} with id {id} not found")]
    NotFound { entity: &'static str, id: DbId },

    /// Input failed a domain validation rule.
    #[error("Validation failed: {0}")]
    Validation(String),

    /// The workflow graph contains a cycle (topological sort incomplete).
    #[error("Workflow graph contains a cycle: {0}")]
    Cycle(String),

    /// An edge connects two ports whose types are incompatible.
    #[error("Incompatible ports: {0}")]
    PortIncompatibility(String),

    /// The request conflicts with current state.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// An unexpected internal failure.
    #[error("Internal error: {0}")]
    Internal(String),
}
