//! Gate executors: build the pass-through output the run pauses on.
//!
//! Gates never call a backend. Their output is persisted with the node in
//! `waiting_for_review`; the approval call completes the node (narrowing
//! a `pick` batch to the selected item) and resumes the run.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::error::CoreError;
use atelier_core::nodes::NodeKind;

use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::NodeExecutor;

/// Human review of a single piece of media; approval passes it through.
pub struct ReviewExecutor;

#[async_trait]
impl NodeExecutor for ReviewExecutor {
    async fn execute(
        &self,
        _services: &EngineServices,
        _ctx: &RunContext,
        _config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let media = inputs.get("media").cloned().ok_or_else(|| {
            EngineError::Core(CoreError::Validation(
                format!("{} node is missing input \"media\"", NodeKind::Review.as_str()),
            ))
        })?;
        Ok(serde_json::json!({ "media": media }))
    }
}

/// Human selection of one image out of a batch. While waiting, the
/// output holds the full candidate list; approval replaces it with the
/// chosen item under the declared `image` port.
pub struct PickExecutor;

#[async_trait]
impl NodeExecutor for PickExecutor {
    async fn execute(
        &self,
        _services: &EngineServices,
        _ctx: &RunContext,
        _config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let candidates = inputs.get("images").and_then(Value::as_array).ok_or_else(|| {
            EngineError::Core(CoreError::Validation(
                format!("{} node is missing input \"images\"", NodeKind::Pick.as_str()),
            ))
        })?;

        if candidates.is_empty() {
            return Err(EngineError::Core(CoreError::Validation(
                "pick node received an empty image batch".into(),
            )));
        }

        Ok(serde_json::json!({ "candidates": candidates }))
    }
}
