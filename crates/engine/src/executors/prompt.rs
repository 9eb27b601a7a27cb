//! Prompt node: emits its (template-resolved) text.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::nodes::NodeKind;

use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{config_str, NodeExecutor};

pub struct PromptExecutor;

#[async_trait]
impl NodeExecutor for PromptExecutor {
    async fn execute(
        &self,
        _services: &EngineServices,
        _ctx: &RunContext,
        config: &Value,
        _inputs: &Value,
    ) -> Result<Value, EngineError> {
        let text = config_str(NodeKind::Prompt, config, "text")?;
        Ok(serde_json::json!({ "text": text }))
    }
}
