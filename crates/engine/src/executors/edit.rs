//! Instruction-driven single-image editing.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::nodes::NodeKind;
use atelier_core::normalize;

use crate::backends::run_media_task;
use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{config_str, input_str, NodeExecutor};

pub struct EditImageExecutor;

#[async_trait]
impl NodeExecutor for EditImageExecutor {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let kind = NodeKind::EditImage;
        let model = config_str(kind, config, "model")?;
        let instruction = config_str(kind, config, "instruction")?;
        let image = input_str(kind, inputs, "image")?;

        let params = serde_json::json!({
            "image": image,
            "instruction": instruction,
        });

        let raw = run_media_task(services, ctx, model, "edit", params).await?;
        let media = normalize::normalize(&raw);
        let Some(primary) = media.primary else {
            return Err(EngineError::EmptyOutput {
                model: model.to_string(),
            });
        };

        Ok(serde_json::json!({ "image": primary }))
    }
}
