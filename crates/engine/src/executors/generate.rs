//! Image generation: dispatches on the `model` config field to a
//! self-hosted pool or the hosted gateway.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::error::CoreError;
use atelier_core::nodes::NodeKind;
use atelier_core::normalize;

use crate::backends::run_media_task;
use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{config_str, NodeExecutor};

pub struct GenerateImageExecutor;

#[async_trait]
impl NodeExecutor for GenerateImageExecutor {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let model = config_str(NodeKind::GenerateImage, config, "model")?;

        // An upstream prompt input wins over the inline config prompt.
        let prompt = inputs
            .get("prompt")
            .and_then(Value::as_str)
            .or_else(|| config.get("prompt").and_then(Value::as_str))
            .ok_or_else(|| {
                EngineError::Core(CoreError::Validation(
                    "generate_image needs a prompt (wired input or config field)".into(),
                ))
            })?;

        let params = serde_json::json!({
            "prompt": prompt,
            "width": config.get("width").cloned().unwrap_or(Value::from(1024)),
            "height": config.get("height").cloned().unwrap_or(Value::from(1024)),
            "batch_size": config.get("batch_size").cloned().unwrap_or(Value::from(1)),
        });

        let raw = run_media_task(services, ctx, model, "image", params).await?;
        let media = normalize::normalize(&raw);
        if media.is_empty() {
            return Err(EngineError::EmptyOutput {
                model: model.to_string(),
            });
        }

        Ok(serde_json::json!({ "images": media.all }))
    }
}
