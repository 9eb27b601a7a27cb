//! Image-to-video generation.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::nodes::NodeKind;
use atelier_core::normalize;

use crate::backends::run_media_task;
use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{config_str, input_str, NodeExecutor};

pub struct GenerateVideoExecutor;

#[async_trait]
impl NodeExecutor for GenerateVideoExecutor {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let kind = NodeKind::GenerateVideo;
        let model = config_str(kind, config, "model")?;
        let image = input_str(kind, inputs, "image")?;

        let mut params = serde_json::json!({
            "image": image,
            "duration_secs": config.get("duration_secs").cloned().unwrap_or(Value::from(5)),
        });
        if let Some(motion) = config.get("motion_prompt").and_then(Value::as_str) {
            params["motion_prompt"] = Value::from(motion);
        }

        let raw = run_media_task(services, ctx, model, "video", params).await?;
        let media = normalize::normalize(&raw);
        let Some(primary) = media.primary else {
            return Err(EngineError::EmptyOutput {
                model: model.to_string(),
            });
        };

        Ok(serde_json::json!({ "video": primary }))
    }
}
