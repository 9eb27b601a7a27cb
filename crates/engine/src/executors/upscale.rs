//! Image upscaling on the internal self-hosted worker.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::nodes::NodeKind;
use atelier_core::normalize;

use crate::backends::{run_media_task, UPSCALER_MODEL};
use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{input_str, NodeExecutor};

pub struct UpscaleImageExecutor;

#[async_trait]
impl NodeExecutor for UpscaleImageExecutor {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let image = input_str(NodeKind::UpscaleImage, inputs, "image")?;

        let params = serde_json::json!({
            "image": image,
            "factor": config.get("factor").cloned().unwrap_or(Value::from(2)),
        });

        let raw = run_media_task(services, ctx, UPSCALER_MODEL, "upscale", params).await?;
        let media = normalize::normalize(&raw);
        let Some(primary) = media.primary else {
            return Err(EngineError::EmptyOutput {
                model: UPSCALER_MODEL.to_string(),
            });
        };

        Ok(serde_json::json!({ "image": primary }))
    }
}
