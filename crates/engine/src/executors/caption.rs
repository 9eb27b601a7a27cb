//! Caption generation through the hosted gateway.

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::nodes::NodeKind;

use crate::backends::run_media_task;
use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

use super::{input_str, NodeExecutor};

/// The only caption model currently offered.
const CAPTION_MODEL: &str = "caption-v1";

pub struct CaptionExecutor;

#[async_trait]
impl NodeExecutor for CaptionExecutor {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError> {
        let media = input_str(NodeKind::Caption, inputs, "media")?;

        let params = serde_json::json!({
            "media": media,
            "style": config.get("style").cloned().unwrap_or(Value::from("engaging")),
        });

        let raw = run_media_task(services, ctx, CAPTION_MODEL, "caption", params).await?;
        let Some(text) = raw.get("text").and_then(Value::as_str) else {
            return Err(EngineError::EmptyOutput {
                model: CAPTION_MODEL.to_string(),
            });
        };

        Ok(serde_json::json!({ "text": text }))
    }
}
