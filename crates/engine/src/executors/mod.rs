//! Node executors and their static registry.
//!
//! One executor per [`NodeKind`], registered in a table built at startup.
//! The set is closed: the registry covers exactly the kinds of the sealed
//! enum, so lookup cannot fail at runtime. Executors receive the
//! template-resolved, default-filled config and the input map gathered
//! from upstream outputs, and return an output object keyed by the
//! node's declared output ports.

mod caption;
mod edit;
mod gates;
mod generate;
mod prompt;
mod upscale;
mod video;

use std::collections::HashMap;

use async_trait::async_trait;
use serde_json::Value;

use atelier_core::error::CoreError;
use atelier_core::nodes::NodeKind;

use crate::context::{EngineServices, RunContext};
use crate::error::EngineError;

/// Executes one kind of node.
#[async_trait]
pub trait NodeExecutor: Send + Sync {
    async fn execute(
        &self,
        services: &EngineServices,
        ctx: &RunContext,
        config: &Value,
        inputs: &Value,
    ) -> Result<Value, EngineError>;
}

/// The closed kind -> executor table.
pub struct ExecutorRegistry {
    table: HashMap<NodeKind, Box<dyn NodeExecutor>>,
}

impl ExecutorRegistry {
    pub fn new() -> Self {
        let mut table: HashMap<NodeKind, Box<dyn NodeExecutor>> = HashMap::new();
        table.insert(NodeKind::Prompt, Box::new(prompt::PromptExecutor));
        table.insert(NodeKind::GenerateImage, Box::new(generate::GenerateImageExecutor));
        table.insert(NodeKind::EditImage, Box::new(edit::EditImageExecutor));
        table.insert(NodeKind::UpscaleImage, Box::new(upscale::UpscaleImageExecutor));
        table.insert(NodeKind::GenerateVideo, Box::new(video::GenerateVideoExecutor));
        table.insert(NodeKind::Caption, Box::new(caption::CaptionExecutor));
        table.insert(NodeKind::Review, Box::new(gates::ReviewExecutor));
        table.insert(NodeKind::Pick, Box::new(gates::PickExecutor));
        Self { table }
    }

    /// Look up the executor for a kind. Total by construction.
    pub fn executor(&self, kind: NodeKind) -> &dyn NodeExecutor {
        self.table
            .get(&kind)
            .map(|b| b.as_ref())
            .expect("registry covers every NodeKind")
    }
}

impl Default for ExecutorRegistry {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Shared field helpers
// ---------------------------------------------------------------------------

/// Required string field from the resolved config.
fn config_str<'a>(kind: NodeKind, config: &'a Value, key: &str) -> Result<&'a str, EngineError> {
    config
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(kind, "config", key))
}

/// Required string value from the gathered inputs.
fn input_str<'a>(kind: NodeKind, inputs: &'a Value, port: &str) -> Result<&'a str, EngineError> {
    inputs
        .get(port)
        .and_then(Value::as_str)
        .ok_or_else(|| missing(kind, "input", port))
}

fn missing(kind: NodeKind, what: &str, name: &str) -> EngineError {
    EngineError::Core(CoreError::Validation(format!(
        "{} node is missing {what} \"{name}\"",
        kind.as_str()
    )))
}
