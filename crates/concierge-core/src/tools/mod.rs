//! Model-callable tools.
//!
//! A [`Tool`] never fails across its boundary: whatever goes wrong is folded
//! into the JSON value handed back to the model so the conversation can go on.

pub mod lead;

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::llm::ToolDefinition;

pub use lead::{LeadNotification, LeadNotificationTool};

#[async_trait]
pub trait Tool: Send + Sync {
    fn definition(&self) -> ToolDefinition;

    /// Run the tool with the raw JSON arguments produced by the model.
    async fn call(&self, arguments: &str) -> Value;
}

/// Named catalogue of tools offered to the model.
#[derive(Clone, Default)]
pub struct ToolRegistry {
    tools: BTreeMap<String, Arc<dyn Tool>>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_list().entries(self.tools.keys()).finish()
    }
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.insert(tool.definition().name, tool);
        self
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    pub async fn invoke(&self, name: &str, arguments: &str) -> Value {
        let Some(tool) = self.tools.get(name) else {
            warn!(tool = name, "model requested an unknown tool");
            return json!({ "success": false, "message": format!("Unknown tool '{name}'.") });
        };
        info!(tool = name, "invoking tool");
        tool.call(arguments).await
    }
}
