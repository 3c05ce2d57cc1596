//! Tools discovered on the Cambrian MCP server

use super::{DynTool, ToolError, MCP_TOOL_PREFIX};
use crate::interceptors::is_valid_tool_name;
use crate::sources::mcp::{flatten_content, is_error_result};
use crate::sources::{McpClient, McpToolInfo, SourceError};
use async_trait::async_trait;
use serde_json::{json, Value};
use std::sync::Arc;

/// A remote MCP tool exposed to the model under a `cambrian_` name
pub struct McpTool {
    client: Arc<McpClient>,
    remote_name: String,
    local_name: String,
    description: String,
    input_schema: Value,
}

impl McpTool {
    pub fn new(client: Arc<McpClient>, info: McpToolInfo) -> Self {
        let description = info
            .description
            .filter(|d| !d.trim().is_empty())
            .unwrap_or_else(|| format!("Cambrian data tool {}", info.name));
        Self {
            client,
            local_name: local_name(&info.name),
            remote_name: info.name,
            description,
            input_schema: info.input_schema,
        }
    }

    pub fn remote_name(&self) -> &str {
        &self.remote_name
    }
}

/// Registry name for a remote tool
fn local_name(remote: &str) -> String {
    let cleaned: String = remote
        .chars()
        .map(|c| {
            if c.is_ascii_alphanumeric() {
                c.to_ascii_lowercase()
            } else {
                '_'
            }
        })
        .collect();
    format!("{}{}", MCP_TOOL_PREFIX, cleaned)
}

#[async_trait]
impl DynTool for McpTool {
    fn name(&self) -> &str {
        &self.local_name
    }

    fn description(&self) -> &str {
        &self.description
    }

    fn input_schema(&self) -> Value {
        self.input_schema.clone()
    }

    async fn call(&self, args: Value) -> Result<Value, ToolError> {
        let args = if args.is_null() { json!({}) } else { args };
        let result = self.client.call_tool(&self.remote_name, args).await?;
        let data = flatten_content(&result);

        if is_error_result(&result) {
            let message = match &data {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            return Err(ToolError::Execution(message));
        }

        Ok(json!({
            "status": "success",
            "source": "Cambrian",
            "tool": self.remote_name,
            "data": data,
        }))
    }
}

/// List the server's tools and wrap the ones with usable names
pub async fn discover_mcp_tools(
    client: Arc<McpClient>,
) -> Result<Vec<Arc<dyn DynTool>>, SourceError> {
    let infos = client.list_tools().await?;
    let mut tools: Vec<Arc<dyn DynTool>> = Vec::with_capacity(infos.len());

    for info in infos {
        let tool = McpTool::new(client.clone(), info);
        if !is_valid_tool_name(tool.name()) {
            tracing::warn!(tool = %tool.remote_name(), "Skipping MCP tool with unusable name");
            continue;
        }
        tools.push(Arc::new(tool));
    }

    tracing::info!(count = tools.len(), "Discovered Cambrian MCP tools");
    Ok(tools)
}
