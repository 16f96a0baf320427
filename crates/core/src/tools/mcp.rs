//! Tools reached through an MCP client connection.

use super::{ToolError, ToolHandler, ToolRegistry, local::McpClient};
use crate::{runtime::InvocationContext, scenario::ToolConfig};
use async_trait::async_trait;
use rmcp::model::{CallToolRequestParam, RawContent};
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Forwards calls to a tool served by an MCP server.
pub struct McpToolHandler {
    client: Arc<McpClient>,
}

impl McpToolHandler {
    pub fn new(client: Arc<McpClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for McpToolHandler {
    async fn call(
        &self,
        ctx: &InvocationContext,
        tool_name: &str,
        _tool: &ToolConfig,
        args: Value,
    ) -> Result<String, ToolError> {
        info!(tool = tool_name, agent_id = %ctx.agent.id, "Calling MCP tool");
        let failed = |message: String| ToolError::Execution {
            name: tool_name.to_string(),
            message,
        };
        let arguments = match args {
            Value::Object(map) => Some(map),
            Value::Null => None,
            other => return Err(failed(format!("arguments must be an object, got {other}"))),
        };
        let result = self
            .client
            .peer()
            .call_tool(CallToolRequestParam {
                name: tool_name.to_string().into(),
                arguments,
            })
            .await
            .map_err(|e| failed(e.to_string()))?;

        let annotated = result
            .content
            .and_then(|mut content| content.pop())
            .ok_or_else(|| failed("tool call returned no content".to_string()))?;
        match annotated.raw {
            RawContent::Text(text) => Ok(text.text),
            _ => Err(failed("unexpected content type from tool".to_string())),
        }
    }
}

/// Registers every tool the connected server lists. Returns how many were added.
pub async fn register_mcp_tools(
    registry: &mut ToolRegistry,
    client: Arc<McpClient>,
) -> anyhow::Result<usize> {
    let tools = client.list_all_tools().await?;
    let handler: Arc<dyn ToolHandler> = Arc::new(McpToolHandler::new(client.clone()));
    for tool in &tools {
        info!(tool = %tool.name, "Registering MCP tool");
        registry.register(tool.name.to_string(), handler.clone());
    }
    Ok(tools.len())
}
