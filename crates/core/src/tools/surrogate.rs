use super::{ToolError, ToolHandler};
use crate::{
    llm_client::{LLMAction, LLMClient},
    prompt::build_tool_surrogate_prompt,
    runtime::InvocationContext,
    scenario::ToolConfig,
};
use async_openai::types::ChatCompletionRequestUserMessageArgs;
use async_trait::async_trait;
use serde_json::Value;
use std::sync::Arc;
use tracing::info;

/// Stands in for tools that have no implementation by letting the model
/// simulate what the tool would have returned.
pub struct SurrogateToolHandler {
    client: Arc<dyn LLMClient>,
}

impl SurrogateToolHandler {
    pub fn new(client: Arc<dyn LLMClient>) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ToolHandler for SurrogateToolHandler {
    async fn call(
        &self,
        ctx: &InvocationContext,
        tool_name: &str,
        tool: &ToolConfig,
        args: Value,
    ) -> Result<String, ToolError> {
        info!(tool = tool_name, agent_id = %ctx.agent.id, "Synthesising tool result");
        let failed = |message: String| ToolError::Execution {
            name: tool_name.to_string(),
            message,
        };
        let prompt = build_tool_surrogate_prompt(
            &ctx.scenario,
            &ctx.agent.config,
            tool_name,
            tool,
            &args,
            &ctx.chat_history,
        );
        let request = ChatCompletionRequestUserMessageArgs::default()
            .content(format!("Return the result of calling {tool_name} now."))
            .build()
            .map_err(|e| failed(e.to_string()))?
            .into();

        match self.client.decide_action(prompt, vec![request], Vec::new()).await {
            Ok(LLMAction::TextResponse(text)) => Ok(text),
            Ok(LLMAction::ToolCall(_)) => Err(failed(
                "surrogate answered with a tool call instead of a result".to_string(),
            )),
            Err(e) => Err(failed(e.to_string())),
        }
    }
}
