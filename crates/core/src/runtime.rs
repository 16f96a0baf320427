//! Agent Invocation
//!
//! The driver hands every non-seeded turn to an [`AgentRuntime`]. The LLM-backed
//! implementation runs a bounded reason/act loop: the model may call tools for a
//! few rounds before it must answer in prose.

use crate::{
    agent::Agent,
    history::{HistoryMessage, Role},
    llm_client::{LLMAction, LLMClient, LLMStreamEvent, ToolCall},
    prompt::{build_main_prompt, finalization_reminder},
    reply::tool_marker,
    scenario::Scenario,
    tools::{ToolError, ToolRegistry},
};
use anyhow::{Context, Result};
use async_openai::types::{
    ChatCompletionRequestAssistantMessageArgs, ChatCompletionRequestMessage,
    ChatCompletionRequestToolMessageArgs, ChatCompletionRequestUserMessageArgs,
};
use async_trait::async_trait;
use futures::StreamExt;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Everything one agent invocation needs, passed explicitly per call.
#[derive(Debug, Clone)]
pub struct InvocationContext {
    pub scenario: Arc<Scenario>,
    pub agent: Arc<Agent>,
    /// The responding agent's own perspective of the conversation so far.
    pub chat_history: Vec<HistoryMessage>,
    /// The latest message addressed to the agent. Sent as the closing user
    /// message unless `chat_history` already ends with it.
    pub request: String,
    pub user_id: String,
    pub session_id: Uuid,
}

/// What an agent produced for one turn.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AgentReply {
    /// Full reply text, including any inline tool markers. `None` when the runtime
    /// produced no usable text.
    pub text: Option<String>,
    /// Tools flagged `endsConversation` that ran during this turn.
    pub ending_tools: Vec<String>,
}

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait AgentRuntime: Send + Sync {
    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentReply>;
}

/// Runs agents on an OpenAI-compatible chat model with tool execution.
pub struct LlmAgentRuntime {
    client: Arc<dyn LLMClient>,
    tools: Arc<ToolRegistry>,
    max_tool_rounds: usize,
}

impl LlmAgentRuntime {
    pub fn new(client: Arc<dyn LLMClient>, tools: Arc<ToolRegistry>, max_tool_rounds: usize) -> Self {
        Self {
            client,
            tools,
            max_tool_rounds,
        }
    }

    fn history_messages(ctx: &InvocationContext) -> Result<Vec<ChatCompletionRequestMessage>> {
        let mut messages = Vec::with_capacity(ctx.chat_history.len() + 1);
        for msg in &ctx.chat_history {
            messages.push(match msg.role {
                Role::User => ChatCompletionRequestUserMessageArgs::default()
                    .content(msg.text.clone())
                    .build()?
                    .into(),
                Role::Assistant => ChatCompletionRequestAssistantMessageArgs::default()
                    .content(msg.text.clone())
                    .build()?
                    .into(),
            });
        }
        let answered = ctx
            .chat_history
            .last()
            .is_some_and(|m| m.role == Role::User && m.text == ctx.request);
        if !ctx.request.is_empty() && !answered {
            messages.push(
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ctx.request.clone())
                    .build()?
                    .into(),
            );
        }
        Ok(messages)
    }

    /// Runs one tool call. Failures are reported to the model as a JSON error
    /// payload rather than aborting the turn.
    async fn execute(&self, ctx: &InvocationContext, call: &ToolCall) -> (String, bool) {
        let name = call.function.name.as_str();
        let outcome = async {
            let tool = ctx
                .agent
                .config
                .tool(name)
                .ok_or_else(|| ToolError::Unknown(name.to_string()))?;
            let args: Value = if call.function.arguments.trim().is_empty() {
                Value::Null
            } else {
                serde_json::from_str(&call.function.arguments).map_err(|e| ToolError::Execution {
                    name: name.to_string(),
                    message: format!("invalid arguments: {e}"),
                })?
            };
            let handler = self.tools.resolve(name, tool)?;
            let result = handler.call(ctx, name, tool, args).await?;
            Ok::<_, ToolError>((result, tool.ends_conversation))
        }
        .await;

        match outcome {
            Ok((mut result, ends)) => {
                if ends {
                    result.push_str(&finalization_reminder());
                }
                (result, ends)
            }
            Err(e) => {
                warn!(tool = name, agent_id = %ctx.agent.id, error = %e, "Tool call failed");
                (json!({ "error": e.to_string() }).to_string(), false)
            }
        }
    }
}

#[async_trait]
impl AgentRuntime for LlmAgentRuntime {
    async fn invoke(&self, ctx: InvocationContext) -> Result<AgentReply> {
        let system_prompt = build_main_prompt(&ctx.scenario, &ctx.agent);
        let definitions = self
            .tools
            .definitions(&ctx.agent)
            .context("Failed to build tool definitions")?;
        let mut messages = Self::history_messages(&ctx)?;
        let mut markers = String::new();
        let mut ending_tools = Vec::new();
        let mut answer = None;

        for round in 0..self.max_tool_rounds {
            let action = self
                .client
                .decide_action(system_prompt.clone(), messages.clone(), definitions.clone())
                .await
                .with_context(|| format!("Agent '{}' failed to decide", ctx.agent.id))?;
            let tool_calls = match action {
                LLMAction::TextResponse(text) => {
                    answer = Some(text);
                    break;
                }
                LLMAction::ToolCall(calls) => calls,
            };
            debug!(round, count = tool_calls.len(), agent_id = %ctx.agent.id, "Executing tool calls");

            let mut results = Vec::with_capacity(tool_calls.len());
            for call in &tool_calls {
                info!(tool = %call.function.name, agent_id = %ctx.agent.id, "Agent requested tool");
                let (result, ends) = self.execute(&ctx, call).await;
                markers.push_str(&tool_marker(&call.function.name));
                if ends {
                    ending_tools.push(call.function.name.clone());
                }
                results.push(result);
            }

            messages.push(
                ChatCompletionRequestAssistantMessageArgs::default()
                    .tool_calls(tool_calls.clone())
                    .build()?
                    .into(),
            );
            for (call, result) in tool_calls.iter().zip(results) {
                messages.push(
                    ChatCompletionRequestToolMessageArgs::default()
                        .tool_call_id(call.id.clone())
                        .content(result)
                        .build()?
                        .into(),
                );
            }
        }

        let answer = match answer {
            Some(text) => text,
            None => {
                let mut stream = self
                    .client
                    .stream_after_tools(system_prompt, messages)
                    .await
                    .with_context(|| format!("Agent '{}' failed to answer", ctx.agent.id))?;
                let mut text = String::new();
                while let Some(event) = stream.next().await {
                    let LLMStreamEvent::TextChunk(chunk) = event?;
                    text.push_str(&chunk);
                }
                text
            }
        };

        let text = if answer.trim().is_empty() {
            None
        } else {
            Some(format!("{markers}{answer}"))
        };
        Ok(AgentReply { text, ending_tools })
    }
}
