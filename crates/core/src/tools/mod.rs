//! Tool Registry
//!
//! An ordered, explicitly populated mapping from tool name to handler. Tools that
//! nothing registered fall back to the surrogate handler, which asks the model to
//! synthesise a plausible result.

pub mod local;
pub mod mcp;
pub mod surrogate;

use crate::{agent::Agent, runtime::InvocationContext, scenario::ToolConfig};
use anyhow::Result;
use async_openai::types::{ChatCompletionTool, ChatCompletionToolArgs, FunctionObjectArgs};
use async_trait::async_trait;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::warn;

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Unknown tool '{0}'")]
    Unknown(String),
    #[error("Tool '{name}' failed: {message}")]
    Execution { name: String, message: String },
}

/// Executes one tool call on behalf of the agent described by `ctx`.
#[async_trait]
pub trait ToolHandler: Send + Sync {
    async fn call(
        &self,
        ctx: &InvocationContext,
        tool_name: &str,
        tool: &ToolConfig,
        args: Value,
    ) -> Result<String, ToolError>;
}

#[derive(Default, Clone)]
pub struct ToolRegistry {
    handlers: Vec<(String, Arc<dyn ToolHandler>)>,
    fallback: Option<Arc<dyn ToolHandler>>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `handler` under `name`, replacing an earlier registration in place.
    pub fn register(&mut self, name: impl Into<String>, handler: Arc<dyn ToolHandler>) {
        let name = name.into();
        match self.handlers.iter_mut().find(|(n, _)| *n == name) {
            Some(entry) => entry.1 = handler,
            None => self.handlers.push((name, handler)),
        }
    }

    /// Handler used for tools without a registration.
    pub fn set_fallback(&mut self, handler: Arc<dyn ToolHandler>) {
        self.fallback = Some(handler);
    }

    pub fn get(&self, name: &str) -> Option<&Arc<dyn ToolHandler>> {
        self.handlers.iter().find(|(n, _)| n == name).map(|(_, h)| h)
    }

    /// Registered names in registration order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.handlers.iter().map(|(n, _)| n.as_str())
    }

    /// Picks the handler for a tool the agent is configured with.
    pub fn resolve(&self, name: &str, tool: &ToolConfig) -> Result<Arc<dyn ToolHandler>, ToolError> {
        if let Some(handler) = self.get(name) {
            return Ok(handler.clone());
        }
        if let Some(server) = &tool.mcp_server {
            warn!(tool = name, server = %server, "Remote MCP servers are not dialled; using the surrogate");
        }
        self.fallback
            .clone()
            .ok_or_else(|| ToolError::Unknown(name.to_string()))
    }

    /// Function definitions for every named tool of `agent`, in scenario order.
    pub fn definitions(&self, agent: &Agent) -> Result<Vec<ChatCompletionTool>> {
        agent
            .tools()
            .map(|(name, tool)| {
                let parameters = tool
                    .input_schema
                    .clone()
                    .unwrap_or_else(|| json!({"type": "object", "properties": {}}));
                Ok(ChatCompletionToolArgs::default()
                    .function(
                        FunctionObjectArgs::default()
                            .name(name)
                            .description(tool.description.clone().unwrap_or_default())
                            .parameters(parameters)
                            .build()?,
                    )
                    .build()?)
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::{AgentConfig, Scenario};
    use uuid::Uuid;

    struct Fixed(&'static str);

    #[async_trait]
    impl ToolHandler for Fixed {
        async fn call(
            &self,
            _ctx: &InvocationContext,
            _tool_name: &str,
            _tool: &ToolConfig,
            _args: Value,
        ) -> Result<String, ToolError> {
            Ok(self.0.to_string())
        }
    }

    fn context() -> InvocationContext {
        InvocationContext {
            scenario: Arc::new(Scenario::default()),
            agent: Arc::new(Agent::new(AgentConfig {
                agent_id: "payer".to_string(),
                ..Default::default()
            })),
            chat_history: Vec::new(),
            request: String::new(),
            user_id: "tester".to_string(),
            session_id: Uuid::new_v4(),
        }
    }

    #[tokio::test]
    async fn test_resolve_prefers_registration_over_fallback() {
        let mut registry = ToolRegistry::new();
        registry.register("lookup", Arc::new(Fixed("registered")));
        registry.set_fallback(Arc::new(Fixed("surrogate")));

        let ctx = context();
        let tool = ToolConfig::default();
        let registered = registry.resolve("lookup", &tool).unwrap();
        let fallback = registry.resolve("other", &tool).unwrap();
        assert_eq!(
            registered.call(&ctx, "lookup", &tool, Value::Null).await.unwrap(),
            "registered"
        );
        assert_eq!(
            fallback.call(&ctx, "other", &tool, Value::Null).await.unwrap(),
            "surrogate"
        );
    }

    #[test]
    fn test_resolve_without_fallback_is_unknown() {
        let registry = ToolRegistry::new();
        let err = registry.resolve("missing", &ToolConfig::default()).err().unwrap();
        assert!(matches!(err, ToolError::Unknown(name) if name == "missing"));
    }

    #[test]
    fn test_register_keeps_order_and_replaces() {
        let mut registry = ToolRegistry::new();
        registry.register("b", Arc::new(Fixed("1")));
        registry.register("a", Arc::new(Fixed("2")));
        registry.register("b", Arc::new(Fixed("3")));
        assert_eq!(registry.names().collect::<Vec<_>>(), vec!["b", "a"]);
    }

    #[test]
    fn test_definitions_skip_unnamed_tools() {
        let scenario =
            Scenario::from_json(crate::scenario::tests::PRIOR_AUTH_SCENARIO).unwrap();
        let agent = Agent::new(scenario.agents[0].clone());
        let definitions = ToolRegistry::new().definitions(&agent).unwrap();
        assert_eq!(definitions.len(), 1);
        assert_eq!(definitions[0].function.name, "search_ehr_clinical_notes");
        assert_eq!(
            definitions[0].function.parameters,
            Some(json!({"type": "object", "properties": {}}))
        );
    }
}
