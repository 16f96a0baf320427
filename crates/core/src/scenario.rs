//! Scenario Model
//!
//! A scenario file describes the two parties of a simulated conversation: who they
//! act for, what they know, which tools they may call and which of them opens the
//! exchange. The JSON layout uses camelCase keys, as written by the scenario editor.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Errors raised while loading or validating a scenario.
#[derive(Debug, thiserror::Error)]
pub enum ScenarioError {
    #[error("Failed to read scenario file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Failed to parse scenario JSON: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Invalid scenario: {0}")]
    Invalid(String),
}

/// Descriptive header of a scenario.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ScenarioMetadata {
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub background: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// The person or organisation an agent acts on behalf of.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Principal {
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
}

/// Static configuration for one tool an agent may invoke.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ToolConfig {
    #[serde(default)]
    pub tool_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub input_schema: Option<Value>,
    #[serde(default)]
    pub synthesis_guidance: Option<String>,
    /// Invoking this tool means the agent is about to close the conversation.
    #[serde(default)]
    pub ends_conversation: bool,
    #[serde(default)]
    pub mcp_server: Option<String>,
}

impl ToolConfig {
    pub fn name(&self) -> Option<&str> {
        self.tool_name.as_deref()
    }
}

/// Static configuration of one participant.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentConfig {
    pub agent_id: String,
    #[serde(default)]
    pub principal: Principal,
    #[serde(default)]
    pub situation: Option<String>,
    #[serde(default)]
    pub system_prompt: Option<String>,
    #[serde(default)]
    pub goals: Vec<String>,
    #[serde(default)]
    pub tools: Vec<ToolConfig>,
    #[serde(default)]
    pub knowledge_base: Option<Value>,
    #[serde(default)]
    pub message_to_use_when_initiating_conversation: Option<String>,
}

impl AgentConfig {
    pub fn initiating_message(&self) -> Option<&str> {
        self.message_to_use_when_initiating_conversation.as_deref()
    }

    /// Looks up a tool by name among this agent's tools.
    pub fn tool(&self, name: &str) -> Option<&ToolConfig> {
        self.tools.iter().find(|t| t.name() == Some(name))
    }
}

/// A complete scenario: metadata plus the participating agents.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Scenario {
    #[serde(default, alias = "scenario")]
    pub metadata: ScenarioMetadata,
    #[serde(default)]
    pub agents: Vec<Arc<AgentConfig>>,
    #[serde(default)]
    pub knowledge_base: Option<Value>,
}

impl Scenario {
    /// Parses a scenario from a JSON string.
    pub fn from_json(json: &str) -> Result<Self, ScenarioError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a scenario file.
    pub fn from_path(path: &Path) -> Result<Self, ScenarioError> {
        let json = std::fs::read_to_string(path).map_err(|source| ScenarioError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    /// Checks the scenario can seed a two-party conversation.
    pub fn validate(&self) -> Result<(), ScenarioError> {
        if self.agents.len() != 2 {
            return Err(ScenarioError::Invalid(format!(
                "Scenario must have exactly 2 agents, found {}",
                self.agents.len()
            )));
        }
        let mut seen = HashSet::new();
        for agent in &self.agents {
            if agent.agent_id.trim().is_empty() {
                return Err(ScenarioError::Invalid("Agent with empty agentId".to_string()));
            }
            if !seen.insert(agent.agent_id.as_str()) {
                return Err(ScenarioError::Invalid(format!(
                    "Duplicate agentId '{}'",
                    agent.agent_id
                )));
            }
        }
        if self.initiating_agent().is_none() {
            return Err(ScenarioError::Invalid(
                "At least one agent must have 'messageToUseWhenInitiatingConversation'"
                    .to_string(),
            ));
        }
        Ok(())
    }

    /// The first agent carrying an opening message.
    pub fn initiating_agent(&self) -> Option<&AgentConfig> {
        self.agents
            .iter()
            .find(|a| a.message_to_use_when_initiating_conversation.is_some())
            .map(Arc::as_ref)
    }

    pub fn title(&self) -> &str {
        self.metadata
            .title
            .as_deref()
            .or(self.metadata.id.as_deref())
            .unwrap_or("Chat Scenario")
    }

    pub fn description(&self) -> &str {
        self.metadata.description.as_deref().unwrap_or_default()
    }
}

/// Resolves a scenario name given on the command line to a file under `dir`.
pub fn resolve_scenario_path(dir: &Path, name: &str) -> PathBuf {
    let path = dir.join(name);
    if path.extension().and_then(|e| e.to_str()) == Some("json") {
        path
    } else {
        dir.join(format!("{name}.json"))
    }
}
