//! Agent Registry
//!
//! Holds the participants of a conversation. Agents are created once from the
//! scenario and shared by reference (`Arc`) with the selector and the driver.

use crate::scenario::{AgentConfig, Scenario, ToolConfig};
use std::sync::Arc;
use tracing::warn;

/// One participant in the two-party conversation.
#[derive(Debug, Clone, PartialEq)]
pub struct Agent {
    /// Unique identifier taken from the scenario's `agentId`.
    pub id: String,
    /// Human readable name, the principal's name when one is given.
    pub name: String,
    /// The static role configuration this agent was built from, shared with the scenario.
    pub config: Arc<AgentConfig>,
}

impl Agent {
    pub fn new(config: impl Into<Arc<AgentConfig>>) -> Self {
        let config = config.into();
        let name = config
            .principal
            .name
            .clone()
            .unwrap_or_else(|| config.agent_id.clone());
        Self {
            id: config.agent_id.clone(),
            name,
            config,
        }
    }

    /// The message used verbatim as this agent's first turn, if it opens the conversation.
    pub fn initiating_message(&self) -> Option<&str> {
        self.config.initiating_message()
    }

    /// Tools usable by this agent. Entries without a `toolName` are skipped.
    pub fn tools(&self) -> impl Iterator<Item = (&str, &ToolConfig)> {
        self.config.tools.iter().filter_map(|t| t.name().map(|n| (n, t)))
    }

    /// Names of the tools flagged as ending the conversation.
    pub fn ending_tools(&self) -> Vec<&str> {
        self.tools()
            .filter(|(_, t)| t.ends_conversation)
            .map(|(n, _)| n)
            .collect()
    }
}

/// Ordered set of the registered agents.
#[derive(Debug, Clone, Default)]
pub struct AgentRegistry {
    agents: Vec<Arc<Agent>>,
}

impl AgentRegistry {
    pub fn new(agents: Vec<Agent>) -> Self {
        Self {
            agents: agents.into_iter().map(Arc::new).collect(),
        }
    }

    /// Builds agents for every entry of the scenario, in file order.
    pub fn from_scenario(scenario: &Scenario) -> Self {
        let agents = scenario
            .agents
            .iter()
            .map(|config| {
                let skipped = config.tools.iter().filter(|t| t.name().is_none()).count();
                if skipped > 0 {
                    warn!(
                        agent_id = %config.agent_id,
                        skipped,
                        "Tool configuration without 'toolName', skipping it"
                    );
                }
                Agent::new(Arc::clone(config))
            })
            .collect();
        Self::new(agents)
    }

    pub fn agents(&self) -> &[Arc<Agent>] {
        &self.agents
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }

    pub fn get(&self, id: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.id == id)
    }

    /// The first agent that carries an opening message.
    pub fn initiator(&self) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.initiating_message().is_some())
    }

    /// The first registered agent that is not `id`.
    pub fn partner_of(&self, id: &str) -> Option<&Arc<Agent>> {
        self.agents.iter().find(|a| a.id != id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::tests::PRIOR_AUTH_SCENARIO;

    #[test]
    fn test_registry_from_scenario() {
        let scenario = Scenario::from_json(PRIOR_AUTH_SCENARIO).unwrap();
        let registry = AgentRegistry::from_scenario(&scenario);

        assert_eq!(registry.len(), 2);
        let provider = registry.get("provider").unwrap();
        assert_eq!(provider.name, "Springfield Ortho");
        assert_eq!(provider.tools().count(), 1);

        assert_eq!(registry.initiator().unwrap().id, "provider");
        assert_eq!(registry.partner_of("provider").unwrap().id, "payer");
        assert!(Arc::ptr_eq(&provider.config, &scenario.agents[0]));
        assert_eq!(registry.get("payer").unwrap().ending_tools(), vec!["approve_request"]);
    }

    #[test]
    fn test_agent_name_falls_back_to_id() {
        let agent = Agent::new(AgentConfig {
            agent_id: "anonymous".to_string(),
            ..Default::default()
        });
        assert_eq!(agent.name, "anonymous");
        assert!(agent.initiating_message().is_none());
    }
}
