//! Turn Selector
//!
//! A two-state alternator. The cursor remembers the agent that spoke last; the next
//! speaker is always the other one. `peek_next` only reads the cursor, `advance` is
//! the single mutator.

use crate::agent::{Agent, AgentRegistry};
use std::sync::Arc;

#[derive(Debug, Clone)]
pub struct TurnSelector {
    agents: Vec<Arc<Agent>>,
    last_agent_id: String,
}

impl TurnSelector {
    /// Creates a selector whose cursor starts on `initiating_agent_id`.
    ///
    /// The cursor means "last speaker", so the partner of `initiating_agent_id`
    /// is the first agent returned.
    pub fn new(registry: &AgentRegistry, initiating_agent_id: impl Into<String>) -> Self {
        Self {
            agents: registry.agents().to_vec(),
            last_agent_id: initiating_agent_id.into(),
        }
    }

    pub fn last_agent_id(&self) -> &str {
        &self.last_agent_id
    }

    /// Returns the agent that would act next without moving the cursor.
    ///
    /// With anything other than exactly two agents this degrades to the first
    /// registered agent (or `None`) instead of failing.
    pub fn peek_next(&self) -> Option<&Arc<Agent>> {
        if self.agents.len() != 2 {
            return self.agents.first();
        }
        self.agents
            .iter()
            .find(|a| a.id != self.last_agent_id)
            .or_else(|| self.agents.first())
    }

    /// The agent that is not `id`, when exactly two agents are registered.
    pub fn other(&self, id: &str) -> Option<&Arc<Agent>> {
        if self.agents.len() != 2 {
            return None;
        }
        self.agents.iter().find(|a| a.id != id)
    }

    /// Commits the peeked agent as the last speaker and returns it.
    pub fn advance(&mut self) -> Option<Arc<Agent>> {
        let next = self.peek_next().cloned()?;
        self.last_agent_id = next.id.clone();
        Some(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scenario::AgentConfig;

    fn agent(id: &str) -> Agent {
        Agent::new(AgentConfig {
            agent_id: id.to_string(),
            ..Default::default()
        })
    }

    fn pair() -> AgentRegistry {
        AgentRegistry::new(vec![agent("alice"), agent("bob")])
    }

    #[test]
    fn test_first_pick_is_partner_of_cursor() {
        let selector = TurnSelector::new(&pair(), "alice");
        assert_eq!(selector.peek_next().unwrap().id, "bob");
    }

    #[test]
    fn test_advance_strictly_alternates() {
        let mut selector = TurnSelector::new(&pair(), "alice");
        let ids: Vec<String> = (0..7)
            .map(|_| selector.advance().unwrap().id.clone())
            .collect();
        assert_eq!(ids, ["bob", "alice", "bob", "alice", "bob", "alice", "bob"]);
        assert!(ids.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_peek_is_idempotent() {
        let selector = TurnSelector::new(&pair(), "bob");
        for _ in 0..5 {
            assert_eq!(selector.peek_next().unwrap().id, "alice");
        }
        assert_eq!(selector.last_agent_id(), "bob");
    }

    #[test]
    fn test_interleaved_peeks_do_not_break_alternation() {
        let mut selector = TurnSelector::new(&pair(), "alice");
        let mut seen = Vec::new();
        for round in 0..6 {
            for _ in 0..round {
                selector.peek_next();
            }
            let peeked = selector.peek_next().unwrap().id.clone();
            let advanced = selector.advance().unwrap().id.clone();
            assert_eq!(peeked, advanced);
            seen.push(advanced);
        }
        assert!(seen.windows(2).all(|w| w[0] != w[1]));
    }

    #[test]
    fn test_unknown_cursor_picks_first_non_matching() {
        let mut selector = TurnSelector::new(&pair(), "nobody");
        assert_eq!(selector.advance().unwrap().id, "alice");
        assert_eq!(selector.advance().unwrap().id, "bob");
    }

    #[test]
    fn test_degenerate_registries_fall_back() {
        let empty = TurnSelector::new(&AgentRegistry::default(), "alice");
        assert!(empty.peek_next().is_none());

        let mut single = TurnSelector::new(&AgentRegistry::new(vec![agent("solo")]), "solo");
        assert_eq!(single.advance().unwrap().id, "solo");
        assert_eq!(single.advance().unwrap().id, "solo");

        let triple = AgentRegistry::new(vec![agent("a"), agent("b"), agent("c")]);
        let selector = TurnSelector::new(&triple, "a");
        assert_eq!(selector.peek_next().unwrap().id, "a");
        assert!(selector.other("a").is_none());
    }

    #[test]
    fn test_other() {
        let selector = TurnSelector::new(&pair(), "alice");
        assert_eq!(selector.other("alice").unwrap().id, "bob");
        assert_eq!(selector.other("bob").unwrap().id, "alice");
    }
}
