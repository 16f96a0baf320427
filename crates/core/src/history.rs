//! Per-Perspective History Store
//!
//! Each agent owns an append-only log of the conversation as it sees it: what it
//! said itself is tagged `Assistant`, what it heard from the other party is tagged
//! `User`.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
        }
    }
}

/// One entry of an agent's log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryMessage {
    pub role: Role,
    pub text: String,
}

#[derive(Debug, Clone, Default)]
pub struct PerspectiveHistory {
    logs: HashMap<String, Vec<HistoryMessage>>,
}

impl PerspectiveHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a message `agent_id` produced itself.
    pub fn append_own(&mut self, agent_id: &str, text: impl Into<String>) {
        self.push(agent_id, Role::Assistant, text.into());
    }

    /// Records a message `agent_id` received from the other party.
    pub fn append_received(&mut self, agent_id: &str, text: impl Into<String>) {
        self.push(agent_id, Role::User, text.into());
    }

    /// Writes both sides of a turn: the speaker's own entry and the listener's
    /// received entry.
    pub fn commit_turn(
        &mut self,
        speaker_id: &str,
        listener_id: &str,
        own_text: impl Into<String>,
        received_text: impl Into<String>,
    ) {
        self.append_own(speaker_id, own_text);
        self.append_received(listener_id, received_text);
    }

    /// The ordered log for `agent_id`; empty when the agent has no entries yet.
    pub fn fetch(&self, agent_id: &str) -> &[HistoryMessage] {
        self.logs.get(agent_id).map(Vec::as_slice).unwrap_or_default()
    }

    fn push(&mut self, agent_id: &str, role: Role, text: String) {
        self.logs
            .entry(agent_id.to_string())
            .or_default()
            .push(HistoryMessage { role, text });
    }
}
