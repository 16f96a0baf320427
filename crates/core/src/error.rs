use crate::{driver::DriverState, scenario::ScenarioError};

/// Errors that halt a conversation run.
#[derive(Debug, thiserror::Error)]
pub enum ConversationError {
    /// The participants cannot form a two-party conversation. Raised before the first turn.
    #[error("Configuration error: {0}")]
    Config(String),
    #[error(transparent)]
    Scenario(#[from] ScenarioError),
    /// The agent runtime failed; nothing from the failed turn was committed.
    #[error("Agent '{agent_id}' failed to respond: {source}")]
    Invocation {
        agent_id: String,
        #[source]
        source: anyhow::Error,
    },
    #[error("Agent '{agent_id}' returned a reply without text")]
    MalformedReply { agent_id: String },
    #[error("Conversation cannot advance from state {0:?}")]
    NotRunnable(DriverState),
}
