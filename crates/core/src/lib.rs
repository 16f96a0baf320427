pub mod agent;
pub mod driver;
pub mod error;
pub mod history;
pub mod llm_client;
pub mod prompt;
pub mod reply;
pub mod runtime;
pub mod scenario;
pub mod selector;
pub mod speech;
pub mod tools;
pub mod transcript;

pub use driver::{
    ConversationDriver, ConversationReport, ConversationTurn, DriverOptions, DriverState,
    EndReason, TurnPolicy,
};
pub use error::ConversationError;
pub use reply::TERMINATION_MARKER;
pub use scenario::{Scenario, ScenarioError};
