//! Transcript Board
//!
//! The hand-off point between the conversation driver and whatever displays it.
//! The driver publishes complete snapshots; readers only ever see the latest one.
//! The board also carries the cooperative pause flag the driver polls between turns.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::RwLock;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TranscriptEventKind {
    Message,
    Tool,
}

/// One line of the visible transcript.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TranscriptEvent {
    /// The agent that produced the turn.
    pub speaker: String,
    /// The agent the turn is addressed to.
    pub listener: String,
    #[serde(rename = "type")]
    pub kind: TranscriptEventKind,
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl TranscriptEvent {
    pub fn message(speaker: &str, listener: &str, content: impl Into<String>) -> Self {
        Self {
            speaker: speaker.to_string(),
            listener: listener.to_string(),
            kind: TranscriptEventKind::Message,
            content: content.into(),
            audio_url: None,
        }
    }

    pub fn tool(speaker: &str, listener: &str, tool_name: &str) -> Self {
        Self {
            speaker: speaker.to_string(),
            listener: listener.to_string(),
            kind: TranscriptEventKind::Tool,
            content: format!("Running tool: {tool_name}"),
            audio_url: None,
        }
    }
}

/// Title and description shown above the transcript.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScenarioInfo {
    pub title: String,
    pub description: String,
}

/// Receives transcript snapshots from the driver. Fire-and-forget.
#[async_trait]
pub trait TranscriptPublisher: Send + Sync {
    async fn publish(&self, events: Vec<TranscriptEvent>);
}

/// Answers whether the driver should hold before its next turn.
#[async_trait]
pub trait PauseGate: Send + Sync {
    async fn is_paused(&self) -> bool;
}

/// Shared, thread-safe store of the latest snapshot, scenario info and pause flag.
#[derive(Debug, Default)]
pub struct TranscriptBoard {
    events: RwLock<Vec<TranscriptEvent>>,
    info: RwLock<ScenarioInfo>,
    paused: AtomicBool,
}

impl TranscriptBoard {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn snapshot(&self) -> Vec<TranscriptEvent> {
        self.events.read().await.clone()
    }

    pub async fn info(&self) -> ScenarioInfo {
        self.info.read().await.clone()
    }

    pub async fn set_info(&self, info: ScenarioInfo) {
        *self.info.write().await = info;
    }

    /// Clears the transcript and pause flag ahead of a new run.
    pub async fn reset(&self, info: ScenarioInfo) {
        self.events.write().await.clear();
        self.set_info(info).await;
        self.paused.store(false, Ordering::SeqCst);
    }

    pub fn paused(&self) -> bool {
        self.paused.load(Ordering::SeqCst)
    }

    pub fn set_paused(&self, paused: bool) {
        self.paused.store(paused, Ordering::SeqCst);
    }
}

#[async_trait]
impl TranscriptPublisher for TranscriptBoard {
    async fn publish(&self, events: Vec<TranscriptEvent>) {
        *self.events.write().await = events;
    }
}

#[async_trait]
impl PauseGate for TranscriptBoard {
    async fn is_paused(&self) -> bool {
        self.paused()
    }
}
