//! API Models
//!
//! Request and response bodies of the HTTP surface, annotated for the OpenAPI
//! document generated with `utoipa`.

use colloquy_core::transcript::{ScenarioInfo, TranscriptEvent, TranscriptEventKind};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum EntryKind {
    Message,
    Tool,
}

impl From<TranscriptEventKind> for EntryKind {
    fn from(kind: TranscriptEventKind) -> Self {
        match kind {
            TranscriptEventKind::Message => EntryKind::Message,
            TranscriptEventKind::Tool => EntryKind::Tool,
        }
    }
}

/// One line of the live transcript.
#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct TranscriptEntry {
    #[schema(example = "provider")]
    pub speaker: String,
    #[schema(example = "payer")]
    pub listener: String,
    #[serde(rename = "type")]
    pub kind: EntryKind,
    #[schema(example = "Running tool: lookup_medical_policy")]
    pub content: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub audio_url: Option<String>,
}

impl From<TranscriptEvent> for TranscriptEntry {
    fn from(event: TranscriptEvent) -> Self {
        Self {
            speaker: event.speaker,
            listener: event.listener,
            kind: event.kind.into(),
            content: event.content,
            audio_url: event.audio_url,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Default, PartialEq)]
pub struct ScenarioInfoResponse {
    #[schema(example = "Knee MRI Prior Authorization")]
    pub title: String,
    pub description: String,
}

impl From<ScenarioInfo> for ScenarioInfoResponse {
    fn from(info: ScenarioInfo) -> Self {
        Self {
            title: info.title,
            description: info.description,
        }
    }
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
pub struct PausePayload {
    pub paused: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
pub struct PauseState {
    pub paused: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, Copy, PartialEq)]
pub struct RunStatus {
    pub scenario_active: bool,
}

#[derive(Debug, Serialize, Deserialize, ToSchema, Clone, PartialEq)]
pub struct RunScenarioResponse {
    #[schema(value_type = String, format = Uuid)]
    pub session_id: Uuid,
    #[schema(example = "started")]
    pub status: String,
}

/// A scenario document, validated after parsing.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(transparent)]
#[schema(value_type = Object)]
pub struct ScenarioDocument(pub serde_json::Value);

#[derive(Serialize, ToSchema)]
pub struct ErrorResponse {
    pub message: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_transcript_entry_uses_type_key() {
        let entry: TranscriptEntry = TranscriptEvent::tool("provider", "payer", "lookup").into();
        let json = serde_json::to_value(&entry).unwrap();
        assert_eq!(json["type"], "tool");
        assert_eq!(json["content"], "Running tool: lookup");
        assert!(json.get("audio_url").is_none());
    }

    #[test]
    fn test_error_response_serialization() {
        let error = ErrorResponse {
            message: "A scenario is already running".to_string(),
        };
        let json = serde_json::to_string(&error).unwrap();
        assert_eq!(json, r#"{"message":"A scenario is already running"}"#);
    }

    #[test]
    fn test_pause_payload_requires_flag() {
        assert!(serde_json::from_str::<PausePayload>("{}").is_err());
        let payload: PausePayload = serde_json::from_str(r#"{"paused": true}"#).unwrap();
        assert!(payload.paused);
    }
}
