//! Axum Handlers
//!
//! Transcript polling, scenario info, pause control and scenario launching.
//! `utoipa` annotations feed the generated OpenAPI document.

use axum::{
    extract::State,
    http::StatusCode,
    response::{Html, IntoResponse, Json, Response},
};
use colloquy_core::{ConversationError, Scenario};
use std::sync::Arc;
use tracing::{error, info};

use crate::{
    models::{
        ErrorResponse, PausePayload, PauseState, RunScenarioResponse, RunStatus,
        ScenarioDocument, ScenarioInfoResponse, TranscriptEntry,
    },
    runner::RunError,
    state::AppState,
};

const INDEX_HTML: &str = include_str!("../static/index.html");

pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    Conflict(String),
    InternalServerError(anyhow::Error),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => {
                (StatusCode::BAD_REQUEST, Json(ErrorResponse { message })).into_response()
            }
            ApiError::NotFound(message) => {
                (StatusCode::NOT_FOUND, Json(ErrorResponse { message })).into_response()
            }
            ApiError::Conflict(message) => {
                (StatusCode::CONFLICT, Json(ErrorResponse { message })).into_response()
            }
            ApiError::InternalServerError(err) => {
                error!("Internal Server Error: {:?}", err);
                let message = "An internal server error occurred.".to_string();
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(ErrorResponse { message }),
                )
                    .into_response()
            }
        }
    }
}

impl From<RunError> for ApiError {
    fn from(err: RunError) -> Self {
        match err {
            RunError::AlreadyRunning => ApiError::Conflict(RunError::AlreadyRunning.to_string()),
            RunError::Conversation(
                e @ (ConversationError::Config(_) | ConversationError::Scenario(_)),
            ) => ApiError::BadRequest(e.to_string()),
            RunError::Conversation(e) => ApiError::InternalServerError(e.into()),
        }
    }
}

/// Minimal transcript page.
pub async fn index() -> Html<&'static str> {
    Html(INDEX_HTML)
}

/// The latest published transcript snapshot.
#[utoipa::path(
    get,
    path = "/history",
    responses(
        (status = 200, description = "Transcript in emission order", body = [TranscriptEntry])
    )
)]
pub async fn get_history(State(state): State<Arc<AppState>>) -> Json<Vec<TranscriptEntry>> {
    let events = state.board.snapshot().await;
    Json(events.into_iter().map(TranscriptEntry::from).collect())
}

/// Title and description of the running scenario.
#[utoipa::path(
    get,
    path = "/info",
    responses(
        (status = 200, description = "Scenario info", body = ScenarioInfoResponse)
    )
)]
pub async fn get_info(State(state): State<Arc<AppState>>) -> Json<ScenarioInfoResponse> {
    Json(state.board.info().await.into())
}

#[utoipa::path(
    get,
    path = "/pause",
    responses(
        (status = 200, description = "Current pause flag", body = PauseState)
    )
)]
pub async fn get_pause(State(state): State<Arc<AppState>>) -> Json<PauseState> {
    Json(PauseState {
        paused: state.board.paused(),
    })
}

/// Pauses or resumes the conversation before its next turn.
#[utoipa::path(
    post,
    path = "/pause",
    request_body = PausePayload,
    responses(
        (status = 200, description = "Pause flag updated", body = PauseState)
    )
)]
pub async fn set_pause(
    State(state): State<Arc<AppState>>,
    Json(payload): Json<PausePayload>,
) -> Json<PauseState> {
    state.board.set_paused(payload.paused);
    info!(paused = payload.paused, "Pause flag updated");
    Json(PauseState {
        paused: payload.paused,
    })
}

/// Starts a conversation from a scenario document.
#[utoipa::path(
    post,
    path = "/run-scenario",
    request_body = ScenarioDocument,
    responses(
        (status = 202, description = "Scenario started", body = RunScenarioResponse),
        (status = 400, description = "Invalid scenario", body = ErrorResponse),
        (status = 409, description = "A scenario is already running", body = ErrorResponse),
        (status = 500, description = "Internal server error", body = ErrorResponse)
    )
)]
pub async fn run_scenario(
    State(state): State<Arc<AppState>>,
    Json(ScenarioDocument(payload)): Json<ScenarioDocument>,
) -> Result<impl IntoResponse, ApiError> {
    let scenario: Scenario = serde_json::from_value(payload)
        .map_err(|e| ApiError::BadRequest(format!("Invalid scenario: {e}")))?;
    let session_id = state.runner.start(scenario).await?;
    info!(%session_id, "Scenario accepted");
    Ok((
        StatusCode::ACCEPTED,
        Json(RunScenarioResponse {
            session_id,
            status: "started".to_string(),
        }),
    ))
}

#[utoipa::path(
    get,
    path = "/status",
    responses(
        (status = 200, description = "Whether a scenario is running", body = RunStatus)
    )
)]
pub async fn get_status(State(state): State<Arc<AppState>>) -> Json<RunStatus> {
    Json(RunStatus {
        scenario_active: state.runner.is_active(),
    })
}

pub async fn not_found() -> ApiError {
    ApiError::NotFound("No such route".to_string())
}
