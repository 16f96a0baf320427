//! Axum Router Configuration
//!
//! The transcript page and its polling endpoints, pause control, scenario
//! launching, rendered audio files and the OpenAPI documentation.

use crate::{
    handlers,
    models::{
        EntryKind, ErrorResponse, PausePayload, PauseState, RunScenarioResponse, RunStatus,
        ScenarioDocument, ScenarioInfoResponse, TranscriptEntry,
    },
    state::AppState,
    tts::AUDIO_ROUTE,
};

use axum::{
    Router,
    routing::{get, post},
};
use std::sync::Arc;
use tower_http::services::ServeDir;
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::get_history,
        handlers::get_info,
        handlers::get_pause,
        handlers::set_pause,
        handlers::run_scenario,
        handlers::get_status,
    ),
    components(
        schemas(TranscriptEntry, EntryKind, ScenarioInfoResponse, PausePayload, PauseState, RunStatus, RunScenarioResponse, ScenarioDocument, ErrorResponse)
    ),
    tags(
        (name = "Colloquy API", description = "Live transcript and control of two-agent scenario runs")
    )
)]
pub struct ApiDoc;

/// Creates the main Axum router for the application.
pub fn create_router(app_state: Arc<AppState>) -> Router {
    let audio = ServeDir::new(&app_state.audio_dir);

    let api_router = Router::new()
        .route("/", get(handlers::index))
        .route("/history", get(handlers::get_history))
        .route("/info", get(handlers::get_info))
        .route(
            "/pause",
            get(handlers::get_pause).post(handlers::set_pause),
        )
        .route("/run-scenario", post(handlers::run_scenario))
        .route("/status", get(handlers::get_status))
        .with_state(app_state);

    Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(api_router)
        .nest_service(AUDIO_ROUTE, audio)
        .fallback(handlers::not_found)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::tests::{SCENARIO, runner};
    use axum::{
        body::{Body, to_bytes},
        http::{Request, StatusCode, header},
    };
    use colloquy_core::transcript::{TranscriptEvent, TranscriptPublisher};
    use serde_json::{Value, json};
    use std::time::Duration;
    use tower::ServiceExt; // for `oneshot`

    fn app(delay: Duration, audio_dir: &std::path::Path) -> (Arc<AppState>, Router) {
        let (board, runner) = runner("Understood.", delay);
        let state = Arc::new(AppState {
            board,
            runner,
            audio_dir: audio_dir.to_path_buf(),
        });
        (state.clone(), create_router(state))
    }

    async fn body_json(response: axum::response::Response) -> Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    fn post_json(uri: &str, body: &str) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    fn get_request(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    #[tokio::test]
    async fn test_history_returns_latest_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(Duration::ZERO, dir.path());
        state
            .board
            .publish(vec![
                TranscriptEvent::message("provider", "payer", "Hello"),
                TranscriptEvent::tool("payer", "provider", "lookup_medical_policy"),
            ])
            .await;

        let response = app.oneshot(get_request("/history")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let body = body_json(response).await;
        assert_eq!(body[0]["type"], "message");
        assert_eq!(body[0]["content"], "Hello");
        assert_eq!(body[1]["type"], "tool");
        assert_eq!(body[1]["speaker"], "payer");
    }

    #[tokio::test]
    async fn test_pause_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(Duration::ZERO, dir.path());

        let response = app
            .clone()
            .oneshot(post_json("/pause", r#"{"paused": true}"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert!(state.board.paused());

        let response = app.oneshot(get_request("/pause")).await.unwrap();
        assert_eq!(body_json(response).await, json!({"paused": true}));
    }

    #[tokio::test]
    async fn test_run_scenario_accepts_then_conflicts() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(Duration::from_millis(100), dir.path());

        let response = app.clone().oneshot(post_json("/run-scenario", SCENARIO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::ACCEPTED);
        let body = body_json(response).await;
        assert_eq!(body["status"], "started");
        assert!(body["session_id"].is_string());

        let response = app.clone().oneshot(get_request("/status")).await.unwrap();
        assert_eq!(body_json(response).await, json!({"scenario_active": true}));

        let response = app.clone().oneshot(post_json("/run-scenario", SCENARIO)).await.unwrap();
        assert_eq!(response.status(), StatusCode::CONFLICT);

        let response = app.oneshot(get_request("/info")).await.unwrap();
        assert_eq!(body_json(response).await["title"], "Knee MRI");
        assert!(state.runner.is_active());
    }

    #[tokio::test]
    async fn test_run_scenario_rejects_invalid_scenarios() {
        let dir = tempfile::tempdir().unwrap();
        let (state, app) = app(Duration::ZERO, dir.path());

        let response = app
            .clone()
            .oneshot(post_json("/run-scenario", r#"{ "agents": [ { "agentId": "solo" } ] }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(body_json(response).await["message"].is_string());

        let response = app
            .oneshot(post_json("/run-scenario", r#"{ "agents": "none" }"#))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert!(!state.runner.is_active());
    }

    #[tokio::test]
    async fn test_audio_files_and_index_are_served() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("clip.mp3"), b"mp3").unwrap();
        let (_, app) = app(Duration::ZERO, dir.path());

        let response = app
            .clone()
            .oneshot(get_request("/static/audio/clip.mp3"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(&bytes[..], b"mp3");

        let response = app.clone().oneshot(get_request("/")).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);

        let response = app.oneshot(get_request("/nowhere")).await.unwrap();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
    }

    #[test]
    fn test_openapi_lists_routes() {
        let doc = ApiDoc::openapi();
        let paths: Vec<_> = doc.paths.paths.keys().cloned().collect();
        for path in ["/history", "/info", "/pause", "/run-scenario", "/status"] {
            assert!(paths.iter().any(|p| p == path), "missing {path}");
        }
    }
}
