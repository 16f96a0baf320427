//! Shared Application State

use crate::runner::ScenarioRunner;
use colloquy_core::transcript::TranscriptBoard;
use std::{path::PathBuf, sync::Arc};

/// Created once at startup and handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub board: Arc<TranscriptBoard>,
    pub runner: Arc<ScenarioRunner>,
    /// Directory served under `/static/audio`.
    pub audio_dir: PathBuf,
}
