//! Background Scenario Runner
//!
//! Owns the collaborators a conversation needs and runs one scenario at a time,
//! either inline (`run_to_completion`) or as a spawned task (`start`).

use colloquy_core::{
    ConversationDriver, ConversationError, ConversationReport, DriverOptions, EndReason, Scenario,
    runtime::AgentRuntime,
    speech::SpeechRenderer,
    transcript::{ScenarioInfo, TranscriptBoard},
};
use std::{
    sync::{
        Arc,
        atomic::{AtomicBool, Ordering},
    },
    time::Duration,
};
use tracing::{Instrument, error, info, info_span};
use uuid::Uuid;

#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error("A scenario is already running")]
    AlreadyRunning,
    #[error(transparent)]
    Conversation(#[from] ConversationError),
}

#[derive(Debug, Clone, Copy)]
pub struct RunSettings {
    pub max_turns: u32,
    pub pause_poll_interval: Duration,
}

impl Default for RunSettings {
    fn default() -> Self {
        Self {
            max_turns: 18,
            pause_poll_interval: Duration::from_millis(500),
        }
    }
}

pub struct ScenarioRunner {
    board: Arc<TranscriptBoard>,
    runtime: Arc<dyn AgentRuntime>,
    speech: Option<Arc<dyn SpeechRenderer>>,
    settings: RunSettings,
    active: Arc<AtomicBool>,
}

/// Holds the one-run-at-a-time slot; dropping it frees the slot, panics included.
struct ActiveRun(Arc<AtomicBool>);

impl Drop for ActiveRun {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl ScenarioRunner {
    pub fn new(
        board: Arc<TranscriptBoard>,
        runtime: Arc<dyn AgentRuntime>,
        settings: RunSettings,
    ) -> Self {
        Self {
            board,
            runtime,
            speech: None,
            settings,
            active: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn with_speech(mut self, speech: Arc<dyn SpeechRenderer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn acquire(&self) -> Result<ActiveRun, RunError> {
        self.active
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .map(|_| ActiveRun(self.active.clone()))
            .map_err(|_| RunError::AlreadyRunning)
    }

    /// Validates the scenario, resets the board and builds a driver for it.
    async fn prepare(&self, scenario: Scenario) -> Result<ConversationDriver, ConversationError> {
        scenario.validate()?;
        let info = ScenarioInfo {
            title: scenario.title().to_string(),
            description: scenario.description().to_string(),
        };
        let options = DriverOptions {
            max_turns: self.settings.max_turns,
            pause_poll_interval: self.settings.pause_poll_interval,
            ..Default::default()
        };
        let mut driver = ConversationDriver::new(
            Arc::new(scenario),
            self.runtime.clone(),
            self.board.clone(),
            self.board.clone(),
            options,
        )?;
        if let Some(speech) = &self.speech {
            driver = driver.with_speech(speech.clone());
        }
        self.board.reset(info).await;
        Ok(driver)
    }

    /// Runs `scenario` on the current task and returns its report.
    pub async fn run_to_completion(&self, scenario: Scenario) -> Result<ConversationReport, RunError> {
        let _active = self.acquire()?;
        let mut driver = self.prepare(scenario).await?;
        let report = driver.run().await?;
        log_report(&report);
        Ok(report)
    }

    /// Starts `scenario` in the background and returns its session id.
    ///
    /// Invalid scenarios are rejected before anything is spawned.
    pub async fn start(&self, scenario: Scenario) -> Result<Uuid, RunError> {
        let active = self.acquire()?;
        let mut driver = self.prepare(scenario).await?;
        let session_id = driver.session_id();
        tokio::spawn(
            async move {
                let _active = active;
                match driver.run().await {
                    Ok(report) => log_report(&report),
                    Err(e) => error!(error = %e, "Scenario run failed"),
                }
            }
            .instrument(info_span!("scenario_run", %session_id)),
        );
        Ok(session_id)
    }
}

fn log_report(report: &ConversationReport) {
    let end = match report.end {
        EndReason::Signal => "termination marker",
        EndReason::TurnLimit => "turn limit",
    };
    info!(
        session_id = %report.session_id,
        turns = report.turns.len(),
        end,
        "Conversation finished"
    );
}
