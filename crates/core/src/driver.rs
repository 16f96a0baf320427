//! Conversation Driver
//!
//! Runs one two-party conversation to completion. Each iteration picks the
//! responder through the [`TurnSelector`], gives it its own view of the history,
//! parses what it said, commits the turn to both perspectives, publishes a
//! transcript snapshot and checks whether the exchange is over.
//!
//! ```text
//! NotStarted -> Running -> EndedBySignal
//!                       -> EndedByTurnLimit
//!                       -> Failed
//! ```

use crate::{
    agent::{Agent, AgentRegistry},
    error::ConversationError,
    history::{HistoryMessage, PerspectiveHistory},
    reply::{ParsedReply, TERMINATION_MARKER},
    runtime::{AgentRuntime, InvocationContext},
    scenario::Scenario,
    selector::TurnSelector,
    speech::{SpeechRenderer, speakable_text, voice_for},
    transcript::{PauseGate, TranscriptEvent, TranscriptEventKind, TranscriptPublisher},
};
use serde::{Deserialize, Serialize};
use std::{sync::Arc, time::Duration};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DriverState {
    NotStarted,
    Running,
    EndedBySignal,
    EndedByTurnLimit,
    /// A turn failed; nothing from that turn was committed.
    Failed,
}

impl DriverState {
    pub fn is_finished(self) -> bool {
        !matches!(self, DriverState::NotStarted | DriverState::Running)
    }
}

/// How the driver moves the turn cursor.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TurnPolicy {
    /// Peek the responder, commit the cursor only after the turn is committed.
    #[default]
    PeekThenAdvance,
    /// Advance the cursor as the responder is chosen.
    EagerAdvance,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EndReason {
    /// A reply contained the termination marker.
    Signal,
    /// `max_turns` turns ran without a termination marker.
    TurnLimit,
}

/// One committed turn.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
    pub speaker_id: String,
    pub listener_id: String,
    /// What the listener saw: the reply without tool markers.
    pub text: String,
    /// The reply as the speaker produced it.
    pub raw_text: String,
    /// 1-based.
    pub turn_index: u32,
    pub tool_calls: Vec<String>,
    pub is_terminal: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationReport {
    pub session_id: Uuid,
    pub end: EndReason,
    pub turns: Vec<ConversationTurn>,
}

#[derive(Debug, Clone)]
pub struct DriverOptions {
    pub max_turns: u32,
    pub termination_marker: String,
    pub policy: TurnPolicy,
    /// Sleep between pause-flag polls. Must be non-zero.
    pub pause_poll_interval: Duration,
    pub user_id: String,
    pub session_id: Uuid,
}

impl Default for DriverOptions {
    fn default() -> Self {
        Self {
            max_turns: 18,
            termination_marker: TERMINATION_MARKER.to_string(),
            policy: TurnPolicy::default(),
            pause_poll_interval: Duration::from_millis(500),
            user_id: "local".to_string(),
            session_id: Uuid::new_v4(),
        }
    }
}

pub struct ConversationDriver {
    scenario: Arc<Scenario>,
    selector: TurnSelector,
    history: PerspectiveHistory,
    runtime: Arc<dyn AgentRuntime>,
    publisher: Arc<dyn TranscriptPublisher>,
    pause: Arc<dyn PauseGate>,
    speech: Option<Arc<dyn SpeechRenderer>>,
    options: DriverOptions,
    state: DriverState,
    turns: Vec<ConversationTurn>,
    events: Vec<TranscriptEvent>,
    next_request: String,
}

impl ConversationDriver {
    /// Builds a driver for `scenario`.
    ///
    /// Fails with [`ConversationError::Config`] unless the scenario has exactly two
    /// agents, one of them carries an initiating message, and `max_turns` and the
    /// pause poll interval are non-zero.
    pub fn new(
        scenario: Arc<Scenario>,
        runtime: Arc<dyn AgentRuntime>,
        publisher: Arc<dyn TranscriptPublisher>,
        pause: Arc<dyn PauseGate>,
        options: DriverOptions,
    ) -> Result<Self, ConversationError> {
        if options.max_turns == 0 {
            return Err(ConversationError::Config("max_turns must be at least 1".to_string()));
        }
        if options.pause_poll_interval.is_zero() {
            return Err(ConversationError::Config(
                "pause poll interval must be non-zero".to_string(),
            ));
        }
        let registry = AgentRegistry::from_scenario(&scenario);
        if registry.len() != 2 {
            return Err(ConversationError::Config(format!(
                "a conversation needs exactly two agents, found {}",
                registry.len()
            )));
        }
        let initiator = registry.initiator().ok_or_else(|| {
            ConversationError::Config("no agent has an initiating message".to_string())
        })?;
        scenario.validate()?;
        // The cursor holds the last speaker, so seeding it with the initiator's
        // partner makes the initiator open the conversation.
        let seed = registry
            .partner_of(&initiator.id)
            .ok_or_else(|| ConversationError::Config("initiator has no partner".to_string()))?;
        let selector = TurnSelector::new(&registry, seed.id.clone());
        info!(
            initiator = %initiator.id,
            max_turns = options.max_turns,
            policy = ?options.policy,
            "Conversation driver ready"
        );

        Ok(Self {
            scenario,
            selector,
            history: PerspectiveHistory::new(),
            runtime,
            publisher,
            pause,
            speech: None,
            options,
            state: DriverState::NotStarted,
            turns: Vec::new(),
            events: Vec::new(),
            next_request: String::new(),
        })
    }

    /// Attaches audio to every message event the driver publishes.
    pub fn with_speech(mut self, speech: Arc<dyn SpeechRenderer>) -> Self {
        self.speech = Some(speech);
        self
    }

    pub fn state(&self) -> DriverState {
        self.state
    }

    pub fn session_id(&self) -> Uuid {
        self.options.session_id
    }

    /// The log of `agent_id` as that agent sees it.
    pub fn history(&self, agent_id: &str) -> &[HistoryMessage] {
        self.history.fetch(agent_id)
    }

    pub fn turns(&self) -> &[ConversationTurn] {
        &self.turns
    }

    /// Runs turns until the conversation ends or a turn fails.
    #[instrument(skip_all, fields(session_id = %self.options.session_id))]
    pub async fn run(&mut self) -> Result<ConversationReport, ConversationError> {
        if self.state != DriverState::NotStarted {
            return Err(ConversationError::NotRunnable(self.state));
        }
        info!(title = %self.scenario.title(), "Starting conversation");
        loop {
            if let Some(end) = self.step().await? {
                return Ok(ConversationReport {
                    session_id: self.options.session_id,
                    end,
                    turns: self.turns.clone(),
                });
            }
        }
    }

    /// Runs a single turn. Returns how the conversation ended if this turn ended it.
    pub async fn step(&mut self) -> Result<Option<EndReason>, ConversationError> {
        match self.state {
            DriverState::NotStarted => self.state = DriverState::Running,
            DriverState::Running => {}
            other => return Err(ConversationError::NotRunnable(other)),
        }

        self.wait_while_paused().await;

        let turn_index = self.turns.len() as u32 + 1;
        let responder = match self.options.policy {
            TurnPolicy::PeekThenAdvance => self.selector.peek_next().cloned(),
            TurnPolicy::EagerAdvance => self.selector.advance(),
        };
        let Some(responder) = responder else {
            return Err(self.fail(ConversationError::Config("no agent to respond".to_string())));
        };
        let Some(sender) = self.selector.other(&responder.id).cloned() else {
            return Err(self.fail(ConversationError::Config(format!(
                "agent '{}' has no partner",
                responder.id
            ))));
        };
        info!(turn = turn_index, sender = %sender.id, responder = %responder.id, "Starting turn");

        let raw = match self.produce_reply(turn_index, &responder).await {
            Ok(raw) => raw,
            Err(e) => return Err(self.fail(e)),
        };

        let parsed = ParsedReply::parse(raw, &self.options.termination_marker);
        if parsed.has_surfaced_tool_use() {
            warn!(agent_id = %responder.id, "Reply contains an unexecuted tool use request");
        }
        // Tool markers stay out of both logs so they are never replayed to the model.
        self.history
            .commit_turn(&responder.id, &sender.id, parsed.clean.clone(), parsed.clean.clone());
        self.publish_turn(&responder, &sender, &parsed).await;
        self.turns.push(ConversationTurn {
            speaker_id: responder.id.clone(),
            listener_id: sender.id.clone(),
            text: parsed.clean.clone(),
            raw_text: parsed.raw.clone(),
            turn_index,
            tool_calls: parsed.tool_calls.clone(),
            is_terminal: parsed.is_terminal,
        });

        let end = if parsed.is_terminal {
            self.state = DriverState::EndedBySignal;
            info!(turn = turn_index, agent_id = %responder.id, "Conversation ended by termination marker");
            Some(EndReason::Signal)
        } else if turn_index >= self.options.max_turns {
            self.state = DriverState::EndedByTurnLimit;
            info!(turn = turn_index, "Conversation reached the turn limit");
            Some(EndReason::TurnLimit)
        } else {
            None
        };

        self.next_request = parsed.raw;
        if self.options.policy == TurnPolicy::PeekThenAdvance {
            self.selector.advance();
        }
        Ok(end)
    }

    async fn wait_while_paused(&self) {
        let mut announced = false;
        while self.pause.is_paused().await {
            if !announced {
                info!("Conversation paused; waiting to resume");
                announced = true;
            }
            tokio::time::sleep(self.options.pause_poll_interval).await;
        }
        if announced {
            info!("Conversation resumed");
        }
    }

    async fn produce_reply(
        &self,
        turn_index: u32,
        responder: &Arc<Agent>,
    ) -> Result<String, ConversationError> {
        if turn_index == 1 {
            return responder
                .initiating_message()
                .map(str::to_string)
                .ok_or_else(|| {
                    ConversationError::Config(format!(
                        "agent '{}' opens the conversation but has no initiating message",
                        responder.id
                    ))
                });
        }

        let ctx = InvocationContext {
            scenario: self.scenario.clone(),
            agent: responder.clone(),
            chat_history: self.history.fetch(&responder.id).to_vec(),
            request: self.next_request.clone(),
            user_id: self.options.user_id.clone(),
            session_id: self.options.session_id,
        };
        let reply = self
            .runtime
            .invoke(ctx)
            .await
            .map_err(|source| ConversationError::Invocation {
                agent_id: responder.id.clone(),
                source,
            })?;
        if !reply.ending_tools.is_empty() {
            debug!(agent_id = %responder.id, tools = ?reply.ending_tools, "Conversation-ending tool ran");
        }
        reply.text.ok_or_else(|| ConversationError::MalformedReply {
            agent_id: responder.id.clone(),
        })
    }

    async fn publish_turn(&mut self, speaker: &Agent, listener: &Agent, parsed: &ParsedReply) {
        for tool in &parsed.tool_calls {
            info!(tool = %tool, agent_id = %speaker.id, "Tool used during turn");
            self.events
                .push(TranscriptEvent::tool(&speaker.id, &listener.id, tool));
        }
        if !parsed.clean.is_empty() {
            let mut event = TranscriptEvent::message(&speaker.id, &listener.id, parsed.clean.clone());
            if let Some(speech) = &self.speech {
                let prior = self
                    .events
                    .iter()
                    .filter(|e| e.kind == TranscriptEventKind::Message)
                    .count();
                event.audio_url = speech
                    .render(&speakable_text(&parsed.clean), &voice_for(prior))
                    .await;
            }
            self.events.push(event);
        }
        self.publisher.publish(self.events.clone()).await;
    }

    fn fail(&mut self, err: ConversationError) -> ConversationError {
        self.state = DriverState::Failed;
        error!(error = %err, "Conversation failed");
        err
    }
}
