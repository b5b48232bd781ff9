//! Session loop - the wake / listen / dispatch / speak state machine
//!
//! One utterance is handled completely before the next listen. Audio and
//! speech failures are counted by a [`FailureBudget`]: the soft limit rebuilds
//! the transcriber, the hard limit ends the session.

use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;

use flume::Sender;

use crate::assistant::Assistant;
use crate::config::FailureConfig;
use crate::error::{SessionError, SpeechError, TranscriptionError};
use crate::state::SessionState;
use crate::transcriber::{Transcriber, TranscriberFactory};

pub const NO_COMMAND: &str = "I didn't hear a command. Please try again.";

/// What the loop should do after a failure
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureVerdict {
    Retry,
    Reinitialize,
    Fatal,
}

/// Consecutive failure counter with two thresholds
///
/// Every `soft_limit`-th consecutive failure asks for a rebuild; reaching
/// `hard_limit` is fatal. Only a successful call resets the count, so a
/// rebuild that doesn't help still runs into the hard limit.
#[derive(Debug, Clone)]
pub struct FailureBudget {
    soft_limit: u32,
    hard_limit: u32,
    consecutive: u32,
}

impl FailureBudget {
    pub fn new(soft_limit: u32, hard_limit: u32) -> Self {
        Self {
            soft_limit: soft_limit.max(1),
            hard_limit: hard_limit.max(1),
            consecutive: 0,
        }
    }

    pub fn from_config(config: &FailureConfig) -> Self {
        Self::new(config.soft_limit, config.hard_limit)
    }

    pub fn record_failure(&mut self) -> FailureVerdict {
        self.consecutive = self.consecutive.saturating_add(1);
        if self.consecutive >= self.hard_limit {
            FailureVerdict::Fatal
        } else if self.consecutive % self.soft_limit == 0 {
            FailureVerdict::Reinitialize
        } else {
            FailureVerdict::Retry
        }
    }

    pub fn record_success(&mut self) {
        self.consecutive = 0;
    }

    pub fn consecutive(&self) -> u32 {
        self.consecutive
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SessionEvent {
    StateChanged(SessionState),
    /// Raw transcription, in whichever state it was heard
    Heard(String),
    /// Not a wake word, but close to one
    WakeHint { phrase: String, score: f64 },
    Response(String),
    Failure { consecutive: u32, message: String },
}

pub struct SessionLoop {
    assistant: Arc<Assistant>,
    transcriber: Box<dyn Transcriber>,
    factory: Box<dyn TranscriberFactory>,
    budget: FailureBudget,
    retry_delay: Duration,
    state: SessionState,
    pending_command: Option<String>,
    pending_response: Option<String>,
    acknowledgment: Option<JoinHandle<()>>,
    event_tx: Option<Sender<SessionEvent>>,
}

impl SessionLoop {
    /// Build the first transcriber from `factory` and start in `Idle`
    pub fn new<F>(assistant: Arc<Assistant>, mut factory: F) -> Result<Self, TranscriptionError>
    where
        F: TranscriberFactory + 'static,
    {
        let transcriber = factory.build()?;
        let failures = &assistant.config().failures;
        let budget = FailureBudget::from_config(failures);
        let retry_delay = failures.retry_delay();
        assistant.state().set_session_state(SessionState::Idle);
        Ok(Self {
            assistant,
            transcriber,
            factory: Box::new(factory),
            budget,
            retry_delay,
            state: SessionState::Idle,
            pending_command: None,
            pending_response: None,
            acknowledgment: None,
            event_tx: None,
        })
    }

    pub fn with_events(mut self, event_tx: Sender<SessionEvent>) -> Self {
        self.event_tx = Some(event_tx);
        self
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn consecutive_failures(&self) -> u32 {
        self.budget.consecutive()
    }

    /// Greet, step until shutdown is requested or the budget runs out, say goodbye
    pub fn run(&mut self) -> Result<(), SessionError> {
        let name = self.assistant.name().to_string();
        tracing::info!("{} session starting", name);
        let _ = self.assistant.tts().speak(&format!(
            "Hello! {name} is now online and ready to assist you. Say 'Hey {name}' to activate me."
        ));

        let result = loop {
            if self.assistant.state().is_shutdown_requested() {
                tracing::info!("shutdown requested");
                break Ok(());
            }
            if let Err(e) = self.step() {
                tracing::error!("{}", e);
                break Err(e);
            }
        };

        self.settle_acknowledgment();
        let _ = self
            .assistant
            .tts()
            .speak(&format!("Goodbye! {name} is going offline."));
        result
    }

    /// Run the current state once and move to the next
    pub fn step(&mut self) -> Result<SessionState, SessionError> {
        let next = match self.state {
            SessionState::Idle => self.listen_for_wake(),
            SessionState::Acknowledging => Ok(self.acknowledge()),
            SessionState::AwaitingCommand => self.listen_for_command(),
            SessionState::Dispatching => Ok(self.dispatch()),
            SessionState::Speaking => self.speak_response(),
            SessionState::Reinitializing => self.reinitialize(),
        }?;
        self.transition(next);
        Ok(next)
    }

    fn listen_for_wake(&mut self) -> Result<SessionState, SessionError> {
        let listen = &self.assistant.config().listen;
        let (timeout, phrase) = (listen.idle_timeout(), listen.idle_phrase());

        let text = match self.transcriber.listen(timeout, phrase) {
            Ok(Some(text)) => text,
            Ok(None) => {
                self.budget.record_success();
                return Ok(SessionState::Idle);
            }
            Err(e) => return self.fail(&e),
        };
        self.budget.record_success();
        tracing::debug!("heard while idle: {}", text);
        self.emit(SessionEvent::Heard(text.clone()));

        let wake = self.assistant.wake();
        if let Some(trigger) = wake.detect(&text) {
            tracing::info!("wake word detected ({:?})", trigger);
            return Ok(SessionState::Acknowledging);
        }

        let hint_threshold = self.assistant.config().wake.hint_threshold;
        if let Some((phrase, score)) = wake.closest_phrase(&text) {
            if score > hint_threshold {
                tracing::info!("did you mean '{}'? ({:.2})", phrase, score);
                let hint = SessionEvent::WakeHint {
                    phrase: phrase.to_string(),
                    score,
                };
                self.emit(hint);
            }
        }
        Ok(SessionState::Idle)
    }

    fn acknowledge(&mut self) -> SessionState {
        self.settle_acknowledgment();
        let ack = &self.assistant.config().wake.acknowledgment;
        self.acknowledgment = Some(self.assistant.tts().speak_detached(ack));
        SessionState::AwaitingCommand
    }

    fn listen_for_command(&mut self) -> Result<SessionState, SessionError> {
        let listen = &self.assistant.config().listen;
        let (timeout, phrase) = (listen.command_timeout(), listen.command_phrase());

        match self.transcriber.listen(timeout, phrase) {
            Ok(Some(text)) => {
                self.budget.record_success();
                tracing::info!("command: {}", text);
                self.emit(SessionEvent::Heard(text.clone()));
                self.assistant.memory().add_user_message(&text);
                self.pending_command = Some(text);
                Ok(SessionState::Dispatching)
            }
            Ok(None) => {
                self.budget.record_success();
                tracing::info!("no command heard");
                match self.speak(NO_COMMAND) {
                    Ok(()) => Ok(SessionState::Idle),
                    Err(e) => self.fail(&e),
                }
            }
            Err(e) => self.fail(&e),
        }
    }

    fn dispatch(&mut self) -> SessionState {
        let command = self.pending_command.take().unwrap_or_default();
        self.pending_response = Some(self.assistant.respond(&command));
        SessionState::Speaking
    }

    fn speak_response(&mut self) -> Result<SessionState, SessionError> {
        let response = self.pending_response.take().unwrap_or_default();
        self.assistant.memory().add_assistant_message(&response);
        self.assistant.state().update_last_interaction();
        self.emit(SessionEvent::Response(response.clone()));

        match self.speak(&response) {
            Ok(()) => Ok(SessionState::Idle),
            Err(e) => self.fail(&e),
        }
    }

    fn reinitialize(&mut self) -> Result<SessionState, SessionError> {
        tracing::warn!(
            "reinitializing audio input after {} consecutive failures",
            self.budget.consecutive()
        );
        match self.factory.build() {
            Ok(transcriber) => {
                self.transcriber = transcriber;
                Ok(SessionState::Idle)
            }
            Err(e) => self.fail(&e),
        }
    }

    /// Speak synchronously, counting a success against the budget
    fn speak(&mut self, text: &str) -> Result<(), SpeechError> {
        self.settle_acknowledgment();
        self.assistant.tts().speak(text)?;
        self.budget.record_success();
        Ok(())
    }

    /// Wait for a detached acknowledgment so responses never overtake it
    fn settle_acknowledgment(&mut self) {
        if let Some(handle) = self.acknowledgment.take() {
            if handle.join().is_err() {
                tracing::warn!("acknowledgment thread panicked");
            }
        }
    }

    fn fail(&mut self, error: &dyn std::error::Error) -> Result<SessionState, SessionError> {
        let verdict = self.budget.record_failure();
        let consecutive = self.budget.consecutive();
        tracing::error!("{} (consecutive failures: {})", error, consecutive);
        self.emit(SessionEvent::Failure {
            consecutive,
            message: error.to_string(),
        });
        self.pending_command = None;
        self.pending_response = None;

        if verdict == FailureVerdict::Fatal {
            return Err(SessionError::PersistentAudioFailure {
                failures: consecutive,
            });
        }
        if !self.retry_delay.is_zero() {
            thread::sleep(self.retry_delay);
        }
        Ok(match verdict {
            FailureVerdict::Reinitialize => SessionState::Reinitializing,
            _ => SessionState::Idle,
        })
    }

    fn transition(&mut self, next: SessionState) {
        self.assistant.state().set_session_state(next);
        if next != self.state {
            tracing::debug!("{} -> {}", self.state, next);
            self.state = next;
            self.emit(SessionEvent::StateChanged(next));
        }
    }

    fn emit(&self, event: SessionEvent) {
        if let Some(tx) = &self.event_tx {
            let _ = tx.send(event);
        }
    }
}
