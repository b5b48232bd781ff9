//! Shared runtime state - thread-safe flags visible to every component
//!
//! The session loop is the only writer of the session state; everything else
//! (the console UI, the text command path, Ctrl-C) reads it or raises the
//! shutdown flag.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU8, AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

/// Session loop states
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum SessionState {
    /// Listening for the wake word
    Idle = 0,
    /// Wake word heard, acknowledging
    Acknowledging = 1,
    /// Listening for the command
    AwaitingCommand = 2,
    /// Matching and running the command
    Dispatching = 3,
    /// Speaking the response
    Speaking = 4,
    /// Rebuilding the audio input after repeated failures
    Reinitializing = 5,
}

impl From<u8> for SessionState {
    fn from(v: u8) -> Self {
        match v {
            1 => SessionState::Acknowledging,
            2 => SessionState::AwaitingCommand,
            3 => SessionState::Dispatching,
            4 => SessionState::Speaking,
            5 => SessionState::Reinitializing,
            _ => SessionState::Idle,
        }
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "Idle"),
            SessionState::Acknowledging => write!(f, "Acknowledging"),
            SessionState::AwaitingCommand => write!(f, "Awaiting command"),
            SessionState::Dispatching => write!(f, "Dispatching"),
            SessionState::Speaking => write!(f, "Speaking"),
            SessionState::Reinitializing => write!(f, "Reinitializing"),
        }
    }
}

/// Shared runtime state - accessible from all components
///
/// All fields use atomic operations for thread-safe access without locks.
pub struct RuntimeState {
    /// Current session state (stored as u8)
    session: AtomicU8,
    /// Speech output is currently playing
    pub tts_playing: AtomicBool,
    /// Stop the session loop at the next state boundary
    shutdown_requested: AtomicBool,
    /// Timestamp of the last handled command (Unix ms)
    last_interaction_ms: AtomicU64,
}

impl RuntimeState {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            session: AtomicU8::new(SessionState::Idle as u8),
            tts_playing: AtomicBool::new(false),
            shutdown_requested: AtomicBool::new(false),
            last_interaction_ms: AtomicU64::new(0),
        })
    }

    pub fn session_state(&self) -> SessionState {
        SessionState::from(self.session.load(Ordering::SeqCst))
    }

    pub(crate) fn set_session_state(&self, state: SessionState) {
        self.session.store(state as u8, Ordering::SeqCst);
    }

    pub fn request_shutdown(&self) {
        self.shutdown_requested.store(true, Ordering::SeqCst);
    }

    pub fn is_shutdown_requested(&self) -> bool {
        self.shutdown_requested.load(Ordering::SeqCst)
    }

    pub fn is_speaking(&self) -> bool {
        self.tts_playing.load(Ordering::SeqCst)
    }

    /// Update last interaction timestamp to now
    pub fn update_last_interaction(&self) {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_millis() as u64)
            .unwrap_or(0);
        self.last_interaction_ms.store(now, Ordering::SeqCst);
    }

    /// Unix ms of the last handled command, 0 if none yet
    pub fn last_interaction_ms(&self) -> u64 {
        self.last_interaction_ms.load(Ordering::SeqCst)
    }
}

impl fmt::Debug for RuntimeState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuntimeState")
            .field("session", &self.session_state())
            .field("tts_playing", &self.is_speaking())
            .field("shutdown_requested", &self.is_shutdown_requested())
            .field("last_interaction_ms", &self.last_interaction_ms())
            .finish()
    }
}

/// Type alias for shared state
pub type SharedState = Arc<RuntimeState>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_state_roundtrip_through_u8() {
        for state in [
            SessionState::Idle,
            SessionState::Acknowledging,
            SessionState::AwaitingCommand,
            SessionState::Dispatching,
            SessionState::Speaking,
            SessionState::Reinitializing,
        ] {
            assert_eq!(SessionState::from(state as u8), state);
        }
        assert_eq!(SessionState::from(200), SessionState::Idle);
    }

    #[test]
    fn test_shutdown_flag() {
        let state = RuntimeState::new();
        assert!(!state.is_shutdown_requested());
        state.request_shutdown();
        assert!(state.is_shutdown_requested());
    }

    #[test]
    fn test_initial_state() {
        let state = RuntimeState::new();
        assert_eq!(state.session_state(), SessionState::Idle);
        assert_eq!(state.last_interaction_ms(), 0);
        state.update_last_interaction();
        assert!(state.last_interaction_ms() > 0);
    }
}
