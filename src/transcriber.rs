//! Speech-to-text boundary
//!
//! A [`Transcriber`] blocks for at most its timeout and returns the heard
//! text, or `None` when nothing was said. Timeouts are not errors.

use std::io::BufRead;
use std::thread;
use std::time::Duration;

use flume::{Receiver, RecvTimeoutError};

use crate::error::TranscriptionError;
use crate::state::SharedState;

pub trait Transcriber: Send {
    /// Wait up to `timeout` for speech to start, accept up to `phrase_limit` of it
    fn listen(
        &mut self,
        timeout: Duration,
        phrase_limit: Duration,
    ) -> Result<Option<String>, TranscriptionError>;
}

/// Builds a fresh transcriber; called at startup and whenever the session
/// loop reinitializes the audio pipeline
pub trait TranscriberFactory: Send {
    fn build(&mut self) -> Result<Box<dyn Transcriber>, TranscriptionError>;
}

impl<F> TranscriberFactory for F
where
    F: FnMut() -> Result<Box<dyn Transcriber>, TranscriptionError> + Send,
{
    fn build(&mut self) -> Result<Box<dyn Transcriber>, TranscriptionError> {
        self()
    }
}

/// Start the one stdin reader thread; every console transcriber shares its channel
pub fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = flume::unbounded::<String>();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Typed lines stand in for transcribed speech
pub struct ConsoleTranscriber {
    rx: Receiver<String>,
    state: SharedState,
}

impl ConsoleTranscriber {
    pub fn new(rx: Receiver<String>, state: SharedState) -> Self {
        Self { rx, state }
    }
}

impl Transcriber for ConsoleTranscriber {
    fn listen(
        &mut self,
        timeout: Duration,
        _phrase_limit: Duration,
    ) -> Result<Option<String>, TranscriptionError> {
        match self.rx.recv_timeout(timeout) {
            Ok(line) => {
                let line = line.trim();
                Ok((!line.is_empty()).then(|| line.to_string()))
            }
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => {
                // End of input: nothing more will ever be heard
                self.state.request_shutdown();
                Ok(None)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RuntimeState;

    #[test]
    fn test_console_lines_and_timeout() {
        let (tx, rx) = flume::unbounded();
        let state = RuntimeState::new();
        let mut t = ConsoleTranscriber::new(rx, state.clone());

        tx.send("  hey jarvis ".to_string()).unwrap();
        tx.send("".to_string()).unwrap();

        let short = Duration::from_millis(10);
        assert_eq!(t.listen(short, short).unwrap(), Some("hey jarvis".to_string()));
        assert_eq!(t.listen(short, short).unwrap(), None);
        assert_eq!(t.listen(short, short).unwrap(), None);
        assert!(!state.is_shutdown_requested());
    }

    #[test]
    fn test_end_of_input_requests_shutdown() {
        let (tx, rx) = flume::unbounded::<String>();
        drop(tx);
        let state = RuntimeState::new();
        let mut t = ConsoleTranscriber::new(rx, state.clone());

        let short = Duration::from_millis(10);
        assert_eq!(t.listen(short, short).unwrap(), None);
        assert!(state.is_shutdown_requested());
    }

    #[test]
    fn test_closure_factory() {
        let mut builds = 0;
        let mut factory = || -> Result<Box<dyn Transcriber>, TranscriptionError> {
            builds += 1;
            let (_tx, rx) = flume::unbounded();
            Ok(Box::new(ConsoleTranscriber::new(rx, RuntimeState::new())))
        };
        assert!(factory.build().is_ok());
        assert!(factory.build().is_ok());
        drop(factory);
        assert_eq!(builds, 2);
    }
}
