//! Speech output
//!
//! [`TtsEngine`] is the renderer boundary. [`Tts`] wraps an engine so that at
//! most one utterance is rendered at a time, whichever path (voice loop or
//! typed command) asks for it.

use std::sync::atomic::Ordering;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use crate::error::SpeechError;
use crate::state::SharedState;

pub trait TtsEngine: Send + Sync {
    /// Render `text`, returning once it has been spoken
    fn speak(&self, text: &str) -> Result<(), SpeechError>;
}

impl<T: TtsEngine + ?Sized> TtsEngine for Arc<T> {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        (**self).speak(text)
    }
}

/// Prints responses to stdout in place of a voice
pub struct ConsoleTts {
    name: String,
}

impl ConsoleTts {
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
        }
    }
}

impl TtsEngine for ConsoleTts {
    fn speak(&self, text: &str) -> Result<(), SpeechError> {
        use std::io::Write;
        let mut out = std::io::stdout().lock();
        writeln!(out, "{}: {}", self.name, text).map_err(|e| SpeechError(e.to_string()))?;
        out.flush().map_err(|e| SpeechError(e.to_string()))
    }
}

pub struct Tts {
    engine: Box<dyn TtsEngine>,
    /// Held for the whole render
    speaking: Mutex<()>,
    state: SharedState,
}

impl Tts {
    pub fn new(engine: Box<dyn TtsEngine>, state: SharedState) -> Self {
        Self {
            engine,
            speaking: Mutex::new(()),
            state,
        }
    }

    /// Speak and wait. Empty text is a no-op; failures are logged and returned
    /// so the caller can count them.
    pub fn speak(&self, text: &str) -> Result<(), SpeechError> {
        let text = text.trim();
        if text.is_empty() {
            return Ok(());
        }

        let _guard = self.speaking.lock().unwrap_or_else(|e| e.into_inner());
        self.state.tts_playing.store(true, Ordering::SeqCst);
        tracing::debug!("speaking: {}", text);
        let result = self.engine.speak(text);
        self.state.tts_playing.store(false, Ordering::SeqCst);

        if let Err(e) = &result {
            tracing::error!("error in text-to-speech: {}", e);
        }
        result
    }

    /// Speak on a background thread without waiting for completion
    pub fn speak_detached(self: &Arc<Self>, text: &str) -> JoinHandle<()> {
        let tts = Arc::clone(self);
        let text = text.to_string();
        std::thread::spawn(move || {
            let _ = tts.speak(&text);
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::RuntimeState;
    use std::sync::atomic::AtomicUsize;
    use std::time::Duration;

    /// Records the peak number of concurrent renders
    struct Probe {
        active: AtomicUsize,
        peak: AtomicUsize,
        spoken: Mutex<Vec<String>>,
    }

    impl TtsEngine for Probe {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            std::thread::sleep(Duration::from_millis(5));
            self.spoken.lock().unwrap().push(text.to_string());
            self.active.fetch_sub(1, Ordering::SeqCst);
            if text == "fail" {
                return Err(SpeechError("no audio device".into()));
            }
            Ok(())
        }
    }

    fn probe() -> Arc<Probe> {
        Arc::new(Probe {
            active: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
            spoken: Mutex::new(Vec::new()),
        })
    }

    #[test]
    fn test_empty_text_is_noop() {
        let p = probe();
        let tts = Tts::new(Box::new(Arc::clone(&p)), RuntimeState::new());
        tts.speak("").unwrap();
        tts.speak("   ").unwrap();
        assert!(p.spoken.lock().unwrap().is_empty());
    }

    #[test]
    fn test_one_render_at_a_time() {
        let p = probe();
        let tts = Arc::new(Tts::new(Box::new(Arc::clone(&p)), RuntimeState::new()));
        let handles: Vec<_> = (0..8).map(|i| tts.speak_detached(&format!("line {}", i))).collect();
        tts.speak("from caller").unwrap();
        for h in handles {
            h.join().unwrap();
        }
        assert_eq!(p.spoken.lock().unwrap().len(), 9);
        assert_eq!(p.peak.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_failure_is_returned_and_flag_cleared() {
        let p = probe();
        let state = RuntimeState::new();
        let tts = Tts::new(Box::new(Arc::clone(&p)), Arc::clone(&state));
        assert!(tts.speak("fail").is_err());
        assert!(!state.is_speaking());
    }
}
