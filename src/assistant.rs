//! Assistant context - everything a command needs, owned in one place
//!
//! Built once by the entry point and shared (`Arc`) between the voice session
//! loop and the typed command path.

use std::sync::{Arc, RwLock, RwLockReadGuard};

use rand::seq::SliceRandom;

use crate::config::Config;
use crate::dispatch::{ActionRegistry, Dispatcher};
use crate::error::PatternError;
use crate::handlers;
use crate::intent::{IntentMatcher, MatchResult};
use crate::memory::{ConversationMemory, SharedMemory};
use crate::patterns::PatternTable;
use crate::state::{RuntimeState, SharedState};
use crate::tts::{Tts, TtsEngine};
use crate::wake::WakeWord;

pub const NOT_UNDERSTOOD: &[&str] = &[
    "I'm not sure how to help with that. Could you rephrase?",
    "I didn't understand that command. Can you try again?",
    "Sorry, I don't know how to do that yet.",
];

pub struct Assistant {
    config: Config,
    wake: WakeWord,
    matcher: IntentMatcher,
    table: RwLock<PatternTable>,
    dispatcher: Dispatcher,
    memory: SharedMemory,
    tts: Arc<Tts>,
    state: SharedState,
}

impl Assistant {
    pub fn new(
        config: Config,
        table: PatternTable,
        registry: ActionRegistry,
        engine: Box<dyn TtsEngine>,
    ) -> Self {
        let state = RuntimeState::new();
        Self {
            wake: WakeWord::new(&config.wake),
            matcher: IntentMatcher::new(&config.matcher),
            table: RwLock::new(table),
            dispatcher: Dispatcher::new(registry),
            memory: Arc::new(ConversationMemory::new(&config.memory)),
            tts: Arc::new(Tts::new(engine, Arc::clone(&state))),
            state,
            config,
        }
    }

    /// Load the pattern table from the configured path and register the built-in actions
    pub fn from_config(config: Config, engine: Box<dyn TtsEngine>) -> Result<Self, PatternError> {
        let table = PatternTable::load(&config.matcher.patterns_path)?;
        let mut registry = ActionRegistry::new();
        handlers::register_builtin(&mut registry, &config.actions);
        tracing::info!(
            "{} intents, {} actions registered",
            table.len(),
            registry.actions().len()
        );
        Ok(Self::new(config, table, registry, engine))
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn name(&self) -> &str {
        &self.config.name
    }

    pub fn wake(&self) -> &WakeWord {
        &self.wake
    }

    pub fn memory(&self) -> &SharedMemory {
        &self.memory
    }

    pub fn tts(&self) -> &Arc<Tts> {
        &self.tts
    }

    pub fn state(&self) -> &SharedState {
        &self.state
    }

    pub fn patterns(&self) -> RwLockReadGuard<'_, PatternTable> {
        self.table.read().unwrap_or_else(|e| e.into_inner())
    }

    /// Best intent for `command` without running it
    pub fn match_command(&self, command: &str) -> Option<MatchResult> {
        self.matcher.find(command, &self.patterns())
    }

    /// Match and dispatch `command`; always yields something to say
    pub fn respond(&self, command: &str) -> String {
        let table = self.patterns();
        match self.matcher.find_entry(command, &table) {
            Some((entry, m)) => {
                tracing::info!(
                    "intent '{}' via '{}' (score {})",
                    m.intent,
                    m.pattern,
                    m.score
                );
                self.dispatcher.dispatch(entry, &m.params)
            }
            None => {
                tracing::info!("no intent matched '{}'", command);
                NOT_UNDERSTOOD
                    .choose(&mut rand::thread_rng())
                    .map(|s| s.to_string())
                    .unwrap_or_default()
            }
        }
    }

    /// Typed command path: same flow as a voice command, minus listening
    pub fn process_text_command(&self, text: &str) -> String {
        self.memory.add_user_message(text);
        let response = self.respond(text);
        self.memory.add_assistant_message(&response);
        self.state.update_last_interaction();
        let _ = self.tts.speak(&response);
        response
    }

    /// Re-read the pattern file, replacing the table only if it loads cleanly
    pub fn reload_patterns(&self) -> Result<usize, PatternError> {
        let table = PatternTable::load(&self.config.matcher.patterns_path)?;
        let count = table.len();
        *self.table.write().unwrap_or_else(|e| e.into_inner()) = table;
        tracing::info!("reloaded {} intents", count);
        Ok(count)
    }

    /// Edit the table in place and persist it
    pub fn update_patterns<F>(&self, edit: F) -> Result<(), PatternError>
    where
        F: FnOnce(&mut PatternTable),
    {
        let mut table = self.table.write().unwrap_or_else(|e| e.into_inner());
        let mut edited = table.clone();
        edit(&mut edited);
        edited.save(&self.config.matcher.patterns_path)?;
        *table = edited;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{MatcherConfig, MemoryConfig};
    use crate::dispatch::APOLOGY;
    use crate::error::SpeechError;
    use crate::patterns::{Pattern, PatternEntry, Reply, JOKES};
    use std::sync::Mutex;

    #[derive(Default)]
    struct Recorder(Mutex<Vec<String>>);

    impl TtsEngine for Recorder {
        fn speak(&self, text: &str) -> Result<(), SpeechError> {
            self.0.lock().unwrap().push(text.to_string());
            Ok(())
        }
    }

    fn config(dir: &std::path::Path) -> Config {
        Config {
            matcher: MatcherConfig {
                patterns_path: dir.join("commands.json"),
                ..MatcherConfig::default()
            },
            memory: MemoryConfig {
                max_history: 10,
                log_path: None,
            },
            ..Config::default()
        }
    }

    fn assistant(dir: &std::path::Path) -> (Assistant, Arc<Recorder>) {
        let recorder = Arc::new(Recorder::default());
        let mut registry = ActionRegistry::new();
        registry
            .register_unary("open_application", |app| Ok(format!("Opening {}", app)))
            .register_nullary("get_time", || anyhow::bail!("clock unavailable"));
        let table = PatternTable::load(&dir.join("commands.json")).unwrap();
        let a = Assistant::new(config(dir), table, registry, Box::new(Arc::clone(&recorder)));
        (a, recorder)
    }

    #[test]
    fn test_respond_runs_action_with_param() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = assistant(dir.path());
        assert_eq!(a.respond("open notepad"), "Opening notepad");
    }

    #[test]
    fn test_respond_joke_from_response_set() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = assistant(dir.path());
        let reply = a.respond("tell me a joke");
        assert!(JOKES.contains(&reply.as_str()));
    }

    #[test]
    fn test_respond_unknown() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = assistant(dir.path());
        let reply = a.respond("asdkfj qweoiu");
        assert!(NOT_UNDERSTOOD.contains(&reply.as_str()));
    }

    #[test]
    fn test_respond_failing_and_unregistered_actions() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = assistant(dir.path());
        assert_eq!(a.respond("what time is it"), APOLOGY);
        assert_eq!(
            a.respond("what's the weather"),
            "Action 'get_weather' not implemented yet."
        );
    }

    #[test]
    fn test_text_command_records_and_speaks() {
        let dir = tempfile::tempdir().unwrap();
        let (a, recorder) = assistant(dir.path());
        let reply = a.process_text_command("open calculator");

        assert_eq!(reply, "Opening calculator");
        assert_eq!(*recorder.0.lock().unwrap(), vec!["Opening calculator"]);
        let context = a.memory().get_context();
        assert_eq!(context.len(), 2);
        assert_eq!(context[0].content, "open calculator");
        assert_eq!(context[1].content, "Opening calculator");
    }

    #[test]
    fn test_update_then_reload_patterns() {
        let dir = tempfile::tempdir().unwrap();
        let (a, _) = assistant(dir.path());
        a.update_patterns(|t| {
            t.upsert(PatternEntry {
                intent: "thanks".into(),
                patterns: vec![Pattern::compile("thanks", "thank you").unwrap()],
                reply: Reply::Responses(vec!["You're welcome.".into()]),
            })
        })
        .unwrap();
        assert_eq!(a.respond("thank you"), "You're welcome.");

        let count = a.reload_patterns().unwrap();
        assert_eq!(count, PatternTable::builtin().unwrap().len() + 1);
        assert_eq!(a.match_command("thank you").unwrap().intent, "thanks");
    }
}
