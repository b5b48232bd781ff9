use serde::Deserialize;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_CONFIG_PATH: &str = "config.toml";

#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    #[serde(default = "default_name")]
    pub name: String,
    #[serde(default)]
    pub wake: WakeConfig,
    #[serde(default)]
    pub matcher: MatcherConfig,
    #[serde(default)]
    pub listen: ListenConfig,
    #[serde(default)]
    pub failures: FailureConfig,
    #[serde(default)]
    pub memory: MemoryConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub actions: ActionsConfig,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            name: default_name(),
            wake: WakeConfig::default(),
            matcher: MatcherConfig::default(),
            listen: ListenConfig::default(),
            failures: FailureConfig::default(),
            memory: MemoryConfig::default(),
            logging: LoggingConfig::default(),
            actions: ActionsConfig::default(),
        }
    }
}

fn default_name() -> String {
    "Jarvis".into()
}

// ============================================================================
// Wake Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct WakeConfig {
    /// Canonical wake phrases, any substring hit activates
    #[serde(default = "default_wake_phrases")]
    pub phrases: Vec<String>,

    /// Single word the per-word fuzzy fallback compares against
    #[serde(default = "default_activation_word")]
    pub activation_word: String,

    /// Known mis-hearings of the wake phrase
    #[serde(default = "default_variants")]
    pub variants: Vec<String>,

    /// A variant only counts when one of these words corroborates it
    #[serde(default = "default_anchors")]
    pub anchors: Vec<String>,

    /// Per-word similarity above which a token counts as the activation word (0.0-1.0)
    #[serde(default = "default_fuzzy_threshold")]
    pub fuzzy_threshold: f64,

    /// Similarity above which a rejected utterance gets a "did you mean" hint
    #[serde(default = "default_hint_threshold")]
    pub hint_threshold: f64,

    /// Spoken right after the wake word is detected
    #[serde(default = "default_acknowledgment")]
    pub acknowledgment: String,
}

impl Default for WakeConfig {
    fn default() -> Self {
        Self {
            phrases: default_wake_phrases(),
            activation_word: default_activation_word(),
            variants: default_variants(),
            anchors: default_anchors(),
            fuzzy_threshold: default_fuzzy_threshold(),
            hint_threshold: default_hint_threshold(),
            acknowledgment: default_acknowledgment(),
        }
    }
}

fn default_wake_phrases() -> Vec<String> {
    [
        "jarvis",
        "hey jarvis",
        "ok jarvis",
        "hello jarvis",
        "hi jarvis",
        "yo jarvis",
        "activate jarvis",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_activation_word() -> String {
    "jarvis".into()
}

fn default_variants() -> Vec<String> {
    [
        "jar vis",
        "jar west",
        "jar was",
        "jar this",
        "julius",
        "jar of",
        "jar is",
        "job is",
        "hello jar vis",
        "hey jar vis",
        "hi jar vis",
        "jokes",
        "job",
        "jar",
        "just",
        "jars",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

fn default_anchors() -> Vec<String> {
    vec!["jar".into(), "job".into(), "just".into()]
}

fn default_fuzzy_threshold() -> f64 {
    0.7
}

fn default_hint_threshold() -> f64 {
    0.6
}

fn default_acknowledgment() -> String {
    "Yes, how can I help you?".into()
}

// ============================================================================
// Matcher Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MatcherConfig {
    /// JSON file holding the pattern table
    #[serde(default = "default_patterns_path")]
    pub patterns_path: PathBuf,

    /// Minimum score (exclusive, 0-100) for an intent to be accepted
    #[serde(default = "default_match_threshold")]
    pub threshold: u8,

    /// Score assigned to any wildcard pattern that matches structurally
    #[serde(default = "default_wildcard_score")]
    pub wildcard_score: u8,
}

impl Default for MatcherConfig {
    fn default() -> Self {
        Self {
            patterns_path: default_patterns_path(),
            threshold: default_match_threshold(),
            wildcard_score: default_wildcard_score(),
        }
    }
}

fn default_patterns_path() -> PathBuf {
    PathBuf::from("data/commands.json")
}

fn default_match_threshold() -> u8 {
    70
}

fn default_wildcard_score() -> u8 {
    90
}

// ============================================================================
// Listen Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ListenConfig {
    /// How long to wait for speech to start while idle (seconds)
    #[serde(default = "default_idle_timeout")]
    pub idle_timeout_secs: f32,
    /// Longest phrase accepted while idle (seconds)
    #[serde(default = "default_idle_phrase")]
    pub idle_phrase_secs: f32,
    /// How long to wait for a command after the wake word (seconds)
    #[serde(default = "default_command_timeout")]
    pub command_timeout_secs: f32,
    /// Longest command phrase accepted (seconds)
    #[serde(default = "default_command_phrase")]
    pub command_phrase_secs: f32,
}

impl Default for ListenConfig {
    fn default() -> Self {
        Self {
            idle_timeout_secs: default_idle_timeout(),
            idle_phrase_secs: default_idle_phrase(),
            command_timeout_secs: default_command_timeout(),
            command_phrase_secs: default_command_phrase(),
        }
    }
}

impl ListenConfig {
    pub fn idle_timeout(&self) -> Duration {
        secs(self.idle_timeout_secs, default_idle_timeout())
    }

    pub fn idle_phrase(&self) -> Duration {
        secs(self.idle_phrase_secs, default_idle_phrase())
    }

    pub fn command_timeout(&self) -> Duration {
        secs(self.command_timeout_secs, default_command_timeout())
    }

    pub fn command_phrase(&self) -> Duration {
        secs(self.command_phrase_secs, default_command_phrase())
    }
}

/// Negative and NaN clamp to zero; infinite or too large falls back to `default`
fn secs(v: f32, default: f32) -> Duration {
    Duration::try_from_secs_f32(v.max(0.0)).unwrap_or_else(|_| Duration::from_secs_f32(default))
}

fn default_idle_timeout() -> f32 {
    3.0
}
fn default_idle_phrase() -> f32 {
    1.5
}
fn default_command_timeout() -> f32 {
    8.0
}
fn default_command_phrase() -> f32 {
    3.0
}

// ============================================================================
// Failure Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct FailureConfig {
    /// Consecutive failures before the audio input is rebuilt
    #[serde(default = "default_soft_limit")]
    pub soft_limit: u32,
    /// Consecutive failures after which the session gives up
    #[serde(default = "default_hard_limit")]
    pub hard_limit: u32,
    /// Pause after each failure before retrying (milliseconds)
    #[serde(default = "default_retry_delay")]
    pub retry_delay_ms: u64,
}

impl Default for FailureConfig {
    fn default() -> Self {
        Self {
            soft_limit: default_soft_limit(),
            hard_limit: default_hard_limit(),
            retry_delay_ms: default_retry_delay(),
        }
    }
}

impl FailureConfig {
    pub fn retry_delay(&self) -> Duration {
        Duration::from_millis(self.retry_delay_ms)
    }
}

fn default_soft_limit() -> u32 {
    5
}
fn default_hard_limit() -> u32 {
    10
}
fn default_retry_delay() -> u64 {
    2000
}

// ============================================================================
// Memory Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct MemoryConfig {
    /// Turns kept in memory, oldest evicted first
    #[serde(default = "default_max_history")]
    pub max_history: usize,
    /// Append-only conversation log, `None` disables it
    #[serde(default = "default_conversation_log")]
    pub log_path: Option<PathBuf>,
}

impl Default for MemoryConfig {
    fn default() -> Self {
        Self {
            max_history: default_max_history(),
            log_path: default_conversation_log(),
        }
    }
}

fn default_max_history() -> usize {
    10
}

fn default_conversation_log() -> Option<PathBuf> {
    Some(PathBuf::from("data/conversation_log.txt"))
}

// ============================================================================
// Logging Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Default filter when RUST_LOG is unset
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Optional log file written in addition to stderr
    #[serde(default = "default_log_file")]
    pub file: Option<PathBuf>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

fn default_log_level() -> String {
    "info".into()
}

fn default_log_file() -> Option<PathBuf> {
    Some(PathBuf::from("logs/jarvis.log"))
}

// ============================================================================
// Actions Config
// ============================================================================

#[derive(Debug, Clone, Deserialize)]
pub struct ActionsConfig {
    /// Location reported by the weather handler
    #[serde(default = "default_location")]
    pub default_location: String,
    /// The shutdown intent really powers the machine off only when set
    #[serde(default)]
    pub allow_shutdown: bool,
}

impl Default for ActionsConfig {
    fn default() -> Self {
        Self {
            default_location: default_location(),
            allow_shutdown: false,
        }
    }
}

fn default_location() -> String {
    "New York".into()
}

/// Where the running configuration came from
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigSource {
    /// No file at the path
    Defaults,
    File(PathBuf),
    /// The file exists but could not be used; defaults are in effect
    Fallback { path: PathBuf, error: String },
}

impl ConfigSource {
    /// Log the outcome; call once a subscriber is installed
    pub fn report(&self) {
        match self {
            ConfigSource::Defaults => tracing::debug!("no config file, using defaults"),
            ConfigSource::File(path) => tracing::info!("loaded config from {}", path.display()),
            ConfigSource::Fallback { path, error } => {
                tracing::warn!("ignoring {}: {}; using defaults", path.display(), error)
            }
        }
    }
}

impl Config {
    /// Load `config.toml` from the working directory, falling back to defaults
    pub fn load() -> Self {
        let (config, source) = Self::load_or_default(Path::new(DEFAULT_CONFIG_PATH));
        source.report();
        config
    }

    /// Load from `path`; a missing or broken file gives the defaults.
    ///
    /// Nothing is logged here, so the caller can set up logging from the
    /// result before reporting the [`ConfigSource`].
    pub fn load_or_default(path: &Path) -> (Self, ConfigSource) {
        if !path.exists() {
            return (Config::default(), ConfigSource::Defaults);
        }
        match Self::from_path(path) {
            Ok(config) => (config, ConfigSource::File(path.to_path_buf())),
            Err(e) => (
                Config::default(),
                ConfigSource::Fallback {
                    path: path.to_path_buf(),
                    error: format!("{:#}", e),
                },
            ),
        }
    }

    /// Strict load: any read or parse error is returned
    pub fn from_path(path: &Path) -> anyhow::Result<Self> {
        let text = fs::read_to_string(path)?;
        let config: Config = toml::from_str(&text)?;
        Ok(config)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = Config::default();
        assert_eq!(config.name, "Jarvis");
        assert_eq!(config.matcher.threshold, 70);
        assert_eq!(config.matcher.wildcard_score, 90);
        assert!((config.wake.fuzzy_threshold - 0.7).abs() < f64::EPSILON);
        assert!(config.wake.phrases.contains(&"hey jarvis".to_string()));
        assert!(config.failures.soft_limit < config.failures.hard_limit);
    }

    #[test]
    fn test_partial_file_keeps_defaults() {
        let config: Config = toml::from_str(
            r#"
            name = "Friday"

            [matcher]
            threshold = 80

            [failures]
            soft_limit = 2
            "#,
        )
        .unwrap();

        assert_eq!(config.name, "Friday");
        assert_eq!(config.matcher.threshold, 80);
        assert_eq!(config.matcher.wildcard_score, 90);
        assert_eq!(config.failures.soft_limit, 2);
        assert_eq!(config.failures.hard_limit, 10);
        assert_eq!(config.memory.max_history, 10);
    }

    #[test]
    fn test_listen_durations() {
        let listen = ListenConfig::default();
        assert_eq!(listen.idle_timeout(), Duration::from_secs(3));
        assert_eq!(listen.command_timeout(), Duration::from_secs(8));
        assert_eq!(listen.idle_phrase(), Duration::from_millis(1500));
    }

    #[test]
    fn test_out_of_range_durations_fall_back() {
        let listen: ListenConfig = toml::from_str(
            r#"
            idle_timeout_secs = inf
            command_timeout_secs = 1e30
            idle_phrase_secs = -2.0
            command_phrase_secs = nan
            "#,
        )
        .unwrap();
        assert_eq!(listen.idle_timeout(), Duration::from_secs(3));
        assert_eq!(listen.command_timeout(), Duration::from_secs(8));
        assert_eq!(listen.idle_phrase(), Duration::ZERO);
        assert_eq!(listen.command_phrase(), Duration::ZERO);
    }

    #[test]
    fn test_missing_file_gives_defaults() {
        let (config, source) = Config::load_or_default(Path::new("/nonexistent/jarvis/config.toml"));
        assert_eq!(config.name, "Jarvis");
        assert_eq!(source, ConfigSource::Defaults);
    }

    #[test]
    fn test_good_file_is_loaded() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "name = \"Friday\"\n").unwrap();

        let (config, source) = Config::load_or_default(&path);
        assert_eq!(config.name, "Friday");
        assert_eq!(source, ConfigSource::File(path));
    }

    #[test]
    fn test_broken_file_falls_back_and_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        fs::write(&path, "name = [unclosed").unwrap();

        assert!(Config::from_path(&path).is_err());
        let (config, source) = Config::load_or_default(&path);
        assert_eq!(config.name, "Jarvis");
        assert!(matches!(&source, ConfigSource::Fallback { path: p, .. } if *p == path));

        let logged = capture_logs(|| source.report());
        assert!(logged.contains("WARN"), "{}", logged);
        assert!(logged.contains("config.toml"), "{}", logged);
        assert!(logged.contains("using defaults"), "{}", logged);
    }

    /// Run `f` under a plain-text subscriber and return what it wrote
    fn capture_logs(f: impl FnOnce()) -> String {
        use std::io::Write;
        use std::sync::{Arc, Mutex};

        #[derive(Clone, Default)]
        struct Buffer(Arc<Mutex<Vec<u8>>>);

        impl Write for Buffer {
            fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
                self.0.lock().unwrap().extend_from_slice(buf);
                Ok(buf.len())
            }

            fn flush(&mut self) -> std::io::Result<()> {
                Ok(())
            }
        }

        let buffer = Buffer::default();
        let writer = buffer.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_writer(move || writer.clone())
            .with_ansi(false)
            .finish();
        tracing::subscriber::with_default(subscriber, f);

        let bytes = buffer.0.lock().unwrap().clone();
        String::from_utf8(bytes).unwrap()
    }
}
