//! Pattern table - intent name to trigger patterns and a reply
//!
//! The table is persisted as a JSON object keyed by intent name, in table
//! order:
//!
//! ```json
//! {
//!   "greetings": { "patterns": ["hello", "hi"], "responses": ["Hello!"] },
//!   "open_application": { "patterns": ["open *"], "action": "open_application" }
//! }
//! ```
//!
//! Wildcard patterns are compiled once on load; matching never recompiles.

use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use indexmap::IndexMap;
use regex::Regex;
use serde::{Deserialize, Serialize};

use crate::error::PatternError;

pub const WILDCARD: char = '*';

/// Jokes shared by the default `joke` intent and the `tell_joke` action
pub const JOKES: &[&str] = &[
    "Why don't scientists trust atoms? Because they make up everything!",
    "Why did the scarecrow win an award? He was outstanding in his field!",
    "Why don't eggs tell jokes? They'd crack each other up!",
    "What do you call a fake noodle? An impasta!",
    "Why did the math book look so sad? Because it had too many problems!",
];

/// On-disk shape of one entry
#[derive(Debug, Clone, Serialize, Deserialize)]
struct RawEntry {
    patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    responses: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    action: Option<String>,
}

/// What an intent does once matched
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reply {
    /// Canned responses, one is picked per match
    Responses(Vec<String>),
    /// Key into the action registry
    Action(String),
}

/// A single trigger pattern
#[derive(Debug, Clone)]
pub enum Pattern {
    Literal(String),
    /// Exactly one `*`, compiled to a capturing regex
    Wildcard { source: String, regex: Regex },
}

impl Pattern {
    pub fn compile(intent: &str, source: &str) -> Result<Self, PatternError> {
        let source = source.trim().to_lowercase();
        match source.matches(WILDCARD).count() {
            0 => Ok(Pattern::Literal(source)),
            1 => {
                let (head, tail) = source.split_once(WILDCARD).unwrap_or((source.as_str(), ""));
                let expr = format!("{}(.+){}", regex::escape(head), regex::escape(tail));
                let regex = Regex::new(&expr).map_err(|source_err| PatternError::Regex {
                    intent: intent.to_string(),
                    pattern: source.clone(),
                    source: source_err,
                })?;
                Ok(Pattern::Wildcard { source, regex })
            }
            _ => Err(PatternError::TooManyWildcards {
                intent: intent.to_string(),
                pattern: source,
            }),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Pattern::Literal(s) => s,
            Pattern::Wildcard { source, .. } => source,
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, Pattern::Wildcard { .. })
    }

    /// Trimmed capture groups if this wildcard pattern occurs in `text`
    pub fn captures(&self, text: &str) -> Option<Vec<String>> {
        let Pattern::Wildcard { regex, .. } = self else {
            return None;
        };
        let caps = regex.captures(text)?;
        Some(
            caps.iter()
                .skip(1)
                .map(|m| m.map(|m| m.as_str().trim().to_string()).unwrap_or_default())
                .collect(),
        )
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.is_wildcard() == other.is_wildcard() && self.as_str() == other.as_str()
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct PatternEntry {
    pub intent: String,
    pub patterns: Vec<Pattern>,
    pub reply: Reply,
}

impl PatternEntry {
    fn from_raw(intent: String, raw: RawEntry) -> Result<Self, PatternError> {
        let reply = match (raw.responses, raw.action) {
            (Some(responses), None) => Reply::Responses(responses),
            (None, Some(action)) => Reply::Action(action),
            _ => return Err(PatternError::AmbiguousReply(intent)),
        };
        let patterns = raw
            .patterns
            .iter()
            .map(|p| Pattern::compile(&intent, p))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self {
            intent,
            patterns,
            reply,
        })
    }

    fn to_raw(&self) -> RawEntry {
        let (responses, action) = match &self.reply {
            Reply::Responses(r) => (Some(r.clone()), None),
            Reply::Action(a) => (None, Some(a.clone())),
        };
        RawEntry {
            patterns: self.patterns.iter().map(|p| p.as_str().to_string()).collect(),
            responses,
            action,
        }
    }
}

/// Ordered intent table; order decides ties during matching
#[derive(Debug, Clone, PartialEq, Default)]
pub struct PatternTable {
    entries: Vec<PatternEntry>,
}

impl PatternTable {
    /// Built-in table written out when no pattern file exists yet
    pub fn builtin() -> Result<Self, PatternError> {
        Self::from_raw(default_raw())
    }

    /// Load from `path`, creating and persisting the built-in table if the file is absent
    pub fn load(path: &Path) -> Result<Self, PatternError> {
        if !path.exists() {
            tracing::info!("no pattern file at {}, writing defaults", path.display());
            let table = Self::builtin()?;
            table.save(path)?;
            return Ok(table);
        }

        let text = fs::read_to_string(path).map_err(|source| PatternError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        let raw: IndexMap<String, RawEntry> =
            serde_json::from_str(&text).map_err(|source| PatternError::Parse {
                path: path.to_path_buf(),
                source,
            })?;
        let table = Self::from_raw(raw)?;
        tracing::debug!("loaded {} intents from {}", table.len(), path.display());
        Ok(table)
    }

    /// Write the whole table atomically: temp file in the same directory, then rename
    pub fn save(&self, path: &Path) -> Result<(), PatternError> {
        let json = self.to_json()?;
        let write_err = |source| PatternError::Write {
            path: path.to_path_buf(),
            source,
        };

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent).map_err(write_err)?;
        }

        let tmp = temp_path(path);
        let result = (|| {
            let mut file = fs::File::create(&tmp)?;
            file.write_all(json.as_bytes())?;
            file.write_all(b"\n")?;
            file.sync_all()?;
            fs::rename(&tmp, path)
        })();

        if let Err(e) = result {
            let _ = fs::remove_file(&tmp);
            return Err(write_err(e));
        }
        Ok(())
    }

    pub fn to_json(&self) -> Result<String, PatternError> {
        let raw: IndexMap<&str, RawEntry> = self
            .entries
            .iter()
            .map(|e| (e.intent.as_str(), e.to_raw()))
            .collect();
        Ok(serde_json::to_string_pretty(&raw)?)
    }

    fn from_raw(raw: IndexMap<String, RawEntry>) -> Result<Self, PatternError> {
        let entries = raw
            .into_iter()
            .map(|(intent, entry)| PatternEntry::from_raw(intent, entry))
            .collect::<Result<Vec<_>, _>>()?;
        Ok(Self { entries })
    }

    /// Insert or replace an intent, keeping its position if it already existed
    pub fn upsert(&mut self, entry: PatternEntry) {
        match self.entries.iter_mut().find(|e| e.intent == entry.intent) {
            Some(existing) => *existing = entry,
            None => self.entries.push(entry),
        }
    }

    pub fn get(&self, intent: &str) -> Option<&PatternEntry> {
        self.entries.iter().find(|e| e.intent == intent)
    }

    pub fn entries(&self) -> &[PatternEntry] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn temp_path(path: &Path) -> PathBuf {
    let name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "patterns".to_string());
    path.with_file_name(format!(".{}.tmp", name))
}

fn default_raw() -> IndexMap<String, RawEntry> {
    fn strings(items: &[&str]) -> Vec<String> {
        items.iter().map(|s| s.to_string()).collect()
    }
    fn responses(patterns: &[&str], replies: &[&str]) -> RawEntry {
        RawEntry {
            patterns: strings(patterns),
            responses: Some(strings(replies)),
            action: None,
        }
    }
    fn action(patterns: &[&str], action: &str) -> RawEntry {
        RawEntry {
            patterns: strings(patterns),
            responses: None,
            action: Some(action.to_string()),
        }
    }

    let mut table = IndexMap::new();
    table.insert(
        "greetings".to_string(),
        responses(
            &["hello", "hi", "hey", "good morning", "good evening"],
            &["Hello! How can I assist you?", "Hi there! What can I do for you?"],
        ),
    );
    table.insert(
        "system_info".to_string(),
        action(
            &["system info", "computer info", "pc status", "system status"],
            "get_system_info",
        ),
    );
    table.insert(
        "open_application".to_string(),
        action(&["open *", "launch *", "start *"], "open_application"),
    );
    table.insert(
        "weather".to_string(),
        action(&["weather", "temperature", "forecast"], "get_weather"),
    );
    table.insert(
        "search".to_string(),
        action(&["search for *", "google *", "look up *"], "web_search"),
    );
    table.insert(
        "time".to_string(),
        action(&["what time", "current time", "time now"], "get_time"),
    );
    table.insert(
        "joke".to_string(),
        responses(&["tell me a joke", "joke", "funny"], JOKES),
    );
    table.insert(
        "shutdown".to_string(),
        action(&["shutdown", "turn off", "power off"], "shutdown_system"),
    );
    table.insert(
        "quote".to_string(),
        action(&["quote", "inspire me", "motivate me"], "get_quote"),
    );
    table.insert(
        "music".to_string(),
        action(&["play *", "put on some music"], "play_music"),
    );
    table
}
