//! Error types for the assistant core

use std::path::PathBuf;

use thiserror::Error;

/// Errors loading, validating or persisting the pattern table
#[derive(Debug, Error)]
pub enum PatternError {
    #[error("failed to read pattern file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to write pattern file {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("invalid pattern file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: serde_json::Error,
    },

    #[error("failed to serialize pattern table: {0}")]
    Serialize(#[from] serde_json::Error),

    /// An entry must carry exactly one of `responses` / `action`
    #[error("intent '{0}' must define exactly one of 'responses' or 'action'")]
    AmbiguousReply(String),

    #[error("intent '{intent}': pattern '{pattern}' has more than one wildcard")]
    TooManyWildcards { intent: String, pattern: String },

    #[error("intent '{intent}': pattern '{pattern}' did not compile: {source}")]
    Regex {
        intent: String,
        pattern: String,
        source: regex::Error,
    },
}

/// Failures from the speech-to-text collaborator.
///
/// Timeouts and silence are not errors; they surface as `Ok(None)`.
#[derive(Debug, Error)]
pub enum TranscriptionError {
    #[error("transcription service error: {0}")]
    Service(String),

    #[error("audio device error: {0}")]
    Device(String),
}

#[derive(Debug, Error)]
#[error("speech output failed: {0}")]
pub struct SpeechError(pub String);

/// Errors that terminate the session loop
#[derive(Debug, Error)]
pub enum SessionError {
    /// The hard failure budget was exhausted without a recovery in between
    #[error("audio pipeline failed {failures} consecutive times, giving up")]
    PersistentAudioFailure { failures: u32 },
}
