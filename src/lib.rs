//! Jarvis - wake word detection, fuzzy intent matching and action dispatch
//! for a voice command assistant.

pub mod assistant;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod fuzzy;
pub mod handlers;
pub mod intent;
pub mod memory;
pub mod patterns;
pub mod session;
pub mod state;
pub mod transcriber;
pub mod tts;
pub mod wake;

pub use assistant::Assistant;
pub use config::Config;
pub use session::{FailureBudget, SessionEvent, SessionLoop};
