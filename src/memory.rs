//! Conversation memory - bounded turn history plus an append-only log

use std::collections::VecDeque;
use std::fmt;
use std::fs::OpenOptions;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard};

use crate::config::MemoryConfig;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    User,
    Assistant,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::User => write!(f, "USER"),
            Role::Assistant => write!(f, "ASSISTANT"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConversationTurn {
    pub role: Role,
    pub content: String,
}

pub struct ConversationMemory {
    history: Mutex<VecDeque<ConversationTurn>>,
    max_history: usize,
    log_path: Option<PathBuf>,
}

impl ConversationMemory {
    pub fn new(config: &MemoryConfig) -> Self {
        Self {
            history: Mutex::new(VecDeque::with_capacity(config.max_history)),
            max_history: config.max_history.max(1),
            log_path: config.log_path.clone(),
        }
    }

    /// Memory that keeps no log file
    pub fn in_memory(max_history: usize) -> Self {
        Self::new(&MemoryConfig {
            max_history,
            log_path: None,
        })
    }

    pub fn add_user_message(&self, message: &str) {
        self.push(Role::User, message);
    }

    pub fn add_assistant_message(&self, message: &str) {
        self.push(Role::Assistant, message);
    }

    fn push(&self, role: Role, content: &str) {
        {
            let mut history = self.lock();
            history.push_back(ConversationTurn {
                role,
                content: content.to_string(),
            });
            while history.len() > self.max_history {
                history.pop_front();
            }
        }
        self.append_log(role, content);
    }

    /// Best-effort: a failed write is logged and otherwise ignored
    fn append_log(&self, role: Role, content: &str) {
        let Some(path) = &self.log_path else {
            return;
        };
        let result = (|| {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                std::fs::create_dir_all(parent)?;
            }
            let mut file = OpenOptions::new().create(true).append(true).open(path)?;
            writeln!(file, "{}: {}", role, content.replace('\n', " "))
        })();
        if let Err(e) = result {
            tracing::error!("error saving conversation to {}: {}", path.display(), e);
        }
    }

    /// Snapshot of the retained turns, oldest first
    pub fn get_context(&self) -> Vec<ConversationTurn> {
        self.lock().iter().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn clear(&self) {
        self.lock().clear();
    }

    fn lock(&self) -> MutexGuard<'_, VecDeque<ConversationTurn>> {
        // History stays consistent even if a holder panicked mid-push
        self.history.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub type SharedMemory = Arc<ConversationMemory>;
