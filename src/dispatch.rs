//! Dispatch a matched intent to canned responses or a registered action
//!
//! This is the failure boundary for handlers: an error or panic inside a
//! handler becomes [`APOLOGY`] and is logged, nothing propagates upward.

use std::collections::HashMap;
use std::panic::{AssertUnwindSafe, catch_unwind};

use rand::seq::SliceRandom;

use crate::patterns::{PatternEntry, Reply};

pub const APOLOGY: &str = "Sorry, I encountered an error processing that command.";

pub type Handler = Box<dyn Fn(&[String]) -> anyhow::Result<String> + Send + Sync>;

/// Open mapping from action id to handler, filled at startup
#[derive(Default)]
pub struct ActionRegistry {
    handlers: HashMap<String, Handler>,
}

impl ActionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler taking the raw positional params
    pub fn register<F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        F: Fn(&[String]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        if self
            .handlers
            .insert(action.to_string(), Box::new(handler))
            .is_some()
        {
            tracing::debug!("action '{}' re-registered", action);
        }
        self
    }

    /// Register a handler with no arguments
    pub fn register_nullary<F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        F: Fn() -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register(action, move |_| handler())
    }

    /// Register a handler taking the first param, `""` when absent
    pub fn register_unary<F>(&mut self, action: &str, handler: F) -> &mut Self
    where
        F: Fn(&str) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        self.register(action, move |params| handler(param(params, 0)))
    }

    pub fn get(&self, action: &str) -> Option<&Handler> {
        self.handlers.get(action)
    }

    pub fn contains(&self, action: &str) -> bool {
        self.handlers.contains_key(action)
    }

    pub fn actions(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.handlers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

/// Positional param, missing ones read as empty
pub fn param(params: &[String], index: usize) -> &str {
    params.get(index).map(String::as_str).unwrap_or("")
}

pub fn not_implemented(action: &str) -> String {
    format!("Action '{}' not implemented yet.", action)
}

pub struct Dispatcher {
    registry: ActionRegistry,
}

impl Dispatcher {
    pub fn new(registry: ActionRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &ActionRegistry {
        &self.registry
    }

    pub fn dispatch(&self, entry: &PatternEntry, params: &[String]) -> String {
        self.dispatch_reply(&entry.intent, &entry.reply, params)
    }

    /// Produce the spoken reply; never fails
    pub fn dispatch_reply(&self, intent: &str, reply: &Reply, params: &[String]) -> String {
        match reply {
            Reply::Responses(responses) => match responses.choose(&mut rand::thread_rng()) {
                Some(response) => response.clone(),
                None => {
                    tracing::warn!("intent '{}' has an empty response set", intent);
                    APOLOGY.to_string()
                }
            },
            Reply::Action(action) => self.run_action(intent, action, params),
        }
    }

    fn run_action(&self, intent: &str, action: &str, params: &[String]) -> String {
        let Some(handler) = self.registry.get(action) else {
            tracing::warn!("intent '{}' names unregistered action '{}'", intent, action);
            return not_implemented(action);
        };

        match catch_unwind(AssertUnwindSafe(|| handler(params))) {
            Ok(Ok(response)) => response,
            Ok(Err(e)) => {
                tracing::error!("action '{}' failed: {:#}", action, e);
                APOLOGY.to_string()
            }
            Err(_) => {
                tracing::error!("action '{}' panicked", action);
                APOLOGY.to_string()
            }
        }
    }
}
