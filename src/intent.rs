//! Intent matching - picks the best intent for a transcribed command
//!
//! Every pattern of every intent is scored, in table order:
//! - wildcard patterns score a fixed high value when they match structurally
//!   (a structural match is stronger evidence than fuzzy similarity)
//! - literal patterns score [`partial_ratio`] against the command
//!
//! A candidate only replaces the current best when it is strictly better and
//! strictly above the threshold, so ties keep the earlier entry.

use crate::config::MatcherConfig;
use crate::fuzzy::partial_ratio;
use crate::patterns::{Pattern, PatternEntry, PatternTable};

#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    pub intent: String,
    pub pattern: String,
    pub score: u8,
    /// Wildcard captures, trimmed, in capture order
    pub params: Vec<String>,
}

pub struct IntentMatcher {
    threshold: u8,
    wildcard_score: u8,
}

impl Default for IntentMatcher {
    fn default() -> Self {
        Self::new(&MatcherConfig::default())
    }
}

impl IntentMatcher {
    pub fn new(config: &MatcherConfig) -> Self {
        Self {
            threshold: config.threshold,
            wildcard_score: config.wildcard_score,
        }
    }

    /// Best match for `command`, or `None` if nothing clears the threshold
    pub fn find(&self, command: &str, table: &PatternTable) -> Option<MatchResult> {
        self.find_entry(command, table).map(|(_, m)| m)
    }

    /// Like [`find`](Self::find) but also hands back the matched entry
    pub fn find_entry<'t>(
        &self,
        command: &str,
        table: &'t PatternTable,
    ) -> Option<(&'t PatternEntry, MatchResult)> {
        let command = command.trim().to_lowercase();
        if command.is_empty() {
            return None;
        }

        let mut best: Option<(u8, &PatternEntry, &Pattern)> = None;
        for entry in table.entries() {
            for pattern in &entry.patterns {
                let score = self.score(pattern, &command);
                let best_score = best.map(|(s, _, _)| s).unwrap_or(0);
                if score > best_score && score > self.threshold {
                    best = Some((score, entry, pattern));
                }
            }
        }

        let (score, entry, pattern) = best?;
        let params = pattern.captures(&command).unwrap_or_default();
        tracing::debug!(
            intent = %entry.intent,
            pattern = pattern.as_str(),
            score,
            "matched command '{}'",
            command
        );
        Some((
            entry,
            MatchResult {
                intent: entry.intent.clone(),
                pattern: pattern.as_str().to_string(),
                score,
                params,
            },
        ))
    }

    fn score(&self, pattern: &Pattern, command: &str) -> u8 {
        match pattern {
            Pattern::Wildcard { regex, .. } => {
                if regex.is_match(command) {
                    self.wildcard_score
                } else {
                    0
                }
            }
            Pattern::Literal(literal) => partial_ratio(literal, command),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::patterns::Reply;

    fn table() -> PatternTable {
        PatternTable::builtin().unwrap()
    }

    fn entry(intent: &str, patterns: &[&str]) -> PatternEntry {
        PatternEntry {
            intent: intent.into(),
            patterns: patterns
                .iter()
                .map(|p| Pattern::compile(intent, p).unwrap())
                .collect(),
            reply: Reply::Action(intent.into()),
        }
    }

    #[test]
    fn test_wildcard_extracts_param() {
        let m = IntentMatcher::default().find("open notepad", &table()).unwrap();
        assert_eq!(m.intent, "open_application");
        assert_eq!(m.pattern, "open *");
        assert_eq!(m.params, vec!["notepad"]);
        assert!(m.score >= 90);
    }

    #[test]
    fn test_command_is_normalized() {
        let m = IntentMatcher::default()
            .find("  Search for Rust Lifetimes ", &table())
            .unwrap();
        assert_eq!(m.intent, "search");
        assert_eq!(m.params, vec!["rust lifetimes"]);
    }

    #[test]
    fn test_literal_fuzzy_match() {
        let matcher = IntentMatcher::default();
        let m = matcher.find("tell me a joke", &table()).unwrap();
        assert_eq!(m.intent, "joke");
        assert_eq!(m.score, 100);
        assert!(m.params.is_empty());

        let m = matcher.find("what time is it", &table()).unwrap();
        assert_eq!(m.intent, "time");

        let m = matcher.find("give me the system status", &table()).unwrap();
        assert_eq!(m.intent, "system_info");
        assert_eq!(m.pattern, "system status");
    }

    #[test]
    fn test_gibberish_matches_nothing() {
        assert!(IntentMatcher::default().find("asdkfj qweoiu", &table()).is_none());
        assert!(IntentMatcher::default().find("", &table()).is_none());
    }

    #[test]
    fn test_exact_perfect_score_beats_later_wildcard() {
        // "hello" scores 100 on greetings before anything else can beat it
        let m = IntentMatcher::default().find("hello there", &table()).unwrap();
        assert_eq!(m.intent, "greetings");
    }

    #[test]
    fn test_ties_keep_first_entry() {
        let table = {
            let mut t = PatternTable::default();
            t.upsert(entry("first", &["lights"]));
            t.upsert(entry("second", &["lights"]));
            t
        };
        let m = IntentMatcher::default().find("lights", &table).unwrap();
        assert_eq!(m.intent, "first");
    }

    #[test]
    fn test_threshold_is_exclusive() {
        // partial_ratio("turn off", "turn on the lights") == 75
        let strict = IntentMatcher::new(&MatcherConfig {
            threshold: 75,
            ..MatcherConfig::default()
        });
        assert!(strict.find("turn on the lights", &table()).is_none());

        let m = IntentMatcher::default()
            .find("turn on the lights", &table())
            .unwrap();
        assert_eq!(m.intent, "shutdown");
        assert_eq!(m.score, 75);
    }

    #[test]
    fn test_wildcard_score_is_configurable() {
        let matcher = IntentMatcher::new(&MatcherConfig {
            wildcard_score: 95,
            ..MatcherConfig::default()
        });
        let m = matcher.find("launch firefox", &table()).unwrap();
        assert_eq!(m.score, 95);
        assert_eq!(m.params, vec!["firefox"]);
    }

    #[test]
    fn test_find_entry_returns_reply() {
        let table = table();
        let (entry, m) = IntentMatcher::default()
            .find_entry("open calculator", &table)
            .unwrap();
        assert_eq!(entry.reply, Reply::Action("open_application".into()));
        assert_eq!(m.params, vec!["calculator"]);
    }
}
