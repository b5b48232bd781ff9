//! Wake word detection over transcribed text
//!
//! Transcription of short utterances is unreliable, so activation is a
//! cascade, first hit wins:
//! 1. a canonical wake phrase appears anywhere in the utterance
//! 2. a known mis-hearing appears AND an anchor word corroborates it
//! 3. some word is close enough to the activation word
//!
//! Missing a wake word is preferable to starting a command capture nobody
//! asked for; the anchor rule keeps "jokes" or "job" alone from triggering.

use crate::config::WakeConfig;
use crate::fuzzy::similarity;

/// Which rule of the cascade fired
#[derive(Debug, Clone, PartialEq)]
pub enum WakeTrigger {
    Phrase(String),
    Variant { variant: String, anchor: String },
    Fuzzy { word: String, score: f64 },
}

pub struct WakeWord {
    phrases: Vec<String>,
    activation_word: String,
    variants: Vec<String>,
    anchors: Vec<String>,
    threshold: f64,
}

impl WakeWord {
    pub fn new(config: &WakeConfig) -> Self {
        let lower = |items: &[String]| -> Vec<String> {
            items
                .iter()
                .map(|s| s.trim().to_lowercase())
                .filter(|s| !s.is_empty())
                .collect()
        };
        Self {
            phrases: lower(&config.phrases),
            activation_word: config.activation_word.trim().to_lowercase(),
            variants: lower(&config.variants),
            anchors: lower(&config.anchors),
            threshold: config.fuzzy_threshold,
        }
    }

    pub fn is_wake(&self, utterance: Option<&str>) -> bool {
        utterance.and_then(|u| self.detect(u)).is_some()
    }

    /// Run the cascade, returning the rule that fired
    pub fn detect(&self, utterance: &str) -> Option<WakeTrigger> {
        let text = utterance.trim().to_lowercase();
        if text.is_empty() {
            return None;
        }

        if let Some(phrase) = self.phrases.iter().find(|p| text.contains(p.as_str())) {
            return Some(WakeTrigger::Phrase(phrase.clone()));
        }

        let words = word_spans(&text);

        for variant in &self.variants {
            let Some(start) = text.find(variant.as_str()) else {
                continue;
            };
            if let Some(anchor) = self.corroborating_anchor(variant, start, &words) {
                return Some(WakeTrigger::Variant {
                    variant: variant.clone(),
                    anchor,
                });
            }
        }

        if self.activation_word.is_empty() {
            return None;
        }
        words.iter().find_map(|(_, word)| {
            let score = similarity(word, &self.activation_word);
            (score > self.threshold).then(|| WakeTrigger::Fuzzy {
                word: word.to_string(),
                score,
            })
        })
    }

    /// An anchor counts if it is part of a multi-word variant, or is the word
    /// immediately before or after the span the variant matched
    fn corroborating_anchor(
        &self,
        variant: &str,
        start: usize,
        words: &[(usize, &str)],
    ) -> Option<String> {
        let variant_words: Vec<&str> = variant.split_whitespace().collect();
        if variant_words.len() > 1 {
            if let Some(anchor) = variant_words
                .iter()
                .find(|w| self.anchors.iter().any(|a| a == *w))
            {
                return Some(anchor.to_string());
            }
        }

        let end = start + variant.len();
        let before = words.iter().rev().find(|(pos, word)| *pos + word.len() <= start);
        let after = words.iter().find(|(pos, _)| *pos >= end);
        [before, after]
            .into_iter()
            .flatten()
            .find(|(_, word)| self.anchors.iter().any(|a| a == word))
            .map(|(_, word)| word.to_string())
    }

    /// Wake phrase most similar to the whole utterance, for "did you mean" hints
    pub fn closest_phrase(&self, utterance: &str) -> Option<(&str, f64)> {
        let text = utterance.trim().to_lowercase();
        let mut best: Option<(&str, f64)> = None;
        for phrase in &self.phrases {
            let score = similarity(&text, phrase);
            if best.is_none_or(|(_, s)| score > s) {
                best = Some((phrase.as_str(), score));
            }
        }
        best
    }

    pub fn phrases(&self) -> &[String] {
        &self.phrases
    }
}

/// Words with their byte offsets, edge punctuation stripped
fn word_spans(text: &str) -> Vec<(usize, &str)> {
    let mut words = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_whitespace(), start) {
            (true, Some(s)) => {
                push_word(&mut words, text, s, i);
                start = None;
            }
            (false, None) => start = Some(i),
            _ => {}
        }
    }
    if let Some(s) = start {
        push_word(&mut words, text, s, text.len());
    }
    words
}

fn push_word<'a>(words: &mut Vec<(usize, &'a str)>, text: &'a str, start: usize, end: usize) {
    let raw = &text[start..end];
    let trimmed = raw.trim_start_matches(|c: char| !c.is_alphanumeric());
    let offset = start + (raw.len() - trimmed.len());
    let word = trimmed.trim_end_matches(|c: char| !c.is_alphanumeric());
    if !word.is_empty() {
        words.push((offset, word));
    }
}
