//! Safety-block detection.
//!
//! Two signals exist. The prompt checker tool reports a structured
//! `prompt_blocked_by_safety` flag, which is authoritative. Free-text phrase
//! matching is a heuristic fallback and will produce false positives on model
//! text that merely talks about safety; it only runs when the checker said
//! nothing.

use serde_json::Value;

use crate::decode::decode_object;
use crate::response::AgentResponse;

pub const DEFAULT_BLOCK_MESSAGE: &str = "Prompt blocked by safety checks.";

pub const DEFAULT_PHRASES: &[&str] = &[
    "blocked by safety",
    "safety policies",
    "not available for this request due to safety",
    "prompt blocked",
    "blocked by model armor",
    "modify your request and try again",
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SafetyVerdict {
    Blocked { message: String },
    /// A structured signal explicitly reported the prompt as safe.
    Cleared,
    /// No opinion; the next signal gets to decide.
    Silent,
}

pub trait SafetySignal: Send + Sync {
    fn assess(&self, response: &AgentResponse) -> SafetyVerdict;
}

/// Reads the prompt checker's function response.
#[derive(Debug, Clone)]
pub struct StructuredSafetyCheck {
    checker_name: String,
}

impl StructuredSafetyCheck {
    pub fn new(checker_name: impl Into<String>) -> Self {
        Self { checker_name: checker_name.into() }
    }
}

impl SafetySignal for StructuredSafetyCheck {
    fn assess(&self, response: &AgentResponse) -> SafetyVerdict {
        let mut cleared = false;

        for checked in response
            .function_responses()
            .filter(|r| r.name.contains(&self.checker_name))
        {
            let Some(result) = decode_object(checked.result()) else {
                continue;
            };
            match result.get("prompt_blocked_by_safety") {
                Some(Value::Bool(true)) => {
                    let message = result
                        .get("llm_response_text")
                        .and_then(Value::as_str)
                        .filter(|text| !text.trim().is_empty())
                        .or_else(|| response.first_text())
                        .unwrap_or(DEFAULT_BLOCK_MESSAGE);
                    return SafetyVerdict::Blocked { message: message.to_string() };
                }
                Some(Value::Bool(false)) => cleared = true,
                _ => {}
            }
        }

        if cleared {
            SafetyVerdict::Cleared
        } else {
            SafetyVerdict::Silent
        }
    }
}

/// Case-insensitive phrase list, matched against every text part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SafetyPhrases {
    phrases: Vec<String>,
}

impl SafetyPhrases {
    pub fn new<I, S>(phrases: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let phrases = phrases
            .into_iter()
            .map(|p| p.as_ref().trim().to_lowercase())
            .filter(|p| !p.is_empty())
            .collect();
        Self { phrases }
    }

    pub fn len(&self) -> usize {
        self.phrases.len()
    }

    pub fn is_empty(&self) -> bool {
        self.phrases.is_empty()
    }

    pub fn matches(&self, text: &str) -> bool {
        let text = text.to_lowercase();
        self.phrases.iter().any(|phrase| text.contains(phrase.as_str()))
    }
}

impl Default for SafetyPhrases {
    fn default() -> Self {
        Self::new(DEFAULT_PHRASES)
    }
}

#[derive(Debug, Clone, Default)]
pub struct PhraseMatchSafetyCheck {
    phrases: SafetyPhrases,
}

impl PhraseMatchSafetyCheck {
    pub fn new(phrases: SafetyPhrases) -> Self {
        Self { phrases }
    }
}

impl SafetySignal for PhraseMatchSafetyCheck {
    fn assess(&self, response: &AgentResponse) -> SafetyVerdict {
        match response.texts().find(|text| self.phrases.matches(text)) {
            Some(text) => SafetyVerdict::Blocked { message: text.to_string() },
            None => SafetyVerdict::Silent,
        }
    }
}
