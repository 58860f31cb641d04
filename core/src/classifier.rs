use serde::Serialize;
use serde_json::Value;
use tracing::debug;

use crate::config::ClassifierConfig;
use crate::decode::decode_object;
use crate::product::{extract_products, summarize, NormalizedProduct};
use crate::response::{AgentResponse, ShapeError};
use crate::safety::{
    PhraseMatchSafetyCheck, SafetyPhrases, SafetySignal, SafetyVerdict, StructuredSafetyCheck,
    DEFAULT_BLOCK_MESSAGE,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum NoResultsReason {
    #[serde(rename = "no-function-response")]
    NoFunctionResponse,
    #[serde(rename = "empty-result")]
    EmptyResult,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ClassificationOutcome {
    SafetyBlocked { message: String },
    Answered { answer: String },
    ProductsFound { products: Vec<NormalizedProduct>, summary: String },
    NoResults { reason: NoResultsReason },
    Malformed { detail: String },
}

impl ClassificationOutcome {
    /// The chat line shown for this outcome.
    pub fn display_text(&self) -> String {
        match self {
            Self::SafetyBlocked { message } => message.clone(),
            Self::Answered { answer } => answer.clone(),
            Self::ProductsFound { summary, .. } => summary.clone(),
            Self::NoResults { reason: NoResultsReason::EmptyResult } => {
                "No products matched your search. Try different keywords.".to_string()
            }
            Self::NoResults { reason: NoResultsReason::NoFunctionResponse } => {
                "I couldn't search the catalog for that request. Try describing the product you're looking for."
                    .to_string()
            }
            Self::Malformed { .. } => "Sorry, the search results could not be read.".to_string(),
        }
    }

    pub fn products(&self) -> &[NormalizedProduct] {
        match self {
            Self::ProductsFound { products, .. } => products,
            _ => &[],
        }
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Self::SafetyBlocked { .. } => "safety_blocked",
            Self::Answered { .. } => "answered",
            Self::ProductsFound { .. } => "products_found",
            Self::NoResults { .. } => "no_results",
            Self::Malformed { .. } => "malformed",
        }
    }
}

/// Turns one raw agent response into exactly one [`ClassificationOutcome`].
///
/// Precedence, first match wins: shape check, safety block, direct answer,
/// products, then the two no-result cases. Holds no mutable state, so one
/// instance can serve any number of callers.
pub struct ResponseClassifier {
    config: ClassifierConfig,
    structured: StructuredSafetyCheck,
    fallback: Box<dyn SafetySignal>,
}

impl Default for ResponseClassifier {
    fn default() -> Self {
        Self::new(ClassifierConfig::default(), SafetyPhrases::default())
    }
}

impl ResponseClassifier {
    pub fn new(config: ClassifierConfig, phrases: SafetyPhrases) -> Self {
        Self::with_fallback(config, Box::new(PhraseMatchSafetyCheck::new(phrases)))
    }

    /// Swaps the text heuristic for another advisory signal.
    pub fn with_fallback(config: ClassifierConfig, fallback: Box<dyn SafetySignal>) -> Self {
        let structured = StructuredSafetyCheck::new(config.functions.prompt_checker.clone());
        Self { config, structured, fallback }
    }

    pub fn classify(&self, payload: &Value) -> ClassificationOutcome {
        let response = match AgentResponse::from_value(payload) {
            Ok(response) => response,
            Err(ShapeError::NotAnArray) => {
                return ClassificationOutcome::Malformed { detail: "not an array".to_string() };
            }
        };
        self.classify_response(&response)
    }

    pub fn classify_response(&self, response: &AgentResponse) -> ClassificationOutcome {
        if let Some(message) = self.safety_block(response) {
            return ClassificationOutcome::SafetyBlocked { message };
        }

        let names = &self.config.functions;

        let answer = response
            .function_responses()
            .filter(|r| r.name.contains(&names.product_question))
            .find_map(|r| r.result().as_str());
        if let Some(answer) = answer {
            return ClassificationOutcome::Answered { answer: answer.to_string() };
        }

        let Some(search) = response
            .function_responses()
            .find(|r| r.name.contains(&names.catalog_search))
        else {
            return ClassificationOutcome::NoResults { reason: NoResultsReason::NoFunctionResponse };
        };

        if let Some(call) = response.function_calls().find(|c| c.name == search.name) {
            debug!(function = %call.name, args = %call.args, "catalog search was called");
        }

        let products = match decode_object(search.result()) {
            Some(result) => extract_products(&result),
            None => {
                debug!(function = %search.name, "catalog result did not decode to an object");
                Vec::new()
            }
        };

        if products.is_empty() {
            return ClassificationOutcome::NoResults { reason: NoResultsReason::EmptyResult };
        }

        let summary = summarize(&products);
        ClassificationOutcome::ProductsFound { products, summary }
    }

    fn safety_block(&self, response: &AgentResponse) -> Option<String> {
        match self.structured.assess(response) {
            SafetyVerdict::Blocked { message } => return Some(message),
            SafetyVerdict::Cleared => return None,
            SafetyVerdict::Silent => {}
        }

        if let SafetyVerdict::Blocked { message } = self.fallback.assess(response) {
            return Some(message);
        }

        if self.config.block_without_function_call && !response.has_function_call() {
            let message = response.first_text().unwrap_or(DEFAULT_BLOCK_MESSAGE);
            return Some(message.to_string());
        }

        None
    }
}
