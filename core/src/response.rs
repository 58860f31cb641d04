//! Boundary validation for agent responses.
//!
//! The backend returns a JSON array of events. Each event may carry
//! `content.parts`, and every part holds at most one of free text, a function
//! call or a function response. Events and parts that do not fit that shape
//! are dropped here, so nothing downstream touches unchecked fields.

use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionCall {
    pub name: String,
    pub args: Value,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FunctionResponse {
    pub name: String,
    pub response: Value,
}

impl FunctionResponse {
    /// The tool's `result` field, or the whole response when there is none.
    pub fn result(&self) -> &Value {
        match self.response.get("result") {
            Some(result) => result,
            None => &self.response,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Part {
    Text(String),
    FunctionCall(FunctionCall),
    FunctionResponse(FunctionResponse),
}

/// A validated agent response: every part of every event, in order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AgentResponse {
    pub parts: Vec<Part>,
}

#[derive(Debug, PartialEq)]
pub enum ShapeError {
    NotAnArray,
}

// Wire shapes. Everything is optional; presence is checked when converting.
#[derive(Deserialize)]
struct WireEvent {
    content: Option<WireContent>,
}

#[derive(Deserialize)]
struct WireContent {
    #[serde(default)]
    parts: Vec<Value>,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
struct WirePart {
    text: Option<String>,
    #[serde(alias = "function_call")]
    function_call: Option<WireFunctionCall>,
    #[serde(alias = "function_response")]
    function_response: Option<WireFunctionResponse>,
}

#[derive(Deserialize)]
struct WireFunctionCall {
    name: Option<String>,
    #[serde(default)]
    args: Value,
}

#[derive(Deserialize)]
struct WireFunctionResponse {
    name: Option<String>,
    #[serde(default)]
    response: Value,
}

impl AgentResponse {
    pub fn from_value(payload: &Value) -> Result<Self, ShapeError> {
        let events = payload.as_array().ok_or(ShapeError::NotAnArray)?;

        let mut parts = Vec::new();
        for (index, event) in events.iter().enumerate() {
            let event: WireEvent = match serde_json::from_value(event.clone()) {
                Ok(event) => event,
                Err(e) => {
                    debug!(index, error = %e, "skipping agent event with unexpected shape");
                    continue;
                }
            };
            let Some(content) = event.content else {
                continue;
            };
            for raw in content.parts {
                match serde_json::from_value::<WirePart>(raw) {
                    Ok(part) => parts.extend(part.into_parts()),
                    Err(e) => debug!(index, error = %e, "skipping part with unexpected shape"),
                }
            }
        }

        Ok(Self { parts })
    }

    pub fn texts(&self) -> impl Iterator<Item = &str> {
        self.parts.iter().filter_map(|part| match part {
            Part::Text(text) => Some(text.as_str()),
            _ => None,
        })
    }

    pub fn function_responses(&self) -> impl Iterator<Item = &FunctionResponse> {
        self.parts.iter().filter_map(|part| match part {
            Part::FunctionResponse(response) => Some(response),
            _ => None,
        })
    }

    pub fn function_calls(&self) -> impl Iterator<Item = &FunctionCall> {
        self.parts.iter().filter_map(|part| match part {
            Part::FunctionCall(call) => Some(call),
            _ => None,
        })
    }

    pub fn has_function_call(&self) -> bool {
        self.function_calls().next().is_some()
    }

    pub fn first_text(&self) -> Option<&str> {
        self.texts().next()
    }
}

impl WirePart {
    fn into_parts(self) -> Vec<Part> {
        let mut parts = Vec::new();
        if let Some(text) = self.text {
            parts.push(Part::Text(text));
        }
        if let Some(call) = self.function_call {
            parts.push(Part::FunctionCall(FunctionCall {
                name: call.name.unwrap_or_default(),
                args: call.args,
            }));
        }
        if let Some(response) = self.function_response {
            parts.push(Part::FunctionResponse(FunctionResponse {
                name: response.name.unwrap_or_default(),
                response: response.response,
            }));
        }
        parts
    }
}
