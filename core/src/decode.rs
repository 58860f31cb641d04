use serde_json::{Map, Value};

// Tool results arrive either as objects or as JSON text, and some backends
// encode that text a second time. Two passes is the ceiling.
const MAX_DECODE_PASSES: usize = 2;

/// Unwraps `value` into a JSON object, decoding string layers at most twice.
/// Returns `None` for anything that is still not an object after that.
pub fn decode_object(value: &Value) -> Option<Map<String, Value>> {
    let mut current = value.clone();
    for _ in 0..MAX_DECODE_PASSES {
        match current {
            Value::Object(map) => return Some(map),
            Value::String(text) => {
                current = serde_json::from_str(&text).ok()?;
            }
            _ => return None,
        }
    }
    match current {
        Value::Object(map) => Some(map),
        _ => None,
    }
}
