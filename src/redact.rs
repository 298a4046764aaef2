//! Redaction of sensitive fields before payloads reach a log
use serde_json::{Map, Value};

pub const REDACTED: &str = "[REDACTED]";

// matched case-insensitively as substrings of the field name
const SENSITIVE_KEYWORDS: &[&str] = &[
    "password",
    "passwort",
    "secret",
    "token",
    "key",
    "iban",
    "bic",
    "bank",
    "konto",
    "holder",
    "inhaber",
    "credit",
    "card",
    "cvv",
    "authorization",
    "cookie",
];

pub fn is_sensitive_field(field_name: &str) -> bool {
    let lowered = field_name.to_lowercase();
    SENSITIVE_KEYWORDS
        .iter()
        .any(|keyword| lowered.contains(keyword))
}

/// Returns a copy of `value` with every sensitive key's value replaced.
///
/// Sensitive keys are redacted whatever their value type, so a sensitive
/// object is replaced wholesale rather than walked. Objects inside arrays are
/// walked like any other object.
pub fn redact_sensitive_data(value: &Value) -> Value {
    match value {
        Value::Object(map) => Value::Object(redact_map(map)),
        Value::Array(items) => Value::Array(items.iter().map(redact_sensitive_data).collect()),
        other => other.clone(),
    }
}

fn redact_map(map: &Map<String, Value>) -> Map<String, Value> {
    map.iter()
        .map(|(key, value)| {
            let redacted = if is_sensitive_field(key) {
                Value::String(REDACTED.to_owned())
            } else {
                redact_sensitive_data(value)
            };
            (key.clone(), redacted)
        })
        .collect()
}
