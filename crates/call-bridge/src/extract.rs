//! Shape-tolerant lookups over OmniDimension responses
//!
//! The API does not commit to one response layout. Payloads may arrive bare,
//! wrapped in a `{"status": .., "json": ..}` envelope, or with the useful part
//! under `data`. Every helper here is an ordered chain of optional lookups that
//! returns the first match.

use serde_json::{Map, Value};
use std::fmt;

/// Keys that may carry a call identifier, in lookup order
pub const ID_KEYS: [&str; 4] = ["call_id", "id", "uuid", "requestId"];

/// Wrapper keys checked, in order, below the top-level object
pub const WRAPPER_KEYS: [&str; 2] = ["json", "data"];

pub const CALL_LIST_KEYS: [&str; 3] = ["call_log_data", "data", "calls"];
pub const NUMBER_LIST_KEYS: [&str; 3] = ["phone_numbers", "data", "numbers"];

const TRANSCRIPT_KEYS: [&str; 2] = ["transcript", "text"];
const MESSAGE_LIST_KEYS: [&str; 2] = ["messages", "conversation"];
const NUMBER_KEYS: [&str; 3] = ["phone_number", "number", "name"];
const DEFAULT_ROLE: &str = "User";

/// Call identifier as the API returned it
#[derive(Debug, Clone, PartialEq)]
pub struct CallId {
    raw: Value,
}

impl CallId {
    /// Accepts non-empty strings and numbers; anything else is treated as absent
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) if !s.is_empty() => Some(Self { raw: value.clone() }),
            Value::Number(_) => Some(Self { raw: value.clone() }),
            _ => None,
        }
    }

    /// The identifier exactly as received, for echoing back to the caller
    pub fn raw(&self) -> &Value {
        &self.raw
    }

    /// Integer form, when the identifier is or parses as one
    pub fn as_integer(&self) -> Option<i64> {
        match &self.raw {
            Value::Number(n) => n.as_i64(),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Path segment for detail lookups, preferring the integer form
    pub fn path_segment(&self) -> String {
        match self.as_integer() {
            Some(n) => n.to_string(),
            None => urlencoding::encode(&self.to_string()).into_owned(),
        }
    }
}

impl fmt::Display for CallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.raw {
            Value::String(s) => f.write_str(s),
            other => write!(f, "{}", other),
        }
    }
}

/// First identifier under any of [`ID_KEYS`] in one object
pub fn id_in(value: &Value) -> Option<CallId> {
    let object = value.as_object()?;
    ID_KEYS
        .iter()
        .find_map(|key| object.get(*key).and_then(CallId::from_value))
}

/// Identifier from a dispatch response: top level, then `json`, then `data`
pub fn dispatch_id(response: &Value) -> Option<CallId> {
    id_in(response).or_else(|| {
        WRAPPER_KEYS
            .iter()
            .find_map(|key| response.get(*key).and_then(id_in))
    })
}

/// Drops each wrapper in `keys`, in order, when it is present as an object
pub fn unwrap_nested<'a>(mut value: &'a Value, keys: &[&str]) -> &'a Value {
    for key in keys {
        if let Some(inner) = value.get(*key).filter(|v| v.is_object()) {
            value = inner;
        }
    }
    value
}

/// First non-empty array under `keys`, after dropping a `json` envelope.
/// A bare top-level array is accepted as the list itself.
pub fn list_in<'a>(response: &'a Value, keys: &[&str]) -> &'a [Value] {
    let body = unwrap_nested(response, &["json"]);

    if let Value::Array(items) = body {
        return items.as_slice();
    }

    keys.iter()
        .find_map(|key| {
            body.get(*key)
                .and_then(Value::as_array)
                .filter(|items| !items.is_empty())
        })
        .map(Vec::as_slice)
        .unwrap_or(&[])
}

/// Transcript text from a call-log detail object.
///
/// Prefers a direct `transcript`/`text` field, then synthesizes one line per
/// entry of `messages`/`conversation` as `role: content`.
pub fn transcript(detail: &Value) -> Option<String> {
    let direct = TRANSCRIPT_KEYS
        .iter()
        .find_map(|key| detail.get(*key).and_then(render_transcript));
    if direct.is_some() {
        return direct;
    }

    MESSAGE_LIST_KEYS.iter().find_map(|key| {
        detail
            .get(*key)
            .and_then(Value::as_array)
            .and_then(|items| join_lines(items))
    })
}

/// Any non-empty transcript value as text. Lists go through the same
/// `role: content` rendering as `messages`.
fn render_transcript(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Array(items) => join_lines(items),
        Value::Object(fields) if !fields.is_empty() => Some(value.to_string()),
        Value::Number(n) if n.as_f64() != Some(0.0) => Some(n.to_string()),
        Value::Bool(true) => Some(value.to_string()),
        _ => None,
    }
}

fn join_lines(items: &[Value]) -> Option<String> {
    let joined = items
        .iter()
        .map(message_line)
        .collect::<Vec<_>>()
        .join("\n");

    (!joined.is_empty()).then_some(joined)
}

fn message_line(message: &Value) -> String {
    match message {
        Value::Object(fields) => {
            let role = fields
                .get("role")
                .and_then(Value::as_str)
                .unwrap_or(DEFAULT_ROLE);
            let content = non_empty_str(fields.get("content"))
                .or_else(|| non_empty_str(fields.get("text")))
                .unwrap_or("");
            format!("{}: {}", role, content)
        }
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// Field value or JSON null
pub fn field_or_null(object: &Value, key: &str) -> Value {
    object.get(key).cloned().unwrap_or(Value::Null)
}

/// `{"id": .., "number": ..}` summary for one phone-number entry
pub fn number_summary(entry: &Value) -> Value {
    let number = NUMBER_KEYS
        .iter()
        .find_map(|key| entry.get(*key).filter(|v| !v.is_null()).cloned())
        .unwrap_or(Value::Null);

    let mut summary = Map::new();
    summary.insert(
        "id".to_string(),
        id_in(entry).map(|id| id.raw().clone()).unwrap_or(Value::Null),
    );
    summary.insert("number".to_string(), number);
    Value::Object(summary)
}

fn non_empty_str(value: Option<&Value>) -> Option<&str> {
    value.and_then(Value::as_str).filter(|s| !s.is_empty())
}
