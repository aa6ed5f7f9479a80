//! Command schema, parsing, and normalization.
//!
//! The model's output is adversarial input: it is parsed into
//! `serde_json::Value` first and every field is checked before use. The
//! normalizer rewrites the forbidden `email` alias to `mail` and drops
//! unrecognized keys instead of trusting the model to follow the system
//! instruction.

use serde_json::{Map, Value};
use tracing::warn;

use crate::errors::ApiError;

/// The four CRUD operations a command may request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Create,
    Get,
    Update,
    Delete,
}

impl Operation {
    /// Case-insensitive parse of the wire value.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "create" => Some(Operation::Create),
            "get" => Some(Operation::Get),
            "update" => Some(Operation::Update),
            "delete" => Some(Operation::Delete),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Create => "create",
            Operation::Get => "get",
            Operation::Update => "update",
            Operation::Delete => "delete",
        }
    }
}

/// Keys the payload may carry after normalization.
const RECOGNIZED_KEYS: [&str; 4] = ["id", "name", "mail", "age"];
/// Alias the model is instructed never to emit but may anyway.
const MAIL_ALIAS: &str = "email";

/// A validated, normalized command. Constructed fresh per request and
/// consumed immediately by the dispatcher.
#[derive(Debug, Clone)]
pub struct Command {
    pub operation: Operation,
    pub data: Map<String, Value>,
}

impl Command {
    /// Parses raw model output into a command.
    ///
    /// Fails with [`ApiError::InvalidCommand`] on malformed JSON, a
    /// non-object top level, a missing/unknown operation, or a non-object
    /// `data` field.
    pub fn parse(raw: &str) -> Result<Self, ApiError> {
        let text = strip_code_fence(raw);
        let value: Value = serde_json::from_str(text).map_err(|e| {
            warn!(error = %e, "model output is not valid JSON");
            ApiError::InvalidCommand("unparseable model output".to_string())
        })?;
        let object = value.as_object().ok_or_else(|| {
            warn!("model output is not a JSON object");
            ApiError::InvalidCommand("unparseable model output".to_string())
        })?;

        let operation = match object.get("operation") {
            Some(Value::String(op)) => Operation::parse(op).ok_or_else(|| {
                ApiError::InvalidCommand(format!("unknown operation '{}'", op))
            })?,
            Some(_) => {
                return Err(ApiError::InvalidCommand(
                    "field 'operation' must be a string".to_string(),
                ))
            }
            None => {
                return Err(ApiError::InvalidCommand(
                    "missing required field 'operation'".to_string(),
                ))
            }
        };

        let data = match object.get("data") {
            Some(Value::Object(data)) => normalize_payload(data),
            None | Some(Value::Null) => Map::new(),
            Some(_) => {
                return Err(ApiError::InvalidCommand(
                    "field 'data' must be an object".to_string(),
                ))
            }
        };

        Ok(Command { operation, data })
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Canonicalizes payload keys: rewrites the `email` alias to `mail`
/// (without clobbering an explicit `mail`) and drops anything outside the
/// recognized key set.
fn normalize_payload(data: &Map<String, Value>) -> Map<String, Value> {
    let mut normalized = Map::new();
    for (key, value) in data {
        if key == MAIL_ALIAS {
            if data.contains_key("mail") {
                warn!("payload carries both 'mail' and the 'email' alias; alias dropped");
            } else {
                normalized.insert("mail".to_string(), value.clone());
            }
            continue;
        }
        if RECOGNIZED_KEYS.contains(&key.as_str()) {
            normalized.insert(key.clone(), value.clone());
        } else {
            warn!(key = %key, "dropping unrecognized payload key");
        }
    }
    normalized
}

/// Strips a surrounding markdown code fence, if present. The model is
/// told not to emit markdown; this guards against non-compliance.
fn strip_code_fence(content: &str) -> &str {
    let trimmed = content.trim();
    if !trimmed.starts_with("```") {
        return trimmed;
    }
    let Some(rest) = trimmed
        .strip_prefix("```json")
        .or_else(|| trimmed.strip_prefix("```"))
    else {
        return trimmed;
    };
    match rest.rfind("```") {
        Some(end) => rest[..end].trim(),
        None => trimmed,
    }
}
