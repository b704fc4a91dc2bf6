//! Wire types for the relay endpoint

use super::BackendError;
use crate::session::Turn;
use serde::{Deserialize, Serialize};
use serde_json::Value;

pub const DEFAULT_CATEGORY: &str = "General";

/// Body of the outbound POST
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BackendRequest {
    pub message: String,
    pub history: Vec<Turn>,
}

impl BackendRequest {
    pub fn new(message: impl Into<String>, history: Vec<Turn>) -> Self {
        Self {
            message: message.into(),
            history,
        }
    }
}

/// Normalized reply: missing fields already defaulted
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackendReply {
    pub response: String,
    pub category: String,
}

impl BackendReply {
    pub fn new(response: impl Into<String>, category: impl Into<String>) -> Self {
        Self {
            response: response.into(),
            category: category.into(),
        }
    }

    /// Parse a 200 body. Only a JSON object is a reply; serde would
    /// otherwise accept a positional array for `RawReply`.
    pub(super) fn from_body(body: &str) -> Result<Self, BackendError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| BackendError::decode(format!("Failed to parse response: {e}")))?;

        if !value.is_object() {
            return Err(BackendError::decode(format!(
                "Expected a JSON object, got {}",
                json_type_name(&value)
            )));
        }

        let raw: RawReply = serde_json::from_value(value)
            .map_err(|e| BackendError::decode(format!("Unexpected response shape: {e}")))?;
        Ok(raw.into())
    }
}

fn json_type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

/// Raw 200 body. Both fields are optional and `null` counts as absent.
#[derive(Debug, Default, Deserialize)]
struct RawReply {
    #[serde(default)]
    response: Option<String>,
    #[serde(default)]
    category: Option<String>,
}

impl From<RawReply> for BackendReply {
    fn from(raw: RawReply) -> Self {
        Self {
            response: raw.response.unwrap_or_default(),
            category: raw
                .category
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
        }
    }
}
