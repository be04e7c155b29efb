//! Request and response shapes exchanged with the session service.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Number, Value, json};

use crate::{Error, Result};

/// Content item type used for tool-call response text.
pub const INPUT_TEXT: &str = "inputText";

/// Remote request id (can be string or integer, signed or unsigned).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    String(String),
    Number(Number),
}

impl RequestId {
    /// Read a request id from a JSON value, ignoring other shapes.
    pub fn from_value(value: &Value) -> Option<Self> {
        match value {
            Value::String(s) => Some(Self::String(s.clone())),
            Value::Number(n) if n.is_i64() || n.is_u64() => Some(Self::Number(n.clone())),
            _ => None,
        }
    }

    /// Normalized key used for submission and dedup; `None` for blank ids.
    pub fn key(&self) -> Option<String> {
        match self {
            Self::Number(n) => Some(n.to_string()),
            Self::String(s) => non_empty(s).map(str::to_string),
        }
    }
}

impl std::fmt::Display for RequestId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::String(s) => write!(f, "{s}"),
            Self::Number(n) => write!(f, "{n}"),
        }
    }
}

impl From<i64> for RequestId {
    fn from(n: i64) -> Self {
        Self::Number(n.into())
    }
}

impl From<u64> for RequestId {
    fn from(n: u64) -> Self {
        Self::Number(n.into())
    }
}

impl From<String> for RequestId {
    fn from(s: String) -> Self {
        Self::String(s)
    }
}

impl From<&str> for RequestId {
    fn from(s: &str) -> Self {
        Self::String(s.to_string())
    }
}

/// Tool definition advertised to the remote side at session creation.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ToolDefinition {
    pub name: String,
    pub description: String,
    pub input_schema: Value,
}

/// Reply posted for one tool call.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResponseEnvelope {
    pub content_items: Vec<Value>,
    pub success: bool,
    /// Other keys of a handler-built envelope, posted back unchanged.
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

impl ResponseEnvelope {
    /// Envelope carrying one `inputText` item.
    pub fn text(text: impl Into<String>, success: bool) -> Self {
        Self {
            content_items: vec![json!({ "type": INPUT_TEXT, "text": text.into() })],
            success,
            extra: Map::new(),
        }
    }

    /// Accept a value that already has the envelope shape: a
    /// `contentItems` list and a boolean `success`. Other keys are kept.
    pub fn from_value(value: &Value) -> Option<Self> {
        let object = value.as_object()?;
        let items = object.get("contentItems")?.as_array()?;
        let success = object.get("success")?.as_bool()?;
        let extra = object
            .iter()
            .filter(|(key, _)| !matches!(key.as_str(), "contentItems" | "success"))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();
        Some(Self {
            content_items: items.clone(),
            success,
            extra,
        })
    }

    /// Text of the first `inputText` item.
    pub fn first_text(&self) -> Option<&str> {
        self.content_items.iter().find_map(|item| {
            if item.get("type").and_then(Value::as_str) == Some(INPUT_TEXT) {
                item.get("text").and_then(Value::as_str)
            } else {
                None
            }
        })
    }
}

/// Body of `POST /sessions`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSession {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cwd: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem_sandbox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_tools: Option<Vec<ToolDefinition>>,
}

/// Body of `POST /sessions/{id}/messages`.
#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SendMessage {
    pub text: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub effort: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub approval_policy: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub network_access: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub filesystem_sandbox: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dynamic_tools: Option<Vec<ToolDefinition>>,
}

impl SendMessage {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            ..Default::default()
        }
    }
}

/// One row of the pending tool-call listing.
///
/// Parsing is lenient: fields with the wrong type read as absent.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PendingToolCall {
    pub request_id: Option<RequestId>,
    pub tool: Option<String>,
    pub arguments: Option<Value>,
    pub call_id: Option<String>,
    pub thread_id: Option<String>,
}

impl PendingToolCall {
    pub fn from_value(row: &Value) -> Self {
        let Some(object) = row.as_object() else {
            return Self::default();
        };
        Self {
            request_id: object.get("requestId").and_then(RequestId::from_value),
            tool: string_field(object, "tool"),
            arguments: object.get("arguments").cloned(),
            call_id: string_field(object, "callId"),
            thread_id: string_field(object, "threadId"),
        }
    }
}

/// Extract the rows of a pending tool-call listing.
///
/// Deleted and system-owned sessions answer with a status object instead of
/// a list; those read as empty. Any other shape is malformed.
pub fn pending_rows(payload: &Value) -> Result<Vec<Value>> {
    let Some(object) = payload.as_object() else {
        return Err(Error::Malformed(
            "sessions.tool_calls returned unexpected payload type; expected object".into(),
        ));
    };
    if let Some(rows) = object.get("data").and_then(Value::as_array) {
        return Ok(rows.clone());
    }

    let status = object.get("status").and_then(Value::as_str);
    let code = object.get("code").and_then(Value::as_str);
    match (status, code) {
        (Some("deleted"), _) => Ok(Vec::new()),
        (Some("error"), Some("system_session")) => Ok(Vec::new()),
        _ => Err(Error::Malformed(
            "sessions.tool_calls response missing data list".into(),
        )),
    }
}

/// Trimmed string, or `None` when blank.
pub fn non_empty(value: &str) -> Option<&str> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then_some(trimmed)
}

pub(crate) fn string_field(object: &Map<String, Value>, key: &str) -> Option<String> {
    object
        .get(key)
        .and_then(Value::as_str)
        .and_then(non_empty)
        .map(str::to_string)
}
