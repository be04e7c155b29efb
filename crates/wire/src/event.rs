//! Event-stream frames and app-server signals.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::protocol::{RequestId, non_empty, string_field};

/// Event type of a "tool call requested" signal.
pub const TOOL_CALL_EVENT: &str = "app_server.request.item.tool.call";

/// One frame received on the event stream.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StreamEvent {
    #[serde(rename = "type")]
    pub event_type: String,
    pub thread_id: Option<String>,
    pub payload: Value,
}

impl StreamEvent {
    /// Read a stream frame, defaulting missing fields.
    pub fn from_json(body: &Map<String, Value>) -> Self {
        Self {
            event_type: body
                .get("type")
                .and_then(Value::as_str)
                .and_then(non_empty)
                .unwrap_or("unknown")
                .to_string(),
            thread_id: body
                .get("threadId")
                .and_then(Value::as_str)
                .map(str::to_string),
            payload: body.get("payload").cloned().unwrap_or(Value::Null),
        }
    }
}

/// App-server notification or request relayed through the stream.
#[derive(Debug, Clone, PartialEq)]
pub struct AppServerSignal {
    pub event_type: String,
    pub method: Option<String>,
    pub signal_type: Option<String>,
    pub received_at: Option<DateTime<Utc>>,
    pub context: Map<String, Value>,
    pub params: Value,
    pub session: Option<Map<String, Value>>,
    pub request_id: Option<RequestId>,
}

impl AppServerSignal {
    pub fn from_stream_event(event: &StreamEvent) -> Self {
        let empty = Map::new();
        let payload = event.payload.as_object().unwrap_or(&empty);
        Self {
            event_type: event.event_type.clone(),
            method: string_field(payload, "method"),
            signal_type: string_field(payload, "signalType"),
            received_at: payload
                .get("receivedAt")
                .and_then(Value::as_str)
                .and_then(|raw| DateTime::parse_from_rfc3339(raw).ok())
                .map(|at| at.with_timezone(&Utc)),
            context: payload
                .get("context")
                .and_then(Value::as_object)
                .cloned()
                .unwrap_or_default(),
            params: payload.get("params").cloned().unwrap_or(Value::Null),
            session: payload.get("session").and_then(Value::as_object).cloned(),
            request_id: payload.get("requestId").and_then(RequestId::from_value),
        }
    }

    /// Whether this is a tool-call request.
    pub fn is_tool_call(&self) -> bool {
        self.event_type == TOOL_CALL_EVENT
    }

    /// Session the signal belongs to: `session.id`, else `context.threadId`.
    pub fn session_id(&self) -> Option<&str> {
        self.session
            .as_ref()
            .and_then(|session| session.get("id"))
            .and_then(Value::as_str)
            .and_then(non_empty)
            .or_else(|| {
                self.context
                    .get("threadId")
                    .and_then(Value::as_str)
                    .and_then(non_empty)
            })
    }
}
