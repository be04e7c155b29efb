//! Tool-call dispatch records, result normalization, and response submission.

use serde_json::Value;
use wire::{AppServerSignal, PendingToolCall, RequestId, ResponseEnvelope, non_empty};

use crate::api::SessionApi;
use crate::catalog::canonical_json;
use crate::config::RetryPolicy;

/// An inbound tool-call indication, pushed or polled.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolCall {
    pub tool: String,
    pub arguments: Option<Value>,
    pub request_id: Option<RequestId>,
    pub call_id: Option<String>,
    /// Session or thread the call belongs to, when it says.
    pub session_id: Option<String>,
}

impl ToolCall {
    pub fn new(tool: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            arguments: None,
            request_id: None,
            call_id: None,
            session_id: None,
        }
    }

    pub fn arguments(mut self, arguments: Value) -> Self {
        self.arguments = Some(arguments);
        self
    }

    pub fn request_id(mut self, id: impl Into<RequestId>) -> Self {
        self.request_id = Some(id.into());
        self
    }

    /// Tool call carried by a pushed signal. `None` for other signals and for
    /// calls without a tool name.
    pub fn from_signal(signal: &AppServerSignal) -> Option<Self> {
        if !signal.is_tool_call() {
            return None;
        }
        let tool = signal.params.get("tool")?.as_str().and_then(non_empty)?;
        Some(Self {
            tool: tool.to_string(),
            arguments: signal.params.get("arguments").cloned(),
            request_id: signal.request_id.clone(),
            call_id: signal
                .params
                .get("callId")
                .and_then(Value::as_str)
                .and_then(non_empty)
                .map(str::to_string),
            session_id: signal.session_id().map(str::to_string),
        })
    }

    /// Tool call from a pending-call row. `None` when the row names no tool.
    pub fn from_pending(row: &PendingToolCall) -> Option<Self> {
        Some(Self {
            tool: row.tool.clone()?,
            arguments: row.arguments.clone(),
            request_id: row.request_id.clone(),
            call_id: row.call_id.clone(),
            session_id: row.thread_id.clone(),
        })
    }
}

/// Outcome of one dispatch attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct Dispatch {
    /// True only if the handler succeeded and, when submitted, the remote
    /// side accepted the response.
    pub handled: bool,
    pub tool: String,
    pub arguments: Option<Value>,
    pub request_id: Option<RequestId>,
    pub call_id: Option<String>,
    pub response: ResponseEnvelope,
    /// Raw handler return value.
    pub result: Option<Value>,
    pub error: Option<String>,
    pub submission_status: Option<String>,
    pub submission_code: Option<String>,
    pub submission_attempts: u32,
    pub submission_idempotent: bool,
}

impl Dispatch {
    pub(crate) fn new(call: &ToolCall, response: ResponseEnvelope) -> Self {
        Self {
            handled: false,
            tool: call.tool.clone(),
            arguments: call.arguments.clone(),
            request_id: call.request_id.clone(),
            call_id: call.call_id.clone(),
            response,
            result: None,
            error: None,
            submission_status: None,
            submission_code: None,
            submission_attempts: 0,
            submission_idempotent: false,
        }
    }

    /// Record a submission. A rejected submission downgrades `handled`.
    pub(crate) fn apply(&mut self, submission: Submission) {
        self.submission_status = Some(submission.status);
        self.submission_code = submission.code;
        self.submission_attempts = submission.attempts;
        self.submission_idempotent = submission.idempotent;
        if !submission.accepted {
            self.handled = false;
            self.error = Some(
                submission
                    .error
                    .unwrap_or_else(|| "tool call response submission failed".to_string()),
            );
        }
    }
}

/// Envelope for a successful handler result.
///
/// Values that already have the envelope shape pass through.
pub fn normalize_result(value: &Value) -> ResponseEnvelope {
    ResponseEnvelope::from_value(value)
        .unwrap_or_else(|| ResponseEnvelope::text(output_text(value), true))
}

/// Envelope for a failed handler.
pub fn failure_envelope(tool: &str, error: &str) -> ResponseEnvelope {
    ResponseEnvelope::text(format!("remote skill {tool} failed: {error}"), false)
}

fn output_text(value: &Value) -> String {
    match value {
        Value::Null => "null".to_string(),
        Value::String(text) => text.clone(),
        other => canonical_json(other),
    }
}

/// Classified result of submitting one response.
#[derive(Debug, Clone, PartialEq)]
pub(crate) struct Submission {
    pub accepted: bool,
    pub retryable: bool,
    pub idempotent: bool,
    pub status: String,
    pub code: Option<String>,
    pub error: Option<String>,
    pub attempts: u32,
}

impl Submission {
    fn rejected(status: &str, retryable: bool, code: Option<String>, error: String) -> Self {
        Self {
            accepted: false,
            retryable,
            idempotent: false,
            status: status.to_string(),
            code,
            error: Some(error),
            attempts: 0,
        }
    }

    fn acknowledged(
        status: &str,
        code: Option<String>,
        idempotent: bool,
        note: Option<&str>,
    ) -> Self {
        Self {
            accepted: true,
            retryable: false,
            idempotent,
            status: status.to_string(),
            code,
            error: note.map(str::to_string),
            attempts: 0,
        }
    }

    /// Classify a submit-response payload.
    pub fn classify(response: &Value) -> Self {
        let Some(object) = response.as_object() else {
            return Self::rejected(
                "malformed",
                true,
                None,
                "tool call response rejected by codex-manager with malformed response payload"
                    .into(),
            );
        };
        let field = |key: &str| {
            object
                .get(key)
                .and_then(Value::as_str)
                .and_then(non_empty)
                .map(str::to_string)
        };
        let code = field("code");
        let message = field("message");
        let Some(status) = field("status") else {
            return Self::rejected(
                "malformed",
                true,
                code,
                "tool call response rejected by codex-manager with malformed status payload"
                    .into(),
            );
        };

        let in_flight = code.as_deref() == Some("in_flight");
        match status.as_str() {
            "ok" => Self::acknowledged(&status, code, false, None),
            "conflict" if in_flight => Self::acknowledged(
                &status,
                code,
                true,
                Some("tool call response already in flight"),
            ),
            "not_found" => Self::acknowledged(
                &status,
                code,
                true,
                Some("tool call already resolved or unavailable"),
            ),
            _ => {
                let mut parts = vec![format!("status={status}")];
                if let Some(code) = &code {
                    parts.push(format!("code={code}"));
                }
                if let Some(message) = &message {
                    parts.push(format!("message={message}"));
                }
                let error = format!(
                    "tool call response rejected by codex-manager with {}",
                    parts.join(", ")
                );
                Self::rejected(&status, status == "error", code, error)
            }
        }
    }

    fn local(status: &str, idempotent: bool) -> Self {
        Self {
            accepted: true,
            retryable: false,
            idempotent,
            status: status.to_string(),
            code: None,
            error: None,
            attempts: 0,
        }
    }

    /// The request id was already acknowledged by this session.
    pub fn local_duplicate() -> Self {
        Self::local("local_duplicate", true)
    }

    /// There is no request id to submit against.
    pub fn no_request_id() -> Self {
        Self::local("no_request_id", false)
    }
}

/// Submit `response` for `request_id`, retrying transport failures and
/// retryable rejections with linear backoff.
pub(crate) async fn submit<A: SessionApi>(
    api: &A,
    request_id: &str,
    response: &ResponseEnvelope,
    policy: RetryPolicy,
) -> Submission {
    let attempts = policy.max_attempts.max(1);
    let mut last = None;

    for attempt in 1..=attempts {
        let submission = match api.respond_tool_call(request_id, response).await {
            Ok(payload) => Submission::classify(&payload),
            Err(err) if attempt < attempts => {
                tracing::debug!(
                    request_id,
                    attempt,
                    error = %err,
                    "tool call response submit failed, retrying"
                );
                backoff(policy, attempt).await;
                continue;
            }
            Err(err) => {
                tracing::warn!(
                    request_id,
                    attempt,
                    error = %err,
                    "tool call response submit exhausted retries"
                );
                return Submission {
                    attempts: attempt,
                    ..Submission::rejected(
                        "exception",
                        false,
                        None,
                        format!("tool call response submit failed: {err}"),
                    )
                };
            }
        };

        let submission = Submission {
            attempts: attempt,
            ..submission
        };
        if submission.accepted {
            return submission;
        }
        if submission.retryable && attempt < attempts {
            tracing::debug!(
                request_id,
                attempt,
                status = %submission.status,
                "tool call response rejected, retrying"
            );
            last = Some(submission);
            backoff(policy, attempt).await;
            continue;
        }
        tracing::warn!(
            request_id,
            attempt,
            status = %submission.status,
            code = submission.code.as_deref(),
            "tool call response rejected"
        );
        return submission;
    }

    last.unwrap_or_else(|| Submission {
        attempts,
        ..Submission::rejected(
            "error",
            false,
            None,
            "tool call response submission exhausted without result".into(),
        )
    })
}

async fn backoff(policy: RetryPolicy, attempt: u32) {
    let delay = policy.delay_after(attempt);
    if !delay.is_zero() {
        tokio::time::sleep(delay).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wire::StreamEvent;

    #[test]
    fn classify_statuses() {
        let ok = Submission::classify(&json!({"status": "ok"}));
        assert!(ok.accepted && !ok.idempotent);

        let in_flight = Submission::classify(&json!({"status": "conflict", "code": "in_flight"}));
        assert!(in_flight.accepted && in_flight.idempotent);

        let gone = Submission::classify(&json!({"status": "not_found"}));
        assert!(gone.accepted && gone.idempotent);

        let error =
            Submission::classify(&json!({"status": "error", "code": "busy", "message": "later"}));
        assert!(!error.accepted && error.retryable);
        assert_eq!(
            error.error.as_deref(),
            Some(
                "tool call response rejected by codex-manager with status=error, code=busy, \
                 message=later"
            )
        );

        let conflict = Submission::classify(&json!({"status": "conflict", "code": "resolved"}));
        assert!(!conflict.accepted && !conflict.retryable);

        let missing = Submission::classify(&json!({"code": "x"}));
        assert_eq!(missing.status, "malformed");
        assert!(missing.retryable);

        let not_object = Submission::classify(&json!("ok"));
        assert_eq!(not_object.status, "malformed");
    }

    #[test]
    fn normalizes_results() {
        assert_eq!(normalize_result(&json!("pong")), ResponseEnvelope::text("pong", true));
        assert_eq!(normalize_result(&Value::Null), ResponseEnvelope::text("null", true));
        assert_eq!(
            normalize_result(&json!({"b": 1, "a": [true]})),
            ResponseEnvelope::text(r#"{"a": [true], "b": 1}"#, true)
        );

        let envelope =
            json!({"contentItems": [{"type": "inputText", "text": "x"}], "success": false});
        assert_eq!(
            normalize_result(&envelope),
            ResponseEnvelope::from_value(&envelope).unwrap()
        );
    }

    #[test]
    fn failure_text() {
        let envelope = failure_envelope("lookup", "boom");
        assert!(!envelope.success);
        assert_eq!(envelope.first_text(), Some("remote skill lookup failed: boom"));
    }

    fn signal(payload: Value) -> AppServerSignal {
        let body = json!({"type": wire::TOOL_CALL_EVENT, "payload": payload});
        AppServerSignal::from_stream_event(&StreamEvent::from_json(body.as_object().unwrap()))
    }

    #[test]
    fn tool_call_from_signal() {
        let call = ToolCall::from_signal(&signal(json!({
            "params": {"tool": " ping ", "arguments": {"x": 1}, "callId": "c-1"},
            "requestId": 5,
            "context": {"threadId": "s-1"}
        })))
        .unwrap();
        assert_eq!(call.tool, "ping");
        assert_eq!(call.request_id, Some(RequestId::from(5_i64)));
        assert_eq!(call.call_id.as_deref(), Some("c-1"));
        assert_eq!(call.session_id.as_deref(), Some("s-1"));

        assert!(ToolCall::from_signal(&signal(json!({"params": {"tool": ""}}))).is_none());
    }
}
