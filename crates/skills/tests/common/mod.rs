//! Scripted in-memory `SessionApi`.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::sync::Mutex;

use serde_json::{Value, json};
use skills::SessionApi;
use wire::{CreateSession, ResponseEnvelope, SendMessage};

/// One recorded API call.
#[derive(Debug, Clone, PartialEq)]
pub enum Call {
    Create(Value),
    GetSession(String),
    Delete(String),
    Send(String, Value),
    ListToolCalls(String),
    Respond(String, Value),
}

#[derive(Default)]
struct Script {
    created: VecDeque<wire::Result<Value>>,
    details: VecDeque<wire::Result<Value>>,
    deletes: VecDeque<wire::Result<Value>>,
    sends: VecDeque<wire::Result<Value>>,
    listings: VecDeque<wire::Result<Value>>,
    responses: VecDeque<wire::Result<Value>>,
    calls: Vec<Call>,
}

/// Each operation answers from its queue. Session detail repeats its last
/// scripted value; the other queues fall back to a benign default once
/// empty.
#[derive(Default)]
pub struct FakeApi {
    script: Mutex<Script>,
}

impl FakeApi {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn on_create(self, value: Value) -> Self {
        self.script.lock().unwrap().created.push_back(Ok(value));
        self
    }

    pub fn on_detail(self, value: Value) -> Self {
        self.script.lock().unwrap().details.push_back(Ok(value));
        self
    }

    pub fn on_delete(self, result: wire::Result<Value>) -> Self {
        self.script.lock().unwrap().deletes.push_back(result);
        self
    }

    pub fn on_send(self, value: Value) -> Self {
        self.script.lock().unwrap().sends.push_back(Ok(value));
        self
    }

    pub fn on_list(self, value: Value) -> Self {
        self.script.lock().unwrap().listings.push_back(Ok(value));
        self
    }

    pub fn on_respond(self, result: wire::Result<Value>) -> Self {
        self.script.lock().unwrap().responses.push_back(result);
        self
    }

    pub fn calls(&self) -> Vec<Call> {
        self.script.lock().unwrap().calls.clone()
    }

    /// Request ids submitted, in order.
    pub fn responded(&self) -> Vec<(String, Value)> {
        self.calls()
            .into_iter()
            .filter_map(|call| match call {
                Call::Respond(id, body) => Some((id, body)),
                _ => None,
            })
            .collect()
    }

    pub fn count(&self, matches: impl Fn(&Call) -> bool) -> usize {
        self.calls().iter().filter(|call| matches(call)).count()
    }

    fn record(&self, call: Call) {
        self.script.lock().unwrap().calls.push(call);
    }
}

fn pop_or(queue: &mut VecDeque<wire::Result<Value>>, fallback: Value) -> wire::Result<Value> {
    queue.pop_front().unwrap_or(Ok(fallback))
}

fn clone_result(result: &wire::Result<Value>) -> wire::Result<Value> {
    match result {
        Ok(value) => Ok(value.clone()),
        Err(err) => Err(wire::Error::Transport(err.to_string())),
    }
}

impl SessionApi for FakeApi {
    async fn create_session(&self, request: &CreateSession) -> wire::Result<Value> {
        self.record(Call::Create(serde_json::to_value(request).unwrap()));
        let mut script = self.script.lock().unwrap();
        pop_or(&mut script.created, json!({"session": {"sessionId": "sess-1"}}))
    }

    async fn get_session(&self, session_id: &str) -> wire::Result<Value> {
        self.record(Call::GetSession(session_id.to_string()));
        let mut script = self.script.lock().unwrap();
        if script.details.len() > 1 {
            return pop_or(&mut script.details, json!({}));
        }
        script
            .details
            .front()
            .map(clone_result)
            .unwrap_or(Ok(json!({})))
    }

    async fn delete_session(&self, session_id: &str) -> wire::Result<Value> {
        self.record(Call::Delete(session_id.to_string()));
        let mut script = self.script.lock().unwrap();
        pop_or(&mut script.deletes, json!({"status": "ok"}))
    }

    async fn send_message(&self, session_id: &str, message: &SendMessage) -> wire::Result<Value> {
        self.record(Call::Send(
            session_id.to_string(),
            serde_json::to_value(message).unwrap(),
        ));
        let mut script = self.script.lock().unwrap();
        pop_or(&mut script.sends, json!({"turnId": "turn-1"}))
    }

    async fn list_tool_calls(&self, session_id: &str) -> wire::Result<Value> {
        self.record(Call::ListToolCalls(session_id.to_string()));
        let mut script = self.script.lock().unwrap();
        pop_or(&mut script.listings, json!({"data": []}))
    }

    async fn respond_tool_call(
        &self,
        request_id: &str,
        response: &ResponseEnvelope,
    ) -> wire::Result<Value> {
        self.record(Call::Respond(
            request_id.to_string(),
            serde_json::to_value(response).unwrap(),
        ));
        let mut script = self.script.lock().unwrap();
        pop_or(&mut script.responses, json!({"status": "ok"}))
    }
}

/// Stream frame carrying a tool-call signal.
pub fn tool_call_event(session_id: &str, request_id: Value, tool: &str, arguments: Value) -> wire::StreamEvent {
    let body = json!({
        "type": wire::TOOL_CALL_EVENT,
        "threadId": session_id,
        "payload": {
            "method": "item/tool/call",
            "requestId": request_id,
            "context": {"threadId": session_id},
            "params": {"tool": tool, "arguments": arguments, "callId": "call-1"}
        }
    });
    wire::StreamEvent::from_json(body.as_object().unwrap())
}

pub fn tool_call_signal(session_id: &str, request_id: Value, tool: &str, arguments: Value) -> wire::AppServerSignal {
    wire::AppServerSignal::from_stream_event(&tool_call_event(session_id, request_id, tool, arguments))
}

/// Session detail with one turn and, optionally, its assistant reply.
pub fn turn_detail(turn_id: &str, status: &str, reply: Option<&str>) -> Value {
    let transcript: Vec<Value> = reply
        .map(|text| {
            vec![json!({
                "turnId": turn_id,
                "role": "assistant",
                "status": "complete",
                "content": text
            })]
        })
        .unwrap_or_default();
    json!({
        "thread": {"turns": [{"id": turn_id, "status": status}]},
        "transcript": transcript
    })
}
