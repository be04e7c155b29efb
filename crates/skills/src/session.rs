//! Session-bound dispatch engine.

use std::sync::Arc;
use std::time::Duration;

use futures::{Stream, StreamExt};
use serde_json::Value;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use wire::detail::{assistant_reply_for_turn, turn_id_from_accepted, turn_status};
use wire::{AppServerSignal, PendingToolCall, SendMessage, StreamEvent, ToolDefinition};

use crate::api::SessionApi;
use crate::dispatch::{self, Dispatch, Submission, ToolCall, failure_envelope, normalize_result};
use crate::handler::Arguments;
use crate::registry::{DispatchMode, Skill, SkillDefinition, SkillRegistry};
use crate::wait::WaitTimeout;
use crate::{Error, Result, TurnStatuses};

/// Options for [`SkillSession::send_and_handle`]. Unset values come from
/// the session's `SkillsConfig`.
#[derive(Debug, Clone)]
pub struct HandleOptions {
    /// Prefix the message with the catalog instruction block.
    pub inject: bool,
    pub timeout: Option<Duration>,
    pub interval: Option<Duration>,
    pub terminal_statuses: Option<TurnStatuses>,
    /// Fail when the turn ends without an assistant reply.
    pub require_reply: bool,
}

impl Default for HandleOptions {
    fn default() -> Self {
        Self {
            inject: true,
            timeout: None,
            interval: None,
            terminal_statuses: None,
            require_reply: false,
        }
    }
}

/// Result of [`SkillSession::send_and_handle`].
#[derive(Debug, Clone, PartialEq)]
pub struct SkillTurnResult {
    pub session_id: String,
    pub turn_id: String,
    pub accepted: Value,
    pub detail: Value,
    pub status: Option<String>,
    pub assistant_reply: Option<String>,
    /// Dispatches made while the turn ran, in order.
    pub dispatches: Vec<Dispatch>,
}

/// Skills bound to one remote session.
///
/// Tool calls for this session are matched against the registry, run, and
/// answered. Calls for other sessions are ignored.
pub struct SkillSession<A> {
    api: Arc<A>,
    session_id: String,
    registry: SkillRegistry,
    created: Option<Value>,
    allow_deferred: bool,
}

impl<A: SessionApi> SkillSession<A> {
    pub(crate) fn new(
        api: Arc<A>,
        session_id: String,
        registry: SkillRegistry,
        created: Option<Value>,
    ) -> Self {
        Self {
            api,
            session_id,
            registry,
            created,
            allow_deferred: true,
        }
    }

    /// Answer deferred handlers with a failure envelope instead of running them.
    pub(crate) fn forbid_deferred(mut self) -> Self {
        self.allow_deferred = false;
        self
    }

    pub fn id(&self) -> &str {
        &self.session_id
    }

    /// Response of the create call, when this session was created here.
    pub fn created(&self) -> Option<&Value> {
        self.created.as_ref()
    }

    pub fn registry(&self) -> &SkillRegistry {
        &self.registry
    }

    /// Always fails: a live session's catalog is fixed.
    pub fn register(&mut self, skill: Skill) -> Result<&SkillDefinition> {
        self.registry.register(skill)
    }

    /// Always fails: a live session's catalog is fixed.
    pub fn unregister(&mut self, name: &str) -> Result<bool> {
        self.registry.unregister(name)
    }

    /// Always fails: a live session's catalog is fixed.
    pub fn clear(&mut self) -> Result<usize> {
        self.registry.clear()
    }

    pub fn skills(&self) -> Vec<&SkillDefinition> {
        self.registry.skills()
    }

    pub fn dispatch_mode(&self) -> Option<DispatchMode> {
        self.registry.dispatch_mode()
    }

    pub fn reset_dispatch_mode(&mut self) {
        self.registry.reset_dispatch_mode();
    }

    pub fn instruction_text(&self) -> String {
        self.registry.instruction_text()
    }

    pub fn inject_request(&self, text: &str) -> String {
        self.registry.inject_request(text)
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.registry.tool_definitions()
    }

    /// Whether a call tagged with `session_id` belongs to this session.
    /// Untagged calls do.
    pub fn matches_session(&self, session_id: Option<&str>) -> bool {
        session_id.is_none_or(|id| id == self.session_id)
    }

    /// Run the handler for `call` without submitting anything.
    pub async fn dispatch_tool_call(&self, call: &ToolCall) -> Dispatch {
        let Some(skill) = self.registry.get(&call.tool) else {
            let message = format!("no remote skill registered for {}", call.tool);
            tracing::debug!(tool = %call.tool, "no remote skill registered");
            let mut dispatch = Dispatch::new(call, wire::ResponseEnvelope::text(&message, false));
            dispatch.error = Some(message);
            return dispatch;
        };

        let args = Arguments::from_value(call.arguments.as_ref());
        match skill
            .handler
            .invoke(&call.tool, args, self.allow_deferred)
            .await
        {
            Ok(result) => {
                let mut dispatch = Dispatch::new(call, normalize_result(&result));
                dispatch.handled = true;
                dispatch.result = Some(result);
                tracing::debug!(tool = %call.tool, "remote skill handled");
                dispatch
            }
            Err(err) => {
                tracing::warn!(tool = %call.tool, error = %err, "remote skill failed");
                let mut dispatch =
                    Dispatch::new(call, failure_envelope(&call.tool, err.message()));
                dispatch.error = Some(err.to_string());
                dispatch
            }
        }
    }

    /// Run the handler for a pushed signal without submitting anything.
    ///
    /// `None` for signals that are not tool calls for this session.
    pub async fn dispatch_signal(&self, signal: &AppServerSignal) -> Option<Dispatch> {
        let call = self.signal_call(signal)?;
        Some(self.dispatch_tool_call(&call).await)
    }

    /// Run and answer a pushed tool-call signal.
    ///
    /// Locks the session to signal dispatch.
    pub async fn respond_to_signal(&mut self, signal: &AppServerSignal) -> Result<Option<Dispatch>> {
        let Some(call) = self.signal_call(signal) else {
            return Ok(None);
        };
        self.registry.require_dispatch_mode(DispatchMode::Signal)?;
        Ok(Some(self.respond(&call).await))
    }

    /// Run and answer one pending tool-call row.
    ///
    /// Locks the session to polling dispatch.
    pub async fn respond_to_pending_call(&mut self, row: &Value) -> Result<Option<Dispatch>> {
        let pending = PendingToolCall::from_value(row);
        if !self.matches_session(pending.thread_id.as_deref()) {
            return Ok(None);
        }
        let Some(call) = ToolCall::from_pending(&pending) else {
            return Ok(None);
        };
        self.registry.require_dispatch_mode(DispatchMode::Polling)?;
        Ok(Some(self.respond(&call).await))
    }

    /// List pending tool calls and answer each, in listing order.
    pub async fn drain_pending_calls(&mut self) -> Result<Vec<Dispatch>> {
        self.registry.check_dispatch_mode(DispatchMode::Polling)?;
        let payload = self.api.list_tool_calls(&self.session_id).await?;
        let rows = wire::pending_rows(&payload).map_err(|err| Error::Malformed(err.to_string()))?;

        let mut dispatches = Vec::with_capacity(rows.len());
        for row in &rows {
            if let Some(dispatch) = self.respond_to_pending_call(row).await? {
                dispatches.push(dispatch);
            }
        }
        tracing::debug!(
            session_id = %self.session_id,
            pending = rows.len(),
            dispatched = dispatches.len(),
            "drained pending tool calls"
        );
        Ok(dispatches)
    }

    /// Answer tool-call signals from `events` until the stream ends.
    ///
    /// Returns the number of dispatches, or [`Error::Cancelled`] as soon as
    /// `cancel` fires.
    pub async fn serve_signals<S>(&mut self, events: S, cancel: &CancellationToken) -> Result<usize>
    where
        S: Stream<Item = StreamEvent>,
    {
        let mut events = std::pin::pin!(events);
        let mut dispatched = 0;
        loop {
            let event = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                event = events.next() => event,
            };
            let Some(event) = event else {
                return Ok(dispatched);
            };

            let signal = AppServerSignal::from_stream_event(&event);
            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => return Err(Error::Cancelled),
                outcome = self.respond_to_signal(&signal) => outcome?,
            };
            if outcome.is_some() {
                dispatched += 1;
            }
        }
    }

    /// Send a user message, optionally prefixed with the catalog block.
    ///
    /// The tool definitions ride along unless the message already has some.
    pub async fn send(&self, mut message: SendMessage, inject: bool) -> Result<Value> {
        if inject {
            message.text = self.inject_request(&message.text);
        }
        if message.dynamic_tools.is_none() {
            message.dynamic_tools = Some(self.tool_definitions());
        }
        Ok(self.api.send_message(&self.session_id, &message).await?)
    }

    /// Send a message, then drain and answer pending tool calls until the
    /// turn reaches a terminal status.
    pub async fn send_and_handle(
        &mut self,
        message: SendMessage,
        options: HandleOptions,
    ) -> Result<SkillTurnResult> {
        let config = self.registry.shared_config();
        let timeout = options.timeout.unwrap_or(config.timeout);
        let interval = options.interval.unwrap_or(config.poll_interval);
        if timeout.is_zero() {
            return Err(Error::InvalidArgument("timeout must be > 0".into()));
        }
        if interval.is_zero() {
            return Err(Error::InvalidArgument("interval must be > 0".into()));
        }
        let terminal = options
            .terminal_statuses
            .unwrap_or_else(|| config.terminal_statuses.clone());

        self.registry.require_dispatch_mode(DispatchMode::Polling)?;

        let accepted = self.send(message, options.inject).await?;
        let turn_id = turn_id_from_accepted(&accepted).ok_or_else(|| {
            Error::Malformed("remote skill send_and_handle response missing turnId".into())
        })?;

        let mut dispatches = Vec::new();
        let start = Instant::now();
        let mut attempts = 0;
        loop {
            attempts += 1;
            dispatches.extend(self.drain_pending_calls().await?);

            let detail = self.api.get_session(&self.session_id).await?;
            if turn_status(&detail, &turn_id).is_some_and(|status| terminal.contains(&status)) {
                break;
            }
            if start.elapsed() >= timeout {
                return Err(WaitTimeout {
                    description: Some(format!("remote skill turn {turn_id} terminal status")),
                    timeout,
                    attempts,
                }
                .into());
            }
            tokio::time::sleep(interval).await;
        }

        let detail = self.api.get_session(&self.session_id).await?;
        let status = turn_status(&detail, &turn_id);
        let assistant_reply = assistant_reply_for_turn(&detail, &turn_id);
        if options.require_reply && assistant_reply.is_none() {
            return Err(Error::MissingReply { turn_id });
        }

        Ok(SkillTurnResult {
            session_id: self.session_id.clone(),
            turn_id,
            accepted,
            detail,
            status,
            assistant_reply,
            dispatches,
        })
    }

    fn signal_call(&self, signal: &AppServerSignal) -> Option<ToolCall> {
        if !self.matches_session(signal.session_id()) {
            return None;
        }
        ToolCall::from_signal(signal)
    }

    /// Dispatch `call`, then submit its envelope when it has a request id.
    async fn respond(&mut self, call: &ToolCall) -> Dispatch {
        let mut dispatch = self.dispatch_tool_call(call).await;

        let Some(request_id) = call.request_id.as_ref().and_then(|id| id.key()) else {
            dispatch.apply(Submission::no_request_id());
            return dispatch;
        };
        if self.registry.is_handled(&request_id) {
            tracing::debug!(request_id = %request_id, tool = %call.tool, "duplicate tool call skipped");
            dispatch.apply(Submission::local_duplicate());
            return dispatch;
        }

        let policy = self.registry.config().submit;
        let submission = dispatch::submit(&*self.api, &request_id, &dispatch.response, policy).await;
        if submission.accepted {
            self.registry.remember_handled(&request_id);
        }
        dispatch.apply(submission);
        dispatch
    }
}
