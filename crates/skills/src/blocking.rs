//! Thread-blocking facades over the async engine.
//!
//! Each facade owns a single-threaded tokio runtime and blocks the calling
//! thread on it. They must not be used from inside another tokio runtime.
//! Deferred handlers cannot run here and are answered with a failure
//! envelope.

use std::sync::Arc;
use std::time::Instant;

use serde_json::Value;
use tokio::runtime::{Builder, Runtime};
use wire::{AppServerSignal, CreateSession, SendMessage, ToolDefinition};

use crate::api::SessionApi;
use crate::config::{SkillsConfig, TurnStatuses};
use crate::dispatch::{Dispatch, ToolCall};
use crate::facade::{self, CloseReport, Lifecycle, LifecycleOptions};
use crate::registry::{DispatchMode, Skill, SkillDefinition, SkillRegistry};
use crate::session::{self, HandleOptions, SkillTurnResult};
use crate::wait::{self, SessionTurnReply, WaitOptions};
use crate::Result;

fn runtime() -> Result<Arc<Runtime>> {
    let runtime = Builder::new_current_thread().enable_all().build()?;
    Ok(Arc::new(runtime))
}

/// Poll on the calling thread until `predicate` accepts a value.
///
/// Same contract as [`wait::until`], with real sleeps.
pub fn until<T, P, F>(mut poll: P, mut predicate: F, options: &WaitOptions) -> Result<T>
where
    P: FnMut() -> Result<T>,
    F: FnMut(&T) -> Result<bool>,
{
    options.validate()?;
    if !options.initial_delay.is_zero() {
        std::thread::sleep(options.initial_delay);
    }

    let start = Instant::now();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let value = poll()?;
        if predicate(&value)? {
            return Ok(value);
        }
        if options.max_attempts.is_some_and(|max| attempts >= max)
            || start.elapsed() >= options.timeout
        {
            return Err(options.timed_out(attempts));
        }
        std::thread::sleep(options.interval);
    }
}

/// Blocking [`facade::RemoteSkills`].
pub struct RemoteSkills<A> {
    inner: facade::RemoteSkills<A>,
    runtime: Arc<Runtime>,
}

impl<A: SessionApi> RemoteSkills<A> {
    pub fn new(api: A) -> Result<Self> {
        Self::with_config(Arc::new(api), SkillsConfig::default())
    }

    pub fn with_config(api: Arc<A>, config: SkillsConfig) -> Result<Self> {
        Ok(Self {
            inner: facade::RemoteSkills::with_config(api, config),
            runtime: runtime()?,
        })
    }

    pub fn config(&self) -> &SkillsConfig {
        self.inner.config()
    }

    pub fn waiter(&self) -> Waiter<A> {
        Waiter {
            inner: self.inner.waiter(),
            runtime: Arc::clone(&self.runtime),
        }
    }

    pub fn draft(&self) -> SkillRegistry {
        self.inner.draft()
    }

    pub fn create_session<F>(&self, register: F, request: CreateSession) -> Result<SkillSession<A>>
    where
        F: FnOnce(&mut SkillRegistry) -> Result<()>,
    {
        let inner = self
            .runtime
            .block_on(self.inner.create_session(register, request))?;
        Ok(self.wrap(inner))
    }

    pub fn attach(&self, session_id: impl Into<String>) -> SkillSession<A> {
        self.wrap(self.inner.attach(session_id))
    }

    pub fn close_session(
        &self,
        session: SkillSession<A>,
        delete: bool,
        ignore_errors: bool,
    ) -> Result<CloseReport> {
        self.runtime
            .block_on(self.inner.close_session(session.inner, delete, ignore_errors))
    }

    /// Create a session, run `body` against it, then close it.
    pub fn lifecycle<F, B, T>(
        &self,
        register: F,
        request: CreateSession,
        options: LifecycleOptions,
        body: B,
    ) -> Result<Lifecycle<T>>
    where
        F: FnOnce(&mut SkillRegistry) -> Result<()>,
        B: FnOnce(&mut SkillSession<A>) -> Result<T>,
    {
        let mut session = self.create_session(register, request)?;
        let session_id = session.id().to_string();
        let created = session.created().cloned().unwrap_or(Value::Null);

        let outcome = body(&mut session);
        let closed =
            self.close_session(session, !options.keep_session, options.ignore_cleanup_errors);

        let value = outcome?;
        Ok(Lifecycle {
            session_id,
            created,
            value,
            close: closed?,
        })
    }

    fn wrap(&self, inner: session::SkillSession<A>) -> SkillSession<A> {
        SkillSession {
            inner: inner.forbid_deferred(),
            runtime: Arc::clone(&self.runtime),
        }
    }
}

/// Blocking [`session::SkillSession`].
pub struct SkillSession<A> {
    inner: session::SkillSession<A>,
    runtime: Arc<Runtime>,
}

impl<A: SessionApi> SkillSession<A> {
    pub fn id(&self) -> &str {
        self.inner.id()
    }

    pub fn created(&self) -> Option<&Value> {
        self.inner.created()
    }

    pub fn registry(&self) -> &SkillRegistry {
        self.inner.registry()
    }

    pub fn register(&mut self, skill: Skill) -> Result<&SkillDefinition> {
        self.inner.register(skill)
    }

    pub fn unregister(&mut self, name: &str) -> Result<bool> {
        self.inner.unregister(name)
    }

    pub fn clear(&mut self) -> Result<usize> {
        self.inner.clear()
    }

    pub fn skills(&self) -> Vec<&SkillDefinition> {
        self.inner.skills()
    }

    pub fn dispatch_mode(&self) -> Option<DispatchMode> {
        self.inner.dispatch_mode()
    }

    pub fn reset_dispatch_mode(&mut self) {
        self.inner.reset_dispatch_mode();
    }

    pub fn instruction_text(&self) -> String {
        self.inner.instruction_text()
    }

    pub fn inject_request(&self, text: &str) -> String {
        self.inner.inject_request(text)
    }

    pub fn tool_definitions(&self) -> Vec<ToolDefinition> {
        self.inner.tool_definitions()
    }

    pub fn dispatch_tool_call(&self, call: &ToolCall) -> Dispatch {
        self.runtime.block_on(self.inner.dispatch_tool_call(call))
    }

    pub fn dispatch_signal(&self, signal: &AppServerSignal) -> Option<Dispatch> {
        self.runtime.block_on(self.inner.dispatch_signal(signal))
    }

    pub fn respond_to_signal(&mut self, signal: &AppServerSignal) -> Result<Option<Dispatch>> {
        self.runtime.block_on(self.inner.respond_to_signal(signal))
    }

    pub fn respond_to_pending_call(&mut self, row: &Value) -> Result<Option<Dispatch>> {
        self.runtime.block_on(self.inner.respond_to_pending_call(row))
    }

    pub fn drain_pending_calls(&mut self) -> Result<Vec<Dispatch>> {
        self.runtime.block_on(self.inner.drain_pending_calls())
    }

    pub fn send(&self, message: SendMessage, inject: bool) -> Result<Value> {
        self.runtime.block_on(self.inner.send(message, inject))
    }

    pub fn send_and_handle(
        &mut self,
        message: SendMessage,
        options: HandleOptions,
    ) -> Result<SkillTurnResult> {
        self.runtime
            .block_on(self.inner.send_and_handle(message, options))
    }
}

/// Blocking [`wait::Waiter`].
pub struct Waiter<A> {
    inner: wait::Waiter<A>,
    runtime: Arc<Runtime>,
}

impl<A: SessionApi> Waiter<A> {
    pub fn new(api: Arc<A>) -> Result<Self> {
        Ok(Self {
            inner: wait::Waiter::new(api),
            runtime: runtime()?,
        })
    }

    pub fn assistant_reply(
        &self,
        session_id: &str,
        turn_id: &str,
        options: &WaitOptions,
    ) -> Result<SessionTurnReply> {
        self.runtime
            .block_on(self.inner.assistant_reply(session_id, turn_id, options))
    }

    pub fn turn_status(
        &self,
        session_id: &str,
        turn_id: &str,
        expected: Option<&TurnStatuses>,
        options: &WaitOptions,
    ) -> Result<Option<String>> {
        self.runtime
            .block_on(self.inner.turn_status(session_id, turn_id, expected, options))
    }

    pub fn send_message_and_wait_reply(
        &self,
        session_id: &str,
        message: &SendMessage,
        options: &WaitOptions,
    ) -> Result<SessionTurnReply> {
        self.runtime
            .block_on(self.inner.send_message_and_wait_reply(session_id, message, options))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::Error;
    use std::cell::Cell;
    use std::time::Duration;

    #[test]
    fn blocking_until_polls_on_thread() {
        let polls = Cell::new(0);
        let options = WaitOptions::new(Duration::from_secs(1), Duration::from_millis(1));
        let value = until(
            || {
                polls.set(polls.get() + 1);
                Ok(polls.get())
            },
            |n: &u32| Ok(*n >= 3),
            &options,
        )
        .unwrap();
        assert_eq!(value, 3);
    }

    #[test]
    fn blocking_until_times_out() {
        let options = WaitOptions::new(Duration::from_millis(20), Duration::from_millis(5))
            .description("never");
        let err = until(|| Ok(()), |_| Ok(false), &options).unwrap_err();
        let Error::Timeout(timeout) = err else {
            panic!("expected timeout, got {err:?}");
        };
        assert_eq!(timeout.description.as_deref(), Some("never"));
        assert!(timeout.attempts >= 2);
    }
}
