//! Predicate polling and turn synchronization.

use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use thiserror::Error;
use tokio::time::Instant;
use wire::SendMessage;
use wire::detail::{assistant_reply_for_turn, turn_id_from_accepted, turn_status};

use crate::api::SessionApi;
use crate::config::TurnStatuses;
use crate::{Error, Result};

/// A wait gave up before its predicate matched.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error(
    "{} did not match within {:.2}s after {} attempts",
    .description.as_deref().unwrap_or("wait condition"),
    .timeout.as_secs_f64(),
    .attempts
)]
pub struct WaitTimeout {
    pub description: Option<String>,
    pub timeout: Duration,
    pub attempts: u32,
}

/// Polling parameters.
#[derive(Debug, Clone, PartialEq)]
pub struct WaitOptions {
    pub timeout: Duration,
    pub interval: Duration,
    pub initial_delay: Duration,
    pub max_attempts: Option<u32>,
    pub description: Option<String>,
}

impl Default for WaitOptions {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(60),
            interval: Duration::from_millis(250),
            initial_delay: Duration::ZERO,
            max_attempts: None,
            description: None,
        }
    }
}

impl WaitOptions {
    pub fn new(timeout: Duration, interval: Duration) -> Self {
        Self {
            timeout,
            interval,
            ..Self::default()
        }
    }

    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = Some(attempts);
        self
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.description = Some(text.into());
        self
    }

    pub fn validate(&self) -> Result<()> {
        if self.timeout.is_zero() {
            return Err(Error::InvalidArgument("timeout must be > 0".into()));
        }
        if self.interval.is_zero() {
            return Err(Error::InvalidArgument("interval must be > 0".into()));
        }
        if self.max_attempts == Some(0) {
            return Err(Error::InvalidArgument(
                "max_attempts must be > 0 when provided".into(),
            ));
        }
        Ok(())
    }

    pub(crate) fn timed_out(&self, attempts: u32) -> Error {
        tracing::debug!(
            description = self.description.as_deref(),
            attempts,
            "wait timed out"
        );
        Error::Timeout(WaitTimeout {
            description: self.description.clone(),
            timeout: self.timeout,
            attempts,
        })
    }

    fn described_or(&self, text: impl FnOnce() -> String) -> Self {
        let mut options = self.clone();
        if options.description.is_none() {
            options.description = Some(text());
        }
        options
    }
}

/// Poll until `predicate` accepts a value.
///
/// The predicate may fail to end the wait early. The wait times out when
/// either the attempt cap or the wall-clock timeout is reached.
pub async fn until<T, P, Fut, F>(mut poll: P, mut predicate: F, options: &WaitOptions) -> Result<T>
where
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
    F: FnMut(&T) -> Result<bool>,
{
    options.validate()?;
    if !options.initial_delay.is_zero() {
        tokio::time::sleep(options.initial_delay).await;
    }

    let start = Instant::now();
    let mut attempts = 0;
    loop {
        attempts += 1;
        let value = poll().await?;
        if predicate(&value)? {
            return Ok(value);
        }
        if options.max_attempts.is_some_and(|max| attempts >= max)
            || start.elapsed() >= options.timeout
        {
            return Err(options.timed_out(attempts));
        }
        tokio::time::sleep(options.interval).await;
    }
}

/// Poll until the value is truthy.
pub async fn until_truthy<T, P, Fut>(poll: P, options: &WaitOptions) -> Result<T>
where
    T: Truthy,
    P: FnMut() -> Fut,
    Fut: Future<Output = Result<T>>,
{
    until(poll, |value: &T| Ok(value.is_truthy()), options).await
}

/// Values with a natural "present and non-empty" reading.
pub trait Truthy {
    fn is_truthy(&self) -> bool;
}

impl Truthy for bool {
    fn is_truthy(&self) -> bool {
        *self
    }
}

impl<T> Truthy for Option<T> {
    fn is_truthy(&self) -> bool {
        self.is_some()
    }
}

impl<T> Truthy for Vec<T> {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for String {
    fn is_truthy(&self) -> bool {
        !self.is_empty()
    }
}

impl Truthy for Value {
    fn is_truthy(&self) -> bool {
        match self {
            Value::Null => false,
            Value::Bool(b) => *b,
            Value::Number(n) => n.as_f64().is_some_and(|n| n != 0.0),
            Value::String(s) => !s.is_empty(),
            Value::Array(items) => !items.is_empty(),
            Value::Object(map) => !map.is_empty(),
        }
    }
}

/// Reply to a turn, with the session detail it was read from.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionTurnReply {
    pub session_id: String,
    pub turn_id: String,
    /// Accepted envelope of the send, when this wait followed one.
    pub accepted: Option<Value>,
    pub detail: Value,
    pub assistant_reply: String,
}

/// Turn synchronization over a session API.
#[derive(Debug)]
pub struct Waiter<A> {
    api: Arc<A>,
}

impl<A> Clone for Waiter<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
        }
    }
}

impl<A: SessionApi> Waiter<A> {
    pub fn new(api: Arc<A>) -> Self {
        Self { api }
    }

    async fn detail(&self, session_id: &str) -> Result<Value> {
        Ok(self.api.get_session(session_id).await?)
    }

    /// Wait for the assistant reply of `turn_id`.
    ///
    /// When the service exposes per-turn status, a terminal turn without a
    /// reply fails at once with [`Error::MissingReply`].
    pub async fn assistant_reply(
        &self,
        session_id: &str,
        turn_id: &str,
        options: &WaitOptions,
    ) -> Result<SessionTurnReply> {
        let terminal = TurnStatuses::terminal();
        let options = options.described_or(|| format!("assistant reply for turn {turn_id}"));

        let detail = until(
            || self.detail(session_id),
            |detail: &Value| {
                let reply = assistant_reply_for_turn(detail, turn_id);
                match turn_status(detail, turn_id) {
                    None => Ok(reply.is_some()),
                    Some(status) if terminal.contains(&status) => match reply {
                        Some(_) => Ok(true),
                        None => Err(Error::MissingReply {
                            turn_id: turn_id.to_string(),
                        }),
                    },
                    Some(_) => Ok(false),
                }
            },
            &options,
        )
        .await?;

        let assistant_reply =
            assistant_reply_for_turn(&detail, turn_id).ok_or_else(|| Error::MissingReply {
                turn_id: turn_id.to_string(),
            })?;
        Ok(SessionTurnReply {
            session_id: session_id.to_string(),
            turn_id: turn_id.to_string(),
            accepted: None,
            detail,
            assistant_reply,
        })
    }

    /// Status of `turn_id`.
    ///
    /// Without `expected` this is a single read. With it, polls until the
    /// status is one of `expected`.
    pub async fn turn_status(
        &self,
        session_id: &str,
        turn_id: &str,
        expected: Option<&TurnStatuses>,
        options: &WaitOptions,
    ) -> Result<Option<String>> {
        let Some(expected) = expected else {
            let detail = self.detail(session_id).await?;
            return Ok(turn_status(&detail, turn_id));
        };

        let options = options.described_or(|| {
            let statuses: Vec<&str> = expected.iter().collect();
            format!("turn {turn_id} status in {}", statuses.join(", "))
        });
        let detail = until(
            || self.detail(session_id),
            |detail: &Value| {
                Ok(turn_status(detail, turn_id).is_some_and(|status| expected.contains(&status)))
            },
            &options,
        )
        .await?;
        Ok(turn_status(&detail, turn_id))
    }

    /// Send a message and wait for the reply to the turn it starts.
    pub async fn send_message_and_wait_reply(
        &self,
        session_id: &str,
        message: &SendMessage,
        options: &WaitOptions,
    ) -> Result<SessionTurnReply> {
        options.validate()?;
        let accepted = self.api.send_message(session_id, message).await?;
        let turn_id = turn_id_from_accepted(&accepted).ok_or_else(|| {
            Error::Malformed("sessions.send_message response missing turnId".into())
        })?;

        let waited = self.assistant_reply(session_id, &turn_id, options).await?;
        Ok(SessionTurnReply {
            accepted: Some(accepted),
            ..waited
        })
    }
}
