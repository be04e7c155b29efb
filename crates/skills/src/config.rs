//! Engine configuration.

use std::collections::BTreeSet;
use std::time::Duration;

use serde_json::{Value, json};

use crate::{Error, Result};

/// Turn statuses that end a turn.
pub const DEFAULT_TERMINAL_STATUSES: &[&str] = &[
    "completed",
    "complete",
    "failed",
    "error",
    "interrupted",
    "canceled",
    "cancelled",
];

/// Retry policy for tool-call response submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, at least 1.
    pub max_attempts: u32,
    /// Delay before retry `n` is `base_delay * n`.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after the failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        self.base_delay.saturating_mul(attempt)
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(50))
    }
}

/// Case-insensitive set of turn statuses.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TurnStatuses(BTreeSet<String>);

impl TurnStatuses {
    /// Build from raw statuses. Blank entries are dropped; an empty result is
    /// rejected.
    pub fn new<I, S>(statuses: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let set: BTreeSet<String> = statuses
            .into_iter()
            .map(|s| s.as_ref().trim().to_lowercase())
            .filter(|s| !s.is_empty())
            .collect();
        if set.is_empty() {
            return Err(Error::InvalidArgument(
                "expected statuses must include at least one non-empty status".into(),
            ));
        }
        Ok(Self(set))
    }

    pub fn terminal() -> Self {
        Self(
            DEFAULT_TERMINAL_STATUSES
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }

    pub fn contains(&self, status: &str) -> bool {
        self.0.contains(&status.trim().to_lowercase())
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.0.iter().map(String::as_str)
    }
}

impl Default for TurnStatuses {
    fn default() -> Self {
        Self::terminal()
    }
}

/// Immutable settings shared by every registry and session of a facade.
#[derive(Debug, Clone)]
pub struct SkillsConfig {
    /// Input schema advertised for skills without one.
    pub default_input_schema: Value,
    pub submit: RetryPolicy,
    /// Remembered acknowledged request ids per session.
    pub dedup_capacity: usize,
    pub poll_interval: Duration,
    pub timeout: Duration,
    pub terminal_statuses: TurnStatuses,
}

impl Default for SkillsConfig {
    fn default() -> Self {
        Self {
            default_input_schema: json!({
                "type": "object",
                "properties": {},
                "additionalProperties": true
            }),
            submit: RetryPolicy::default(),
            dedup_capacity: 4096,
            poll_interval: Duration::from_millis(250),
            timeout: Duration::from_secs(60),
            terminal_statuses: TurnStatuses::terminal(),
        }
    }
}
