//! Skill handlers.

use std::any::Any;
use std::fmt;
use std::future::Future;
use std::panic::{AssertUnwindSafe, catch_unwind};
use std::sync::Arc;

use futures::FutureExt;
use futures::future::BoxFuture;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

/// Failure reported by a handler. Becomes a failure envelope, never an
/// engine error.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{0}")]
pub struct HandlerError(String);

impl HandlerError {
    pub fn new(message: impl Into<String>) -> Self {
        Self(message.into())
    }

    pub fn message(&self) -> &str {
        &self.0
    }
}

impl From<String> for HandlerError {
    fn from(message: String) -> Self {
        Self(message)
    }
}

impl From<&str> for HandlerError {
    fn from(message: &str) -> Self {
        Self(message.to_string())
    }
}

impl From<serde_json::Error> for HandlerError {
    fn from(err: serde_json::Error) -> Self {
        Self(err.to_string())
    }
}

pub type HandlerResult = std::result::Result<Value, HandlerError>;

/// Arguments of one tool call, as the handler receives them.
#[derive(Debug, Clone, PartialEq)]
pub enum Arguments {
    /// No arguments were sent (absent or `null`).
    None,
    /// An object: expanded as named parameters.
    Named(Map<String, Value>),
    /// Any other value: passed as a single positional argument.
    Positional(Value),
}

impl Arguments {
    pub fn from_value(value: Option<&Value>) -> Self {
        match value {
            None | Some(Value::Null) => Self::None,
            Some(Value::Object(map)) => Self::Named(map.clone()),
            Some(other) => Self::Positional(other.clone()),
        }
    }

    /// Named argument lookup.
    pub fn get(&self, name: &str) -> Option<&Value> {
        match self {
            Self::Named(map) => map.get(name),
            _ => None,
        }
    }

    /// Deserialize into a handler's argument type.
    ///
    /// Absent arguments deserialize from `null`, falling back to an empty
    /// object so that structs with all-optional fields accept them.
    pub fn deserialize<A: DeserializeOwned>(&self) -> Result<A, HandlerError> {
        let parsed = match self {
            Self::None => serde_json::from_value(Value::Null)
                .or_else(|_| serde_json::from_value(Value::Object(Map::new()))),
            Self::Named(map) => serde_json::from_value(Value::Object(map.clone())),
            Self::Positional(value) => serde_json::from_value(value.clone()),
        };
        parsed.map_err(|err| HandlerError::new(format!("invalid arguments: {err}")))
    }
}

type ImmediateFn = dyn Fn(Arguments) -> HandlerResult + Send + Sync;
type DeferredFn = dyn Fn(Arguments) -> BoxFuture<'static, HandlerResult> + Send + Sync;

/// Callable behind a skill.
///
/// `Immediate` handlers return their result directly. `Deferred` handlers
/// return a future and can only run in async sessions; a blocking session
/// answers them with a failure envelope.
#[derive(Clone)]
pub enum Handler {
    Immediate(Arc<ImmediateFn>),
    Deferred(Arc<DeferredFn>),
}

impl fmt::Debug for Handler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Immediate(_) => f.write_str("Handler::Immediate"),
            Self::Deferred(_) => f.write_str("Handler::Deferred"),
        }
    }
}

impl Handler {
    pub fn immediate<F>(f: F) -> Self
    where
        F: Fn(Arguments) -> HandlerResult + Send + Sync + 'static,
    {
        Self::Immediate(Arc::new(f))
    }

    pub fn deferred<F, Fut>(f: F) -> Self
    where
        F: Fn(Arguments) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = HandlerResult> + Send + 'static,
    {
        Self::Deferred(Arc::new(move |args| f(args).boxed()))
    }

    /// Immediate handler over `serde` argument and return types.
    ///
    /// ```
    /// use serde::Deserialize;
    /// use skills::Handler;
    ///
    /// #[derive(Deserialize)]
    /// struct Add {
    ///     a: i64,
    ///     b: i64,
    /// }
    ///
    /// let handler = Handler::typed(|args: Add| Ok::<_, String>(args.a + args.b));
    /// assert!(!handler.is_deferred());
    /// ```
    pub fn typed<A, R, E, F>(f: F) -> Self
    where
        A: DeserializeOwned,
        R: Serialize,
        E: fmt::Display,
        F: Fn(A) -> std::result::Result<R, E> + Send + Sync + 'static,
    {
        Self::immediate(move |args| {
            let parsed = args.deserialize::<A>()?;
            let output = f(parsed).map_err(|err| HandlerError::new(err.to_string()))?;
            Ok(serde_json::to_value(output)?)
        })
    }

    /// Deferred handler over `serde` argument and return types.
    pub fn typed_deferred<A, R, E, F, Fut>(f: F) -> Self
    where
        A: DeserializeOwned + Send + 'static,
        R: Serialize,
        E: fmt::Display,
        F: Fn(A) -> Fut + Send + Sync + 'static,
        Fut: Future<Output = std::result::Result<R, E>> + Send + 'static,
    {
        let f = Arc::new(f);
        Self::deferred(move |args| {
            let f = Arc::clone(&f);
            async move {
                let parsed = args.deserialize::<A>()?;
                let output = f(parsed)
                    .await
                    .map_err(|err| HandlerError::new(err.to_string()))?;
                Ok::<Value, HandlerError>(serde_json::to_value(output)?)
            }
        })
    }

    pub fn is_deferred(&self) -> bool {
        matches!(self, Self::Deferred(_))
    }

    /// Run the handler, turning panics into handler errors.
    pub(crate) async fn invoke(
        &self,
        tool: &str,
        args: Arguments,
        allow_deferred: bool,
    ) -> HandlerResult {
        match self {
            Self::Immediate(f) => {
                catch_unwind(AssertUnwindSafe(|| f(args))).unwrap_or_else(|p| Err(panicked(p)))
            }
            Self::Deferred(f) => {
                if !allow_deferred {
                    return Err(HandlerError::new(format!(
                        "remote skill {tool} is deferred and cannot run in a blocking session"
                    )));
                }
                let future = match catch_unwind(AssertUnwindSafe(|| f(args))) {
                    Ok(future) => future,
                    Err(p) => return Err(panicked(p)),
                };
                AssertUnwindSafe(future)
                    .catch_unwind()
                    .await
                    .unwrap_or_else(|p| Err(panicked(p)))
            }
        }
    }
}

fn panicked(payload: Box<dyn Any + Send>) -> HandlerError {
    let message = payload
        .downcast_ref::<&str>()
        .map(|s| s.to_string())
        .or_else(|| payload.downcast_ref::<String>().cloned())
        .unwrap_or_else(|| "unknown panic".to_string());
    HandlerError::new(format!("handler panicked: {message}"))
}
