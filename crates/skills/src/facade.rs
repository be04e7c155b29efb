//! Entry point: create, attach and close skill sessions.

use std::sync::Arc;

use serde_json::Value;
use wire::CreateSession;
use wire::detail::{delete_indicates_deleted, session_id_from_created};

use crate::api::SessionApi;
use crate::config::SkillsConfig;
use crate::registry::SkillRegistry;
use crate::session::SkillSession;
use crate::wait::Waiter;
use crate::{Error, Result};

/// Summary of [`RemoteSkills::close_session`].
#[derive(Debug, Clone, PartialEq)]
pub struct CloseReport {
    pub session_id: String,
    /// Number of skills dropped with the session.
    pub cleared: usize,
    pub deleted: bool,
    /// Raw delete response, when a delete was attempted and answered.
    pub delete_response: Option<Value>,
}

/// Options for [`RemoteSkills::lifecycle`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LifecycleOptions {
    /// Leave the remote session in place on exit.
    pub keep_session: bool,
    /// Swallow delete failures during cleanup.
    pub ignore_cleanup_errors: bool,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            keep_session: false,
            ignore_cleanup_errors: true,
        }
    }
}

/// Output of [`RemoteSkills::lifecycle`].
#[derive(Debug, Clone)]
pub struct Lifecycle<T> {
    pub session_id: String,
    /// Response of the create call.
    pub created: Value,
    pub value: T,
    pub close: CloseReport,
}

/// Remote skills over a session API.
///
/// ```no_run
/// # async fn run<A: skills::SessionApi>(api: A) -> skills::Result<()> {
/// use serde_json::json;
/// use skills::{Handler, HandleOptions, RemoteSkills, Skill};
/// use wire::{CreateSession, SendMessage};
///
/// let remote = RemoteSkills::new(api);
/// let mut session = remote
///     .create_session(
///         |skills| {
///             skills.register(Skill::new("ping", Handler::immediate(|_| Ok(json!("pong")))))?;
///             Ok(())
///         },
///         CreateSession::default(),
///     )
///     .await?;
///
/// let turn = session
///     .send_and_handle(SendMessage::new("call ping"), HandleOptions::default())
///     .await?;
/// println!("{:?}", turn.assistant_reply);
/// remote.close_session(session, true, true).await?;
/// # Ok(())
/// # }
/// ```
pub struct RemoteSkills<A> {
    api: Arc<A>,
    config: Arc<SkillsConfig>,
}

impl<A> Clone for RemoteSkills<A> {
    fn clone(&self) -> Self {
        Self {
            api: Arc::clone(&self.api),
            config: Arc::clone(&self.config),
        }
    }
}

impl<A: SessionApi> RemoteSkills<A> {
    pub fn new(api: A) -> Self {
        Self::with_config(Arc::new(api), SkillsConfig::default())
    }

    pub fn with_config(api: Arc<A>, config: SkillsConfig) -> Self {
        Self {
            api,
            config: Arc::new(config),
        }
    }

    pub fn api(&self) -> &Arc<A> {
        &self.api
    }

    pub fn config(&self) -> &SkillsConfig {
        &self.config
    }

    pub fn waiter(&self) -> Waiter<A> {
        Waiter::new(Arc::clone(&self.api))
    }

    /// Empty, unlocked registry using this facade's config.
    pub fn draft(&self) -> SkillRegistry {
        SkillRegistry::draft(Arc::clone(&self.config))
    }

    /// Create a remote session with the skills `register` adds.
    ///
    /// The tool catalog is sent with the create call unless the request
    /// already carries one. Once the session exists its catalog is locked.
    pub async fn create_session<F>(
        &self,
        register: F,
        mut request: CreateSession,
    ) -> Result<SkillSession<A>>
    where
        F: FnOnce(&mut SkillRegistry) -> Result<()>,
    {
        let mut draft = self.draft();
        register(&mut draft)?;

        if request.dynamic_tools.is_none() && !draft.is_empty() {
            request.dynamic_tools = Some(draft.tool_definitions());
        }
        let created = self.api.create_session(&request).await?;
        let session_id = session_id_from_created(&created).ok_or_else(|| {
            Error::Malformed("sessions.create response missing session.sessionId".into())
        })?;

        tracing::info!(session_id = %session_id, skills = draft.len(), "created remote skill session");
        let registry = draft.materialize(session_id.as_str());
        Ok(SkillSession::new(
            Arc::clone(&self.api),
            session_id,
            registry,
            Some(created),
        ))
    }

    /// Bind to an existing session. Its catalog is empty and locked, so
    /// every call it receives is answered as unknown.
    pub fn attach(&self, session_id: impl Into<String>) -> SkillSession<A> {
        let session_id = session_id.into();
        let registry = SkillRegistry::locked(Arc::clone(&self.config), session_id.as_str());
        SkillSession::new(Arc::clone(&self.api), session_id, registry, None)
    }

    /// Drop a session's skills and optionally delete the remote session.
    ///
    /// With `ignore_errors`, a failed delete is logged and reported as not
    /// deleted.
    pub async fn close_session(
        &self,
        session: SkillSession<A>,
        delete: bool,
        ignore_errors: bool,
    ) -> Result<CloseReport> {
        let session_id = session.id().to_string();
        let cleared = session.registry().len();
        drop(session);

        let mut delete_response = None;
        if delete {
            match self.api.delete_session(&session_id).await {
                Ok(response) => delete_response = Some(response),
                Err(err) if ignore_errors => {
                    tracing::warn!(session_id = %session_id, error = %err, "session delete failed");
                }
                Err(err) => return Err(err.into()),
            }
        }

        let deleted = delete_response.as_ref().is_some_and(delete_indicates_deleted);
        tracing::debug!(session_id = %session_id, cleared, deleted, "closed remote skill session");
        Ok(CloseReport {
            session_id,
            cleared,
            deleted,
            delete_response,
        })
    }

    /// Create a session, run `body` against it, then close it.
    ///
    /// The session is closed even when `body` fails; the body's error wins
    /// over a cleanup error.
    pub async fn lifecycle<F, B, T>(
        &self,
        register: F,
        request: CreateSession,
        options: LifecycleOptions,
        body: B,
    ) -> Result<Lifecycle<T>>
    where
        F: FnOnce(&mut SkillRegistry) -> Result<()>,
        B: AsyncFnOnce(&mut SkillSession<A>) -> Result<T>,
    {
        let mut session = self.create_session(register, request).await?;
        let session_id = session.id().to_string();
        let created = session.created().cloned().unwrap_or(Value::Null);

        let outcome = body(&mut session).await;
        let closed = self
            .close_session(session, !options.keep_session, options.ignore_cleanup_errors)
            .await;

        let value = outcome?;
        Ok(Lifecycle {
            session_id,
            created,
            value,
            close: closed?,
        })
    }
}
