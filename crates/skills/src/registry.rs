//! Per-session skill registry.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use schema::{Declared, SchemaProvider, resolve};
use serde_json::Value;

use crate::config::SkillsConfig;
use crate::handler::Handler;
use crate::ledger::DedupLedger;
use crate::{Error, Result};

/// How tool calls reach a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchMode {
    /// Pushed over the event stream.
    Signal,
    /// Discovered by listing pending calls.
    Polling,
}

impl fmt::Display for DispatchMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Signal => f.write_str("signal"),
            Self::Polling => f.write_str("polling"),
        }
    }
}

/// A skill to register.
///
/// ```
/// use skills::{Handler, Skill};
/// use serde_json::json;
///
/// let skill = Skill::new("ping", Handler::immediate(|_| Ok(json!("pong"))))
///     .description("Health check");
/// ```
pub struct Skill {
    name: String,
    handler: Handler,
    declared: Declared,
    provider: Option<Arc<dyn SchemaProvider>>,
}

impl Skill {
    pub fn new(name: impl Into<String>, handler: Handler) -> Self {
        Self {
            name: name.into(),
            handler,
            declared: Declared::default(),
            provider: None,
        }
    }

    pub fn description(mut self, text: impl Into<String>) -> Self {
        self.declared.description = Some(text.into());
        self
    }

    /// Explicit input schema. It is authoritative: documentation may add
    /// descriptions to it but never new properties.
    pub fn input_schema(mut self, schema: Value) -> Self {
        self.declared.input_schema = Some(schema);
        self
    }

    pub fn output_schema(mut self, schema: Value) -> Self {
        self.declared.output_schema = Some(schema);
        self
    }

    /// Documentation comment used for descriptions.
    pub fn doc(mut self, text: impl Into<String>) -> Self {
        self.declared.doc = Some(text.into());
        self
    }

    /// Source of inferred schemas, such as a `schema::Signature`.
    pub fn provider(mut self, provider: impl SchemaProvider + 'static) -> Self {
        self.provider = Some(Arc::new(provider));
        self
    }
}

/// A registered skill with its resolved description and schemas.
#[derive(Debug, Clone)]
pub struct SkillDefinition {
    pub name: String,
    pub description: String,
    pub handler: Handler,
    pub input_schema: Option<Value>,
    pub output_schema: Option<Value>,
    pub output_description: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum CatalogLock {
    Draft,
    Locked { session_id: String },
}

/// Skills of one session plus its dispatch bookkeeping.
///
/// A registry is mutable only as a draft, before its remote session exists.
/// [`SkillRegistry::materialize`] binds it to a session id and locks the
/// catalog for good.
#[derive(Debug, Clone)]
pub struct SkillRegistry {
    config: Arc<SkillsConfig>,
    skills: HashMap<String, SkillDefinition>,
    handled: DedupLedger,
    mode: Option<DispatchMode>,
    lock: CatalogLock,
}

impl SkillRegistry {
    /// Unlocked registry for a session that is about to be created.
    pub fn draft(config: Arc<SkillsConfig>) -> Self {
        Self::with_lock(config, CatalogLock::Draft)
    }

    /// Locked, empty registry for an existing session.
    pub fn locked(config: Arc<SkillsConfig>, session_id: impl Into<String>) -> Self {
        Self::with_lock(
            config,
            CatalogLock::Locked {
                session_id: session_id.into(),
            },
        )
    }

    fn with_lock(config: Arc<SkillsConfig>, lock: CatalogLock) -> Self {
        let handled = DedupLedger::new(config.dedup_capacity);
        Self {
            config,
            skills: HashMap::new(),
            handled,
            mode: None,
            lock,
        }
    }

    /// Copy the skills into a registry locked to `session_id`.
    pub fn materialize(&self, session_id: impl Into<String>) -> Self {
        let mut bound = Self::locked(Arc::clone(&self.config), session_id);
        bound.skills = self.skills.clone();
        bound
    }

    pub fn config(&self) -> &SkillsConfig {
        &self.config
    }

    pub(crate) fn shared_config(&self) -> Arc<SkillsConfig> {
        Arc::clone(&self.config)
    }

    pub fn is_locked(&self) -> bool {
        matches!(self.lock, CatalogLock::Locked { .. })
    }

    /// Register a skill, replacing any skill with the same name.
    pub fn register(&mut self, skill: Skill) -> Result<&SkillDefinition> {
        self.require_unlocked()?;
        let name = normalize_name(&skill.name)?;

        let resolved = resolve(&name, skill.declared, skill.provider.as_deref());
        let definition = SkillDefinition {
            name: name.clone(),
            description: resolved.description,
            handler: skill.handler,
            input_schema: resolved.input_schema,
            output_schema: resolved.output_schema,
            output_description: resolved.output_description,
        };

        tracing::debug!(
            skill = %name,
            deferred = definition.handler.is_deferred(),
            "registered remote skill"
        );
        Ok(self.skills.entry(name).insert_entry(definition).into_mut())
    }

    /// Remove a skill. Returns whether it existed.
    pub fn unregister(&mut self, name: &str) -> Result<bool> {
        self.require_unlocked()?;
        let name = normalize_name(name)?;
        Ok(self.skills.remove(&name).is_some())
    }

    /// Remove every skill. Returns how many were removed.
    pub fn clear(&mut self) -> Result<usize> {
        self.require_unlocked()?;
        let count = self.skills.len();
        self.skills.clear();
        Ok(count)
    }

    pub fn get(&self, name: &str) -> Option<&SkillDefinition> {
        self.skills.get(name.trim())
    }

    /// Skills ordered by name.
    pub fn skills(&self) -> Vec<&SkillDefinition> {
        let mut skills: Vec<&SkillDefinition> = self.skills.values().collect();
        skills.sort_by(|a, b| a.name.cmp(&b.name));
        skills
    }

    pub fn len(&self) -> usize {
        self.skills.len()
    }

    pub fn is_empty(&self) -> bool {
        self.skills.is_empty()
    }

    pub fn dispatch_mode(&self) -> Option<DispatchMode> {
        self.mode
    }

    /// Forget the dispatch mode so the other strategy may be used.
    pub fn reset_dispatch_mode(&mut self) {
        self.mode = None;
    }

    /// Fail if the registry is locked to a different mode.
    pub(crate) fn check_dispatch_mode(&self, mode: DispatchMode) -> Result<()> {
        match self.mode {
            Some(current) if current != mode => {
                tracing::warn!(%current, attempted = %mode, "remote skill dispatch mode conflict");
                Err(Error::ModeConflict {
                    current,
                    attempted: mode,
                })
            }
            _ => Ok(()),
        }
    }

    /// Lock the registry to `mode`, or fail if it is locked to the other.
    pub(crate) fn require_dispatch_mode(&mut self, mode: DispatchMode) -> Result<()> {
        self.check_dispatch_mode(mode)?;
        self.mode = Some(mode);
        Ok(())
    }

    pub(crate) fn is_handled(&self, request_id: &str) -> bool {
        self.handled.contains(request_id)
    }

    pub(crate) fn remember_handled(&mut self, request_id: &str) {
        self.handled.remember(request_id);
    }

    pub fn handled_count(&self) -> usize {
        self.handled.len()
    }

    fn require_unlocked(&self) -> Result<()> {
        match &self.lock {
            CatalogLock::Draft => Ok(()),
            CatalogLock::Locked { session_id } => Err(Error::CatalogLocked {
                session_id: session_id.clone(),
            }),
        }
    }
}

fn normalize_name(name: &str) -> Result<String> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(Error::InvalidName(name.to_string()));
    }
    Ok(trimmed.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use schema::{Shape, Signature};
    use serde_json::json;

    fn ping() -> Handler {
        Handler::immediate(|_| Ok(json!("pong")))
    }

    fn draft() -> SkillRegistry {
        SkillRegistry::draft(Arc::new(SkillsConfig::default()))
    }

    #[test]
    fn register_normalizes_and_overwrites() {
        let mut registry = draft();
        registry.register(Skill::new(" ping ", ping())).unwrap();
        let definition = registry
            .register(Skill::new("ping", ping()).description("Second"))
            .unwrap();
        assert_eq!(definition.name, "ping");
        assert_eq!(definition.description, "Second");
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn register_rejects_blank_names() {
        let mut registry = draft();
        assert!(matches!(
            registry.register(Skill::new("   ", ping())),
            Err(Error::InvalidName(_))
        ));
    }

    #[test]
    fn unregister_and_clear() {
        let mut registry = draft();
        registry.register(Skill::new("a", ping())).unwrap();
        registry.register(Skill::new("b", ping())).unwrap();
        assert!(registry.unregister("a").unwrap());
        assert!(!registry.unregister("missing").unwrap());
        assert_eq!(registry.clear().unwrap(), 1);
        assert!(registry.is_empty());
    }

    #[test]
    fn materialized_registry_is_locked() {
        let mut registry = draft();
        registry.register(Skill::new("ping", ping())).unwrap();
        let mut bound = registry.materialize("sess-1");

        assert!(bound.is_locked());
        assert!(bound.get("ping").is_some());
        let err = bound.register(Skill::new("other", ping())).unwrap_err();
        assert!(err.to_string().contains("create-time only"));
        assert!(matches!(bound.unregister("ping"), Err(Error::CatalogLocked { .. })));
        assert!(matches!(bound.clear(), Err(Error::CatalogLocked { .. })));
        assert_eq!(bound.len(), 1);
    }

    #[test]
    fn dispatch_mode_lock() {
        let mut registry = draft().materialize("sess-1");
        registry.require_dispatch_mode(DispatchMode::Signal).unwrap();
        registry.require_dispatch_mode(DispatchMode::Signal).unwrap();

        let err = registry
            .require_dispatch_mode(DispatchMode::Polling)
            .unwrap_err();
        assert_eq!(
            err.to_string(),
            "remote skill dispatch mode conflict: session locked to 'signal', attempted \
             'polling'. Call reset_dispatch_mode() before switching dispatch strategies."
        );

        registry.reset_dispatch_mode();
        registry.require_dispatch_mode(DispatchMode::Polling).unwrap();
        assert_eq!(registry.dispatch_mode(), Some(DispatchMode::Polling));
    }

    #[test]
    fn provider_schema_is_resolved() {
        let mut registry = draft();
        let definition = registry
            .register(
                Skill::new("lookup", ping())
                    .provider(Signature::new().param("id", Shape::Integer))
                    .doc("Find a record.\n\nArgs:\n    id: Record id."),
            )
            .unwrap();
        assert_eq!(definition.description, "Find a record.");
        let schema = definition.input_schema.as_ref().unwrap();
        assert_eq!(schema["properties"]["id"]["description"], "Record id.");
    }
}
