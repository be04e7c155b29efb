//! Profile configuration loading from codex-skills.toml.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use client::{Auth, ClientConfig, normalize_prefix};
use serde::Deserialize;
use skills::{RetryPolicy, SkillsConfig};

/// Top-level configuration.
#[derive(Debug, Default, Deserialize)]
pub struct Config {
    /// Profile used when none is named on the command line.
    pub current_profile: Option<String>,

    #[serde(default)]
    pub profiles: BTreeMap<String, Profile>,

    #[serde(default)]
    pub skills: SkillsSection,
}

/// Connection settings for one service deployment.
#[derive(Debug, Default, Deserialize)]
pub struct Profile {
    pub base_url: Option<String>,
    pub api_prefix: Option<String>,
    pub timeout_ms: Option<u64>,
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    #[serde(default)]
    pub auth: Auth,
}

/// Overrides for the dispatch engine.
#[derive(Debug, Default, Deserialize)]
pub struct SkillsSection {
    pub submit_attempts: Option<u32>,
    pub retry_delay_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub timeout_ms: Option<u64>,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path.as_ref())?;
        Self::parse(&content)
    }

    /// Load `path` if it exists, otherwise an empty configuration.
    pub fn load_or_default(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!(path = %path.display(), "no config file, using environment");
            Ok(Self::default())
        }
    }

    /// Parse configuration from TOML string.
    pub fn parse(toml: &str) -> Result<Self, ConfigError> {
        toml::from_str(toml).map_err(|e| ConfigError::Parse(e.to_string()))
    }

    /// Client settings: `base` (usually the environment) overlaid with the
    /// selected profile.
    ///
    /// `profile` wins over `current_profile`. Naming a profile that does not
    /// exist is an error.
    pub fn client_config(
        &self,
        profile: Option<&str>,
        base: ClientConfig,
    ) -> Result<ClientConfig, ConfigError> {
        let Some(name) = profile.or(self.current_profile.as_deref()) else {
            return Ok(base);
        };
        let profile = self
            .profiles
            .get(name)
            .ok_or_else(|| ConfigError::UnknownProfile(name.to_string()))?;

        let mut config = base;
        if let Some(base_url) = &profile.base_url {
            config.base_url = base_url.clone();
        }
        if profile.api_prefix.is_some() {
            config.api_prefix = normalize_prefix(profile.api_prefix.as_deref());
        }
        if let Some(ms) = profile.timeout_ms {
            config.timeout = positive(ms, "timeout_ms")?;
        }
        config
            .headers
            .extend(profile.headers.iter().map(|(k, v)| (k.clone(), v.clone())));
        profile.auth.apply(&mut config.headers);
        Ok(config)
    }

    /// Engine settings with the `[skills]` overrides applied.
    pub fn skills_config(&self) -> Result<SkillsConfig, ConfigError> {
        let mut config = SkillsConfig::default();
        let section = &self.skills;

        if section.submit_attempts.is_some() || section.retry_delay_ms.is_some() {
            config.submit = RetryPolicy::new(
                section.submit_attempts.unwrap_or(config.submit.max_attempts),
                section
                    .retry_delay_ms
                    .map(Duration::from_millis)
                    .unwrap_or(config.submit.base_delay),
            );
        }
        if let Some(ms) = section.poll_interval_ms {
            config.poll_interval = positive(ms, "poll_interval_ms")?;
        }
        if let Some(ms) = section.timeout_ms {
            config.timeout = positive(ms, "timeout_ms")?;
        }
        Ok(config)
    }
}

fn positive(ms: u64, field: &'static str) -> Result<Duration, ConfigError> {
    if ms == 0 {
        return Err(ConfigError::Invalid {
            field,
            reason: "must be greater than zero".into(),
        });
    }
    Ok(Duration::from_millis(ms))
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(String),

    #[error("unknown profile '{0}'")]
    UnknownProfile(String),

    #[error("invalid {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}
