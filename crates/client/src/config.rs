//! Client connection settings.

use std::collections::BTreeMap;
use std::time::Duration;

use reqwest::Url;
use serde::Deserialize;

use crate::{Error, Result};

pub const DEFAULT_BASE_URL: &str = "http://127.0.0.1:3001";
pub const DEFAULT_API_PREFIX: &str = "/api";
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(30);

/// Credentials sent as request headers.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct Auth {
    pub bearer: Option<String>,
    pub rbac_token: Option<String>,
    pub role: Option<String>,
    pub actor: Option<String>,
}

impl Auth {
    /// Write the non-blank credentials into `headers`.
    pub fn apply(&self, headers: &mut BTreeMap<String, String>) {
        if let Some(bearer) = trimmed(self.bearer.as_deref()) {
            headers.insert("Authorization".into(), format!("Bearer {bearer}"));
        }
        let rbac = [
            ("x-codex-rbac-token", &self.rbac_token),
            ("x-codex-rbac-role", &self.role),
            ("x-codex-rbac-actor", &self.actor),
        ];
        for (name, value) in rbac {
            if let Some(value) = trimmed(value.as_deref()) {
                headers.insert(name.into(), value.to_string());
            }
        }
    }
}

/// Where and how to reach the session service.
#[derive(Debug, Clone, PartialEq)]
pub struct ClientConfig {
    pub base_url: String,
    /// Path prefix of every route, always starting with `/`.
    pub api_prefix: String,
    pub timeout: Duration,
    pub headers: BTreeMap<String, String>,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_BASE_URL.to_string(),
            api_prefix: DEFAULT_API_PREFIX.to_string(),
            timeout: DEFAULT_TIMEOUT,
            headers: BTreeMap::new(),
        }
    }
}

impl ClientConfig {
    /// Read `CODEX_MANAGER_*` environment variables.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let base_url = trimmed(lookup("CODEX_MANAGER_API_BASE").as_deref())
            .unwrap_or(DEFAULT_BASE_URL)
            .to_string();
        let api_prefix = normalize_prefix(lookup("CODEX_MANAGER_API_PREFIX").as_deref());
        let timeout = lookup("CODEX_MANAGER_TIMEOUT_MS")
            .as_deref()
            .and_then(positive_millis)
            .unwrap_or(DEFAULT_TIMEOUT);

        let auth = Auth {
            bearer: lookup("CODEX_MANAGER_BEARER_TOKEN"),
            rbac_token: lookup("CODEX_MANAGER_RBAC_TOKEN"),
            role: lookup("CODEX_MANAGER_RBAC_ROLE"),
            actor: lookup("CODEX_MANAGER_RBAC_ACTOR"),
        };
        let mut headers = BTreeMap::new();
        auth.apply(&mut headers);

        Self {
            base_url,
            api_prefix,
            timeout,
            headers,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.insert(name.into(), value.into());
        self
    }

    /// Absolute URL of an API route such as `/sessions`.
    pub fn api_url(&self, path: &str) -> String {
        format!(
            "{}{}{}",
            self.base_url.trim_end_matches('/'),
            self.api_prefix.trim_end_matches('/'),
            path
        )
    }

    /// WebSocket URL of the event stream, optionally scoped to a thread.
    pub fn stream_url(&self, thread_id: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.api_url("/stream"))
            .map_err(|err| Error::Config(format!("invalid base url {}: {err}", self.base_url)))?;
        let scheme = if url.scheme() == "https" { "wss" } else { "ws" };
        url.set_scheme(scheme)
            .map_err(|()| Error::Config(format!("cannot use {} for a websocket", self.base_url)))?;
        if let Some(thread_id) = trimmed(thread_id) {
            url.query_pairs_mut().append_pair("threadId", thread_id);
        }
        Ok(url)
    }
}

/// Prefix with a leading `/`; blank values fall back to the default.
pub fn normalize_prefix(value: Option<&str>) -> String {
    match trimmed(value) {
        None => DEFAULT_API_PREFIX.to_string(),
        Some(prefix) if prefix.starts_with('/') => prefix.to_string(),
        Some(prefix) => format!("/{prefix}"),
    }
}

/// Positive millisecond count as a duration.
pub fn positive_millis(raw: &str) -> Option<Duration> {
    raw.trim()
        .parse::<u64>()
        .ok()
        .filter(|ms| *ms > 0)
        .map(Duration::from_millis)
}

fn trimmed(value: Option<&str>) -> Option<&str> {
    value.map(str::trim).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| vars.get(key).cloned()
    }

    #[test]
    fn defaults_without_env() {
        let config = ClientConfig::from_lookup(lookup(&[]));
        assert_eq!(config, ClientConfig::default());
        assert_eq!(config.api_url("/sessions"), "http://127.0.0.1:3001/api/sessions");
    }

    #[test]
    fn env_overrides() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("CODEX_MANAGER_API_BASE", " https://codex.example/ "),
            ("CODEX_MANAGER_API_PREFIX", "v2"),
            ("CODEX_MANAGER_TIMEOUT_MS", "1500"),
            ("CODEX_MANAGER_BEARER_TOKEN", "tok"),
            ("CODEX_MANAGER_RBAC_ROLE", "admin"),
            ("CODEX_MANAGER_RBAC_ACTOR", "  "),
        ]));
        assert_eq!(config.base_url, "https://codex.example/");
        assert_eq!(config.api_prefix, "/v2");
        assert_eq!(config.timeout, Duration::from_millis(1500));
        assert_eq!(config.headers["Authorization"], "Bearer tok");
        assert_eq!(config.headers["x-codex-rbac-role"], "admin");
        assert!(!config.headers.contains_key("x-codex-rbac-actor"));
        assert_eq!(config.api_url("/sessions"), "https://codex.example/v2/sessions");
    }

    #[test]
    fn invalid_timeout_falls_back() {
        let config = ClientConfig::from_lookup(lookup(&[("CODEX_MANAGER_TIMEOUT_MS", "-5")]));
        assert_eq!(config.timeout, DEFAULT_TIMEOUT);
        assert_eq!(positive_millis("0"), None);
    }

    #[test]
    fn stream_urls() {
        let config = ClientConfig::default();
        assert_eq!(
            config.stream_url(None).unwrap().as_str(),
            "ws://127.0.0.1:3001/api/stream"
        );

        let secure = ClientConfig {
            base_url: "https://codex.example".into(),
            ..ClientConfig::default()
        };
        assert_eq!(
            secure.stream_url(Some("thr 1")).unwrap().as_str(),
            "wss://codex.example/api/stream?threadId=thr+1"
        );
    }

    #[test]
    fn prefixes() {
        assert_eq!(normalize_prefix(None), "/api");
        assert_eq!(normalize_prefix(Some("  ")), "/api");
        assert_eq!(normalize_prefix(Some("/x")), "/x");
    }
}
