//! HTTP and WebSocket transport for the codex-manager session service.
//!
//! [`HttpClient`] implements [`skills::SessionApi`] over REST, so it plugs
//! straight into [`skills::RemoteSkills`]. [`EventStream`] follows the
//! service's push channel and yields [`wire::StreamEvent`]s that a
//! [`skills::SkillSession`] can serve as signals.
//!
//! # Example
//!
//! ```no_run
//! use client::{ClientConfig, EventStream, HttpClient};
//! use serde_json::json;
//! use skills::{Handler, RemoteSkills, Skill};
//! use tokio_util::sync::CancellationToken;
//! use wire::CreateSession;
//!
//! # async fn run() -> Result<(), Box<dyn std::error::Error>> {
//! let config = ClientConfig::from_env();
//! let remote = RemoteSkills::new(HttpClient::new(config.clone())?);
//! let mut session = remote
//!     .create_session(
//!         |skills| {
//!             skills.register(Skill::new("ping", Handler::immediate(|_| Ok(json!("pong")))))?;
//!             Ok(())
//!         },
//!         CreateSession::default(),
//!     )
//!     .await?;
//!
//! let cancel = CancellationToken::new();
//! let events = EventStream::new(config).events(cancel.clone())?;
//! let handled = session.serve_signals(events, &cancel).await?;
//! println!("handled {handled} calls");
//! # Ok(())
//! # }
//! ```

mod config;
mod error;
mod http;
mod stream;

pub use config::{
    Auth, ClientConfig, DEFAULT_API_PREFIX, DEFAULT_BASE_URL, DEFAULT_TIMEOUT, normalize_prefix,
    positive_millis,
};
pub use error::{Error, Result};
pub use http::{HttpClient, HttpClientBuilder};
pub use stream::EventStream;
