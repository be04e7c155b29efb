//! Remote skill dispatch for codex-manager sessions.
//!
//! A local process registers skills while creating a remote session. The
//! remote agent then calls them as tools; this crate receives those calls
//! (pushed as signals or discovered by polling), runs the handlers, and
//! submits their results with bounded retry and request-id dedup.
//!
//! # Example
//!
//! ```no_run
//! # async fn run<A: skills::SessionApi>(api: A) -> skills::Result<()> {
//! use serde::Deserialize;
//! use skills::{Handler, HandleOptions, RemoteSkills, Skill};
//! use wire::{CreateSession, SendMessage};
//!
//! #[derive(Deserialize)]
//! struct Add {
//!     a: i64,
//!     b: i64,
//! }
//!
//! let remote = RemoteSkills::new(api);
//! let mut session = remote
//!     .create_session(
//!         |skills| {
//!             skills.register(
//!                 Skill::new("add", Handler::typed(|args: Add| Ok::<_, String>(args.a + args.b)))
//!                     .description("Add two integers"),
//!             )?;
//!             Ok(())
//!         },
//!         CreateSession::default(),
//!     )
//!     .await?;
//!
//! let turn = session
//!     .send_and_handle(SendMessage::new("what is 2 + 3?"), HandleOptions::default())
//!     .await?;
//! for dispatch in &turn.dispatches {
//!     println!("{} handled={}", dispatch.tool, dispatch.handled);
//! }
//! # Ok(())
//! # }
//! ```
//!
//! Thread-blocking equivalents live in [`blocking`].

mod api;
pub mod blocking;
mod catalog;
mod config;
mod dispatch;
mod error;
mod facade;
mod handler;
mod ledger;
mod registry;
mod session;
pub mod wait;

pub use api::SessionApi;
pub use config::{DEFAULT_TERMINAL_STATUSES, RetryPolicy, SkillsConfig, TurnStatuses};
pub use dispatch::{Dispatch, ToolCall, failure_envelope, normalize_result};
pub use error::{Error, Result};
pub use facade::{CloseReport, Lifecycle, LifecycleOptions, RemoteSkills};
pub use handler::{Arguments, Handler, HandlerError, HandlerResult};
pub use ledger::DedupLedger;
pub use registry::{DispatchMode, Skill, SkillDefinition, SkillRegistry};
pub use session::{HandleOptions, SkillSession, SkillTurnResult};
pub use wait::{SessionTurnReply, WaitOptions, WaitTimeout, Waiter};
