//! Wire shapes for the codex-manager session service.
//!
//! This crate holds the payloads exchanged with the remote service and the
//! transport error taxonomy. It does no I/O.
//!
//! # Example
//!
//! ```
//! use wire::{PendingToolCall, ResponseEnvelope, pending_rows};
//! use serde_json::json;
//!
//! let listing = json!({"data": [{"requestId": "r-1", "tool": "ping", "arguments": {}}]});
//! for row in pending_rows(&listing)? {
//!     let call = PendingToolCall::from_value(&row);
//!     assert_eq!(call.tool.as_deref(), Some("ping"));
//! }
//!
//! let reply = ResponseEnvelope::text("pong", true);
//! assert_eq!(reply.first_text(), Some("pong"));
//! # Ok::<(), wire::Error>(())
//! ```

pub mod detail;
mod error;
mod event;
mod protocol;

pub use error::{Error, Result, StatusKind};
pub use event::{AppServerSignal, StreamEvent, TOOL_CALL_EVENT};
pub use protocol::{
    CreateSession, INPUT_TEXT, PendingToolCall, RequestId, ResponseEnvelope, SendMessage,
    ToolDefinition, non_empty, pending_rows,
};
