//! Remote session API seam.

use std::future::Future;

use serde_json::Value;
use wire::{CreateSession, ResponseEnvelope, SendMessage};

/// Operations the engine needs from the remote session service.
///
/// Payloads are returned as raw JSON so the engine can classify structured
/// non-success outcomes (`not_found`, `conflict`, `deleted`) itself.
/// Implementations return such bodies as `Ok` values rather than errors.
pub trait SessionApi: Send + Sync {
    fn create_session(
        &self,
        request: &CreateSession,
    ) -> impl Future<Output = wire::Result<Value>> + Send;

    fn get_session(&self, session_id: &str) -> impl Future<Output = wire::Result<Value>> + Send;

    fn delete_session(&self, session_id: &str)
    -> impl Future<Output = wire::Result<Value>> + Send;

    fn send_message(
        &self,
        session_id: &str,
        message: &SendMessage,
    ) -> impl Future<Output = wire::Result<Value>> + Send;

    fn list_tool_calls(
        &self,
        session_id: &str,
    ) -> impl Future<Output = wire::Result<Value>> + Send;

    fn respond_tool_call(
        &self,
        request_id: &str,
        response: &ResponseEnvelope,
    ) -> impl Future<Output = wire::Result<Value>> + Send;
}
