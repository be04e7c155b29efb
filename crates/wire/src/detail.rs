//! Readers over session-detail and accepted-message payloads.
//!
//! Session detail is only loosely shaped, so every reader here treats an
//! unexpected shape as "not available yet" rather than an error.

use serde_json::Value;

use crate::protocol::non_empty;

/// Most recent completed assistant transcript entry for `turn_id`.
pub fn assistant_reply_for_turn(detail: &Value, turn_id: &str) -> Option<String> {
    let transcript = detail.get("transcript")?.as_array()?;
    transcript.iter().rev().find_map(|entry| {
        if entry.get("turnId").and_then(Value::as_str) != Some(turn_id)
            || entry.get("role").and_then(Value::as_str) != Some("assistant")
            || entry.get("status").and_then(Value::as_str) != Some("complete")
        {
            return None;
        }
        entry
            .get("content")
            .and_then(Value::as_str)
            .and_then(non_empty)
            .map(str::to_string)
    })
}

/// Status of `turn_id` from `thread.turns`, when the service exposes it.
pub fn turn_status(detail: &Value, turn_id: &str) -> Option<String> {
    let turns = detail.get("thread")?.get("turns")?.as_array()?;
    let turn = turns
        .iter()
        .find(|turn| turn.get("id").and_then(Value::as_str) == Some(turn_id))?;
    turn.get("status")
        .and_then(Value::as_str)
        .and_then(non_empty)
        .map(str::to_string)
}

/// `session.sessionId` of a create-session response.
pub fn session_id_from_created(created: &Value) -> Option<String> {
    created
        .get("session")?
        .get("sessionId")?
        .as_str()
        .and_then(non_empty)
        .map(str::to_string)
}

/// `turnId` of an accepted send-message response.
pub fn turn_id_from_accepted(accepted: &Value) -> Option<String> {
    accepted
        .get("turnId")?
        .as_str()
        .and_then(non_empty)
        .map(str::to_string)
}

/// Whether a delete response reports the session as gone.
pub fn delete_indicates_deleted(response: &Value) -> bool {
    matches!(
        response.get("status").and_then(Value::as_str),
        Some("ok" | "deleted")
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn picks_latest_complete_assistant_entry() {
        let detail = json!({
            "transcript": [
                {"turnId": "t1", "role": "assistant", "status": "complete", "content": "first"},
                {"turnId": "t1", "role": "user", "status": "complete", "content": "question"},
                {"turnId": "t1", "role": "assistant", "status": "complete", "content": " second "},
                {"turnId": "t1", "role": "assistant", "status": "streaming", "content": "partial"},
                {"turnId": "t2", "role": "assistant", "status": "complete", "content": "other"}
            ]
        });
        assert_eq!(assistant_reply_for_turn(&detail, "t1").as_deref(), Some("second"));
        assert_eq!(assistant_reply_for_turn(&detail, "t3"), None);
        assert_eq!(assistant_reply_for_turn(&json!([]), "t1"), None);
    }

    #[test]
    fn reads_turn_status() {
        let detail = json!({
            "thread": {"turns": [
                {"id": "t1", "status": " completed "},
                {"id": "t2", "status": ""}
            ]}
        });
        assert_eq!(turn_status(&detail, "t1").as_deref(), Some("completed"));
        assert_eq!(turn_status(&detail, "t2"), None);
        assert_eq!(turn_status(&json!({"thread": {}}), "t1"), None);
    }

    #[test]
    fn reads_ids_and_delete_status() {
        assert_eq!(
            session_id_from_created(&json!({"session": {"sessionId": "s-1"}})).as_deref(),
            Some("s-1")
        );
        assert_eq!(session_id_from_created(&json!({"session": {}})), None);
        assert_eq!(turn_id_from_accepted(&json!({"turnId": "t-9"})).as_deref(), Some("t-9"));
        assert!(delete_indicates_deleted(&json!({"status": "deleted"})));
        assert!(!delete_indicates_deleted(&json!({"status": "not_found"})));
    }
}
