mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Call, FakeApi, turn_detail};
use serde_json::json;
use skills::{
    Error, HandleOptions, Handler, RemoteSkills, Skill, SkillSession, SkillsConfig, TurnStatuses,
    WaitOptions, Waiter,
};
use tokio::time::Instant;
use wire::{CreateSession, SendMessage};

async fn ping_session(api: FakeApi) -> (Arc<FakeApi>, SkillSession<FakeApi>) {
    let api = Arc::new(api);
    let remote = RemoteSkills::with_config(Arc::clone(&api), SkillsConfig::default());
    let session = remote
        .create_session(
            |skills| {
                skills.register(
                    Skill::new("ping", Handler::immediate(|_| Ok(json!("pong"))))
                        .description("Health check"),
                )?;
                Ok(())
            },
            CreateSession::default(),
        )
        .await
        .unwrap();
    (api, session)
}

fn fast() -> HandleOptions {
    HandleOptions {
        timeout: Some(Duration::from_secs(2)),
        interval: Some(Duration::from_millis(100)),
        ..HandleOptions::default()
    }
}

#[tokio::test(start_paused = true)]
async fn send_and_handle_ping_end_to_end() {
    let api = FakeApi::new()
        .on_list(json!({"data": [{"requestId": "r-1", "tool": "ping", "arguments": {}}]}))
        .on_detail(turn_detail("turn-1", "running", None))
        .on_detail(turn_detail("turn-1", "completed", Some("pong received")));
    let (api, mut session) = ping_session(api).await;

    let turn = session
        .send_and_handle(SendMessage::new("call ping"), fast())
        .await
        .unwrap();

    assert_eq!(turn.session_id, "sess-1");
    assert_eq!(turn.turn_id, "turn-1");
    assert_eq!(turn.status.as_deref(), Some("completed"));
    assert_eq!(turn.assistant_reply.as_deref(), Some("pong received"));
    assert_eq!(turn.dispatches.len(), 1);
    assert!(turn.dispatches[0].handled);
    assert_eq!(api.responded().len(), 1);
    assert_eq!(api.count(|call| matches!(call, Call::ListToolCalls(_))), 2);
}

#[tokio::test(start_paused = true)]
async fn send_injects_catalog_and_tools() {
    let api = FakeApi::new().on_detail(turn_detail("turn-1", "completed", None));
    let (api, mut session) = ping_session(api).await;

    session
        .send_and_handle(SendMessage::new("hello"), fast())
        .await
        .unwrap();

    let sent = api
        .calls()
        .into_iter()
        .find_map(|call| match call {
            Call::Send(id, body) => Some((id, body)),
            _ => None,
        })
        .unwrap();
    assert_eq!(sent.0, "sess-1");
    let text = sent.1["text"].as_str().unwrap();
    assert!(text.starts_with("Session remote skill catalog:\n"));
    assert!(text.contains("- ping: Health check"));
    assert!(text.ends_with("\n\nUser request:\nhello"));
    assert_eq!(sent.1["dynamicTools"][0]["name"], "ping");
}

#[tokio::test]
async fn send_without_injection_keeps_text() {
    let (api, session) = ping_session(FakeApi::new()).await;
    let accepted = session.send(SendMessage::new("plain"), false).await.unwrap();
    assert_eq!(accepted["turnId"], "turn-1");

    let calls = api.calls();
    let Some(Call::Send(_, body)) = calls.last() else {
        panic!("expected send call");
    };
    assert_eq!(body["text"], "plain");
    assert_eq!(body["dynamicTools"].as_array().unwrap().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn send_and_handle_times_out() {
    let api = FakeApi::new().on_detail(turn_detail("turn-1", "running", None));
    let (_api, mut session) = ping_session(api).await;
    let started = Instant::now();

    let err = session
        .send_and_handle(SendMessage::new("hang"), fast())
        .await
        .unwrap_err();

    let Error::Timeout(timeout) = err else {
        panic!("expected timeout, got {err:?}");
    };
    assert_eq!(
        timeout.description.as_deref(),
        Some("remote skill turn turn-1 terminal status")
    );
    assert_eq!(timeout.timeout, Duration::from_secs(2));
    assert!(timeout.attempts > 1);
    assert!(started.elapsed() >= Duration::from_secs(2));
    assert!(started.elapsed() < Duration::from_secs(3));
}

#[tokio::test(start_paused = true)]
async fn send_and_handle_requires_reply_when_asked() {
    let api = FakeApi::new().on_detail(turn_detail("turn-1", "failed", None));
    let (_api, mut session) = ping_session(api).await;

    let options = HandleOptions {
        require_reply: true,
        ..fast()
    };
    let err = session
        .send_and_handle(SendMessage::new("x"), options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingReply { turn_id } if turn_id == "turn-1"));
}

#[tokio::test(start_paused = true)]
async fn send_and_handle_custom_terminal_statuses() {
    let api = FakeApi::new()
        .on_detail(turn_detail("turn-1", "completed", None))
        .on_detail(turn_detail("turn-1", "archived", Some("done")));
    let (_api, mut session) = ping_session(api).await;

    let options = HandleOptions {
        terminal_statuses: Some(TurnStatuses::new(["Archived"]).unwrap()),
        ..fast()
    };
    let turn = session
        .send_and_handle(SendMessage::new("x"), options)
        .await
        .unwrap();
    assert_eq!(turn.status.as_deref(), Some("archived"));
    assert_eq!(turn.assistant_reply.as_deref(), Some("done"));
}

#[tokio::test]
async fn send_and_handle_validates_and_requires_turn_id() {
    let (api, mut session) = ping_session(FakeApi::new().on_send(json!({"ok": true}))).await;

    let options = HandleOptions {
        interval: Some(Duration::ZERO),
        ..HandleOptions::default()
    };
    let err = session
        .send_and_handle(SendMessage::new("x"), options)
        .await
        .unwrap_err();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(api.count(|call| matches!(call, Call::Send(..))), 0);

    let err = session
        .send_and_handle(SendMessage::new("x"), HandleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::Malformed(_)));
}

#[tokio::test]
async fn send_and_handle_refuses_signal_sessions() {
    let (_api, mut session) = ping_session(FakeApi::new()).await;
    let signal = common::tool_call_signal("sess-1", json!("r-1"), "ping", json!({}));
    session.respond_to_signal(&signal).await.unwrap();

    let err = session
        .send_and_handle(SendMessage::new("x"), HandleOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::ModeConflict { .. }));
}

fn waiter(api: FakeApi) -> (Arc<FakeApi>, Waiter<FakeApi>) {
    let api = Arc::new(api);
    (Arc::clone(&api), Waiter::new(api))
}

fn wait_fast() -> WaitOptions {
    WaitOptions::new(Duration::from_secs(5), Duration::from_millis(50))
}

#[tokio::test(start_paused = true)]
async fn assistant_reply_waits_for_completion() {
    let (api, waiter) = waiter(
        FakeApi::new()
            .on_detail(turn_detail("turn-1", "running", None))
            .on_detail(turn_detail("turn-1", "running", None))
            .on_detail(turn_detail("turn-1", "completed", Some("hi there"))),
    );

    let reply = waiter
        .assistant_reply("sess-1", "turn-1", &wait_fast())
        .await
        .unwrap();
    assert_eq!(reply.assistant_reply, "hi there");
    assert_eq!(reply.accepted, None);
    assert_eq!(api.count(|call| matches!(call, Call::GetSession(_))), 3);
}

#[tokio::test(start_paused = true)]
async fn assistant_reply_fails_fast_on_terminal_turn_without_reply() {
    let (api, waiter) = waiter(FakeApi::new().on_detail(turn_detail("turn-1", "completed", None)));
    let started = Instant::now();

    let err = waiter
        .assistant_reply("sess-1", "turn-1", &wait_fast())
        .await
        .unwrap_err();
    assert!(matches!(err, Error::MissingReply { .. }));
    assert_eq!(api.count(|call| matches!(call, Call::GetSession(_))), 1);
    assert!(started.elapsed() < Duration::from_millis(50));
}

#[tokio::test(start_paused = true)]
async fn assistant_reply_without_turn_status_polls_for_transcript() {
    let (_api, waiter) = waiter(
        FakeApi::new()
            .on_detail(json!({"transcript": []}))
            .on_detail(json!({"transcript": [
                {"turnId": "turn-1", "role": "assistant", "status": "streaming", "content": "par"},
                {"turnId": "turn-1", "role": "assistant", "status": "complete", "content": "full"}
            ]})),
    );
    let reply = waiter
        .assistant_reply("sess-1", "turn-1", &wait_fast())
        .await
        .unwrap();
    assert_eq!(reply.assistant_reply, "full");
}

#[tokio::test(start_paused = true)]
async fn assistant_reply_times_out_with_description() {
    let (_api, waiter) = waiter(FakeApi::new().on_detail(turn_detail("turn-1", "running", None)));
    let err = waiter
        .assistant_reply("sess-1", "turn-1", &wait_fast())
        .await
        .unwrap_err();
    assert!(
        err.to_string()
            .starts_with("assistant reply for turn turn-1 did not match within 5.00s")
    );
}

#[tokio::test(start_paused = true)]
async fn turn_status_reads_or_waits() {
    let (_api, waiter) = waiter(
        FakeApi::new()
            .on_detail(turn_detail("turn-1", "running", None))
            .on_detail(turn_detail("turn-1", "interrupted", None)),
    );

    let now = waiter
        .turn_status("sess-1", "turn-1", None, &wait_fast())
        .await
        .unwrap();
    assert_eq!(now.as_deref(), Some("running"));

    let expected = TurnStatuses::terminal();
    let later = waiter
        .turn_status("sess-1", "turn-1", Some(&expected), &wait_fast())
        .await
        .unwrap();
    assert_eq!(later.as_deref(), Some("interrupted"));
}

#[tokio::test(start_paused = true)]
async fn send_message_and_wait_reply_keeps_accepted() {
    let (api, waiter) = waiter(
        FakeApi::new()
            .on_send(json!({"turnId": "turn-7", "status": "accepted"}))
            .on_detail(turn_detail("turn-7", "complete", Some("ok"))),
    );

    let reply = waiter
        .send_message_and_wait_reply("sess-1", &SendMessage::new("hi"), &wait_fast())
        .await
        .unwrap();
    assert_eq!(reply.turn_id, "turn-7");
    assert_eq!(reply.assistant_reply, "ok");
    assert_eq!(reply.accepted.unwrap()["status"], "accepted");
    assert_eq!(api.count(|call| matches!(call, Call::Send(..))), 1);
}
