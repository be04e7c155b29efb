mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{Call, FakeApi, turn_detail};
use serde_json::json;
use skills::blocking::RemoteSkills;
use skills::{Error, HandleOptions, Handler, HandlerError, LifecycleOptions, Skill, SkillsConfig};
use wire::{CreateSession, SendMessage};

fn fast() -> HandleOptions {
    HandleOptions {
        timeout: Some(Duration::from_secs(2)),
        interval: Some(Duration::from_millis(5)),
        ..HandleOptions::default()
    }
}

#[test]
fn blocking_ping_end_to_end() {
    let api = Arc::new(
        FakeApi::new()
            .on_list(json!({"data": [{"requestId": "r-1", "tool": "ping"}]}))
            .on_detail(turn_detail("turn-1", "completed", Some("pong received"))),
    );
    let remote = RemoteSkills::with_config(Arc::clone(&api), SkillsConfig::default()).unwrap();

    let mut session = remote
        .create_session(
            |skills| {
                skills.register(Skill::new("ping", Handler::immediate(|_| Ok(json!("pong")))))?;
                Ok(())
            },
            CreateSession::default(),
        )
        .unwrap();

    let turn = session
        .send_and_handle(SendMessage::new("call ping"), fast())
        .unwrap();
    assert_eq!(turn.assistant_reply.as_deref(), Some("pong received"));
    assert!(turn.dispatches[0].handled);
    assert_eq!(api.responded()[0].1["contentItems"][0]["text"], "pong");

    let report = remote.close_session(session, true, true).unwrap();
    assert!(report.deleted);
}

#[test]
fn blocking_sessions_refuse_deferred_handlers() {
    let api = Arc::new(FakeApi::new().on_list(json!({"data": [{"requestId": "r-1", "tool": "slow"}]})));
    let remote = RemoteSkills::with_config(Arc::clone(&api), SkillsConfig::default()).unwrap();

    let mut session = remote
        .create_session(
            |skills| {
                skills.register(Skill::new(
                    "slow",
                    Handler::deferred(|_| async { Ok::<_, HandlerError>(json!("late")) }),
                ))?;
                Ok(())
            },
            CreateSession::default(),
        )
        .unwrap();

    let dispatches = session.drain_pending_calls().unwrap();
    assert!(!dispatches[0].handled);
    assert_eq!(
        dispatches[0].response.first_text(),
        Some("remote skill slow failed: remote skill slow is deferred and cannot run in a blocking session")
    );
    assert_eq!(api.responded().len(), 1);
}

#[test]
fn blocking_lifecycle_closes_after_error() {
    let api = Arc::new(FakeApi::new());
    let remote = RemoteSkills::with_config(Arc::clone(&api), SkillsConfig::default()).unwrap();

    let err = remote
        .lifecycle(
            |_| Ok(()),
            CreateSession::default(),
            LifecycleOptions::default(),
            |session| -> skills::Result<()> {
                assert_eq!(session.id(), "sess-1");
                Err(Error::InvalidArgument("stop".into()))
            },
        )
        .err()
        .unwrap();
    assert!(matches!(err, Error::InvalidArgument(_)));
    assert_eq!(api.count(|call| matches!(call, Call::Delete(_))), 1);
}

#[test]
fn blocking_waiter_fails_fast() {
    let api = Arc::new(FakeApi::new().on_detail(turn_detail("turn-1", "error", None)));
    let remote = RemoteSkills::with_config(Arc::clone(&api), SkillsConfig::default()).unwrap();

    let err = remote
        .waiter()
        .assistant_reply("sess-1", "turn-1", &skills::WaitOptions::default())
        .unwrap_err();
    assert!(matches!(err, Error::MissingReply { .. }));
}
