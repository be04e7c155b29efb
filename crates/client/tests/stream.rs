//! Event stream against a local WebSocket server.

use std::time::Duration;

use client::{ClientConfig, EventStream};
use futures::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::net::TcpListener;
use tokio::sync::oneshot;
use tokio_tungstenite::accept_async;
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;

/// Accept one connection, report its first message, send `frames`, then
/// drain until the client goes away.
async fn serve(frames: Vec<Message>) -> (String, oneshot::Receiver<Value>) {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let (first_tx, first_rx) = oneshot::channel();

    tokio::spawn(async move {
        let (tcp, _) = listener.accept().await.unwrap();
        let mut socket = accept_async(tcp).await.unwrap();
        if let Some(Ok(Message::Text(text))) = socket.next().await {
            let _ = first_tx.send(serde_json::from_str(&text).unwrap());
        }
        for frame in frames {
            socket.send(frame).await.unwrap();
        }
        while let Some(Ok(_)) = socket.next().await {}
    });

    (format!("http://{addr}"), first_rx)
}

fn stream(base_url: String) -> EventStream {
    let config = ClientConfig {
        base_url,
        ..ClientConfig::default()
    };
    EventStream::new(config)
        .thread("thr-1")
        .ping_interval(Duration::from_secs(60))
}

#[tokio::test]
async fn subscribes_and_yields_object_frames() {
    let (base_url, first) = serve(vec![
        Message::Text(json!({"type": "turn.started", "threadId": "thr-1"}).to_string()),
        Message::Binary(vec![1, 2, 3].into()),
        Message::Text("[1, 2]".into()),
        Message::Text("garbage".into()),
        Message::Text(
            json!({"type": "app_server.signal", "threadId": "thr-1", "payload": {"x": 1}})
                .to_string(),
        ),
    ])
    .await;

    let cancel = CancellationToken::new();
    let events = stream(base_url).events(cancel.clone()).unwrap();
    let mut events = std::pin::pin!(events);

    let started = events.next().await.unwrap();
    assert_eq!(started.event_type, "turn.started");
    assert_eq!(
        first.await.unwrap(),
        json!({"type": "subscribe", "threadId": "thr-1"})
    );

    let signal = events.next().await.unwrap();
    assert_eq!(signal.event_type, "app_server.signal");
    assert_eq!(signal.thread_id.as_deref(), Some("thr-1"));

    cancel.cancel();
    assert!(events.next().await.is_none());
}

#[tokio::test]
async fn cancellation_stops_reconnecting() {
    // Nothing listens on the discard port, so every attempt fails.
    let config = ClientConfig {
        base_url: "http://127.0.0.1:9".into(),
        ..ClientConfig::default()
    };
    let cancel = CancellationToken::new();
    let events = EventStream::new(config)
        .reconnect(Duration::from_millis(10), Duration::from_millis(20))
        .events(cancel.clone())
        .unwrap();
    let mut events = std::pin::pin!(events);

    let canceller = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(100)).await;
        canceller.cancel();
    });

    let next = tokio::time::timeout(Duration::from_secs(5), events.next()).await;
    assert!(matches!(next, Ok(None)));
}

#[test]
fn invalid_base_url_fails_up_front() {
    let config = ClientConfig {
        base_url: "not a url".into(),
        ..ClientConfig::default()
    };
    let result = EventStream::new(config).events(CancellationToken::new());
    assert!(matches!(result, Err(client::Error::Config(_))));
}
