//! WebSocket event stream with reconnect.

use std::time::Duration;

use futures::{SinkExt, Stream, StreamExt};
use serde_json::{Value, json};
use tokio::time::{Instant, MissedTickBehavior};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::{HeaderName, HeaderValue};
use tokio_tungstenite::tungstenite::Message;
use tokio_util::sync::CancellationToken;
use wire::StreamEvent;

use crate::config::ClientConfig;
use crate::{Error, Result};

const RECONNECT_BASE: Duration = Duration::from_millis(500);
const RECONNECT_MAX: Duration = Duration::from_secs(10);
const PING_INTERVAL: Duration = Duration::from_secs(15);

/// Subscription to the service's event stream.
///
/// ```no_run
/// use client::{ClientConfig, EventStream};
/// use futures::StreamExt;
/// use tokio_util::sync::CancellationToken;
///
/// # async fn run() -> client::Result<()> {
/// let cancel = CancellationToken::new();
/// let events = EventStream::new(ClientConfig::from_env())
///     .thread("thr-1")
///     .events(cancel.clone())?;
/// let mut events = std::pin::pin!(events);
/// while let Some(event) = events.next().await {
///     println!("{}", event.event_type);
/// }
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone)]
pub struct EventStream {
    config: ClientConfig,
    thread_id: Option<String>,
    reconnect_base: Duration,
    reconnect_max: Duration,
    ping_interval: Duration,
}

impl EventStream {
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            thread_id: None,
            reconnect_base: RECONNECT_BASE,
            reconnect_max: RECONNECT_MAX,
            ping_interval: PING_INTERVAL,
        }
    }

    /// Only receive events of one thread.
    pub fn thread(mut self, thread_id: impl Into<String>) -> Self {
        self.thread_id = Some(thread_id.into());
        self
    }

    pub fn reconnect(mut self, base: Duration, max: Duration) -> Self {
        self.reconnect_base = base;
        self.reconnect_max = max;
        self
    }

    pub fn ping_interval(mut self, interval: Duration) -> Self {
        self.ping_interval = interval;
        self
    }

    /// Delay before reconnect attempt number `failures` (1-based).
    pub fn backoff(&self, failures: u32) -> Duration {
        let exponent = failures.saturating_sub(1).min(16);
        self.reconnect_base
            .saturating_mul(1 << exponent)
            .min(self.reconnect_max)
    }

    fn handshake(&self) -> Result<Request> {
        let url = self.config.stream_url(self.thread_id.as_deref())?;
        let mut request = url.as_str().into_client_request()?;
        for (name, value) in &self.config.headers {
            let header = |reason: String| Error::Header {
                name: name.clone(),
                reason,
            };
            let header_name =
                HeaderName::from_bytes(name.as_bytes()).map_err(|err| header(err.to_string()))?;
            let header_value = HeaderValue::from_str(value).map_err(|err| header(err.to_string()))?;
            request.headers_mut().insert(header_name, header_value);
        }
        Ok(request)
    }

    /// Stream events until `cancel` fires, reconnecting with exponential
    /// backoff whenever the connection drops.
    ///
    /// Non-text frames and frames that are not JSON objects are skipped.
    pub fn events(
        self,
        cancel: CancellationToken,
    ) -> Result<impl Stream<Item = StreamEvent> + Send + 'static> {
        let uri = self.handshake()?.uri().to_string();

        Ok(async_stream::stream! {
            let mut failures: u32 = 0;
            loop {
                let request = match self.handshake() {
                    Ok(request) => request,
                    Err(err) => {
                        tracing::error!(uri = %uri, error = %err, "event stream handshake failed");
                        break;
                    }
                };
                let connected = tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    connected = connect_async(request) => connected,
                };

                match connected {
                    Ok((socket, _)) => {
                        tracing::debug!(uri = %uri, "event stream connected");
                        failures = 0;
                        let (mut sink, mut source) = socket.split();

                        if let Some(thread_id) = &self.thread_id {
                            let subscribe = json!({"type": "subscribe", "threadId": thread_id});
                            if let Err(err) = sink.send(Message::Text(subscribe.to_string())).await {
                                tracing::debug!(error = %err, "event stream subscribe failed");
                            }
                        }

                        let mut ping = tokio::time::interval_at(
                            Instant::now() + self.ping_interval,
                            self.ping_interval,
                        );
                        ping.set_missed_tick_behavior(MissedTickBehavior::Delay);

                        loop {
                            let frame = tokio::select! {
                                biased;
                                _ = cancel.cancelled() => {
                                    let _ = sink.close().await;
                                    return;
                                }
                                _ = ping.tick() => {
                                    let message = json!({"type": "ping"}).to_string();
                                    match sink.send(Message::Text(message)).await {
                                        Ok(()) => continue,
                                        Err(err) => {
                                            tracing::debug!(error = %err, "event stream ping failed");
                                            break;
                                        }
                                    }
                                }
                                frame = source.next() => frame,
                            };

                            match frame {
                                Some(Ok(Message::Text(text))) => {
                                    if let Some(event) = parse_frame(&text) {
                                        yield event;
                                    }
                                }
                                Some(Ok(Message::Close(_))) | None => break,
                                Some(Ok(_)) => {}
                                Some(Err(err)) => {
                                    tracing::debug!(error = %err, "event stream read failed");
                                    break;
                                }
                            }
                        }
                    }
                    Err(err) => {
                        tracing::debug!(uri = %uri, error = %err, "event stream connect failed");
                    }
                }

                failures = failures.saturating_add(1);
                let delay = self.backoff(failures);
                tracing::warn!(failures, delay_ms = delay.as_millis() as u64, "event stream reconnecting");
                tokio::select! {
                    biased;
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(delay) => {}
                }
            }
        })
    }
}

fn parse_frame(text: &str) -> Option<StreamEvent> {
    match serde_json::from_str::<Value>(text) {
        Ok(Value::Object(body)) => Some(StreamEvent::from_json(&body)),
        Ok(_) => None,
        Err(_) => {
            tracing::debug!("ignoring malformed stream message");
            None
        }
    }
}
