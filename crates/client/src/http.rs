//! REST client for the session service.

use std::time::Duration;

use reqwest::header::{CONTENT_TYPE, HeaderMap, HeaderName, HeaderValue};
use reqwest::{Method, Response};
use serde_json::{Value, json};
use skills::SessionApi;
use uuid::Uuid;
use wire::{CreateSession, ResponseEnvelope, SendMessage};

use crate::config::ClientConfig;
use crate::{Error, Result};

const CLIENT_REQUEST_ID: &str = "x-client-request-id";

/// One API call: its name for errors and logs, route, and the non-2xx
/// statuses whose bodies are returned as values.
struct Route {
    operation: &'static str,
    method: Method,
    path: String,
    tolerated: &'static [u16],
}

impl Route {
    fn new(operation: &'static str, method: Method, path: String) -> Self {
        Self {
            operation,
            method,
            path,
            tolerated: &[],
        }
    }

    fn tolerating(mut self, statuses: &'static [u16]) -> Self {
        self.tolerated = statuses;
        self
    }
}

/// Builder for [`HttpClient`].
#[derive(Debug, Clone)]
pub struct HttpClientBuilder {
    config: ClientConfig,
}

impl HttpClientBuilder {
    pub fn new(config: ClientConfig) -> Self {
        Self { config }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.config.headers.insert(name.into(), value.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.config.timeout = timeout;
        self
    }

    pub fn build(self) -> Result<HttpClient> {
        let mut headers = HeaderMap::new();
        for (name, value) in &self.config.headers {
            let header_name = HeaderName::from_bytes(name.as_bytes()).map_err(|err| Error::Header {
                name: name.clone(),
                reason: err.to_string(),
            })?;
            let header_value = HeaderValue::from_str(value).map_err(|err| Error::Header {
                name: name.clone(),
                reason: err.to_string(),
            })?;
            headers.insert(header_name, header_value);
        }

        let http = reqwest::Client::builder()
            .timeout(self.config.timeout)
            .default_headers(headers)
            .build()?;
        Ok(HttpClient {
            http,
            config: self.config,
        })
    }
}

/// `reqwest`-backed [`SessionApi`].
#[derive(Debug, Clone)]
pub struct HttpClient {
    http: reqwest::Client,
    config: ClientConfig,
}

impl HttpClient {
    pub fn new(config: ClientConfig) -> Result<Self> {
        HttpClientBuilder::new(config).build()
    }

    pub fn builder(config: ClientConfig) -> HttpClientBuilder {
        HttpClientBuilder::new(config)
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    async fn request(&self, route: Route, body: Option<Value>) -> wire::Result<Value> {
        let client_request_id = Uuid::new_v4().to_string();
        let url = self.config.api_url(&route.path);

        let mut request = self
            .http
            .request(route.method.clone(), &url)
            .header(CLIENT_REQUEST_ID, &client_request_id)
            .header("accept", "application/json");
        if let Some(body) = &body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(|err| {
            tracing::debug!(
                operation = route.operation,
                method = %route.method,
                path = %route.path,
                client_request_id = %client_request_id,
                error = %err,
                "request failed"
            );
            transport_error(route.operation, err)
        })?;

        let status = response.status().as_u16();
        tracing::debug!(
            operation = route.operation,
            method = %route.method,
            path = %route.path,
            status,
            client_request_id = %client_request_id,
            "request completed"
        );

        let payload = read_body(route.operation, response).await?;
        if (200..300).contains(&status) || route.tolerated.contains(&status) {
            return Ok(payload);
        }
        Err(wire::Error::Status {
            operation: route.operation.to_string(),
            status,
            body: (!payload.is_null()).then_some(payload),
        })
    }
}

fn transport_error(operation: &str, err: reqwest::Error) -> wire::Error {
    if err.is_timeout() {
        wire::Error::Timeout(format!("{operation}: {err}"))
    } else {
        wire::Error::Transport(format!("{operation}: {err}"))
    }
}

/// Decode a response body: JSON when declared as such, text otherwise,
/// `null` when empty.
async fn read_body(operation: &str, response: Response) -> wire::Result<Value> {
    let is_json = response
        .headers()
        .get(CONTENT_TYPE)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|value| value.contains("application/json"));
    let bytes = response
        .bytes()
        .await
        .map_err(|err| transport_error(operation, err))?;

    if bytes.is_empty() {
        return Ok(Value::Null);
    }
    let text = || Value::String(String::from_utf8_lossy(&bytes).into_owned());
    if !is_json {
        return Ok(text());
    }
    Ok(serde_json::from_slice(&bytes).unwrap_or_else(|_| text()))
}

fn to_body(operation: &str, value: &impl serde::Serialize) -> wire::Result<Value> {
    serde_json::to_value(value)
        .map_err(|err| wire::Error::Malformed(format!("{operation} request body: {err}")))
}

impl SessionApi for HttpClient {
    async fn create_session(&self, request: &CreateSession) -> wire::Result<Value> {
        let body = to_body("sessions.create", request)?;
        let route = Route::new("sessions.create", Method::POST, "/sessions".into());
        self.request(route, Some(body)).await
    }

    async fn get_session(&self, session_id: &str) -> wire::Result<Value> {
        let route = Route::new("sessions.get", Method::GET, format!("/sessions/{session_id}"))
            .tolerating(&[410]);
        self.request(route, None).await
    }

    async fn delete_session(&self, session_id: &str) -> wire::Result<Value> {
        let route = Route::new(
            "sessions.delete",
            Method::DELETE,
            format!("/sessions/{session_id}"),
        )
        .tolerating(&[404, 410]);
        self.request(route, None).await
    }

    async fn send_message(&self, session_id: &str, message: &SendMessage) -> wire::Result<Value> {
        let body = to_body("sessions.send_message", message)?;
        let route = Route::new(
            "sessions.send_message",
            Method::POST,
            format!("/sessions/{session_id}/messages"),
        )
        .tolerating(&[404, 410]);
        self.request(route, Some(body)).await
    }

    async fn list_tool_calls(&self, session_id: &str) -> wire::Result<Value> {
        let route = Route::new(
            "sessions.tool_calls",
            Method::GET,
            format!("/sessions/{session_id}/tool-calls"),
        )
        .tolerating(&[404, 410]);
        self.request(route, None).await
    }

    async fn respond_tool_call(
        &self,
        request_id: &str,
        response: &ResponseEnvelope,
    ) -> wire::Result<Value> {
        let body = json!({ "response": to_body("tool_calls.respond", response)? });
        let route = Route::new(
            "tool_calls.respond",
            Method::POST,
            format!("/tool-calls/{request_id}/response"),
        )
        .tolerating(&[404, 409]);
        self.request(route, Some(body)).await
    }
}
