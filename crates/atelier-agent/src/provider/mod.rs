//! Model providers.
//!
//! A [`ModelProvider`] turns a [`CompletionRequest`] into either a token
//! stream or a buffered string. Both shipped providers speak the
//! OpenAI-compatible HTTP dialect; the difference is which endpoint and prompt
//! format they use.

pub mod local;
pub mod openai;

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use reqwest::RequestBuilder;
use reqwest_eventsource::retry::Never;
use reqwest_eventsource::{Event, EventSource};
use schemars::JsonSchema;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;
use tracing::{debug, warn};

use crate::error::AgentError;
use crate::types::InputItem;

/// Payload OpenAI-compatible servers send after the last chunk.
pub(crate) const DONE_SENTINEL: &str = "[DONE]";

/// Stream of text deltas produced by a model.
pub type TokenStream = Pin<Box<dyn Stream<Item = Result<String, AgentError>> + Send>>;

/// Sampling knobs. `None` leaves the provider default in place.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sampling {
    pub max_tokens: Option<u32>,
    pub temperature: Option<f32>,
    pub top_p: Option<f32>,
    pub repeat_penalty: Option<f32>,
    pub stop: Vec<String>,
}

/// JSON schema a structured response must follow.
#[derive(Debug, Clone, PartialEq)]
pub struct ResponseSchema {
    pub name: String,
    pub schema: serde_json::Value,
}

impl ResponseSchema {
    pub fn of<T: JsonSchema>(name: impl Into<String>) -> Result<Self, AgentError> {
        let schema = serde_json::to_value(schemars::schema_for!(T))
            .map_err(|source| AgentError::Schema { source })?;
        Ok(Self {
            name: name.into(),
            schema,
        })
    }
}

/// Everything a provider needs for one round-trip.
#[derive(Debug, Clone, Default)]
pub struct CompletionRequest {
    pub model: String,
    pub instructions: Option<String>,
    pub input: Vec<InputItem>,
    pub sampling: Sampling,
    pub response_schema: Option<ResponseSchema>,
}

#[async_trait]
pub trait ModelProvider: Send + Sync + std::fmt::Debug {
    /// Short identifier used in logs.
    fn name(&self) -> &'static str;

    /// Stream text deltas as they are generated.
    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError>;

    /// Run to completion and return the full text.
    async fn complete(&self, request: CompletionRequest) -> Result<String, AgentError>;
}

/// Drain a token stream into a single string.
pub async fn collect_stream(mut stream: TokenStream) -> Result<String, AgentError> {
    let mut out = String::new();
    while let Some(delta) = stream.next().await {
        out.push_str(&delta?);
    }
    Ok(out)
}

/// Open an SSE request and expose its `data` payloads as a [`TokenStream`].
///
/// Waits for the connection to open, so HTTP and transport failures are
/// returned here rather than as the first stream item. `extract` maps one
/// payload to an optional text delta; the `[DONE]` sentinel ends the stream,
/// as does the server closing the connection.
pub(crate) async fn event_token_stream<F>(
    endpoint: String,
    request: RequestBuilder,
    extract: F,
) -> Result<TokenStream, AgentError>
where
    F: Fn(&str) -> Result<Option<String>, AgentError> + Send + 'static,
{
    let mut source = EventSource::new(request)
        .map_err(|e| AgentError::Stream(format!("request to {endpoint} cannot be streamed: {e}")))?;
    source.set_retry_policy(Box::new(Never));

    let mut pending = None;
    match source.next().await {
        Some(Ok(Event::Open)) => {}
        Some(Ok(Event::Message(message))) => pending = Some(message.data),
        Some(Err(e)) => {
            source.close();
            return Err(source_error(&endpoint, e).await);
        }
        None => return Err(AgentError::EmptyResponse),
    }

    let (tx, rx) = mpsc::channel::<Result<String, AgentError>>(64);
    tokio::spawn(async move {
        loop {
            let data = match pending.take() {
                Some(data) => data,
                None => match source.next().await {
                    Some(Ok(Event::Message(message))) => message.data,
                    Some(Ok(Event::Open)) => continue,
                    Some(Err(reqwest_eventsource::Error::StreamEnded)) | None => break,
                    Some(Err(e)) => {
                        let _ = tx.send(Err(source_error(&endpoint, e).await)).await;
                        break;
                    }
                },
            };
            if data.trim() == DONE_SENTINEL {
                break;
            }
            match extract(&data) {
                Ok(Some(delta)) if !delta.is_empty() => {
                    if tx.send(Ok(delta)).await.is_err() {
                        debug!("token receiver dropped; stopping stream");
                        break;
                    }
                }
                Ok(_) => {}
                Err(e) => {
                    warn!(error = %e, "aborting stream on malformed event");
                    let _ = tx.send(Err(e)).await;
                    break;
                }
            }
        }
        source.close();
    });

    Ok(Box::pin(ReceiverStream::new(rx)))
}

async fn source_error(endpoint: &str, err: reqwest_eventsource::Error) -> AgentError {
    use reqwest_eventsource::Error;
    match err {
        Error::InvalidStatusCode(status, response) => match check_status(response).await {
            Err(e) => e,
            Ok(_) => AgentError::Status {
                status: status.as_u16(),
                message: "unexpected status".to_owned(),
            },
        },
        Error::InvalidContentType(content_type, _) => AgentError::Decode(format!(
            "expected text/event-stream, got {}",
            content_type.to_str().unwrap_or("<binary>")
        )),
        Error::Transport(source) => AgentError::Request {
            endpoint: endpoint.to_owned(),
            source,
        },
        other => AgentError::Stream(other.to_string()),
    }
}

// Error envelope used by OpenAI and compatible APIs.
#[derive(Debug, Deserialize)]
struct ErrorEnvelope {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    message: String,
}

/// Return the response unchanged on 2xx, otherwise a [`AgentError::Status`]
/// carrying the provider's error message when it sent one.
pub(crate) async fn check_status(
    response: reqwest::Response,
) -> Result<reqwest::Response, AgentError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response
        .text()
        .await
        .unwrap_or_else(|_| "<failed to read error body>".to_owned());
    let message = serde_json::from_str::<ErrorEnvelope>(&body)
        .map(|env| env.error.message)
        .unwrap_or(body);

    Err(AgentError::Status {
        status: status.as_u16(),
        message,
    })
}

/// Extract an in-band `{"error": {...}}` object some servers emit mid-stream.
pub(crate) fn stream_error(payload: &serde_json::Value) -> Option<AgentError> {
    payload.get("error").map(|err| {
        let message = err
            .get("message")
            .and_then(|m| m.as_str())
            .unwrap_or("unknown provider error");
        AgentError::Stream(message.to_owned())
    })
}
