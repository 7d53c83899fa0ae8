//! Hosted provider speaking the OpenAI `/chat/completions` dialect.
//!
//! All wire types are private to this module. Streaming uses SSE; structured
//! output uses `response_format: json_schema`. The same client also fronts the
//! `/audio/transcriptions` endpoint for the transcribe route.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::{debug, trace};

use super::{
    check_status, event_token_stream, stream_error, CompletionRequest, ModelProvider, TokenStream,
};
use crate::error::AgentError;
use crate::types::{ContentPart, InputItem, Role};

/// Connection settings for an OpenAI-compatible endpoint.
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    /// Base URL including the version segment, e.g. `https://api.openai.com/v1`.
    pub base_url: String,
    pub api_key: Option<String>,
    pub organization: Option<String>,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct OpenAiProvider {
    client: Client,
    config: OpenAiConfig,
}

impl OpenAiProvider {
    pub fn new(config: OpenAiConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| AgentError::Client { source })?;
        Ok(Self { client, config })
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}/{}", self.config.base_url.trim_end_matches('/'), path)
    }

    fn authorize(&self, mut req: RequestBuilder) -> RequestBuilder {
        if let Some(key) = &self.config.api_key {
            req = req.bearer_auth(key);
        }
        if let Some(org) = &self.config.organization {
            req = req.header("OpenAI-Organization", org);
        }
        req
    }

    fn chat_request(&self, body: &ChatRequest<'_>) -> (String, RequestBuilder) {
        let endpoint = self.endpoint("chat/completions");
        debug!(
            model = %body.model,
            messages = body.messages.len(),
            stream = body.stream,
            structured = body.response_format.is_some(),
            "sending chat completion request"
        );
        let request = self.authorize(self.client.post(&endpoint).json(body));
        (endpoint, request)
    }

    /// Transcribe an English audio clip with the hosted speech model.
    pub async fn transcribe(
        &self,
        audio: Vec<u8>,
        filename: &str,
        model: &str,
    ) -> Result<String, AgentError> {
        let endpoint = self.endpoint("audio/transcriptions");
        let form = Form::new()
            .text("model", model.to_owned())
            .text("language", "en")
            .part("file", Part::bytes(audio).file_name(filename.to_owned()));

        let response = self
            .authorize(self.client.post(&endpoint).multipart(form))
            .send()
            .await
            .map_err(|source| AgentError::Request { endpoint, source })?;
        let parsed: TranscriptionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        Ok(parsed.text.trim().to_owned())
    }
}

#[async_trait]
impl ModelProvider for OpenAiProvider {
    fn name(&self) -> &'static str {
        "openai"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError> {
        let body = ChatRequest::from_request(&request, true);
        let (endpoint, http) = self.chat_request(&body);
        event_token_stream(endpoint, http, extract_delta).await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AgentError> {
        let body = ChatRequest::from_request(&request, false);
        let (endpoint, http) = self.chat_request(&body);
        let response = http
            .send()
            .await
            .map_err(|source| AgentError::Request { endpoint, source })?;
        let parsed: ChatResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        trace!(choices = parsed.choices.len(), "chat completion response");

        parsed
            .choices
            .into_iter()
            .next()
            .and_then(|c| c.message.content)
            .filter(|s| !s.trim().is_empty())
            .ok_or(AgentError::EmptyResponse)
    }
}

/// Pull the text delta out of one streamed chunk.
fn extract_delta(payload: &str) -> Result<Option<String>, AgentError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| AgentError::Decode(e.to_string()))?;
    if let Some(err) = stream_error(&value) {
        return Err(err);
    }
    Ok(value
        .pointer("/choices/0/delta/content")
        .and_then(|c| c.as_str())
        .map(str::to_owned))
}

// ── Private wire types ────────────────────────────────────────────────────────

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<WireMessage>,
    stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "<[String]>::is_empty")]
    stop: &'a [String],
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<serde_json::Value>,
}

impl<'a> ChatRequest<'a> {
    fn from_request(request: &'a CompletionRequest, stream: bool) -> Self {
        let mut messages = Vec::with_capacity(request.input.len() + 1);
        if let Some(instructions) = &request.instructions {
            messages.push(WireMessage {
                role: Role::System,
                content: WireContent::Text(instructions.clone()),
            });
        }
        messages.extend(request.input.iter().map(WireMessage::from));

        let response_format = request.response_schema.as_ref().map(|s| {
            serde_json::json!({
                "type": "json_schema",
                "json_schema": {
                    "name": s.name,
                    "schema": s.schema,
                    "strict": false,
                }
            })
        });

        Self {
            model: &request.model,
            messages,
            stream,
            max_tokens: request.sampling.max_tokens,
            temperature: request.sampling.temperature,
            top_p: request.sampling.top_p,
            stop: &request.sampling.stop,
            response_format,
        }
    }
}

#[derive(Debug, Serialize)]
struct WireMessage {
    role: Role,
    content: WireContent,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
enum WireContent {
    Text(String),
    Parts(Vec<WirePart>),
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum WirePart {
    Text { text: String },
    ImageUrl { image_url: WireImageUrl },
}

#[derive(Debug, Serialize)]
struct WireImageUrl {
    url: String,
}

impl From<&InputItem> for WireMessage {
    fn from(item: &InputItem) -> Self {
        // Plain strings keep the payload readable and work with servers that
        // reject the multi-part form.
        let content = if item.has_images() {
            WireContent::Parts(
                item.content
                    .iter()
                    .map(|part| match part {
                        ContentPart::Text(text) => WirePart::Text { text: text.clone() },
                        ContentPart::Image { url } => WirePart::ImageUrl {
                            image_url: WireImageUrl { url: url.clone() },
                        },
                    })
                    .collect(),
            )
        } else {
            WireContent::Text(item.plain_text())
        };
        Self {
            role: item.role,
            content,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    #[serde(default)]
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TranscriptionResponse {
    text: String,
}

// ── Tests ──────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::{ResponseSchema, Sampling};
    use crate::types::Line;

    fn request(input: Vec<InputItem>) -> CompletionRequest {
        CompletionRequest {
            model: "gpt-test".into(),
            instructions: Some("be terse".into()),
            input,
            sampling: Sampling::default(),
            response_schema: None,
        }
    }

    #[test]
    fn text_only_messages_serialize_as_strings() {
        let req = request(vec![InputItem::user("hi")]);
        let body = serde_json::to_value(ChatRequest::from_request(&req, true)).expect("json");
        assert_eq!(body["messages"][0]["role"], "system");
        assert_eq!(body["messages"][0]["content"], "be terse");
        assert_eq!(body["messages"][1]["content"], "hi");
        assert_eq!(body["stream"], true);
        assert!(body.get("stop").is_none());
        assert!(body.get("max_tokens").is_none());
    }

    #[test]
    fn image_messages_serialize_as_parts() {
        let req = request(vec![InputItem::user_image(
            Some("critique"),
            "data:image/png;base64,AAAA",
        )]);
        let body = serde_json::to_value(ChatRequest::from_request(&req, false)).expect("json");
        let parts = &body["messages"][1]["content"];
        assert_eq!(parts[0]["type"], "text");
        assert_eq!(parts[1]["type"], "image_url");
        assert_eq!(parts[1]["image_url"]["url"], "data:image/png;base64,AAAA");
    }

    #[test]
    fn structured_requests_carry_json_schema() {
        let mut req = request(vec![InputItem::user("draw")]);
        req.response_schema = Some(ResponseSchema::of::<Line>("line").expect("schema"));
        let body = serde_json::to_value(ChatRequest::from_request(&req, false)).expect("json");
        assert_eq!(body["response_format"]["type"], "json_schema");
        assert_eq!(body["response_format"]["json_schema"]["name"], "line");
    }

    #[test]
    fn extract_delta_handles_content_role_and_errors() {
        let content = r#"{"choices":[{"delta":{"content":"Hel"}}]}"#;
        assert_eq!(extract_delta(content).expect("ok").as_deref(), Some("Hel"));

        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(extract_delta(role_only).expect("ok"), None);

        let error = r#"{"error":{"message":"rate limited"}}"#;
        assert!(matches!(extract_delta(error), Err(AgentError::Stream(_))));

        assert!(matches!(extract_delta("not json"), Err(AgentError::Decode(_))));
    }

    #[test]
    fn endpoint_joins_without_double_slash() {
        let provider = OpenAiProvider::new(OpenAiConfig {
            base_url: "https://api.example.com/v1/".into(),
            api_key: None,
            organization: None,
            timeout_secs: 5,
        })
        .expect("client");
        assert_eq!(
            provider.endpoint("chat/completions"),
            "https://api.example.com/v1/chat/completions"
        );
    }
}
