//! Locally hosted quantized model behind an OpenAI-compatible `/completions`
//! endpoint (llama.cpp server, LM Studio, Ollama's compatibility layer, …).
//!
//! Chat turns are rendered into a single ChatML prompt, so the model must be
//! ChatML-tuned. Images are not supported.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder};
use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{
    check_status, event_token_stream, stream_error, CompletionRequest, ModelProvider, Sampling,
    TokenStream,
};
use crate::error::AgentError;
use crate::types::{InputItem, Role};

const IM_START: &str = "<|im_start|>";
const IM_END: &str = "<|im_end|>";

#[derive(Debug, Clone)]
pub struct LocalConfig {
    /// Base URL including the version segment, e.g. `http://127.0.0.1:8080/v1`.
    pub base_url: String,
    /// Model name sent in the payload; most single-model servers ignore it.
    pub model: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone)]
pub struct LocalProvider {
    client: Client,
    config: LocalConfig,
}

impl LocalProvider {
    pub fn new(config: LocalConfig) -> Result<Self, AgentError> {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(5))
            .read_timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|source| AgentError::Client { source })?;
        Ok(Self { client, config })
    }

    /// Sampling used when the request leaves a knob unset.
    pub fn default_sampling() -> Sampling {
        Sampling {
            max_tokens: Some(512),
            temperature: Some(0.7),
            top_p: Some(0.9),
            repeat_penalty: Some(1.1),
            stop: vec![IM_END.to_owned()],
        }
    }

    fn completion_request(
        &self,
        request: &CompletionRequest,
        stream: bool,
    ) -> Result<(String, RequestBuilder), AgentError> {
        if request.input.iter().any(InputItem::has_images) {
            return Err(AgentError::Unsupported {
                provider: "local",
                feature: "image input",
            });
        }

        let prompt = render_chatml(request.instructions.as_deref(), &request.input);
        let sampling = merge_sampling(&request.sampling, Self::default_sampling());
        let body = CompletionBody {
            model: &self.config.model,
            prompt: &prompt,
            stream,
            echo: false,
            max_tokens: sampling.max_tokens,
            temperature: sampling.temperature,
            top_p: sampling.top_p,
            repeat_penalty: sampling.repeat_penalty,
            stop: &sampling.stop,
        };

        let endpoint = format!("{}/completions", self.config.base_url.trim_end_matches('/'));
        debug!(prompt_len = prompt.len(), stream, "sending local completion request");
        let http = self.client.post(&endpoint).json(&body);
        Ok((endpoint, http))
    }
}

#[async_trait]
impl ModelProvider for LocalProvider {
    fn name(&self) -> &'static str {
        "local"
    }

    async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError> {
        let (endpoint, http) = self.completion_request(&request, true)?;
        event_token_stream(endpoint, http, extract_text).await
    }

    async fn complete(&self, request: CompletionRequest) -> Result<String, AgentError> {
        let (endpoint, http) = self.completion_request(&request, false)?;
        let response = http
            .send()
            .await
            .map_err(|source| AgentError::Request { endpoint, source })?;
        let parsed: CompletionResponse = check_status(response)
            .await?
            .json()
            .await
            .map_err(|e| AgentError::Decode(e.to_string()))?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.text.trim().to_owned())
            .filter(|t| !t.is_empty())
            .ok_or(AgentError::EmptyResponse)
    }
}

/// Render instructions and turns as a ChatML prompt ending with an open
/// assistant turn.
pub fn render_chatml(instructions: Option<&str>, input: &[InputItem]) -> String {
    let mut prompt = String::new();
    if let Some(instructions) = instructions {
        push_turn(&mut prompt, Role::System, instructions);
    }
    for item in input {
        push_turn(&mut prompt, item.role, &item.plain_text());
    }
    prompt.push_str(IM_START);
    prompt.push_str("assistant\n");
    prompt
}

fn push_turn(prompt: &mut String, role: Role, content: &str) {
    prompt.push_str(IM_START);
    prompt.push_str(role.as_ref());
    prompt.push('\n');
    prompt.push_str(content);
    prompt.push_str(IM_END);
    prompt.push('\n');
}

fn merge_sampling(requested: &Sampling, defaults: Sampling) -> Sampling {
    Sampling {
        max_tokens: requested.max_tokens.or(defaults.max_tokens),
        temperature: requested.temperature.or(defaults.temperature),
        top_p: requested.top_p.or(defaults.top_p),
        repeat_penalty: requested.repeat_penalty.or(defaults.repeat_penalty),
        stop: if requested.stop.is_empty() {
            defaults.stop
        } else {
            requested.stop.clone()
        },
    }
}

fn extract_text(payload: &str) -> Result<Option<String>, AgentError> {
    let value: serde_json::Value =
        serde_json::from_str(payload).map_err(|e| AgentError::Decode(e.to_string()))?;
    if let Some(err) = stream_error(&value) {
        return Err(err);
    }
    Ok(value
        .pointer("/choices/0/text")
        .and_then(|t| t.as_str())
        .map(str::to_owned))
}

#[derive(Debug, Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
    echo: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    top_p: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    repeat_penalty: Option<f32>,
    stop: &'a [String],
}

#[derive(Debug, Deserialize)]
struct CompletionResponse {
    #[serde(default)]
    choices: Vec<CompletionChoice>,
}

#[derive(Debug, Deserialize)]
struct CompletionChoice {
    #[serde(default)]
    text: String,
}
