//! Drives an [`Agent`] against a [`ModelProvider`].

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use tracing::{debug, info};

use crate::agent::Agent;
use crate::error::AgentError;
use crate::provider::{ModelProvider, ResponseSchema, TokenStream};
use crate::types::InputItem;

#[derive(Debug, Clone)]
pub struct Runner {
    provider: Arc<dyn ModelProvider>,
}

impl Runner {
    pub fn new(provider: Arc<dyn ModelProvider>) -> Self {
        Self { provider }
    }

    pub fn provider(&self) -> &Arc<dyn ModelProvider> {
        &self.provider
    }

    /// Stream the agent's reply as text deltas.
    pub async fn run_streamed(
        &self,
        agent: &Agent,
        input: Vec<InputItem>,
    ) -> Result<TokenStream, AgentError> {
        debug!(agent = %agent.name, provider = self.provider.name(), turns = input.len(), "streamed run");
        self.provider.stream(agent.request(input, None)).await
    }

    /// Run to completion and return the reply text.
    pub async fn run(&self, agent: &Agent, input: Vec<InputItem>) -> Result<String, AgentError> {
        debug!(agent = %agent.name, provider = self.provider.name(), turns = input.len(), "buffered run");
        self.provider.complete(agent.request(input, None)).await
    }

    /// Run with a JSON-schema constrained reply and decode it into `T`.
    ///
    /// `T` must serialize as a JSON object; wrap lists in a struct.
    pub async fn run_structured<T>(
        &self,
        agent: &Agent,
        input: Vec<InputItem>,
    ) -> Result<T, AgentError>
    where
        T: DeserializeOwned + JsonSchema,
    {
        let schema = ResponseSchema::of::<T>(schema_name(&agent.name))?;
        let raw = self
            .provider
            .complete(agent.request(input, Some(schema)))
            .await?;
        let parsed = serde_json::from_str(strip_code_fence(&raw))
            .map_err(|source| AgentError::Schema { source })?;
        info!(agent = %agent.name, output_len = raw.len(), "structured run done");
        Ok(parsed)
    }
}

/// Schema names must match `^[a-zA-Z0-9_-]+$`.
fn schema_name(agent_name: &str) -> String {
    agent_name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == '-' { c } else { '_' })
        .collect()
}

/// Some models wrap JSON in a markdown fence even in structured mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
