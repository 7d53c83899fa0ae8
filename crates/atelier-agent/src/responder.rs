//! Persona responder with retrieval-augmented context.
//!
//! Each prompt is sent as: persona instructions, a system turn carrying
//! `(Background info: ...)` from the [`Retriever`], then the user's prompt.

use std::sync::Arc;

use tracing::debug;

use crate::agent::Agent;
use crate::error::AgentError;
use crate::provider::{Sampling, TokenStream};
use crate::rag::{self, Retriever};
use crate::runner::Runner;
use crate::types::InputItem;

pub const DEFAULT_PERSONA: &str = "You are the resident guide of an artist's studio. \
You know the history of the techniques, materials and movements behind the works on display, \
and you answer visitors with warmth, conviction and concrete detail.";

#[derive(Debug, Clone)]
pub struct Responder {
    runner: Runner,
    agent: Agent,
    retriever: Arc<dyn Retriever>,
    top_k: usize,
}

impl Responder {
    pub fn new(
        runner: Runner,
        model: &str,
        persona: &str,
        retriever: Arc<dyn Retriever>,
        top_k: usize,
    ) -> Self {
        let agent = Agent::new("Studio Responder", model, persona).with_sampling(Sampling {
            max_tokens: Some(512),
            temperature: Some(0.7),
            top_p: Some(0.9),
            ..Sampling::default()
        });
        Self {
            runner,
            agent,
            retriever,
            top_k,
        }
    }

    /// Turns sent to the model for `prompt`.
    pub async fn input_for(&self, prompt: &str) -> Result<Vec<InputItem>, AgentError> {
        let hits = self.retriever.retrieve(prompt, self.top_k).await?;
        let context = rag::context(&hits);
        debug!(hits = hits.len(), context_len = context.len(), "retrieved responder context");
        Ok(vec![
            InputItem::system(format!("(Background info: {context})")),
            InputItem::user(prompt),
        ])
    }

    pub async fn respond(&self, prompt: &str) -> Result<String, AgentError> {
        let input = self.input_for(prompt).await?;
        let text = self.runner.run(&self.agent, input).await?;
        Ok(text.trim().to_owned())
    }

    pub async fn respond_streamed(&self, prompt: &str) -> Result<TokenStream, AgentError> {
        let input = self.input_for(prompt).await?;
        self.runner.run_streamed(&self.agent, input).await
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::provider::{CompletionRequest, ModelProvider};
    use crate::rag::{NoRetrieval, RagHit};
    use crate::types::Role;
    use async_trait::async_trait;

    /// Always returns the same passage, or fails.
    #[derive(Debug)]
    struct FixedPassage(Option<&'static str>);

    #[async_trait]
    impl Retriever for FixedPassage {
        async fn retrieve(&self, _query: &str, k: usize) -> Result<Vec<RagHit>, AgentError> {
            let content = self.0.ok_or_else(|| AgentError::Retrieval("index offline".into()))?;
            Ok(vec![RagHit {
                id: "kiln".into(),
                content: content.into(),
                score: 1.0,
            }]
            .into_iter()
            .take(k)
            .collect())
        }
    }

    #[derive(Debug)]
    struct EchoInstructions;

    #[async_trait]
    impl ModelProvider for EchoInstructions {
        fn name(&self) -> &'static str {
            "echo"
        }

        async fn stream(&self, _request: CompletionRequest) -> Result<TokenStream, AgentError> {
            Err(AgentError::EmptyResponse)
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, AgentError> {
            Ok(format!("  {}  ", request.instructions.unwrap_or_default()))
        }
    }

    #[tokio::test]
    async fn input_carries_background_then_prompt() {
        let responder = Responder::new(
            Runner::new(Arc::new(EchoInstructions)),
            "m",
            DEFAULT_PERSONA,
            Arc::new(FixedPassage(Some("The anagama kiln is fired with wood for several days"))),
            2,
        );

        let input = responder.input_for("how long is the kiln fired").await.expect("input");
        assert_eq!(input.len(), 2);
        assert_eq!(input[0].role, Role::System);
        assert!(input[0].plain_text().starts_with("(Background info: The anagama kiln"));
        assert_eq!(input[1].plain_text(), "how long is the kiln fired");
    }

    #[tokio::test]
    async fn respond_trims_and_uses_persona() {
        let responder = Responder::new(
            Runner::new(Arc::new(EchoInstructions)),
            "m",
            "persona text",
            Arc::new(NoRetrieval),
            2,
        );
        assert_eq!(responder.respond("hi").await.expect("reply"), "persona text");
    }

    #[tokio::test]
    async fn retrieval_failure_is_propagated() {
        let responder = Responder::new(
            Runner::new(Arc::new(EchoInstructions)),
            "m",
            "persona text",
            Arc::new(FixedPassage(None)),
            2,
        );
        assert!(matches!(
            responder.respond("hi").await,
            Err(AgentError::Retrieval(_))
        ));
    }
}
