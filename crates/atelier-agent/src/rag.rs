//! Retrieval seam for the responder.
//!
//! Ranking lives with the document store; anything that can score stored
//! passages against a query implements [`Retriever`].

use async_trait::async_trait;
use serde::Serialize;

use crate::error::AgentError;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RagHit {
    pub id: String,
    pub content: String,
    /// Higher is more relevant.
    pub score: f32,
}

#[async_trait]
pub trait Retriever: Send + Sync + std::fmt::Debug {
    /// Up to `k` passages relevant to `query`, best first.
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RagHit>, AgentError>;
}

/// Hit contents joined by newlines; empty when nothing matched.
pub fn context(hits: &[RagHit]) -> String {
    hits.iter()
        .map(|h| h.content.as_str())
        .collect::<Vec<_>>()
        .join("\n")
}

/// A retriever with nothing indexed.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoRetrieval;

#[async_trait]
impl Retriever for NoRetrieval {
    async fn retrieve(&self, _query: &str, _k: usize) -> Result<Vec<RagHit>, AgentError> {
        Ok(Vec::new())
    }
}
