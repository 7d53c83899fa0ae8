//! Retrieval documents: startup seeding and the responder's [`Retriever`].

use std::path::Path;
use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use atelier_agent::{AgentError, RagHit, Retriever};
use serde::Deserialize;
use tracing::info;

use crate::entities::{RagStore, SqliteStore};

/// One entry of the `ATELIER_RAG_SEED` file.
#[derive(Debug, Clone, Deserialize)]
pub struct SeedDocument {
    pub id: String,
    pub content: String,
}

/// Upsert every document of the seed file, if one is given.
pub async fn seed_documents(store: &SqliteStore, seed: Option<&Path>) -> anyhow::Result<()> {
    if let Some(path) = seed {
        let raw = tokio::fs::read(path)
            .await
            .with_context(|| format!("reading RAG seed file {}", path.display()))?;
        let docs: Vec<SeedDocument> = serde_json::from_slice(&raw)
            .with_context(|| format!("parsing RAG seed file {}", path.display()))?;
        for doc in &docs {
            store.upsert_document(&doc.id, &doc.content).await?;
        }
        info!(path = %path.display(), seeded = docs.len(), "RAG seed applied");
    }
    info!(total = store.count_documents().await?, "RAG documents ready");
    Ok(())
}

/// Full-text search over the stored documents.
#[derive(Debug, Clone)]
pub struct KnowledgeBase {
    store: Arc<SqliteStore>,
}

impl KnowledgeBase {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl Retriever for KnowledgeBase {
    async fn retrieve(&self, query: &str, k: usize) -> Result<Vec<RagHit>, AgentError> {
        self.store
            .search_documents(query, k)
            .await
            .map_err(|e| AgentError::Retrieval(e.to_string()))
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn seed_is_persisted_and_merged_with_stored_documents() {
        let store = SqliteStore::in_memory().await.expect("store");
        store
            .upsert_document("old", "Fresco is painted on wet plaster")
            .await
            .expect("stored");

        let seed = std::env::temp_dir().join(format!("atelier-seed-{}.json", uuid::Uuid::new_v4()));
        std::fs::write(
            &seed,
            r#"[{"id":"tempera","content":"Egg tempera dries quickly"},{"id":"old","content":"Fresco uses lime plaster"}]"#,
        )
        .expect("write seed");

        seed_documents(&store, Some(&seed)).await.expect("seed");
        assert_eq!(store.count_documents().await.expect("count"), 2);

        let kb = KnowledgeBase::new(Arc::new(store));
        let hits = kb.retrieve("lime plaster fresco", 1).await.expect("retrieve");
        assert_eq!(hits.len(), 1);
        assert!(hits[0].content.contains("lime plaster"));

        let _ = std::fs::remove_file(&seed);
    }

    #[tokio::test]
    async fn missing_seed_file_is_an_error() {
        let store = SqliteStore::in_memory().await.expect("store");
        let missing = std::path::PathBuf::from("/nonexistent/atelier-seed.json");
        assert!(seed_documents(&store, Some(&missing)).await.is_err());
    }
}
