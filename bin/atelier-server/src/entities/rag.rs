//! Retrieval documents in an FTS5 table, ranked with `bm25()`.

use std::future::Future;

use atelier_agent::RagHit;
use chrono::Utc;

use crate::entities::{dao::RagDocument, decode_ts, encode_ts, SqliteStore};

pub trait RagStore: Send + Sync + 'static {
    /// Insert `content` under `id`, replacing any previous document with that id.
    fn upsert_document(&self, id: &str, content: &str) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Returns `false` when no document had that id.
    fn remove_document(&self, id: &str) -> impl Future<Output = Result<bool, sqlx::Error>> + Send;
    fn list_documents(&self) -> impl Future<Output = Result<Vec<RagDocument>, sqlx::Error>> + Send;
    fn count_documents(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
    /// Returns the number of rows removed.
    fn clear_documents(&self) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
    /// Up to `k` documents matching any word of `query`, best first.
    fn search_documents(
        &self,
        query: &str,
        k: usize,
    ) -> impl Future<Output = Result<Vec<RagHit>, sqlx::Error>> + Send;
}

/// Turn free text into an FTS5 query that matches any of its words.
///
/// Every token is quoted, so FTS5 operators and column filters in user input
/// are taken literally. `None` when the text has no word characters.
pub(crate) fn match_any(text: &str) -> Option<String> {
    let terms: Vec<String> = text
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| !t.is_empty())
        .map(|t| format!("\"{t}\""))
        .collect();
    (!terms.is_empty()).then(|| terms.join(" OR "))
}

impl RagStore for SqliteStore {
    async fn upsert_document(&self, id: &str, content: &str) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM rag_documents WHERE id = ?1")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("INSERT INTO rag_documents (id, content, updated_at) VALUES (?1, ?2, ?3)")
            .bind(id)
            .bind(content)
            .bind(encode_ts(Utc::now()))
            .execute(&mut *tx)
            .await?;
        tx.commit().await
    }

    async fn remove_document(&self, id: &str) -> Result<bool, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rag_documents WHERE id = ?1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_documents(&self) -> Result<Vec<RagDocument>, sqlx::Error> {
        let rows: Vec<(String, String, String)> =
            sqlx::query_as("SELECT id, content, updated_at FROM rag_documents ORDER BY rowid")
                .fetch_all(&self.pool)
                .await?;
        Ok(rows
            .into_iter()
            .map(|(id, content, updated_at)| RagDocument {
                id,
                content,
                updated_at: decode_ts(&updated_at, "rag_documents.updated_at"),
            })
            .collect())
    }

    async fn count_documents(&self) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM rag_documents")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }

    async fn clear_documents(&self) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM rag_documents")
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }

    async fn search_documents(&self, query: &str, k: usize) -> Result<Vec<RagHit>, sqlx::Error> {
        let Some(expr) = match_any(query) else {
            return Ok(Vec::new());
        };
        let rows: Vec<(String, String, f64)> = sqlx::query_as(
            "SELECT id, content, bm25(rag_documents) AS rank FROM rag_documents \
             WHERE rag_documents MATCH ?1 ORDER BY rank LIMIT ?2",
        )
        .bind(expr)
        .bind(i64::try_from(k).unwrap_or(i64::MAX))
        .fetch_all(&self.pool)
        .await?;
        // bm25() is lower-is-better; flip it so callers see higher-is-better.
        Ok(rows
            .into_iter()
            .map(|(id, content, rank)| RagHit {
                id,
                content,
                score: -rank as f32,
            })
            .collect())
    }
}
