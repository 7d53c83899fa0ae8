use chrono::{DateTime, Utc};

/// A row in the `rag_documents` full-text table.
#[derive(Debug, Clone, PartialEq)]
pub struct RagDocument {
    pub id: String,
    pub content: String,
    pub updated_at: DateTime<Utc>,
}
