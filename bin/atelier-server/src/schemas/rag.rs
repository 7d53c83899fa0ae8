use atelier_agent::RagHit;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RagDocumentInput {
    pub id: String,
    pub content: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RagUpsertRequest {
    pub documents: Vec<RagDocumentInput>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RagCountResponse {
    /// Documents affected by the call.
    pub affected: usize,
    /// Documents in the index afterwards.
    pub total: usize,
}

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct RagQueryParams {
    pub q: String,
    /// Maximum number of hits (default 2).
    pub k: Option<usize>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct RagHitResponse {
    pub id: String,
    pub content: String,
    pub score: f32,
}

impl From<RagHit> for RagHitResponse {
    fn from(hit: RagHit) -> Self {
        Self {
            id: hit.id,
            content: hit.content,
            score: hit.score,
        }
    }
}
