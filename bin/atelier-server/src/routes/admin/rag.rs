//! Retrieval document management.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::RagStore;
use crate::error::ServerError;
use crate::middleware::AdminUser;
use crate::schemas::rag::{RagCountResponse, RagDocumentInput, RagHitResponse, RagQueryParams, RagUpsertRequest};
use crate::schemas::DetailResponse;
use crate::state::AppState;

const MAX_K: usize = 50;

#[derive(OpenApi)]
#[openapi(
    paths(upsert_documents, clear_documents, remove_document, query_documents),
    components(schemas(RagDocumentInput, RagUpsertRequest, RagCountResponse, RagHitResponse, DetailResponse))
)]
pub struct RagApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/rag/documents", post(upsert_documents).delete(clear_documents))
        .route("/rag/documents/{id}", delete(remove_document))
        .route("/rag/query", get(query_documents))
}

/// Insert or replace documents by id.
#[utoipa::path(
    post,
    path = "/admin/rag/documents",
    tag = "admin",
    request_body = RagUpsertRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Documents stored", body = RagCountResponse),
        (status = 400, description = "Empty id or content", body = DetailResponse),
        (status = 401, description = "Not an admin", body = DetailResponse),
    )
)]
pub async fn upsert_documents(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Json(req): Json<RagUpsertRequest>,
) -> Result<Json<RagCountResponse>, ServerError> {
    if let Some(bad) = req
        .documents
        .iter()
        .find(|d| d.id.trim().is_empty() || d.content.trim().is_empty())
    {
        return Err(ServerError::BadRequest(format!(
            "Document '{}' needs a non-empty id and content",
            bad.id
        )));
    }

    let affected = req.documents.len();
    for input in &req.documents {
        state.store.upsert_document(&input.id, &input.content).await?;
    }
    let total = state.store.count_documents().await? as usize;
    info!(by = %admin.email, affected, total, "RAG documents upserted");
    Ok(Json(RagCountResponse { affected, total }))
}

/// Remove every document.
#[utoipa::path(
    delete,
    path = "/admin/rag/documents",
    tag = "admin",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Index cleared", body = RagCountResponse),
        (status = 401, description = "Not an admin", body = DetailResponse),
    )
)]
pub async fn clear_documents(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
) -> Result<Json<RagCountResponse>, ServerError> {
    let removed = state.store.clear_documents().await?;
    info!(by = %admin.email, removed, "RAG index cleared");
    Ok(Json(RagCountResponse {
        affected: removed as usize,
        total: 0,
    }))
}

/// Remove one document by id.
#[utoipa::path(
    delete,
    path = "/admin/rag/documents/{id}",
    tag = "admin",
    params(("id" = String, Path, description = "Document id")),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Document removed", body = RagCountResponse),
        (status = 401, description = "Not an admin", body = DetailResponse),
        (status = 404, description = "No document with that id", body = DetailResponse),
    )
)]
pub async fn remove_document(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Path(id): Path<String>,
) -> Result<Json<RagCountResponse>, ServerError> {
    if !state.store.remove_document(&id).await? {
        return Err(ServerError::NotFound(format!("No document with id '{id}'")));
    }
    let total = state.store.count_documents().await? as usize;
    info!(by = %admin.email, %id, total, "RAG document removed");
    Ok(Json(RagCountResponse { affected: 1, total }))
}

/// Best-matching documents for `q`.
#[utoipa::path(
    get,
    path = "/admin/rag/query",
    tag = "admin",
    params(RagQueryParams),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Hits, best first", body = Vec<RagHitResponse>),
        (status = 401, description = "Not an admin", body = DetailResponse),
    )
)]
pub async fn query_documents(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(params): Query<RagQueryParams>,
) -> Result<Json<Vec<RagHitResponse>>, ServerError> {
    let k = params.k.unwrap_or(state.config.rag_top_k).clamp(1, MAX_K);
    let hits = state.store.search_documents(&params.q, k).await?;
    Ok(Json(hits.into_iter().map(Into::into).collect()))
}
