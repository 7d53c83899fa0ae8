//! Responder interaction log, as stored in `db_logs`.

use std::sync::Arc;

use axum::extract::{Query, State};
use axum::routing::get;
use axum::{Json, Router};
use utoipa::OpenApi;

use crate::entities::LogStore;
use crate::error::ServerError;
use crate::middleware::AdminUser;
use crate::schemas::log::{LogQuery, LogResponse};
use crate::schemas::DetailResponse;
use crate::state::AppState;

const DEFAULT_LIMIT: i64 = 50;
const MAX_LIMIT: i64 = 500;

#[derive(OpenApi)]
#[openapi(paths(list_logs), components(schemas(LogResponse, DetailResponse)))]
pub struct LogApi;

pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/logs", get(list_logs))
}

/// Latest responder interactions, newest first.
#[utoipa::path(
    get,
    path = "/admin/logs",
    tag = "admin",
    params(LogQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Logged interactions", body = Vec<LogResponse>),
        (status = 401, description = "Not an admin", body = DetailResponse),
    )
)]
pub async fn list_logs(
    State(state): State<Arc<AppState>>,
    AdminUser(_admin): AdminUser,
    Query(query): Query<LogQuery>,
) -> Result<Json<Vec<LogResponse>>, ServerError> {
    let limit = query.limit.unwrap_or(DEFAULT_LIMIT).clamp(1, MAX_LIMIT);
    let logs = state.store.list_logs(limit).await?;
    Ok(Json(logs.into_iter().map(Into::into).collect()))
}
