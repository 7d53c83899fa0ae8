//! Durable studio visits.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::error;
use utoipa::OpenApi;

use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::visit::VisitResponse;
use crate::schemas::DetailResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(retrieve_visit, reset_visit), components(schemas(VisitResponse, DetailResponse)))]
pub struct VisitApi;

/// Register visit routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/visit/retrieve", get(retrieve_visit))
        .route("/visit/reset", get(reset_visit))
}

/// The caller's open visit, started if there is none.
#[utoipa::path(
    get,
    path = "/visit/retrieve",
    tag = "visit",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Open visit", body = VisitResponse),
        (status = 401, description = "Not authenticated", body = DetailResponse),
    )
)]
pub async fn retrieve_visit(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<VisitResponse>, ServerError> {
    let visit = state.visits.get_or_start(&user).await?;
    Ok(Json(visit.to_response()))
}

/// Finish the open visit and start a new one.
#[utoipa::path(
    get,
    path = "/visit/reset",
    tag = "visit",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New visit", body = VisitResponse),
        (status = 500, description = "Failed to reset visit", body = DetailResponse),
    )
)]
pub async fn reset_visit(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<VisitResponse>, ServerError> {
    let visit = state.visits.reset(&user).await.map_err(|e| {
        error!(user_id = %user.id, error = %e, "visit reset failed");
        ServerError::exposed(format!("Failed to reset visit: {e}"))
    })?;
    Ok(Json(visit.to_response()))
}
