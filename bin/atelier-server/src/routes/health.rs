//! Health / heartbeat endpoint.

use axum::routing::get;
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::{OpenApi, ToSchema};

use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(get_health), components(schemas(HealthResponse)))]
pub struct HealthApi;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct HealthResponse {
    #[schema(example = "ok")]
    pub status: String,
    pub version: String,
}

/// Register health-check routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new().route("/health", get(get_health))
}

/// Heartbeat endpoint.
///
/// Returns `{"status": "ok", "version": "..."}` with HTTP 200.
#[utoipa::path(
    get,
    path = "/health",
    tag = "health",
    responses(
        (status = 200, description = "Server is healthy", body = HealthResponse)
    )
)]
pub async fn get_health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_owned(),
        version: env!("CARGO_PKG_VERSION").to_owned(),
    })
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::routes::test::{body_json, call};
    use crate::state::test::test_state;
    use axum::body::Body;
    use axum::http::Request;

    #[tokio::test]
    async fn health_response_has_ok_status_and_version() {
        let Json(body) = get_health().await;
        assert_eq!(body.status, "ok");
        assert!(!body.version.is_empty());
    }

    #[tokio::test]
    async fn health_route_needs_no_auth() {
        let state = test_state("").await;
        let response = call(state, Request::get("/health").body(Body::empty()).expect("request")).await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response).await["status"], "ok");
    }
}
