//! In-memory studio sessions.

use std::sync::Arc;

use axum::extract::State;
use axum::routing::get;
use axum::{Json, Router};
use tracing::debug;
use utoipa::OpenApi;

use crate::middleware::CurrentUser;
use crate::schemas::visit::VisitResponse;
use crate::state::AppState;

#[derive(OpenApi)]
#[openapi(paths(retrieve_session, reset_session), components(schemas(VisitResponse)))]
pub struct SessionApi;

/// Register session routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/session/retrieve", get(retrieve_session))
        .route("/session/reset", get(reset_session))
}

#[utoipa::path(
    get,
    path = "/session/retrieve",
    tag = "session",
    security(("bearer" = [])),
    responses((status = 200, description = "Current session, created on first use", body = VisitResponse))
)]
pub async fn retrieve_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<VisitResponse> {
    if !state.sessions.has(&user.id) {
        debug!(user_id = %user.id, "starting studio session");
    }
    Json(state.sessions.get_or_create(&user).to_response())
}

#[utoipa::path(
    get,
    path = "/session/reset",
    tag = "session",
    security(("bearer" = [])),
    responses((status = 200, description = "Fresh session", body = VisitResponse))
)]
pub async fn reset_session(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Json<VisitResponse> {
    Json(state.sessions.reset(&user).to_response())
}

#[cfg(test)]
mod test {
    use axum::body::Body;

    use crate::entities::UserRole;
    use crate::routes::test::{authed, body_json, call};
    use crate::state::test::{seed_user, test_state};

    #[tokio::test]
    async fn retrieve_is_stable_until_reset() {
        let state = test_state("").await;
        let (_, token) = seed_user(&state, "sess@example.com", UserRole::User).await;
        let get = |uri: &str| authed("GET", uri, &token).body(Body::empty()).expect("request");

        let first = body_json(call(state.clone(), get("/session/retrieve")).await).await;
        let again = body_json(call(state.clone(), get("/session/retrieve")).await).await;
        assert_eq!(first["visit_id"], again["visit_id"]);

        let reset = body_json(call(state.clone(), get("/session/reset")).await).await;
        assert_ne!(reset["visit_id"], first["visit_id"]);
        let after = body_json(call(state, get("/session/retrieve")).await).await;
        assert_eq!(after["visit_id"], reset["visit_id"]);
    }
}
