//! Conversation history and stored upload images.

use std::io::ErrorKind;
use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::http::header::CONTENT_TYPE;
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use tracing::info;
use utoipa::OpenApi;

use crate::entities::MessageStore;
use crate::error::ServerError;
use crate::middleware::CurrentUser;
use crate::schemas::history::{HistoryQuery, MessageResponse};
use crate::schemas::DetailResponse;
use crate::state::AppState;
use crate::studio::upload;

#[derive(OpenApi)]
#[openapi(
    paths(get_history, get_image, reset_history),
    components(schemas(MessageResponse, DetailResponse))
)]
pub struct HistoryApi;

/// Register history routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/history/", get(get_history))
        .route("/history", get(get_history))
        .route("/history/image/{*filename}", get(get_image))
        .route("/history/reset", delete(reset_history))
}

/// The caller's latest messages, oldest first (`GET /history/`).
#[utoipa::path(
    get,
    path = "/history/",
    tag = "history",
    params(HistoryQuery),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Messages in chronological order", body = Vec<MessageResponse>),
        (status = 401, description = "Not authenticated", body = DetailResponse),
    )
)]
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Query(query): Query<HistoryQuery>,
) -> Result<Json<Vec<MessageResponse>>, ServerError> {
    let messages = state
        .store
        .list_messages(&user.id, query.session_id.as_deref(), state.config.history_limit)
        .await?;
    Ok(Json(messages.iter().map(|m| m.to_response()).collect()))
}

/// A stored upload (`GET /history/image/{filename}`), served as PNG.
#[utoipa::path(
    get,
    path = "/history/image/{filename}",
    tag = "history",
    params(("filename" = String, Path, description = "Path relative to the uploads root")),
    responses(
        (status = 200, description = "PNG image"),
        (status = 400, description = "Invalid filename", body = DetailResponse),
        (status = 404, description = "Image not found", body = DetailResponse),
    )
)]
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(filename): Path<String>,
) -> Result<impl IntoResponse, ServerError> {
    let path = upload::resolve(&state.config.uploads_dir, &filename)
        .map_err(|_| ServerError::BadRequest("Invalid filename".into()))?;
    let bytes = tokio::fs::read(&path).await.map_err(|e| match e.kind() {
        ErrorKind::NotFound | ErrorKind::IsADirectory => ServerError::NotFound("Image not found".into()),
        _ => ServerError::from(e),
    })?;
    Ok(([(CONTENT_TYPE, "image/png")], bytes))
}

/// Delete the caller's uploads and messages (`DELETE /history/reset`).
#[utoipa::path(
    delete,
    path = "/history/reset",
    tag = "history",
    security(("bearer" = [])),
    responses(
        (status = 200, description = "History deleted", body = DetailResponse),
        (status = 500, description = "Deletion failed", body = DetailResponse),
    )
)]
pub async fn reset_history(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
) -> Result<Json<DetailResponse>, ServerError> {
    upload::remove_user_uploads(&state.config.uploads_dir, &user.id)
        .await
        .map_err(|e| ServerError::exposed(format!("Error deleting data: {e}")))?;
    let removed = state
        .store
        .delete_user_messages(&user.id)
        .await
        .map_err(|e| ServerError::exposed(format!("Error deleting data: {e}")))?;
    let had_session = state.sessions.delete(&user.id);
    info!(user_id = %user.id, removed, had_session, "chat history deleted");
    Ok(Json(DetailResponse::new("Successfully deleted chat history")))
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Body;
    use axum::http::Request;
    use chrono::{Duration, Utc};
    use http_body_util::BodyExt;
    use uuid::Uuid;

    use crate::entities::{MessageRecord, UserRole};
    use crate::routes::test::{authed, body_json, call};
    use crate::state::test::{seed_user, test_state};
    use crate::studio::upload::{save_png, tiny_png};

    fn record(user_id: &str, session: &str, content: &str, age_secs: i64) -> MessageRecord {
        MessageRecord {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_owned(),
            session_id: Some(session.to_owned()),
            role: "user".into(),
            content: content.into(),
            image_filename: None,
            timestamp: Utc::now() - Duration::seconds(age_secs),
        }
    }

    #[tokio::test]
    async fn history_is_chronological_and_filterable() {
        let state = test_state("").await;
        let (user, token) = seed_user(&state, "hist@example.com", UserRole::User).await;
        state
            .store
            .append_messages(vec![
                record(&user.id, "v2", "newest", 1),
                record(&user.id, "v1", "oldest", 30),
                record(&user.id, "v1", "middle", 20),
            ])
            .await
            .expect("seed");

        let response = call(
            state.clone(),
            authed("GET", "/history/", &token).body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), 200);
        let body = body_json(response).await;
        let contents: Vec<_> = body.as_array().expect("array").iter().map(|m| m["content"].clone()).collect();
        assert_eq!(contents, ["oldest", "middle", "newest"]);

        let response = call(
            state,
            authed("GET", "/history?session_id=v1", &token).body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(body_json(response).await.as_array().expect("array").len(), 2);
    }

    #[tokio::test]
    async fn history_requires_token() {
        let state = test_state("").await;
        let response = call(state, Request::get("/history/").body(Body::empty()).expect("request")).await;
        assert_eq!(response.status(), 401);
        assert_eq!(response.headers()["www-authenticate"], "Bearer");
    }

    #[tokio::test]
    async fn image_route_serves_png_and_rejects_traversal() {
        let state = test_state("").await;
        let name = save_png(&state.config.uploads_dir, "someone", &tiny_png())
            .await
            .expect("save");

        let response = call(
            state.clone(),
            Request::get(format!("/history/image/{name}")).body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert_eq!(response.headers()[CONTENT_TYPE], "image/png");
        let bytes = response.into_body().collect().await.expect("body").to_bytes();
        assert_eq!(bytes.as_ref(), tiny_png().as_slice());

        let response = call(
            state.clone(),
            Request::get("/history/image/someone/..%2F..%2Fsecret").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), 400);
        assert_eq!(body_json(response).await["detail"], "Invalid filename");

        let response = call(
            state,
            Request::get("/history/image/someone/missing.png").body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), 404);
        assert_eq!(body_json(response).await["detail"], "Image not found");
    }

    #[tokio::test]
    async fn reset_deletes_messages_and_uploads() {
        let state = test_state("").await;
        let (user, token) = seed_user(&state, "wipe@example.com", UserRole::User).await;
        state
            .store
            .append_messages(vec![record(&user.id, "v", "bye", 1)])
            .await
            .expect("seed");
        save_png(&state.config.uploads_dir, &user.id, &tiny_png()).await.expect("save");

        let response = call(
            state.clone(),
            authed("DELETE", "/history/reset", &token).body(Body::empty()).expect("request"),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response).await["detail"], "Successfully deleted chat history");
        assert!(state.store.recent_messages(&user.id, 10).await.expect("history").is_empty());
        assert!(!state.config.uploads_dir.join(&user.id).exists());
    }
}
