//! Unified server error type.
//!
//! Every handler returns `Result<T, ServerError>`, which implements
//! [`axum::response::IntoResponse`] so errors are automatically converted
//! to a `{"detail": "..."}` JSON response with an appropriate status code.
//!
//! **Security note:** Internal errors (Database, Internal and backend model
//! failures) are logged with full detail but only a generic message is
//! returned to the caller so that file paths, SQL, or provider responses never
//! leak to clients. Handlers that must surface a cause wrap it themselves
//! (e.g. `"Error generating response: ..."`) and return `Internal` with
//! [`ServerError::exposed`].

use atelier_agent::AgentError;
use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use thiserror::Error;
use tracing::error;

/// All errors that can occur in the atelier-server request lifecycle.
#[derive(Debug, Error)]
pub enum ServerError {
    /// Missing, malformed or expired credentials.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The caller referenced a resource that does not exist.
    #[error("not found: {0}")]
    NotFound(String),

    /// The caller sent an invalid or malformed request.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// A backend this route depends on is not configured or reachable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Propagated from the SQLite store.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Propagated from the model layer.
    #[error("model error: {0}")]
    Model(#[from] AgentError),

    /// A 500 whose message is safe to show the caller.
    #[error("{0}")]
    Exposed(String),

    /// An unclassified internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl ServerError {
    /// A 500 carrying `message` verbatim in the response body.
    pub fn exposed(message: impl Into<String>) -> Self {
        ServerError::Exposed(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ServerError::NotFound(_) => StatusCode::NOT_FOUND,
            ServerError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ServerError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            ServerError::Model(e) if e.is_caller_error() => StatusCode::BAD_REQUEST,
            ServerError::Model(_) => StatusCode::BAD_GATEWAY,
            ServerError::Database(_) | ServerError::Exposed(_) | ServerError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        let client_message = match &self {
            // Client-facing errors: expose the message directly.
            ServerError::Unauthorized(m)
            | ServerError::NotFound(m)
            | ServerError::BadRequest(m)
            | ServerError::ServiceUnavailable(m) => m.clone(),

            ServerError::Model(e) if e.is_caller_error() => e.to_string(),
            ServerError::Model(e) => {
                error!(error = %e, source = ?std::error::Error::source(e), "model backend error");
                "model backend error".to_owned()
            }
            ServerError::Database(e) => {
                error!(error = %e, "database error");
                "internal server error".to_owned()
            }
            ServerError::Exposed(m) => {
                error!(message = %m, "request failed");
                m.clone()
            }
            ServerError::Internal(m) => {
                error!(message = %m, "internal server error");
                "internal server error".to_owned()
            }
        };

        let mut response = (status, Json(json!({ "detail": client_message }))).into_response();
        if status == StatusCode::UNAUTHORIZED {
            response
                .headers_mut()
                .insert(header::WWW_AUTHENTICATE, HeaderValue::from_static("Bearer"));
        }
        response
    }
}

impl From<anyhow::Error> for ServerError {
    fn from(e: anyhow::Error) -> Self {
        // Log the full chain before discarding it; clients only see a generic
        // message.
        error!(error = ?e, "converting anyhow error to ServerError::Internal");
        ServerError::Internal(e.to_string())
    }
}

impl From<std::io::Error> for ServerError {
    fn from(e: std::io::Error) -> Self {
        ServerError::Internal(format!("io error: {e}"))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: ServerError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response
            .into_body()
            .collect()
            .await
            .expect("body")
            .to_bytes();
        (status, serde_json::from_slice(&bytes).expect("json"))
    }

    #[tokio::test]
    async fn client_errors_expose_their_message() {
        let (status, body) = body_of(ServerError::BadRequest("Invalid filename".into())).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "Invalid filename");
    }

    #[tokio::test]
    async fn database_errors_are_masked() {
        let (status, body) = body_of(ServerError::Database(sqlx::Error::RowNotFound)).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["detail"], "internal server error");
    }

    #[tokio::test]
    async fn model_errors_map_to_gateway_or_caller() {
        let (status, _) = body_of(ServerError::Model(AgentError::EmptyResponse)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);

        let unsupported = AgentError::Unsupported {
            provider: "local",
            feature: "image input",
        };
        let (status, body) = body_of(ServerError::Model(unsupported)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["detail"], "local does not support image input");
    }

    #[tokio::test]
    async fn unauthorized_carries_bearer_challenge() {
        let response = ServerError::Unauthorized("Invalid credentials".into()).into_response();
        assert_eq!(
            response.headers().get(header::WWW_AUTHENTICATE),
            Some(&HeaderValue::from_static("Bearer"))
        );
    }
}
