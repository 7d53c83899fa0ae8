//! Request authentication extractors.
//!
//! - [`CurrentUser`]: `Authorization: Bearer <access token>`.
//! - [`AdminUser`]: a [`CurrentUser`] whose role is `admin`.
//! - [`WsAuth`]: browsers cannot set headers on a websocket handshake, so the
//!   access token travels in `Sec-WebSocket-Protocol` instead. Failures are
//!   reported after the upgrade as a close frame, never as an HTTP rejection.

use std::convert::Infallible;
use std::sync::Arc;

use axum::extract::FromRequestParts;
use axum::http::header::{AUTHORIZATION, SEC_WEBSOCKET_PROTOCOL};
use axum::http::request::Parts;

use crate::entities::{UserRecord, UserRole, UserStore};
use crate::error::ServerError;
use crate::state::AppState;

#[derive(Debug, Clone)]
pub struct CurrentUser(pub UserRecord);

#[derive(Debug, Clone)]
pub struct AdminUser(pub UserRecord);

/// Outcome of websocket authentication.
#[derive(Debug)]
pub struct WsAuth {
    /// The subprotocol to echo in the handshake response.
    pub protocol: Option<String>,
    /// The authenticated user, or the close reason to report.
    pub user: Result<UserRecord, String>,
}

fn bearer(parts: &Parts) -> Option<&str> {
    parts
        .headers
        .get(AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer ").or_else(|| v.strip_prefix("bearer ")))
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

/// Resolve an access token to its user.
pub async fn authenticate(state: &AppState, token: &str) -> Result<UserRecord, ServerError> {
    let claims = state
        .tokens
        .verify_access(token)
        .map_err(|e| ServerError::Unauthorized(e.to_string()))?;
    state
        .store
        .find_user_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("Not authorized".into()))
}

impl FromRequestParts<Arc<AppState>> for CurrentUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let token = bearer(parts).ok_or_else(|| ServerError::Unauthorized("Not authenticated".into()))?;
        let user = authenticate(state, token).await?;
        Ok(CurrentUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for AdminUser {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        let CurrentUser(user) = CurrentUser::from_request_parts(parts, state).await?;
        if user.role != UserRole::Admin {
            return Err(ServerError::Unauthorized("Insufficient permissions".into()));
        }
        Ok(AdminUser(user))
    }
}

impl FromRequestParts<Arc<AppState>> for WsAuth {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, state: &Arc<AppState>) -> Result<Self, Self::Rejection> {
        // Clients may offer several subprotocols; the token is the first.
        let protocol = parts
            .headers
            .get(SEC_WEBSOCKET_PROTOCOL)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(|t| t.trim().to_owned())
            .filter(|t| !t.is_empty());

        let user = match &protocol {
            None => Err("404: Missing token".to_owned()),
            Some(token) => match authenticate(state, token).await {
                Ok(user) => Ok(user),
                Err(ServerError::Unauthorized(reason)) if reason == "Not authorized" => {
                    Err("404: No user found".to_owned())
                }
                Err(ServerError::Unauthorized(reason)) => Err(reason),
                Err(other) => {
                    tracing::warn!(error = %other, "websocket authentication failed");
                    Err("Authentication failed".to_owned())
                }
            },
        };
        Ok(WsAuth { protocol, user })
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::state::test::{seed_user, test_state};
    use axum::http::Request;

    fn parts_with(header: &str, value: &str) -> Parts {
        let (parts, _) = Request::builder()
            .header(header, value)
            .body(())
            .expect("request")
            .into_parts();
        parts
    }

    #[tokio::test]
    async fn bearer_token_resolves_user() {
        let state = test_state("").await;
        let (user, token) = seed_user(&state, "who@example.com", UserRole::User).await;
        let mut parts = parts_with("authorization", &format!("Bearer {token}"));
        let CurrentUser(found) = CurrentUser::from_request_parts(&mut parts, &state)
            .await
            .expect("authenticated");
        assert_eq!(found.id, user.id);
    }

    #[tokio::test]
    async fn non_admin_is_rejected_by_admin_guard() {
        let state = test_state("").await;
        let (_, token) = seed_user(&state, "plain@example.com", UserRole::User).await;
        let mut parts = parts_with("authorization", &format!("Bearer {token}"));
        let err = AdminUser::from_request_parts(&mut parts, &state)
            .await
            .expect_err("not an admin");
        assert!(matches!(err, ServerError::Unauthorized(m) if m == "Insufficient permissions"));
    }

    #[tokio::test]
    async fn ws_auth_reports_missing_and_unknown_users() {
        let state = test_state("").await;
        let (empty, _) = Request::builder().body(()).expect("request").into_parts();
        let mut empty = empty;
        let auth = WsAuth::from_request_parts(&mut empty, &state).await.expect("infallible");
        assert_eq!(auth.user.expect_err("no token"), "404: Missing token");

        let ghost = state
            .tokens
            .issue_access("ghost@example.com", UserRole::User)
            .expect("token");
        let mut parts = parts_with("sec-websocket-protocol", &ghost);
        let auth = WsAuth::from_request_parts(&mut parts, &state).await.expect("infallible");
        assert_eq!(auth.protocol.as_deref(), Some(ghost.as_str()));
        assert_eq!(auth.user.expect_err("unknown"), "404: No user found");
    }
}
