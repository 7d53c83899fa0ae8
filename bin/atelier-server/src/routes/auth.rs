//! Registration, login and refresh-token routes.
//!
//! The access token is returned in the body; the refresh token only ever
//! travels in an HttpOnly cookie.

use std::sync::Arc;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::{delete, get, post};
use axum::{Form, Json, Router};
use chrono::Utc;
use tower_cookies::cookie::time::Duration as CookieDuration;
use tower_cookies::cookie::SameSite;
use tower_cookies::{Cookie, Cookies};
use tracing::{info, warn};
use utoipa::OpenApi;
use uuid::Uuid;
use validator::ValidateEmail;

use crate::auth::password::{check_policy, hash_password, verify_password};
use crate::auth::TokenError;
use crate::entities::user::is_unique_violation;
use crate::entities::{UserRecord, UserRole, UserStore};
use crate::error::ServerError;
use crate::middleware::AdminUser;
use crate::schemas::auth::{LoginForm, RegisterForm, TokenResponse};
use crate::schemas::DetailResponse;
use crate::state::AppState;

pub const REFRESH_COOKIE: &str = "refresh_token";

#[derive(OpenApi)]
#[openapi(
    paths(register, login, refresh, logout),
    components(schemas(RegisterForm, LoginForm, TokenResponse, DetailResponse))
)]
pub struct AuthApi;

/// Register auth routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/auth/register", post(register))
        .route("/auth/login", post(login))
        .route("/auth/refresh", get(refresh))
        .route("/auth/logout", delete(logout))
}

fn refresh_cookie(token: String, state: &AppState) -> Cookie<'static> {
    Cookie::build((REFRESH_COOKIE, token))
        .http_only(true)
        .secure(true)
        .same_site(SameSite::Strict)
        .path("/")
        .max_age(CookieDuration::seconds(state.tokens.refresh_ttl().num_seconds()))
        .build()
}

fn remove_refresh_cookie(cookies: &Cookies) {
    cookies.remove(Cookie::build(REFRESH_COOKIE).path("/").build());
}

fn token_failure(e: TokenError) -> ServerError {
    ServerError::Internal(format!("token signing failed: {e}"))
}

/// Create a user (`POST /auth/register`). Admin only.
#[utoipa::path(
    post,
    path = "/auth/register",
    tag = "auth",
    request_body(content = RegisterForm, content_type = "application/x-www-form-urlencoded"),
    security(("bearer" = [])),
    responses(
        (status = 201, description = "User registered", body = DetailResponse),
        (status = 400, description = "Invalid email, weak password or duplicate user", body = DetailResponse),
        (status = 401, description = "Not an admin", body = DetailResponse),
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    AdminUser(admin): AdminUser,
    Form(form): Form<RegisterForm>,
) -> Result<(StatusCode, Json<DetailResponse>), ServerError> {
    let email = form.username.trim().to_lowercase();
    if !email.validate_email() {
        return Err(ServerError::BadRequest("Invalid email address".into()));
    }
    check_policy(&form.password).map_err(|reason| ServerError::BadRequest(reason.into()))?;

    if state.store.find_user_by_email(&email).await?.is_some() {
        return Err(ServerError::BadRequest("User already exists".into()));
    }

    let user = UserRecord {
        id: Uuid::new_v4().to_string(),
        email: email.clone(),
        hashed_password: hash_password(form.password).await?,
        role: UserRole::User,
        created_at: Utc::now(),
    };
    match state.store.create_user(user).await {
        Ok(()) => {}
        // Lost a race against a concurrent registration.
        Err(e) if is_unique_violation(&e) => {
            return Err(ServerError::BadRequest("User already exists".into()));
        }
        Err(e) => return Err(e.into()),
    }

    info!(email = %email, by = %admin.email, "user registered");
    Ok((
        StatusCode::CREATED,
        Json(DetailResponse::new(format!("User {email} registered successfully"))),
    ))
}

/// OAuth2 password login (`POST /auth/login`).
///
/// Sets the `refresh_token` cookie and returns a bearer access token.
#[utoipa::path(
    post,
    path = "/auth/login",
    tag = "auth",
    request_body(content = LoginForm, content_type = "application/x-www-form-urlencoded"),
    responses(
        (status = 200, description = "Logged in", body = TokenResponse),
        (status = 401, description = "Invalid credentials", body = DetailResponse),
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
    Form(form): Form<LoginForm>,
) -> Result<Json<TokenResponse>, ServerError> {
    let invalid = || ServerError::Unauthorized("Invalid credentials".into());

    let email = form.username.trim().to_lowercase();
    let user = state.store.find_user_by_email(&email).await?.ok_or_else(invalid)?;
    if !verify_password(form.password, user.hashed_password.clone()).await {
        warn!(email = %email, "failed login");
        return Err(invalid());
    }

    let access = state.tokens.issue_access(&user.email, user.role).map_err(token_failure)?;
    let refresh = state.tokens.issue_refresh(&user.email, user.role).map_err(token_failure)?;
    cookies.add(refresh_cookie(refresh, &state));

    info!(user_id = %user.id, "user logged in");
    Ok(Json(TokenResponse::bearer(access)))
}

/// Exchange the refresh cookie for a new access token (`GET /auth/refresh`).
#[utoipa::path(
    get,
    path = "/auth/refresh",
    tag = "auth",
    responses(
        (status = 200, description = "New access token", body = TokenResponse),
        (status = 401, description = "Missing, expired or invalid refresh token", body = DetailResponse),
    )
)]
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    cookies: Cookies,
) -> Result<Json<TokenResponse>, ServerError> {
    let token = cookies
        .get(REFRESH_COOKIE)
        .map(|c| c.value().to_owned())
        .ok_or_else(|| ServerError::Unauthorized("Missing refresh token".into()))?;

    let claims = match state.tokens.verify_refresh(&token) {
        Ok(claims) => claims,
        Err(TokenError::Expired) => {
            remove_refresh_cookie(&cookies);
            return Err(ServerError::Unauthorized("Expired refresh token".into()));
        }
        Err(TokenError::Invalid(_)) => {
            remove_refresh_cookie(&cookies);
            return Err(ServerError::Unauthorized("Invalid refresh token".into()));
        }
    };

    let user = state
        .store
        .find_user_by_email(&claims.sub)
        .await?
        .ok_or_else(|| ServerError::Unauthorized("Invalid user".into()))?;
    let access = state.tokens.issue_access(&user.email, user.role).map_err(token_failure)?;
    Ok(Json(TokenResponse::bearer(access)))
}

/// Drop the refresh cookie (`DELETE /auth/logout`).
#[utoipa::path(
    delete,
    path = "/auth/logout",
    tag = "auth",
    responses(
        (status = 200, description = "Logged out", body = DetailResponse),
    )
)]
pub async fn logout(cookies: Cookies) -> Json<DetailResponse> {
    remove_refresh_cookie(&cookies);
    Json(DetailResponse::new("User logged out successfully"))
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Body;
    use axum::http::header::{CONTENT_TYPE, COOKIE, SET_COOKIE};
    use axum::http::Request;

    use crate::auth::TokenService;
    use crate::routes::test::{authed, body_json, call};
    use crate::state::test::{seed_user, test_state};

    const FORM: &str = "application/x-www-form-urlencoded";

    fn login_request(email: &str, password: &str) -> Request<Body> {
        Request::post("/auth/login")
            .header(CONTENT_TYPE, FORM)
            .body(Body::from(format!("username={email}&password={password}")))
            .expect("request")
    }

    fn refresh_request(cookie: &str) -> Request<Body> {
        Request::get("/auth/refresh")
            .header(COOKIE, format!("{REFRESH_COOKIE}={cookie}"))
            .body(Body::empty())
            .expect("request")
    }

    fn set_cookie(response: &axum::response::Response) -> String {
        response
            .headers()
            .get(SET_COOKIE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_owned()
    }

    #[tokio::test]
    async fn login_sets_refresh_cookie_and_refresh_issues_access_token() {
        let state = test_state("").await;
        seed_user(&state, "artist@example.com", UserRole::User).await;

        let response = call(state.clone(), login_request("Artist@Example.com", "Password123")).await;
        assert_eq!(response.status(), 200);
        let cookie = set_cookie(&response);
        assert!(cookie.starts_with("refresh_token="));
        assert!(cookie.contains("HttpOnly"));
        assert!(cookie.contains("SameSite=Strict"));
        let body = body_json(response).await;
        assert_eq!(body["token_type"], "bearer");
        let access = body["access_token"].as_str().expect("token");
        assert_eq!(state.tokens.verify_access(access).expect("valid").sub, "artist@example.com");

        let value = cookie
            .split(';')
            .next()
            .and_then(|kv| kv.split_once('='))
            .map(|(_, v)| v.to_owned())
            .expect("cookie value");
        let response = call(state, refresh_request(&value)).await;
        assert_eq!(response.status(), 200);
        assert!(body_json(response).await["access_token"].is_string());
    }

    #[tokio::test]
    async fn wrong_password_is_rejected() {
        let state = test_state("").await;
        seed_user(&state, "artist@example.com", UserRole::User).await;
        let response = call(state, login_request("artist@example.com", "Password124")).await;
        assert_eq!(response.status(), 401);
        assert_eq!(body_json(response).await["detail"], "Invalid credentials");
    }

    #[tokio::test]
    async fn refresh_failures() {
        let state = test_state("").await;

        let response = call(state.clone(), Request::get("/auth/refresh").body(Body::empty()).expect("request")).await;
        assert_eq!(response.status(), 401);
        assert_eq!(body_json(response).await["detail"], "Missing refresh token");

        let response = call(state.clone(), refresh_request("garbage")).await;
        assert_eq!(response.status(), 401);
        assert!(set_cookie(&response).starts_with("refresh_token="));
        assert_eq!(body_json(response).await["detail"], "Invalid refresh token");

        // An access token is signed with the other secret.
        let access = state.tokens.issue_access("a@example.com", UserRole::User).expect("token");
        let response = call(state.clone(), refresh_request(&access)).await;
        assert_eq!(body_json(response).await["detail"], "Invalid refresh token");

        let expired = TokenService::new(
            "test-access-secret",
            "test-refresh-secret",
            chrono::Duration::minutes(1),
            chrono::Duration::seconds(-10),
        )
        .issue_refresh("a@example.com", UserRole::User)
        .expect("token");
        let response = call(state.clone(), refresh_request(&expired)).await;
        assert_eq!(response.status(), 401);
        let cleared = set_cookie(&response);
        assert!(cleared.starts_with("refresh_token=;"), "set-cookie: {cleared}");
        assert!(cleared.contains("Max-Age=0"), "set-cookie: {cleared}");
        assert_eq!(body_json(response).await["detail"], "Expired refresh token");

        let ghost = state.tokens.issue_refresh("ghost@example.com", UserRole::User).expect("token");
        let response = call(state, refresh_request(&ghost)).await;
        assert_eq!(body_json(response).await["detail"], "Invalid user");
    }

    #[tokio::test]
    async fn register_requires_admin_and_validates_input() {
        let state = test_state("").await;
        let (_, user_token) = seed_user(&state, "plain@example.com", UserRole::User).await;
        let (_, admin_token) = seed_user(&state, "admin@example.com", UserRole::Admin).await;

        let form = |token: &str, body: &str| {
            authed("POST", "/auth/register", token)
                .header(CONTENT_TYPE, FORM)
                .body(Body::from(body.to_owned()))
                .expect("request")
        };

        let response = call(state.clone(), form(&user_token, "username=new@example.com&password=Password123")).await;
        assert_eq!(response.status(), 401);

        let response = call(state.clone(), form(&admin_token, "username=not-an-email&password=Password123")).await;
        assert_eq!(body_json(response).await["detail"], "Invalid email address");

        let response = call(state.clone(), form(&admin_token, "username=new@example.com&password=password123")).await;
        assert_eq!(
            body_json(response).await["detail"],
            "Password must contain at least one uppercase letter"
        );

        let response = call(state.clone(), form(&admin_token, "username=New@Example.com&password=Password123")).await;
        assert_eq!(response.status(), 201);
        assert_eq!(
            body_json(response).await["detail"],
            "User new@example.com registered successfully"
        );

        let response = call(state, form(&admin_token, "username=new@example.com&password=Password123")).await;
        assert_eq!(response.status(), 400);
        assert_eq!(body_json(response).await["detail"], "User already exists");
    }

    #[tokio::test]
    async fn logout_clears_cookie() {
        let state = test_state("").await;
        let request = Request::delete("/auth/logout")
            .header(COOKIE, format!("{REFRESH_COOKIE}=anything"))
            .body(Body::empty())
            .expect("request");
        let response = call(state, request).await;
        assert_eq!(response.status(), 200);
        assert!(set_cookie(&response).starts_with("refresh_token="));
        assert_eq!(body_json(response).await["detail"], "User logged out successfully");
    }
}
