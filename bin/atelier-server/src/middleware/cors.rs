use crate::state::AppState;
use axum::http::HeaderValue;
use std::sync::Arc;
use tower_http::cors::{AllowHeaders, AllowMethods, Any, CorsLayer};

/// The refresh token is a cookie, so configured origins get credentialed
/// CORS. Credentials cannot be combined with wildcard headers or methods, so
/// those mirror the preflight request instead.
pub fn cors_layer(state: Arc<AppState>) -> CorsLayer {
    let origins: Vec<HeaderValue> = state
        .config
        .cors_allowed_origins
        .as_deref()
        .unwrap_or_default()
        .split(',')
        .filter_map(|s| s.trim().parse().ok())
        .collect();

    if origins.is_empty() {
        // Wildcard without credentials; set ATELIER_CORS_ORIGINS in production.
        CorsLayer::new()
            .allow_origin(Any)
            .allow_headers(Any)
            .allow_methods(Any)
    } else {
        CorsLayer::new()
            .allow_origin(origins)
            .allow_headers(AllowHeaders::mirror_request())
            .allow_methods(AllowMethods::mirror_request())
            .allow_credentials(true)
    }
}
