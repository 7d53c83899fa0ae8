//! Axum router construction.
//!
//! [`build`] assembles the complete application router, including:
//! - Middleware layers (CORS, cookie jar, per-request trace-ID injection)
//! - Optional Swagger UI / OpenAPI spec endpoint (disable with `ATELIER_ENABLE_SWAGGER=false`)
//! - Health route
//! - Studio routes: auth, chat, history, session, visit, responder, transcribe
//! - admin `/admin` routes (admin role required)

mod admin;
mod auth;
mod chat;
pub mod doc;
mod health;
mod history;
mod responder;
mod session;
mod transcribe;
mod visit;

use axum::{middleware, Router};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_cookies::CookieManagerLayer;
use utoipa_swagger_ui::SwaggerUi;

use crate::middleware::{cors, trace};
use crate::state::AppState;

/// Build the complete Axum [`Router`] for the application.
pub fn build(state: Arc<AppState>) -> Router {
    let api_router = Router::new()
        .merge(health::router())
        .merge(auth::router())
        .merge(chat::router())
        .merge(history::router())
        .merge(session::router())
        .merge(visit::router())
        .merge(responder::router())
        .merge(transcribe::router())
        .nest("/admin", admin::router());

    let mut app = Router::new().merge(api_router);

    if state.config.enable_swagger {
        app = app.merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", doc::get_docs()));
    }

    app
        // Outermost layers execute first on the way in.
        .layer(
            ServiceBuilder::new()
                .layer(cors::cors_layer(state.clone()))
                .layer(CookieManagerLayer::new()),
        )
        .layer(middleware::from_fn_with_state(
            state.clone(),
            trace::trace_middleware,
        ))
        .with_state(state)
}
