pub mod log;
pub mod rag;

use crate::state::AppState;

use axum::Router;
use std::sync::Arc;
use utoipa::OpenApi;

/// Routes nested under `/admin`. Every handler takes an
/// [`crate::middleware::AdminUser`].
pub fn router() -> Router<Arc<AppState>> {
    Router::new().merge(rag::router()).merge(log::router())
}

#[derive(OpenApi)]
#[openapi()]
pub struct AdminApi;

pub fn api_docs() -> utoipa::openapi::OpenApi {
    let mut spec = AdminApi::openapi();
    spec.merge(rag::RagApi::openapi());
    spec.merge(log::LogApi::openapi());
    spec
}
