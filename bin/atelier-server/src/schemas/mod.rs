//! Request and response bodies, with their OpenAPI schemas.

pub mod auth;
pub mod chat;
pub mod history;
pub mod log;
pub mod rag;
pub mod responder;
pub mod visit;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Generic `{"detail": "..."}` body, used for both messages and errors.
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct DetailResponse {
    pub detail: String,
}

impl DetailResponse {
    pub fn new(detail: impl Into<String>) -> Self {
        Self { detail: detail.into() }
    }
}
