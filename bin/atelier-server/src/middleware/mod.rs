//! HTTP middleware stack and request extractors.

pub mod auth;
pub mod cors;
pub mod trace;

pub use auth::{AdminUser, CurrentUser, WsAuth};
