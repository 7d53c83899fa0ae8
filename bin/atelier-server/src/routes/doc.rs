use crate::routes::{admin, auth, chat, health, history, responder, session, transcribe, visit};
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

#[derive(OpenApi)]
#[openapi(
    info(
        title = "atelier-server",
        description = "atelier studio chat & critique API",
        version = "0.1.0",
    ),
    modifiers(&BearerAuth)
)]
pub struct ApiDoc;

/// Registers the `bearer` scheme referenced by authenticated paths.
struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

pub fn get_docs() -> utoipa::openapi::OpenApi {
    let mut root = ApiDoc::openapi();
    root.merge(health::HealthApi::openapi());
    root.merge(auth::AuthApi::openapi());
    root.merge(chat::ChatApi::openapi());
    root.merge(history::HistoryApi::openapi());
    root.merge(session::SessionApi::openapi());
    root.merge(visit::VisitApi::openapi());
    root.merge(responder::ResponderApi::openapi());
    root.merge(transcribe::TranscribeApi::openapi());
    root.merge(admin::api_docs());
    root
}
