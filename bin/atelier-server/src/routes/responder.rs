//! Persona responder over the local or hosted model.
//!
//! Every answered prompt is written to the `db_logs` table and to the
//! per-day interaction log. Logging failures never fail the request.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Path, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::StreamExt;
use tracing::{debug, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use atelier_agent::Responder;

use crate::entities::{LogRecord, LogStore};
use crate::error::ServerError;
use crate::middleware::{CurrentUser, WsAuth};
use crate::schemas::responder::{PromptRequest, PromptReturn};
use crate::schemas::DetailResponse;
use crate::state::AppState;
use crate::studio::socket::close_message;
use crate::studio::ModelType;

const CLOSE_NORMAL: u16 = 1000;
const CLOSE_UNSUPPORTED: u16 = 1003;
const CLOSE_POLICY: u16 = 1008;
const CLOSE_ERROR: u16 = 1011;

#[derive(OpenApi)]
#[openapi(
    paths(respond, respond_socket),
    components(schemas(PromptRequest, PromptReturn, ModelType, DetailResponse))
)]
pub struct ResponderApi;

/// Register responder routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/responder/respond", post(respond))
        .route("/responder/ws/respond/{model_type}", get(respond_socket))
}

async fn record_interaction(state: &AppState, prompt: &str, reply: &str) {
    let record = LogRecord {
        id: Uuid::new_v4().to_string(),
        timestamp: Utc::now(),
        user_input: prompt.to_owned(),
        model_input: reply.to_owned(),
    };
    if let Err(e) = state.store.insert_log(record.clone()).await {
        warn!(error = %e, "failed to store responder log");
    }
    if let Err(e) = state.interaction_log.record(&record).await {
        warn!(error = %e, root = %state.interaction_log.root().display(), "failed to write interaction log");
    }
}

/// Answer one prompt (`POST /responder/respond`).
///
/// `model_type` `"1"` (default) uses the local model, `"2"` the hosted one.
#[utoipa::path(
    post,
    path = "/responder/respond",
    tag = "responder",
    request_body = PromptRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Model response", body = PromptReturn),
        (status = 400, description = "Empty prompt", body = DetailResponse),
        (status = 500, description = "Error generating response", body = DetailResponse),
        (status = 503, description = "Local model is not configured", body = DetailResponse),
    )
)]
pub async fn respond(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<PromptRequest>,
) -> Result<Json<PromptReturn>, ServerError> {
    if req.prompt.trim().is_empty() {
        return Err(ServerError::BadRequest("No prompt provided.".into()));
    }
    let model_type = req.model_type.unwrap_or_default();
    let responder = state.responders.select(model_type)?;
    debug!(user_id = %user.id, %model_type, "responder prompt");

    let response = responder
        .respond(&req.prompt)
        .await
        .map_err(|e| ServerError::exposed(format!("Error generating response: {e}")))?;

    record_interaction(&state, &req.prompt, &response).await;
    Ok(Json(PromptReturn { response }))
}

/// Streamed responder (`GET /responder/ws/respond/{model_type}`).
///
/// The client sends one prompt; tokens come back as text frames and the
/// socket is closed with 1000 "Response complete.".
#[utoipa::path(
    get,
    path = "/responder/ws/respond/{model_type}",
    tag = "responder",
    params(
        ("model_type" = ModelType, Path, description = "`1` local, `2` hosted"),
        ("Sec-WebSocket-Protocol" = String, Header, description = "Access token"),
    ),
    responses(
        (status = 101, description = "Switching to websocket"),
        (status = 503, description = "Local model is not configured", body = DetailResponse),
    )
)]
pub async fn respond_socket(
    State(state): State<Arc<AppState>>,
    Path(model_type): Path<ModelType>,
    auth: WsAuth,
    ws: WebSocketUpgrade,
) -> Result<Response, ServerError> {
    let responder = state.responders.select(model_type)?.clone();
    let ws = match auth.protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };
    let user = auth.user;
    Ok(ws.on_upgrade(move |mut socket| async move {
        match user {
            Ok(user) => {
                debug!(user_id = %user.id, %model_type, "responder websocket connected");
                stream_response(&state, &responder, socket).await;
            }
            Err(reason) => {
                let _ = socket.send(close_message(CLOSE_POLICY, &reason)).await;
            }
        }
    }))
}

async fn stream_response(state: &AppState, responder: &Responder, mut socket: WebSocket) {
    let prompt = loop {
        match socket.recv().await {
            Some(Ok(Message::Text(text))) => break text.as_str().trim().to_owned(),
            Some(Ok(Message::Close(_))) | Some(Err(_)) | None => return,
            Some(Ok(_)) => continue,
        }
    };
    if prompt.is_empty() {
        let _ = socket.send(close_message(CLOSE_UNSUPPORTED, "No prompt provided.")).await;
        return;
    }

    let mut tokens = match responder.respond_streamed(&prompt).await {
        Ok(tokens) => tokens,
        Err(e) => {
            warn!(error = %e, "responder stream failed to start");
            let _ = socket.send(close_message(CLOSE_ERROR, &format!("Error: {e}"))).await;
            return;
        }
    };

    let mut reply = String::new();
    while let Some(chunk) = tokens.next().await {
        match chunk {
            Ok(chunk) if chunk.is_empty() => continue,
            Ok(chunk) => {
                reply.push_str(&chunk);
                if socket.send(Message::Text(chunk.into())).await.is_err() {
                    debug!("responder client went away mid-stream");
                    return;
                }
            }
            Err(e) => {
                warn!(error = %e, "responder stream failed");
                let _ = socket.send(close_message(CLOSE_ERROR, &format!("Error: {e}"))).await;
                return;
            }
        }
    }

    record_interaction(state, &prompt, reply.trim()).await;
    info!(reply_len = reply.len(), "responder stream complete");
    let _ = socket.send(close_message(CLOSE_NORMAL, "Response complete.")).await;
}

#[cfg(test)]
mod test {
    use super::*;
    use axum::body::Body;
    use axum::http::header::CONTENT_TYPE;
    use futures::SinkExt;
    use tokio_tungstenite::tungstenite::Message as WsMessage;
    use tracing_test::traced_test;

    use crate::entities::UserRole;
    use crate::routes::test::{authed, body_json, call, connect_ws, spawn_server};
    use crate::state::test::{seed_user, test_state, test_state_with, ScriptedProvider};

    fn prompt_request(token: &str, body: &str) -> axum::http::Request<Body> {
        authed("POST", "/responder/respond", token)
            .header(CONTENT_TYPE, "application/json")
            .body(Body::from(body.to_owned()))
            .expect("request")
    }

    #[tokio::test]
    async fn respond_returns_reply_and_logs_it() {
        let state = test_state("  Ghosts are a matter of taste.  ").await;
        let (_, token) = seed_user(&state, "resp@example.com", UserRole::User).await;

        let response = call(
            state.clone(),
            prompt_request(&token, r#"{"prompt": "Are ghosts real?", "model_type": "2"}"#),
        )
        .await;
        assert_eq!(response.status(), 200);
        assert_eq!(body_json(response).await["response"], "Ghosts are a matter of taste.");

        let logs = state.store.list_logs(10).await.expect("logs");
        assert_eq!(logs.len(), 1);
        assert_eq!(logs[0].user_input, "Are ghosts real?");
        let txt_dir = state.interaction_log.root().join("txt");
        assert_eq!(std::fs::read_dir(txt_dir).expect("txt dir").count(), 1);
    }

    #[tokio::test]
    async fn model_failure_is_exposed() {
        let state = test_state_with(Arc::new(ScriptedProvider::failing())).await;
        let (_, token) = seed_user(&state, "fail@example.com", UserRole::User).await;
        let response = call(state, prompt_request(&token, r#"{"prompt": "hi"}"#)).await;
        assert_eq!(response.status(), 500);
        let detail = body_json(response).await["detail"].as_str().expect("detail").to_owned();
        assert!(detail.starts_with("Error generating response: "), "{detail}");
    }

    #[tokio::test]
    async fn unconfigured_local_model_is_unavailable() {
        let mut state = Arc::try_unwrap(test_state("x").await).expect("sole owner");
        state.responders.local = None;
        let state = Arc::new(state);
        let (_, token) = seed_user(&state, "local@example.com", UserRole::User).await;

        let response = call(state, prompt_request(&token, r#"{"prompt": "hi", "model_type": "1"}"#)).await;
        assert_eq!(response.status(), 503);
        assert_eq!(body_json(response).await["detail"], "Local model is not configured");
    }

    #[tokio::test]
    #[traced_test]
    async fn broken_interaction_log_does_not_fail_the_request() {
        let mut state = Arc::try_unwrap(test_state("fine").await).expect("sole owner");
        let blocker = std::env::temp_dir().join(format!("atelier-log-blocker-{}", Uuid::new_v4()));
        std::fs::write(&blocker, b"not a directory").expect("blocker");
        state.interaction_log = crate::studio::InteractionLog::new(&blocker);
        let state = Arc::new(state);
        let (_, token) = seed_user(&state, "log@example.com", UserRole::User).await;

        let response = call(state.clone(), prompt_request(&token, r#"{"prompt": "hi", "model_type": "2"}"#)).await;
        assert_eq!(response.status(), 200);
        assert_eq!(state.store.list_logs(10).await.expect("logs").len(), 1);
        assert!(logs_contain("failed to write interaction log"));
    }

    async fn read_until_close(
        ws: &mut tokio_tungstenite::WebSocketStream<tokio_tungstenite::MaybeTlsStream<tokio::net::TcpStream>>,
    ) -> (String, Option<(u16, String)>) {
        let mut text = String::new();
        while let Some(Ok(frame)) = ws.next().await {
            match frame {
                WsMessage::Text(t) => text.push_str(t.as_str()),
                WsMessage::Close(frame) => {
                    return (text, frame.map(|f| (u16::from(f.code), f.reason.as_str().to_owned())));
                }
                _ => {}
            }
        }
        (text, None)
    }

    #[tokio::test]
    async fn websocket_streams_then_closes_normally() {
        let state = test_state("A portrait is a mirror.").await;
        let (_, token) = seed_user(&state, "ws@example.com", UserRole::User).await;
        let addr = spawn_server(state.clone()).await;

        let mut ws = connect_ws(addr, "/responder/ws/respond/2", Some(&token)).await;
        ws.send(WsMessage::text("What is a portrait?")).await.expect("send");
        let (text, close) = read_until_close(&mut ws).await;
        assert_eq!(text, "A portrait is a mirror.");
        assert_eq!(close, Some((1000, "Response complete.".to_owned())));
        assert_eq!(state.store.list_logs(10).await.expect("logs").len(), 1);
    }

    #[tokio::test]
    async fn websocket_rejects_empty_prompt_and_missing_token() {
        let state = test_state("unused").await;
        let (_, token) = seed_user(&state, "empty@example.com", UserRole::User).await;
        let addr = spawn_server(state).await;

        let mut ws = connect_ws(addr, "/responder/ws/respond/2", Some(&token)).await;
        ws.send(WsMessage::text("   ")).await.expect("send");
        let (_, close) = read_until_close(&mut ws).await;
        assert_eq!(close, Some((1003, "No prompt provided.".to_owned())));

        let mut ws = connect_ws(addr, "/responder/ws/respond/2", None).await;
        let (_, close) = read_until_close(&mut ws).await;
        assert_eq!(close, Some((1008, "404: Missing token".to_owned())));
    }
}
