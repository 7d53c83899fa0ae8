//! Studio chat: the critic websocket, image critique and canvas drawing.
//!
//! The websocket is split into a reader (this handler) and a writer task fed
//! by an mpsc queue. The queue's sender is what gets registered in
//! [`crate::studio::SocketRegistry`], so `POST /chat/image-critique` can
//! stream into the same connection.

use std::sync::Arc;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{DefaultBodyLimit, Multipart, State};
use axum::response::Response;
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::Utc;
use futures::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use utoipa::OpenApi;
use uuid::Uuid;

use atelier_agent::{Line, Role, TokenStream};

use crate::entities::{MessageRecord, MessageStore, UserRecord};
use crate::error::ServerError;
use crate::middleware::{CurrentUser, WsAuth};
use crate::schemas::chat::{DrawRequest, ImageReturn, ImageUpload, LineSchema};
use crate::schemas::DetailResponse;
use crate::state::AppState;
use crate::studio::socket::{close_message, OUTBOUND_CAPACITY};
use crate::studio::upload::{self, UploadError};
use crate::studio::{SocketHandle, Studio, END_MARKER};

/// Upper bound on an image-critique request body.
const MAX_IMAGE_BYTES: usize = 20 * 1024 * 1024;

/// Policy violation: the handshake carried no usable token.
const CLOSE_POLICY: u16 = 1008;
/// Internal error while answering a prompt.
const CLOSE_ERROR: u16 = 1011;

#[derive(OpenApi)]
#[openapi(
    paths(chat_socket, image_critique, draw),
    components(schemas(ImageReturn, ImageUpload, DrawRequest, LineSchema, DetailResponse))
)]
pub struct ChatApi;

/// Register chat routes.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/chat/", get(chat_socket))
        .route("/chat", get(chat_socket))
        .route(
            "/chat/image-critique",
            post(image_critique).layer(DefaultBodyLimit::max(MAX_IMAGE_BYTES)),
        )
        .route("/chat/draw", post(draw))
}

/// Critic chat websocket (`GET /chat/`).
///
/// The access token is passed as the websocket subprotocol and echoed back.
/// Each text frame is a prompt; the reply is streamed as text frames and
/// terminated by `[END]`.
#[utoipa::path(
    get,
    path = "/chat/",
    tag = "chat",
    params(("Sec-WebSocket-Protocol" = String, Header, description = "Access token")),
    responses(
        (status = 101, description = "Switching to websocket"),
    )
)]
pub async fn chat_socket(
    State(state): State<Arc<AppState>>,
    auth: WsAuth,
    ws: WebSocketUpgrade,
) -> Response {
    let ws = match auth.protocol {
        Some(protocol) => ws.protocols([protocol]),
        None => ws,
    };
    let user = auth.user;
    ws.on_upgrade(move |mut socket| async move {
        match user {
            Ok(user) => run_chat(state, user, socket).await,
            Err(reason) => {
                debug!(reason = %reason, "rejecting chat websocket");
                let _ = socket.send(close_message(CLOSE_POLICY, &reason)).await;
            }
        }
    })
}

async fn run_chat(state: Arc<AppState>, user: UserRecord, socket: WebSocket) {
    let (mut sink, mut stream) = socket.split();
    let (tx, mut rx) = mpsc::channel::<Message>(OUTBOUND_CAPACITY);
    if state.sockets.has(&user.id) {
        debug!(user_id = %user.id, "replacing existing chat websocket");
    }
    let handle = state.sockets.add(&user.id, tx);
    info!(user_id = %user.id, conn_id = handle.conn_id, "chat websocket connected");

    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            let closing = matches!(message, Message::Close(_));
            if sink.send(message).await.is_err() || closing {
                break;
            }
        }
        let _ = sink.close().await;
    });

    while let Some(frame) = stream.next().await {
        let prompt = match frame {
            Ok(Message::Text(text)) => text.as_str().to_owned(),
            Ok(Message::Close(_)) => break,
            Ok(_) => continue,
            Err(e) => {
                debug!(error = %e, "chat websocket read failed");
                break;
            }
        };
        if prompt.trim().is_empty() {
            continue;
        }
        if let Err(e) = answer_prompt(&state, &user, &handle, &prompt).await {
            warn!(user_id = %user.id, error = %e, "chat prompt failed");
            handle.send(close_message(CLOSE_ERROR, &format!("Error: {e}"))).await;
            break;
        }
    }

    state.sockets.remove(&user.id, handle.conn_id);
    drop(handle);
    if let Err(e) = writer.await {
        warn!(error = %e, "chat writer task failed");
    }
    info!(user_id = %user.id, "chat websocket disconnected");
}

/// Forward every chunk of `tokens` to `socket`, then `[END]`. Returns the
/// full text.
async fn relay(socket: &SocketHandle, mut tokens: TokenStream) -> Result<String, ServerError> {
    let mut reply = String::new();
    let mut connected = true;
    while let Some(chunk) = tokens.next().await {
        let chunk = chunk?;
        if chunk.is_empty() {
            continue;
        }
        reply.push_str(&chunk);
        if connected && !socket.send_text(chunk).await {
            // Keep draining so the reply can still be stored.
            connected = false;
        }
    }
    if connected {
        socket.send_text(END_MARKER).await;
    }
    Ok(reply)
}

fn message(user: &UserRecord, session_id: &str, role: Role, content: String) -> MessageRecord {
    MessageRecord {
        id: Uuid::new_v4().to_string(),
        user_id: user.id.clone(),
        session_id: Some(session_id.to_owned()),
        role: role.to_string(),
        content,
        image_filename: None,
        timestamp: Utc::now(),
    }
}

/// One chat turn: stream the critic's reply and store both sides.
async fn answer_prompt(
    state: &AppState,
    user: &UserRecord,
    socket: &SocketHandle,
    prompt: &str,
) -> Result<(), ServerError> {
    let visit = state.visits.get_or_start(user).await?;
    let history = state
        .store
        .recent_messages(&user.id, state.config.history_window)
        .await?;
    let question = message(user, &visit.session_id, Role::User, prompt.to_owned());

    let tokens = state.studio.chat(Studio::conversation(&history, prompt)).await?;
    let reply = relay(socket, tokens).await?;

    let answer = message(user, &visit.session_id, Role::Assistant, reply);
    state.store.append_messages(vec![question, answer]).await?;
    Ok(())
}

/// Critique an uploaded image (`POST /chat/image-critique`).
///
/// The critique is streamed to the caller's open chat websocket; the HTTP
/// response only describes the stored upload.
#[utoipa::path(
    post,
    path = "/chat/image-critique",
    tag = "chat",
    request_body(content = ImageUpload, content_type = "multipart/form-data", description = "Image upload in field `file`"),
    security(("bearer" = [])),
    responses(
        (status = 200, description = "Critique streamed to the websocket", body = ImageReturn),
        (status = 400, description = "Not an image, invalid image, or no websocket", body = DetailResponse),
        (status = 401, description = "Not authenticated", body = DetailResponse),
    )
)]
pub async fn image_critique(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    mut multipart: Multipart,
) -> Result<Json<ImageReturn>, ServerError> {
    let mut upload = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ServerError::BadRequest(format!("Failed to read multipart field: {e}")))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let content_type = field.content_type().unwrap_or("application/octet-stream");
        if !content_type.starts_with("image/") {
            return Err(ServerError::BadRequest("Only image files are allowed.".into()));
        }
        let bytes = field
            .bytes()
            .await
            .map_err(|e| ServerError::BadRequest(format!("Failed to read file: {e}")))?;
        upload = Some(bytes.to_vec());
        break;
    }
    let bytes = upload.ok_or_else(|| ServerError::BadRequest("Missing file".into()))?;

    let socket = state
        .sockets
        .get(&user.id)
        .ok_or_else(|| ServerError::BadRequest("No active websocket for user.".into()))?;

    let size = bytes.len();
    let png = upload::to_png_blocking(bytes).await.map_err(|e| match e {
        UploadError::InvalidImage(_) => ServerError::BadRequest("Invalid image file.".into()),
        other => ServerError::Internal(other.to_string()),
    })?;
    let filename = upload::save_png(&state.config.uploads_dir, &user.id, &png)
        .await
        .map_err(|e| ServerError::Internal(e.to_string()))?;
    info!(user_id = %user.id, filename = %filename, size, stored = png.len(), "image uploaded");

    let visit = state.visits.get_or_start(&user).await?;
    let critique = relay(&socket, state.studio.critique(&png).await?).await?;

    let mut record = message(&user, &visit.session_id, Role::Assistant, critique);
    record.image_filename = Some(filename.clone());
    let message_id = record.id.clone();
    state.store.append_messages(vec![record]).await?;

    Ok(Json(ImageReturn {
        filename,
        size: size as u64,
        message_id,
    }))
}

/// Continue a drawing (`POST /chat/draw`).
#[utoipa::path(
    post,
    path = "/chat/draw",
    tag = "chat",
    request_body = DrawRequest,
    security(("bearer" = [])),
    responses(
        (status = 200, description = "New strokes to add to the canvas", body = Vec<LineSchema>),
        (status = 401, description = "Not authenticated", body = DetailResponse),
        (status = 502, description = "Model backend error", body = DetailResponse),
    )
)]
pub async fn draw(
    State(state): State<Arc<AppState>>,
    CurrentUser(user): CurrentUser,
    Json(req): Json<DrawRequest>,
) -> Result<Json<Vec<Line>>, ServerError> {
    debug!(user_id = %user.id, lines = req.lines.len(), "draw request");
    let lines = state.studio.draw(req.lines).await?;
    Ok(Json(lines))
}
