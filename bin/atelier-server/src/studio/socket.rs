//! Live websocket connections, keyed by user id.
//!
//! A connection is represented by the sending half of its outbound queue, so
//! other handlers (the image critique route) can push frames to a user's
//! socket without owning it.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Mutex;

use axum::extract::ws::{CloseFrame, Message};
use tokio::sync::mpsc;

/// Outbound frame queue depth per connection.
pub const OUTBOUND_CAPACITY: usize = 64;

/// A close frame payload holds at most 125 bytes, two of them the code.
pub const MAX_CLOSE_REASON: usize = 123;

/// Close frame with `reason` cut to [`MAX_CLOSE_REASON`] bytes on a char
/// boundary.
pub fn close_message(code: u16, reason: &str) -> Message {
    let mut end = reason.len().min(MAX_CLOSE_REASON);
    while !reason.is_char_boundary(end) {
        end -= 1;
    }
    Message::Close(Some(CloseFrame {
        code,
        reason: reason[..end].to_owned().into(),
    }))
}

#[derive(Debug, Clone)]
pub struct SocketHandle {
    /// Distinguishes successive connections of the same user.
    pub conn_id: u64,
    sender: mpsc::Sender<Message>,
}

impl SocketHandle {
    /// Queue a frame. Returns `false` once the connection is gone.
    pub async fn send(&self, message: Message) -> bool {
        self.sender.send(message).await.is_ok()
    }

    pub async fn send_text(&self, text: impl Into<String>) -> bool {
        let text: String = text.into();
        self.send(Message::Text(text.into())).await
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }
}

#[derive(Default)]
pub struct SocketRegistry {
    next_id: AtomicU64,
    sockets: Mutex<HashMap<String, SocketHandle>>,
}

impl std::fmt::Debug for SocketRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.sockets.lock().map(|s| s.len()).unwrap_or(0);
        write!(f, "SocketRegistry({count} sockets)")
    }
}

impl SocketRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `sender` as the user's live connection, replacing any
    /// previous one.
    pub fn add(&self, user_id: &str, sender: mpsc::Sender<Message>) -> SocketHandle {
        let handle = SocketHandle {
            conn_id: self.next_id.fetch_add(1, Ordering::Relaxed),
            sender,
        };
        if let Ok(mut map) = self.sockets.lock() {
            if let Some(old) = map.insert(user_id.to_owned(), handle.clone()) {
                tracing::debug!(user_id, old_conn = old.conn_id, new_conn = handle.conn_id, "replaced websocket");
            }
        }
        handle
    }

    /// Remove the user's entry if it still belongs to `conn_id`.
    ///
    /// Returns `true` if an entry was removed.
    pub fn remove(&self, user_id: &str, conn_id: u64) -> bool {
        if let Ok(mut map) = self.sockets.lock() {
            if map.get(user_id).is_some_and(|h| h.conn_id == conn_id) {
                map.remove(user_id);
                return true;
            }
        }
        false
    }

    pub fn get(&self, user_id: &str) -> Option<SocketHandle> {
        self.sockets
            .lock()
            .ok()
            .and_then(|map| map.get(user_id).cloned())
            .filter(|h| !h.is_closed())
    }

    pub fn has(&self, user_id: &str) -> bool {
        self.get(user_id).is_some()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[tokio::test]
    async fn stale_connection_does_not_evict_newer_one() {
        let registry = SocketRegistry::new();
        let (tx1, _rx1) = mpsc::channel(1);
        let (tx2, mut rx2) = mpsc::channel(1);

        let first = registry.add("u1", tx1);
        let second = registry.add("u1", tx2);
        assert_ne!(first.conn_id, second.conn_id);

        assert!(!registry.remove("u1", first.conn_id));
        let live = registry.get("u1").expect("second still registered");
        assert_eq!(live.conn_id, second.conn_id);
        assert!(live.send_text("hi").await);
        assert!(matches!(rx2.recv().await, Some(Message::Text(t)) if t.as_str() == "hi"));

        assert!(registry.remove("u1", second.conn_id));
        assert!(!registry.has("u1"));
    }

    #[test]
    fn close_reason_is_truncated_on_char_boundary() {
        let long = "é".repeat(100);
        let Message::Close(Some(frame)) = close_message(1011, &long) else {
            panic!("expected a close frame");
        };
        assert_eq!(frame.code, 1011);
        assert!(frame.reason.len() <= MAX_CLOSE_REASON);
        assert_eq!(frame.reason.len(), 122);
    }

    #[tokio::test]
    async fn closed_receiver_reads_as_absent() {
        let registry = SocketRegistry::new();
        let (tx, rx) = mpsc::channel(1);
        registry.add("u2", tx);
        drop(rx);
        assert!(!registry.has("u2"));
    }
}
