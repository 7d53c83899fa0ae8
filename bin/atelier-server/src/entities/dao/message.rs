use chrono::{DateTime, Utc};

/// A single row in the `messages` table.
#[derive(Debug, Clone)]
pub struct MessageRecord {
    pub id: String,
    pub user_id: String,
    /// Visit the message was sent in; `None` for out-of-visit messages.
    pub session_id: Option<String>,
    /// `"user"`, `"assistant"`, or `"system"`.
    pub role: String,
    pub content: String,
    /// Upload path relative to the uploads root, e.g. `"<user id>/<sha256>.png"`.
    pub image_filename: Option<String>,
    pub timestamp: DateTime<Utc>,
}
