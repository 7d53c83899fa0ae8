use chrono::{DateTime, Utc};

/// A row in the `db_logs` table written by the responder endpoints.
#[derive(Debug, Clone)]
pub struct LogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub user_input: String,
    /// The model's reply.
    pub model_input: String,
}
