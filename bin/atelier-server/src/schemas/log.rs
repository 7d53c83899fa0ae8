use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

use crate::entities::LogRecord;

#[derive(Debug, Clone, Deserialize, IntoParams)]
pub struct LogQuery {
    /// Maximum number of entries (default 50).
    pub limit: Option<i64>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct LogResponse {
    pub id: String,
    /// RFC 3339.
    pub timestamp: String,
    pub user_input: String,
    pub model_input: String,
}

impl From<LogRecord> for LogResponse {
    fn from(r: LogRecord) -> Self {
        Self {
            id: r.id,
            timestamp: r.timestamp.to_rfc3339(),
            user_input: r.user_input,
            model_input: r.model_input,
        }
    }
}
