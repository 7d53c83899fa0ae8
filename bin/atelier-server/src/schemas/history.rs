use crate::entities::MessageRecord;
use serde::{Deserialize, Serialize};
use utoipa::{IntoParams, ToSchema};

#[derive(Debug, Clone, Default, Deserialize, IntoParams)]
pub struct HistoryQuery {
    /// Only return messages of this visit.
    pub session_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct MessageResponse {
    pub id: String,
    pub user_id: String,
    pub session_id: Option<String>,
    pub role: String,
    pub content: String,
    pub image_filename: Option<String>,
    pub timestamp: String,
}

impl MessageRecord {
    pub fn to_response(&self) -> MessageResponse {
        MessageResponse {
            id: self.id.clone(),
            user_id: self.user_id.clone(),
            session_id: self.session_id.clone(),
            role: self.role.clone(),
            content: self.content.clone(),
            image_filename: self.image_filename.clone(),
            timestamp: self.timestamp.to_rfc3339(),
        }
    }
}
