use crate::studio::StudioVisit;
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct VisitResponse {
    pub visit_id: String,
}

impl StudioVisit {
    pub fn to_response(&self) -> VisitResponse {
        VisitResponse {
            visit_id: self.session_id.clone(),
        }
    }
}
