use crate::entities::{UserRecord, VisitRecord};

/// One user's stay in the studio, identified by `session_id`.
#[derive(Debug, Clone, PartialEq)]
pub struct StudioVisit {
    pub session_id: String,
    pub user_id: String,
    pub email: String,
}

impl StudioVisit {
    pub fn new(session_id: impl Into<String>, user: &UserRecord) -> Self {
        Self {
            session_id: session_id.into(),
            user_id: user.id.clone(),
            email: user.email.clone(),
        }
    }

    pub fn from_record(record: &VisitRecord, user: &UserRecord) -> Self {
        Self::new(record.id.clone(), user)
    }
}
