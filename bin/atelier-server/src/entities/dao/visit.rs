use chrono::{DateTime, Utc};

/// A row in the `sessions` table: one studio visit of a user.
#[derive(Debug, Clone)]
pub struct VisitRecord {
    pub id: String,
    pub user_id: String,
    pub started_at: DateTime<Utc>,
    /// `None` while the visit is open.
    pub finished_at: Option<DateTime<Utc>>,
}
