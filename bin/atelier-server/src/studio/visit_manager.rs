//! Durable studio visits backed by the `sessions` table.

use std::sync::Arc;

use tracing::info;

use super::visit::StudioVisit;
use crate::entities::{SqliteStore, UserRecord, VisitStore};

#[derive(Debug, Clone)]
pub struct VisitManager {
    store: Arc<SqliteStore>,
}

impl VisitManager {
    pub fn new(store: Arc<SqliteStore>) -> Self {
        Self { store }
    }

    /// The user's open visit, started if there is none.
    pub async fn get_or_start(&self, user: &UserRecord) -> Result<StudioVisit, sqlx::Error> {
        let record = match self.store.open_visit(&user.id).await? {
            Some(open) => open,
            None => self.store.start_visit(&user.id).await?,
        };
        Ok(StudioVisit::from_record(&record, user))
    }

    /// Finish the open visit (if any) and start a new one.
    pub async fn reset(&self, user: &UserRecord) -> Result<StudioVisit, sqlx::Error> {
        if self.store.open_visit(&user.id).await?.is_some() {
            let finished = self.store.finish_visit(&user.id).await?;
            info!(user_id = %user.id, visit_id = %finished.id, "visit finished");
        }
        let record = self.store.start_visit(&user.id).await?;
        info!(user_id = %user.id, visit_id = %record.id, "visit started");
        Ok(StudioVisit::from_record(&record, user))
    }
}
