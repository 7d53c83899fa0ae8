use std::future::Future;

use chrono::Utc;
use uuid::Uuid;

use crate::entities::{decode_ts, encode_ts, dao::VisitRecord, SqliteStore};

type VisitRow = (String, String, String, Option<String>);

pub trait VisitStore: Send + Sync + 'static {
    /// The user's open visit, if any.
    fn open_visit(&self, user_id: &str) -> impl Future<Output = Result<Option<VisitRecord>, sqlx::Error>> + Send;

    /// Return the open visit, starting one if none exists.
    ///
    /// Concurrent callers for the same user all observe the same visit.
    fn start_visit(&self, user_id: &str) -> impl Future<Output = Result<VisitRecord, sqlx::Error>> + Send;

    /// Close the user's open visit. Fails with [`sqlx::Error::RowNotFound`]
    /// when there is none.
    fn finish_visit(&self, user_id: &str) -> impl Future<Output = Result<VisitRecord, sqlx::Error>> + Send;
}

fn from_row((id, user_id, started_at, finished_at): VisitRow) -> VisitRecord {
    VisitRecord {
        id,
        user_id,
        started_at: decode_ts(&started_at, "sessions.started_at"),
        finished_at: finished_at.map(|raw| decode_ts(&raw, "sessions.finished_at")),
    }
}

impl VisitStore for SqliteStore {
    async fn open_visit(&self, user_id: &str) -> Result<Option<VisitRecord>, sqlx::Error> {
        let row: Option<VisitRow> = sqlx::query_as(
            "SELECT id, user_id, started_at, finished_at FROM sessions \
             WHERE user_id = ?1 AND finished_at IS NULL",
        )
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn start_visit(&self, user_id: &str) -> Result<VisitRecord, sqlx::Error> {
        // idx_sessions_one_open turns a racing second insert into a no-op.
        sqlx::query(
            "INSERT OR IGNORE INTO sessions (id, user_id, started_at, finished_at) \
             VALUES (?1, ?2, ?3, NULL)",
        )
        .bind(Uuid::new_v4().to_string())
        .bind(user_id)
        .bind(encode_ts(Utc::now()))
        .execute(&self.pool)
        .await?;

        self.open_visit(user_id)
            .await?
            .ok_or(sqlx::Error::RowNotFound)
    }

    async fn finish_visit(&self, user_id: &str) -> Result<VisitRecord, sqlx::Error> {
        let now = Utc::now();
        let row: Option<VisitRow> = sqlx::query_as(
            "UPDATE sessions SET finished_at = ?1 \
             WHERE user_id = ?2 AND finished_at IS NULL \
             RETURNING id, user_id, started_at, finished_at",
        )
        .bind(encode_ts(now))
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await?;
        row.map(from_row).ok_or(sqlx::Error::RowNotFound)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::entities::user::test_user;
    use crate::entities::{UserRole, UserStore};

    async fn store_with_user() -> (SqliteStore, String) {
        let store = SqliteStore::in_memory().await.expect("store");
        let user = test_user("v@example.com", UserRole::User);
        store.create_user(user.clone()).await.expect("user");
        (store, user.id)
    }

    #[tokio::test]
    async fn start_visit_is_idempotent_while_open() {
        let (store, uid) = store_with_user().await;
        let first = store.start_visit(&uid).await.expect("start");
        let second = store.start_visit(&uid).await.expect("start again");
        assert_eq!(first.id, second.id);
        assert!(second.finished_at.is_none());
    }

    #[tokio::test]
    async fn finish_then_start_opens_a_new_visit() {
        let (store, uid) = store_with_user().await;
        let first = store.start_visit(&uid).await.expect("start");
        let finished = store.finish_visit(&uid).await.expect("finish");
        assert_eq!(finished.id, first.id);
        assert!(finished.finished_at.is_some());
        assert!(store.open_visit(&uid).await.expect("query").is_none());

        let next = store.start_visit(&uid).await.expect("restart");
        assert_ne!(next.id, first.id);
    }

    #[tokio::test]
    async fn finish_without_open_visit_is_row_not_found() {
        let (store, uid) = store_with_user().await;
        let err = store.finish_visit(&uid).await.expect_err("nothing open");
        assert!(matches!(err, sqlx::Error::RowNotFound));
    }
}
