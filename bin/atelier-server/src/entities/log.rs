use std::future::Future;

use crate::entities::{decode_ts, encode_ts, dao::LogRecord, SqliteStore};

pub trait LogStore: Send + Sync + 'static {
    fn insert_log(&self, record: LogRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    /// Newest first.
    fn list_logs(&self, limit: i64) -> impl Future<Output = Result<Vec<LogRecord>, sqlx::Error>> + Send;
}

impl LogStore for SqliteStore {
    async fn insert_log(&self, record: LogRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO db_logs (id, timestamp, user_input, model_input) VALUES (?1, ?2, ?3, ?4)",
        )
        .bind(&record.id)
        .bind(encode_ts(record.timestamp))
        .bind(&record.user_input)
        .bind(&record.model_input)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn list_logs(&self, limit: i64) -> Result<Vec<LogRecord>, sqlx::Error> {
        let rows: Vec<(String, String, String, String)> = sqlx::query_as(
            "SELECT id, timestamp, user_input, model_input FROM db_logs \
             ORDER BY timestamp DESC, rowid DESC LIMIT ?1",
        )
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;
        Ok(rows
            .into_iter()
            .map(|(id, timestamp, user_input, model_input)| LogRecord {
                id,
                timestamp: decode_ts(&timestamp, "db_logs.timestamp"),
                user_input,
                model_input,
            })
            .collect())
    }
}
