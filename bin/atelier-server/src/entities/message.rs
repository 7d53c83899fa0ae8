use std::future::Future;

use crate::entities::{decode_ts, encode_ts, dao::MessageRecord, SqliteStore};

type MessageRow = (String, String, Option<String>, String, String, Option<String>, String);

pub trait MessageStore: Send + Sync + 'static {
    /// Insert all `messages` in one transaction, in order.
    fn append_messages(
        &self,
        messages: Vec<MessageRecord>,
    ) -> impl Future<Output = Result<(), sqlx::Error>> + Send;

    /// The latest `n` messages of `user_id`, returned oldest first.
    fn recent_messages(
        &self,
        user_id: &str,
        n: i64,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, sqlx::Error>> + Send;

    /// The latest `limit` messages of `user_id` (optionally restricted to one
    /// visit), returned oldest first.
    fn list_messages(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: i64,
    ) -> impl Future<Output = Result<Vec<MessageRecord>, sqlx::Error>> + Send;

    /// Returns the number of rows removed.
    fn delete_user_messages(&self, user_id: &str) -> impl Future<Output = Result<u64, sqlx::Error>> + Send;
}

fn from_row(
    (id, user_id, session_id, role, content, image_filename, timestamp): MessageRow,
) -> MessageRecord {
    MessageRecord {
        id,
        user_id,
        session_id,
        role,
        content,
        image_filename,
        timestamp: decode_ts(&timestamp, "messages.timestamp"),
    }
}

/// Rows come back newest first; flip them to chronological order.
fn chronological(rows: Vec<MessageRow>) -> Vec<MessageRecord> {
    rows.into_iter().rev().map(from_row).collect()
}

impl MessageStore for SqliteStore {
    async fn append_messages(&self, messages: Vec<MessageRecord>) -> Result<(), sqlx::Error> {
        let mut tx = self.pool.begin().await?;
        for msg in &messages {
            sqlx::query(
                "INSERT INTO messages (id, user_id, session_id, role, content, image_filename, timestamp) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )
            .bind(&msg.id)
            .bind(&msg.user_id)
            .bind(&msg.session_id)
            .bind(&msg.role)
            .bind(&msg.content)
            .bind(&msg.image_filename)
            .bind(encode_ts(msg.timestamp))
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        Ok(())
    }

    async fn recent_messages(&self, user_id: &str, n: i64) -> Result<Vec<MessageRecord>, sqlx::Error> {
        if n <= 0 {
            return Ok(Vec::new());
        }
        self.list_messages(user_id, None, n).await
    }

    async fn list_messages(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        limit: i64,
    ) -> Result<Vec<MessageRecord>, sqlx::Error> {
        // rowid breaks ties between messages written in the same microsecond.
        let rows: Vec<MessageRow> = if let Some(session_id) = session_id {
            sqlx::query_as(
                "SELECT id, user_id, session_id, role, content, image_filename, timestamp \
                 FROM messages WHERE user_id = ?1 AND session_id = ?2 \
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?3",
            )
            .bind(user_id)
            .bind(session_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        } else {
            sqlx::query_as(
                "SELECT id, user_id, session_id, role, content, image_filename, timestamp \
                 FROM messages WHERE user_id = ?1 \
                 ORDER BY timestamp DESC, rowid DESC LIMIT ?2",
            )
            .bind(user_id)
            .bind(limit)
            .fetch_all(&self.pool)
            .await?
        };
        Ok(chronological(rows))
    }

    async fn delete_user_messages(&self, user_id: &str) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM messages WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected())
    }
}
