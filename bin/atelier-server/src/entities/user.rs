use std::future::Future;
use std::str::FromStr;

use crate::entities::{decode_ts, encode_ts, dao::UserRecord, SqliteStore, UserRole};

type UserRow = (String, String, String, String, String);

pub trait UserStore: Send + Sync + 'static {
    /// Insert a new user. A duplicate email surfaces as a unique-constraint
    /// violation from the database.
    fn create_user(&self, user: UserRecord) -> impl Future<Output = Result<(), sqlx::Error>> + Send;
    fn find_user_by_email(
        &self,
        email: &str,
    ) -> impl Future<Output = Result<Option<UserRecord>, sqlx::Error>> + Send;
    fn count_users(&self) -> impl Future<Output = Result<i64, sqlx::Error>> + Send;
}

fn from_row((id, email, hashed_password, role, created_at): UserRow) -> UserRecord {
    let role = UserRole::from_str(&role).unwrap_or_else(|_| {
        tracing::warn!(user_id = %id, raw = %role, "unknown role in users table; treating as user");
        UserRole::User
    });
    UserRecord {
        id,
        email,
        hashed_password,
        role,
        created_at: decode_ts(&created_at, "users.created_at"),
    }
}

impl UserStore for SqliteStore {
    async fn create_user(&self, user: UserRecord) -> Result<(), sqlx::Error> {
        sqlx::query(
            "INSERT INTO users (id, email, hashed_password, role, created_at) \
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(&user.id)
        .bind(user.email.to_lowercase())
        .bind(&user.hashed_password)
        .bind(user.role.as_ref())
        .bind(encode_ts(user.created_at))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn find_user_by_email(&self, email: &str) -> Result<Option<UserRecord>, sqlx::Error> {
        let row: Option<UserRow> = sqlx::query_as(
            "SELECT id, email, hashed_password, role, created_at FROM users WHERE email = ?1",
        )
        .bind(email.to_lowercase())
        .fetch_optional(&self.pool)
        .await?;
        Ok(row.map(from_row))
    }

    async fn count_users(&self) -> Result<i64, sqlx::Error> {
        let (n,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM users")
            .fetch_one(&self.pool)
            .await?;
        Ok(n)
    }
}

/// `true` when `err` is a UNIQUE constraint violation.
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db) if db.is_unique_violation())
}

#[cfg(test)]
pub(crate) fn test_user(email: &str, role: UserRole) -> UserRecord {
    UserRecord {
        id: uuid::Uuid::new_v4().to_string(),
        email: email.to_owned(),
        hashed_password: "not-a-real-hash".into(),
        role,
        created_at: chrono::Utc::now(),
    }
}
