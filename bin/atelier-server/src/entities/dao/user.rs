use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{AsRefStr, Display, EnumString};

/// Authorization level carried in the `role` column and in token claims.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, Display, EnumString, AsRefStr,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase")]
pub enum UserRole {
    #[default]
    User,
    Admin,
}

/// A row in the `users` table.
#[derive(Debug, Clone)]
pub struct UserRecord {
    pub id: String,
    /// Always stored lower-case.
    pub email: String,
    /// bcrypt hash.
    pub hashed_password: String,
    pub role: UserRole,
    pub created_at: DateTime<Utc>,
}
