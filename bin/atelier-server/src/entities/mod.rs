//! Database abstraction layer.
//!
//! Each entity has its own store trait ([`UserStore`], [`MessageStore`],
//! [`VisitStore`], [`LogStore`], [`RagStore`]) implemented for
//! [`SqliteStore`]. Handlers depend on the concrete store held in
//! [`crate::state::AppState`]; the traits keep the SQL in one place per table.
//!
//! All trait methods use `impl Future` in their signatures so no
//! `async-trait` boxing is needed.
//!
//! Timestamps are stored as fixed-width RFC 3339 UTC strings (microsecond
//! precision, `Z` suffix), so lexical order in SQL is chronological order.

pub mod dao;
pub mod log;
pub mod message;
pub mod rag;
pub mod user;
pub mod visit;

pub use dao::{LogRecord, MessageRecord, RagDocument, UserRecord, UserRole, VisitRecord};

pub use log::LogStore;
pub use message::MessageStore;
pub use rag::RagStore;
pub use user::UserStore;
pub use visit::VisitStore;

use std::str::FromStr;

use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;

#[derive(Clone, Debug)]
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) the SQLite database at `url` and run pending migrations.
    ///
    /// `url` should be a sqlx-compatible SQLite URL, e.g.
    /// `"sqlite://atelier.db"`.
    pub async fn connect(url: &str) -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str(url)?
            .create_if_missing(true)
            .foreign_keys(true);
        let pool = SqlitePoolOptions::new().connect_with(options).await?;
        // Path is resolved relative to CARGO_MANIFEST_DIR at compile time.
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }

    /// A migrated private in-memory database.
    ///
    /// Every pooled connection to `:memory:` would open its own empty
    /// database, so the pool is pinned to one connection that never expires.
    #[cfg(test)]
    pub async fn in_memory() -> Result<Self, sqlx::Error> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);
        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;
        sqlx::migrate!("./migrations").run(&pool).await?;
        Ok(Self { pool })
    }
}

/// Encode a timestamp for storage.
pub(crate) fn encode_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Micros, true)
}

/// Decode a stored timestamp, falling back to now on corrupt rows.
pub(crate) fn decode_ts(raw: &str, column: &'static str) -> DateTime<Utc> {
    raw.parse().unwrap_or_else(|e: chrono::ParseError| {
        tracing::warn!(raw = %raw, column, error = %e, "failed to parse stored timestamp; using now");
        Utc::now()
    })
}
