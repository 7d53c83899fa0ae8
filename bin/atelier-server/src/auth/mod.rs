//! Credentials: password hashing and token issue/verify.

pub mod jwt;
pub mod password;

pub use jwt::{Claims, TokenError, TokenService};

use chrono::Utc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;
use crate::entities::{SqliteStore, UserRecord, UserRole, UserStore};

/// Create the configured admin account if it does not exist yet.
///
/// Registration itself requires an admin, so a fresh database needs one
/// seeded from the environment.
pub async fn bootstrap_admin(cfg: &Config, store: &SqliteStore) -> anyhow::Result<()> {
    let (Some(email), Some(plain)) = (&cfg.admin_email, &cfg.admin_password) else {
        if store.count_users().await? == 0 {
            warn!("no users exist and no bootstrap admin is configured; registration is unreachable");
        }
        return Ok(());
    };
    if store.find_user_by_email(email).await?.is_some() {
        return Ok(());
    }
    if let Err(reason) = password::check_policy(plain) {
        anyhow::bail!("ATELIER_ADMIN_PASSWORD rejected: {reason}");
    }
    let hashed_password = password::hash_password(plain.clone())
        .await
        .map_err(|e| anyhow::anyhow!("{e}"))?;
    store
        .create_user(UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            hashed_password,
            role: UserRole::Admin,
            created_at: Utc::now(),
        })
        .await?;
    info!(email = %email.to_lowercase(), "bootstrap admin created");
    Ok(())
}
