//! Password policy and bcrypt hashing.
//!
//! bcrypt is deliberately slow, so hashing and verification run on the
//! blocking pool instead of stalling a runtime worker.

use crate::error::ServerError;

pub const BCRYPT_COST: u32 = bcrypt::DEFAULT_COST;

/// Check `password` against the registration policy.
///
/// Rules are checked in a fixed order and the first failure is reported.
pub fn check_policy(password: &str) -> Result<(), &'static str> {
    if password.chars().count() < 8 {
        return Err("Password must be at least 8 characters long");
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        return Err("Password must contain at least one number");
    }
    if !password.chars().any(char::is_uppercase) {
        return Err("Password must contain at least one uppercase letter");
    }
    if !password.chars().any(char::is_lowercase) {
        return Err("Password must contain at least one lowercase letter");
    }
    Ok(())
}

pub async fn hash_password(password: String) -> Result<String, ServerError> {
    hash_with_cost(password, BCRYPT_COST).await
}

pub(crate) async fn hash_with_cost(password: String, cost: u32) -> Result<String, ServerError> {
    tokio::task::spawn_blocking(move || bcrypt::hash(password, cost))
        .await
        .map_err(|e| ServerError::Internal(format!("password hashing task failed: {e}")))?
        .map_err(|e| ServerError::Internal(format!("password hashing failed: {e}")))
}

/// `false` for a wrong password and for an unparseable stored hash.
pub async fn verify_password(password: String, hashed: String) -> bool {
    match tokio::task::spawn_blocking(move || bcrypt::verify(password, &hashed)).await {
        Ok(Ok(ok)) => ok,
        Ok(Err(e)) => {
            tracing::warn!(error = %e, "stored password hash could not be verified");
            false
        }
        Err(e) => {
            tracing::error!(error = %e, "password verification task failed");
            false
        }
    }
}
