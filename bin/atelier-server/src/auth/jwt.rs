//! Access and refresh tokens.
//!
//! Both kinds carry the same `{sub, role, exp}` claims and are signed with
//! HS256, each with its own secret so a refresh token can never be replayed
//! as an access token.

use chrono::{Duration, TimeDelta, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::Config;
use crate::entities::UserRole;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Lower-cased email of the user.
    pub sub: String,
    pub role: UserRole,
    /// Expiry as a Unix timestamp in seconds.
    pub exp: i64,
}

#[derive(Debug, Error, PartialEq)]
pub enum TokenError {
    #[error("Signature has expired")]
    Expired,
    #[error("{0}")]
    Invalid(String),
}

impl From<jsonwebtoken::errors::Error> for TokenError {
    fn from(e: jsonwebtoken::errors::Error) -> Self {
        match e.kind() {
            ErrorKind::ExpiredSignature => TokenError::Expired,
            _ => TokenError::Invalid(e.to_string()),
        }
    }
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &str) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret.as_bytes()),
            decoding: DecodingKey::from_secret(secret.as_bytes()),
        }
    }
}

pub struct TokenService {
    access: KeyPair,
    refresh: KeyPair,
    access_ttl: Duration,
    refresh_ttl: Duration,
    validation: Validation,
}

impl std::fmt::Debug for TokenService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenService")
            .field("access_ttl", &self.access_ttl)
            .field("refresh_ttl", &self.refresh_ttl)
            .finish_non_exhaustive()
    }
}

impl TokenService {
    pub fn new(access_secret: &str, refresh_secret: &str, access_ttl: Duration, refresh_ttl: Duration) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub"]);
        Self {
            access: KeyPair::from_secret(access_secret),
            refresh: KeyPair::from_secret(refresh_secret),
            access_ttl,
            refresh_ttl,
            validation,
        }
    }

    pub fn from_config(cfg: &Config) -> Result<Self, TokenError> {
        let (access_ttl, refresh_ttl) =
            lifetimes(cfg.access_token_expire_minutes, cfg.refresh_token_expire_days)
                .ok_or_else(|| TokenError::Invalid("token lifetime out of range".into()))?;
        Ok(Self::new(&cfg.secret_key, &cfg.refresh_secret_key, access_ttl, refresh_ttl))
    }

    pub fn refresh_ttl(&self) -> Duration {
        self.refresh_ttl
    }

    pub fn issue_access(&self, email: &str, role: UserRole) -> Result<String, TokenError> {
        sign(&self.access, email, role, self.access_ttl)
    }

    pub fn issue_refresh(&self, email: &str, role: UserRole) -> Result<String, TokenError> {
        sign(&self.refresh, email, role, self.refresh_ttl)
    }

    pub fn verify_access(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.access, token)
    }

    pub fn verify_refresh(&self, token: &str) -> Result<Claims, TokenError> {
        self.verify(&self.refresh, token)
    }

    fn verify(&self, keys: &KeyPair, token: &str) -> Result<Claims, TokenError> {
        let data = jsonwebtoken::decode::<Claims>(token, &keys.decoding, &self.validation)?;
        if data.claims.sub.is_empty() {
            return Err(TokenError::Invalid("Invalid token".into()));
        }
        Ok(data.claims)
    }
}

/// Access and refresh lifetimes, or `None` when either cannot be added to the
/// current time without overflowing.
pub fn lifetimes(access_minutes: i64, refresh_days: i64) -> Option<(Duration, Duration)> {
    let access = TimeDelta::try_minutes(access_minutes)?;
    let refresh = TimeDelta::try_days(refresh_days)?;
    let now = Utc::now();
    now.checked_add_signed(access)?;
    now.checked_add_signed(refresh)?;
    Some((access, refresh))
}

fn sign(keys: &KeyPair, email: &str, role: UserRole, ttl: Duration) -> Result<String, TokenError> {
    let exp = Utc::now()
        .checked_add_signed(ttl)
        .ok_or_else(|| TokenError::Invalid("token lifetime out of range".into()))?;
    let claims = Claims {
        sub: email.to_owned(),
        role,
        exp: exp.timestamp(),
    };
    Ok(jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &keys.encoding)?)
}
