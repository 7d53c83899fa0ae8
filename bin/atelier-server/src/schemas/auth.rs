use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Form body of `POST /auth/register`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct RegisterForm {
    /// Email address of the new user.
    #[schema(example = "test@example.com")]
    pub username: String,
    #[schema(example = "Password123")]
    pub password: String,
}

/// OAuth2 password-grant form of `POST /auth/login`.
#[derive(Debug, Clone, Deserialize, ToSchema)]
pub struct LoginForm {
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub grant_type: Option<String>,
    #[serde(default)]
    pub scope: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct TokenResponse {
    pub access_token: String,
    /// Always `"bearer"`.
    pub token_type: String,
}

impl TokenResponse {
    pub fn bearer(access_token: String) -> Self {
        Self {
            access_token,
            token_type: "bearer".to_owned(),
        }
    }
}
