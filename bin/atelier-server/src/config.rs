//! Server configuration, loaded from environment variables at startup.
//!
//! Before reading the environment, [`load_dotenv`] layers
//! `.env.{ATELIER_ENV}` over `.env`. Variables already present in the process
//! environment always take precedence over both files.

use std::path::PathBuf;

use anyhow::bail;

/// Runtime configuration for atelier-server.
///
/// Everything except the two token secrets has a default.
#[derive(Debug, Clone)]
pub struct Config {
    /// Deployment environment name (default: `"development"`).
    pub environment: String,

    /// TCP address to bind (default: `"0.0.0.0:8000"`).
    pub bind_address: String,

    /// sqlx SQLite URL (default: `"sqlite://atelier.db"`).
    pub database_url: String,

    /// `tracing` filter string, e.g. `"info"` or `"debug,tower_http=warn"`.
    pub log_level: String,

    /// When `true`, emit log records as newline-delimited JSON.
    pub log_json: bool,

    /// Write logs to a daily-rolling file in this directory instead of stdout.
    pub log_dir: Option<PathBuf>,

    /// Comma-separated list of origins allowed to make credentialed requests.
    pub cors_allowed_origins: Option<String>,

    /// Serve Swagger UI and the OpenAPI document.
    pub enable_swagger: bool,

    /// HS256 secret for access tokens.
    pub secret_key: String,

    /// HS256 secret for refresh tokens; must differ from `secret_key`.
    pub refresh_secret_key: String,

    pub access_token_expire_minutes: i64,
    pub refresh_token_expire_days: i64,

    /// Root directory for uploaded images.
    pub uploads_dir: PathBuf,

    /// Root directory for the per-day responder interaction logs.
    pub interaction_log_dir: PathBuf,

    /// Hosted model endpoint (OpenAI-compatible, including `/v1`).
    pub openai_base_url: String,
    pub openai_api_key: Option<String>,
    pub openai_org_id: Option<String>,

    /// Model used by the studio agents.
    pub agent_model: String,

    /// Model used by `POST /transcribe`.
    pub transcribe_model: String,

    /// Local OpenAI-compatible completion endpoint; `None` disables the
    /// local responder.
    pub local_model_url: Option<String>,
    pub local_model_name: String,

    pub llm_timeout_secs: u64,

    /// Number of previous messages sent with each chat prompt.
    pub history_window: i64,

    /// Maximum messages returned by `GET /history/`.
    pub history_limit: i64,

    /// JSON file of `[{"id": ..., "content": ...}]` upserted at startup.
    pub rag_seed_path: Option<PathBuf>,
    pub rag_top_k: usize,

    /// System prompt of the legacy responder.
    pub responder_persona: Option<String>,

    /// Admin account created at startup if it does not exist.
    pub admin_email: Option<String>,
    pub admin_password: Option<String>,
}

impl Config {
    /// Build [`Config`] from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self {
            environment: env_or("ATELIER_ENV", "development"),
            bind_address: env_or("ATELIER_BIND", "0.0.0.0:8000"),
            database_url: env_or("ATELIER_DATABASE_URL", "sqlite://atelier.db"),
            log_level: env_or("ATELIER_LOG", "info"),
            log_json: env_flag("ATELIER_LOG_JSON", false),
            log_dir: env_opt("ATELIER_LOG_DIR").map(PathBuf::from),
            cors_allowed_origins: Some(env_or("ATELIER_CORS_ORIGINS", "http://localhost:3000")),
            enable_swagger: env_flag("ATELIER_ENABLE_SWAGGER", true),
            secret_key: env_or("SECRET_KEY", ""),
            refresh_secret_key: env_or("REFRESH_SECRET_KEY", ""),
            access_token_expire_minutes: parse_env("ACCESS_TOKEN_EXPIRE_MINUTES", 30),
            refresh_token_expire_days: parse_env("REFRESH_TOKEN_EXPIRE_DAYS", 1),
            uploads_dir: PathBuf::from(env_or("ATELIER_UPLOADS_DIR", "uploads")),
            interaction_log_dir: PathBuf::from(env_or("ATELIER_INTERACTION_LOG_DIR", "logs")),
            openai_base_url: env_or("OPENAI_BASE_URL", "https://api.openai.com/v1"),
            openai_api_key: env_opt("OPENAI_API_KEY"),
            openai_org_id: env_opt("OPENAI_ORG_ID"),
            agent_model: env_or("ATELIER_AGENT_MODEL", "gpt-4.1"),
            transcribe_model: env_or("ATELIER_TRANSCRIBE_MODEL", "whisper-1"),
            local_model_url: env_opt("ATELIER_LOCAL_MODEL_URL"),
            local_model_name: env_or("ATELIER_LOCAL_MODEL_NAME", "local"),
            llm_timeout_secs: parse_env("ATELIER_LLM_TIMEOUT_SECS", 120),
            history_window: parse_env("ATELIER_HISTORY_WINDOW", 5),
            history_limit: parse_env("ATELIER_HISTORY_LIMIT", 100),
            rag_seed_path: env_opt("ATELIER_RAG_SEED").map(PathBuf::from),
            rag_top_k: parse_env("ATELIER_RAG_TOP_K", 2),
            responder_persona: env_opt("ATELIER_RESPONDER_PERSONA"),
            admin_email: env_opt("ATELIER_ADMIN_EMAIL"),
            admin_password: env_opt("ATELIER_ADMIN_PASSWORD"),
        }
    }

    /// Reject configurations the server cannot run with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.secret_key.is_empty() || self.refresh_secret_key.is_empty() {
            bail!("SECRET_KEY and REFRESH_SECRET_KEY must be set in the environment");
        }
        if self.secret_key == self.refresh_secret_key {
            bail!("SECRET_KEY and REFRESH_SECRET_KEY must differ");
        }
        if self.access_token_expire_minutes <= 0 || self.refresh_token_expire_days <= 0 {
            bail!("token lifetimes must be positive");
        }
        if crate::auth::jwt::lifetimes(self.access_token_expire_minutes, self.refresh_token_expire_days).is_none() {
            bail!("ACCESS_TOKEN_EXPIRE_MINUTES or REFRESH_TOKEN_EXPIRE_DAYS is too large");
        }
        if self.history_window < 0 || self.history_limit <= 0 {
            bail!("ATELIER_HISTORY_WINDOW must be >= 0 and ATELIER_HISTORY_LIMIT > 0");
        }
        Ok(())
    }
}

/// Load `.env.{ATELIER_ENV}` then `.env` from the working directory.
///
/// Returns the files that were found, for logging once tracing is up.
pub fn load_dotenv() -> Vec<PathBuf> {
    let mut loaded = Vec::new();

    // The base file may itself define ATELIER_ENV, so peek at it first.
    let environment = std::env::var("ATELIER_ENV").ok().or_else(|| {
        dotenvy::from_filename_iter(".env").ok().and_then(|iter| {
            iter.flatten()
                .find(|(k, _)| k == "ATELIER_ENV")
                .map(|(_, v)| v)
        })
    });
    let environment = environment.unwrap_or_else(|| "development".to_owned());

    for name in [format!(".env.{environment}"), ".env".to_owned()] {
        if let Ok(path) = dotenvy::from_filename(&name) {
            loaded.push(path);
        }
    }
    loaded
}

// ── private helpers ──────────────────────────────────────────────────────────

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_owned())
}

fn env_opt(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|v| !v.trim().is_empty())
}

fn env_flag(key: &str, default: bool) -> bool {
    std::env::var(key)
        .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
        .unwrap_or(default)
}

fn parse_env<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

#[cfg(test)]
impl Config {
    /// Defaults with test secrets and throwaway directories.
    pub fn for_tests(root: &std::path::Path) -> Self {
        Self {
            environment: "test".into(),
            bind_address: "127.0.0.1:0".into(),
            database_url: "sqlite::memory:".into(),
            log_level: "debug".into(),
            log_json: false,
            log_dir: None,
            cors_allowed_origins: Some("http://localhost:3000".into()),
            enable_swagger: false,
            secret_key: "test-access-secret".into(),
            refresh_secret_key: "test-refresh-secret".into(),
            access_token_expire_minutes: 30,
            refresh_token_expire_days: 1,
            uploads_dir: root.join("uploads"),
            interaction_log_dir: root.join("logs"),
            openai_base_url: "http://127.0.0.1:9/v1".into(),
            openai_api_key: None,
            openai_org_id: None,
            agent_model: "test-model".into(),
            transcribe_model: "whisper-1".into(),
            local_model_url: None,
            local_model_name: "local".into(),
            llm_timeout_secs: 1,
            history_window: 5,
            history_limit: 100,
            rag_seed_path: None,
            rag_top_k: 2,
            responder_persona: None,
            admin_email: None,
            admin_password: None,
        }
    }
}
