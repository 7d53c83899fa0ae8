use thiserror::Error;

/// Errors raised while talking to a model backend.
#[derive(Debug, Error)]
pub enum AgentError {
    #[error("failed to build HTTP client")]
    Client {
        #[source]
        source: reqwest::Error,
    },

    #[error("request to {endpoint} failed")]
    Request {
        endpoint: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("provider returned HTTP {status}: {message}")]
    Status { status: u16, message: String },

    #[error("malformed provider payload: {0}")]
    Decode(String),

    #[error("provider returned no content")]
    EmptyResponse,

    #[error("structured output did not match the expected schema")]
    Schema {
        #[source]
        source: serde_json::Error,
    },

    #[error("{provider} does not support {feature}")]
    Unsupported {
        provider: &'static str,
        feature: &'static str,
    },

    #[error("stream interrupted: {0}")]
    Stream(String),

    #[error("retrieval failed: {0}")]
    Retrieval(String),
}

impl AgentError {
    /// `true` when the failure is caused by the caller's input rather than the
    /// backend (the server maps these to 4xx).
    pub fn is_caller_error(&self) -> bool {
        matches!(self, AgentError::Unsupported { .. })
    }
}
