//! Shared application state injected into every Axum handler.

use std::sync::Arc;

use atelier_agent::provider::local::{LocalConfig, LocalProvider};
use atelier_agent::provider::openai::{OpenAiConfig, OpenAiProvider};
use atelier_agent::responder::DEFAULT_PERSONA;
use atelier_agent::{Responder, Retriever, Runner};
use tracing::info;

use crate::auth::TokenService;
use crate::config::Config;
use crate::entities::SqliteStore;
use crate::studio::knowledge::KnowledgeBase;
use crate::studio::{
    InteractionLog, Responders, SessionManager, SocketRegistry, Studio, VisitManager,
};

/// State shared across all HTTP and websocket handlers.
#[derive(Debug)]
pub struct AppState {
    /// Server configuration (env-derived).
    pub config: Arc<Config>,
    pub store: Arc<SqliteStore>,
    pub tokens: TokenService,
    /// Live chat sockets by user id.
    pub sockets: SocketRegistry,
    /// In-memory studio sessions.
    pub sessions: SessionManager,
    /// Durable studio visits.
    pub visits: VisitManager,
    pub studio: Studio,
    pub responders: Responders,
    /// Hosted client used for speech-to-text.
    pub transcriber: OpenAiProvider,
    /// Background context for the responders.
    pub knowledge: Arc<dyn Retriever>,
    pub interaction_log: InteractionLog,
}

impl AppState {
    /// Wire the model layer and managers around an opened store.
    pub fn build(cfg: Config, store: SqliteStore) -> anyhow::Result<Self> {
        let store = Arc::new(store);
        let knowledge: Arc<dyn Retriever> = Arc::new(KnowledgeBase::new(store.clone()));

        let hosted = OpenAiProvider::new(OpenAiConfig {
            base_url: cfg.openai_base_url.clone(),
            api_key: cfg.openai_api_key.clone(),
            organization: cfg.openai_org_id.clone(),
            timeout_secs: cfg.llm_timeout_secs,
        })?;
        if cfg.openai_api_key.is_none() {
            tracing::warn!("OPENAI_API_KEY is not set; hosted model calls will be rejected upstream");
        }
        let hosted_runner = Runner::new(Arc::new(hosted.clone()));

        let persona = cfg.responder_persona.as_deref().unwrap_or(DEFAULT_PERSONA);
        let local = match &cfg.local_model_url {
            Some(url) => {
                let provider = LocalProvider::new(LocalConfig {
                    base_url: url.clone(),
                    model: cfg.local_model_name.clone(),
                    timeout_secs: cfg.llm_timeout_secs,
                })?;
                info!(url = %url, "local model configured");
                Some(Responder::new(
                    Runner::new(Arc::new(provider)),
                    &cfg.local_model_name,
                    persona,
                    knowledge.clone(),
                    cfg.rag_top_k,
                ))
            }
            None => None,
        };
        let responders = Responders {
            local,
            hosted: Responder::new(
                hosted_runner.clone(),
                &cfg.agent_model,
                persona,
                knowledge.clone(),
                cfg.rag_top_k,
            ),
        };

        Ok(Self {
            tokens: TokenService::from_config(&cfg)?,
            sockets: SocketRegistry::new(),
            sessions: SessionManager::new(),
            visits: VisitManager::new(store.clone()),
            studio: Studio::new(hosted_runner, &cfg.agent_model),
            responders,
            transcriber: hosted,
            interaction_log: InteractionLog::new(cfg.interaction_log_dir.clone()),
            knowledge,
            store,
            config: Arc::new(cfg),
        })
    }
}

#[cfg(test)]
pub mod test {
    use super::*;
    use std::sync::Mutex;

    use async_trait::async_trait;
    use atelier_agent::{AgentError, CompletionRequest, ModelProvider, TokenStream};
    use chrono::Utc;
    use uuid::Uuid;

    use crate::entities::{UserRecord, UserRole, UserStore};

    /// Replays a canned reply, word by word when streaming, and records the
    /// last request.
    #[derive(Debug, Default)]
    pub struct ScriptedProvider {
        reply: String,
        fail: bool,
        last: Mutex<Option<CompletionRequest>>,
    }

    impl ScriptedProvider {
        pub fn new(reply: &str) -> Self {
            Self {
                reply: reply.to_owned(),
                ..Self::default()
            }
        }

        pub fn failing() -> Self {
            Self {
                fail: true,
                ..Self::default()
            }
        }

        pub fn last_request(&self) -> Option<CompletionRequest> {
            self.last.lock().unwrap().clone()
        }

        fn record(&self, request: CompletionRequest) -> Result<(), AgentError> {
            *self.last.lock().unwrap() = Some(request);
            if self.fail {
                return Err(AgentError::Status {
                    status: 500,
                    message: "scripted failure".into(),
                });
            }
            Ok(())
        }
    }

    #[async_trait]
    impl ModelProvider for ScriptedProvider {
        fn name(&self) -> &'static str {
            "scripted"
        }

        async fn stream(&self, request: CompletionRequest) -> Result<TokenStream, AgentError> {
            self.record(request)?;
            let chunks: Vec<Result<String, AgentError>> = self
                .reply
                .split_inclusive(' ')
                .map(|s| Ok(s.to_owned()))
                .collect();
            Ok(Box::pin(futures::stream::iter(chunks)))
        }

        async fn complete(&self, request: CompletionRequest) -> Result<String, AgentError> {
            self.record(request)?;
            Ok(self.reply.clone())
        }
    }

    /// App state over an in-memory store with every model replaced by
    /// `provider`.
    pub async fn test_state_with(provider: Arc<ScriptedProvider>) -> Arc<AppState> {
        let root = std::env::temp_dir().join(format!("atelier-test-{}", Uuid::new_v4()));
        let cfg = Config::for_tests(&root);
        let store = SqliteStore::in_memory().await.expect("store");
        let mut state = AppState::build(cfg, store).expect("state");

        let runner = Runner::new(provider);
        state.studio = Studio::new(runner.clone(), "test-model");
        state.responders = Responders {
            local: Some(Responder::new(runner.clone(), "local", DEFAULT_PERSONA, state.knowledge.clone(), 2)),
            hosted: Responder::new(runner, "test-model", DEFAULT_PERSONA, state.knowledge.clone(), 2),
        };
        Arc::new(state)
    }

    pub async fn test_state(reply: &str) -> Arc<AppState> {
        test_state_with(Arc::new(ScriptedProvider::new(reply))).await
    }

    /// Insert a user (password `Password123`) and return it with a fresh
    /// access token.
    pub async fn seed_user(state: &AppState, email: &str, role: UserRole) -> (UserRecord, String) {
        let user = UserRecord {
            id: Uuid::new_v4().to_string(),
            email: email.to_lowercase(),
            hashed_password: crate::auth::password::hash_with_cost("Password123".into(), 4)
                .await
                .expect("hash"),
            role,
            created_at: Utc::now(),
        };
        state.store.create_user(user.clone()).await.expect("user");
        let token = state.tokens.issue_access(&user.email, role).expect("token");
        (user, token)
    }
}
