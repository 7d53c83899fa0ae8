//! atelier-agent – model invocation layer.
//!
//! Everything the server needs from a language model goes through this crate:
//!
//! - [`provider`]: the [`ModelProvider`] trait plus the hosted
//!   ([`provider::openai::OpenAiProvider`]) and local
//!   ([`provider::local::LocalProvider`]) implementations.
//! - [`agent`]: named instruction sets ([`Agent`]) and the built-in studio agents.
//! - [`runner`]: drives an agent against a provider, streamed, buffered or
//!   structured.
//! - [`rag`]: the [`Retriever`] seam the responder pulls background
//!   context through.
//! - [`responder`]: persona + retrieval prompt assembly for the responder
//!   endpoints.

pub mod agent;
pub mod error;
pub mod provider;
pub mod rag;
pub mod responder;
pub mod runner;
pub mod types;

pub use agent::Agent;
pub use error::AgentError;
pub use provider::{CompletionRequest, ModelProvider, ResponseSchema, Sampling, TokenStream};
pub use rag::{RagHit, Retriever};
pub use responder::Responder;
pub use runner::Runner;
pub use types::{CanvasLines, ContentPart, InputItem, Line, Role};
