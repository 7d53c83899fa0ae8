//! Studio domain: live sockets, visits, agents, uploads and transcripts.

pub mod interaction_log;
pub mod knowledge;
pub mod responders;
pub mod service;
pub mod session_manager;
pub mod socket;
pub mod upload;
pub mod visit;
pub mod visit_manager;

pub use interaction_log::InteractionLog;
pub use responders::{ModelType, Responders};
pub use service::Studio;
pub use session_manager::SessionManager;
pub use socket::{SocketHandle, SocketRegistry};
pub use visit::StudioVisit;
pub use visit_manager::VisitManager;

/// Sent after the last chunk of every streamed reply.
pub const END_MARKER: &str = "[END]";
