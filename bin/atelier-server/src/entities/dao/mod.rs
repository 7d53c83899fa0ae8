pub mod log;
pub mod message;
pub mod rag;
pub mod user;
pub mod visit;

pub use log::LogRecord;
pub use message::MessageRecord;
pub use rag::RagDocument;
pub use user::{UserRecord, UserRole};
pub use visit::VisitRecord;
