//! Shared types for the opschat agent core: the error taxonomy, chat
//! message/request types, and the normalized stream chunk model.

pub mod chunk;
pub mod error;
pub mod types;

pub use chunk::StreamChunk;
pub use error::{AgentError, Result};
pub use types::{ChatMessage, ChatRequest, ChatResponse, DashboardContext, Role, TimeRange};
