use thiserror::Error;

#[derive(Error, Debug)]
pub enum AgentError {
    #[error("Tool provider unreachable: {0}")]
    ProviderUnreachable(String),

    #[error("Tool discovery failed: {0}")]
    DiscoveryFailed(String),

    #[error("Tool execution failed for '{tool}': {message}")]
    ToolError { tool: String, message: String },

    #[error("Rate limit exceeded: {0}")]
    RateLimitError(String),

    #[error("Stream transport error: {0}")]
    StreamError(String),

    #[error("{0}")]
    InvalidCount(String),

    #[error("{0}")]
    InvalidOffset(String),

    #[error("LLM error: {0}")]
    LlmError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, AgentError>;
