//! MCP tool provider integration: discovery, namespacing, argument
//! normalization, and rate-limited dispatch across providers.

pub mod catalog;
pub mod client;
pub mod format;
pub mod normalize;
pub mod transport;
pub mod types;

pub use catalog::ToolCatalog;
pub use client::ProviderClient;
pub use format::format_tool_result;
pub use normalize::normalize_arguments;
pub use transport::{HttpTransport, Transport};
pub use types::{
    ContentItem, JsonRpcError, JsonRpcRequest, JsonRpcResponse, ToolCallResult, ToolDescriptor,
};
