//! Client for a single MCP tool provider

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use opschat_core::{AgentError, Result};
use serde_json::{Map, Value};
use tokio::sync::OnceCell;
use tracing::{debug, info};

use crate::normalize::normalize_arguments;
use crate::transport::Transport;
use crate::types::{JsonRpcRequest, ListToolsResult, ToolCallParams, ToolCallResult, ToolDescriptor};

/// One connected tool provider.
///
/// Tools from non-primary providers are namespaced as
/// `<provider>__<tool>` so names stay unique across the catalog. The
/// prefix is stripped again before the wire call.
pub struct ProviderClient {
    id: String,
    primary: bool,
    transport: Arc<dyn Transport>,
    tools: OnceCell<Vec<ToolDescriptor>>,
    request_id: AtomicU64,
}

impl ProviderClient {
    pub fn new(id: impl Into<String>, primary: bool, transport: Arc<dyn Transport>) -> Self {
        Self {
            id: id.into(),
            primary,
            transport,
            tools: OnceCell::new(),
            request_id: AtomicU64::new(1),
        }
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_primary(&self) -> bool {
        self.primary
    }

    /// Whether a namespaced tool name belongs to this provider.
    /// Primary tools carry no prefix, so the primary never matches.
    pub fn handles(&self, tool_name: &str) -> bool {
        if self.primary {
            return false;
        }
        tool_name
            .strip_prefix(&self.namespace_prefix())
            .is_some_and(|rest| !rest.is_empty())
    }

    fn namespace_prefix(&self) -> String {
        format!("{}__", self.id)
    }

    fn next_request_id(&self) -> String {
        self.request_id.fetch_add(1, Ordering::SeqCst).to_string()
    }

    /// Verify the provider is reachable before it joins the catalog
    pub async fn connect(&self) -> Result<()> {
        self.transport.health().await.map_err(|e| {
            AgentError::ProviderUnreachable(format!("provider '{}': {}", self.id, source_message(e)))
        })?;
        info!("Connected to tool provider '{}'", self.id);
        Ok(())
    }

    /// Probe liveness without failing the caller
    pub async fn health_check(&self) -> bool {
        self.transport.health().await.is_ok()
    }

    /// Fetch the provider's tool list, namespacing names for
    /// non-primary providers.
    ///
    /// The first successful listing is cached for the life of the
    /// client; a failed listing leaves the cache empty so the next
    /// call retries.
    pub async fn discover_tools(&self) -> Result<&[ToolDescriptor]> {
        let tools = self
            .tools
            .get_or_try_init(|| async {
                let request = JsonRpcRequest::new(self.next_request_id(), "tools/list", None);
                let response = self.transport.request(request).await.map_err(|e| {
                    AgentError::DiscoveryFailed(format!(
                        "provider '{}': {}",
                        self.id,
                        source_message(e)
                    ))
                })?;

                if let Some(error) = response.error {
                    return Err(AgentError::DiscoveryFailed(format!(
                        "provider '{}': {}",
                        self.id, error.message
                    )));
                }

                let result = response.result.ok_or_else(|| {
                    AgentError::DiscoveryFailed(format!(
                        "provider '{}' returned no tool list",
                        self.id
                    ))
                })?;

                let list: ListToolsResult = serde_json::from_value(result).map_err(|e| {
                    AgentError::DiscoveryFailed(format!(
                        "provider '{}': invalid tool list: {}",
                        self.id, e
                    ))
                })?;

                let mut tools = list.tools;
                if !self.primary {
                    let prefix = self.namespace_prefix();
                    for tool in &mut tools {
                        tool.name = format!("{}{}", prefix, tool.name);
                    }
                }

                info!(
                    "Discovered {} tools from provider '{}'",
                    tools.len(),
                    self.id
                );
                Ok(tools)
            })
            .await?;
        Ok(tools.as_slice())
    }

    /// Invoke a tool and return the first content block of its result.
    ///
    /// `text` blocks come back as a JSON string, anything else as its
    /// structured data.
    pub async fn invoke(&self, name: &str, arguments: Map<String, Value>) -> Result<Value> {
        let call_name = if self.primary {
            name
        } else {
            name.strip_prefix(&self.namespace_prefix()).unwrap_or(name)
        };

        let normalized = normalize_arguments(call_name, arguments, self.primary);
        debug!("Invoking tool '{}' on provider '{}'", call_name, self.id);

        let params = ToolCallParams {
            name: call_name.to_string(),
            arguments: Value::Object(normalized),
        };
        let request = JsonRpcRequest::new(
            self.next_request_id(),
            "tools/call",
            Some(serde_json::to_value(&params)?),
        );

        let response = self
            .transport
            .request(request)
            .await
            .map_err(|e| AgentError::ToolError {
                tool: name.to_string(),
                message: source_message(e),
            })?;

        if let Some(error) = response.error {
            return Err(AgentError::ToolError {
                tool: name.to_string(),
                message: error.message,
            });
        }

        let no_content = || AgentError::ToolError {
            tool: name.to_string(),
            message: "tool returned no content".to_string(),
        };

        let result = response.result.ok_or_else(no_content)?;
        let call_result: ToolCallResult =
            serde_json::from_value(result).map_err(|e| AgentError::ToolError {
                tool: name.to_string(),
                message: format!("failed to parse tool response: {}", e),
            })?;

        call_result
            .content
            .into_iter()
            .next()
            .map(|item| item.into_value())
            .ok_or_else(no_content)
    }
}

/// Strip the transport's own error prefix so callers can add theirs
fn source_message(error: AgentError) -> String {
    match error {
        AgentError::ProviderUnreachable(message) => message,
        other => other.to_string(),
    }
}
