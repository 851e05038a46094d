//! Union of all connected tool providers

use std::collections::HashMap;
use std::sync::Arc;

use opschat_core::{AgentError, Result};
use opschat_limits::RateLimiter;
use serde_json::{Map, Value};
use tracing::{info, warn};

use crate::client::ProviderClient;
use crate::types::ToolDescriptor;

/// The full set of tools the model may call, spread across providers.
///
/// Dispatch routes namespaced names to their provider and everything
/// else to the primary. One token bucket gates all invocations.
pub struct ToolCatalog {
    providers: Vec<Arc<ProviderClient>>,
    limiter: RateLimiter,
}

impl ToolCatalog {
    /// Connect and discover against every candidate provider.
    ///
    /// Providers that fail either step are dropped with a warning;
    /// their tools simply never enter the catalog. Zero usable
    /// providers is fatal.
    pub async fn connect(
        candidates: Vec<Arc<ProviderClient>>,
        limiter: RateLimiter,
    ) -> Result<Self> {
        let configured = candidates.len();
        let mut providers = Vec::with_capacity(configured);

        for client in candidates {
            if let Err(e) = client.connect().await {
                warn!("Skipping tool provider '{}': {}", client.id(), e);
                continue;
            }
            if let Err(e) = client.discover_tools().await {
                warn!("Skipping tool provider '{}': {}", client.id(), e);
                continue;
            }
            providers.push(client);
        }

        if providers.is_empty() && configured > 0 {
            return Err(AgentError::ProviderUnreachable(
                "no tool providers could be reached".to_string(),
            ));
        }

        info!(
            "Tool catalog ready with {} of {} providers",
            providers.len(),
            configured
        );
        Ok(Self { providers, limiter })
    }

    /// Every exposed tool, namespaced where applicable
    pub async fn all_tools(&self) -> Result<Vec<ToolDescriptor>> {
        let mut tools = Vec::new();
        for provider in &self.providers {
            tools.extend(provider.discover_tools().await?.iter().cloned());
        }
        Ok(tools)
    }

    /// Ids of the providers that made it into the catalog
    pub fn provider_ids(&self) -> Vec<String> {
        self.providers
            .iter()
            .map(|p| p.id().to_string())
            .collect()
    }

    /// Route one tool invocation to its provider.
    ///
    /// The rate limiter is consulted before anything touches the
    /// network. A denied call reports `RateLimitError` and the
    /// provider never sees it.
    pub async fn dispatch(&self, tool_name: &str, arguments: Map<String, Value>) -> Result<Value> {
        if !self.limiter.allow() {
            warn!("Tool invocation '{}' denied by rate limiter", tool_name);
            return Err(AgentError::RateLimitError(format!(
                "tool invocation '{}' was denied",
                tool_name
            )));
        }

        for provider in &self.providers {
            if provider.handles(tool_name) {
                return provider.invoke(tool_name, arguments).await;
            }
        }

        match self.primary() {
            Some(primary) => primary.invoke(tool_name, arguments).await,
            None => Err(AgentError::ToolError {
                tool: tool_name.to_string(),
                message: "no provider available for this tool".to_string(),
            }),
        }
    }

    /// Per-provider liveness, for the health surface
    pub async fn health_report(&self) -> HashMap<String, bool> {
        let mut report = HashMap::new();
        for provider in &self.providers {
            report.insert(provider.id().to_string(), provider.health_check().await);
        }
        report
    }

    fn primary(&self) -> Option<&Arc<ProviderClient>> {
        self.providers.iter().find(|p| p.is_primary())
    }
}
