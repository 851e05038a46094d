//! HTTP transport for MCP tool providers

use async_trait::async_trait;
use opschat_core::{AgentError, Result};
use std::time::Duration;
use tracing::debug;

use crate::types::{JsonRpcRequest, JsonRpcResponse};

/// Request/response transport to a single tool provider
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    /// Send one JSON-RPC request and wait for its response
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse>;

    /// Probe provider liveness
    async fn health(&self) -> Result<()>;
}

/// Transport that POSTs JSON-RPC bodies to a provider URL
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: String,
}

impl HttpTransport {
    pub fn new(base_url: impl Into<String>, timeout_secs: u64) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    fn health_url(&self) -> String {
        format!("{}/health", self.base_url)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn request(&self, request: JsonRpcRequest) -> Result<JsonRpcResponse> {
        debug!("Sending {} request to {}", request.method, self.base_url);

        let response = self
            .client
            .post(&self.base_url)
            .json(&request)
            .send()
            .await
            .map_err(|e| {
                AgentError::ProviderUnreachable(format!(
                    "request to {} failed: {}",
                    self.base_url, e
                ))
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ProviderUnreachable(format!(
                "provider at {} returned HTTP {}",
                self.base_url, status
            )));
        }

        response.json::<JsonRpcResponse>().await.map_err(|e| {
            AgentError::ProviderUnreachable(format!("invalid response from provider: {}", e))
        })
    }

    async fn health(&self) -> Result<()> {
        let url = self.health_url();
        let response = self.client.get(&url).send().await.map_err(|e| {
            AgentError::ProviderUnreachable(format!("health check against {} failed: {}", url, e))
        })?;

        let status = response.status();
        if !status.is_success() {
            return Err(AgentError::ProviderUnreachable(format!(
                "health check failed with status {}",
                status.as_u16()
            )));
        }
        Ok(())
    }
}
