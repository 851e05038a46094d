//! Completion client for any OpenAI-compatible endpoint

use async_trait::async_trait;
use futures::stream::BoxStream;
use futures::StreamExt;
use opschat_core::{AgentError, Result};
use reqwest_eventsource::{Event, RequestBuilderExt};
use std::time::Duration;
use tracing::debug;

use crate::wire::{
    ChatCompletionChunk, ChatCompletionRequest, ChatCompletionResponse, ToolSpec, WireMessage,
};

/// Incremental completion events, terminated by the provider
pub type DeltaStream = BoxStream<'static, Result<ChatCompletionChunk>>;

/// Seam between the orchestrator and the completion backend
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait CompletionProvider: Send + Sync {
    /// One-shot completion, returns the assistant text
    async fn chat(&self, messages: Vec<WireMessage>, tools: Vec<ToolSpec>) -> Result<String>;

    /// Streaming completion
    async fn stream_chat(
        &self,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSpec>,
    ) -> Result<DeltaStream>;
}

pub struct LlmClient {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    model: String,
    temperature: f32,
}

impl LlmClient {
    pub fn new(
        base_url: impl Into<String>,
        api_key: impl Into<String>,
        model: impl Into<String>,
        temperature: f32,
        timeout_secs: u64,
    ) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()
            .map_err(|e| AgentError::ConfigError(format!("failed to build HTTP client: {}", e)))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: api_key.into(),
            model: model.into(),
            temperature,
        })
    }

    fn endpoint(&self) -> String {
        format!("{}/v1/chat/completions", self.base_url)
    }

    fn request_body(
        &self,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSpec>,
        stream: bool,
    ) -> ChatCompletionRequest {
        ChatCompletionRequest {
            model: self.model.clone(),
            messages,
            stream,
            temperature: Some(self.temperature),
            tools: if tools.is_empty() { None } else { Some(tools) },
        }
    }
}

#[async_trait]
impl CompletionProvider for LlmClient {
    async fn chat(&self, messages: Vec<WireMessage>, tools: Vec<ToolSpec>) -> Result<String> {
        let body = self.request_body(messages, tools, false);
        let response = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| AgentError::LlmError(format!("completion request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let detail = response.text().await.unwrap_or_default();
            return Err(AgentError::LlmError(format!(
                "completion returned HTTP {}: {}",
                status, detail
            )));
        }

        let completion: ChatCompletionResponse = response
            .json()
            .await
            .map_err(|e| AgentError::LlmError(format!("invalid completion response: {}", e)))?;

        completion
            .choices
            .into_iter()
            .next()
            .map(|choice| choice.message.content)
            .ok_or_else(|| AgentError::LlmError("completion returned no choices".to_string()))
    }

    /// Open a streaming completion and adapt its SSE events.
    ///
    /// The `[DONE]` sentinel ends the stream; unparseable payloads are
    /// skipped; a transport failure is yielded once and ends it.
    async fn stream_chat(
        &self,
        messages: Vec<WireMessage>,
        tools: Vec<ToolSpec>,
    ) -> Result<DeltaStream> {
        let body = self.request_body(messages, tools, true);
        let builder = self
            .client
            .post(self.endpoint())
            .bearer_auth(&self.api_key)
            .json(&body);

        let mut source = builder.eventsource().map_err(|e| {
            AgentError::StreamError(format!("failed to open completion stream: {}", e))
        })?;

        let stream = async_stream::stream! {
            while let Some(event) = source.next().await {
                match event {
                    Ok(Event::Open) => debug!("Completion stream opened"),
                    Ok(Event::Message(message)) => {
                        if message.data == "[DONE]" {
                            source.close();
                            break;
                        }
                        match serde_json::from_str::<ChatCompletionChunk>(&message.data) {
                            Ok(chunk) => yield Ok(chunk),
                            Err(e) => {
                                debug!("Skipping unparseable stream payload: {}", e);
                            }
                        }
                    }
                    Err(reqwest_eventsource::Error::StreamEnded) => break,
                    Err(e) => {
                        yield Err(AgentError::StreamError(e.to_string()));
                        source.close();
                        break;
                    }
                }
            }
        };
        Ok(Box::pin(stream))
    }
}
