//! Turn coordination
//!
//! One `AgentManager` owns the completion backend, the tool catalog,
//! and every session's memory. Each chat turn renders memory into a
//! message list, runs the streaming pipeline on its own task, and
//! writes the assistant's text back when the turn settles.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use opschat_config::{MemorySettings, Settings};
use opschat_core::{ChatRequest, ChatResponse, Result, Role, StreamChunk};
use opschat_limits::RateLimiter;
use opschat_llm::{
    run_turn, CompletionProvider, LlmClient, ToolDispatcher, ToolSpec, WireMessage, CHUNK_BUFFER,
};
use opschat_mcp::{format_tool_result, HttpTransport, ProviderClient, ToolCatalog};
use opschat_session::{SessionMemory, SessionStore};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::info;
use uuid::Uuid;

pub mod prompts;

pub use prompts::build_system_prompt;

pub struct AgentManager {
    llm: Arc<dyn CompletionProvider>,
    catalog: Arc<ToolCatalog>,
    sessions: SessionStore,
    system_prompt: String,
    tool_specs: Vec<ToolSpec>,
}

impl AgentManager {
    /// Connect to the completion backend and every configured tool
    /// provider, then assemble the manager around whatever connected.
    pub async fn new(settings: &Settings) -> Result<Self> {
        let llm: Arc<dyn CompletionProvider> = Arc::new(LlmClient::new(
            &settings.llm.base_url,
            &settings.llm.api_key,
            &settings.llm.model,
            settings.llm.temperature,
            settings.llm.timeout_secs,
        )?);

        let mut candidates = Vec::with_capacity(settings.providers.len());
        for provider in &settings.providers {
            let transport = HttpTransport::new(&provider.url, provider.timeout_secs)?;
            candidates.push(Arc::new(ProviderClient::new(
                provider.id.clone(),
                provider.id == settings.primary_provider,
                Arc::new(transport),
            )));
        }

        let limiter = RateLimiter::new(settings.rate_limit.per_second, settings.rate_limit.burst);
        let catalog = Arc::new(ToolCatalog::connect(candidates, limiter).await?);

        Self::assemble(llm, catalog, &settings.memory).await
    }

    async fn assemble(
        llm: Arc<dyn CompletionProvider>,
        catalog: Arc<ToolCatalog>,
        memory: &MemorySettings,
    ) -> Result<Self> {
        let tool_specs: Vec<ToolSpec> = catalog
            .all_tools()
            .await?
            .into_iter()
            .map(|tool| ToolSpec::function(tool.name, tool.description, tool.input_schema))
            .collect();
        let system_prompt = build_system_prompt(&catalog.provider_ids());
        info!(
            "Agent ready: {} tools from {} providers",
            tool_specs.len(),
            catalog.provider_ids().len()
        );

        Ok(Self {
            llm,
            catalog,
            sessions: SessionStore::new(memory.max_messages, memory.max_characters),
            system_prompt,
            tool_specs,
        })
    }

    /// One non-streaming exchange. Tool calls the model may emit are
    /// not executed on this path; the assistant text is the answer.
    pub async fn chat(&self, request: ChatRequest) -> Result<ChatResponse> {
        let session_id = resolve_session(&request.session_id);
        let message = contextual_message(&request);

        let memory = self.sessions.get_or_create(&session_id);
        memory.append(Role::User, &message);

        let messages = self.build_messages(&memory);
        let response = self.llm.chat(messages, self.tool_specs.clone()).await?;

        memory.append(Role::Assistant, &response);
        Ok(ChatResponse {
            response,
            session_id,
        })
    }

    /// Start one streaming turn on its own task and hand back the
    /// chunk receiver.
    ///
    /// The channel closes only after the assistant text has been
    /// written to session memory, so a consumer that drains to the end
    /// sees the turn fully settled.
    pub async fn chat_stream(
        &self,
        request: ChatRequest,
        cancel: CancellationToken,
    ) -> Result<mpsc::Receiver<StreamChunk>> {
        let session_id = resolve_session(&request.session_id);
        let message = contextual_message(&request);
        info!(
            "Chat stream turn for session {} ({} chars)",
            session_id,
            message.len()
        );

        let memory = self.sessions.get_or_create(&session_id);
        memory.append(Role::User, &message);

        let messages = self.build_messages(&memory);
        let deltas = self.llm.stream_chat(messages, self.tool_specs.clone()).await?;

        let (tx, rx) = mpsc::channel(CHUNK_BUFFER);
        let dispatcher: Arc<dyn ToolDispatcher> = Arc::new(CatalogDispatcher {
            catalog: Arc::clone(&self.catalog),
        });

        // The guard keeps the channel open until the transcript write
        // lands; end of stream then means memory is consistent.
        let done_guard = tx.clone();
        tokio::spawn(async move {
            let full_text = run_turn(deltas, dispatcher, cancel, tx).await;
            if !full_text.is_empty() {
                memory.append(Role::Assistant, full_text);
            }
            drop(done_guard);
        });

        Ok(rx)
    }

    /// Forget one session's conversation history
    pub fn clear_session(&self, session_id: &str) {
        self.sessions.clear(session_id);
    }

    /// Name and description of every tool the model can call
    pub fn tool_summaries(&self) -> Vec<(String, String)> {
        self.tool_specs
            .iter()
            .map(|spec| (spec.function.name.clone(), spec.function.description.clone()))
            .collect()
    }

    /// Liveness of each connected provider
    pub async fn health(&self) -> HashMap<String, bool> {
        self.catalog.health_report().await
    }

    fn build_messages(&self, memory: &SessionMemory) -> Vec<WireMessage> {
        let mut messages = vec![WireMessage::system(&self.system_prompt)];
        for message in memory.snapshot() {
            messages.push(WireMessage::new(message.role.as_str(), message.content));
        }
        messages
    }
}

/// Routes orchestrator dispatches into the catalog and formats the
/// outcome for the transcript
struct CatalogDispatcher {
    catalog: Arc<ToolCatalog>,
}

#[async_trait]
impl ToolDispatcher for CatalogDispatcher {
    async fn dispatch(&self, tool: &str, arguments: Map<String, Value>) -> Result<String> {
        let result = self.catalog.dispatch(tool, arguments).await?;
        Ok(format_tool_result(&result))
    }
}

fn resolve_session(session_id: &str) -> String {
    if session_id.is_empty() {
        Uuid::new_v4().to_string()
    } else {
        session_id.to_string()
    }
}

fn contextual_message(request: &ChatRequest) -> String {
    match &request.dashboard_context {
        Some(context) => context.contextual_message(&request.message),
        None => request.message.clone(),
    }
}
