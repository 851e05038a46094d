//! Completion backend and the streaming turn orchestrator

pub mod client;
pub mod stream;
pub mod wire;

pub use client::{CompletionProvider, DeltaStream, LlmClient};
pub use stream::{run_turn, PendingToolCalls, ToolDispatcher, CHUNK_BUFFER};
pub use wire::{ChatCompletionChunk, ChatCompletionRequest, ToolSpec, WireMessage};
