//! Turn state machine: provider deltas in, normalized chunks out
//!
//! One turn is one pass over the provider's completion stream. Content
//! arrives interleaved with tool-call fragments; tokens are forwarded
//! the moment they arrive while fragments accumulate until the stream
//! ends. Tool dispatch happens only after the text is finished, so a
//! tool result never reorders the narration around it.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use futures::StreamExt;
use opschat_core::{AgentError, Result, StreamChunk};
use serde_json::{Map, Value};
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::client::DeltaStream;
use crate::wire::ToolCallDelta;

/// Capacity of the chunk channel between a turn task and its consumer
pub const CHUNK_BUFFER: usize = 100;

/// Executes one accumulated tool call on behalf of the orchestrator
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolDispatcher: Send + Sync {
    /// Returns the formatted result text for the chat transcript
    async fn dispatch(&self, tool: &str, arguments: Map<String, Value>) -> Result<String>;
}

/// Tool calls under assembly, keyed by the provider's call index
#[derive(Debug, Default)]
pub struct PendingToolCalls {
    calls: BTreeMap<usize, PendingCall>,
}

#[derive(Debug, Clone, Default)]
pub struct PendingCall {
    pub id: String,
    pub call_type: String,
    pub name: String,
    pub arguments: String,
}

impl PendingToolCalls {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold one fragment into the accumulated state.
    ///
    /// Fragments without an index are dropped. Id, type and name
    /// overwrite when present; argument text concatenates.
    pub fn merge(&mut self, fragment: &ToolCallDelta) {
        let Some(index) = fragment.index else { return };
        let call = self.calls.entry(index).or_default();

        if let Some(id) = &fragment.id {
            if !id.is_empty() {
                call.id = id.clone();
            }
        }
        if let Some(call_type) = &fragment.call_type {
            if !call_type.is_empty() {
                call.call_type = call_type.clone();
            }
        }
        if let Some(function) = &fragment.function {
            if let Some(name) = &function.name {
                if !name.is_empty() {
                    call.name = name.clone();
                }
            }
            if let Some(arguments) = &function.arguments {
                call.arguments.push_str(arguments);
            }
        }
    }

    /// Calls that accumulated a name, in index order. Calls that never
    /// received a name are dropped without comment.
    pub fn into_calls(self) -> Vec<PendingCall> {
        self.calls
            .into_values()
            .filter(|call| !call.name.is_empty())
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Drive one turn to completion.
///
/// Exactly one `start` is emitted first and, unless the turn is
/// cancelled, exactly one `done` last. A transport failure surfaces as
/// an `error` chunk and skips tool dispatch but still finalizes with
/// `complete` and `done`. A malformed argument payload fails only its
/// own call. Returns the accumulated assistant text, which the caller
/// persists even after cancellation.
pub async fn run_turn(
    deltas: DeltaStream,
    dispatcher: Arc<dyn ToolDispatcher>,
    cancel: CancellationToken,
    tx: mpsc::Sender<StreamChunk>,
) -> String {
    let mut full_text = String::new();
    let mut pending = PendingToolCalls::new();
    let mut stream_failed = false;

    if !emit(&tx, StreamChunk::Start).await {
        return full_text;
    }

    let mut deltas = deltas;
    loop {
        let next = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                debug!("Turn cancelled while reading deltas");
                return full_text;
            }
            next = deltas.next() => next,
        };
        let Some(delta) = next else { break };

        match delta {
            Ok(event) => {
                let Some(choice) = event.choices.into_iter().next() else {
                    continue;
                };
                if let Some(text) = choice.delta.content {
                    if !text.is_empty() {
                        full_text.push_str(&text);
                        if !emit(&tx, StreamChunk::token(text)).await {
                            return full_text;
                        }
                    }
                }
                if let Some(fragments) = choice.delta.tool_calls {
                    for fragment in &fragments {
                        pending.merge(fragment);
                    }
                }
            }
            Err(e) => {
                warn!("Completion stream failed: {}", e);
                let message = match &e {
                    AgentError::StreamError(detail) => format!("Stream error: {}", detail),
                    other => format!("Stream error: {}", other),
                };
                if !emit(&tx, StreamChunk::error(message)).await {
                    return full_text;
                }
                stream_failed = true;
                break;
            }
        }
    }

    if !stream_failed {
        for call in pending.into_calls() {
            if cancel.is_cancelled() {
                debug!("Turn cancelled before dispatching '{}'", call.name);
                return full_text;
            }

            let arguments: Map<String, Value> = match serde_json::from_str(&call.arguments) {
                Ok(arguments) => arguments,
                Err(e) => {
                    let message = format!("Failed to parse tool arguments: {}", e);
                    if !emit(&tx, StreamChunk::error(message)).await {
                        return full_text;
                    }
                    continue;
                }
            };

            let outcome = tokio::select! {
                biased;
                _ = cancel.cancelled() => {
                    debug!("Turn cancelled during '{}' dispatch", call.name);
                    return full_text;
                }
                outcome = dispatcher.dispatch(&call.name, arguments.clone()) => outcome,
            };

            let result = match outcome {
                Ok(text) => Value::String(text),
                Err(e) => Value::String(format!("Error: {}", e)),
            };
            if !emit(&tx, StreamChunk::tool(call.name, arguments, Some(result))).await {
                return full_text;
            }
        }
    }

    emit(&tx, StreamChunk::complete(full_text.clone())).await;
    emit(&tx, StreamChunk::Done).await;
    full_text
}

/// False when the consumer went away, which ends the turn quietly
async fn emit(tx: &mpsc::Sender<StreamChunk>, chunk: StreamChunk) -> bool {
    tx.send(chunk).await.is_ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::wire::{ChatCompletionChunk, ChunkChoice, FunctionDelta, MessageDelta};
    use serde_json::json;

    fn content_event(text: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            choices: vec![ChunkChoice {
                delta: MessageDelta {
                    content: Some(text.to_string()),
                    tool_calls: None,
                },
                finish_reason: None,
            }],
        }
    }

    fn tool_event(index: usize, name: Option<&str>, arguments: &str) -> ChatCompletionChunk {
        ChatCompletionChunk {
            choices: vec![ChunkChoice {
                delta: MessageDelta {
                    content: None,
                    tool_calls: Some(vec![ToolCallDelta {
                        index: Some(index),
                        id: name.map(|_| "call_1".to_string()),
                        call_type: name.map(|_| "function".to_string()),
                        function: Some(FunctionDelta {
                            name: name.map(str::to_string),
                            arguments: Some(arguments.to_string()),
                        }),
                    }]),
                },
                finish_reason: None,
            }],
        }
    }

    fn fixed(events: Vec<Result<ChatCompletionChunk>>) -> DeltaStream {
        Box::pin(futures::stream::iter(events))
    }

    async fn collect(
        deltas: DeltaStream,
        dispatcher: Arc<dyn ToolDispatcher>,
        cancel: CancellationToken,
    ) -> (String, Vec<StreamChunk>) {
        let (tx, mut rx) = mpsc::channel(CHUNK_BUFFER);
        let text = run_turn(deltas, dispatcher, cancel, tx).await;
        let mut chunks = Vec::new();
        while let Ok(chunk) = rx.try_recv() {
            chunks.push(chunk);
        }
        (text, chunks)
    }

    #[tokio::test]
    async fn test_tokens_forwarded_in_order() {
        let deltas = fixed(vec![
            Ok(content_event("Hel")),
            Ok(content_event("lo")),
            Ok(content_event("!")),
        ]);
        let dispatcher = Arc::new(MockToolDispatcher::new());

        let (text, chunks) = collect(deltas, dispatcher, CancellationToken::new()).await;

        assert_eq!(text, "Hello!");
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Start,
                StreamChunk::token("Hel"),
                StreamChunk::token("lo"),
                StreamChunk::token("!"),
                StreamChunk::complete("Hello!"),
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_split_tool_call_reassembled_and_dispatched() {
        let deltas = fixed(vec![
            Ok(tool_event(0, Some("get_alerts"), "{\"se")),
            Ok(tool_event(0, None, "verity\":\"critical\"}")),
        ]);

        let mut dispatcher = MockToolDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|tool, arguments| {
                tool == "get_alerts" && arguments["severity"] == json!("critical")
            })
            .times(1)
            .returning(|_, _| Ok("1 alert firing".to_string()));

        let (text, chunks) =
            collect(deltas, Arc::new(dispatcher), CancellationToken::new()).await;

        assert_eq!(text, "");
        let mut expected_args = Map::new();
        expected_args.insert("severity".to_string(), json!("critical"));
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Start,
                StreamChunk::tool("get_alerts", expected_args, Some(json!("1 alert firing"))),
                StreamChunk::complete(""),
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_transport_error_finalizes_without_dispatch() {
        let deltas = fixed(vec![
            Ok(content_event("Hel")),
            Ok(tool_event(0, Some("get_alerts"), "{}")),
            Err(AgentError::StreamError("connection reset".to_string())),
        ]);

        let mut dispatcher = MockToolDispatcher::new();
        dispatcher.expect_dispatch().times(0);

        let (text, chunks) =
            collect(deltas, Arc::new(dispatcher), CancellationToken::new()).await;

        assert_eq!(text, "Hel");
        assert_eq!(
            chunks,
            vec![
                StreamChunk::Start,
                StreamChunk::token("Hel"),
                StreamChunk::error("Stream error: connection reset"),
                StreamChunk::complete("Hel"),
                StreamChunk::Done,
            ]
        );
    }

    #[tokio::test]
    async fn test_bad_arguments_fail_only_their_call() {
        let deltas = fixed(vec![
            Ok(tool_event(0, Some("get_alerts"), "not json")),
            Ok(tool_event(1, Some("list_silences"), "{}")),
        ]);

        let mut dispatcher = MockToolDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|tool, _| tool == "list_silences")
            .times(1)
            .returning(|_, _| Ok("no silences".to_string()));

        let (_, chunks) = collect(deltas, Arc::new(dispatcher), CancellationToken::new()).await;

        assert!(matches!(&chunks[1], StreamChunk::Error { message } if message.starts_with("Failed to parse tool arguments")));
        assert_eq!(
            chunks[2],
            StreamChunk::tool("list_silences", Map::new(), Some(json!("no silences")))
        );
        assert_eq!(chunks.last(), Some(&StreamChunk::Done));
    }

    #[tokio::test]
    async fn test_dispatch_failure_becomes_error_text_result() {
        let deltas = fixed(vec![Ok(tool_event(0, Some("get_alerts"), "{}"))]);

        let mut dispatcher = MockToolDispatcher::new();
        dispatcher.expect_dispatch().times(1).returning(|_, _| {
            Err(AgentError::ToolError {
                tool: "get_alerts".to_string(),
                message: "connection refused".to_string(),
            })
        });

        let (_, chunks) = collect(deltas, Arc::new(dispatcher), CancellationToken::new()).await;

        match &chunks[1] {
            StreamChunk::Tool { result, .. } => {
                let text = result.as_ref().unwrap().as_str().unwrap();
                assert!(text.starts_with("Error: "));
                assert!(text.contains("connection refused"));
            }
            other => panic!("expected tool chunk, got {:?}", other),
        }
        assert_eq!(chunks.last(), Some(&StreamChunk::Done));
    }

    #[tokio::test]
    async fn test_nameless_call_dropped_silently() {
        let deltas = fixed(vec![Ok(tool_event(0, None, "{}"))]);
        let dispatcher = Arc::new(MockToolDispatcher::new());

        let (_, chunks) = collect(deltas, dispatcher, CancellationToken::new()).await;

        assert_eq!(
            chunks,
            vec![StreamChunk::Start, StreamChunk::complete(""), StreamChunk::Done]
        );
    }

    #[tokio::test]
    async fn test_empty_content_produces_no_token() {
        let deltas = fixed(vec![Ok(content_event(""))]);
        let dispatcher = Arc::new(MockToolDispatcher::new());

        let (text, chunks) = collect(deltas, dispatcher, CancellationToken::new()).await;

        assert_eq!(text, "");
        assert_eq!(
            chunks,
            vec![StreamChunk::Start, StreamChunk::complete(""), StreamChunk::Done]
        );
    }

    #[tokio::test]
    async fn test_precancelled_turn_stops_after_start() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        let deltas = fixed(vec![Ok(content_event("never"))]);
        let dispatcher = Arc::new(MockToolDispatcher::new());

        let (text, chunks) = collect(deltas, dispatcher, cancel).await;

        assert_eq!(text, "");
        assert_eq!(chunks, vec![StreamChunk::Start]);
    }

    #[tokio::test]
    async fn test_cancel_between_dispatches_skips_finalization() {
        let deltas = fixed(vec![
            Ok(content_event("partial")),
            Ok(tool_event(0, Some("first_tool"), "{}")),
            Ok(tool_event(1, Some("second_tool"), "{}")),
        ]);

        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        let mut dispatcher = MockToolDispatcher::new();
        dispatcher
            .expect_dispatch()
            .withf(|tool, _| tool == "first_tool")
            .times(1)
            .returning(move |_, _| {
                trigger.cancel();
                Ok("done".to_string())
            });

        let (text, chunks) = collect(deltas, Arc::new(dispatcher), cancel).await;

        assert_eq!(text, "partial");
        assert_eq!(
            chunks.last(),
            Some(&StreamChunk::tool(
                "first_tool",
                Map::new(),
                Some(json!("done"))
            ))
        );
        assert!(!chunks.contains(&StreamChunk::Done));
    }

    #[test]
    fn test_merge_accumulates_across_fragments() {
        let mut pending = PendingToolCalls::new();
        pending.merge(&ToolCallDelta {
            index: Some(0),
            id: Some("call_9".to_string()),
            call_type: Some("function".to_string()),
            function: Some(FunctionDelta {
                name: Some("query_loki_logs".to_string()),
                arguments: Some("{\"lim".to_string()),
            }),
        });
        pending.merge(&ToolCallDelta {
            index: Some(0),
            function: Some(FunctionDelta {
                name: None,
                arguments: Some("it\":5}".to_string()),
            }),
            ..Default::default()
        });

        let calls = pending.into_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].id, "call_9");
        assert_eq!(calls[0].name, "query_loki_logs");
        assert_eq!(calls[0].arguments, "{\"limit\":5}");
    }

    #[test]
    fn test_merge_ignores_fragment_without_index() {
        let mut pending = PendingToolCalls::new();
        pending.merge(&ToolCallDelta {
            index: None,
            function: Some(FunctionDelta {
                name: Some("ghost".to_string()),
                arguments: Some("{}".to_string()),
            }),
            ..Default::default()
        });
        assert!(pending.is_empty());
    }

    #[test]
    fn test_calls_come_back_in_index_order() {
        let mut pending = PendingToolCalls::new();
        for (index, name) in [(2usize, "third"), (0, "first"), (1, "second")] {
            pending.merge(&ToolCallDelta {
                index: Some(index),
                function: Some(FunctionDelta {
                    name: Some(name.to_string()),
                    arguments: Some("{}".to_string()),
                }),
                ..Default::default()
            });
        }

        let names: Vec<String> = pending.into_calls().into_iter().map(|c| c.name).collect();
        assert_eq!(names, vec!["first", "second", "third"]);
    }
}
