//! Wire types for the OpenAI-compatible chat completion API

use serde::{Deserialize, Serialize};
use serde_json::Value;

#[derive(Debug, Clone, Serialize)]
pub struct ChatCompletionRequest {
    pub model: String,
    pub messages: Vec<WireMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tools: Option<Vec<ToolSpec>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WireMessage {
    pub role: String,
    pub content: String,
}

impl WireMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }

    pub fn system(content: impl Into<String>) -> Self {
        Self::new("system", content)
    }
}

/// A tool advertised to the model
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolSpec {
    #[serde(rename = "type")]
    pub spec_type: String,
    pub function: FunctionSpec,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionSpec {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolSpec {
    pub fn function(
        name: impl Into<String>,
        description: impl Into<String>,
        parameters: Value,
    ) -> Self {
        Self {
            spec_type: "function".to_string(),
            function: FunctionSpec {
                name: name.into(),
                description: description.into(),
                parameters,
            },
        }
    }
}

/// Non-streaming completion response
#[derive(Debug, Clone, Deserialize)]
pub struct ChatCompletionResponse {
    #[serde(default)]
    pub choices: Vec<CompletionChoice>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionChoice {
    pub message: CompletionMessage,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CompletionMessage {
    #[serde(default)]
    pub content: String,
}

/// One event of a streaming completion
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChatCompletionChunk {
    #[serde(default)]
    pub choices: Vec<ChunkChoice>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ChunkChoice {
    #[serde(default)]
    pub delta: MessageDelta,
    #[serde(default)]
    pub finish_reason: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessageDelta {
    #[serde(default)]
    pub content: Option<String>,
    #[serde(default)]
    pub tool_calls: Option<Vec<ToolCallDelta>>,
}

/// One fragment of a tool call, spread across several events
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ToolCallDelta {
    #[serde(default)]
    pub index: Option<usize>,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(rename = "type", default)]
    pub call_type: Option<String>,
    #[serde(default)]
    pub function: Option<FunctionDelta>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FunctionDelta {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_request_omits_absent_tools_and_temperature() {
        let request = ChatCompletionRequest {
            model: "gpt-4o".to_string(),
            messages: vec![WireMessage::new("user", "hi")],
            stream: true,
            temperature: None,
            tools: None,
        };
        let text = serde_json::to_string(&request).unwrap();
        assert!(text.contains(r#""stream":true"#));
        assert!(!text.contains("tools"));
        assert!(!text.contains("temperature"));
    }

    #[test]
    fn test_tool_spec_shape() {
        let spec = ToolSpec::function("list_alerts", "List alerts", json!({"type": "object"}));
        let value = serde_json::to_value(&spec).unwrap();
        assert_eq!(value["type"], "function");
        assert_eq!(value["function"]["name"], "list_alerts");
        assert_eq!(value["function"]["parameters"]["type"], "object");
    }

    #[test]
    fn test_content_delta_parses() {
        let raw = r#"{"choices":[{"delta":{"content":"Hel"},"finish_reason":null}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).unwrap();
        assert_eq!(chunk.choices[0].delta.content.as_deref(), Some("Hel"));
    }

    #[test]
    fn test_tool_call_delta_parses() {
        let raw = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"id":"call_1","type":"function","function":{"name":"get_alerts","arguments":"{\"se"}}]}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let call = &chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert_eq!(call.index, Some(0));
        assert_eq!(call.id.as_deref(), Some("call_1"));
        let function = call.function.as_ref().unwrap();
        assert_eq!(function.name.as_deref(), Some("get_alerts"));
        assert_eq!(function.arguments.as_deref(), Some("{\"se"));
    }

    #[test]
    fn test_continuation_fragment_parses_without_id() {
        let raw = r#"{"choices":[{"delta":{"tool_calls":[{"index":0,"function":{"arguments":"verity\":\"critical\"}"}}]}}]}"#;
        let chunk: ChatCompletionChunk = serde_json::from_str(raw).unwrap();
        let call = &chunk.choices[0].delta.tool_calls.as_ref().unwrap()[0];
        assert!(call.id.is_none());
        assert_eq!(
            call.function.as_ref().unwrap().arguments.as_deref(),
            Some("verity\":\"critical\"}")
        );
    }

    #[test]
    fn test_empty_choices_chunk_parses() {
        let chunk: ChatCompletionChunk = serde_json::from_str(r#"{"choices":[]}"#).unwrap();
        assert!(chunk.choices.is_empty());
    }
}
