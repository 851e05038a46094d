use serde_json::Value;

/// Render a tool result for the model and the chat transcript.
///
/// Strings pass through verbatim, structured values are
/// pretty-printed JSON.
pub fn format_tool_result(result: &Value) -> String {
    match result {
        Value::Null => "No result returned".to_string(),
        Value::String(text) => text.clone(),
        other => serde_json::to_string_pretty(other)
            .unwrap_or_else(|_| other.to_string()),
    }
}
