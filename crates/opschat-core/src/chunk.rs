//! Normalized stream chunk model.
//!
//! Every streamed turn is delivered as a sequence of these chunks: exactly one
//! `start` first and exactly one `done` last, whatever happens in between.

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::error::Result;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum StreamChunk {
    Start,
    Token {
        message: String,
    },
    Tool {
        tool: String,
        arguments: Map<String, Value>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        result: Option<Value>,
    },
    Error {
        message: String,
    },
    Complete {
        #[serde(default, skip_serializing_if = "String::is_empty")]
        message: String,
    },
    Done,
}

impl StreamChunk {
    pub fn token(text: impl Into<String>) -> Self {
        StreamChunk::Token {
            message: text.into(),
        }
    }

    pub fn tool(name: impl Into<String>, arguments: Map<String, Value>, result: Option<Value>) -> Self {
        StreamChunk::Tool {
            tool: name.into(),
            arguments,
            result,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        StreamChunk::Error {
            message: message.into(),
        }
    }

    pub fn complete(text: impl Into<String>) -> Self {
        StreamChunk::Complete {
            message: text.into(),
        }
    }

    /// Serializes the chunk as one text-event-stream event: `data: <json>\n\n`.
    pub fn to_sse_frame(&self) -> Result<String> {
        let json = serde_json::to_string(self)?;
        Ok(format!("data: {}\n\n", json))
    }
}
