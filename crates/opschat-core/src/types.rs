use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Assistant => "assistant",
        }
    }
}

/// One stored conversation message. Ordering is insertion order; messages are
/// immutable once appended to session memory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }
}

/// Incoming turn request from the hosting layer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatRequest {
    pub message: String,
    #[serde(default)]
    pub session_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dashboard_context: Option<DashboardContext>,
}

/// Non-streaming chat response.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ChatResponse {
    pub response: String,
    pub session_id: String,
}

/// Dashboard metadata the host may attach to a turn. Non-empty fields are
/// rendered into a labeled preamble ahead of the user message.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DashboardContext {
    #[serde(default)]
    pub uid: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub folder: String,
    #[serde(default)]
    pub tags: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_range: Option<TimeRange>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TimeRange {
    #[serde(default)]
    pub from: String,
    #[serde(default)]
    pub to: String,
}

impl DashboardContext {
    /// Prepends the `[Dashboard Context]` block to a user message, one line
    /// per populated field. The time range line needs both ends. A context
    /// with nothing to say leaves the message untouched.
    pub fn contextual_message(&self, user_message: &str) -> String {
        let mut parts = vec!["[Dashboard Context]".to_string()];

        if !self.name.is_empty() {
            parts.push(format!("Name: {}", self.name));
        }
        if !self.uid.is_empty() {
            parts.push(format!("UID: {}", self.uid));
        }
        if !self.folder.is_empty() {
            parts.push(format!("Folder: {}", self.folder));
        }
        if !self.tags.is_empty() {
            parts.push(format!("Tags: [{}]", self.tags.join(" ")));
        }
        if let Some(range) = &self.time_range {
            if !range.from.is_empty() && !range.to.is_empty() {
                parts.push(format!("Time Range: {} to {}", range.from, range.to));
            }
        }

        if parts.len() > 1 {
            format!("{}\n\n{}", parts.join("\n"), user_message)
        } else {
            user_message.to_string()
        }
    }
}
