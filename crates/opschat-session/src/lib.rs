//! Bounded conversation memory.
//!
//! Each session keeps an append-only message log trimmed from the front
//! under two independent limits: message count and total characters. The
//! newest message always survives, even when it alone exceeds the character
//! budget.

use opschat_core::{ChatMessage, Role};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

pub const DEFAULT_MAX_MESSAGES: usize = 100;
pub const DEFAULT_MAX_CHARACTERS: usize = 100_000;

struct MemoryState {
    messages: VecDeque<ChatMessage>,
    total_chars: usize,
}

pub struct SessionMemory {
    state: RwLock<MemoryState>,
    max_messages: Option<usize>,
    max_characters: Option<usize>,
}

impl SessionMemory {
    /// Limits follow the config convention: zero selects the built-in
    /// default, negative means unlimited.
    pub fn new(max_messages: i64, max_characters: i64) -> Self {
        Self {
            state: RwLock::new(MemoryState {
                messages: VecDeque::new(),
                total_chars: 0,
            }),
            max_messages: resolve_limit(max_messages, DEFAULT_MAX_MESSAGES),
            max_characters: resolve_limit(max_characters, DEFAULT_MAX_CHARACTERS),
        }
    }

    pub fn with_defaults() -> Self {
        Self::new(0, 0)
    }

    /// Appends a message and evicts oldest-first until both limits hold.
    pub fn append(&self, role: Role, content: impl Into<String>) {
        let message = ChatMessage::new(role, content);
        let mut state = self.state.write().unwrap();

        state.total_chars += message.content.len();
        state.messages.push_back(message);

        if let Some(max) = self.max_messages {
            while state.messages.len() > max {
                if let Some(removed) = state.messages.pop_front() {
                    state.total_chars -= removed.content.len();
                }
            }
        }

        if let Some(max) = self.max_characters {
            // The newest message is exempt from the character budget.
            while state.total_chars > max && state.messages.len() > 1 {
                if let Some(removed) = state.messages.pop_front() {
                    state.total_chars -= removed.content.len();
                }
            }
        }
    }

    /// Returns an independent copy of the message log.
    pub fn snapshot(&self) -> Vec<ChatMessage> {
        let state = self.state.read().unwrap();
        state.messages.iter().cloned().collect()
    }

    pub fn clear(&self) {
        let mut state = self.state.write().unwrap();
        state.messages.clear();
        state.total_chars = 0;
    }

    pub fn len(&self) -> usize {
        self.state.read().unwrap().messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn total_chars(&self) -> usize {
        self.state.read().unwrap().total_chars
    }
}

fn resolve_limit(configured: i64, default: usize) -> Option<usize> {
    match configured {
        0 => Some(default),
        n if n < 0 => None,
        n => Some(n as usize),
    }
}

/// Process-lifetime map of session id to memory. Sessions are created lazily
/// on first use and never removed; an explicit reset only empties the log.
pub struct SessionStore {
    sessions: RwLock<HashMap<String, Arc<SessionMemory>>>,
    max_messages: i64,
    max_characters: i64,
}

impl SessionStore {
    pub fn new(max_messages: i64, max_characters: i64) -> Self {
        Self {
            sessions: RwLock::new(HashMap::new()),
            max_messages,
            max_characters,
        }
    }

    pub fn get_or_create(&self, session_id: &str) -> Arc<SessionMemory> {
        if let Some(memory) = self.sessions.read().unwrap().get(session_id) {
            return Arc::clone(memory);
        }

        let mut sessions = self.sessions.write().unwrap();
        Arc::clone(
            sessions
                .entry(session_id.to_string())
                .or_insert_with(|| Arc::new(SessionMemory::new(self.max_messages, self.max_characters))),
        )
    }

    pub fn clear(&self, session_id: &str) {
        if let Some(memory) = self.sessions.read().unwrap().get(session_id) {
            memory.clear();
        }
    }

    pub fn session_count(&self) -> usize {
        self.sessions.read().unwrap().len()
    }
}
