//! Bounded conversation history.
//!
//! A passive log of record: turns are appended around each request, but the
//! outbound payload embeds only the latest context + prompt.

use serde::{Deserialize, Serialize};

/// Default turn bound.
pub const DEFAULT_MAX_TURNS: usize = 10;

/// Speaker of a conversation turn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One conversation turn, insertion order chronological.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatTurn {
    pub role: Role,
    pub content: String,
}

/// Ordered log of turns, bounded at `max_turns`.
///
/// When the bound is exceeded the oldest non-system turn is evicted; system
/// turns are never evicted.
#[derive(Debug, Clone)]
pub struct History {
    turns: Vec<ChatTurn>,
    max_turns: usize,
}

impl Default for History {
    fn default() -> Self {
        Self::new()
    }
}

impl History {
    pub fn new() -> Self {
        Self::with_max(DEFAULT_MAX_TURNS)
    }

    pub fn with_max(max_turns: usize) -> Self {
        Self {
            turns: Vec::new(),
            max_turns,
        }
    }

    /// Appends a turn, then enforces the bound.
    pub fn append(&mut self, role: Role, content: impl Into<String>) {
        self.turns.push(ChatTurn {
            role,
            content: content.into(),
        });
        while self.turns.len() > self.max_turns {
            let Some(index) = self.turns.iter().position(|t| t.role != Role::System) else {
                break;
            };
            self.turns.remove(index);
        }
    }

    /// Empties the log unconditionally, system turns included.
    pub fn clear(&mut self) {
        self.turns.clear();
    }

    pub fn turns(&self) -> &[ChatTurn] {
        &self.turns
    }

    pub fn len(&self) -> usize {
        self.turns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.turns.is_empty()
    }
}
