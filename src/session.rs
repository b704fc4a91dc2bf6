//! Per-session conversation history
//!
//! A `SessionHistory` is created empty when a chat starts and dropped when
//! it ends. Writes replace the whole sequence, so every snapshot handed out
//! stays valid and immutable.

use serde::{Deserialize, Serialize};
use std::sync::{Arc, PoisonError, RwLock};

/// Who contributed a turn
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One message unit in the conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Turn {
    pub role: Role,
    pub content: String,
}

impl Turn {
    pub fn new(role: Role, content: impl Into<String>) -> Self {
        Self {
            role,
            content: content.into(),
        }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content)
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content)
    }
}

/// Ordered, append-only log of turns for one session
#[derive(Debug, Clone, Default)]
pub struct SessionHistory {
    turns: Arc<RwLock<Arc<Vec<Turn>>>>,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Snapshot of the current history (empty if nothing was appended yet)
    pub fn get_history(&self) -> Arc<Vec<Turn>> {
        self.turns
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub fn append(&self, role: Role, content: impl Into<String>) {
        let mut guard = self.turns.write().unwrap_or_else(PoisonError::into_inner);
        let mut next = Vec::clone(&guard);
        next.push(Turn::new(role, content));
        *guard = Arc::new(next);
    }

    pub fn len(&self) -> usize {
        self.get_history().len()
    }

    #[allow(dead_code)] // Pairs with len()
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
