//! Events that can occur during a turn

use crate::backend::BackendErrorKind;

/// Events that trigger state transitions
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    // User events
    UserMessage {
        text: String,
    },

    // Backend events
    BackendReply {
        reply: String,
        category: String,
    },
    BackendFailed {
        kind: BackendErrorKind,
        status: Option<u16>,
        message: String,
    },

    // Rendering events
    HandoffElapsed,
    Rendered,
}

impl Event {
    pub fn user_message(text: impl Into<String>) -> Self {
        Event::UserMessage { text: text.into() }
    }
}
