//! Effects produced by state transitions

use crate::session::Role;
use std::time::Duration;

/// Effects to be executed after state transition
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    /// Append one turn to the session history
    AppendTurn { role: Role, content: String },

    /// Send the transient indicator as a new message
    ShowIndicator { text: String },

    /// Replace the indicator's content
    UpdateIndicator { text: String },

    /// Take the indicator off screen
    RemoveIndicator,

    /// Call the backend with the message and a history snapshot
    RequestBackend { message: String },

    /// Hold the hand-off announcement, then emit `HandoffElapsed`
    ScheduleHandoff { delay: Duration },

    /// Send a new, permanent message
    SendMessage { text: String },

    /// Emit `Rendered` once everything before it has run
    FinishRendering,

    /// Broadcast the current state
    PublishState,

    /// Notify subscribers the turn is over
    NotifyTurnDone,
}

impl Effect {
    pub fn append_user(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn append_assistant(content: impl Into<String>) -> Self {
        Effect::AppendTurn {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    pub fn send_message(text: impl Into<String>) -> Self {
        Effect::SendMessage { text: text.into() }
    }

    pub fn update_indicator(text: impl Into<String>) -> Self {
        Effect::UpdateIndicator { text: text.into() }
    }
}
