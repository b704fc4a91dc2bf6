//! Turn state types

use crate::backend::BackendErrorKind;
use crate::config::HandoffPolicy;
use serde::{Serialize, Serializer};
use std::time::Duration;

/// Where the orchestrator is within one turn
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum TurnState {
    /// Ready for the next user message
    #[default]
    Idle,

    /// User turn recorded, backend call in flight
    AwaitingBackend,

    /// Hand-off announcement on screen, reply held back until the delay ends
    RenderingTransition { reply: String, category: String },

    /// Indicator settled, reply being rendered and recorded
    RenderingReply { reply: String },

    /// Indicator replaced by a failure notice
    RenderingError {
        #[serde(serialize_with = "serialize_error_kind")]
        kind: BackendErrorKind,
    },
}

impl TurnState {
    /// Whether a turn is in flight
    pub fn is_busy(&self) -> bool {
        !matches!(self, TurnState::Idle)
    }
}

fn serialize_error_kind<S: Serializer>(kind: &BackendErrorKind, s: S) -> Result<S::Ok, S::Error> {
    let name = match kind {
        BackendErrorKind::Status => "status",
        BackendErrorKind::Timeout => "timeout",
        BackendErrorKind::Connect => "connect",
        BackendErrorKind::Decode => "decode",
        BackendErrorKind::Unknown => "unknown",
    };
    s.serialize_str(name)
}

/// Context for a session (immutable configuration)
#[derive(Debug, Clone)]
pub struct TurnContext {
    pub session_id: String,
    pub handoff: HandoffPolicy,
    /// Upper bound on one backend round trip
    pub backend_timeout: Duration,
}

impl TurnContext {
    pub fn new(
        session_id: impl Into<String>,
        handoff: HandoffPolicy,
        backend_timeout: Duration,
    ) -> Self {
        Self {
            session_id: session_id.into(),
            handoff,
            backend_timeout,
        }
    }
}
