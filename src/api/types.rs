//! API request and response types

use crate::session::Turn;
use serde::{Deserialize, Serialize};

/// Response to a chat start
#[derive(Debug, Serialize)]
pub struct CreateSessionResponse {
    pub session_id: String,
    /// False when configuration is missing and the session is blocked
    pub ready: bool,
    pub bot_name: String,
    pub bot_role: String,
}

/// Request to send a chat message
#[derive(Debug, Deserialize)]
pub struct MessageRequest {
    pub text: String,
}

/// Response for a received message
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub queued: bool,
}

/// Response with the session's conversation history
#[derive(Debug, Serialize)]
pub struct HistoryResponse {
    pub session_id: String,
    pub turns: Vec<Turn>,
}

/// Response for lifecycle actions
#[derive(Debug, Serialize)]
pub struct SuccessResponse {
    pub success: bool,
}

/// Error response
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
}

impl ErrorResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            error: message.into(),
        }
    }
}
