//! Trait abstractions for runtime I/O
//!
//! The backend side lives in `crate::backend::BackendClient`; this is the
//! presentation side. Both are mocked in `testing`.

use async_trait::async_trait;
use std::sync::Arc;

/// Presentation boundary: the three actions a turn can take on screen
#[async_trait]
pub trait Presenter: Send + Sync {
    /// Send a new message, returning its id
    async fn send_message(&self, content: &str) -> Result<String, String>;

    /// Replace the content of a message sent earlier
    async fn update_message(&self, message_id: &str, content: &str) -> Result<(), String>;

    /// Take a message off screen
    async fn remove_message(&self, message_id: &str) -> Result<(), String>;
}

#[async_trait]
impl<T: Presenter + ?Sized> Presenter for Arc<T> {
    async fn send_message(&self, content: &str) -> Result<String, String> {
        (**self).send_message(content).await
    }

    async fn update_message(&self, message_id: &str, content: &str) -> Result<(), String> {
        (**self).update_message(message_id, content).await
    }

    async fn remove_message(&self, message_id: &str) -> Result<(), String> {
        (**self).remove_message(message_id).await
    }
}
