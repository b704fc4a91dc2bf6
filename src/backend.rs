//! Backend client abstraction
//!
//! One HTTP call per user message to the configured relay endpoint.

mod error;
mod http;
mod types;

pub use error::{BackendError, BackendErrorKind};
pub use http::HttpBackend;
pub use types::*;

use async_trait::async_trait;
use std::sync::Arc;

/// Common interface for the AI backend
#[async_trait]
pub trait BackendClient: Send + Sync {
    /// Send one message with its history snapshot. Exactly one attempt.
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError>;
}

#[async_trait]
impl<T: BackendClient + ?Sized> BackendClient for Arc<T> {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        (**self).send(request).await
    }
}

/// Logging wrapper for backend clients
pub struct LoggingBackend {
    inner: Arc<dyn BackendClient>,
}

impl LoggingBackend {
    pub fn new(inner: Arc<dyn BackendClient>) -> Self {
        Self { inner }
    }
}

#[async_trait]
impl BackendClient for LoggingBackend {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        let start = std::time::Instant::now();
        let result = self.inner.send(request).await;
        let duration = start.elapsed();

        match &result {
            Ok(reply) => {
                tracing::info!(
                    duration_ms = %duration.as_millis(),
                    history_len = request.history.len(),
                    category = %reply.category,
                    "Backend request completed"
                );
            }
            Err(e) => {
                tracing::error!(
                    duration_ms = %duration.as_millis(),
                    kind = ?e.kind,
                    status = ?e.status,
                    error = %e.message,
                    "Backend request failed"
                );
            }
        }

        result
    }
}
