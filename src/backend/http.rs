//! HTTP implementation of the backend client

use super::{BackendClient, BackendError, BackendReply, BackendRequest};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;

/// Header carrying the shared secret
pub const SECRET_HEADER: &str = "x-secret";

/// POSTs `{message, history}` to the configured endpoint
pub struct HttpBackend {
    client: Client,
    url: String,
    secret: String,
}

impl HttpBackend {
    pub fn new(
        url: impl Into<String>,
        secret: impl Into<String>,
        timeout: Duration,
    ) -> Result<Self, reqwest::Error> {
        let client = Client::builder().timeout(timeout).build()?;

        Ok(Self {
            client,
            url: url.into(),
            secret: secret.into(),
        })
    }

    fn classify_send_error(e: &reqwest::Error) -> BackendError {
        if e.is_timeout() {
            BackendError::timeout(format!("Request timeout: {e}"))
        } else if e.is_connect() {
            BackendError::connect(format!("Connection failed: {e}"))
        } else {
            BackendError::unknown(format!("Request failed: {e}"))
        }
    }
}

#[async_trait]
impl BackendClient for HttpBackend {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        let response = self
            .client
            .post(&self.url)
            .header(SECRET_HEADER, &self.secret)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| Self::classify_send_error(&e))?;

        let status = response.status();
        let body = response.text().await.map_err(|e| {
            if e.is_timeout() {
                BackendError::timeout(format!("Timed out reading response: {e}"))
            } else {
                BackendError::unknown(format!("Failed to read response: {e}"))
            }
        })?;

        if status != StatusCode::OK {
            return Err(BackendError::status(
                status.as_u16(),
                format!("Server returned status {status}"),
            ));
        }

        BackendReply::from_body(&body)
    }
}
