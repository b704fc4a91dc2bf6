//! Production presenter: keeps the visible transcript and fans UI actions
//! out to SSE subscribers.

use super::traits::Presenter;
use super::{UiEvent, UiMessage};
use async_trait::async_trait;
use std::sync::{Mutex, PoisonError};
use tokio::sync::broadcast;

pub struct BroadcastPresenter {
    transcript: Mutex<Vec<UiMessage>>,
    broadcast_tx: broadcast::Sender<UiEvent>,
}

impl BroadcastPresenter {
    pub fn new(broadcast_tx: broadcast::Sender<UiEvent>) -> Self {
        Self {
            transcript: Mutex::new(Vec::new()),
            broadcast_tx,
        }
    }

    /// Messages currently on screen, oldest first
    pub fn transcript(&self) -> Vec<UiMessage> {
        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }
}

#[async_trait]
impl Presenter for BroadcastPresenter {
    async fn send_message(&self, content: &str) -> Result<String, String> {
        let message = UiMessage::new(content);
        let id = message.id.clone();

        self.transcript
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.clone());

        // No subscribers is fine; the transcript covers late joiners
        let _ = self.broadcast_tx.send(UiEvent::MessageSent { message });
        Ok(id)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> Result<(), String> {
        let updated = {
            let mut transcript = self.transcript.lock().unwrap_or_else(PoisonError::into_inner);
            let message = transcript
                .iter_mut()
                .find(|m| m.id == message_id)
                .ok_or_else(|| format!("Unknown message: {message_id}"))?;
            message.content = content.to_string();
            message.clone()
        };

        let _ = self
            .broadcast_tx
            .send(UiEvent::MessageUpdated { message: updated });
        Ok(())
    }

    async fn remove_message(&self, message_id: &str) -> Result<(), String> {
        {
            let mut transcript = self.transcript.lock().unwrap_or_else(PoisonError::into_inner);
            let before = transcript.len();
            transcript.retain(|m| m.id != message_id);
            if transcript.len() == before {
                return Err(format!("Unknown message: {message_id}"));
            }
        }

        let _ = self.broadcast_tx.send(UiEvent::MessageRemoved {
            message_id: message_id.to_string(),
        });
        Ok(())
    }
}
