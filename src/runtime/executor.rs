//! Session runtime executor

use super::traits::Presenter;
use super::UiEvent;

use crate::backend::{BackendClient, BackendError, BackendRequest};
use crate::session::SessionHistory;
use crate::state_machine::{transition, Effect, Event, TurnContext, TurnState};
use serde_json::Value;
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc, watch};
use tokio_util::sync::CancellationToken;

/// Generic session runtime that can work with any backend and presenter
pub struct SessionRuntime<B, P>
where
    B: BackendClient + 'static,
    P: Presenter + 'static,
{
    context: TurnContext,
    state: TurnState,
    history: SessionHistory,
    backend: Arc<B>,
    presenter: Arc<P>,
    event_rx: mpsc::Receiver<Event>,
    event_tx: mpsc::Sender<Event>,
    broadcast_tx: broadcast::Sender<UiEvent>,
    /// Last published state, for readers outside the runtime task
    state_tx: watch::Sender<TurnState>,
    /// Ends the run loop when the session is closed
    shutdown: CancellationToken,
    /// Id of the transient indicator for the turn in flight
    indicator: Option<String>,
    /// User messages that arrived mid-turn, in arrival order
    queued_messages: VecDeque<Event>,
    /// Token to cancel the in-flight backend call
    backend_cancel_token: Option<CancellationToken>,
}

impl<B, P> SessionRuntime<B, P>
where
    B: BackendClient + 'static,
    P: Presenter + 'static,
{
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        context: TurnContext,
        history: SessionHistory,
        backend: Arc<B>,
        presenter: Arc<P>,
        event_rx: mpsc::Receiver<Event>,
        event_tx: mpsc::Sender<Event>,
        broadcast_tx: broadcast::Sender<UiEvent>,
        state_tx: watch::Sender<TurnState>,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            context,
            state: TurnState::Idle,
            history,
            backend,
            presenter,
            event_rx,
            event_tx,
            broadcast_tx,
            state_tx,
            shutdown,
            indicator: None,
            queued_messages: VecDeque::new(),
            backend_cancel_token: None,
        }
    }

    pub async fn run(mut self) {
        tracing::info!(session_id = %self.context.session_id, "Starting session runtime");

        // Process events in a loop - no recursion
        loop {
            tokio::select! {
                biased;

                () = self.shutdown.cancelled() => break,

                Some(event) = self.event_rx.recv() => {
                    if let Err(e) = self.process_event(event).await {
                        tracing::error!(
                            session_id = %self.context.session_id,
                            error = %e,
                            "Error handling event"
                        );
                    }
                }

                else => break,
            }
        }

        if let Some(token) = self.backend_cancel_token.take() {
            token.cancel();
        }

        tracing::info!(session_id = %self.context.session_id, "Session runtime stopped");
    }

    async fn process_event(&mut self, event: Event) -> Result<(), String> {
        // One turn at a time: park messages that arrive mid-turn
        if matches!(event, Event::UserMessage { .. }) && self.state.is_busy() {
            tracing::debug!(
                session_id = %self.context.session_id,
                queued = self.queued_messages.len() + 1,
                "Queueing user message until the current turn finishes"
            );
            self.queued_messages.push_back(event);
            return Ok(());
        }

        // We need to process events in a loop to handle chained effects
        let mut events_to_process = vec![event];

        while let Some(current_event) = events_to_process.pop() {
            // Pure state transition
            let result = match transition(&self.state, &self.context, current_event) {
                Ok(r) => r,
                Err(e) => {
                    let _ = self.broadcast_tx.send(UiEvent::Error {
                        message: e.to_string(),
                    });
                    return Err(e.to_string());
                }
            };

            self.state = result.new_state;

            // Execute effects and collect generated events. A failed UI action
            // must not strand the turn, so effects keep running.
            for effect in result.effects {
                match self.execute_effect(effect).await {
                    Ok(Some(generated_event)) => events_to_process.push(generated_event),
                    Ok(None) => {}
                    Err(e) => {
                        tracing::warn!(
                            session_id = %self.context.session_id,
                            error = %e,
                            "Effect failed"
                        );
                        let _ = self.broadcast_tx.send(UiEvent::Error { message: e });
                    }
                }
            }

            // Back to idle: start the next queued message, if any
            if events_to_process.is_empty() && !self.state.is_busy() {
                if let Some(next) = self.queued_messages.pop_front() {
                    events_to_process.push(next);
                }
            }
        }

        Ok(())
    }

    /// Execute an effect and optionally return a generated event
    async fn execute_effect(&mut self, effect: Effect) -> Result<Option<Event>, String> {
        match effect {
            Effect::AppendTurn { role, content } => {
                self.history.append(role, content);
                Ok(None)
            }

            Effect::ShowIndicator { text } => {
                let id = self.presenter.send_message(&text).await?;
                self.indicator = Some(id);
                Ok(None)
            }

            Effect::UpdateIndicator { text } => {
                if let Some(id) = self.indicator.clone() {
                    self.presenter.update_message(&id, &text).await?;
                } else {
                    // Indicator never made it on screen; show the text fresh
                    let id = self.presenter.send_message(&text).await?;
                    self.indicator = Some(id);
                }
                Ok(None)
            }

            Effect::RemoveIndicator => {
                if let Some(id) = self.indicator.take() {
                    self.presenter.remove_message(&id).await?;
                }
                Ok(None)
            }

            Effect::RequestBackend { message } => {
                // Snapshot now: the user turn is in, the reply is not
                let request = BackendRequest::new(message, self.history.get_history().to_vec());

                let cancel_token = CancellationToken::new();
                self.backend_cancel_token = Some(cancel_token.clone());

                let backend = self.backend.clone();
                let event_tx = self.event_tx.clone();
                let bound = self.context.backend_timeout;
                let session_id = self.context.session_id.clone();

                tokio::spawn(async move {
                    tracing::info!(
                        session_id = %session_id,
                        history_len = request.history.len(),
                        "Calling backend (background)"
                    );

                    tokio::select! {
                        biased;

                        () = cancel_token.cancelled() => {
                            tracing::info!(session_id = %session_id, "Backend call cancelled");
                        }

                        result = tokio::time::timeout(bound, backend.send(&request)) => {
                            let result = result.unwrap_or_else(|_| {
                                Err(BackendError::timeout(format!(
                                    "No response within {}s",
                                    bound.as_secs_f64()
                                )))
                            });
                            let event = match result {
                                Ok(reply) => Event::BackendReply {
                                    reply: reply.response,
                                    category: reply.category,
                                },
                                Err(e) => Event::BackendFailed {
                                    kind: e.kind,
                                    status: e.status,
                                    message: e.message,
                                },
                            };
                            let _ = event_tx.send(event).await;
                        }
                    }
                });

                // Return None - the event will come from the spawned task
                Ok(None)
            }

            Effect::ScheduleHandoff { delay } => {
                let event_tx = self.event_tx.clone();
                tokio::spawn(async move {
                    tokio::time::sleep(delay).await;
                    let _ = event_tx.send(Event::HandoffElapsed).await;
                });
                Ok(None)
            }

            Effect::SendMessage { text } => {
                self.presenter.send_message(&text).await?;
                Ok(None)
            }

            Effect::FinishRendering => Ok(Some(Event::Rendered)),

            Effect::PublishState => {
                self.state_tx.send_replace(self.state.clone());
                let state_json = serde_json::to_value(&self.state).unwrap_or(Value::Null);
                let _ = self
                    .broadcast_tx
                    .send(UiEvent::StateChange { state: state_json });
                Ok(None)
            }

            Effect::NotifyTurnDone => {
                // Whatever the indicator became stays on screen as history
                self.indicator = None;
                self.backend_cancel_token = None;
                let _ = self.broadcast_tx.send(UiEvent::TurnDone);
                Ok(None)
            }
        }
    }
}
