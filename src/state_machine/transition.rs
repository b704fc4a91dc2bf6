//! Pure state transition function

use super::{Effect, Event, TurnContext, TurnState};
use crate::notices;
use thiserror::Error;

/// Result of a state transition
#[derive(Debug)]
pub struct TransitionResult {
    pub new_state: TurnState,
    pub effects: Vec<Effect>,
}

impl TransitionResult {
    pub fn new(state: TurnState) -> Self {
        Self {
            new_state: state,
            effects: vec![],
        }
    }

    pub fn with_effect(mut self, effect: Effect) -> Self {
        self.effects.push(effect);
        self
    }

    pub fn with_effects(mut self, effects: impl IntoIterator<Item = Effect>) -> Self {
        self.effects.extend(effects);
        self
    }
}

/// Errors that can occur during transition
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TransitionError {
    #[error("A turn is already in flight")]
    Busy,
    #[error("Invalid transition: {0}")]
    InvalidTransition(String),
}

/// Pure transition function
///
/// Given the same inputs it always produces the same outputs, with no I/O.
pub fn transition(
    state: &TurnState,
    context: &TurnContext,
    event: Event,
) -> Result<TransitionResult, TransitionError> {
    match (state, event) {
        // ============================================================
        // User Message Handling
        // ============================================================

        // Idle + UserMessage -> AwaitingBackend
        // The user turn is appended before the backend snapshot is taken.
        (TurnState::Idle, Event::UserMessage { text }) => {
            Ok(TransitionResult::new(TurnState::AwaitingBackend).with_effects([
                Effect::append_user(text.clone()),
                Effect::ShowIndicator {
                    text: notices::THINKING.to_string(),
                },
                Effect::PublishState,
                Effect::RequestBackend { message: text },
            ]))
        }

        // Busy + UserMessage -> caller queues it
        (_, Event::UserMessage { .. }) => Err(TransitionError::Busy),

        // ============================================================
        // Backend Reply
        // ============================================================

        // AwaitingBackend + BackendReply (new topic) -> RenderingTransition
        (TurnState::AwaitingBackend, Event::BackendReply { reply, category })
            if context.handoff.is_handoff(&category) =>
        {
            let announcement = notices::handoff(&category);
            Ok(TransitionResult::new(TurnState::RenderingTransition { reply, category })
                .with_effects([
                    Effect::update_indicator(announcement),
                    Effect::PublishState,
                    Effect::ScheduleHandoff {
                        delay: context.handoff.delay,
                    },
                ]))
        }

        // AwaitingBackend + BackendReply (same topic) -> RenderingReply
        (TurnState::AwaitingBackend, Event::BackendReply { reply, .. }) => {
            Ok(TransitionResult::new(TurnState::RenderingReply {
                reply: reply.clone(),
            })
            .with_effect(Effect::RemoveIndicator)
            .with_effect(Effect::PublishState)
            .with_effects(render_reply(reply)))
        }

        // RenderingTransition + HandoffElapsed -> RenderingReply
        // The announcement stays visible above the reply.
        (TurnState::RenderingTransition { reply, .. }, Event::HandoffElapsed) => {
            Ok(TransitionResult::new(TurnState::RenderingReply {
                reply: reply.clone(),
            })
            .with_effect(Effect::PublishState)
            .with_effects(render_reply(reply.clone())))
        }

        // ============================================================
        // Backend Failure
        // ============================================================

        // AwaitingBackend + BackendFailed -> RenderingError
        // Nothing is appended; the user turn from step one stays unanswered.
        (TurnState::AwaitingBackend, Event::BackendFailed { kind, .. }) => {
            Ok(TransitionResult::new(TurnState::RenderingError { kind }).with_effects([
                Effect::update_indicator(notices::for_failure(kind)),
                Effect::PublishState,
                Effect::FinishRendering,
            ]))
        }

        // ============================================================
        // Turn Completion
        // ============================================================

        (TurnState::RenderingReply { .. } | TurnState::RenderingError { .. }, Event::Rendered) => {
            Ok(TransitionResult::new(TurnState::Idle)
                .with_effect(Effect::PublishState)
                .with_effect(Effect::NotifyTurnDone))
        }

        // ============================================================
        // Invalid Transitions
        // ============================================================
        (state, event) => Err(TransitionError::InvalidTransition(format!(
            "No transition from {state:?} with event {event:?}"
        ))),
    }
}

fn render_reply(reply: String) -> [Effect; 3] {
    [
        Effect::send_message(reply.clone()),
        Effect::append_assistant(reply),
        Effect::FinishRendering,
    ]
}
