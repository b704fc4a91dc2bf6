//! Server-Sent Events support

use crate::runtime::{SubscriberGuard, UiEvent};
use axum::response::sse::{Event, KeepAlive, Sse};
use futures::stream::Stream;
use serde_json::json;
use std::convert::Infallible;
use std::time::Duration;
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::StreamExt;

/// Convert broadcast stream to SSE stream
///
/// The stream owns `guard`, so the session learns of the disconnect when
/// axum drops the stream.
pub fn sse_stream(
    init_event: UiEvent,
    broadcast_rx: tokio::sync::broadcast::Receiver<UiEvent>,
    guard: SubscriberGuard,
) -> Sse<impl Stream<Item = Result<Event, Infallible>>> {
    // Create stream that starts with init event then broadcasts
    let init = futures::stream::once(async move { Ok(ui_event_to_axum(init_event)) });

    let broadcasts = BroadcastStream::new(broadcast_rx).filter_map(move |result| {
        let _connected = &guard;
        match result {
            Ok(event) => Some(Ok(ui_event_to_axum(event))),
            Err(_) => None, // Skip lagged messages
        }
    });

    let combined = init.chain(broadcasts);

    Sse::new(combined).keep_alive(
        KeepAlive::new()
            .interval(Duration::from_secs(15))
            .text("ping"),
    )
}

/// Event name and JSON payload for one UI event
pub(super) fn ui_event_payload(event: UiEvent) -> (&'static str, serde_json::Value) {
    match event {
        UiEvent::Init {
            messages,
            busy,
            ready,
        } => (
            "init",
            json!({
                "type": "init",
                "messages": messages,
                "busy": busy,
                "ready": ready
            }),
        ),
        UiEvent::MessageSent { message } => (
            "message_sent",
            json!({
                "type": "message_sent",
                "message": message
            }),
        ),
        UiEvent::MessageUpdated { message } => (
            "message_updated",
            json!({
                "type": "message_updated",
                "message": message
            }),
        ),
        UiEvent::MessageRemoved { message_id } => (
            "message_removed",
            json!({
                "type": "message_removed",
                "message_id": message_id
            }),
        ),
        UiEvent::StateChange { state } => (
            "state_change",
            json!({
                "type": "state_change",
                "state": state
            }),
        ),
        UiEvent::TurnDone => (
            "turn_done",
            json!({
                "type": "turn_done"
            }),
        ),
        UiEvent::Error { message } => (
            "error",
            json!({
                "type": "error",
                "message": message
            }),
        ),
    }
}

fn ui_event_to_axum(event: UiEvent) -> Event {
    let (event_type, data) = ui_event_payload(event);
    Event::default().event(event_type).data(data.to_string())
}
