//! Runtime for executing sessions
//!
//! Each session gets its own `SessionRuntime` task, its own history and its
//! own broadcast channel. Nothing mutable is shared between sessions.

mod executor;
mod presenter;
pub mod traits;

#[cfg(test)]
pub mod testing;

pub use executor::SessionRuntime;
pub use presenter::BroadcastPresenter;
pub use traits::*;

use crate::backend::BackendClient;
use crate::config::{Config, ConfigError, HandoffPolicy, Persona};
use crate::notices;
use crate::session::{SessionHistory, Turn};
use crate::state_machine::{Event, TurnContext, TurnState};
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::sync::{broadcast, mpsc, watch, RwLock};
use tokio_util::sync::CancellationToken;

/// Type alias for the runtime the manager spawns
pub type ProductionRuntime = SessionRuntime<Arc<dyn BackendClient>, BroadcastPresenter>;

/// A message as the presentation layer sees it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UiMessage {
    pub id: String,
    pub content: String,
    pub created_at: DateTime<Utc>,
}

impl UiMessage {
    pub fn new(content: impl Into<String>) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            content: content.into(),
            created_at: Utc::now(),
        }
    }
}

/// Events sent to SSE clients
#[derive(Debug, Clone)]
pub enum UiEvent {
    Init {
        messages: Vec<UiMessage>,
        /// Whether a turn is in flight
        busy: bool,
        /// False for sessions blocked by missing configuration
        ready: bool,
    },
    MessageSent {
        message: UiMessage,
    },
    MessageUpdated {
        message: UiMessage,
    },
    MessageRemoved {
        message_id: String,
    },
    StateChange {
        /// Full state as JSON object (e.g., `{"type":"awaiting_backend"}`)
        state: serde_json::Value,
    },
    TurnDone,
    Error {
        message: String,
    },
}

/// Errors returned to the presentation layer
#[derive(Debug, Error, PartialEq, Eq)]
pub enum SessionError {
    #[error("Session not found: {0}")]
    NotFound(String),
    #[error("Session is unavailable: configuration missing")]
    Blocked,
    #[error("Session runtime has stopped")]
    Closed,
}

/// Everything needed to run sessions once configuration checks out
pub struct RelaySetup {
    pub persona: Persona,
    pub handoff: HandoffPolicy,
    pub backend_timeout: Duration,
    pub backend: Arc<dyn BackendClient>,
}

impl RelaySetup {
    pub fn new(config: &Config, backend: Arc<dyn BackendClient>) -> Self {
        Self {
            persona: config.persona.clone(),
            handoff: config.handoff.clone(),
            backend_timeout: config.backend_timeout,
            backend,
        }
    }
}

/// Result of a chat start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionStart {
    pub session_id: String,
    pub ready: bool,
}

/// Link to a running session task
struct RuntimeLink {
    event_tx: mpsc::Sender<Event>,
    history: SessionHistory,
    state_rx: watch::Receiver<TurnState>,
    shutdown: CancellationToken,
}

/// Handle to one session; `runtime` is `None` for blocked sessions
struct SessionHandle {
    presenter: Arc<BroadcastPresenter>,
    broadcast_tx: broadcast::Sender<UiEvent>,
    runtime: Option<RuntimeLink>,
    presence: Arc<Presence>,
}

type SessionMap = Arc<RwLock<HashMap<String, SessionHandle>>>;

/// SSE subscriber bookkeeping for one session
#[derive(Debug, Default)]
struct Presence {
    subscribers: AtomicUsize,
    /// Bumped on every subscribe and release so stale reap timers stand down
    epoch: AtomicU64,
}

/// Held by an SSE stream for as long as the client stays connected. When the
/// last guard of a session drops, the session is reclaimed unless a client
/// reconnects within the grace period.
pub struct SubscriberGuard {
    sessions: SessionMap,
    presence: Arc<Presence>,
    session_id: String,
    grace: Duration,
}

impl Drop for SubscriberGuard {
    fn drop(&mut self) {
        if self.presence.subscribers.fetch_sub(1, Ordering::SeqCst) == 1 {
            tracing::debug!(session_id = %self.session_id, "Last subscriber left");
            schedule_reap(
                self.sessions.clone(),
                self.presence.clone(),
                self.session_id.clone(),
                self.grace,
            );
        }
    }
}

/// Remove the session after `grace` if nobody subscribed in the meantime
fn schedule_reap(sessions: SessionMap, presence: Arc<Presence>, session_id: String, grace: Duration) {
    // Guards can drop after the runtime is gone during shutdown
    let Ok(rt) = tokio::runtime::Handle::try_current() else {
        return;
    };
    let epoch = presence.epoch.fetch_add(1, Ordering::SeqCst) + 1;

    rt.spawn(async move {
        tokio::time::sleep(grace).await;

        // Checked under the write lock; subscribe() counts under the read lock
        let mut map = sessions.write().await;
        let abandoned = presence.subscribers.load(Ordering::SeqCst) == 0
            && presence.epoch.load(Ordering::SeqCst) == epoch;
        let removed = if abandoned { map.remove(&session_id) } else { None };
        drop(map);

        if let Some(handle) = removed {
            close_session(handle);
            tracing::info!(session_id = %session_id, "Reclaimed abandoned session");
        }
    });
}

fn close_session(handle: SessionHandle) {
    if let Some(link) = handle.runtime {
        link.shutdown.cancel();
    }
}

/// How long a session without subscribers survives before it is discarded
pub const DEFAULT_DISCONNECT_GRACE: Duration = Duration::from_secs(60);

/// Manager for all live sessions
pub struct SessionManager {
    setup: Result<RelaySetup, ConfigError>,
    sessions: SessionMap,
    disconnect_grace: Duration,
}

impl SessionManager {
    pub fn new(setup: RelaySetup) -> Self {
        Self {
            setup: Ok(setup),
            sessions: SessionMap::default(),
            disconnect_grace: DEFAULT_DISCONNECT_GRACE,
        }
    }

    /// Every session started by this manager shows the configuration error
    pub fn misconfigured(error: ConfigError) -> Self {
        Self {
            setup: Err(error),
            sessions: SessionMap::default(),
            disconnect_grace: DEFAULT_DISCONNECT_GRACE,
        }
    }

    #[must_use]
    pub fn with_disconnect_grace(mut self, grace: Duration) -> Self {
        self.disconnect_grace = grace;
        self
    }

    pub fn persona(&self) -> Persona {
        match &self.setup {
            Ok(setup) => setup.persona.clone(),
            Err(_) => Persona::default(),
        }
    }

    /// Chat start: create a session with empty history and greet the user.
    /// A session nobody subscribes to is discarded after the grace period.
    pub async fn start_session(&self) -> SessionStart {
        let session_id = uuid::Uuid::new_v4().to_string();
        let (broadcast_tx, _) = broadcast::channel(128);
        let presenter = Arc::new(BroadcastPresenter::new(broadcast_tx.clone()));

        let runtime = match &self.setup {
            Ok(setup) => {
                let link = spawn_runtime(setup, &session_id, &presenter, &broadcast_tx);
                let _ = presenter
                    .send_message(&notices::welcome(&setup.persona))
                    .await;
                tracing::info!(session_id = %session_id, "Session started");
                Some(link)
            }
            Err(e) => {
                tracing::error!(session_id = %session_id, error = %e, "Refusing session start");
                // Blocked sessions never get a runtime or a history
                let _ = presenter.send_message(notices::CONFIG_ERROR).await;
                None
            }
        };
        let ready = runtime.is_some();

        let presence = Arc::new(Presence::default());
        self.sessions.write().await.insert(
            session_id.clone(),
            SessionHandle {
                presenter,
                broadcast_tx,
                runtime,
                presence: presence.clone(),
            },
        );
        schedule_reap(
            self.sessions.clone(),
            presence,
            session_id.clone(),
            self.disconnect_grace,
        );

        SessionStart { session_id, ready }
    }

    /// Message received: hand the text to the session's runtime
    pub async fn send_message(&self, session_id: &str, text: String) -> Result<(), SessionError> {
        let event_tx = {
            let sessions = self.sessions.read().await;
            let handle = sessions
                .get(session_id)
                .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
            let link = handle.runtime.as_ref().ok_or(SessionError::Blocked)?;
            link.event_tx.clone()
        };

        event_tx
            .send(Event::UserMessage { text })
            .await
            .map_err(|_| SessionError::Closed)
    }

    /// Subscribe to session updates, with an init event describing the
    /// current screen. The session stays alive while the guard is held.
    pub async fn subscribe(
        &self,
        session_id: &str,
    ) -> Result<(UiEvent, broadcast::Receiver<UiEvent>, SubscriberGuard), SessionError> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        handle.presence.subscribers.fetch_add(1, Ordering::SeqCst);
        handle.presence.epoch.fetch_add(1, Ordering::SeqCst);
        let guard = SubscriberGuard {
            sessions: self.sessions.clone(),
            presence: handle.presence.clone(),
            session_id: session_id.to_string(),
            grace: self.disconnect_grace,
        };

        // Subscribe before reading the transcript so nothing falls in between
        let rx = handle.broadcast_tx.subscribe();
        let init = UiEvent::Init {
            messages: handle.presenter.transcript(),
            busy: handle
                .runtime
                .as_ref()
                .is_some_and(|link| link.state_rx.borrow().is_busy()),
            ready: handle.runtime.is_some(),
        };

        Ok((init, rx, guard))
    }

    pub async fn history(&self, session_id: &str) -> Result<Arc<Vec<Turn>>, SessionError> {
        let sessions = self.sessions.read().await;
        let handle = sessions
            .get(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;
        let link = handle.runtime.as_ref().ok_or(SessionError::Blocked)?;
        Ok(link.history.get_history())
    }

    /// Session end: discard the history and stop the runtime
    pub async fn end_session(&self, session_id: &str) -> Result<(), SessionError> {
        let handle = self
            .sessions
            .write()
            .await
            .remove(session_id)
            .ok_or_else(|| SessionError::NotFound(session_id.to_string()))?;

        close_session(handle);
        tracing::info!(session_id = %session_id, "Session ended");
        Ok(())
    }

    #[allow(dead_code)] // Used by tests and handy for diagnostics
    pub async fn session_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

/// Spawn the runtime task for a configured session
fn spawn_runtime(
    setup: &RelaySetup,
    session_id: &str,
    presenter: &Arc<BroadcastPresenter>,
    broadcast_tx: &broadcast::Sender<UiEvent>,
) -> RuntimeLink {
    let history = SessionHistory::new();
    let context = TurnContext::new(session_id, setup.handoff.clone(), setup.backend_timeout);
    let (event_tx, event_rx) = mpsc::channel(32);
    let (state_tx, state_rx) = watch::channel(TurnState::Idle);
    let shutdown = CancellationToken::new();

    let runtime: ProductionRuntime = SessionRuntime::new(
        context,
        history.clone(),
        Arc::new(setup.backend.clone()),
        presenter.clone(),
        event_rx,
        event_tx.clone(),
        broadcast_tx.clone(),
        state_tx,
        shutdown.clone(),
    );

    let sid = session_id.to_string();
    tokio::spawn(async move {
        runtime.run().await;
        tracing::info!(session_id = %sid, "Session runtime finished");
    });

    RuntimeLink {
        event_tx,
        history,
        state_rx,
        shutdown,
    }
}
