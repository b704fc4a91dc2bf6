//! Mock implementations for testing
//!
//! These mocks enable integration testing without real I/O.

use super::traits::*;
use crate::backend::{BackendClient, BackendError, BackendReply, BackendRequest};
use crate::config::HandoffPolicy;
use crate::runtime::{SessionRuntime, UiEvent};
use crate::session::{SessionHistory, Turn};
use crate::state_machine::{Event, TurnContext, TurnState};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::{broadcast, mpsc, watch, Notify};
use tokio_util::sync::CancellationToken;

// ============================================================================
// Mock Backend
// ============================================================================

/// Mock backend that returns queued results
pub struct MockBackend {
    results: Mutex<VecDeque<Result<BackendReply, BackendError>>>,
    /// Record of all requests made
    pub requests: Mutex<Vec<BackendRequest>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            results: Mutex::new(VecDeque::new()),
            requests: Mutex::new(Vec::new()),
        }
    }

    /// Queue a successful reply
    pub fn queue_reply(&self, reply: BackendReply) {
        self.results.lock().unwrap().push_back(Ok(reply));
    }

    /// Queue a failure
    pub fn queue_error(&self, error: BackendError) {
        self.results.lock().unwrap().push_back(Err(error));
    }

    /// Get recorded requests
    pub fn recorded_requests(&self) -> Vec<BackendRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn next_result(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        self.requests.lock().unwrap().push(request.clone());
        self.results
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(BackendError::connect("No mock result queued")))
    }
}

impl Default for MockBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BackendClient for MockBackend {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        self.next_result(request)
    }
}

// ============================================================================
// Delayed Mock Backend (for timeout and queueing tests)
// ============================================================================

/// Mock backend that sleeps before answering
pub struct DelayedMockBackend {
    inner: MockBackend,
    delay: Duration,
    /// Notified when a request starts (for test synchronization)
    pub request_started: Arc<Notify>,
}

impl DelayedMockBackend {
    pub fn new(delay: Duration) -> Self {
        Self {
            inner: MockBackend::new(),
            delay,
            request_started: Arc::new(Notify::new()),
        }
    }

    pub fn queue_reply(&self, reply: BackendReply) {
        self.inner.queue_reply(reply);
    }

    pub fn recorded_requests(&self) -> Vec<BackendRequest> {
        self.inner.recorded_requests()
    }
}

#[async_trait]
impl BackendClient for DelayedMockBackend {
    async fn send(&self, request: &BackendRequest) -> Result<BackendReply, BackendError> {
        self.request_started.notify_one();
        tokio::time::sleep(self.delay).await;
        self.inner.next_result(request)
    }
}

// ============================================================================
// Recording Presenter
// ============================================================================

/// One action taken on screen
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UiAction {
    Sent { id: String, content: String },
    Updated { id: String, content: String },
    Removed { id: String },
}

/// Presenter that records every action in order
#[derive(Default)]
pub struct RecordingPresenter {
    actions: Mutex<Vec<UiAction>>,
    next_id: Mutex<u64>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn actions(&self) -> Vec<UiAction> {
        self.actions.lock().unwrap().clone()
    }

    /// Contents of every sent or updated message, in order of appearance
    pub fn displayed_texts(&self) -> Vec<String> {
        self.actions()
            .into_iter()
            .filter_map(|action| match action {
                UiAction::Sent { content, .. } | UiAction::Updated { content, .. } => Some(content),
                UiAction::Removed { .. } => None,
            })
            .collect()
    }
}

#[async_trait]
impl Presenter for RecordingPresenter {
    async fn send_message(&self, content: &str) -> Result<String, String> {
        let id = {
            let mut next = self.next_id.lock().unwrap();
            *next += 1;
            format!("msg-{next}")
        };
        self.actions.lock().unwrap().push(UiAction::Sent {
            id: id.clone(),
            content: content.to_string(),
        });
        Ok(id)
    }

    async fn update_message(&self, message_id: &str, content: &str) -> Result<(), String> {
        self.actions.lock().unwrap().push(UiAction::Updated {
            id: message_id.to_string(),
            content: content.to_string(),
        });
        Ok(())
    }

    async fn remove_message(&self, message_id: &str) -> Result<(), String> {
        self.actions.lock().unwrap().push(UiAction::Removed {
            id: message_id.to_string(),
        });
        Ok(())
    }
}

// ============================================================================
// Test Runtime Builder
// ============================================================================

/// Helper for building test runtimes with minimal boilerplate
pub struct TestRuntime<B: BackendClient + 'static> {
    pub history: SessionHistory,
    pub event_tx: mpsc::Sender<Event>,
    pub broadcast_rx: broadcast::Receiver<UiEvent>,
    pub state_rx: watch::Receiver<TurnState>,
    pub backend: Arc<B>,
    pub presenter: Arc<RecordingPresenter>,
    pub shutdown: CancellationToken,
    runtime_handle: tokio::task::JoinHandle<()>,
}

impl TestRuntime<MockBackend> {
    /// Create a simple test runtime with instant mocks
    pub fn builder() -> TestRuntimeBuilder<MockBackend> {
        TestRuntimeBuilder::new()
    }
}

pub struct TestRuntimeBuilder<B> {
    session_id: String,
    handoff: HandoffPolicy,
    backend_timeout: Duration,
    backend: Option<B>,
}

impl TestRuntimeBuilder<MockBackend> {
    pub fn new() -> Self {
        Self {
            session_id: "test-session".to_string(),
            handoff: HandoffPolicy::new(
                ["General", "AccountProfileOther"],
                Duration::from_millis(10),
            ),
            backend_timeout: Duration::from_secs(2),
            backend: None,
        }
    }
}

impl Default for TestRuntimeBuilder<MockBackend> {
    fn default() -> Self {
        Self::new()
    }
}

impl<B: BackendClient + 'static> TestRuntimeBuilder<B> {
    pub fn backend<B2: BackendClient + 'static>(self, backend: B2) -> TestRuntimeBuilder<B2> {
        TestRuntimeBuilder {
            session_id: self.session_id,
            handoff: self.handoff,
            backend_timeout: self.backend_timeout,
            backend: Some(backend),
        }
    }

    pub fn backend_timeout(mut self, timeout: Duration) -> Self {
        self.backend_timeout = timeout;
        self
    }

    pub fn handoff(mut self, handoff: HandoffPolicy) -> Self {
        self.handoff = handoff;
        self
    }

    pub fn build(self) -> TestRuntime<B>
    where
        B: Default,
    {
        let backend = Arc::new(self.backend.unwrap_or_default());
        let history = SessionHistory::new();
        let presenter = Arc::new(RecordingPresenter::new());

        let context = TurnContext::new(&self.session_id, self.handoff, self.backend_timeout);
        let (event_tx, event_rx) = mpsc::channel(32);
        let (broadcast_tx, broadcast_rx) = broadcast::channel(128);
        let (state_tx, state_rx) = watch::channel(TurnState::Idle);
        let shutdown = CancellationToken::new();

        let runtime = SessionRuntime::new(
            context,
            history.clone(),
            backend.clone(),
            presenter.clone(),
            event_rx,
            event_tx.clone(),
            broadcast_tx,
            state_tx,
            shutdown.clone(),
        );

        let handle = tokio::spawn(async move {
            runtime.run().await;
        });

        TestRuntime {
            history,
            event_tx,
            broadcast_rx,
            state_rx,
            backend,
            presenter,
            shutdown,
            runtime_handle: handle,
        }
    }
}

impl Default for DelayedMockBackend {
    fn default() -> Self {
        Self::new(Duration::ZERO)
    }
}

impl<B: BackendClient + 'static> TestRuntime<B> {
    /// Send user message to the runtime
    pub async fn send_message(&self, text: &str) {
        self.event_tx
            .send(Event::user_message(text))
            .await
            .expect("Failed to send message");
    }

    /// Wait for TurnDone event with timeout
    pub async fn wait_for_done(&mut self, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::TurnDone)) => return true,
                Ok(Ok(_)) => continue,
                _ => continue,
            }
        }
        false
    }

    /// Wait for a specific state type with timeout
    pub async fn wait_for_state(&mut self, expected_type: &str, timeout: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + timeout;
        while tokio::time::Instant::now() < deadline {
            match tokio::time::timeout(Duration::from_millis(50), self.broadcast_rx.recv()).await {
                Ok(Ok(UiEvent::StateChange { state })) => {
                    if state.get("type").and_then(|v| v.as_str()) == Some(expected_type) {
                        return true;
                    }
                }
                Ok(Ok(_)) => continue,
                _ => continue,
            }
        }
        false
    }

    pub fn history(&self) -> Vec<Turn> {
        self.history.get_history().to_vec()
    }

    /// Stop the runtime and wait for its task to end
    pub async fn shutdown(self, timeout: Duration) -> bool {
        self.shutdown.cancel();
        tokio::time::timeout(timeout, self.runtime_handle).await.is_ok()
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::BackendErrorKind;
    use crate::notices;
    use crate::session::Role;

    #[tokio::test]
    async fn test_mock_backend() {
        let mock = MockBackend::new();
        mock.queue_reply(BackendReply::new("Hello", "General"));

        let request = BackendRequest::new("Hi", Vec::new());
        let reply = mock.send(&request).await.unwrap();
        assert_eq!(reply.response, "Hello");

        // Empty queue behaves like an unreachable backend
        let err = mock.send(&request).await.unwrap_err();
        assert_eq!(err.kind, BackendErrorKind::Connect);
        assert_eq!(mock.recorded_requests().len(), 2);
    }

    /// Integration test: plain reply in a no-transition category
    #[tokio::test]
    async fn test_simple_reply() {
        let backend = MockBackend::new();
        backend.queue_reply(BackendReply::new("Hello!", "General"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_message("Hi").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        let history = rt.history();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0], Turn::user("Hi"));
        assert_eq!(history[1], Turn::assistant("Hello!"));

        // Indicator removed without any hand-off text
        let actions = rt.presenter.actions();
        assert_eq!(
            actions,
            vec![
                UiAction::Sent {
                    id: "msg-1".to_string(),
                    content: notices::THINKING.to_string(),
                },
                UiAction::Removed {
                    id: "msg-1".to_string(),
                },
                UiAction::Sent {
                    id: "msg-2".to_string(),
                    content: "Hello!".to_string(),
                },
            ]
        );
        assert_eq!(*rt.state_rx.borrow(), TurnState::Idle);
    }

    /// Integration test: hand-off announcement comes before the reply
    #[tokio::test]
    async fn test_handoff_rendering_sequence() {
        let backend = MockBackend::new();
        backend.queue_reply(BackendReply::new("Your order ships tomorrow.", "OrderStatus"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_message("Where is my order?").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        assert_eq!(
            rt.presenter.displayed_texts(),
            vec![
                notices::THINKING.to_string(),
                "🔄 *Connecting you to the OrderStatus Specialist...*".to_string(),
                "Your order ships tomorrow.".to_string(),
            ]
        );
        assert!(!rt
            .presenter
            .actions()
            .iter()
            .any(|a| matches!(a, UiAction::Removed { .. })));
        assert_eq!(rt.history().len(), 2);
    }

    /// Integration test: the no-transition set comes from configuration
    #[tokio::test]
    async fn test_configured_no_transition_categories() {
        let backend = MockBackend::new();
        backend.queue_reply(BackendReply::new("Sure.", "Billing"));

        let mut rt = TestRuntime::builder()
            .backend(backend)
            .handoff(HandoffPolicy::new(["Billing"], Duration::from_millis(10)))
            .build();
        rt.send_message("Refund?").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);
        assert!(!rt
            .presenter
            .displayed_texts()
            .iter()
            .any(|t| t.contains("Connecting you")));
    }

    /// Integration test: non-200 keeps only the user turn
    #[tokio::test]
    async fn test_status_error_handling() {
        let backend = MockBackend::new();
        backend.queue_error(BackendError::status(500, "HTTP 500"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_message("Hi").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        assert_eq!(rt.history(), vec![Turn::user("Hi")]);
        assert_eq!(
            rt.presenter.actions().last(),
            Some(&UiAction::Updated {
                id: "msg-1".to_string(),
                content: notices::SERVICE_UNAVAILABLE.to_string(),
            })
        );
    }

    #[tokio::test]
    async fn test_connection_error_handling() {
        // Nothing queued: the mock fails to connect
        let mut rt = TestRuntime::builder().build();
        rt.send_message("Hi").await;

        assert!(rt.wait_for_state("rendering_error", Duration::from_secs(2)).await);
        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        assert_eq!(rt.history().len(), 1);
        assert_eq!(
            rt.presenter.displayed_texts().last().map(String::as_str),
            Some(notices::CONNECTION_ERROR)
        );
    }

    /// Integration test: a slow backend hits the bound
    #[tokio::test]
    async fn test_backend_timeout() {
        let backend = DelayedMockBackend::new(Duration::from_secs(5));
        backend.queue_reply(BackendReply::new("too late", "General"));

        let mut rt = TestRuntime::builder()
            .backend(backend)
            .backend_timeout(Duration::from_millis(50))
            .build();
        rt.send_message("Hi").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        assert_eq!(rt.history(), vec![Turn::user("Hi")]);
        assert_eq!(
            rt.presenter.displayed_texts().last().map(String::as_str),
            Some(notices::TIMEOUT)
        );
    }

    /// Integration test: each request carries all prior turns plus the new
    /// message, but never the reply it is waiting for
    #[tokio::test]
    async fn test_request_history_snapshot() {
        let backend = MockBackend::new();
        backend.queue_reply(BackendReply::new("a1", "General"));
        backend.queue_reply(BackendReply::new("a2", "General"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_message("q1").await;
        assert!(rt.wait_for_done(Duration::from_secs(2)).await);
        rt.send_message("q2").await;
        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        let requests = rt.backend.recorded_requests();
        assert_eq!(requests.len(), 2);

        assert_eq!(requests[0].message, "q1");
        assert_eq!(requests[0].history, vec![Turn::user("q1")]);

        assert_eq!(requests[1].message, "q2");
        assert_eq!(
            requests[1].history,
            vec![Turn::user("q1"), Turn::assistant("a1"), Turn::user("q2")]
        );
    }

    /// Integration test: messages sent mid-turn run afterwards, in order
    #[tokio::test]
    async fn test_messages_queue_in_arrival_order() {
        let backend = DelayedMockBackend::new(Duration::from_millis(50));
        backend.queue_reply(BackendReply::new("a1", "General"));
        backend.queue_reply(BackendReply::new("a2", "General"));

        let mut rt = TestRuntime::builder().backend(backend).build();
        rt.send_message("q1").await;
        rt.send_message("q2").await;

        assert!(rt.wait_for_done(Duration::from_secs(2)).await);
        assert!(rt.wait_for_done(Duration::from_secs(2)).await);

        let roles: Vec<Role> = rt.history().iter().map(|t| t.role).collect();
        assert_eq!(roles, vec![Role::User, Role::Assistant, Role::User, Role::Assistant]);
        assert_eq!(
            rt.history(),
            vec![
                Turn::user("q1"),
                Turn::assistant("a1"),
                Turn::user("q2"),
                Turn::assistant("a2"),
            ]
        );

        let requests = rt.backend.recorded_requests();
        assert_eq!(requests[1].history.len(), 3);
    }

    /// Integration test: shutdown abandons the in-flight call
    #[tokio::test]
    async fn test_shutdown_during_backend_call() {
        let backend = DelayedMockBackend::new(Duration::from_secs(5));
        backend.queue_reply(BackendReply::new("discarded", "General"));
        let started = backend.request_started.clone();

        let rt = TestRuntime::builder()
            .backend(backend)
            .backend_timeout(Duration::from_secs(10))
            .build();
        rt.send_message("Hi").await;

        tokio::time::timeout(Duration::from_secs(2), started.notified())
            .await
            .expect("backend call should start");

        let history = rt.history.clone();
        assert!(rt.shutdown(Duration::from_secs(1)).await);
        assert_eq!(history.get_history().len(), 1);
    }
}
