//! Chat Session Controller
//!
//! Orchestrates one request/response cycle: builds the request from the
//! conversation buffer, dispatches it through the transport, drives the
//! frame decoder over the response stream, updates the buffer, notifies
//! the render sink, and finalizes the turn.
//!
//! # State machine
//!
//! ```text
//! Idle ──submit──▶ Sending ──first chunk──▶ Streaming ──▶ Completed
//!                     │                         │    └───▶ Errored
//!                     │                         └────────▶ Cancelled
//!                     └──transport failure────▶ Errored
//! ```
//!
//! Terminal states reset to a fresh turn on the next submit. A submit
//! while a turn is active is rejected without touching the active turn.
//!
//! # Concurrency
//!
//! The controller is single-owner: one logical thread drives the event
//! loop, and the decoder, buffer, and sink all run synchronously inside
//! it. Cancellation is cooperative through a [`CancelHandle`]; the token
//! is consulted before each event is applied, so a chunk already in
//! flight when cancellation lands is discarded rather than applied.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures::StreamExt;
use tokio::sync::Notify;

use crate::buffer::ConversationBuffer;
use crate::config::SessionConfig;
use crate::error::ChatError;
use crate::frame::{FrameDecoder, StreamFrame};
use crate::messages::{RequestPayload, Role};
use crate::sink::RenderSink;
use crate::transport::ChatTransport;

/// Lifecycle of one chat turn
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    /// No active request
    Idle,
    /// Request dispatched, no response byte received yet
    Sending,
    /// Response stream in progress
    Streaming,
    /// Stream ended normally
    Completed,
    /// Turn cancelled by the user
    Cancelled,
    /// Turn failed
    Errored,
}

impl SessionState {
    /// Whether a turn is currently in flight
    #[must_use]
    pub fn is_active(&self) -> bool {
        matches!(self, Self::Sending | Self::Streaming)
    }

    /// Human-readable description
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Sending => "sending",
            Self::Streaming => "streaming",
            Self::Completed => "completed",
            Self::Cancelled => "cancelled",
            Self::Errored => "errored",
        }
    }
}

/// How one turn ended
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnOutcome {
    /// Stream completed; carries the final assistant content
    Completed(String),
    /// Turn cancelled by the user; in-progress content discarded
    Cancelled,
    /// Turn failed; the sink has been notified exactly once
    Errored(ChatError),
}

#[derive(Debug, Default)]
struct CancelFlag {
    cancelled: AtomicBool,
    notify: Notify,
}

/// Clonable cancellation token for the active turn
///
/// `cancel` may be called from any task. The controller consults the
/// token before applying each event and aborts the transport connection
/// as soon as it observes the request.
#[derive(Clone, Debug, Default)]
pub struct CancelHandle {
    inner: Arc<CancelFlag>,
}

impl CancelHandle {
    /// Request cancellation of the active turn
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        self.inner.notify.notify_waiters();
    }

    /// Whether cancellation has been requested
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Resolve once cancellation is requested
    pub async fn cancelled(&self) {
        loop {
            let notified = self.inner.notify.notified();
            if self.is_cancelled() {
                return;
            }
            notified.await;
        }
    }

    /// Re-arm the token for a fresh turn
    fn reset(&self) {
        self.inner.cancelled.store(false, Ordering::SeqCst);
    }
}

/// Drives one conversation's chat turns
pub struct SessionController<T: ChatTransport, S: RenderSink> {
    config: SessionConfig,
    transport: T,
    sink: S,
    buffer: ConversationBuffer,
    state: SessionState,
    cancel: CancelHandle,
}

impl<T: ChatTransport, S: RenderSink> SessionController<T, S> {
    /// Create a controller for a fresh conversation
    pub fn new(transport: T, config: SessionConfig, sink: S) -> Self {
        Self {
            config,
            transport,
            sink,
            buffer: ConversationBuffer::new(),
            state: SessionState::Idle,
            cancel: CancelHandle::default(),
        }
    }

    /// Current session state
    #[must_use]
    pub fn state(&self) -> SessionState {
        self.state
    }

    /// The conversation history
    #[must_use]
    pub fn buffer(&self) -> &ConversationBuffer {
        &self.buffer
    }

    /// Clonable token for cancelling the active turn
    ///
    /// The token is re-armed on each submit, so one handle serves the
    /// whole session.
    #[must_use]
    pub fn cancel_handle(&self) -> CancelHandle {
        self.cancel.clone()
    }

    /// Clear the conversation history between turns
    pub fn clear_history(&mut self) -> Result<(), ChatError> {
        if self.state.is_active() {
            return Err(ChatError::SessionBusy);
        }
        self.buffer.clear();
        self.state = SessionState::Idle;
        Ok(())
    }

    /// Run one chat turn to a terminal state
    ///
    /// Appends the user message (finalized immediately), snapshots the
    /// conversation into the request payload, and drives the response
    /// stream. By the time this returns, the sink has been notified of
    /// the outcome: `on_delta` per content frame, then exactly one of
    /// `on_complete` / `on_error` — or nothing after a cancellation.
    ///
    /// Fails fast with [`ChatError::SessionBusy`] while another turn is
    /// active, without mutating that turn's state.
    pub async fn submit(&mut self, input: &str) -> Result<TurnOutcome, ChatError> {
        if self.state.is_active() {
            return Err(ChatError::SessionBusy);
        }

        self.cancel.reset();
        self.buffer.append(Role::User, input);
        let payload = self.buffer.request_payload(&self.config.model);

        self.state = SessionState::Sending;
        tracing::debug!(model = %self.config.model, messages = payload.messages.len(), "Dispatching chat turn");

        let outcome = self.drive_turn(&payload).await;
        tracing::debug!(state = self.state.description(), "Chat turn finished");
        Ok(outcome)
    }

    /// Drive the dispatched turn to a terminal state
    async fn drive_turn(&mut self, payload: &RequestPayload) -> TurnOutcome {
        let cancel = self.cancel.clone();
        let deadline = self.config.timeout.map(|t| tokio::time::Instant::now() + t);
        let turn_deadline = async move {
            match deadline {
                Some(at) => tokio::time::sleep_until(at).await,
                None => std::future::pending().await,
            }
        };
        tokio::pin!(turn_deadline);

        // Dispatch phase: cancellation and the deadline also apply while
        // the request is still connecting. The dispatch future borrows the
        // transport, so resolve it fully before touching session state.
        enum Dispatch {
            Cancelled,
            TimedOut,
            Opened(Result<crate::transport::ByteStream, ChatError>),
        }

        let dispatch = {
            let send = self.transport.send(payload);
            tokio::pin!(send);
            tokio::select! {
                biased;
                () = cancel.cancelled() => Dispatch::Cancelled,
                () = &mut turn_deadline => Dispatch::TimedOut,
                result = &mut send => Dispatch::Opened(result),
            }
        };

        let mut stream = match dispatch {
            Dispatch::Cancelled => return self.finish_cancelled(),
            Dispatch::TimedOut => return self.finish_timed_out(),
            Dispatch::Opened(Ok(stream)) => stream,
            Dispatch::Opened(Err(e)) => return self.finish_errored(e),
        };

        let mut decoder = self.config.framing.decoder();
        let mut frames = Vec::new();

        loop {
            let event = tokio::select! {
                biased;
                () = cancel.cancelled() => return self.finish_cancelled(),
                () = &mut turn_deadline => return self.finish_timed_out(),
                chunk = stream.next() => chunk,
            };

            match event {
                Some(Ok(bytes)) => {
                    if self.state == SessionState::Sending {
                        if let Err(e) = self.buffer.begin_streaming(Role::Assistant) {
                            return self.finish_errored(e.into());
                        }
                        self.state = SessionState::Streaming;
                    }

                    frames.clear();
                    let decode_result = decoder.feed(&bytes, &mut frames);

                    for frame in frames.drain(..) {
                        // A cancel that landed while this chunk was in
                        // flight discards the rest of it.
                        if cancel.is_cancelled() {
                            return self.finish_cancelled();
                        }

                        match frame {
                            StreamFrame::Delta(text) => {
                                match self.buffer.append_to_streaming(&text) {
                                    Ok(partial) => {
                                        let partial = partial.to_string();
                                        self.sink.on_delta(&partial);
                                    }
                                    Err(e) => return self.finish_errored(e.into()),
                                }
                            }
                            StreamFrame::Done => {
                                return match self.buffer.finalize_streaming() {
                                    Ok(final_content) => {
                                        self.sink.on_complete(&final_content);
                                        self.state = SessionState::Completed;
                                        TurnOutcome::Completed(final_content)
                                    }
                                    Err(e) => self.finish_errored(e.into()),
                                };
                            }
                            StreamFrame::Error(message) => {
                                return self
                                    .finish_errored(ChatError::from_error_frame(message));
                            }
                        }
                    }

                    if let Err(e) = decode_result {
                        return self.finish_errored(e.into());
                    }
                }
                Some(Err(e)) => return self.finish_errored(e),
                None => {
                    // Stream ended without a terminal frame
                    return self.finish_errored(ChatError::Transport(
                        "response stream ended before completion".to_string(),
                    ));
                }
            }
        }
    }

    /// Terminal error path: retain partial content marked failed, notify
    /// the sink exactly once.
    fn finish_errored(&mut self, error: ChatError) -> TurnOutcome {
        self.buffer.mark_streaming_failed();
        self.sink.on_error(&error);
        self.state = SessionState::Errored;
        tracing::warn!(error = %error, "Chat turn failed");
        TurnOutcome::Errored(error)
    }

    /// Terminal cancellation path: discard the in-progress message and
    /// make no further sink calls.
    fn finish_cancelled(&mut self) -> TurnOutcome {
        self.buffer.discard_streaming();
        self.state = SessionState::Cancelled;
        tracing::debug!("Chat turn cancelled");
        TurnOutcome::Cancelled
    }

    /// Deadline expiry: cancellation mechanics, but reported as an error
    fn finish_timed_out(&mut self) -> TurnOutcome {
        self.buffer.discard_streaming();
        let error = ChatError::TimedOut;
        self.sink.on_error(&error);
        self.state = SessionState::Errored;
        tracing::warn!("Chat turn timed out");
        TurnOutcome::Errored(error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sink::test_support::RecordingSink;
    use crate::sink::{ChannelSink, SurfaceUpdate};
    use crate::transport::test_support::{RefusedTransport, ScriptedTransport};
    use crate::transport::{ByteStream, ChatTransport};
    use async_trait::async_trait;
    use bytes::Bytes;
    use pretty_assertions::assert_eq;
    use std::sync::Mutex;
    use tokio::sync::mpsc;
    use tokio_stream::wrappers::UnboundedReceiverStream;

    fn config() -> SessionConfig {
        SessionConfig {
            model: "gpt-4.1-mini".to_string(),
            ..SessionConfig::default()
        }
    }

    /// Transport whose stream is fed chunk-by-chunk from the test
    struct ChannelTransport {
        rx: Mutex<Option<mpsc::UnboundedReceiver<Result<Bytes, ChatError>>>>,
    }

    impl ChannelTransport {
        fn new() -> (Self, mpsc::UnboundedSender<Result<Bytes, ChatError>>) {
            let (tx, rx) = mpsc::unbounded_channel();
            (
                Self {
                    rx: Mutex::new(Some(rx)),
                },
                tx,
            )
        }
    }

    #[async_trait]
    impl ChatTransport for ChannelTransport {
        async fn send(&self, _payload: &RequestPayload) -> Result<ByteStream, ChatError> {
            let rx = self
                .rx
                .lock()
                .unwrap()
                .take()
                .expect("transport dispatched twice");
            Ok(UnboundedReceiverStream::new(rx).boxed())
        }
    }

    #[tokio::test]
    async fn test_hello_scenario() {
        let transport = ScriptedTransport::from_chunks(&[
            "{\"delta\":\"Hel\"}\n{\"del",
            "ta\":\"lo!\"}\n{\"done\":true}\n",
        ]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert_eq!(outcome, TurnOutcome::Completed("Hello!".to_string()));
        assert_eq!(controller.state(), SessionState::Completed);
        assert_eq!(
            controller.sink.deltas,
            vec!["Hel".to_string(), "Hello!".to_string()]
        );
        assert_eq!(controller.sink.completed, vec!["Hello!".to_string()]);
        assert!(controller.sink.errors.is_empty());

        let messages = controller.buffer().all_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[0].role, Role::User);
        assert_eq!(messages[0].content, "hi");
        assert_eq!(messages[1].role, Role::Assistant);
        assert_eq!(messages[1].content, "Hello!");
        assert!(!messages[1].streaming);
    }

    #[tokio::test]
    async fn test_connect_failure_before_first_frame() {
        let mut controller =
            SessionController::new(RefusedTransport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Errored(ChatError::Transport(_))
        ));
        assert_eq!(controller.state(), SessionState::Errored);
        assert_eq!(controller.sink.errors.len(), 1);
        assert!(controller.sink.deltas.is_empty());
        // The user message stays in history for a retry submit
        assert_eq!(controller.buffer().len(), 1);
    }

    #[tokio::test]
    async fn test_mid_stream_drop_retains_partial() {
        let transport = ScriptedTransport::new(vec![
            Ok(Bytes::from_static(b"{\"delta\":\"par\"}\n")),
            Err(ChatError::Transport("connection reset".to_string())),
        ]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Errored(ChatError::Transport(_))
        ));
        assert_eq!(controller.state(), SessionState::Errored);
        assert_eq!(controller.sink.deltas, vec!["par".to_string()]);
        assert_eq!(controller.sink.errors.len(), 1);

        let messages = controller.buffer().all_messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(messages[1].content, "par");
        assert!(messages[1].failed);
    }

    #[tokio::test]
    async fn test_eof_without_terminal_frame_is_transport_error() {
        let transport = ScriptedTransport::from_chunks(&["{\"delta\":\"par\"}\n"]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Errored(ChatError::Transport(_))
        ));
        assert_eq!(controller.sink.deltas, vec!["par".to_string()]);
        assert_eq!(controller.sink.errors.len(), 1);
    }

    #[tokio::test]
    async fn test_in_band_error_frame_is_upstream_error() {
        let transport = ScriptedTransport::from_chunks(&[
            "{\"delta\":\"par\"}\n{\"error\":\"model overloaded\"}\n",
        ]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert_eq!(
            outcome,
            TurnOutcome::Errored(ChatError::Upstream {
                status: 0,
                body: "model overloaded".to_string()
            })
        );
        assert!(controller.buffer().all_messages()[1].failed);
    }

    #[tokio::test]
    async fn test_malformed_frame_applies_prior_deltas_then_fails() {
        let transport =
            ScriptedTransport::from_chunks(&["{\"delta\":\"ok\"}\nnot json\n"]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();

        assert!(matches!(
            outcome,
            TurnOutcome::Errored(ChatError::Decode(_))
        ));
        assert_eq!(controller.sink.deltas, vec!["ok".to_string()]);
        assert_eq!(controller.sink.errors.len(), 1);
        assert_eq!(controller.buffer().all_messages()[1].content, "ok");
    }

    #[tokio::test]
    async fn test_submit_rejected_while_active() {
        let mut controller = SessionController::new(
            ScriptedTransport::from_chunks(&[]),
            config(),
            RecordingSink::default(),
        );
        controller.buffer.append(Role::User, "first");
        controller.state = SessionState::Streaming;

        let err = controller.submit("second").await.unwrap_err();
        assert_eq!(err, ChatError::SessionBusy);

        // The active turn's state is untouched
        assert_eq!(controller.state(), SessionState::Streaming);
        assert_eq!(controller.buffer().len(), 1);
        assert!(controller.sink.deltas.is_empty());
    }

    #[tokio::test]
    async fn test_cancel_discards_in_flight_chunks_and_silences_sink() {
        let (transport, chunk_tx) = ChannelTransport::new();
        let (sink, mut updates) = ChannelSink::new();
        let mut controller = SessionController::new(transport, config(), sink);
        let cancel = controller.cancel_handle();

        chunk_tx
            .send(Ok(Bytes::from_static(b"{\"delta\":\"par\"}\n")))
            .unwrap();

        let turn = tokio::spawn(async move {
            let outcome = controller.submit("hi").await;
            (controller, outcome)
        });

        // Wait for the first delta to reach the surface
        assert_eq!(
            updates.recv().await.unwrap(),
            SurfaceUpdate::Delta {
                content: "par".to_string()
            }
        );

        cancel.cancel();
        // A chunk already in flight when cancellation lands is discarded
        let _ = chunk_tx.send(Ok(Bytes::from_static(b"{\"delta\":\"late\"}\n")));

        let (controller, outcome) = turn.await.unwrap();
        assert_eq!(outcome.unwrap(), TurnOutcome::Cancelled);
        assert_eq!(controller.state(), SessionState::Cancelled);

        // No further sink invocations after cancellation
        assert!(updates.try_recv().is_err());

        // The partial assistant message was discarded; user message kept
        let messages = controller.buffer().all_messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].role, Role::User);
    }

    #[tokio::test]
    async fn test_cancel_during_sending() {
        let (transport, _chunk_tx) = ChannelTransport::new();
        let (sink, mut updates) = ChannelSink::new();
        let mut controller = SessionController::new(transport, config(), sink);
        let cancel = controller.cancel_handle();

        let turn = tokio::spawn(async move {
            let outcome = controller.submit("hi").await;
            (controller, outcome)
        });

        // No frame will ever arrive; cancel while the turn is pending
        tokio::task::yield_now().await;
        cancel.cancel();

        let (controller, outcome) = turn.await.unwrap();
        assert_eq!(outcome.unwrap(), TurnOutcome::Cancelled);
        assert_eq!(controller.state(), SessionState::Cancelled);
        assert!(updates.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_reports_timeout_error() {
        let (transport, _chunk_tx) = ChannelTransport::new();
        let mut controller = SessionController::new(
            transport,
            SessionConfig {
                timeout: Some(std::time::Duration::from_millis(100)),
                ..config()
            },
            RecordingSink::default(),
        );

        let outcome = controller.submit("hi").await.unwrap();

        assert_eq!(outcome, TurnOutcome::Errored(ChatError::TimedOut));
        assert_eq!(controller.state(), SessionState::Errored);
        assert_eq!(controller.sink.errors, vec![ChatError::TimedOut]);
    }

    #[tokio::test]
    async fn test_new_submit_after_terminal_state() {
        let transport = ScriptedTransport::from_chunks(&["{\"done\":true}\n"]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());

        let outcome = controller.submit("hi").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed(String::new()));
        assert_eq!(controller.state(), SessionState::Completed);

        // A terminal state never blocks the next turn
        let outcome = controller.submit("again").await.unwrap();
        assert_eq!(outcome, TurnOutcome::Completed(String::new()));
        assert_eq!(controller.buffer().len(), 4);
    }

    #[tokio::test]
    async fn test_clear_history_between_turns() {
        let transport = ScriptedTransport::from_chunks(&[]);
        let mut controller =
            SessionController::new(transport, config(), RecordingSink::default());
        controller.buffer.append(Role::User, "old");

        controller.clear_history().unwrap();
        assert!(controller.buffer().is_empty());
        assert_eq!(controller.state(), SessionState::Idle);
    }
}
