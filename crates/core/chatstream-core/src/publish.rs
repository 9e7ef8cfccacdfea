//! Output publisher and terminal-state guard
//!
//! Wraps the outbound event channel and is the single authority for
//! terminal transitions: every component signals completion, failure, or
//! cancellation through the publisher instead of touching the channel.
//! Closing is idempotent and terminal states are absorbing.

use crate::events::{EventKind, NormalizedEvent};
use std::sync::atomic::{AtomicBool, Ordering};
use tokio::sync::{mpsc, Mutex};
use tracing::debug;

/// Session lifecycle state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// Request accepted, no content yet
    Connecting,
    /// At least one chunk has been published
    Streaming,
    /// Terminal: finished normally
    Completed,
    /// Terminal: finished with an error event
    Errored,
    /// Terminal: aborted by the client or the deadline path
    Cancelled,
}

impl SessionState {
    /// Whether this state is absorbing
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            SessionState::Completed | SessionState::Errored | SessionState::Cancelled
        )
    }
}

/// Outbound side of the event channel
pub type EventSender = mpsc::Sender<NormalizedEvent>;

/// Inbound side of the event channel, consumed by the SSE encoder
pub type EventReceiver = mpsc::Receiver<NormalizedEvent>;

/// Create the per-session event channel
pub fn create_event_channel(capacity: usize) -> (EventSender, EventReceiver) {
    mpsc::channel(capacity)
}

struct Inner {
    /// Dropped on close, which ends the receiver stream
    sender: Option<EventSender>,
    state: SessionState,
}

/// Terminal-state guard around the outbound channel
pub struct EventPublisher {
    inner: Mutex<Inner>,
    closed: AtomicBool,
}

impl EventPublisher {
    /// Wrap an outbound sender in a fresh guard
    pub fn new(sender: EventSender) -> Self {
        Self {
            inner: Mutex::new(Inner {
                sender: Some(sender),
                state: SessionState::Connecting,
            }),
            closed: AtomicBool::new(false),
        }
    }

    /// Publish one event. Terminal events transition and close the
    /// channel; everything published after a terminal event is dropped.
    pub async fn publish(&self, event: NormalizedEvent) {
        match event.kind {
            EventKind::Complete => self.finish(SessionState::Completed, Some(event)).await,
            EventKind::Error => self.finish(SessionState::Errored, Some(event)).await,
            _ => {
                let mut inner = self.inner.lock().await;
                if inner.state.is_terminal() {
                    debug!("PUBLISH_DROP kind={:?} after terminal state", event.kind);
                    return;
                }
                let is_chunk = event.kind == EventKind::Chunk;
                let sent = match &inner.sender {
                    Some(sender) => sender.send(event).await.is_ok(),
                    None => false,
                };
                if sent && is_chunk && inner.state == SessionState::Connecting {
                    inner.state = SessionState::Streaming;
                }
            }
        }
    }

    /// Publish a terminal `complete` event and close
    pub async fn complete(&self, content: impl Into<String>) {
        self.finish(
            SessionState::Completed,
            Some(NormalizedEvent::complete(content)),
        )
        .await;
    }

    /// Publish a terminal `error` event and close
    pub async fn fail(&self, message: impl Into<String>) {
        self.finish(SessionState::Errored, Some(NormalizedEvent::error(message)))
            .await;
    }

    /// Mark the session cancelled and close without emitting a frame
    pub async fn cancel(&self) {
        self.finish(SessionState::Cancelled, None).await;
    }

    /// Close the outbound channel. Safe to call any number of times; only
    /// the first call has effect.
    pub async fn close_once(&self) {
        let mut inner = self.inner.lock().await;
        if inner.sender.take().is_none() {
            debug!("PUBLISHER_CLOSE already closed");
            return;
        }
        self.closed.store(true, Ordering::SeqCst);
    }

    /// Whether the channel has been closed
    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }

    /// Current session state
    pub async fn state(&self) -> SessionState {
        self.inner.lock().await.state
    }

    async fn finish(&self, state: SessionState, event: Option<NormalizedEvent>) {
        let mut inner = self.inner.lock().await;
        if inner.state.is_terminal() {
            debug!(
                "PUBLISHER_CLOSE duplicate terminal transition ignored current={:?} requested={:?}",
                inner.state, state
            );
            return;
        }
        inner.state = state;
        let sender = inner.sender.take();
        self.closed.store(true, Ordering::SeqCst);
        if let (Some(sender), Some(event)) = (sender, event) {
            // Sender drops right after, which ends the receiver stream.
            let _ = sender.send(event).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn publisher() -> (EventPublisher, EventReceiver) {
        let (sender, receiver) = create_event_channel(16);
        (EventPublisher::new(sender), receiver)
    }

    #[tokio::test]
    async fn test_publish_and_complete() {
        let (publisher, mut receiver) = publisher();
        publisher.publish(NormalizedEvent::connecting()).await;
        publisher.publish(NormalizedEvent::chunk("Hello")).await;
        publisher.complete("").await;

        assert_eq!(receiver.recv().await.unwrap().kind, EventKind::Connecting);
        assert_eq!(receiver.recv().await.unwrap().content, "Hello");
        assert_eq!(receiver.recv().await.unwrap().kind, EventKind::Complete);
        // Channel closed after the terminal event.
        assert!(receiver.recv().await.is_none());
        assert_eq!(publisher.state().await, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_streaming_entered_on_first_chunk() {
        let (publisher, mut receiver) = publisher();
        assert_eq!(publisher.state().await, SessionState::Connecting);
        publisher.publish(NormalizedEvent::connecting()).await;
        assert_eq!(publisher.state().await, SessionState::Connecting);
        publisher.publish(NormalizedEvent::chunk("x")).await;
        assert_eq!(publisher.state().await, SessionState::Streaming);
        let _ = receiver.recv().await;
    }

    #[tokio::test]
    async fn test_no_events_after_terminal() {
        let (publisher, mut receiver) = publisher();
        publisher.complete("done").await;
        publisher.publish(NormalizedEvent::chunk("late")).await;
        publisher.fail("late error").await;

        let first = receiver.recv().await.unwrap();
        assert_eq!(first.kind, EventKind::Complete);
        assert!(receiver.recv().await.is_none());
        assert_eq!(publisher.state().await, SessionState::Completed);
    }

    #[tokio::test]
    async fn test_close_once_is_idempotent() {
        let (publisher, mut receiver) = publisher();
        publisher.close_once().await;
        publisher.close_once().await;
        publisher.close_once().await;
        assert!(publisher.is_closed());
        assert!(receiver.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_cancel_is_absorbing_and_silent() {
        let (publisher, mut receiver) = publisher();
        publisher.publish(NormalizedEvent::chunk("partial")).await;
        publisher.cancel().await;
        publisher.cancel().await;
        publisher.complete("ignored").await;

        assert_eq!(receiver.recv().await.unwrap().content, "partial");
        // No terminal frame after cancellation, just a closed channel.
        assert!(receiver.recv().await.is_none());
        assert_eq!(publisher.state().await, SessionState::Cancelled);
    }

    #[tokio::test]
    async fn test_publish_after_receiver_dropped_is_harmless() {
        let (publisher, receiver) = publisher();
        drop(receiver);
        publisher.publish(NormalizedEvent::chunk("x")).await;
        publisher.complete("").await;
        assert_eq!(publisher.state().await, SessionState::Completed);
    }
}
