//! Session registry
//!
//! Tracks every in-flight exchange by session key so a client-side
//! cancel (or the deadline path) can abort the upstream request and
//! close the outbound channel. The registry is the only shared mutable
//! state in the system; sessions under different keys never interact.

use crate::publish::EventPublisher;
use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Instant;
use tokio::sync::oneshot;
use tracing::{debug, info, warn};

/// Cancellable handle for one registered session
pub struct SessionHandle {
    /// Fired to abort the upstream request; best-effort
    abort_tx: Option<oneshot::Sender<()>>,

    /// Guard for the session's outbound channel
    publisher: Arc<EventPublisher>,

    /// Registration time, for the closing log line
    registered_at: Instant,
}

impl SessionHandle {
    /// Create a handle from an abort signal and the session's publisher
    pub fn new(abort_tx: oneshot::Sender<()>, publisher: Arc<EventPublisher>) -> Self {
        Self {
            abort_tx: Some(abort_tx),
            publisher,
            registered_at: Instant::now(),
        }
    }
}

/// Keyed store of in-flight sessions
#[derive(Clone, Default)]
pub struct SessionRegistry {
    sessions: Arc<RwLock<HashMap<String, SessionHandle>>>,
}

impl SessionRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Associate a cancellable handle with a session key, replacing any
    /// prior registration for the same key.
    pub fn register(&self, session_key: &str, handle: SessionHandle) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        if sessions.insert(session_key.to_string(), handle).is_some() {
            warn!("SESSION_REGISTER replaced existing session={}", session_key);
        }
    }

    /// Cancel a session. Aborts the upstream request if still pending and
    /// closes the outbound channel without a further frame. Returns
    /// `false` if no session is registered under the key, which includes
    /// sessions that already reached a terminal state.
    pub async fn cancel(&self, session_key: &str) -> bool {
        let handle = {
            let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
            sessions.remove(session_key)
        };
        let Some(mut handle) = handle else {
            debug!("SESSION_CANCEL no-op session={}", session_key);
            return false;
        };

        if let Some(abort_tx) = handle.abort_tx.take() {
            // The job may already have finished; that is fine.
            let _ = abort_tx.send(());
        }
        handle.publisher.cancel().await;
        info!(
            "SESSION_CANCEL session={} age_ms={}",
            session_key,
            handle.registered_at.elapsed().as_millis()
        );
        true
    }

    /// Remove a registration, but only while it still belongs to the
    /// caller. When a continuation reused the key and overwrote the
    /// entry, the replaced job's teardown must not take the live
    /// session's registration with it.
    pub fn cleanup_if(&self, session_key: &str, publisher: &Arc<EventPublisher>) {
        let mut sessions = self.sessions.write().unwrap_or_else(|e| e.into_inner());
        match sessions.get(session_key) {
            Some(handle) if Arc::ptr_eq(&handle.publisher, publisher) => {
                sessions.remove(session_key);
                debug!("SESSION_CLEANUP session={}", session_key);
            }
            Some(_) => {
                debug!("SESSION_CLEANUP stale entry kept session={}", session_key);
            }
            None => {}
        }
    }

    /// Number of currently registered sessions
    pub fn active_count(&self) -> usize {
        self.sessions
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::publish::create_event_channel;

    fn registered(registry: &SessionRegistry, key: &str) -> (Arc<EventPublisher>, oneshot::Receiver<()>) {
        let (sender, receiver) = create_event_channel(8);
        // Cancellation closes the channel without emitting, so the
        // receiver does not need to stay alive.
        drop(receiver);
        let publisher = Arc::new(EventPublisher::new(sender));
        let (abort_tx, abort_rx) = oneshot::channel();
        registry.register(key, SessionHandle::new(abort_tx, publisher.clone()));
        (publisher, abort_rx)
    }

    #[tokio::test]
    async fn test_cancel_aborts_and_removes() {
        let registry = SessionRegistry::new();
        let (publisher, mut abort_rx) = registered(&registry, "s-1");
        assert_eq!(registry.active_count(), 1);

        assert!(registry.cancel("s-1").await);
        assert_eq!(registry.active_count(), 0);
        assert!(publisher.is_closed());
        assert!(abort_rx.try_recv().is_ok());
    }

    #[tokio::test]
    async fn test_cancel_unknown_session_is_noop() {
        let registry = SessionRegistry::new();
        assert!(!registry.cancel("missing").await);
    }

    #[tokio::test]
    async fn test_cancel_is_idempotent() {
        let registry = SessionRegistry::new();
        let _ = registered(&registry, "s-1");

        assert!(registry.cancel("s-1").await);
        // Second cancel finds nothing and must not error.
        assert!(!registry.cancel("s-1").await);
    }

    #[tokio::test]
    async fn test_register_overwrites_same_key() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = registered(&registry, "s-1");
        let (second, _rx2) = registered(&registry, "s-1");
        assert_eq!(registry.active_count(), 1);

        assert!(registry.cancel("s-1").await);
        assert!(second.is_closed());
        assert!(!first.is_closed());
    }

    #[tokio::test]
    async fn test_cleanup_removes_without_cancelling() {
        let registry = SessionRegistry::new();
        let (publisher, _rx) = registered(&registry, "s-1");

        registry.cleanup_if("s-1", &publisher);
        assert_eq!(registry.active_count(), 0);
        assert!(!publisher.is_closed());

        // Cleanup of an unknown key is a no-op.
        registry.cleanup_if("s-1", &publisher);
    }

    #[tokio::test]
    async fn test_replaced_job_teardown_keeps_live_registration() {
        let registry = SessionRegistry::new();
        let (first, _rx1) = registered(&registry, "s-1");
        let (second, _rx2) = registered(&registry, "s-1");

        // The replaced job finishes after the overwrite; its teardown
        // must leave the live session cancellable.
        registry.cleanup_if("s-1", &first);
        assert_eq!(registry.active_count(), 1);

        assert!(registry.cancel("s-1").await);
        assert!(second.is_closed());
        assert!(!first.is_closed());
        assert_eq!(registry.active_count(), 0);
    }

    #[tokio::test]
    async fn test_independent_keys_do_not_interact() {
        let registry = SessionRegistry::new();
        let (a, _rx_a) = registered(&registry, "a");
        let (b, _rx_b) = registered(&registry, "b");

        assert!(registry.cancel("a").await);
        assert!(a.is_closed());
        assert!(!b.is_closed());
        assert_eq!(registry.active_count(), 1);
    }
}
