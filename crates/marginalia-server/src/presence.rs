//! Presence registry: who is connected right now, and how to reach them.
//!
//! The registry is the only in-process shared mutable structure.  Every
//! operation is a single atomic map mutation or read; no invariant spans two
//! operations, so one lock suffices.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use tracing::debug;
use uuid::Uuid;

use marginalia_shared::ServerEvent;

/// Returned when a push cannot reach a session: the socket closed but its
/// registry entry has not been reaped yet.  Non-fatal by contract -- the
/// persisted record remains the durable source of truth.
#[derive(Debug, thiserror::Error)]
#[error("recipient session is gone")]
pub struct DeliveryUnavailable;

/// A live connection belonging to one device of one user.
#[derive(Debug, Clone)]
pub struct SessionHandle {
    conn_id: Uuid,
    tx: mpsc::UnboundedSender<ServerEvent>,
}

impl SessionHandle {
    /// Wrap the sending half of a gateway connection's event channel.
    pub fn new(tx: mpsc::UnboundedSender<ServerEvent>) -> Self {
        Self {
            conn_id: Uuid::new_v4(),
            tx,
        }
    }

    /// Identifier used to remove this handle on disconnect.
    pub fn conn_id(&self) -> Uuid {
        self.conn_id
    }

    /// Queue an event for delivery on this session.
    pub fn push(&self, event: ServerEvent) -> Result<(), DeliveryUnavailable> {
        self.tx.send(event).map_err(|_| DeliveryUnavailable)
    }
}

/// Maps user identity to the live sessions currently representing it.
///
/// Behind a trait so a multi-node deployment can substitute a distributed
/// registry without touching the delivery router.
#[async_trait]
pub trait Presence: Send + Sync {
    /// Record that `handle` now represents `user_id`.  Multiple handles per
    /// user are kept (multi-device).
    async fn announce(&self, user_id: Uuid, handle: SessionHandle);

    /// All live sessions for `user_id`.  Empty when the user is offline --
    /// a normal outcome, not a failure.
    async fn lookup(&self, user_id: Uuid) -> Vec<SessionHandle>;

    /// Remove the session with this connection id, whichever user it belongs
    /// to.  Disconnects are reported by handle, not by user identity.
    async fn forget(&self, conn_id: Uuid);

    /// Number of users with at least one live session.
    async fn online_count(&self) -> usize;
}

/// In-process presence registry scoped to this serving node.  Performs no
/// I/O and cannot fail.
#[derive(Clone, Default)]
pub struct InMemoryPresence {
    sessions: Arc<RwLock<HashMap<Uuid, Vec<SessionHandle>>>>,
}

impl InMemoryPresence {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Presence for InMemoryPresence {
    async fn announce(&self, user_id: Uuid, handle: SessionHandle) {
        debug!(user = %user_id, conn = %handle.conn_id(), "session announced");
        self.sessions
            .write()
            .await
            .entry(user_id)
            .or_default()
            .push(handle);
    }

    async fn lookup(&self, user_id: Uuid) -> Vec<SessionHandle> {
        self.sessions
            .read()
            .await
            .get(&user_id)
            .cloned()
            .unwrap_or_default()
    }

    async fn forget(&self, conn_id: Uuid) {
        let mut sessions = self.sessions.write().await;
        for handles in sessions.values_mut() {
            handles.retain(|handle| handle.conn_id() != conn_id);
        }
        sessions.retain(|_, handles| !handles.is_empty());
        debug!(conn = %conn_id, "session forgotten");
    }

    async fn online_count(&self) -> usize {
        self.sessions.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_handle() -> (SessionHandle, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (SessionHandle::new(tx), rx)
    }

    #[tokio::test]
    async fn announce_lookup_forget_round_trip() {
        let presence = InMemoryPresence::new();
        let user = Uuid::new_v4();

        assert!(presence.lookup(user).await.is_empty());

        let (handle, _rx) = test_handle();
        let conn_id = handle.conn_id();
        presence.announce(user, handle).await;

        let found = presence.lookup(user).await;
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].conn_id(), conn_id);
        assert_eq!(presence.online_count().await, 1);

        presence.forget(conn_id).await;
        assert!(presence.lookup(user).await.is_empty());
        assert_eq!(presence.online_count().await, 0);
    }

    #[tokio::test]
    async fn multi_device_keeps_both_handles() {
        let presence = InMemoryPresence::new();
        let user = Uuid::new_v4();

        let (phone, _rx1) = test_handle();
        let (laptop, _rx2) = test_handle();
        let phone_id = phone.conn_id();

        presence.announce(user, phone).await;
        presence.announce(user, laptop).await;
        assert_eq!(presence.lookup(user).await.len(), 2);

        // Forgetting one device leaves the other reachable.
        presence.forget(phone_id).await;
        let remaining = presence.lookup(user).await;
        assert_eq!(remaining.len(), 1);
        assert_ne!(remaining[0].conn_id(), phone_id);
    }

    #[tokio::test]
    async fn forget_removes_only_the_exact_handle() {
        let presence = InMemoryPresence::new();
        let alice = Uuid::new_v4();
        let bob = Uuid::new_v4();

        let (alice_handle, _rx1) = test_handle();
        let (bob_handle, _rx2) = test_handle();
        let alice_conn = alice_handle.conn_id();

        presence.announce(alice, alice_handle).await;
        presence.announce(bob, bob_handle).await;

        presence.forget(alice_conn).await;
        assert!(presence.lookup(alice).await.is_empty());
        assert_eq!(presence.lookup(bob).await.len(), 1);
    }

    #[tokio::test]
    async fn push_after_receiver_dropped_is_unavailable() {
        let (handle, rx) = test_handle();
        drop(rx);

        let event = ServerEvent::Ready {
            user_id: Uuid::new_v4(),
        };
        assert!(handle.push(event).is_err());
    }
}
