//! Delivery router: the persist-then-push policy for every
//! recipient-directed event.
//!
//! Persistence failure aborts the whole operation and nothing is pushed.
//! Push failure never propagates back: the persisted record is the durable
//! fallback and the recipient catches up on the next fetch.

use std::sync::Arc;

use tokio::sync::Mutex;
use tracing::debug;
use uuid::Uuid;

use marginalia_shared::{Message, NotificationKind, ServerEvent};
use marginalia_store::{Comment, Database, NewNotification, Thought};

use crate::error::ApiError;
use crate::presence::Presence;

/// Shared handle to the store.  Locking it is the suspension point of every
/// handler; the queries themselves are short.
pub type Db = Arc<Mutex<Database>>;

pub struct DeliveryRouter {
    db: Db,
    presence: Arc<dyn Presence>,
}

impl DeliveryRouter {
    pub fn new(db: Db, presence: Arc<dyn Presence>) -> Self {
        Self { db, presence }
    }

    /// Persist a chat message, then push it to the receiver's live sessions.
    pub async fn send_message(
        &self,
        sender: Uuid,
        receiver: Uuid,
        text: &str,
    ) -> Result<Message, ApiError> {
        let message = {
            let db = self.db.lock().await;
            if !db.user_exists(sender)? {
                return Err(ApiError::BadRequest("unknown sender".into()));
            }
            if !db.user_exists(receiver)? {
                return Err(ApiError::BadRequest("unknown receiver".into()));
            }
            db.create_message(sender, receiver, text)?
        };

        self.push_to(receiver, ServerEvent::NewMessage(message.clone()))
            .await;
        Ok(message)
    }

    /// `actor` liked `thought`: notify its author.
    pub async fn thought_liked(&self, actor: Uuid, thought: &Thought) -> Result<(), ApiError> {
        self.notify(
            thought.author,
            actor,
            NotificationKind::Like,
            |name| format!("{name} liked your thought \"{}\"", thought.title),
            Some(thought.id),
            None,
        )
        .await
    }

    /// `actor` commented on `thought`: notify its author.
    pub async fn comment_added(&self, actor: Uuid, thought: &Thought) -> Result<(), ApiError> {
        self.notify(
            thought.author,
            actor,
            NotificationKind::Comment,
            |name| format!("{name} commented on your thought \"{}\"", thought.title),
            Some(thought.id),
            None,
        )
        .await
    }

    /// `actor` liked a comment on `thought`: notify the comment's author.
    pub async fn comment_liked(
        &self,
        actor: Uuid,
        thought: &Thought,
        comment: &Comment,
    ) -> Result<(), ApiError> {
        self.notify(
            comment.author,
            actor,
            NotificationKind::Like,
            |name| format!("{name} liked your comment on \"{}\"", thought.title),
            Some(thought.id),
            Some(comment.id),
        )
        .await
    }

    /// `actor` replied to a comment on `thought`: notify the comment's author.
    pub async fn reply_added(
        &self,
        actor: Uuid,
        thought: &Thought,
        comment: &Comment,
    ) -> Result<(), ApiError> {
        self.notify(
            comment.author,
            actor,
            NotificationKind::Reply,
            |name| format!("{name} replied to your comment on \"{}\"", thought.title),
            Some(thought.id),
            Some(comment.id),
        )
        .await
    }

    /// Shared notification path: suppress self-notifications, stamp the
    /// actor's display name into the wording, insert unless an open
    /// duplicate exists, push only what was actually inserted.
    async fn notify(
        &self,
        recipient: Uuid,
        actor: Uuid,
        kind: NotificationKind,
        wording: impl FnOnce(&str) -> String,
        thought_id: Option<Uuid>,
        comment_id: Option<Uuid>,
    ) -> Result<(), ApiError> {
        if recipient == actor {
            return Ok(());
        }

        let created = {
            let db = self.db.lock().await;
            let actor_profile = db.get_user(actor)?;
            db.create_notification_if_absent(&NewNotification {
                recipient,
                actor,
                kind,
                message: wording(&actor_profile.display_name),
                thought_id,
                comment_id,
            })?
        };

        match created {
            Some(notification) => {
                self.push_to(recipient, ServerEvent::NewNotification(notification))
                    .await;
            }
            None => {
                debug!(
                    recipient = %recipient,
                    actor = %actor,
                    kind = %kind,
                    "duplicate notification suppressed"
                );
            }
        }
        Ok(())
    }

    /// Fire-and-forget push to every live session of `recipient`.  A stale
    /// handle is logged and swallowed.
    async fn push_to(&self, recipient: Uuid, event: ServerEvent) {
        let handles = self.presence.lookup(recipient).await;
        if handles.is_empty() {
            debug!(user = %recipient, event = event.name(), "recipient offline, no push");
            return;
        }

        for handle in handles {
            if handle.push(event.clone()).is_err() {
                debug!(
                    user = %recipient,
                    conn = %handle.conn_id(),
                    event = event.name(),
                    "push failed, session gone"
                );
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    use tokio::sync::mpsc;

    use crate::presence::{InMemoryPresence, SessionHandle};

    struct Fixture {
        router: DeliveryRouter,
        db: Db,
        presence: Arc<InMemoryPresence>,
        _dir: tempfile::TempDir,
    }

    fn fixture() -> Fixture {
        let dir = tempfile::tempdir().unwrap();
        let database = Database::open_at(&dir.path().join("test.db")).unwrap();
        let db: Db = Arc::new(Mutex::new(database));
        let presence = Arc::new(InMemoryPresence::new());
        let router = DeliveryRouter::new(db.clone(), presence.clone());
        Fixture {
            router,
            db,
            presence,
            _dir: dir,
        }
    }

    async fn connect(
        fx: &Fixture,
        user: Uuid,
    ) -> (Uuid, mpsc::UnboundedReceiver<ServerEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let handle = SessionHandle::new(tx);
        let conn_id = handle.conn_id();
        fx.presence.announce(user, handle).await;
        (conn_id, rx)
    }

    #[tokio::test]
    async fn message_to_online_receiver_is_pushed() {
        let fx = fixture();
        let (alice, bob) = {
            let db = fx.db.lock().await;
            (
                db.create_user("alice", "Alice").unwrap().id,
                db.create_user("bob", "Bob").unwrap().id,
            )
        };
        let (_conn, mut rx) = connect(&fx, bob).await;

        let message = fx.router.send_message(alice, bob, "hello").await.unwrap();
        assert_eq!(message.sender, alice);
        assert_eq!(message.receiver, bob);
        assert!(!message.read);

        match rx.try_recv().unwrap() {
            ServerEvent::NewMessage(pushed) => assert_eq!(pushed, message),
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn message_to_offline_receiver_is_only_persisted() {
        let fx = fixture();
        let (alice, bob) = {
            let db = fx.db.lock().await;
            (
                db.create_user("alice", "Alice").unwrap().id,
                db.create_user("bob", "Bob").unwrap().id,
            )
        };

        fx.router.send_message(alice, bob, "hello").await.unwrap();

        let db = fx.db.lock().await;
        let conversation = db.conversation(alice, bob).unwrap();
        assert_eq!(conversation.len(), 1);
        assert!(!conversation[0].read);
    }

    #[tokio::test]
    async fn unknown_receiver_is_rejected_without_partial_state() {
        let fx = fixture();
        let alice = {
            let db = fx.db.lock().await;
            db.create_user("alice", "Alice").unwrap().id
        };
        let ghost = Uuid::new_v4();

        let err = fx.router.send_message(alice, ghost, "hello").await;
        assert!(matches!(err, Err(ApiError::BadRequest(_))));

        let db = fx.db.lock().await;
        assert!(db.conversation(alice, ghost).unwrap().is_empty());
    }

    #[tokio::test]
    async fn empty_message_is_rejected() {
        let fx = fixture();
        let (alice, bob) = {
            let db = fx.db.lock().await;
            (
                db.create_user("alice", "Alice").unwrap().id,
                db.create_user("bob", "Bob").unwrap().id,
            )
        };

        let err = fx.router.send_message(alice, bob, "   ").await;
        assert!(matches!(err, Err(ApiError::BadRequest(_))));
    }

    #[tokio::test]
    async fn stale_session_push_is_swallowed() {
        let fx = fixture();
        let (alice, bob) = {
            let db = fx.db.lock().await;
            (
                db.create_user("alice", "Alice").unwrap().id,
                db.create_user("bob", "Bob").unwrap().id,
            )
        };

        // Receiver's socket is gone but the registry entry lingers.
        let (_conn, rx) = connect(&fx, bob).await;
        drop(rx);

        fx.router.send_message(alice, bob, "hello").await.unwrap();

        let db = fx.db.lock().await;
        assert_eq!(db.conversation(alice, bob).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn like_notifies_offline_author() {
        let fx = fixture();
        let (carol, dave, thought) = {
            let db = fx.db.lock().await;
            let carol = db.create_user("carol", "Carol").unwrap().id;
            let dave = db.create_user("dave", "Dave").unwrap().id;
            let thought = db.create_thought(dave, "Dune", "sand").unwrap();
            (carol, dave, thought)
        };

        fx.router.thought_liked(carol, &thought).await.unwrap();

        let db = fx.db.lock().await;
        let notifications = db.notifications_for_user(dave).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].actor, carol);
        assert_eq!(notifications[0].kind, NotificationKind::Like);
        assert!(!notifications[0].is_read);
        assert_eq!(notifications[0].message, "Carol liked your thought \"Dune\"");
    }

    #[tokio::test]
    async fn like_pushes_to_online_author() {
        let fx = fixture();
        let (carol, dave, thought) = {
            let db = fx.db.lock().await;
            let carol = db.create_user("carol", "Carol").unwrap().id;
            let dave = db.create_user("dave", "Dave").unwrap().id;
            let thought = db.create_thought(dave, "Dune", "sand").unwrap();
            (carol, dave, thought)
        };
        let (_conn, mut rx) = connect(&fx, dave).await;

        fx.router.thought_liked(carol, &thought).await.unwrap();

        match rx.try_recv().unwrap() {
            ServerEvent::NewNotification(notification) => {
                assert_eq!(notification.recipient, dave);
                assert_eq!(notification.thought_id, Some(thought.id));
            }
            other => panic!("unexpected event: {other:?}"),
        }
    }

    #[tokio::test]
    async fn self_like_produces_no_notification() {
        let fx = fixture();
        let (dave, thought) = {
            let db = fx.db.lock().await;
            let dave = db.create_user("dave", "Dave").unwrap().id;
            let thought = db.create_thought(dave, "Dune", "sand").unwrap();
            (dave, thought)
        };

        fx.router.thought_liked(dave, &thought).await.unwrap();

        let db = fx.db.lock().await;
        assert!(db.notifications_for_user(dave).unwrap().is_empty());
    }

    #[tokio::test]
    async fn repeated_like_does_not_accumulate_notifications() {
        let fx = fixture();
        let (erin, dave, thought) = {
            let db = fx.db.lock().await;
            let erin = db.create_user("erin", "Erin").unwrap().id;
            let dave = db.create_user("dave", "Dave").unwrap().id;
            let thought = db.create_thought(dave, "Dune", "sand").unwrap();
            (erin, dave, thought)
        };

        // like -> unlike -> like: the unlike path does not delete the
        // notification, and the second like is suppressed as a duplicate.
        fx.router.thought_liked(erin, &thought).await.unwrap();
        fx.router.thought_liked(erin, &thought).await.unwrap();

        let db = fx.db.lock().await;
        assert_eq!(db.notifications_for_user(dave).unwrap().len(), 1);
    }

    #[tokio::test]
    async fn reply_notifies_comment_author_not_thought_author() {
        let fx = fixture();
        let (erin, dave, frank, thought, comment) = {
            let db = fx.db.lock().await;
            let erin = db.create_user("erin", "Erin").unwrap().id;
            let dave = db.create_user("dave", "Dave").unwrap().id;
            let frank = db.create_user("frank", "Frank").unwrap().id;
            let thought = db.create_thought(dave, "Dune", "sand").unwrap();
            let comment = db.create_comment(thought.id, frank, "so good").unwrap();
            (erin, dave, frank, thought, comment)
        };

        fx.router
            .reply_added(erin, &thought, &comment)
            .await
            .unwrap();

        let db = fx.db.lock().await;
        assert!(db.notifications_for_user(dave).unwrap().is_empty());
        let notifications = db.notifications_for_user(frank).unwrap();
        assert_eq!(notifications.len(), 1);
        assert_eq!(notifications[0].kind, NotificationKind::Reply);
        assert_eq!(notifications[0].comment_id, Some(comment.id));
    }
}
