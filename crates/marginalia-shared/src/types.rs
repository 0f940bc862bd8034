//! Domain records that cross the wire.
//!
//! Every struct derives `Serialize` and `Deserialize` so the same record can
//! be stored, returned over REST, and pushed over the gateway without a
//! translation layer in between.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Message
// ---------------------------------------------------------------------------

/// A one-to-one chat message.  Immutable once created except for the `read`
/// flag, which flips when the receiver fetches the conversation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Message {
    /// Unique message identifier.
    pub id: Uuid,
    /// Identity of the sending user.
    pub sender: Uuid,
    /// Identity of the receiving user.
    pub receiver: Uuid,
    /// Message text, trimmed, never empty.
    pub body: String,
    /// Whether the receiver has fetched the conversation since this message
    /// arrived.  Shared record: both participants observe the same value.
    pub read: bool,
    /// Server-assigned creation timestamp.
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Notification
// ---------------------------------------------------------------------------

/// What a notification is about.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Like,
    Comment,
    Reply,
}

impl NotificationKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            NotificationKind::Like => "like",
            NotificationKind::Comment => "comment",
            NotificationKind::Reply => "reply",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "like" => Some(NotificationKind::Like),
            "comment" => Some(NotificationKind::Comment),
            "reply" => Some(NotificationKind::Reply),
            _ => None,
        }
    }
}

impl std::fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An event directed at a user: someone liked, commented on, or replied to
/// something they own.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Notification {
    /// Unique notification identifier.
    pub id: Uuid,
    /// The user this notification is for.
    pub recipient: Uuid,
    /// The user whose action triggered it.
    pub actor: Uuid,
    pub kind: NotificationKind,
    /// Human-readable text with the actor's display name stamped in.
    pub message: String,
    /// The thought the action targeted, when known.
    pub thought_id: Option<Uuid>,
    /// The comment the action targeted, for comment-level events.
    pub comment_id: Option<Uuid>,
    pub is_read: bool,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Conversation summary
// ---------------------------------------------------------------------------

/// One row of the chat overview: the most recent message exchanged with a
/// peer plus how many of their messages are still unread.  Computed, never
/// stored.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ConversationSummary {
    /// The other participant.
    pub peer: Uuid,
    /// Most recent message in either direction.
    pub last_message: Message,
    /// Messages from `peer` the summarized user has not fetched yet.
    pub unread_count: u64,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn kind_round_trip() {
        for kind in [
            NotificationKind::Like,
            NotificationKind::Comment,
            NotificationKind::Reply,
        ] {
            assert_eq!(NotificationKind::parse(kind.as_str()), Some(kind));
        }
        assert_eq!(NotificationKind::parse("follow"), None);
    }
}
