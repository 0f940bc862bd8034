//! Store-only domain records.
//!
//! The records that travel over the gateway ([`Message`], [`Notification`])
//! live in `marginalia-shared`; the structs here stay server-side but still
//! derive `Serialize` so the REST layer can return them directly.
//!
//! [`Message`]: marginalia_shared::Message
//! [`Notification`]: marginalia_shared::Notification

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

// ---------------------------------------------------------------------------
// User
// ---------------------------------------------------------------------------

/// The identity projection of the external user-store: just enough to
/// resolve display names and validate that a routed identity exists.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Opaque unique identifier.
    pub id: Uuid,
    /// Unique handle, e.g. `"alice"`.
    pub handle: String,
    /// Name stamped into notification text.
    pub display_name: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Thought
// ---------------------------------------------------------------------------

/// A short post about a book.  The full content entity lives in the external
/// content-store; this projection carries what notification routing needs:
/// the author (recipient of likes/comments) and the title (notification
/// wording).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Thought {
    pub id: Uuid,
    pub author: Uuid,
    pub title: String,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Comment
// ---------------------------------------------------------------------------

/// A comment on a thought.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Comment {
    pub id: Uuid,
    pub thought_id: Uuid,
    pub author: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}

// ---------------------------------------------------------------------------
// Reply
// ---------------------------------------------------------------------------

/// A reply to a comment.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Reply {
    pub id: Uuid,
    pub comment_id: Uuid,
    pub author: Uuid,
    pub body: String,
    pub created_at: DateTime<Utc>,
}
