//! v001 -- Initial schema creation.
//!
//! Creates the core tables: `users`, `messages`, `notifications`, and the
//! thought/comment content projection with its like tables.

use rusqlite::Connection;

/// SQL executed when upgrading from version 0 to version 1.
const UP_SQL: &str = r#"
-- ----------------------------------------------------------------
-- Users (projection of the external user-store: identity only)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS users (
    id           TEXT PRIMARY KEY NOT NULL,   -- UUID v4
    handle       TEXT NOT NULL UNIQUE,
    display_name TEXT NOT NULL,
    created_at   TEXT NOT NULL                -- ISO-8601 / RFC-3339
);

-- ----------------------------------------------------------------
-- Direct messages
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS messages (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    sender     TEXT NOT NULL,                 -- FK -> users(id)
    receiver   TEXT NOT NULL,                 -- FK -> users(id)
    body       TEXT NOT NULL,
    read       INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at TEXT NOT NULL,

    FOREIGN KEY (sender)   REFERENCES users(id),
    FOREIGN KEY (receiver) REFERENCES users(id)
);

-- Conversation reads filter on the (sender, receiver) pair in both
-- directions; created_at keeps the scan in timestamp order.
CREATE INDEX IF NOT EXISTS idx_messages_pair
    ON messages(sender, receiver, created_at);

-- ----------------------------------------------------------------
-- Notifications
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS notifications (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    recipient  TEXT NOT NULL,                 -- FK -> users(id)
    actor      TEXT NOT NULL,                 -- FK -> users(id)
    kind       TEXT NOT NULL CHECK (kind IN ('like', 'comment', 'reply')),
    message    TEXT NOT NULL,
    thought_id TEXT,                          -- nullable target refs
    comment_id TEXT,
    is_read    INTEGER NOT NULL DEFAULT 0,    -- boolean 0/1
    created_at TEXT NOT NULL,

    FOREIGN KEY (recipient) REFERENCES users(id),
    FOREIGN KEY (actor)     REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_notifications_recipient
    ON notifications(recipient, created_at DESC);

-- ----------------------------------------------------------------
-- Thoughts (content projection: enough to route notifications)
-- ----------------------------------------------------------------
CREATE TABLE IF NOT EXISTS thoughts (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    author     TEXT NOT NULL,                 -- FK -> users(id)
    title      TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (author) REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS thought_likes (
    thought_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (thought_id, user_id),
    FOREIGN KEY (thought_id) REFERENCES thoughts(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)    REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS comments (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    thought_id TEXT NOT NULL,
    author     TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (thought_id) REFERENCES thoughts(id) ON DELETE CASCADE,
    FOREIGN KEY (author)     REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_comments_thought_id ON comments(thought_id);

CREATE TABLE IF NOT EXISTS comment_likes (
    comment_id TEXT NOT NULL,
    user_id    TEXT NOT NULL,
    created_at TEXT NOT NULL,

    PRIMARY KEY (comment_id, user_id),
    FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
    FOREIGN KEY (user_id)    REFERENCES users(id)
);

CREATE TABLE IF NOT EXISTS replies (
    id         TEXT PRIMARY KEY NOT NULL,     -- UUID v4
    comment_id TEXT NOT NULL,
    author     TEXT NOT NULL,
    body       TEXT NOT NULL,
    created_at TEXT NOT NULL,

    FOREIGN KEY (comment_id) REFERENCES comments(id) ON DELETE CASCADE,
    FOREIGN KEY (author)     REFERENCES users(id)
);

CREATE INDEX IF NOT EXISTS idx_replies_comment_id ON replies(comment_id);
"#;

/// Apply the initial migration.
pub fn up(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(UP_SQL)
}
