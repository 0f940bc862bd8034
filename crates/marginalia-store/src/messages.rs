use std::collections::HashMap;

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use marginalia_shared::{ConversationSummary, Message};

use crate::database::Database;
use crate::error::{Result, StoreError};

impl Database {
    /// Persist a new message.  The body is trimmed; an empty body is a
    /// validation failure.  Identity resolution is the caller's concern.
    pub fn create_message(&self, sender: Uuid, receiver: Uuid, text: &str) -> Result<Message> {
        let body = text.trim();
        if body.is_empty() {
            return Err(StoreError::EmptyMessage);
        }

        let message = Message {
            id: Uuid::new_v4(),
            sender,
            receiver,
            body: body.to_string(),
            read: false,
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO messages (id, sender, receiver, body, read, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                message.id.to_string(),
                message.sender.to_string(),
                message.receiver.to_string(),
                message.body,
                message.read,
                message.created_at.to_rfc3339(),
            ],
        )?;

        Ok(message)
    }

    /// All messages between two users, in either direction, ascending by
    /// creation time.  Equal timestamps fall back to insertion order
    /// (rowid), so the result is totally ordered and symmetric in its
    /// arguments.
    pub fn conversation(&self, user_a: Uuid, user_b: Uuid) -> Result<Vec<Message>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender, receiver, body, read, created_at
             FROM messages
             WHERE (sender = ?1 AND receiver = ?2) OR (sender = ?2 AND receiver = ?1)
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(
            params![user_a.to_string(), user_b.to_string()],
            row_to_message,
        )?;

        let mut messages = Vec::new();
        for row in rows {
            messages.push(row?);
        }
        Ok(messages)
    }

    /// Mark every message from `sender` to `receiver` as read.  Returns the
    /// number of rows updated.
    pub fn mark_conversation_read(&self, receiver: Uuid, sender: Uuid) -> Result<usize> {
        let updated = self.conn().execute(
            "UPDATE messages SET read = 1
             WHERE receiver = ?1 AND sender = ?2 AND read = 0",
            params![receiver.to_string(), sender.to_string()],
        )?;
        Ok(updated)
    }

    /// One summary per distinct peer: the most recent message exchanged and
    /// how many of the peer's messages are still unread.  Sorted by the last
    /// message's timestamp descending; exact ties fall back to the peer id
    /// string ascending so the order is stable.
    pub fn conversation_summaries(&self, user: Uuid) -> Result<Vec<ConversationSummary>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, sender, receiver, body, read, created_at
             FROM messages
             WHERE sender = ?1 OR receiver = ?1
             ORDER BY created_at ASC, rowid ASC",
        )?;

        let rows = stmt.query_map(params![user.to_string()], row_to_message)?;

        // Single ascending scan: the last message seen per peer wins.
        let mut by_peer: HashMap<Uuid, (Message, u64)> = HashMap::new();
        for row in rows {
            let message = row?;
            let peer = if message.sender == user {
                message.receiver
            } else {
                message.sender
            };
            let unread = u64::from(message.receiver == user && !message.read);

            match by_peer.entry(peer) {
                std::collections::hash_map::Entry::Occupied(mut entry) => {
                    let (last, count) = entry.get_mut();
                    *last = message;
                    *count += unread;
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert((message, unread));
                }
            }
        }

        let mut summaries: Vec<ConversationSummary> = by_peer
            .into_iter()
            .map(|(peer, (last_message, unread_count))| ConversationSummary {
                peer,
                last_message,
                unread_count,
            })
            .collect();

        summaries.sort_by(|a, b| {
            b.last_message
                .created_at
                .cmp(&a.last_message.created_at)
                .then_with(|| a.peer.to_string().cmp(&b.peer.to_string()))
        });

        Ok(summaries)
    }

    /// Delete a message.  Only the original sender may delete; the row is
    /// removed outright, so both participants lose it.
    pub fn delete_message(&self, id: Uuid, requester: Uuid) -> Result<()> {
        let sender: String = self
            .conn()
            .query_row(
                "SELECT sender FROM messages WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if sender != requester.to_string() {
            return Err(StoreError::Forbidden);
        }

        self.conn().execute(
            "DELETE FROM messages WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }
}

fn row_to_message(row: &rusqlite::Row<'_>) -> rusqlite::Result<Message> {
    let id_str: String = row.get(0)?;
    let sender_str: String = row.get(1)?;
    let receiver_str: String = row.get(2)?;
    let body: String = row.get(3)?;
    let read: bool = row.get(4)?;
    let ts_str: String = row.get(5)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let sender = Uuid::parse_str(&sender_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let receiver = Uuid::parse_str(&receiver_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(5, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Message {
        id,
        sender,
        receiver,
        body,
        read,
        created_at,
    })
}
