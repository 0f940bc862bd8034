//! The content projection: thoughts, comments, replies, and like state.
//!
//! This doubles as the ownership oracle for notification routing --
//! [`Database::get_thought`] and [`Database::get_comment`] answer "who owns
//! this" and supply the title used in notification wording.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::{Comment, Reply, Thought};

impl Database {
    // ------------------------------------------------------------------
    // Thoughts
    // ------------------------------------------------------------------

    /// Insert a new thought.
    pub fn create_thought(&self, author: Uuid, title: &str, body: &str) -> Result<Thought> {
        let thought = Thought {
            id: Uuid::new_v4(),
            author,
            title: title.to_string(),
            body: body.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO thoughts (id, author, title, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                thought.id.to_string(),
                thought.author.to_string(),
                thought.title,
                thought.body,
                thought.created_at.to_rfc3339(),
            ],
        )?;

        Ok(thought)
    }

    /// Fetch a single thought by id.
    pub fn get_thought(&self, id: Uuid) -> Result<Thought> {
        self.conn()
            .query_row(
                "SELECT id, author, title, body, created_at
                 FROM thoughts
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_thought,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Toggle a user's like on a thought.  Returns `true` when the call
    /// added the like, `false` when it removed one.
    pub fn toggle_thought_like(&self, thought_id: Uuid, user: Uuid) -> Result<bool> {
        let existing: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM thought_likes WHERE thought_id = ?1 AND user_id = ?2",
                params![thought_id.to_string(), user.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            self.conn().execute(
                "DELETE FROM thought_likes WHERE thought_id = ?1 AND user_id = ?2",
                params![thought_id.to_string(), user.to_string()],
            )?;
            Ok(false)
        } else {
            self.conn().execute(
                "INSERT INTO thought_likes (thought_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    thought_id.to_string(),
                    user.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(true)
        }
    }

    /// Number of likes on a thought.
    pub fn thought_like_count(&self, thought_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM thought_likes WHERE thought_id = ?1",
            params![thought_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Comments
    // ------------------------------------------------------------------

    /// Insert a new comment on a thought.
    pub fn create_comment(&self, thought_id: Uuid, author: Uuid, body: &str) -> Result<Comment> {
        let comment = Comment {
            id: Uuid::new_v4(),
            thought_id,
            author,
            body: body.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO comments (id, thought_id, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                comment.id.to_string(),
                comment.thought_id.to_string(),
                comment.author.to_string(),
                comment.body,
                comment.created_at.to_rfc3339(),
            ],
        )?;

        Ok(comment)
    }

    /// Fetch a single comment by id.
    pub fn get_comment(&self, id: Uuid) -> Result<Comment> {
        self.conn()
            .query_row(
                "SELECT id, thought_id, author, body, created_at
                 FROM comments
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_comment,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Toggle a user's like on a comment.  Returns `true` when the call
    /// added the like.
    pub fn toggle_comment_like(&self, comment_id: Uuid, user: Uuid) -> Result<bool> {
        let existing: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id.to_string(), user.to_string()],
                |row| row.get(0),
            )
            .optional()?;

        if existing.is_some() {
            self.conn().execute(
                "DELETE FROM comment_likes WHERE comment_id = ?1 AND user_id = ?2",
                params![comment_id.to_string(), user.to_string()],
            )?;
            Ok(false)
        } else {
            self.conn().execute(
                "INSERT INTO comment_likes (comment_id, user_id, created_at)
                 VALUES (?1, ?2, ?3)",
                params![
                    comment_id.to_string(),
                    user.to_string(),
                    Utc::now().to_rfc3339(),
                ],
            )?;
            Ok(true)
        }
    }

    /// Number of likes on a comment.
    pub fn comment_like_count(&self, comment_id: Uuid) -> Result<u64> {
        let count: i64 = self.conn().query_row(
            "SELECT COUNT(*) FROM comment_likes WHERE comment_id = ?1",
            params![comment_id.to_string()],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    // ------------------------------------------------------------------
    // Replies
    // ------------------------------------------------------------------

    /// Insert a new reply to a comment.
    pub fn create_reply(&self, comment_id: Uuid, author: Uuid, body: &str) -> Result<Reply> {
        let reply = Reply {
            id: Uuid::new_v4(),
            comment_id,
            author,
            body: body.to_string(),
            created_at: Utc::now(),
        };

        self.conn().execute(
            "INSERT INTO replies (id, comment_id, author, body, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                reply.id.to_string(),
                reply.comment_id.to_string(),
                reply.author.to_string(),
                reply.body,
                reply.created_at.to_rfc3339(),
            ],
        )?;

        Ok(reply)
    }
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn row_to_thought(row: &rusqlite::Row<'_>) -> rusqlite::Result<Thought> {
    let id_str: String = row.get(0)?;
    let author_str: String = row.get(1)?;
    let title: String = row.get(2)?;
    let body: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let author = Uuid::parse_str(&author_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Thought {
        id,
        author,
        title,
        body,
        created_at,
    })
}

fn row_to_comment(row: &rusqlite::Row<'_>) -> rusqlite::Result<Comment> {
    let id_str: String = row.get(0)?;
    let thought_str: String = row.get(1)?;
    let author_str: String = row.get(2)?;
    let body: String = row.get(3)?;
    let created_str: String = row.get(4)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let thought_id = Uuid::parse_str(&thought_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(1, rusqlite::types::Type::Text, Box::new(e))
    })?;
    let author = Uuid::parse_str(&author_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(2, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(4, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Comment {
        id,
        thought_id,
        author,
        body,
        created_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_db() -> (Database, tempfile::TempDir) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::open_at(&dir.path().join("test.db")).unwrap();
        (db, dir)
    }

    #[test]
    fn thought_like_toggles() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();

        assert!(db.toggle_thought_like(thought.id, erin).unwrap());
        assert_eq!(db.thought_like_count(thought.id).unwrap(), 1);

        assert!(!db.toggle_thought_like(thought.id, erin).unwrap());
        assert_eq!(db.thought_like_count(thought.id).unwrap(), 0);

        assert!(db.toggle_thought_like(thought.id, erin).unwrap());
        assert_eq!(db.thought_like_count(thought.id).unwrap(), 1);
    }

    #[test]
    fn comment_ownership_resolves() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();
        let comment = db.create_comment(thought.id, erin, "so good").unwrap();

        let fetched = db.get_comment(comment.id).unwrap();
        assert_eq!(fetched.author, erin);
        assert_eq!(fetched.thought_id, thought.id);

        assert!(matches!(
            db.get_comment(Uuid::new_v4()),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn comment_like_toggles() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();
        let comment = db.create_comment(thought.id, dave, "so good").unwrap();

        assert!(db.toggle_comment_like(comment.id, erin).unwrap());
        assert_eq!(db.comment_like_count(comment.id).unwrap(), 1);
        assert!(!db.toggle_comment_like(comment.id, erin).unwrap());
        assert_eq!(db.comment_like_count(comment.id).unwrap(), 0);
    }

    #[test]
    fn replies_attach_to_comments() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();
        let comment = db.create_comment(thought.id, dave, "so good").unwrap();

        let reply = db.create_reply(comment.id, erin, "agreed").unwrap();
        assert_eq!(reply.comment_id, comment.id);
        assert_eq!(reply.author, erin);
    }
}
