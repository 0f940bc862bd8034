//! Notification persistence.
//!
//! Dedup lives here as a single conditional insert rather than a
//! check-then-act in the caller, so two concurrent identical actions cannot
//! both slip past the existence check.

use chrono::{DateTime, Utc};
use rusqlite::params;
use uuid::Uuid;

use marginalia_shared::{Notification, NotificationKind};

use crate::database::Database;
use crate::error::{Result, StoreError};

/// Everything needed to insert a notification; id, timestamp and read flag
/// are server-assigned.
#[derive(Debug, Clone)]
pub struct NewNotification {
    pub recipient: Uuid,
    pub actor: Uuid,
    pub kind: NotificationKind,
    pub message: String,
    pub thought_id: Option<Uuid>,
    pub comment_id: Option<Uuid>,
}

impl Database {
    /// Insert a notification unless an open one already exists for the same
    /// (recipient, actor, kind, thought, comment) tuple.  Returns `None`
    /// when the duplicate guard suppressed the insert.
    ///
    /// `IS` instead of `=` so the nullable target columns compare equal
    /// when both sides are NULL.
    pub fn create_notification_if_absent(
        &self,
        new: &NewNotification,
    ) -> Result<Option<Notification>> {
        let notification = Notification {
            id: Uuid::new_v4(),
            recipient: new.recipient,
            actor: new.actor,
            kind: new.kind,
            message: new.message.clone(),
            thought_id: new.thought_id,
            comment_id: new.comment_id,
            is_read: false,
            created_at: Utc::now(),
        };

        let inserted = self.conn().execute(
            "INSERT INTO notifications
                 (id, recipient, actor, kind, message, thought_id, comment_id, is_read, created_at)
             SELECT ?1, ?2, ?3, ?4, ?5, ?6, ?7, 0, ?8
             WHERE NOT EXISTS (
                 SELECT 1 FROM notifications
                 WHERE recipient = ?2 AND actor = ?3 AND kind = ?4
                   AND thought_id IS ?6 AND comment_id IS ?7
             )",
            params![
                notification.id.to_string(),
                notification.recipient.to_string(),
                notification.actor.to_string(),
                notification.kind.as_str(),
                notification.message,
                notification.thought_id.map(|t| t.to_string()),
                notification.comment_id.map(|c| c.to_string()),
                notification.created_at.to_rfc3339(),
            ],
        )?;

        if inserted == 0 {
            return Ok(None);
        }
        Ok(Some(notification))
    }

    /// All notifications for a user, newest first.
    pub fn notifications_for_user(&self, recipient: Uuid) -> Result<Vec<Notification>> {
        let mut stmt = self.conn().prepare(
            "SELECT id, recipient, actor, kind, message, thought_id, comment_id, is_read, created_at
             FROM notifications
             WHERE recipient = ?1
             ORDER BY created_at DESC, rowid DESC",
        )?;

        let rows = stmt.query_map(params![recipient.to_string()], row_to_notification)?;

        let mut notifications = Vec::new();
        for row in rows {
            notifications.push(row?);
        }
        Ok(notifications)
    }

    /// Flip a notification's read flag.  Only the recipient may do so.
    pub fn mark_notification_read(&self, id: Uuid, requester: Uuid) -> Result<()> {
        self.authorize_recipient(id, requester)?;
        self.conn().execute(
            "UPDATE notifications SET is_read = 1 WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    /// Delete a notification.  Only the recipient may do so.
    pub fn delete_notification(&self, id: Uuid, requester: Uuid) -> Result<()> {
        self.authorize_recipient(id, requester)?;
        self.conn().execute(
            "DELETE FROM notifications WHERE id = ?1",
            params![id.to_string()],
        )?;
        Ok(())
    }

    fn authorize_recipient(&self, id: Uuid, requester: Uuid) -> Result<()> {
        let recipient: String = self
            .conn()
            .query_row(
                "SELECT recipient FROM notifications WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })?;

        if recipient != requester.to_string() {
            return Err(StoreError::Forbidden);
        }
        Ok(())
    }
}

fn row_to_notification(row: &rusqlite::Row<'_>) -> rusqlite::Result<Notification> {
    let id_str: String = row.get(0)?;
    let recipient_str: String = row.get(1)?;
    let actor_str: String = row.get(2)?;
    let kind_str: String = row.get(3)?;
    let message: String = row.get(4)?;
    let thought_str: Option<String> = row.get(5)?;
    let comment_str: Option<String> = row.get(6)?;
    let is_read: bool = row.get(7)?;
    let ts_str: String = row.get(8)?;

    let parse_uuid = |idx: usize, s: &str| {
        Uuid::parse_str(s).map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(idx, rusqlite::types::Type::Text, Box::new(e))
        })
    };

    let id = parse_uuid(0, &id_str)?;
    let recipient = parse_uuid(1, &recipient_str)?;
    let actor = parse_uuid(2, &actor_str)?;

    let kind = NotificationKind::parse(&kind_str).ok_or_else(|| {
        rusqlite::Error::FromSqlConversionFailure(
            3,
            rusqlite::types::Type::Text,
            format!("unknown notification kind: {kind_str}").into(),
        )
    })?;

    let thought_id = match thought_str {
        Some(s) => Some(parse_uuid(5, &s)?),
        None => None,
    };
    let comment_id = match comment_str {
        Some(s) => Some(parse_uuid(6, &s)?),
        None => None,
    };

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&ts_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(8, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(Notification {
        id,
        recipient,
        actor,
        kind,
        message,
        thought_id,
        comment_id,
        is_read,
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

    fn like_notification(recipient: Uuid, actor: Uuid, thought_id: Uuid) -> NewNotification {
        NewNotification {
            recipient,
            actor,
            kind: NotificationKind::Like,
            message: "Someone liked your thought".into(),
            thought_id: Some(thought_id),
            comment_id: None,
        }
    }

    #[test]
    fn conditional_insert_dedups() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();

        let new = like_notification(dave, erin, thought.id);
        assert!(db.create_notification_if_absent(&new).unwrap().is_some());
        // Second identical like: suppressed, no duplicate row.
        assert!(db.create_notification_if_absent(&new).unwrap().is_none());
        assert_eq!(db.notifications_for_user(dave).unwrap().len(), 1);
    }

    #[test]
    fn dedup_distinguishes_null_and_set_targets() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();
        let comment = db.create_comment(thought.id, dave, "so good").unwrap();

        // Thought-level like and comment-level like are different facts.
        let thought_like = like_notification(dave, erin, thought.id);
        let comment_like = NewNotification {
            comment_id: Some(comment.id),
            ..thought_like.clone()
        };

        assert!(db
            .create_notification_if_absent(&thought_like)
            .unwrap()
            .is_some());
        assert!(db
            .create_notification_if_absent(&comment_like)
            .unwrap()
            .is_some());
        assert_eq!(db.notifications_for_user(dave).unwrap().len(), 2);
    }

    #[test]
    fn list_is_newest_first() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let t1 = db.create_thought(dave, "Dune", "sand").unwrap();
        let t2 = db.create_thought(dave, "Solaris", "ocean").unwrap();

        let first = db
            .create_notification_if_absent(&like_notification(dave, erin, t1.id))
            .unwrap()
            .unwrap();
        let second = db
            .create_notification_if_absent(&like_notification(dave, erin, t2.id))
            .unwrap()
            .unwrap();

        let listed = db.notifications_for_user(dave).unwrap();
        assert_eq!(listed[0].id, second.id);
        assert_eq!(listed[1].id, first.id);
    }

    #[test]
    fn delete_is_recipient_only() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();

        let notification = db
            .create_notification_if_absent(&like_notification(dave, erin, thought.id))
            .unwrap()
            .unwrap();

        assert!(matches!(
            db.delete_notification(notification.id, erin),
            Err(StoreError::Forbidden)
        ));
        db.delete_notification(notification.id, dave).unwrap();
        assert!(db.notifications_for_user(dave).unwrap().is_empty());
        assert!(matches!(
            db.delete_notification(notification.id, dave),
            Err(StoreError::NotFound)
        ));
    }

    #[test]
    fn mark_read_flips_flag() {
        let (db, _dir) = test_db();
        let dave = db.create_user("dave", "Dave").unwrap().id;
        let erin = db.create_user("erin", "Erin").unwrap().id;
        let thought = db.create_thought(dave, "Dune", "sand").unwrap();

        let notification = db
            .create_notification_if_absent(&like_notification(dave, erin, thought.id))
            .unwrap()
            .unwrap();
        assert!(!notification.is_read);

        assert!(matches!(
            db.mark_notification_read(notification.id, erin),
            Err(StoreError::Forbidden)
        ));

        db.mark_notification_read(notification.id, dave).unwrap();
        assert!(db.notifications_for_user(dave).unwrap()[0].is_read);
    }
}
