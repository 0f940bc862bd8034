//! CRUD operations for [`User`] records.

use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension};
use uuid::Uuid;

use crate::database::Database;
use crate::error::{Result, StoreError};
use crate::models::User;

impl Database {
    /// Insert a new user.  The handle must be unique.
    pub fn create_user(&self, handle: &str, display_name: &str) -> Result<User> {
        let user = User {
            id: Uuid::new_v4(),
            handle: handle.to_string(),
            display_name: display_name.to_string(),
            created_at: Utc::now(),
        };

        self.conn()
            .execute(
                "INSERT INTO users (id, handle, display_name, created_at)
                 VALUES (?1, ?2, ?3, ?4)",
                params![
                    user.id.to_string(),
                    user.handle,
                    user.display_name,
                    user.created_at.to_rfc3339(),
                ],
            )
            .map_err(|e| match e {
                rusqlite::Error::SqliteFailure(err, _)
                    if err.code == rusqlite::ErrorCode::ConstraintViolation =>
                {
                    StoreError::HandleTaken(handle.to_string())
                }
                other => StoreError::Sqlite(other),
            })?;

        Ok(user)
    }

    /// Fetch a single user by id.
    pub fn get_user(&self, id: Uuid) -> Result<User> {
        self.conn()
            .query_row(
                "SELECT id, handle, display_name, created_at
                 FROM users
                 WHERE id = ?1",
                params![id.to_string()],
                row_to_user,
            )
            .map_err(|e| match e {
                rusqlite::Error::QueryReturnedNoRows => StoreError::NotFound,
                other => StoreError::Sqlite(other),
            })
    }

    /// Whether an identity resolves to a known user.
    pub fn user_exists(&self, id: Uuid) -> Result<bool> {
        let found: Option<i64> = self
            .conn()
            .query_row(
                "SELECT 1 FROM users WHERE id = ?1",
                params![id.to_string()],
                |row| row.get(0),
            )
            .optional()?;
        Ok(found.is_some())
    }
}

/// Map a `rusqlite::Row` to a [`User`].
fn row_to_user(row: &rusqlite::Row<'_>) -> rusqlite::Result<User> {
    let id_str: String = row.get(0)?;
    let handle: String = row.get(1)?;
    let display_name: String = row.get(2)?;
    let created_str: String = row.get(3)?;

    let id = Uuid::parse_str(&id_str).map_err(|e| {
        rusqlite::Error::FromSqlConversionFailure(0, rusqlite::types::Type::Text, Box::new(e))
    })?;

    let created_at: DateTime<Utc> = DateTime::parse_from_rfc3339(&created_str)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| {
            rusqlite::Error::FromSqlConversionFailure(3, rusqlite::types::Type::Text, Box::new(e))
        })?;

    Ok(User {
        id,
        handle,
        display_name,
        created_at,
    })
}
