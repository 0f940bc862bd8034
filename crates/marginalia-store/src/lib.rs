//! # marginalia-store
//!
//! SQLite persistence for the Marginalia server.  The crate exposes a
//! synchronous [`Database`] handle that wraps a `rusqlite::Connection` and
//! provides typed CRUD helpers for each domain area: users, messages,
//! notifications, and the thought/comment content projection.

pub mod content;
pub mod database;
pub mod messages;
pub mod migrations;
pub mod models;
pub mod notifications;
pub mod users;

mod error;

pub use database::Database;
pub use error::StoreError;
pub use models::*;
pub use notifications::NewNotification;
