use thiserror::Error;

/// Errors produced by the store layer.
#[derive(Error, Debug)]
pub enum StoreError {
    /// SQLite error.
    #[error("Database error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    /// No platform data directory available for the default database path.
    #[error("Could not determine application data directory")]
    NoDataDir,

    /// Filesystem error while preparing the database directory.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// The queried record does not exist.
    #[error("Record not found")]
    NotFound,

    /// The caller is not the owner the operation requires.
    #[error("Not authorized to modify this record")]
    Forbidden,

    /// A message body was empty after trimming.
    #[error("Message text must not be empty")]
    EmptyMessage,

    /// Another user already registered this handle.
    #[error("Handle already taken: {0}")]
    HandleTaken(String),

    /// Migration failure.
    #[error("Migration error: {0}")]
    Migration(String),
}

/// Convenience alias used throughout the crate.
pub type Result<T> = std::result::Result<T, StoreError>;
