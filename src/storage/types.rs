use thiserror::Error;

// ============================================================================
// Error Types
// ============================================================================

/// Database-specific errors with user-friendly messages
#[derive(Debug, Error)]
pub enum DatabaseError {
    /// Another process has locked the database
    #[error("Another instance of feedlist appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Migration failed
    #[error("Database migration failed: {0}")]
    Migration(String),

    /// Generic database error
    #[error("Database error: {0}")]
    Other(#[from] sqlx::Error),
}

impl DatabaseError {
    /// Map a sqlx error, recognising lock contention
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        if Self::is_lock_message(&err.to_string()) {
            return DatabaseError::InstanceLocked;
        }
        DatabaseError::Other(err)
    }

    // SQLITE_BUSY (5), SQLITE_LOCKED (6), SQLITE_CANTOPEN (14)
    pub(crate) fn is_lock_message(message: &str) -> bool {
        let message = message.to_lowercase();
        message.contains("database is locked")
            || message.contains("database table is locked")
            || message.contains("sqlite_busy")
            || message.contains("sqlite_locked")
            || message.contains("unable to open database file")
    }
}

// ============================================================================
// Update Payloads
// ============================================================================

/// New value for the read marker.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadMarker {
    /// Marker set to 1.
    Read,
    /// Marker cleared to NULL, i.e. back to "never read".
    Cleared,
}

/// Column values applied verbatim by [`Database::update`](super::Database::update).
///
/// `None` fields are left untouched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct EntryValues {
    pub read: Option<ReadMarker>,
    pub favorite: Option<bool>,
}

impl EntryValues {
    /// Canonical "mark read" values.
    pub fn read_values() -> Self {
        Self {
            read: Some(ReadMarker::Read),
            ..Self::default()
        }
    }

    /// Canonical "mark unread" values.
    pub fn unread_values() -> Self {
        Self {
            read: Some(ReadMarker::Cleared),
            ..Self::default()
        }
    }

    pub fn favorite_values(favorite: bool) -> Self {
        Self {
            favorite: Some(favorite),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.read.is_none() && self.favorite.is_none()
    }
}

/// Which rows of a source an update applies to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Selection {
    /// One entry, addressed through the source.
    Entry(i64),
    /// Every unread entry of the source.
    Unread,
}

// ============================================================================
// Seed Types
// ============================================================================

/// Entry to insert
#[derive(Debug, Clone)]
pub struct NewEntry {
    pub title: String,
    pub link: Option<String>,
    /// Milliseconds since the Unix epoch
    pub date: i64,
}

/// Feed listing row, the content of the `feeds` collection
#[derive(Debug, Clone, sqlx::FromRow, serde::Serialize)]
pub struct Feed {
    pub id: i64,
    pub name: String,
    pub url: String,
    pub group_id: Option<i64>,
    pub unread_count: i64,
}
