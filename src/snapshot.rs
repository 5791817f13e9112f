//! Immutable point-in-time view of entry rows.

use std::collections::HashMap;
use std::sync::Arc;

use sqlx::sqlite::SqliteRow;
use sqlx::{FromRow, Row};

/// One entry as loaded from the store.
///
/// `read` is tri-state: `None` means the marker was never set, which always
/// displays as unread. Any stored value counts as set.
///
/// Feed columns are only selected when the list shows feed info; when a
/// column is absent the field is `None`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryRow {
    pub id: i64,
    pub title: Arc<str>,
    /// Milliseconds since the Unix epoch.
    pub date: i64,
    pub read: Option<bool>,
    pub favorite: bool,
    pub link: Option<Arc<str>>,
    pub feed_name: Option<Arc<str>>,
    pub feed_icon: Option<Arc<[u8]>>,
}

impl EntryRow {
    pub fn read_is_set(&self) -> bool {
        self.read.is_some()
    }
}

/// Look up an optional column by name, treating a missing column like NULL.
fn optional_column<'r, T>(row: &'r SqliteRow, column: &str) -> sqlx::Result<Option<T>>
where
    T: sqlx::Decode<'r, sqlx::Sqlite> + sqlx::Type<sqlx::Sqlite>,
{
    match row.try_get::<Option<T>, _>(column) {
        Ok(value) => Ok(value),
        Err(sqlx::Error::ColumnNotFound(_)) => Ok(None),
        Err(e) => Err(e),
    }
}

impl<'r> FromRow<'r, SqliteRow> for EntryRow {
    fn from_row(row: &'r SqliteRow) -> sqlx::Result<Self> {
        Ok(Self {
            id: row.try_get("id")?,
            title: Arc::from(row.try_get::<String, _>("title")?),
            date: row.try_get("date")?,
            read: row.try_get("is_read")?,
            favorite: row.try_get("is_favorite")?,
            link: optional_column::<String>(row, "link")?.map(Arc::from),
            feed_name: optional_column::<String>(row, "feed_name")?.map(Arc::from),
            feed_icon: optional_column::<Vec<u8>>(row, "feed_icon")?
                .filter(|bytes| !bytes.is_empty())
                .map(Arc::from),
        })
    }
}

/// Ordered, randomly indexable rows plus an id index.
///
/// Cloning is cheap; the rows are shared.
#[derive(Debug, Clone, Default)]
pub struct RowSnapshot {
    rows: Arc<[EntryRow]>,
    positions: Arc<HashMap<i64, usize>>,
}

impl RowSnapshot {
    pub fn new(rows: Vec<EntryRow>) -> Self {
        let positions = rows
            .iter()
            .enumerate()
            .map(|(pos, row)| (row.id, pos))
            .collect();
        Self {
            rows: Arc::from(rows),
            positions: Arc::new(positions),
        }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Row at `position`, if in range.
    pub fn get(&self, position: usize) -> Option<&EntryRow> {
        self.rows.get(position)
    }

    /// Row with entry id `id`, if present.
    pub fn find(&self, id: i64) -> Option<&EntryRow> {
        self.position_of(id).and_then(|pos| self.rows.get(pos))
    }

    pub fn position_of(&self, id: i64) -> Option<usize> {
        self.positions.get(&id).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = &EntryRow> {
        self.rows.iter()
    }
}
