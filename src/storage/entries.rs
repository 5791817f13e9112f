use anyhow::Result;
use sqlx::QueryBuilder;

use super::schema::Database;
use super::types::{EntryValues, NewEntry, ReadMarker, Selection};
use crate::snapshot::{EntryRow, RowSnapshot};
use crate::source::RowSource;

// ============================================================================
// Query Limit Constants
// ============================================================================

/// Maximum number of rows in any snapshot (OOM protection)
pub const MAX_SNAPSHOT_ROWS: i64 = 2000;

impl Database {
    // ========================================================================
    // Entry Mutations
    // ========================================================================

    /// Apply `values` to the rows of `source` picked by `selection`.
    ///
    /// Returns the number of rows changed. An entry outside the source's
    /// filter is not touched, so a per-entry update through the favorites
    /// source only reaches favorites. Empty `values` is a no-op.
    pub async fn update(
        &self,
        source: &RowSource,
        selection: Selection,
        values: &EntryValues,
    ) -> Result<u64> {
        if values.is_empty() {
            return Ok(0);
        }

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new("UPDATE entries AS e SET ");
        {
            let mut assignments = builder.separated(", ");
            match values.read {
                Some(ReadMarker::Read) => {
                    assignments.push("is_read = 1");
                }
                Some(ReadMarker::Cleared) => {
                    assignments.push("is_read = NULL");
                }
                None => {}
            }
            if let Some(favorite) = values.favorite {
                assignments.push("is_favorite = ");
                assignments.push_bind_unseparated(favorite);
            }
        }

        builder.push(" WHERE ");
        source.push_filter(&mut builder);
        match selection {
            Selection::Entry(id) => {
                builder.push(" AND e.id = ");
                builder.push_bind(id);
            }
            Selection::Unread => {
                builder.push(" AND e.is_read IS NULL");
            }
        }

        let result = builder.build().execute(&self.pool).await?;
        tracing::debug!(
            source = %source,
            selection = ?selection,
            affected = result.rows_affected(),
            "entries updated"
        );
        Ok(result.rows_affected())
    }

    /// Insert an entry into a feed, returning its id
    pub async fn insert_entry(&self, feed_id: i64, entry: &NewEntry) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            "INSERT INTO entries (feed_id, title, link, date) VALUES (?, ?, ?, ?) RETURNING id",
        )
        .bind(feed_id)
        .bind(&entry.title)
        .bind(&entry.link)
        .bind(entry.date)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    // ========================================================================
    // Entry Queries
    // ========================================================================

    /// Owning feed of an entry, `None` if the entry does not exist
    pub async fn feed_id_for_entry(&self, entry_id: i64) -> Result<Option<i64>> {
        let row: Option<(i64,)> = sqlx::query_as("SELECT feed_id FROM entries WHERE id = ?")
            .bind(entry_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.map(|(feed_id,)| feed_id))
    }

    /// Load the current rows of `source`, newest first.
    ///
    /// Feed name and icon columns are only selected when `with_feed_info` is
    /// set. `limit` is clamped to `1..=`[`MAX_SNAPSHOT_ROWS`].
    pub async fn load_snapshot(
        &self,
        source: &RowSource,
        with_feed_info: bool,
        limit: i64,
    ) -> Result<RowSnapshot> {
        let limit = limit.clamp(1, MAX_SNAPSHOT_ROWS);

        let mut builder: QueryBuilder<sqlx::Sqlite> = QueryBuilder::new(
            "SELECT e.id, e.title, e.date, e.is_read, e.is_favorite, e.link",
        );
        if with_feed_info {
            builder.push(", f.name AS feed_name, f.icon AS feed_icon");
        }
        builder.push(" FROM entries e JOIN feeds f ON f.id = e.feed_id WHERE ");
        source.push_filter(&mut builder);
        builder.push(" ORDER BY e.date DESC, e.id DESC LIMIT ");
        builder.push_bind(limit);

        let rows: Vec<EntryRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        tracing::debug!(source = %source, rows = rows.len(), "snapshot loaded");
        Ok(RowSnapshot::new(rows))
    }

    /// Count unread entries of `source`
    pub async fn unread_count(&self, source: &RowSource) -> Result<i64> {
        let mut builder: QueryBuilder<sqlx::Sqlite> =
            QueryBuilder::new("SELECT COUNT(*) FROM entries e WHERE ");
        source.push_filter(&mut builder);
        builder.push(" AND e.is_read IS NULL");

        let row: (i64,) = builder.build_query_as().fetch_one(&self.pool).await?;
        Ok(row.0)
    }
}
