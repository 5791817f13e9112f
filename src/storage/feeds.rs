use anyhow::{bail, Result};

use super::schema::Database;
use super::types::Feed;

impl Database {
    // ========================================================================
    // Group Operations
    // ========================================================================

    /// Create a feed group, returning its ID
    pub async fn insert_group(&self, name: &str) -> Result<i64> {
        let name = name.trim();
        if name.is_empty() {
            bail!("Group name cannot be empty or whitespace-only");
        }

        let row: (i64,) = sqlx::query_as("INSERT INTO feed_groups (name) VALUES (?) RETURNING id")
            .bind(name)
            .fetch_one(&self.pool)
            .await?;

        Ok(row.0)
    }

    /// Group a feed belongs to.
    ///
    /// `None` both when the feed is ungrouped and when it does not exist.
    pub async fn group_for_feed(&self, feed_id: i64) -> Result<Option<i64>> {
        let row: Option<(Option<i64>,)> = sqlx::query_as("SELECT group_id FROM feeds WHERE id = ?")
            .bind(feed_id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(row.and_then(|(group_id,)| group_id))
    }

    // ========================================================================
    // Feed Operations
    // ========================================================================

    /// Insert or update a feed keyed by URL, returning its ID
    pub async fn insert_feed(
        &self,
        name: &str,
        url: &str,
        group_id: Option<i64>,
        icon: Option<&[u8]>,
    ) -> Result<i64> {
        let row: (i64,) = sqlx::query_as(
            r#"
            INSERT INTO feeds (name, url, group_id, icon)
            VALUES (?, ?, ?, ?)
            ON CONFLICT(url) DO UPDATE SET
                name = excluded.name,
                group_id = excluded.group_id,
                icon = excluded.icon
            RETURNING id
        "#,
        )
        .bind(name)
        .bind(url)
        .bind(group_id)
        .bind(icon)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.0)
    }

    /// Get all feeds with their unread entry counts
    pub async fn get_feeds_with_unread_counts(&self) -> Result<Vec<Feed>> {
        let feeds = sqlx::query_as::<_, Feed>(
            r#"
            SELECT
                f.id, f.name, f.url, f.group_id,
                COUNT(CASE WHEN e.id IS NOT NULL AND e.is_read IS NULL THEN 1 END)
                    AS unread_count
            FROM feeds f
            LEFT JOIN entries e ON f.id = e.feed_id
            GROUP BY f.id
            ORDER BY f.name
        "#,
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(feeds)
    }
}
