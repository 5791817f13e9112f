//! Row sources and the collections they notify.
//!
//! A [`RowSource`] names which entries a list shows (all, favorites, one feed,
//! one group) and carries the SQL filter the store applies to both reads and
//! updates. A [`Collection`] is what the change bus talks about; every row
//! source maps to exactly one collection.

use std::fmt;
use std::str::FromStr;

use sqlx::{QueryBuilder, Sqlite};
use thiserror::Error;

// ============================================================================
// Collections
// ============================================================================

/// A logical collection observers can watch for changes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Collection {
    /// Every entry.
    Entries,
    /// Favorite entries.
    Favorites,
    /// The feed listing (names, unread counts).
    Feeds,
    /// The group listing.
    Groups,
    /// Entries of one feed.
    FeedEntries(i64),
    /// Entries of every feed in one group.
    GroupEntries(i64),
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Collection::Entries => f.write_str("entries"),
            Collection::Favorites => f.write_str("favorites"),
            Collection::Feeds => f.write_str("feeds"),
            Collection::Groups => f.write_str("groups"),
            Collection::FeedEntries(id) => write!(f, "feeds/{}/entries", id),
            Collection::GroupEntries(id) => write!(f, "groups/{}/entries", id),
        }
    }
}

// ============================================================================
// Row Source
// ============================================================================

/// Which entries a list is bound to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowSource {
    All,
    Favorites,
    Feed(i64),
    Group(i64),
}

impl RowSource {
    /// The collection observers of this source listen on.
    pub fn collection(&self) -> Collection {
        match self {
            RowSource::All => Collection::Entries,
            RowSource::Favorites => Collection::Favorites,
            RowSource::Feed(id) => Collection::FeedEntries(*id),
            RowSource::Group(id) => Collection::GroupEntries(*id),
        }
    }

    /// Append this source's filter (a boolean SQL expression over alias `e`).
    pub(crate) fn push_filter(&self, builder: &mut QueryBuilder<'_, Sqlite>) {
        match self {
            RowSource::All => {
                builder.push("1 = 1");
            }
            RowSource::Favorites => {
                builder.push("e.is_favorite = 1");
            }
            RowSource::Feed(feed_id) => {
                builder.push("e.feed_id = ");
                builder.push_bind(*feed_id);
            }
            RowSource::Group(group_id) => {
                builder.push("e.feed_id IN (SELECT id FROM feeds WHERE group_id = ");
                builder.push_bind(*group_id);
                builder.push(")");
            }
        }
    }
}

impl fmt::Display for RowSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RowSource::All => f.write_str("all"),
            RowSource::Favorites => f.write_str("favorites"),
            RowSource::Feed(id) => write!(f, "feed:{}", id),
            RowSource::Group(id) => write!(f, "group:{}", id),
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum SourceParseError {
    #[error("Unknown row source '{0}' (expected all, favorites, feed:<id> or group:<id>)")]
    Unknown(String),

    #[error("Invalid id in row source '{0}'")]
    InvalidId(String),
}

impl FromStr for RowSource {
    type Err = SourceParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        match s {
            "all" => return Ok(RowSource::All),
            "favorites" => return Ok(RowSource::Favorites),
            _ => {}
        }

        let (kind, id) = s
            .split_once(':')
            .ok_or_else(|| SourceParseError::Unknown(s.to_string()))?;
        let id: i64 = id
            .parse()
            .map_err(|_| SourceParseError::InvalidId(s.to_string()))?;

        match kind {
            "feed" => Ok(RowSource::Feed(id)),
            "group" => Ok(RowSource::Group(id)),
            _ => Err(SourceParseError::Unknown(s.to_string())),
        }
    }
}
