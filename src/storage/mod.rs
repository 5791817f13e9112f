mod entries;
mod feeds;
mod schema;
mod types;

pub use entries::MAX_SNAPSHOT_ROWS;
pub use schema::Database;
pub use types::{DatabaseError, EntryValues, Feed, NewEntry, ReadMarker, Selection};
