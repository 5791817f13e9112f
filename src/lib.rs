//! Feed entry list with optimistic read and favorite edits.
//!
//! - [`overlay`]: pending edits layered over a snapshot
//! - [`adapter`]: binds a snapshot to display rows and persists edits in the background
//! - [`storage`]: SQLite store of feeds, groups and entries
//! - [`notify`]: change notices other lists subscribe to
//!
//! # Example
//!
//! ```no_run
//! use feedlist::adapter::{AdapterOptions, EntryListAdapter};
//! use feedlist::notify::ChangeBus;
//! use feedlist::source::RowSource;
//! use feedlist::storage::Database;
//!
//! # async fn run() -> anyhow::Result<()> {
//! let db = Database::open("entries.db").await?;
//! let (tx, mut rx) = tokio::sync::mpsc::channel(32);
//! let mut adapter =
//!     EntryListAdapter::new(db, ChangeBus::default(), RowSource::All, AdapterOptions::default(), tx);
//! adapter.refresh().await?;
//!
//! let favorite = adapter.toggle_favorite(7);
//! if let Some(event) = rx.recv().await {
//!     adapter.handle_event(event);
//! }
//! # let _ = favorite;
//! # Ok(())
//! # }
//! ```

pub mod adapter;
pub mod config;
pub mod notify;
pub mod overlay;
pub mod snapshot;
pub mod source;
pub mod storage;
