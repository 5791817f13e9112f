//! Change notifications.
//!
//! Background writes announce which collections changed so other lists can
//! reload. Each operation builds one [`Publication`] and hands it to the
//! [`ChangeBus`] in a single fan-out.

use std::fmt;

use tokio::sync::broadcast;

use crate::source::{Collection, RowSource};

/// A change notice: a collection, optionally narrowed to one item in it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Change {
    pub collection: Collection,
    pub item: Option<i64>,
}

impl Change {
    /// The whole collection changed.
    pub fn collection(collection: Collection) -> Self {
        Self {
            collection,
            item: None,
        }
    }

    /// One item of the collection changed.
    pub fn item(collection: Collection, id: i64) -> Self {
        Self {
            collection,
            item: Some(id),
        }
    }
}

impl fmt::Display for Change {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.item {
            Some(id) => write!(f, "{}/{}", self.collection, id),
            None => write!(f, "{}", self.collection),
        }
    }
}

// ============================================================================
// Publication
// ============================================================================

/// The set of changes one write produces.
///
/// The row source's own collection always comes first. Any later change on
/// that same collection is dropped, so a list bound to favorites is not told
/// twice about the favorites it just wrote.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Publication {
    source: Collection,
    changes: Vec<Change>,
}

impl Publication {
    /// Start with a change on the whole source collection (bulk writes).
    pub fn for_source(source: &RowSource) -> Self {
        let collection = source.collection();
        Self {
            source: collection,
            changes: vec![Change::collection(collection)],
        }
    }

    /// Start with a change on one entry of the source collection.
    pub fn for_entry(source: &RowSource, entry_id: i64) -> Self {
        let collection = source.collection();
        Self {
            source: collection,
            changes: vec![Change::item(collection, entry_id)],
        }
    }

    /// Add a change unless it targets the source collection or is already listed.
    pub fn touch(&mut self, change: Change) -> &mut Self {
        if change.collection != self.source && !self.changes.contains(&change) {
            self.changes.push(change);
        }
        self
    }

    pub fn changes(&self) -> &[Change] {
        &self.changes
    }
}

// ============================================================================
// Change Bus
// ============================================================================

/// Broadcast channel of [`Change`]s.
///
/// Cloning shares the channel. Publishing with no subscribers is fine.
#[derive(Debug, Clone)]
pub struct ChangeBus {
    tx: broadcast::Sender<Change>,
}

impl ChangeBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }

    pub fn notify(&self, change: Change) {
        tracing::trace!(change = %change, "notify change");
        // Err only means nobody is listening
        let _ = self.tx.send(change);
    }

    pub fn publish(&self, publication: &Publication) {
        for change in publication.changes() {
            self.notify(*change);
        }
    }
}

impl Default for ChangeBus {
    fn default() -> Self {
        Self::new(64)
    }
}
