//! Entry list adapter.
//!
//! Binds a [`RowSnapshot`] of one [`RowSource`] to display rows, keeps the
//! user's not-yet-confirmed read and favorite edits in a [`PendingEdits`]
//! overlay, and pushes those edits to the store in background tasks.
//!
//! # Threading
//!
//! The adapter is driven from one foreground task through `&mut self`; the
//! overlay is never shared. Each edit is recorded synchronously, then a
//! `tokio::spawn`ed task performs the store write and publishes change
//! notices. The task reports back as an [`AdapterEvent`] on the channel given
//! at construction; the owner passes it to [`EntryListAdapter::handle_event`],
//! which rolls back edits whose write failed.
//!
//! Background tasks may finish in any order. Edit tickets make sure a late
//! failure report for an older edit never undoes a newer one.
//!
//! Methods that dispatch work must be called from within a Tokio runtime.

mod row;
mod tasks;

use std::future::Future;

use anyhow::Result;
use tokio::sync::mpsc;

pub use row::RowView;

use crate::notify::ChangeBus;
use crate::overlay::{EditTicket, PendingEdits};
use crate::snapshot::RowSnapshot;
use crate::source::RowSource;
use crate::storage::Database;
use tasks::{catch_task_panic, TaskContext};

// ============================================================================
// Events and Options
// ============================================================================

/// Outcome of a background persistence task.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AdapterEvent {
    /// `affected == 0` means the source's filter did not reach the entry.
    FavoriteSaved {
        entry_id: i64,
        favorite: bool,
        ticket: EditTicket,
        affected: u64,
    },
    FavoriteFailed {
        entry_id: i64,
        favorite: bool,
        ticket: EditTicket,
        error: String,
    },
    ReadSaved {
        entry_id: i64,
        read: bool,
        ticket: EditTicket,
        affected: u64,
    },
    ReadFailed {
        entry_id: i64,
        read: bool,
        ticket: EditTicket,
        error: String,
    },
    AllReadSaved {
        affected: u64,
    },
    AllReadFailed {
        error: String,
    },
}

/// Display and reconciliation settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AdapterOptions {
    /// Show feed name and icon with each row, and load those columns.
    pub show_feed_info: bool,
    /// Undo optimistic edits whose write failed or reached no row. When off,
    /// these are only logged and the overlay stays ahead of the store.
    pub rollback_failed_edits: bool,
    pub date_format: String,
    pub time_format: String,
    /// Rows loaded by [`EntryListAdapter::refresh`].
    pub snapshot_limit: i64,
}

impl Default for AdapterOptions {
    fn default() -> Self {
        Self {
            show_feed_info: true,
            rollback_failed_edits: true,
            date_format: "%Y-%m-%d".to_string(),
            time_format: "%H:%M".to_string(),
            snapshot_limit: 500,
        }
    }
}

// ============================================================================
// Adapter
// ============================================================================

pub struct EntryListAdapter {
    db: Database,
    bus: ChangeBus,
    source: RowSource,
    snapshot: RowSnapshot,
    edits: PendingEdits,
    options: AdapterOptions,
    event_tx: mpsc::Sender<AdapterEvent>,
}

impl EntryListAdapter {
    /// Create an adapter with an empty snapshot. Call [`refresh`](Self::refresh)
    /// or [`swap_snapshot`](Self::swap_snapshot) to bind rows.
    pub fn new(
        db: Database,
        bus: ChangeBus,
        source: RowSource,
        options: AdapterOptions,
        event_tx: mpsc::Sender<AdapterEvent>,
    ) -> Self {
        Self {
            db,
            bus,
            source,
            snapshot: RowSnapshot::empty(),
            edits: PendingEdits::new(),
            options,
            event_tx,
        }
    }

    pub fn source(&self) -> RowSource {
        self.source
    }

    pub fn snapshot(&self) -> &RowSnapshot {
        &self.snapshot
    }

    pub fn edits(&self) -> &PendingEdits {
        &self.edits
    }

    pub fn options(&self) -> &AdapterOptions {
        &self.options
    }

    pub fn len(&self) -> usize {
        self.snapshot.len()
    }

    pub fn is_empty(&self) -> bool {
        self.snapshot.is_empty()
    }

    // ------------------------------------------------------------------------
    // Snapshot lifecycle
    // ------------------------------------------------------------------------

    /// Drop every pending edit; the snapshot decides again.
    pub fn reset(&mut self) {
        self.edits.reset();
    }

    /// Bind a new snapshot, returning the previous one. Clears the overlay.
    pub fn swap_snapshot(&mut self, snapshot: RowSnapshot) -> RowSnapshot {
        self.reset();
        tracing::debug!(source = %self.source, rows = snapshot.len(), "snapshot swapped");
        std::mem::replace(&mut self.snapshot, snapshot)
    }

    /// The bound rows changed in place. Clears the overlay.
    pub fn notify_data_set_changed(&mut self) {
        self.reset();
    }

    /// The bound rows are no longer valid. Clears the overlay.
    pub fn notify_data_set_invalidated(&mut self) {
        self.reset();
    }

    /// Load the current rows of the source from the store and bind them.
    pub async fn refresh(&mut self) -> Result<()> {
        let snapshot = self
            .db
            .load_snapshot(
                &self.source,
                self.options.show_feed_info,
                self.options.snapshot_limit,
            )
            .await?;
        self.swap_snapshot(snapshot);
        Ok(())
    }

    // ------------------------------------------------------------------------
    // Effective state
    // ------------------------------------------------------------------------

    pub fn effective_favorite(&self, entry_id: i64, snapshot_favorite: bool) -> bool {
        self.edits.effective_favorite(entry_id, snapshot_favorite)
    }

    pub fn effective_read(&self, entry_id: i64, snapshot_read_is_set: bool) -> bool {
        self.edits.effective_read(entry_id, snapshot_read_is_set)
    }

    /// Bind projection of the row at `position`.
    pub fn row(&self, position: usize) -> Option<RowView<'_>> {
        let entry = self.snapshot.get(position)?;
        Some(RowView {
            id: entry.id,
            title: &entry.title,
            subtitle: row::subtitle(entry, &self.options),
            icon: row::icon(entry, &self.options),
            link: entry.link.as_deref(),
            favorite: self.effective_favorite(entry.id, entry.favorite),
            read: self.effective_read(entry.id, entry.read_is_set()),
        })
    }

    pub fn rows(&self) -> impl Iterator<Item = RowView<'_>> {
        (0..self.len()).filter_map(move |position| self.row(position))
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    /// Flip the displayed favorite state and persist it in the background.
    ///
    /// Returns the new effective state. An id missing from the snapshot is
    /// treated as stored not-favorite.
    pub fn toggle_favorite(&mut self, entry_id: i64) -> bool {
        let stored = self
            .snapshot
            .find(entry_id)
            .is_some_and(|entry| entry.favorite);
        let favorite = !self.edits.effective_favorite(entry_id, stored);
        let ticket = self.edits.set_favorite(entry_id, favorite);
        tracing::debug!(entry_id, favorite, "favorite toggled");

        self.dispatch(
            "toggle_favorite",
            tasks::persist_favorite(self.task_context(), entry_id, favorite, ticket),
            move |error| AdapterEvent::FavoriteFailed {
                entry_id,
                favorite,
                ticket,
                error,
            },
        );
        favorite
    }

    pub fn mark_read(&mut self, entry_id: i64) {
        self.set_read(entry_id, true);
    }

    pub fn mark_unread(&mut self, entry_id: i64) {
        self.set_read(entry_id, false);
    }

    /// Read checkbox handler: checked marks read, unchecked marks unread.
    pub fn set_read(&mut self, entry_id: i64, read: bool) {
        let ticket = self.edits.set_read(entry_id, read);
        tracing::debug!(entry_id, read, "read state changed");

        self.dispatch(
            if read { "mark_read" } else { "mark_unread" },
            tasks::persist_read(self.task_context(), entry_id, read, ticket),
            move |error| AdapterEvent::ReadFailed {
                entry_id,
                read,
                ticket,
                error,
            },
        );
    }

    /// Forget pending read edits and mark every unread row of the source read.
    pub fn mark_all_read(&mut self) {
        self.edits.clear_read();
        tracing::debug!(source = %self.source, "mark all read");

        self.dispatch(
            "mark_all_read",
            tasks::persist_all_read(self.task_context()),
            |error| AdapterEvent::AllReadFailed { error },
        );
    }

    // ------------------------------------------------------------------------
    // Reconciliation
    // ------------------------------------------------------------------------

    /// Apply a background result. Returns whether displayed state changed.
    ///
    /// A write that changed no row is treated like a failure: nothing was
    /// persisted, so the edit is not kept on display.
    pub fn handle_event(&mut self, event: AdapterEvent) -> bool {
        let rollback = self.options.rollback_failed_edits;
        match event {
            AdapterEvent::FavoriteSaved {
                entry_id,
                favorite,
                ticket,
                affected,
            } => {
                if affected == 0 {
                    tracing::debug!(entry_id, favorite, source = %self.source, "favorite reached no row");
                    return rollback && self.edits.rollback_favorite(entry_id, ticket);
                }
                tracing::debug!(entry_id, favorite, affected, "favorite saved");
                self.edits.confirm_favorite(entry_id, ticket);
                false
            }
            AdapterEvent::ReadSaved {
                entry_id,
                read,
                ticket,
                affected,
            } => {
                if affected == 0 {
                    tracing::debug!(entry_id, read, source = %self.source, "read state reached no row");
                    return rollback && self.edits.rollback_read(entry_id, ticket);
                }
                tracing::debug!(entry_id, read, affected, "read state saved");
                self.edits.confirm_read(entry_id, ticket);
                false
            }
            AdapterEvent::AllReadSaved { affected } => {
                tracing::info!(source = %self.source, affected, "marked all read");
                false
            }
            AdapterEvent::FavoriteFailed {
                entry_id,
                favorite,
                ticket,
                error,
            } => {
                tracing::warn!(entry_id, favorite, error = %error, "Failed to save favorite");
                rollback && self.edits.rollback_favorite(entry_id, ticket)
            }
            AdapterEvent::ReadFailed {
                entry_id,
                read,
                ticket,
                error,
            } => {
                tracing::warn!(entry_id, read, error = %error, "Failed to save read state");
                rollback && self.edits.rollback_read(entry_id, ticket)
            }
            AdapterEvent::AllReadFailed { error } => {
                // Pending read edits were already dropped; the snapshot is the truth again
                tracing::warn!(source = %self.source, error = %error, "Failed to mark all read");
                false
            }
        }
    }

    // ------------------------------------------------------------------------
    // Dispatch
    // ------------------------------------------------------------------------

    fn task_context(&self) -> TaskContext {
        TaskContext {
            db: self.db.clone(),
            bus: self.bus.clone(),
            source: self.source,
        }
    }

    /// Spawn `work`; a panic is reported as the event built by `on_panic`.
    fn dispatch<F, P>(&self, task: &'static str, work: F, on_panic: P)
    where
        F: Future<Output = AdapterEvent> + Send + 'static,
        P: FnOnce(String) -> AdapterEvent + Send + 'static,
    {
        let tx = self.event_tx.clone();
        tokio::spawn(async move {
            let event = match catch_task_panic(work).await {
                Ok(event) => event,
                Err(error) => {
                    tracing::error!(task, error = %error, "Background task panicked");
                    on_panic(error)
                }
            };
            if tx.send(event).await.is_err() {
                tracing::debug!(task, "Adapter event receiver dropped");
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::snapshot::tests::row;

    async fn test_adapter() -> (EntryListAdapter, mpsc::Receiver<AdapterEvent>) {
        let db = Database::open(":memory:").await.unwrap();
        let (tx, rx) = mpsc::channel(8);
        let adapter = EntryListAdapter::new(
            db,
            ChangeBus::default(),
            RowSource::All,
            AdapterOptions::default(),
            tx,
        );
        (adapter, rx)
    }

    #[tokio::test]
    async fn test_swap_snapshot_resets_overlay() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.swap_snapshot(RowSnapshot::new(vec![row(3, None, false)]));
        adapter.mark_read(3);
        assert!(adapter.effective_read(3, false));

        let old = adapter.swap_snapshot(RowSnapshot::new(vec![row(3, None, false)]));
        assert_eq!(old.len(), 1);
        assert!(adapter.edits().is_empty());
        assert!(!adapter.effective_read(3, false));
    }

    #[tokio::test]
    async fn test_data_set_notifications_reset_overlay() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.toggle_favorite(1);
        adapter.notify_data_set_changed();
        assert!(adapter.edits().is_empty());

        adapter.toggle_favorite(1);
        adapter.notify_data_set_invalidated();
        assert!(adapter.edits().is_empty());
    }

    #[tokio::test]
    async fn test_toggle_uses_snapshot_favorite() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.swap_snapshot(RowSnapshot::new(vec![row(5, None, true)]));
        assert!(!adapter.toggle_favorite(5));
        assert!(adapter.toggle_favorite(5));
        // Unknown id starts from not-favorite
        assert!(adapter.toggle_favorite(99));
    }

    #[tokio::test]
    async fn test_row_view_reflects_overlay() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.swap_snapshot(RowSnapshot::new(vec![row(1, None, false), row(2, Some(true), true)]));

        adapter.mark_read(1);
        adapter.toggle_favorite(2);

        let first = adapter.row(0).unwrap();
        assert!(first.read);
        assert!(!first.favorite);
        assert_eq!(first.title, "Entry 1");
        assert_eq!(first.link, Some("https://example.com/1"));

        let second = adapter.row(1).unwrap();
        assert!(second.read);
        assert!(!second.favorite);

        assert!(adapter.row(2).is_none());
        assert_eq!(adapter.rows().count(), 2);
    }

    #[tokio::test]
    async fn test_failed_favorite_rolls_back() {
        let (mut adapter, _rx) = test_adapter().await;
        let favorite = adapter.toggle_favorite(4);
        assert!(favorite);

        let ticket = adapter.edits.set_favorite(4, true);
        let changed = adapter.handle_event(AdapterEvent::FavoriteFailed {
            entry_id: 4,
            favorite: true,
            ticket,
            error: "disk full".to_string(),
        });
        assert!(changed);
        assert!(!adapter.effective_favorite(4, false));
    }

    #[tokio::test]
    async fn test_failure_without_rollback_keeps_overlay() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.options.rollback_failed_edits = false;

        let ticket = adapter.edits.set_read(4, true);
        let changed = adapter.handle_event(AdapterEvent::ReadFailed {
            entry_id: 4,
            read: true,
            ticket,
            error: "disk full".to_string(),
        });
        assert!(!changed);
        assert!(adapter.effective_read(4, false));
    }

    #[tokio::test]
    async fn test_saved_events_change_nothing() {
        let (mut adapter, _rx) = test_adapter().await;
        let ticket = adapter.edits.set_read(4, true);
        assert!(!adapter.handle_event(AdapterEvent::ReadSaved {
            entry_id: 4,
            read: true,
            ticket,
            affected: 1,
        }));
        assert!(!adapter.handle_event(AdapterEvent::AllReadSaved { affected: 0 }));
        assert!(adapter.effective_read(4, false));
    }

    #[tokio::test]
    async fn test_failure_falls_back_to_saved_edit() {
        let (mut adapter, _rx) = test_adapter().await;
        let t1 = adapter.edits.set_favorite(7, true);
        let t2 = adapter.edits.set_favorite(7, false);

        adapter.handle_event(AdapterEvent::FavoriteSaved {
            entry_id: 7,
            favorite: true,
            ticket: t1,
            affected: 1,
        });
        let changed = adapter.handle_event(AdapterEvent::FavoriteFailed {
            entry_id: 7,
            favorite: false,
            ticket: t2,
            error: "disk full".to_string(),
        });
        assert!(changed);
        // Back to what the store holds after t1
        assert!(adapter.effective_favorite(7, false));
    }

    #[tokio::test]
    async fn test_write_reaching_no_row_rolls_back() {
        let (mut adapter, _rx) = test_adapter().await;
        let ticket = adapter.edits.set_read(4, true);
        assert!(adapter.handle_event(AdapterEvent::ReadSaved {
            entry_id: 4,
            read: true,
            ticket,
            affected: 0,
        }));
        assert!(!adapter.effective_read(4, false));
    }

    #[tokio::test]
    async fn test_mark_all_read_clears_read_edits_only() {
        let (mut adapter, _rx) = test_adapter().await;
        adapter.mark_read(1);
        adapter.mark_unread(2);
        adapter.toggle_favorite(3);

        adapter.mark_all_read();
        assert_eq!(adapter.edits().pending_read().count(), 0);
        assert_eq!(adapter.edits().pending_unread().count(), 0);
        assert_eq!(adapter.edits().pending_favorite().collect::<Vec<_>>(), vec![3]);
    }
}
