//! Optimistic read/favorite edits layered over a row snapshot.
//!
//! The list shows what the user just did before the store has confirmed it.
//! Each entry has two independent axes (read, favorite); on each axis an entry
//! is either untouched (the snapshot decides) or carries a pending value that
//! overrides the snapshot.
//!
//! The overlay is a forward-looking cache, not a queue: confirmed edits are not
//! drained. Everything is dropped on [`PendingEdits::reset`], which the adapter
//! calls whenever a new snapshot is bound.
//!
//! # Effective state
//!
//! ```text
//! favorite = pending-favorite || (snapshot.favorite && !pending-unfavorite)
//! read     = pending-read     || (snapshot.read_is_set && !pending-unread)
//! ```
//!
//! Only the newest pending value per id and axis is displayed, which makes the
//! "never in both sets of a pair" invariant structural. Older unconfirmed
//! values are kept underneath so a failed write can fall back to them.

use std::collections::HashMap;

// ============================================================================
// Types
// ============================================================================

/// Stamp identifying a single overlay edit.
///
/// Tickets increase monotonically for the lifetime of a [`PendingEdits`],
/// including across resets, so a failure report for an older edit can never
/// be mistaken for the current one.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct EditTicket(u64);

/// State of one axis (read or favorite) for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AxisState {
    /// No local edit; the snapshot decides.
    Unset,
    /// Locally set (read / favorite), not yet superseded by a new snapshot.
    PendingSet,
    /// Locally cleared (unread / unfavorite).
    PendingUnset,
}

/// Both axes for one entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EntryEdits {
    pub read: AxisState,
    pub favorite: AxisState,
}

#[derive(Debug, Clone, Copy)]
struct Pending {
    value: bool,
    ticket: EditTicket,
}

/// One axis worth of pending edits keyed by entry id.
///
/// Each id keeps its unconfirmed edits oldest first; the last one is what is
/// displayed. A stack is never left empty.
#[derive(Debug, Default)]
struct Axis {
    pending: HashMap<i64, Vec<Pending>>,
}

impl Axis {
    fn get(&self, id: i64) -> Option<bool> {
        self.pending
            .get(&id)
            .and_then(|stack| stack.last())
            .map(|p| p.value)
    }

    fn set(&mut self, id: i64, value: bool, ticket: EditTicket) {
        self.pending
            .entry(id)
            .or_default()
            .push(Pending { value, ticket });
    }

    /// Undo the edit carrying `ticket`.
    ///
    /// The newest edit gives way to the one below it, or to the snapshot. An
    /// edit that was already superseded is only forgotten, so it cannot come
    /// back later. Returns whether the displayed value may have changed.
    fn rollback(&mut self, id: i64, ticket: EditTicket) -> bool {
        let Some(stack) = self.pending.get_mut(&id) else {
            return false;
        };
        let Some(position) = stack.iter().position(|p| p.ticket == ticket) else {
            return false;
        };

        let newest = position + 1 == stack.len();
        stack.remove(position);
        if stack.is_empty() {
            self.pending.remove(&id);
        }
        newest
    }

    /// The edit carrying `ticket` reached the store; older edits for `id`
    /// can no longer be fallen back to.
    fn confirm(&mut self, id: i64, ticket: EditTicket) {
        if let Some(stack) = self.pending.get_mut(&id) {
            if let Some(position) = stack.iter().position(|p| p.ticket == ticket) {
                stack.drain(..position);
            }
        }
    }

    fn ids_with(&self, value: bool) -> impl Iterator<Item = i64> + '_ {
        self.pending
            .iter()
            .filter(move |(_, stack)| stack.last().is_some_and(|p| p.value == value))
            .map(|(id, _)| *id)
    }

    fn state(&self, id: i64) -> AxisState {
        match self.get(id) {
            None => AxisState::Unset,
            Some(true) => AxisState::PendingSet,
            Some(false) => AxisState::PendingUnset,
        }
    }

    fn clear(&mut self) {
        self.pending.clear();
    }

    fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }
}

// ============================================================================
// PendingEdits
// ============================================================================

/// The four pending sets (read, unread, favorite, unfavorite).
#[derive(Debug, Default)]
pub struct PendingEdits {
    read: Axis,
    favorite: Axis,
    next_ticket: u64,
}

impl PendingEdits {
    pub fn new() -> Self {
        Self::default()
    }

    /// Forget every pending edit. Idempotent.
    pub fn reset(&mut self) {
        self.read.clear();
        self.favorite.clear();
    }

    /// True when no entry has a pending edit on either axis.
    pub fn is_empty(&self) -> bool {
        self.read.is_empty() && self.favorite.is_empty()
    }

    fn issue_ticket(&mut self) -> EditTicket {
        self.next_ticket += 1;
        EditTicket(self.next_ticket)
    }

    // ------------------------------------------------------------------------
    // Effective state
    // ------------------------------------------------------------------------

    /// Favorite state to display, given the snapshot's stored flag.
    pub fn effective_favorite(&self, id: i64, snapshot_favorite: bool) -> bool {
        self.favorite.get(id).unwrap_or(snapshot_favorite)
    }

    /// Read state to display, given whether the snapshot's read marker is set.
    ///
    /// An unset marker means "never read", whatever the stored value would be.
    pub fn effective_read(&self, id: i64, snapshot_read_is_set: bool) -> bool {
        self.read.get(id).unwrap_or(snapshot_read_is_set)
    }

    // ------------------------------------------------------------------------
    // Edits
    // ------------------------------------------------------------------------

    /// Record a favorite/unfavorite edit, replacing any earlier one for `id`.
    pub fn set_favorite(&mut self, id: i64, favorite: bool) -> EditTicket {
        let ticket = self.issue_ticket();
        self.favorite.set(id, favorite, ticket);
        ticket
    }

    /// Record a read/unread edit, replacing any earlier one for `id`.
    pub fn set_read(&mut self, id: i64, read: bool) -> EditTicket {
        let ticket = self.issue_ticket();
        self.read.set(id, read, ticket);
        ticket
    }

    /// Drop every pending read and unread edit; favorites are kept.
    pub fn clear_read(&mut self) {
        self.read.clear();
    }

    /// Undo a failed favorite edit.
    ///
    /// The previous pending value for `id`, if any, is shown again. Returns
    /// whether the displayed value may have changed; a superseded edit is
    /// dropped without touching the newer one.
    pub fn rollback_favorite(&mut self, id: i64, ticket: EditTicket) -> bool {
        self.favorite.rollback(id, ticket)
    }

    /// Undo a failed read edit, see [`rollback_favorite`](Self::rollback_favorite).
    pub fn rollback_read(&mut self, id: i64, ticket: EditTicket) -> bool {
        self.read.rollback(id, ticket)
    }

    /// Forget favorite edits for `id` older than the persisted `ticket`.
    pub fn confirm_favorite(&mut self, id: i64, ticket: EditTicket) {
        self.favorite.confirm(id, ticket);
    }

    pub fn confirm_read(&mut self, id: i64, ticket: EditTicket) {
        self.read.confirm(id, ticket);
    }

    // ------------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------------

    pub fn state(&self, id: i64) -> EntryEdits {
        EntryEdits {
            read: self.read.state(id),
            favorite: self.favorite.state(id),
        }
    }

    pub fn pending_read(&self) -> impl Iterator<Item = i64> + '_ {
        self.read.ids_with(true)
    }

    pub fn pending_unread(&self) -> impl Iterator<Item = i64> + '_ {
        self.read.ids_with(false)
    }

    pub fn pending_favorite(&self) -> impl Iterator<Item = i64> + '_ {
        self.favorite.ids_with(true)
    }

    pub fn pending_unfavorite(&self) -> impl Iterator<Item = i64> + '_ {
        self.favorite.ids_with(false)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::collections::HashSet;

    fn set(iter: impl Iterator<Item = i64>) -> HashSet<i64> {
        iter.collect()
    }

    #[test]
    fn test_untouched_ids_follow_snapshot() {
        let edits = PendingEdits::new();
        assert!(edits.effective_favorite(1, true));
        assert!(!edits.effective_favorite(1, false));
        assert!(edits.effective_read(1, true));
        assert!(!edits.effective_read(1, false));
        assert_eq!(
            edits.state(1),
            EntryEdits {
                read: AxisState::Unset,
                favorite: AxisState::Unset
            }
        );
    }

    #[test]
    fn test_favorite_toggle_scenario() {
        // Row 7 is stored as not favorite.
        let mut edits = PendingEdits::new();
        let current = edits.effective_favorite(7, false);
        edits.set_favorite(7, !current);
        assert!(edits.effective_favorite(7, false));

        let current = edits.effective_favorite(7, false);
        edits.set_favorite(7, !current);
        assert!(!edits.effective_favorite(7, false));
        assert_eq!(set(edits.pending_unfavorite()), HashSet::from([7]));
        assert!(set(edits.pending_favorite()).is_empty());
    }

    #[test]
    fn test_unfavorite_overrides_stored_favorite() {
        let mut edits = PendingEdits::new();
        edits.set_favorite(4, false);
        assert!(!edits.effective_favorite(4, true));
    }

    #[test]
    fn test_mark_read_then_reset_scenario() {
        let mut edits = PendingEdits::new();
        assert!(!edits.effective_read(3, false));
        edits.set_read(3, true);
        assert!(edits.effective_read(3, false));
        edits.reset();
        assert!(!edits.effective_read(3, false));
        assert!(edits.is_empty());
    }

    #[test]
    fn test_read_then_unread_is_last_write_wins() {
        let mut edits = PendingEdits::new();
        edits.set_read(9, true);
        edits.set_read(9, false);
        assert!(set(edits.pending_read()).is_empty());
        assert_eq!(set(edits.pending_unread()), HashSet::from([9]));
        assert!(!edits.effective_read(9, false));
        // A pending unread hides a set marker as well
        assert!(!edits.effective_read(9, true));
    }

    #[test]
    fn test_clear_read_keeps_favorites() {
        let mut edits = PendingEdits::new();
        edits.set_read(1, true);
        edits.set_read(2, false);
        edits.set_favorite(3, true);
        edits.clear_read();
        assert!(set(edits.pending_read()).is_empty());
        assert!(set(edits.pending_unread()).is_empty());
        assert_eq!(set(edits.pending_favorite()), HashSet::from([3]));
    }

    #[test]
    fn test_rollback_only_matching_ticket() {
        let mut edits = PendingEdits::new();
        let first = edits.set_favorite(5, true);
        let second = edits.set_favorite(5, false);

        // Stale failure report leaves the newer edit alone
        assert!(!edits.rollback_favorite(5, first));
        assert_eq!(edits.state(5).favorite, AxisState::PendingUnset);

        assert!(edits.rollback_favorite(5, second));
        assert_eq!(edits.state(5).favorite, AxisState::Unset);
    }

    #[test]
    fn test_rollback_restores_earlier_edit() {
        // Stored not favorite; t1 favorites, t2 unfavorites and fails.
        let mut edits = PendingEdits::new();
        edits.set_favorite(7, true);
        let t2 = edits.set_favorite(7, false);
        assert!(!edits.effective_favorite(7, false));

        assert!(edits.rollback_favorite(7, t2));
        assert!(edits.effective_favorite(7, false));
        assert_eq!(edits.state(7).favorite, AxisState::PendingSet);
        assert_eq!(set(edits.pending_favorite()), HashSet::from([7]));
        assert!(set(edits.pending_unfavorite()).is_empty());
    }

    #[test]
    fn test_superseded_failure_does_not_resurface() {
        let mut edits = PendingEdits::new();
        let t1 = edits.set_read(3, true);
        let t2 = edits.set_read(3, false);
        let t3 = edits.set_read(3, true);

        // t2 failed after t3 replaced it: nothing visible changes
        assert!(!edits.rollback_read(3, t2));
        assert!(edits.effective_read(3, false));

        // t3 fails next: fall back past the failed t2 to t1
        assert!(edits.rollback_read(3, t3));
        assert!(edits.effective_read(3, false));
        assert_eq!(edits.state(3).read, AxisState::PendingSet);

        assert!(edits.rollback_read(3, t1));
        assert_eq!(edits.state(3).read, AxisState::Unset);
    }

    #[test]
    fn test_confirm_drops_older_edits() {
        let mut edits = PendingEdits::new();
        let t1 = edits.set_favorite(2, true);
        let t2 = edits.set_favorite(2, false);
        edits.confirm_favorite(2, t2);

        // t1 is gone; a late failure report for it is a no-op
        assert!(!edits.rollback_favorite(2, t1));
        assert!(!edits.effective_favorite(2, true));

        assert!(edits.rollback_favorite(2, t2));
        assert!(edits.is_empty());
    }

    #[test]
    fn test_rollback_after_reset_is_noop() {
        let mut edits = PendingEdits::new();
        let ticket = edits.set_read(2, true);
        edits.reset();
        assert!(!edits.rollback_read(2, ticket));

        // Tickets keep increasing across resets
        let next = edits.set_read(2, true);
        assert!(next > ticket);
    }

    #[test]
    fn test_reset_is_idempotent() {
        let mut edits = PendingEdits::new();
        edits.reset();
        edits.reset();
        assert!(edits.is_empty());
    }

    #[derive(Debug, Clone)]
    enum Op {
        Favorite(i64, bool),
        Read(i64, bool),
        ClearRead,
        Reset,
    }

    fn op() -> impl Strategy<Value = Op> {
        prop_oneof![
            (0i64..8, any::<bool>()).prop_map(|(id, v)| Op::Favorite(id, v)),
            (0i64..8, any::<bool>()).prop_map(|(id, v)| Op::Read(id, v)),
            Just(Op::ClearRead),
            Just(Op::Reset),
        ]
    }

    proptest! {
        #[test]
        fn prop_pairs_stay_disjoint(ops in proptest::collection::vec(op(), 0..64)) {
            let mut edits = PendingEdits::new();
            for op in ops {
                match op {
                    Op::Favorite(id, v) => { edits.set_favorite(id, v); }
                    Op::Read(id, v) => { edits.set_read(id, v); }
                    Op::ClearRead => edits.clear_read(),
                    Op::Reset => edits.reset(),
                }
                let read = set(edits.pending_read());
                let unread = set(edits.pending_unread());
                let fav = set(edits.pending_favorite());
                let unfav = set(edits.pending_unfavorite());
                prop_assert!(read.is_disjoint(&unread));
                prop_assert!(fav.is_disjoint(&unfav));
            }
        }

        #[test]
        fn prop_double_toggle_restores(id in 0i64..100, stored in any::<bool>()) {
            let mut edits = PendingEdits::new();
            let original = edits.effective_favorite(id, stored);
            edits.set_favorite(id, !original);
            let flipped = edits.effective_favorite(id, stored);
            edits.set_favorite(id, !flipped);
            prop_assert_eq!(edits.effective_favorite(id, stored), original);
        }

        #[test]
        fn prop_reset_defers_to_snapshot(
            ops in proptest::collection::vec(op(), 0..32),
            id in 0i64..8,
            fav in any::<bool>(),
            read_set in any::<bool>(),
        ) {
            let mut edits = PendingEdits::new();
            for op in ops {
                match op {
                    Op::Favorite(i, v) => { edits.set_favorite(i, v); }
                    Op::Read(i, v) => { edits.set_read(i, v); }
                    Op::ClearRead => edits.clear_read(),
                    Op::Reset => edits.reset(),
                }
            }
            edits.reset();
            prop_assert_eq!(edits.effective_favorite(id, fav), fav);
            prop_assert_eq!(edits.effective_read(id, read_set), read_set);
        }
    }
}
