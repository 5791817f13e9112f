//! Background persistence work.
//!
//! Each function performs one store update and, when rows changed, one
//! publication. None of them touch the overlay; results travel back to the
//! adapter as [`AdapterEvent`]s.

use futures::FutureExt;
use std::panic::AssertUnwindSafe;

use super::AdapterEvent;
use crate::notify::{Change, ChangeBus, Publication};
use crate::overlay::EditTicket;
use crate::source::{Collection, RowSource};
use crate::storage::{Database, EntryValues, Selection};

/// Everything a background task needs, cloned off the adapter.
#[derive(Clone)]
pub(super) struct TaskContext {
    pub db: Database,
    pub bus: ChangeBus,
    pub source: RowSource,
}

/// Wraps a future to catch panics and convert them to errors.
///
/// Instead of the task silently disappearing (caught by Tokio's runtime but
/// not handled), a panic becomes `Err(String)` carrying the panic message.
pub(super) async fn catch_task_panic<F, T>(future: F) -> Result<T, String>
where
    F: std::future::Future<Output = T>,
{
    AssertUnwindSafe(future)
        .catch_unwind()
        .await
        .map_err(|panic| {
            if let Some(s) = panic.downcast_ref::<&'static str>() {
                s.to_string()
            } else if let Some(s) = panic.downcast_ref::<String>() {
                s.clone()
            } else {
                format!("Unknown panic: {:?}", (*panic).type_id())
            }
        })
}

/// Write the favorite flag for one entry.
pub(super) async fn persist_favorite(
    ctx: TaskContext,
    entry_id: i64,
    favorite: bool,
    ticket: EditTicket,
) -> AdapterEvent {
    let values = EntryValues::favorite_values(favorite);
    match ctx
        .db
        .update(&ctx.source, Selection::Entry(entry_id), &values)
        .await
    {
        Ok(affected) => {
            if affected > 0 {
                let mut publication = Publication::for_entry(&ctx.source, entry_id);
                publication
                    .touch(Change::item(Collection::Favorites, entry_id))
                    .touch(Change::item(Collection::Entries, entry_id));
                ctx.bus.publish(&publication);
            }
            AdapterEvent::FavoriteSaved {
                entry_id,
                favorite,
                ticket,
                affected,
            }
        }
        Err(e) => AdapterEvent::FavoriteFailed {
            entry_id,
            favorite,
            ticket,
            error: e.to_string(),
        },
    }
}

/// Apply the canonical read or unread values to one entry.
pub(super) async fn persist_read(
    ctx: TaskContext,
    entry_id: i64,
    read: bool,
    ticket: EditTicket,
) -> AdapterEvent {
    let values = if read {
        EntryValues::read_values()
    } else {
        EntryValues::unread_values()
    };

    match ctx
        .db
        .update(&ctx.source, Selection::Entry(entry_id), &values)
        .await
    {
        Ok(affected) => {
            if affected > 0 {
                let mut publication = Publication::for_entry(&ctx.source, entry_id);
                touch_owning_feed(&ctx.db, entry_id, &mut publication).await;
                publication
                    .touch(Change::item(Collection::Favorites, entry_id))
                    .touch(Change::item(Collection::Entries, entry_id));
                ctx.bus.publish(&publication);
            }
            AdapterEvent::ReadSaved {
                entry_id,
                read,
                ticket,
                affected,
            }
        }
        Err(e) => AdapterEvent::ReadFailed {
            entry_id,
            read,
            ticket,
            error: e.to_string(),
        },
    }
}

/// Mark every unread entry of the source as read.
pub(super) async fn persist_all_read(ctx: TaskContext) -> AdapterEvent {
    match ctx
        .db
        .update(&ctx.source, Selection::Unread, &EntryValues::read_values())
        .await
    {
        Ok(affected) => {
            if affected > 0 {
                let mut publication = Publication::for_source(&ctx.source);
                publication
                    .touch(Change::collection(Collection::Feeds))
                    .touch(Change::collection(Collection::Groups))
                    .touch(Change::collection(Collection::Favorites));
                ctx.bus.publish(&publication);
            }
            AdapterEvent::AllReadSaved { affected }
        }
        Err(e) => AdapterEvent::AllReadFailed {
            error: e.to_string(),
        },
    }
}

/// Add the feed listing and the owning group, if the entry's feed resolves.
///
/// Lookup misses and lookup errors only skip these changes.
async fn touch_owning_feed(db: &Database, entry_id: i64, publication: &mut Publication) {
    let feed_id = match db.feed_id_for_entry(entry_id).await {
        Ok(Some(feed_id)) => feed_id,
        Ok(None) => {
            tracing::debug!(entry_id, "No owning feed, skipping feed notifications");
            return;
        }
        Err(e) => {
            tracing::debug!(entry_id, error = %e, "Feed lookup failed, skipping feed notifications");
            return;
        }
    };

    publication.touch(Change::collection(Collection::Feeds));

    match db.group_for_feed(feed_id).await {
        Ok(Some(group_id)) => {
            publication.touch(Change::item(Collection::Groups, group_id));
        }
        Ok(None) => {}
        Err(e) => {
            tracing::debug!(feed_id, error = %e, "Group lookup failed, skipping group notification");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_catch_task_panic_ok() {
        let result = catch_task_panic(async { 42 }).await;
        assert_eq!(result, Ok(42));
    }

    #[tokio::test]
    async fn test_catch_task_panic_message() {
        let result: Result<(), String> = catch_task_panic(async { panic!("boom") }).await;
        assert_eq!(result, Err("boom".to_string()));
    }

    #[tokio::test]
    async fn test_catch_task_panic_formatted_message() {
        let id = 7;
        let result: Result<(), String> =
            catch_task_panic(async move { panic!("entry {} vanished", id) }).await;
        assert_eq!(result, Err("entry 7 vanished".to_string()));
    }
}
