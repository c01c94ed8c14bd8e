use anyhow::Context as _;
use tracing::warn;
use uuid::Uuid;

use crate::cache::{ENTRIES_TAG, entries_page_key, invalidate_entries};
use crate::database::Database;
use crate::model::entry::Entry;

fn entries_key(db: &Database) -> String {
    db.key("guestbook:entries")
}

/// Prepend an entry to the list (newest first) and invalidate cached pages.
pub async fn append_entry(db: &Database, entry: &Entry) -> anyhow::Result<()> {
    let row = serde_json::to_string(entry).context("failed to serialize guestbook entry")?;

    db.store()
        .lpush(&entries_key(db), row)
        .await
        .context("failed to append guestbook entry")?;

    invalidate_after_mutation(db).await;

    Ok(())
}

/// Inclusive `[start, end]` slice from the head of the list, bypassing the cache.
pub async fn load_entry_range(db: &Database, start: u64, end: u64) -> anyhow::Result<Vec<Entry>> {
    let rows = db
        .store()
        .lrange(&entries_key(db), start, end)
        .await
        .context("failed to read guestbook entries")?;

    Ok(rows.iter().filter_map(|row| decode_row(row)).collect())
}

/// Cached read of an inclusive `[start, end]` window.
pub async fn list_entries(db: &Database, start: u64, end: u64) -> anyhow::Result<Vec<Entry>> {
    let cache = db.cache();

    let version = match cache.tag_version(ENTRIES_TAG).await {
        Ok(version) => version,
        Err(e) => {
            warn!(?e, "cache tag read failed; reading entries from store");
            return load_entry_range(db, start, end).await;
        }
    };

    let cache_key = entries_page_key(cache, version, start, end);
    cache
        .get_or_load_json(&cache_key, cache.page_ttl(), || {
            load_entry_range(db, start, end)
        })
        .await
}

/// Remove the entry with `id`. Returns `true` if a row was removed.
///
/// The matching row is removed by its stored bytes, so a removal can never be
/// defeated by a serialization difference.
pub async fn remove_entry(db: &Database, id: Uuid) -> anyhow::Result<bool> {
    let key = entries_key(db);
    let rows = db
        .store()
        .lrange(&key, 0, u64::MAX)
        .await
        .context("failed to read guestbook entries")?;

    let Some(row) = rows
        .into_iter()
        .find(|row| decode_row(row).is_some_and(|entry| entry.id == id))
    else {
        return Ok(false);
    };

    let removed = db
        .store()
        .lrem_first(&key, &row)
        .await
        .context("failed to remove guestbook entry")?;

    if removed {
        invalidate_after_mutation(db).await;
    }

    Ok(removed)
}

/// Remove every entry.
pub async fn clear_entries(db: &Database) -> anyhow::Result<()> {
    db.store()
        .del(&entries_key(db))
        .await
        .context("failed to clear guestbook entries")?;

    invalidate_after_mutation(db).await;

    Ok(())
}

/// Number of entries currently stored.
pub async fn count_entries(db: &Database) -> anyhow::Result<u64> {
    db.store()
        .llen(&entries_key(db))
        .await
        .context("failed to count guestbook entries")
}

// The mutation is already committed; a failed bump leaves pages stale until
// their TTL runs out, which is preferable to reporting the write as failed.
async fn invalidate_after_mutation(db: &Database) {
    if let Err(e) = invalidate_entries(db.cache()).await {
        warn!(?e, "failed to invalidate cached guestbook pages");
    }
}

fn decode_row(row: &str) -> Option<Entry> {
    match serde_json::from_str::<Entry>(row) {
        Ok(entry) => Some(entry),
        Err(e) => {
            warn!(?e, "skipping undecodable guestbook row");
            None
        }
    }
}
