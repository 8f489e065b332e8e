//! Rolling backup log: a bounded sequence of full-collection snapshots.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{SystemTime, UNIX_EPOCH};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::pages::PageMap;
use crate::storage::{BACKUPS_KEY, Storage};

/// Retained snapshot count. The log evicts oldest-first past this bound.
pub const MAX_BACKUPS: usize = 20;

/// One snapshot of the page collection, stamped with epoch milliseconds.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct BackupEntry {
    pub timestamp: u64,
    pub data: PageMap,
}

/// Read the backup log, oldest entry first. A missing or unreadable log is
/// an empty sequence, never an error.
pub fn read_backups(storage: &dyn Storage) -> Result<Vec<BackupEntry>> {
    let Some(raw) = storage.get_item(BACKUPS_KEY)? else {
        return Ok(Vec::new());
    };
    match serde_json::from_str(&raw) {
        Ok(entries) => Ok(entries),
        Err(error) => {
            log::warn!("backup log is unreadable, starting over: {error}");
            Ok(Vec::new())
        }
    }
}

/// Append a snapshot of `data` at `timestamp`, evicting the oldest entry
/// when the log outgrows [`MAX_BACKUPS`], and write the log back.
pub fn append_backup(storage: &mut dyn Storage, data: &PageMap, timestamp: u64) -> Result<()> {
    let mut entries = read_backups(storage)?;
    entries.push(BackupEntry {
        timestamp,
        data: data.clone(),
    });
    if entries.len() > MAX_BACKUPS {
        entries.remove(0);
    }
    let raw = serde_json::to_string(&entries).context("failed to serialize backup log")?;
    storage.set_item(BACKUPS_KEY, &raw)
}

static LAST_TIMESTAMP: AtomicU64 = AtomicU64::new(0);

/// Current epoch milliseconds, bumped so stamps stay strictly increasing
/// within the process. Exact-match restore requires distinct stamps even
/// when mutations land inside the same millisecond.
pub fn now_millis() -> Result<u64> {
    let now = SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .context("system clock error")?;
    let now = u64::try_from(now.as_millis()).context("timestamp does not fit into u64")?;
    let previous = LAST_TIMESTAMP
        .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |last| {
            Some(now.max(last + 1))
        })
        .unwrap_or(0);
    Ok(now.max(previous + 1))
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::{MAX_BACKUPS, append_backup, read_backups};
    use crate::pages::{PageMap, WikiPage};
    use crate::storage::{BACKUPS_KEY, MemoryStorage, Storage};

    fn snapshot(marker: &str) -> PageMap {
        BTreeMap::from([(
            "Home".to_string(),
            WikiPage {
                title: "Home".to_string(),
                content: marker.to_string(),
            },
        )])
    }

    #[test]
    fn missing_log_reads_as_empty() {
        let storage = MemoryStorage::new();
        assert!(read_backups(&storage).expect("read").is_empty());
    }

    #[test]
    fn corrupt_log_reads_as_empty() {
        let mut storage = MemoryStorage::new();
        storage.set_item(BACKUPS_KEY, "not json at all").expect("seed");
        assert!(read_backups(&storage).expect("read").is_empty());
    }

    #[test]
    fn append_keeps_storage_order() {
        let mut storage = MemoryStorage::new();
        append_backup(&mut storage, &snapshot("first"), 1).expect("append");
        append_backup(&mut storage, &snapshot("second"), 2).expect("append");

        let entries = read_backups(&storage).expect("read");
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].timestamp, 1);
        assert_eq!(entries[1].timestamp, 2);
    }

    #[test]
    fn log_is_capped_with_fifo_eviction() {
        let mut storage = MemoryStorage::new();
        for timestamp in 1..=21u64 {
            append_backup(&mut storage, &snapshot(&format!("m{timestamp}")), timestamp)
                .expect("append");
        }

        let entries = read_backups(&storage).expect("read");
        assert_eq!(entries.len(), MAX_BACKUPS);
        assert_eq!(entries.first().expect("oldest").timestamp, 2);
        assert_eq!(entries.last().expect("newest").timestamp, 21);
        assert!(entries.iter().all(|entry| entry.timestamp != 1));
    }

    #[test]
    fn timestamps_are_strictly_increasing() {
        let first = super::now_millis().expect("first stamp");
        let second = super::now_millis().expect("second stamp");
        assert!(second > first);
    }

    #[test]
    fn append_recovers_after_corruption() {
        let mut storage = MemoryStorage::new();
        storage.set_item(BACKUPS_KEY, "[{\"broken\": true").expect("seed");
        append_backup(&mut storage, &snapshot("fresh"), 7).expect("append");

        let entries = read_backups(&storage).expect("read");
        assert_eq!(entries.len(), 1);
        assert_eq!(entries[0].timestamp, 7);
    }
}
