//! AttemptStore: where the updater remembers in-place resize attempts.
//!
//! The store is written only from the reconciliation task (one commit at a
//! time), and read by the arbiters of the same task. Implementations are
//! nevertheless `Send + Sync` so a store can be shared with a pruning task.

use std::collections::HashSet;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, SystemTime, UNIX_EPOCH};

use redb::{Database, ReadableDatabase, ReadableTable};
use tracing::debug;

use crate::error::{StateError, StateResult};
use crate::tables::INPLACE_ATTEMPTS;

/// Convert any `Display` error into a `StateError` variant via a closure factory.
macro_rules! map_err {
    ($variant:ident) => {
        |e| StateError::$variant(e.to_string())
    };
}

/// Per-pod record of the last in-place resize attempt.
pub trait AttemptStore: Send + Sync {
    /// Time of the last attempt for `key`, if one was recorded.
    fn get(&self, key: &str) -> StateResult<Option<SystemTime>>;

    /// Record an attempt for `key`, replacing any earlier one.
    fn record(&self, key: &str, at: SystemTime) -> StateResult<()>;

    /// Forget `key`. Returns true if it was present.
    fn remove(&self, key: &str) -> StateResult<bool>;

    /// All recorded attempts.
    fn entries(&self) -> StateResult<Vec<(String, SystemTime)>>;

    /// Drop attempts for pods not in `live` whose last attempt is older
    /// than `retention`. Returns the number of entries removed.
    fn prune(
        &self,
        live: &HashSet<String>,
        now: SystemTime,
        retention: Duration,
    ) -> StateResult<usize> {
        let mut removed = 0;
        for (key, at) in self.entries()? {
            if live.contains(&key) {
                continue;
            }
            let age = now.duration_since(at).unwrap_or_default();
            if age > retention && self.remove(&key)? {
                removed += 1;
            }
        }
        Ok(removed)
    }
}

/// Attempt store backed by a redb table.
#[derive(Clone)]
pub struct RedbAttemptStore {
    db: Arc<Database>,
}

impl RedbAttemptStore {
    /// Open (or create) a persistent store at the given path.
    pub fn open(path: &Path) -> StateResult<Self> {
        let db = Database::create(path).map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!(?path, "attempt store opened");
        Ok(store)
    }

    /// Create an ephemeral in-memory store (for testing).
    pub fn open_in_memory() -> StateResult<Self> {
        let backend = redb::backends::InMemoryBackend::new();
        let db = Database::builder()
            .create_with_backend(backend)
            .map_err(map_err!(Open))?;
        let store = Self { db: Arc::new(db) };
        store.ensure_tables()?;
        debug!("in-memory attempt store opened");
        Ok(store)
    }

    fn ensure_tables(&self) -> StateResult<()> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        // Opening a table in a write transaction creates it if absent.
        txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(())
    }
}

impl AttemptStore for RedbAttemptStore {
    fn get(&self, key: &str) -> StateResult<Option<SystemTime>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
        let millis = table.get(key).map_err(map_err!(Read))?.map(|g| g.value());
        Ok(millis.map(from_millis))
    }

    fn record(&self, key: &str, at: SystemTime) -> StateResult<()> {
        let millis = to_millis(key, at)?;
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        {
            let mut table = txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
            table.insert(key, millis).map_err(map_err!(Write))?;
        }
        txn.commit().map_err(map_err!(Transaction))?;
        debug!(%key, millis, "in-place attempt stored");
        Ok(())
    }

    fn remove(&self, key: &str) -> StateResult<bool> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let existed;
        {
            let mut table = txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
            existed = table.remove(key).map_err(map_err!(Write))?.is_some();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        Ok(existed)
    }

    fn entries(&self) -> StateResult<Vec<(String, SystemTime)>> {
        let txn = self.db.begin_read().map_err(map_err!(Transaction))?;
        let table = txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
        let mut results = Vec::new();
        for entry in table.iter().map_err(map_err!(Read))? {
            let (key, value) = entry.map_err(map_err!(Read))?;
            results.push((key.value().to_string(), from_millis(value.value())));
        }
        Ok(results)
    }

    /// Prune inside a single write transaction.
    fn prune(
        &self,
        live: &HashSet<String>,
        now: SystemTime,
        retention: Duration,
    ) -> StateResult<usize> {
        let txn = self.db.begin_write().map_err(map_err!(Transaction))?;
        let removed;
        {
            let mut table = txn.open_table(INPLACE_ATTEMPTS).map_err(map_err!(Table))?;
            let mut stale = Vec::new();
            for entry in table.iter().map_err(map_err!(Read))? {
                let (key, value) = entry.map_err(map_err!(Read))?;
                let key = key.value().to_string();
                let age = now
                    .duration_since(from_millis(value.value()))
                    .unwrap_or_default();
                if !live.contains(&key) && age > retention {
                    stale.push(key);
                }
            }
            for key in &stale {
                table.remove(key.as_str()).map_err(map_err!(Write))?;
            }
            removed = stale.len();
        }
        txn.commit().map_err(map_err!(Transaction))?;
        if removed > 0 {
            debug!(removed, "pruned stale in-place attempts");
        }
        Ok(removed)
    }
}

fn to_millis(key: &str, at: SystemTime) -> StateResult<u64> {
    let since_epoch = at
        .duration_since(UNIX_EPOCH)
        .map_err(|_| StateError::Timestamp(key.to_string()))?;
    u64::try_from(since_epoch.as_millis()).map_err(|_| StateError::Timestamp(key.to_string()))
}

fn from_millis(millis: u64) -> SystemTime {
    UNIX_EPOCH + Duration::from_millis(millis)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(millis: u64) -> SystemTime {
        UNIX_EPOCH + Duration::from_millis(millis)
    }

    #[test]
    fn record_and_get() {
        let store = RedbAttemptStore::open_in_memory().unwrap();
        assert!(store.get("default/pod-1").unwrap().is_none());

        store.record("default/pod-1", at(3_600_000)).unwrap();
        assert_eq!(store.get("default/pod-1").unwrap(), Some(at(3_600_000)));

        store.record("default/pod-1", at(3_700_000)).unwrap();
        assert_eq!(store.get("default/pod-1").unwrap(), Some(at(3_700_000)));
    }

    #[test]
    fn remove_reports_presence() {
        let store = RedbAttemptStore::open_in_memory().unwrap();
        store.record("default/pod-1", at(1)).unwrap();
        assert!(store.remove("default/pod-1").unwrap());
        assert!(!store.remove("default/pod-1").unwrap());
        assert!(store.entries().unwrap().is_empty());
    }

    #[test]
    fn rejects_times_before_epoch() {
        let store = RedbAttemptStore::open_in_memory().unwrap();
        let before = UNIX_EPOCH - Duration::from_secs(1);
        assert!(matches!(
            store.record("default/pod-1", before),
            Err(StateError::Timestamp(_))
        ));
    }

    #[test]
    fn prune_keeps_live_and_recent_entries() {
        let store = RedbAttemptStore::open_in_memory().unwrap();
        store.record("default/live", at(0)).unwrap();
        store.record("default/gone-old", at(0)).unwrap();
        store.record("default/gone-recent", at(590_000)).unwrap();

        let live = HashSet::from(["default/live".to_string()]);
        let removed = store
            .prune(&live, at(600_000), Duration::from_secs(60))
            .unwrap();

        assert_eq!(removed, 1);
        let mut keys: Vec<_> = store.entries().unwrap().into_iter().map(|(k, _)| k).collect();
        keys.sort();
        assert_eq!(keys, vec!["default/gone-recent", "default/live"]);
    }

    #[test]
    fn survives_reopen_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("attempts.redb");
        {
            let store = RedbAttemptStore::open(&path).unwrap();
            store.record("shop/web-0", at(42_000)).unwrap();
        }
        let store = RedbAttemptStore::open(&path).unwrap();
        assert_eq!(store.get("shop/web-0").unwrap(), Some(at(42_000)));
    }
}
