//! In-memory attempt store.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::SystemTime;

use crate::error::StateResult;
use crate::store::AttemptStore;

/// Attempt store that lives only as long as the process.
///
/// Cloning shares the underlying map.
#[derive(Debug, Clone, Default)]
pub struct MemoryAttemptStore {
    attempts: Arc<Mutex<HashMap<String, SystemTime>>>,
}

impl MemoryAttemptStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a store from known attempts.
    pub fn from_entries(entries: impl IntoIterator<Item = (String, SystemTime)>) -> Self {
        Self {
            attempts: Arc::new(Mutex::new(entries.into_iter().collect())),
        }
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, SystemTime>> {
        self.attempts.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl AttemptStore for MemoryAttemptStore {
    fn get(&self, key: &str) -> StateResult<Option<SystemTime>> {
        Ok(self.lock().get(key).copied())
    }

    fn record(&self, key: &str, at: SystemTime) -> StateResult<()> {
        self.lock().insert(key.to_string(), at);
        Ok(())
    }

    fn remove(&self, key: &str) -> StateResult<bool> {
        Ok(self.lock().remove(key).is_some())
    }

    fn entries(&self) -> StateResult<Vec<(String, SystemTime)>> {
        Ok(self
            .lock()
            .iter()
            .map(|(key, at)| (key.clone(), *at))
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;
    use std::time::{Duration, UNIX_EPOCH};

    #[test]
    fn clones_share_entries() {
        let store = MemoryAttemptStore::new();
        let view = store.clone();
        store.record("default/pod-1", UNIX_EPOCH).unwrap();
        assert_eq!(view.get("default/pod-1").unwrap(), Some(UNIX_EPOCH));
    }

    #[test]
    fn default_prune_drops_only_stale_dead_pods() {
        let now = UNIX_EPOCH + Duration::from_secs(3600);
        let store = MemoryAttemptStore::from_entries([
            ("default/a".to_string(), UNIX_EPOCH),
            ("default/b".to_string(), UNIX_EPOCH),
            ("default/c".to_string(), now),
        ]);
        let live = HashSet::from(["default/a".to_string()]);

        let removed = store.prune(&live, now, Duration::from_secs(60)).unwrap();

        assert_eq!(removed, 1);
        assert!(store.get("default/a").unwrap().is_some());
        assert!(store.get("default/b").unwrap().is_none());
        assert!(store.get("default/c").unwrap().is_some());
    }
}
