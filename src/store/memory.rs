//! In-process record store.
//!
//! Backs the CLI simulator and the test suites. Cloning shares the
//! underlying map, so several `Governance` handles can race on one store.

use super::traits::*;
use crate::identity::Address;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard};

/// Mutex-guarded in-memory store.
#[derive(Clone, Default)]
pub struct MemoryStore {
    state: Arc<Mutex<MemoryState>>,
}

#[derive(Default)]
struct MemoryState {
    records: HashMap<Address, StoredRecord>,
    commits: u64,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of successfully applied commits that wrote something.
    pub fn commit_count(&self) -> StoreResult<u64> {
        Ok(self.lock()?.commits)
    }

    /// Number of stored records.
    pub fn len(&self) -> StoreResult<usize> {
        Ok(self.lock()?.records.len())
    }

    /// True when nothing has been written.
    pub fn is_empty(&self) -> StoreResult<bool> {
        Ok(self.len()? == 0)
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, MemoryState>> {
        self.state
            .lock()
            .map_err(|_| StoreError::Unavailable("memory store lock poisoned".to_string()))
    }
}

#[async_trait]
impl RecordStore for MemoryStore {
    async fn read(&self, keys: &[Address]) -> StoreResult<Vec<Option<StoredRecord>>> {
        let state = self.lock()?;
        Ok(keys.iter().map(|k| state.records.get(k).cloned()).collect())
    }

    async fn commit(&self, commit: Commit) -> StoreResult<()> {
        let mut state = self.lock()?;

        for (key, expected) in &commit.preconditions {
            let current = state.records.get(key).map(|r| r.version);
            if current != *expected {
                return Err(StoreError::Conflict(*key));
            }
        }

        if commit.is_read_only() {
            return Ok(());
        }

        for (key, data) in commit.writes {
            let version = state.records.get(&key).map_or(1, |r| r.version + 1);
            state.records.insert(key, StoredRecord { version, data });
        }
        state.commits += 1;

        Ok(())
    }
}
