//! Buffered view over the store for a single operation.
//!
//! An operation loads every record it may touch, reads and writes typed
//! records in memory, and then turns the working set into one [`Commit`].
//! Every loaded key becomes a precondition (absent keys included), so the
//! commit fails if anything the operation looked at changed underneath it.
//!
//! Writes are only allowed to loaded keys. Cloning a working set gives a
//! scratch copy that can be thrown away to undo a partially applied batch.

use super::traits::{Commit, RecordStore, StoreError, StoreResult, StoredRecord};
use crate::identity::Address;
use crate::serialization::{from_cbor, to_cbor};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};

#[derive(Debug, Clone, Default)]
pub struct WorkingSet {
    loaded: HashMap<Address, Option<StoredRecord>>,
    writes: BTreeMap<Address, Vec<u8>>,
}

impl WorkingSet {
    /// Load `keys` from the store into a fresh working set.
    pub async fn load<S: RecordStore + ?Sized>(store: &S, keys: &[Address]) -> StoreResult<Self> {
        let mut ws = Self::default();
        ws.fetch(store, keys).await?;
        Ok(ws)
    }

    /// Load any of `keys` not already present.
    pub async fn fetch<S: RecordStore + ?Sized>(
        &mut self,
        store: &S,
        keys: &[Address],
    ) -> StoreResult<()> {
        let missing: Vec<Address> = keys
            .iter()
            .filter(|k| !self.loaded.contains_key(k))
            .copied()
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();

        if missing.is_empty() {
            return Ok(());
        }

        let records = store.read(&missing).await?;
        for (key, record) in missing.into_iter().zip(records) {
            self.loaded.insert(key, record);
        }
        Ok(())
    }

    /// Whether `key` was loaded (present or absent).
    pub fn is_loaded(&self, key: &Address) -> bool {
        self.loaded.contains_key(key)
    }

    /// Read a typed record, seeing this working set's own writes first.
    pub fn get<T: DeserializeOwned>(&self, key: &Address) -> StoreResult<Option<T>> {
        if let Some(bytes) = self.writes.get(key) {
            return Ok(Some(from_cbor(bytes)?));
        }
        match self.loaded.get(key) {
            None => Err(StoreError::NotLoaded(*key)),
            Some(None) => Ok(None),
            Some(Some(record)) => Ok(Some(from_cbor(&record.data)?)),
        }
    }

    /// Buffer a typed write.
    pub fn put<T: Serialize>(&mut self, key: Address, value: &T) -> StoreResult<()> {
        if !self.loaded.contains_key(&key) {
            return Err(StoreError::NotLoaded(key));
        }
        self.writes.insert(key, to_cbor(value)?);
        Ok(())
    }

    /// True when at least one write is buffered.
    pub fn is_dirty(&self) -> bool {
        !self.writes.is_empty()
    }

    /// Keys with buffered writes, in address order.
    pub fn written_keys(&self) -> impl Iterator<Item = &Address> {
        self.writes.keys()
    }

    /// Turn the working set into a single atomic commit.
    pub fn into_commit(self) -> Commit {
        let mut preconditions: Vec<(Address, Option<u64>)> = self
            .loaded
            .iter()
            .map(|(key, record)| (*key, record.as_ref().map(|r| r.version)))
            .collect();
        preconditions.sort_by_key(|(key, _)| *key);

        Commit {
            preconditions,
            writes: self.writes.into_iter().collect(),
        }
    }
}
