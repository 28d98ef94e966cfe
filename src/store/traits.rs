//! Trait abstraction for the record store.
//!
//! The host ledger persists fixed-shape records keyed by derived
//! [`Address`]es. Every record carries a version that is bumped on each
//! write; a [`Commit`] applies all of its writes only if every precondition
//! still holds, which gives optimistic, state-versioned validation across
//! concurrently submitted operations.

use crate::identity::Address;
use crate::serialization::SerializationError;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// A stored record: opaque CBOR bytes plus the version they were written at.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    pub version: u64,
    pub data: Vec<u8>,
}

/// One atomic write set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Commit {
    /// Expected version per key; `None` means the key must be absent.
    pub preconditions: Vec<(Address, Option<u64>)>,

    /// New record contents.
    pub writes: Vec<(Address, Vec<u8>)>,
}

impl Commit {
    /// True when the commit would not change anything.
    pub fn is_read_only(&self) -> bool {
        self.writes.is_empty()
    }
}

/// Result type for store operations.
pub type StoreResult<T> = Result<T, StoreError>;

/// Store operation errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// A precondition no longer holds; another commit got there first.
    #[error("Version conflict on record {0}")]
    Conflict(Address),

    /// A record was accessed without being loaded into the working set.
    #[error("Record {0} was not loaded")]
    NotLoaded(Address),

    /// The backing store could not serve the request.
    #[error("Store unavailable: {0}")]
    Unavailable(String),

    /// A record failed to encode or decode.
    #[error(transparent)]
    Codec(#[from] SerializationError),
}

/// Trait abstraction for the account-storage collaborator.
///
/// Implementations must apply a [`Commit`] atomically: either every
/// precondition holds and every write becomes visible, or nothing changes.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Read records; the result is positionally aligned with `keys`.
    async fn read(&self, keys: &[Address]) -> StoreResult<Vec<Option<StoredRecord>>>;

    /// Apply a commit atomically.
    async fn commit(&self, commit: Commit) -> StoreResult<()>;
}
