//! Account-storage collaborator.
//!
//! - `traits`: the `RecordStore` abstraction and commit model
//! - `memory`: in-process store for the simulator and tests
//! - `working_set`: per-operation buffered view producing one commit

pub mod memory;
pub mod traits;
pub mod working_set;

pub use memory::MemoryStore;
pub use traits::{Commit, RecordStore, StoreError, StoreResult, StoredRecord};
pub use working_set::WorkingSet;
