//! Membership as non-transferable tokens.
//!
//! - `controller`: freeze controller bootstrap and the authority capability
//! - `roster`: grant/revoke primitives and membership queries
//!
//! Grant and revoke are crate-private; the only way to reach them is a
//! proposal executed by the engine in `proposals`.

pub mod controller;
pub mod roster;

pub use controller::{ControllerRecord, FreezeController};
pub use roster::{holds_membership, Membership};
