//! sigorg - Organization governance core
//!
//! An organization keeps its membership roster as non-transferable tokens,
//! and every change to it goes through a propose-then-execute gate.
//!
//! Key principles:
//! - Membership = exactly one token of the organization's mint, held frozen
//! - Mint and freeze authority belong to a controller, never a human key
//! - Privileged instructions run only inside an approved proposal
//! - A proposal's batch applies all-or-nothing, in a single commit
//!
//! Start with [`Governance`], which wraps a [`RecordStore`] and exposes the
//! operations and queries.

pub mod clock;
pub mod error;
pub mod governance;
pub mod identity;
pub mod membership;
pub mod organization;
pub mod proposals;
pub mod serialization;
pub mod store;
pub mod token;

pub use clock::{Clock, ManualClock, SystemClock};
pub use error::{GovernanceError, GovernanceResult};
pub use governance::{Governance, MAX_COMMIT_ATTEMPTS};
pub use identity::{Address, Principal};
pub use membership::{ControllerRecord, Membership};
pub use organization::{Organization, OrganizationSettings, RegrantBehavior};
pub use proposals::{
    ApprovalPolicy, Instruction, PolicyConfig, Proposal, ProposalEventKind, ProposalStatus,
};
pub use store::{MemoryStore, RecordStore};
