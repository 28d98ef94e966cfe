//! Proposal engine.
//!
//! Privileged actions are expressed as an ordered batch of [`Instruction`]s
//! wrapped in a [`Proposal`]. A proposal is created, collects approvals under
//! the organization's [`PolicyConfig`], and is executed atomically once the
//! policy is satisfied.
//!
//! - `instruction`: the instruction set and the records each one touches
//! - `policy`: approval policies (single authority, threshold, weighted)
//! - `proposal`: the proposal record and its state machine
//! - `lifecycle`: creation, approval and expiry
//! - `executor`: all-or-nothing batch replay

pub mod executor;
pub mod instruction;
pub mod lifecycle;
pub mod policy;
pub mod proposal;

pub use executor::batch_accounts;
pub use instruction::Instruction;
pub use policy::{ApprovalPolicy, PolicyConfig, SingleAuthority, Threshold, Weighted};
pub use proposal::{
    format_proposal, format_proposal_with, proposal_address, Proposal, ProposalEvent,
    ProposalEventKind, ProposalStatus,
};
