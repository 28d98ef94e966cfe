//! Error types for governance operations.
//!
//! Validation failures are returned before anything is written. Failures
//! raised while a proposal's batch is replayed never reach the caller as an
//! `Err`; they are recorded on the proposal, which moves to `Rejected`.

use crate::identity::Address;
use crate::serialization::SerializationError;
use crate::store::StoreError;
use crate::token::TokenError;
use thiserror::Error;

/// Errors surfaced by the governance core.
#[derive(Debug, Error)]
pub enum GovernanceError {
    /// The organization already has a freeze controller.
    #[error("Organization {0} already has a freeze controller")]
    AlreadyInitialized(Address),

    /// Membership operation before the freeze controller exists.
    #[error("Organization {0} has no freeze controller yet")]
    NotInitialized(Address),

    /// A proposal must carry at least one instruction.
    #[error("Proposal has no instructions")]
    EmptyProposal,

    /// Caller lacks rights for the operation under the organization's policy.
    #[error("{0} is not authorized for this operation")]
    Unauthorized(Address),

    /// Approver is not eligible under the organization's policy.
    #[error("{0} is not an eligible approver")]
    UnauthorizedApprover(Address),

    #[error("{approver} already approved proposal {index}")]
    DuplicateApproval { index: u64, approver: Address },

    #[error("Proposal {0} is not pending approval")]
    NotPendingApproval(u64),

    /// The approval policy is not satisfied yet.
    #[error("Proposal {0} does not have enough approvals to execute")]
    NotReadyToExecute(u64),

    /// The proposal is already Executed, Rejected or Expired.
    #[error("Proposal {0} is already resolved")]
    AlreadyResolved(u64),

    /// The proposal's expiry passed; it has been marked Expired.
    #[error("Proposal {0} has expired")]
    ProposalExpired(u64),

    /// Mint/freeze/thaw attempted without the organization's controller.
    #[error("Operation is not authorized by the freeze controller of {0}")]
    UnauthorizedController(Address),

    #[error("{0} is not a member")]
    NotAMember(Address),

    /// Re-grant refused because the organization is configured to reject it.
    #[error("{0} is already a member")]
    AlreadyAMember(Address),

    #[error("Organization {0} already exists")]
    OrganizationExists(Address),

    #[error("Organization {0} not found")]
    OrganizationNotFound(Address),

    #[error("Proposal {index} not found in organization {organization}")]
    ProposalNotFound { organization: Address, index: u64 },

    /// The organization has used up its proposal index space.
    #[error("Organization {0} has no proposal indices left")]
    ProposalIndexExhausted(Address),

    #[error("Invalid approval policy: {0}")]
    InvalidPolicy(String),

    /// Commit kept conflicting with concurrent writers.
    #[error("Too much contention committing {0}")]
    Contention(&'static str),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

impl GovernanceError {
    /// Storage or codec failures, as opposed to a rule being violated.
    ///
    /// The executor propagates these instead of recording them as a
    /// rejection.
    pub fn is_infrastructure(&self) -> bool {
        matches!(
            self,
            Self::Store(_) | Self::Serialization(_) | Self::Token(TokenError::Store(_))
        )
    }
}

/// Result type for governance operations.
pub type GovernanceResult<T> = Result<T, GovernanceError>;
