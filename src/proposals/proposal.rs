//! Proposal record and its state machine.
//!
//! ```text
//! Draft ──attach──▶ PendingApproval ──execute──▶ Executed | Rejected
//!                          │
//!                          └──expiry──▶ Expired
//! ```
//!
//! Draft is never persisted. Executed, Rejected and Expired are terminal.
//! Every transition appends to `history`, which is never rewritten.

use super::instruction::Instruction;
use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::{Address, Principal};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalStatus {
    Draft,
    PendingApproval,
    Executed,
    /// Instruction `instruction` failed with `reason`; nothing was applied.
    Rejected { instruction: usize, reason: String },
    Expired,
}

impl ProposalStatus {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Executed | Self::Rejected { .. } | Self::Expired)
    }
}

impl fmt::Display for ProposalStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::PendingApproval => write!(f, "pending approval"),
            Self::Executed => write!(f, "executed"),
            Self::Rejected {
                instruction,
                reason,
            } => write!(f, "rejected at instruction {}: {}", instruction, reason),
            Self::Expired => write!(f, "expired"),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProposalEventKind {
    Created,
    Approved,
    Executed,
    Rejected { instruction: usize, reason: String },
    Expired,
}

/// One entry of a proposal's history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProposalEvent {
    pub at: u64,
    pub actor: Option<Principal>,
    pub kind: ProposalEventKind,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    pub address: Address,
    pub organization: Address,

    /// Position in the organization's proposal sequence.
    pub index: u64,

    /// Captured at creation; never modified afterwards.
    pub instructions: Vec<Instruction>,

    pub creator: Principal,
    pub status: ProposalStatus,
    pub approvals: BTreeSet<Principal>,
    pub created_at: u64,
    pub expires_at: Option<u64>,

    #[serde(default)]
    pub resolved_at: Option<u64>,

    #[serde(default)]
    pub history: Vec<ProposalEvent>,
}

pub fn proposal_address(organization: &Address, index: u64) -> Address {
    Address::derive("proposal", &[organization.as_bytes(), &index.to_le_bytes()])
}

impl Proposal {
    pub(crate) fn draft(
        organization: Address,
        index: u64,
        creator: Principal,
        created_at: u64,
        expires_at: Option<u64>,
    ) -> Self {
        Self {
            address: proposal_address(&organization, index),
            organization,
            index,
            instructions: Vec::new(),
            creator,
            status: ProposalStatus::Draft,
            approvals: BTreeSet::new(),
            created_at,
            expires_at,
            resolved_at: None,
            history: Vec::new(),
        }
    }

    /// Attach the batch and leave Draft.
    pub(crate) fn attach(&mut self, instructions: Vec<Instruction>) -> GovernanceResult<()> {
        if instructions.is_empty() {
            return Err(GovernanceError::EmptyProposal);
        }
        self.instructions = instructions;
        self.status = ProposalStatus::PendingApproval;
        self.record(self.created_at, Some(self.creator), ProposalEventKind::Created);
        Ok(())
    }

    pub fn is_pending(&self) -> bool {
        self.status == ProposalStatus::PendingApproval
    }

    pub fn is_past_expiry(&self, now: u64) -> bool {
        self.expires_at.is_some_and(|expiry| now > expiry)
    }

    pub fn approval_count(&self) -> usize {
        self.approvals.len()
    }

    pub(crate) fn record_approval(&mut self, approver: Principal, now: u64) {
        self.approvals.insert(approver);
        self.record(now, Some(approver), ProposalEventKind::Approved);
    }

    pub(crate) fn mark_executed(&mut self, now: u64) {
        self.resolve(ProposalStatus::Executed, now);
        self.record(now, None, ProposalEventKind::Executed);
    }

    pub(crate) fn mark_rejected(&mut self, instruction: usize, reason: String, now: u64) {
        self.resolve(
            ProposalStatus::Rejected {
                instruction,
                reason: reason.clone(),
            },
            now,
        );
        self.record(
            now,
            None,
            ProposalEventKind::Rejected {
                instruction,
                reason,
            },
        );
    }

    pub(crate) fn mark_expired(&mut self, now: u64) {
        self.resolve(ProposalStatus::Expired, now);
        self.record(now, None, ProposalEventKind::Expired);
    }

    fn resolve(&mut self, status: ProposalStatus, now: u64) {
        self.status = status;
        self.resolved_at = Some(now);
    }

    fn record(&mut self, at: u64, actor: Option<Principal>, kind: ProposalEventKind) {
        self.history.push(ProposalEvent { at, actor, kind });
    }
}

/// Render a proposal and its history for operators.
pub fn format_proposal(proposal: &Proposal) -> String {
    format_proposal_with(proposal, Address::short)
}

/// [`format_proposal`], naming principals with `name`.
pub fn format_proposal_with(proposal: &Proposal, name: impl Fn(&Address) -> String) -> String {
    let mut output = format!(
        "Proposal #{} ({} instruction(s), {} approval(s))\n",
        proposal.index,
        proposal.instructions.len(),
        proposal.approval_count()
    );
    output.push_str(&format!("  status: {}\n", proposal.status));
    for (i, instruction) in proposal.instructions.iter().enumerate() {
        output.push_str(&format!("  [{}] {}\n", i, instruction.describe(&name)));
    }
    for event in &proposal.history {
        let actor = event
            .actor
            .map(|a| format!(" by {}", name(&a)))
            .unwrap_or_default();
        output.push_str(&format!("  t={} {:?}{}\n", event.at, event.kind, actor));
    }
    output
}
