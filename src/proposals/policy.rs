//! Approval policies.
//!
//! A policy answers three questions: who may open a proposal, who may
//! approve one, and whether a given set of approvals is enough to execute.
//! Organizations store a [`PolicyConfig`]; each variant wraps a concrete
//! strategy implementing [`ApprovalPolicy`].
//!
//! Approvals are re-checked against the *current* policy when deciding
//! readiness, so approvals from principals removed by a policy update stop
//! counting.

use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::Principal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Pluggable approval rule.
pub trait ApprovalPolicy {
    /// May `principal` create proposals (and bootstrap the controller)?
    fn can_propose(&self, principal: &Principal) -> bool;

    /// May `principal` approve proposals?
    fn can_approve(&self, principal: &Principal) -> bool;

    /// Do these approvals satisfy the policy?
    fn is_satisfied(&self, approvals: &BTreeSet<Principal>) -> bool;
}

/// One signer decides everything. Their approval alone is sufficient.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SingleAuthority {
    pub authority: Principal,
}

impl ApprovalPolicy for SingleAuthority {
    fn can_propose(&self, principal: &Principal) -> bool {
        *principal == self.authority
    }

    fn can_approve(&self, principal: &Principal) -> bool {
        *principal == self.authority
    }

    fn is_satisfied(&self, approvals: &BTreeSet<Principal>) -> bool {
        approvals.contains(&self.authority)
    }
}

/// M-of-N over a fixed approver set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Threshold {
    pub members: BTreeSet<Principal>,
    pub threshold: u32,
}

impl ApprovalPolicy for Threshold {
    fn can_propose(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    fn can_approve(&self, principal: &Principal) -> bool {
        self.members.contains(principal)
    }

    fn is_satisfied(&self, approvals: &BTreeSet<Principal>) -> bool {
        let counted = approvals.intersection(&self.members).count();
        counted >= self.threshold as usize
    }
}

/// Approvals carry weight; execution needs `quorum` total weight.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Weighted {
    pub weights: BTreeMap<Principal, u64>,
    pub quorum: u64,
}

impl Weighted {
    fn weight_of(&self, principal: &Principal) -> u64 {
        self.weights.get(principal).copied().unwrap_or(0)
    }

    pub fn total_weight(&self) -> u64 {
        self.weights
            .values()
            .fold(0u64, |acc, w| acc.saturating_add(*w))
    }
}

impl ApprovalPolicy for Weighted {
    fn can_propose(&self, principal: &Principal) -> bool {
        self.weight_of(principal) > 0
    }

    fn can_approve(&self, principal: &Principal) -> bool {
        self.weight_of(principal) > 0
    }

    fn is_satisfied(&self, approvals: &BTreeSet<Principal>) -> bool {
        let weight = approvals
            .iter()
            .fold(0u64, |acc, p| acc.saturating_add(self.weight_of(p)));
        weight >= self.quorum
    }
}

/// Stored policy selection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PolicyConfig {
    SingleAuthority(SingleAuthority),
    Threshold(Threshold),
    Weighted(Weighted),
}

impl PolicyConfig {
    pub fn single(authority: Principal) -> Self {
        Self::SingleAuthority(SingleAuthority { authority })
    }

    pub fn threshold(members: impl IntoIterator<Item = Principal>, threshold: u32) -> Self {
        Self::Threshold(Threshold {
            members: members.into_iter().collect(),
            threshold,
        })
    }

    pub fn weighted(weights: impl IntoIterator<Item = (Principal, u64)>, quorum: u64) -> Self {
        Self::Weighted(Weighted {
            weights: weights.into_iter().collect(),
            quorum,
        })
    }

    /// Reject policies that could never be satisfied.
    pub fn validate(&self) -> GovernanceResult<()> {
        match self {
            Self::SingleAuthority(_) => Ok(()),
            Self::Threshold(t) => {
                if t.threshold == 0 {
                    return Err(GovernanceError::InvalidPolicy(
                        "threshold must be at least 1".to_string(),
                    ));
                }
                if t.threshold as usize > t.members.len() {
                    return Err(GovernanceError::InvalidPolicy(format!(
                        "threshold {} exceeds {} approvers",
                        t.threshold,
                        t.members.len()
                    )));
                }
                Ok(())
            }
            Self::Weighted(w) => {
                if w.quorum == 0 {
                    return Err(GovernanceError::InvalidPolicy(
                        "quorum must be at least 1".to_string(),
                    ));
                }
                if w.quorum > w.total_weight() {
                    return Err(GovernanceError::InvalidPolicy(format!(
                        "quorum {} exceeds total weight {}",
                        w.quorum,
                        w.total_weight()
                    )));
                }
                Ok(())
            }
        }
    }

    fn strategy(&self) -> &dyn ApprovalPolicy {
        match self {
            Self::SingleAuthority(p) => p,
            Self::Threshold(p) => p,
            Self::Weighted(p) => p,
        }
    }
}

impl ApprovalPolicy for PolicyConfig {
    fn can_propose(&self, principal: &Principal) -> bool {
        self.strategy().can_propose(principal)
    }

    fn can_approve(&self, principal: &Principal) -> bool {
        self.strategy().can_approve(principal)
    }

    fn is_satisfied(&self, approvals: &BTreeSet<Principal>) -> bool {
        self.strategy().is_satisfied(approvals)
    }
}
