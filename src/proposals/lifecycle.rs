//! Proposal lifecycle: creation, approval, expiry.
//!
//! These functions validate and mutate records inside a working set; the
//! `Governance` service loads the records and commits the result.

use super::instruction::Instruction;
use super::policy::ApprovalPolicy;
use super::proposal::{proposal_address, Proposal};
use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::Principal;
use crate::organization::Organization;
use crate::store::{StoreError, WorkingSet};
use std::time::Duration;
use tracing::{debug, info};

/// How a lifecycle step ended when it did not fail validation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Transition {
    /// The requested transition was applied.
    Applied,
    /// The proposal's expiry had passed; it was moved to Expired instead.
    Lapsed,
}

/// Load proposal `index` of `org`. Needs it loaded.
pub(crate) fn load(ws: &WorkingSet, org: &Organization, index: u64) -> GovernanceResult<Proposal> {
    ws.get::<Proposal>(&proposal_address(&org.address, index))?
        .ok_or(GovernanceError::ProposalNotFound {
            organization: org.address,
            index,
        })
}

/// Create a proposal with the organization's next index.
///
/// Needs the organization and `proposal_address(org, org.next_proposal_index)`
/// loaded.
pub(crate) fn create_proposal(
    ws: &mut WorkingSet,
    org: &mut Organization,
    creator: &Principal,
    instructions: Vec<Instruction>,
    ttl: Option<Duration>,
    now: u64,
) -> GovernanceResult<Proposal> {
    if instructions.is_empty() {
        return Err(GovernanceError::EmptyProposal);
    }
    if !org.policy.can_propose(creator) {
        return Err(GovernanceError::Unauthorized(*creator));
    }

    let index = org.next_proposal_index;
    let address = proposal_address(&org.address, index);
    if ws.get::<Proposal>(&address)?.is_some() {
        return Err(StoreError::Conflict(address).into());
    }

    let expires_at = ttl
        .or_else(|| org.settings.default_proposal_ttl())
        .map(|ttl| now.saturating_add(ttl.as_secs()));

    let mut proposal = Proposal::draft(org.address, index, *creator, now, expires_at);
    proposal.attach(instructions)?;

    org.next_proposal_index = index
        .checked_add(1)
        .ok_or(GovernanceError::ProposalIndexExhausted(org.address))?;

    ws.put(org.address, &*org)?;
    ws.put(address, &proposal)?;

    info!(
        organization = %org.address.short(),
        index,
        instructions = proposal.instructions.len(),
        expires_at = ?expires_at,
        "proposal created"
    );
    Ok(proposal)
}

/// Move a pending proposal past its expiry to Expired. Returns whether it
/// moved.
pub(crate) fn lapse(ws: &mut WorkingSet, proposal: &mut Proposal, now: u64) -> GovernanceResult<bool> {
    if !proposal.is_pending() || !proposal.is_past_expiry(now) {
        return Ok(false);
    }
    proposal.mark_expired(now);
    ws.put(proposal.address, &*proposal)?;

    info!(
        organization = %proposal.organization.short(),
        index = proposal.index,
        "proposal expired"
    );
    Ok(true)
}

/// Record `approver`'s approval.
pub(crate) fn approve_proposal(
    ws: &mut WorkingSet,
    org: &Organization,
    proposal: &mut Proposal,
    approver: &Principal,
    now: u64,
) -> GovernanceResult<Transition> {
    if !proposal.is_pending() {
        return Err(GovernanceError::NotPendingApproval(proposal.index));
    }
    if lapse(ws, proposal, now)? {
        return Ok(Transition::Lapsed);
    }
    if !org.policy.can_approve(approver) {
        return Err(GovernanceError::UnauthorizedApprover(*approver));
    }
    if proposal.approvals.contains(approver) {
        return Err(GovernanceError::DuplicateApproval {
            index: proposal.index,
            approver: *approver,
        });
    }

    proposal.record_approval(*approver, now);
    ws.put(proposal.address, &*proposal)?;

    debug!(
        organization = %org.address.short(),
        index = proposal.index,
        approver = %approver.short(),
        approvals = proposal.approval_count(),
        "approval recorded"
    );
    Ok(Transition::Applied)
}

/// Expire the proposal if `now` is past its expiry; otherwise do nothing.
pub(crate) fn expire_proposal(
    ws: &mut WorkingSet,
    proposal: &mut Proposal,
    now: u64,
) -> GovernanceResult<()> {
    lapse(ws, proposal, now)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Address;
    use crate::organization::{mint_address, organization_address, OrganizationSettings};
    use crate::proposals::policy::PolicyConfig;
    use crate::proposals::proposal::ProposalStatus;
    use crate::store::MemoryStore;

    fn p(name: &str) -> Principal {
        Address::from_name(name)
    }

    async fn setup(policy: PolicyConfig, settings: OrganizationSettings) -> (WorkingSet, Organization) {
        let store = MemoryStore::new();
        let founder = p("founder");
        let org_address = organization_address(&founder, "acme");
        let keys: Vec<Address> = std::iter::once(org_address)
            .chain(std::iter::once(mint_address(&org_address)))
            .chain((0..4).map(|i| proposal_address(&org_address, i)))
            .collect();
        let mut ws = WorkingSet::load(&store, &keys).await.unwrap();
        let org = crate::organization::create(&mut ws, &founder, "acme", policy, settings, 0).unwrap();
        (ws, org)
    }

    fn batch() -> Vec<Instruction> {
        vec![Instruction::grant(p("alice"))]
    }

    #[tokio::test]
    async fn test_indices_are_sequential() {
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;

        let first = create_proposal(&mut ws, &mut org, &p("founder"), batch(), None, 1).unwrap();
        let second = create_proposal(&mut ws, &mut org, &p("founder"), batch(), None, 2).unwrap();

        assert_eq!(first.index, 0);
        assert_eq!(second.index, 1);
        assert_eq!(org.next_proposal_index, 2);
        assert_eq!(second.status, ProposalStatus::PendingApproval);
    }

    #[tokio::test]
    async fn test_empty_batch_writes_nothing() {
        let (ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;
        let mut ws_after = ws.clone();
        let before: Vec<_> = ws.written_keys().copied().collect();

        let result = create_proposal(&mut ws_after, &mut org, &p("founder"), vec![], None, 1);
        assert!(matches!(result, Err(GovernanceError::EmptyProposal)));
        assert_eq!(ws_after.written_keys().copied().collect::<Vec<_>>(), before);
        assert_eq!(org.next_proposal_index, 0);
    }

    #[tokio::test]
    async fn test_exhausted_index_space() {
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;
        let last = proposal_address(&org.address, u64::MAX);
        ws.fetch(&MemoryStore::new(), &[last]).await.unwrap();
        org.next_proposal_index = u64::MAX;

        let result = create_proposal(&mut ws, &mut org, &p("founder"), batch(), None, 1);
        assert!(matches!(result, Err(GovernanceError::ProposalIndexExhausted(a)) if a == org.address));
        assert!(ws.get::<Proposal>(&last).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_outsider_cannot_propose() {
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;
        let result = create_proposal(&mut ws, &mut org, &p("mallory"), batch(), None, 1);
        assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));
    }

    #[tokio::test]
    async fn test_default_ttl_applies() {
        let settings = OrganizationSettings {
            default_proposal_ttl_secs: Some(3600),
            ..Default::default()
        };
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), settings).await;

        let implicit = create_proposal(&mut ws, &mut org, &p("founder"), batch(), None, 100).unwrap();
        assert_eq!(implicit.expires_at, Some(3700));

        let explicit = create_proposal(
            &mut ws,
            &mut org,
            &p("founder"),
            batch(),
            Some(Duration::from_secs(10)),
            100,
        )
        .unwrap();
        assert_eq!(explicit.expires_at, Some(110));
    }

    #[tokio::test]
    async fn test_approval_rules() {
        let policy = PolicyConfig::threshold([p("a"), p("b")], 2);
        let (mut ws, mut org) = setup(policy, Default::default()).await;
        let mut proposal = create_proposal(&mut ws, &mut org, &p("a"), batch(), None, 1).unwrap();

        let result = approve_proposal(&mut ws, &org, &mut proposal, &p("outsider"), 2);
        assert!(matches!(result, Err(GovernanceError::UnauthorizedApprover(_))));

        assert_eq!(
            approve_proposal(&mut ws, &org, &mut proposal, &p("a"), 2).unwrap(),
            Transition::Applied
        );
        let result = approve_proposal(&mut ws, &org, &mut proposal, &p("a"), 3);
        assert!(matches!(result, Err(GovernanceError::DuplicateApproval { .. })));
        assert_eq!(proposal.approval_count(), 1);
    }

    #[tokio::test]
    async fn test_approve_after_expiry_lapses() {
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;
        let mut proposal = create_proposal(
            &mut ws,
            &mut org,
            &p("founder"),
            batch(),
            Some(Duration::from_secs(5)),
            0,
        )
        .unwrap();

        let outcome = approve_proposal(&mut ws, &org, &mut proposal, &p("founder"), 6).unwrap();
        assert_eq!(outcome, Transition::Lapsed);
        assert_eq!(proposal.status, ProposalStatus::Expired);
        assert!(proposal.approvals.is_empty());

        let result = approve_proposal(&mut ws, &org, &mut proposal, &p("founder"), 7);
        assert!(matches!(result, Err(GovernanceError::NotPendingApproval(0))));
    }

    #[tokio::test]
    async fn test_expire_before_deadline_is_noop() {
        let (mut ws, mut org) = setup(PolicyConfig::single(p("founder")), Default::default()).await;
        let mut proposal = create_proposal(
            &mut ws,
            &mut org,
            &p("founder"),
            batch(),
            Some(Duration::from_secs(5)),
            0,
        )
        .unwrap();

        expire_proposal(&mut ws, &mut proposal, 5).unwrap();
        assert!(proposal.is_pending());
        expire_proposal(&mut ws, &mut proposal, 6).unwrap();
        assert_eq!(proposal.status, ProposalStatus::Expired);

        let stored = load(&ws, &org, 0).unwrap();
        assert_eq!(stored.status, ProposalStatus::Expired);
    }
}
