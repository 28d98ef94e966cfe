//! Proposal execution.
//!
//! A batch replays in order against a scratch copy of the working set. If
//! every instruction succeeds the copy replaces the original; if one fails
//! the copy is dropped and only the proposal's Rejected status is written.
//! Either way the proposal ends terminal.

use super::instruction::Instruction;
use super::lifecycle::{lapse, Transition};
use super::policy::ApprovalPolicy;
use super::proposal::{Proposal, ProposalStatus};
use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::Address;
use crate::membership::controller::FreezeController;
use crate::membership::roster::{grant_membership, revoke_membership};
use crate::organization::{self, Organization};
use crate::store::WorkingSet;
use std::collections::BTreeSet;
use tracing::{info, warn};

/// Every record a batch may touch, given the organization before it runs.
pub fn batch_accounts(org: &Organization, instructions: &[Instruction]) -> Vec<Address> {
    let mut keys: BTreeSet<Address> = BTreeSet::new();
    keys.insert(org.address);
    for instruction in instructions {
        keys.extend(instruction.accounts(org));
    }
    keys.into_iter().collect()
}

/// Execute an approved proposal.
///
/// Needs the organization, the proposal and [`batch_accounts`] loaded.
pub(crate) fn execute_proposal(
    ws: &mut WorkingSet,
    org: &Organization,
    proposal: &mut Proposal,
    now: u64,
) -> GovernanceResult<Transition> {
    match proposal.status {
        ProposalStatus::Draft => return Err(GovernanceError::NotReadyToExecute(proposal.index)),
        ProposalStatus::PendingApproval => {}
        _ => return Err(GovernanceError::AlreadyResolved(proposal.index)),
    }
    if lapse(ws, proposal, now)? {
        return Ok(Transition::Lapsed);
    }
    if !org.policy.is_satisfied(&proposal.approvals) {
        return Err(GovernanceError::NotReadyToExecute(proposal.index));
    }

    let mut scratch = ws.clone();
    match replay(&mut scratch, &org.address, &proposal.instructions) {
        Ok(()) => {
            *ws = scratch;
            proposal.mark_executed(now);
            info!(
                organization = %org.address.short(),
                index = proposal.index,
                instructions = proposal.instructions.len(),
                "proposal executed"
            );
        }
        Err((_, e)) if e.is_infrastructure() => return Err(e),
        Err((position, e)) => {
            warn!(
                organization = %org.address.short(),
                index = proposal.index,
                instruction = position,
                error = %e,
                "proposal rejected"
            );
            proposal.mark_rejected(position, e.to_string(), now);
        }
    }

    ws.put(proposal.address, &*proposal)?;
    Ok(Transition::Applied)
}

/// Apply each instruction in order, stopping at the first failure.
fn replay(
    ws: &mut WorkingSet,
    organization: &Address,
    instructions: &[Instruction],
) -> Result<(), (usize, GovernanceError)> {
    for (position, instruction) in instructions.iter().enumerate() {
        apply(ws, organization, instruction).map_err(|e| (position, e))?;
    }
    Ok(())
}

fn apply(
    ws: &mut WorkingSet,
    organization: &Address,
    instruction: &Instruction,
) -> GovernanceResult<()> {
    // Earlier instructions in the batch may have changed the organization.
    let mut org = organization::load(ws, organization)?;

    match instruction {
        Instruction::GrantMembership { principal } => {
            let controller = FreezeController::authorize(ws, &org)?;
            grant_membership(ws, &org, principal, &controller)?;
        }
        Instruction::RevokeMembership { principal } => {
            let controller = FreezeController::authorize(ws, &org)?;
            revoke_membership(ws, &org, principal, &controller)?;
        }
        Instruction::UpdateSettings { settings } => {
            org.settings = settings.clone();
            ws.put(org.address, &org)?;
        }
        Instruction::UpdatePolicy { policy } => {
            policy.validate()?;
            org.policy = policy.clone();
            ws.put(org.address, &org)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::Principal;
    use crate::membership::controller::initialize;
    use crate::membership::controller::tests::org_fixture;
    use crate::membership::roster::membership;
    use crate::organization::{mint_address, organization_address, RegrantBehavior};
    use crate::proposals::lifecycle::{approve_proposal, create_proposal};
    use crate::proposals::policy::PolicyConfig;
    use crate::proposals::proposal::proposal_address;
    use crate::token::{account_address, Mint};
    use std::time::Duration;

    fn p(name: &str) -> Principal {
        Address::from_name(name)
    }

    fn founder() -> Principal {
        p("founder")
    }

    /// Initialized "acme" with accounts for `principals` and the first
    /// proposal slots loaded.
    async fn ready(principals: &[Principal]) -> (WorkingSet, Organization) {
        let org_address = organization_address(&founder(), "acme");
        let mint = mint_address(&org_address);
        let mut keys: Vec<Address> = principals.iter().map(|x| account_address(&mint, x)).collect();
        keys.extend((0..4).map(|i| proposal_address(&org_address, i)));

        let (mut ws, mut org) = org_fixture("acme", &keys).await;
        initialize(&mut ws, &mut org, &founder(), 1).unwrap();
        (ws, org)
    }

    fn approved(
        ws: &mut WorkingSet,
        org: &mut Organization,
        instructions: Vec<Instruction>,
        ttl: Option<Duration>,
    ) -> Proposal {
        let mut proposal = create_proposal(ws, org, &founder(), instructions, ttl, 2).unwrap();
        approve_proposal(ws, org, &mut proposal, &founder(), 3).unwrap();
        proposal
    }

    #[tokio::test]
    async fn test_execute_grants_membership() {
        let (mut ws, mut org) = ready(&[p("alice")]).await;
        let mut proposal = approved(&mut ws, &mut org, vec![Instruction::grant(p("alice"))], None);

        let outcome = execute_proposal(&mut ws, &org, &mut proposal, 4).unwrap();
        assert_eq!(outcome, Transition::Applied);
        assert_eq!(proposal.status, ProposalStatus::Executed);
        assert!(membership(&ws, &org, &p("alice")).unwrap().is_member());
    }

    #[tokio::test]
    async fn test_second_execute_is_already_resolved() {
        let (mut ws, mut org) = ready(&[p("alice")]).await;
        let mut proposal = approved(&mut ws, &mut org, vec![Instruction::grant(p("alice"))], None);

        execute_proposal(&mut ws, &org, &mut proposal, 4).unwrap();
        let result = execute_proposal(&mut ws, &org, &mut proposal, 5);
        assert!(matches!(result, Err(GovernanceError::AlreadyResolved(0))));

        let mint: Mint = ws.get(&org.mint).unwrap().unwrap();
        assert_eq!(mint.supply, 1);
    }

    #[tokio::test]
    async fn test_unapproved_is_not_ready() {
        let (mut ws, mut org) = ready(&[p("alice")]).await;
        let mut proposal =
            create_proposal(&mut ws, &mut org, &founder(), vec![Instruction::grant(p("alice"))], None, 2)
                .unwrap();

        let result = execute_proposal(&mut ws, &org, &mut proposal, 3);
        assert!(matches!(result, Err(GovernanceError::NotReadyToExecute(0))));
        assert!(proposal.is_pending());
    }

    #[tokio::test]
    async fn test_failing_instruction_rolls_back_whole_batch() {
        let (mut ws, mut org) = ready(&[p("alice"), p("bob")]).await;
        let batch = vec![Instruction::grant(p("alice")), Instruction::revoke(p("bob"))];
        let mut proposal = approved(&mut ws, &mut org, batch, None);

        let outcome = execute_proposal(&mut ws, &org, &mut proposal, 4).unwrap();
        assert_eq!(outcome, Transition::Applied);
        assert!(matches!(
            proposal.status,
            ProposalStatus::Rejected { instruction: 1, .. }
        ));

        assert!(membership(&ws, &org, &p("alice")).unwrap().account.is_none());
        let mint: Mint = ws.get(&org.mint).unwrap().unwrap();
        assert_eq!(mint.supply, 0);
    }

    #[tokio::test]
    async fn test_execute_after_expiry_lapses() {
        let (mut ws, mut org) = ready(&[p("alice")]).await;
        let mut proposal = approved(
            &mut ws,
            &mut org,
            vec![Instruction::grant(p("alice"))],
            Some(Duration::from_secs(10)),
        );

        let outcome = execute_proposal(&mut ws, &org, &mut proposal, 100).unwrap();
        assert_eq!(outcome, Transition::Lapsed);
        assert_eq!(proposal.status, ProposalStatus::Expired);
        assert!(!membership(&ws, &org, &p("alice")).unwrap().is_member());
    }

    #[tokio::test]
    async fn test_settings_change_applies_to_later_instructions() {
        let (mut ws, mut org) = ready(&[p("alice")]).await;
        let batch = vec![
            Instruction::grant(p("alice")),
            Instruction::UpdateSettings {
                settings: crate::organization::OrganizationSettings {
                    regrant: RegrantBehavior::Reject,
                    default_proposal_ttl_secs: None,
                },
            },
            Instruction::grant(p("alice")),
        ];
        let mut proposal = approved(&mut ws, &mut org, batch, None);

        execute_proposal(&mut ws, &org, &mut proposal, 4).unwrap();
        assert!(matches!(
            proposal.status,
            ProposalStatus::Rejected { instruction: 2, .. }
        ));
        let stored = organization::load(&ws, &org.address).unwrap();
        assert_eq!(stored.settings.regrant, RegrantBehavior::Idempotent);
    }

    #[tokio::test]
    async fn test_invalid_policy_update_rejects() {
        let (mut ws, mut org) = ready(&[]).await;
        let batch = vec![Instruction::UpdatePolicy {
            policy: PolicyConfig::threshold([p("a")], 2),
        }];
        let mut proposal = approved(&mut ws, &mut org, batch, None);

        execute_proposal(&mut ws, &org, &mut proposal, 4).unwrap();
        assert!(matches!(proposal.status, ProposalStatus::Rejected { .. }));
        let stored = organization::load(&ws, &org.address).unwrap();
        assert_eq!(stored.policy, PolicyConfig::single(founder()));
    }

    #[test]
    fn test_batch_accounts_are_deduplicated() {
        let org_address = Address::from_name("acme");
        let org = Organization {
            address: org_address,
            name: "acme".to_string(),
            creator: founder(),
            mint: mint_address(&org_address),
            controller: Some(Address::from_name("controller")),
            policy: PolicyConfig::single(founder()),
            settings: Default::default(),
            next_proposal_index: 0,
            created_at: 0,
        };
        let batch = vec![Instruction::grant(p("alice")), Instruction::revoke(p("alice"))];

        // org, mint, alice's account, controller
        assert_eq!(batch_accounts(&org, &batch).len(), 4);
    }
}
