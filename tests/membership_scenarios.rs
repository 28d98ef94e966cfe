//! Membership scenarios end to end through the governance service.

use sigorg::token::TokenError;
use sigorg::{
    Address, Governance, GovernanceError, Instruction, MemoryStore, Organization,
    OrganizationSettings, PolicyConfig, Principal, ProposalStatus, RegrantBehavior,
};
use std::sync::Arc;

fn p(name: &str) -> Principal {
    Address::from_name(name)
}

async fn organization(settings: OrganizationSettings) -> (Governance<MemoryStore>, Organization) {
    let governance = Governance::new(Arc::new(MemoryStore::new()));
    let founder = p("founder");
    let org = governance
        .create_organization(&founder, "acme", PolicyConfig::single(founder), settings)
        .await
        .unwrap();
    (governance, org)
}

async fn run(
    governance: &Governance<MemoryStore>,
    org: &Organization,
    instructions: Vec<Instruction>,
) -> ProposalStatus {
    governance
        .create_and_execute(&org.address, &p("founder"), instructions)
        .await
        .unwrap()
        .status
}

#[tokio::test]
async fn test_initialize_hands_authorities_to_controller() {
    let (governance, org) = organization(Default::default()).await;

    let before = governance.mint(&org.address).await.unwrap();
    assert_eq!(before.mint_authority, Some(org.address));
    assert_eq!(before.freeze_authority, Some(org.address));

    let record = governance.initialize(&org.address, &p("founder")).await.unwrap();
    let after = governance.mint(&org.address).await.unwrap();
    assert_eq!(after.mint_authority, Some(record.address));
    assert_eq!(after.freeze_authority, Some(record.address));
    assert_ne!(record.address, p("founder"));

    let again = governance.initialize(&org.address, &p("founder")).await;
    assert!(matches!(again, Err(GovernanceError::AlreadyInitialized(_))));
}

#[tokio::test]
async fn test_grant_before_initialize_is_rejected() {
    let (governance, org) = organization(Default::default()).await;

    let status = run(&governance, &org, vec![Instruction::grant(p("alice"))]).await;
    match status {
        ProposalStatus::Rejected { reason, .. } => assert!(reason.contains("no freeze controller")),
        other => panic!("expected Rejected, got {:?}", other),
    }
}

#[tokio::test]
async fn test_grant_then_revoke() {
    let (governance, org) = organization(Default::default()).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();
    let alice = p("alice");

    let status = run(&governance, &org, vec![Instruction::grant(alice)]).await;
    assert_eq!(status, ProposalStatus::Executed);
    let granted = governance.membership(&org.address, &alice).await.unwrap();
    assert!(granted.is_member());
    assert!(granted.is_frozen());
    assert_eq!(granted.balance(), 1);

    let status = run(&governance, &org, vec![Instruction::revoke(alice)]).await;
    assert_eq!(status, ProposalStatus::Executed);
    let revoked = governance.membership(&org.address, &alice).await.unwrap();
    assert!(!revoked.is_member());
    assert_eq!(revoked.balance(), 0);
    assert!(revoked.is_frozen());
}

#[tokio::test]
async fn test_member_cannot_transfer_token() {
    let (governance, org) = organization(Default::default()).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();
    let (alice, bob) = (p("alice"), p("bob"));
    run(&governance, &org, vec![Instruction::grant(alice), Instruction::grant(bob)]).await;

    let result = governance.transfer(&org.address, &alice, &bob, 1).await;
    assert!(matches!(
        result,
        Err(GovernanceError::Token(TokenError::AccountFrozen(_)))
    ));

    assert_eq!(governance.membership(&org.address, &alice).await.unwrap().balance(), 1);
    assert_eq!(governance.membership(&org.address, &bob).await.unwrap().balance(), 1);
}

#[tokio::test]
async fn test_member_cannot_send_to_outsider() {
    let (governance, org) = organization(Default::default()).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();
    let (alice, carol) = (p("alice"), p("carol"));
    run(&governance, &org, vec![Instruction::grant(alice)]).await;

    // carol has never held an account; the frozen source must still be what fails
    let result = governance.transfer(&org.address, &alice, &carol, 1).await;
    assert!(matches!(
        result,
        Err(GovernanceError::Token(TokenError::AccountFrozen(_)))
    ));

    assert_eq!(governance.membership(&org.address, &alice).await.unwrap().balance(), 1);
    assert!(governance.membership(&org.address, &carol).await.unwrap().account.is_none());
}

#[tokio::test]
async fn test_revoke_never_granted_is_not_a_member() {
    let (governance, org) = organization(Default::default()).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();

    let status = run(&governance, &org, vec![Instruction::revoke(p("nobody"))]).await;
    assert!(matches!(status, ProposalStatus::Rejected { instruction: 0, .. }));
}

#[tokio::test]
async fn test_double_grant_keeps_balance_at_one() {
    let (governance, org) = organization(Default::default()).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();
    let alice = p("alice");

    run(&governance, &org, vec![Instruction::grant(alice)]).await;
    let status = run(&governance, &org, vec![Instruction::grant(alice)]).await;

    assert_eq!(status, ProposalStatus::Executed);
    assert_eq!(governance.membership(&org.address, &alice).await.unwrap().balance(), 1);
    assert_eq!(governance.mint(&org.address).await.unwrap().supply, 1);
}

#[tokio::test]
async fn test_regrant_rejected_when_configured() {
    let settings = OrganizationSettings {
        regrant: RegrantBehavior::Reject,
        ..Default::default()
    };
    let (governance, org) = organization(settings).await;
    governance.initialize(&org.address, &p("founder")).await.unwrap();
    let alice = p("alice");

    run(&governance, &org, vec![Instruction::grant(alice)]).await;
    let status = run(&governance, &org, vec![Instruction::grant(alice)]).await;

    assert!(matches!(status, ProposalStatus::Rejected { .. }));
    assert_eq!(governance.membership(&org.address, &alice).await.unwrap().balance(), 1);
}

#[tokio::test]
async fn test_double_execute_keeps_single_token() {
    let (governance, org) = organization(Default::default()).await;
    let founder = p("founder");
    governance.initialize(&org.address, &founder).await.unwrap();

    let proposal = governance
        .create_proposal(&org.address, &founder, vec![Instruction::grant(p("alice"))], None)
        .await
        .unwrap();
    governance.approve(&org.address, proposal.index, &founder).await.unwrap();

    governance.execute(&org.address, proposal.index).await.unwrap();
    let second = governance.execute(&org.address, proposal.index).await;

    assert!(matches!(second, Err(GovernanceError::AlreadyResolved(_))));
    assert_eq!(
        governance.membership(&org.address, &p("alice")).await.unwrap().balance(),
        1
    );
}

#[tokio::test]
async fn test_outsider_cannot_initialize() {
    let (governance, org) = organization(Default::default()).await;

    let result = governance.initialize(&org.address, &p("mallory")).await;
    assert!(matches!(result, Err(GovernanceError::Unauthorized(_))));
    assert!(governance.controller(&org.address).await.unwrap().is_none());
}

#[tokio::test]
async fn test_same_name_twice_is_organization_exists() {
    let (governance, _) = organization(Default::default()).await;
    let founder = p("founder");

    let result = governance
        .create_organization(&founder, "acme", PolicyConfig::single(founder), Default::default())
        .await;
    assert!(matches!(result, Err(GovernanceError::OrganizationExists(_))));

    // Another creator may reuse the name.
    governance
        .create_organization(&p("other"), "acme", PolicyConfig::single(p("other")), Default::default())
        .await
        .unwrap();
}
