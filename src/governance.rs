//! Governance service: the outward operation surface.
//!
//! Each operation reads the records it needs into a [`WorkingSet`], runs the
//! core rules against it, and commits once with the read versions as
//! preconditions. A commit that loses a race is re-run from fresh reads, up
//! to [`MAX_COMMIT_ATTEMPTS`] times.

use crate::clock::{Clock, SystemClock};
use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::{Address, Principal};
use crate::membership::controller::{self, ControllerRecord};
use crate::membership::roster::{self, Membership};
use crate::organization::{
    self, controller_address, mint_address, organization_address, Organization,
    OrganizationSettings,
};
use crate::proposals::executor::{batch_accounts, execute_proposal};
use crate::proposals::lifecycle::{self, Transition};
use crate::proposals::{proposal_address, Instruction, PolicyConfig, Proposal};
use crate::store::{RecordStore, StoreError, WorkingSet};
use crate::token::{account_address, Mint, TokenError, TokenLedger};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Commit attempts per operation before giving up with `Contention`.
pub const MAX_COMMIT_ATTEMPTS: usize = 8;

/// Outcome of one attempt's rule evaluation.
enum Applied<T> {
    /// Commit the working set and return the value.
    Commit(T),
    /// Commit the working set, then report the error.
    CommitAndFail(GovernanceError),
}

fn from_transition(transition: Transition, proposal: Proposal) -> Applied<Proposal> {
    match transition {
        Transition::Applied => Applied::Commit(proposal),
        Transition::Lapsed => Applied::CommitAndFail(GovernanceError::ProposalExpired(proposal.index)),
    }
}

/// Governance over one record store.
pub struct Governance<S: RecordStore + ?Sized, C: Clock = SystemClock> {
    store: Arc<S>,
    clock: C,
}

impl<S: RecordStore + ?Sized, C: Clock + Clone> Clone for Governance<S, C> {
    fn clone(&self) -> Self {
        Self {
            store: Arc::clone(&self.store),
            clock: self.clock.clone(),
        }
    }
}

impl<S: RecordStore + ?Sized> Governance<S, SystemClock> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            clock: SystemClock,
        }
    }
}

impl<S: RecordStore + ?Sized, C: Clock> Governance<S, C> {
    pub fn with_clock(store: Arc<S>, clock: C) -> Self {
        Self { store, clock }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn clock(&self) -> &C {
        &self.clock
    }

    /// Run `apply` against fresh reads of `keys` plus `extra_keys`, and
    /// commit the result, retrying on version conflicts.
    async fn transact<T, K, F>(
        &self,
        op: &'static str,
        keys: &[Address],
        extra_keys: K,
        mut apply: F,
    ) -> GovernanceResult<T>
    where
        K: Fn(&WorkingSet) -> GovernanceResult<Vec<Address>>,
        F: FnMut(&mut WorkingSet, u64) -> GovernanceResult<Applied<T>>,
    {
        for attempt in 1..=MAX_COMMIT_ATTEMPTS {
            let mut ws = WorkingSet::load(&*self.store, keys).await?;
            let extra = extra_keys(&ws)?;
            ws.fetch(&*self.store, &extra).await?;

            // A record read in the second fetch can show a rival's commit
            // that the first read predates; rules report that as a conflict.
            let outcome = match apply(&mut ws, self.clock.now()) {
                Ok(outcome) => outcome,
                Err(GovernanceError::Store(StoreError::Conflict(key))) => {
                    debug!(op, attempt, record = %key.short(), "stale read, retrying");
                    continue;
                }
                Err(e) => return Err(e),
            };

            if ws.is_dirty() {
                match self.store.commit(ws.into_commit()).await {
                    Ok(()) => {}
                    Err(StoreError::Conflict(key)) => {
                        debug!(op, attempt, record = %key.short(), "commit conflict, retrying");
                        continue;
                    }
                    Err(e) => return Err(e.into()),
                }
            }

            return match outcome {
                Applied::Commit(value) => Ok(value),
                Applied::CommitAndFail(e) => Err(e),
            };
        }

        warn!(op, attempts = MAX_COMMIT_ATTEMPTS, "giving up after repeated conflicts");
        Err(GovernanceError::Contention(op))
    }

    async fn snapshot(&self, keys: &[Address]) -> GovernanceResult<WorkingSet> {
        Ok(WorkingSet::load(&*self.store, keys).await?)
    }

    // -- Operations --

    /// Create an organization and its membership mint.
    pub async fn create_organization(
        &self,
        creator: &Principal,
        name: &str,
        policy: PolicyConfig,
        settings: OrganizationSettings,
    ) -> GovernanceResult<Organization> {
        let address = organization_address(creator, name);
        let keys = [address, mint_address(&address)];

        let org = self
            .transact("create_organization", &keys, |_| Ok(Vec::new()), |ws, now| {
                organization::create(ws, creator, name, policy.clone(), settings.clone(), now)
                    .map(Applied::Commit)
            })
            .await?;

        info!(
            organization = %org.address.short(),
            creator = %creator.short(),
            name,
            "organization created"
        );
        Ok(org)
    }

    /// One-time freeze controller bootstrap.
    pub async fn initialize(
        &self,
        organization: &Address,
        caller: &Principal,
    ) -> GovernanceResult<ControllerRecord> {
        let keys = [
            *organization,
            mint_address(organization),
            controller_address(organization),
        ];

        self.transact("initialize", &keys, |_| Ok(Vec::new()), |ws, now| {
            let mut org = organization::load(ws, organization)?;
            controller::initialize(ws, &mut org, caller, now).map(Applied::Commit)
        })
        .await
    }

    /// Create a proposal. `ttl` overrides the organization's default.
    pub async fn create_proposal(
        &self,
        organization: &Address,
        creator: &Principal,
        instructions: Vec<Instruction>,
        ttl: Option<Duration>,
    ) -> GovernanceResult<Proposal> {
        if instructions.is_empty() {
            return Err(GovernanceError::EmptyProposal);
        }

        let next_slot = |ws: &WorkingSet| -> GovernanceResult<Vec<Address>> {
            let org = organization::load(ws, organization)?;
            Ok(vec![proposal_address(organization, org.next_proposal_index)])
        };

        self.transact("create_proposal", &[*organization], next_slot, |ws, now| {
            let mut org = organization::load(ws, organization)?;
            lifecycle::create_proposal(ws, &mut org, creator, instructions.clone(), ttl, now)
                .map(Applied::Commit)
        })
        .await
    }

    /// Record an approval.
    pub async fn approve(
        &self,
        organization: &Address,
        index: u64,
        approver: &Principal,
    ) -> GovernanceResult<Proposal> {
        let keys = [*organization, proposal_address(organization, index)];

        self.transact("approve", &keys, |_| Ok(Vec::new()), |ws, now| {
            let org = organization::load(ws, organization)?;
            let mut proposal = lifecycle::load(ws, &org, index)?;
            let transition = lifecycle::approve_proposal(ws, &org, &mut proposal, approver, now)?;
            Ok(from_transition(transition, proposal))
        })
        .await
    }

    /// Execute an approved proposal.
    ///
    /// A batch that fails is not an error here: the returned proposal is
    /// `Rejected` and records the failing instruction.
    pub async fn execute(&self, organization: &Address, index: u64) -> GovernanceResult<Proposal> {
        let address = proposal_address(organization, index);
        let keys = [*organization, address];

        let batch = |ws: &WorkingSet| -> GovernanceResult<Vec<Address>> {
            let org = organization::load(ws, organization)?;
            Ok(ws
                .get::<Proposal>(&address)?
                .map(|p| batch_accounts(&org, &p.instructions))
                .unwrap_or_default())
        };

        self.transact("execute", &keys, batch, |ws, now| {
            let org = organization::load(ws, organization)?;
            let mut proposal = lifecycle::load(ws, &org, index)?;
            let transition = execute_proposal(ws, &org, &mut proposal, now)?;
            Ok(from_transition(transition, proposal))
        })
        .await
    }

    /// Expire the proposal if the clock is past its expiry.
    pub async fn expire(&self, organization: &Address, index: u64) -> GovernanceResult<Proposal> {
        self.expire_at(organization, index, self.clock.now()).await
    }

    /// Expire the proposal if `now` is past its expiry; otherwise a no-op.
    pub async fn expire_at(
        &self,
        organization: &Address,
        index: u64,
        now: u64,
    ) -> GovernanceResult<Proposal> {
        let keys = [*organization, proposal_address(organization, index)];

        self.transact("expire", &keys, |_| Ok(Vec::new()), |ws, _| {
            let org = organization::load(ws, organization)?;
            let mut proposal = lifecycle::load(ws, &org, index)?;
            lifecycle::expire_proposal(ws, &mut proposal, now)?;
            Ok(Applied::Commit(proposal))
        })
        .await
    }

    /// Create, approve as `caller`, and execute in one call.
    ///
    /// Only completes under a policy `caller`'s approval alone satisfies;
    /// otherwise it stops with `NotReadyToExecute` and the proposal stays
    /// pending.
    pub async fn create_and_execute(
        &self,
        organization: &Address,
        caller: &Principal,
        instructions: Vec<Instruction>,
    ) -> GovernanceResult<Proposal> {
        let proposal = self
            .create_proposal(organization, caller, instructions, None)
            .await?;
        self.approve(organization, proposal.index, caller).await?;
        self.execute(organization, proposal.index).await
    }

    /// Owner-signed transfer of membership tokens.
    ///
    /// Membership accounts are frozen, so this fails for any account that
    /// currently proves membership.
    pub async fn transfer(
        &self,
        organization: &Address,
        owner: &Principal,
        recipient: &Principal,
        amount: u64,
    ) -> GovernanceResult<()> {
        let mint = mint_address(organization);
        let source = account_address(&mint, owner);
        let destination = account_address(&mint, recipient);
        let keys = [*organization, mint, source, destination];

        self.transact("transfer", &keys, |_| Ok(Vec::new()), |ws, _| {
            organization::load(ws, organization)?;
            TokenLedger::new(ws).transfer(&mint, &source, &destination, owner, amount)?;
            Ok(Applied::Commit(()))
        })
        .await
    }

    // -- Queries --

    pub async fn organization(&self, organization: &Address) -> GovernanceResult<Organization> {
        let ws = self.snapshot(&[*organization]).await?;
        organization::load(&ws, organization)
    }

    pub async fn proposal(&self, organization: &Address, index: u64) -> GovernanceResult<Proposal> {
        let ws = self
            .snapshot(&[*organization, proposal_address(organization, index)])
            .await?;
        let org = organization::load(&ws, organization)?;
        lifecycle::load(&ws, &org, index)
    }

    /// Every proposal of the organization, by index.
    pub async fn proposals(&self, organization: &Address) -> GovernanceResult<Vec<Proposal>> {
        let mut ws = self.snapshot(&[*organization]).await?;
        let org = organization::load(&ws, organization)?;
        let keys: Vec<Address> = (0..org.next_proposal_index)
            .map(|i| proposal_address(organization, i))
            .collect();
        ws.fetch(&*self.store, &keys).await?;

        (0..org.next_proposal_index)
            .map(|i| lifecycle::load(&ws, &org, i))
            .collect()
    }

    pub async fn mint(&self, organization: &Address) -> GovernanceResult<Mint> {
        let mint = mint_address(organization);
        let ws = self.snapshot(&[*organization, mint]).await?;
        organization::load(&ws, organization)?;
        ws.get::<Mint>(&mint)?
            .ok_or_else(|| TokenError::MintNotFound(mint).into())
    }

    /// The freeze controller, or `None` before initialization.
    pub async fn controller(
        &self,
        organization: &Address,
    ) -> GovernanceResult<Option<ControllerRecord>> {
        let ws = self
            .snapshot(&[*organization, controller_address(organization)])
            .await?;
        let org = organization::load(&ws, organization)?;
        match org.controller {
            Some(address) => Ok(ws.get::<ControllerRecord>(&address)?),
            None => Ok(None),
        }
    }

    pub async fn membership(
        &self,
        organization: &Address,
        principal: &Principal,
    ) -> GovernanceResult<Membership> {
        let account = account_address(&mint_address(organization), principal);
        let ws = self.snapshot(&[*organization, account]).await?;
        let org = organization::load(&ws, organization)?;
        roster::membership(&ws, &org, principal)
    }
}
