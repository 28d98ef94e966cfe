//! Organization records.
//!
//! An organization is created together with its membership mint. At that
//! point the mint's authorities resolve to the organization's own address;
//! `membership::controller::initialize` hands them to the freeze controller
//! exactly once.

use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::{Address, Principal};
use crate::proposals::policy::PolicyConfig;
use crate::store::WorkingSet;
use crate::token::TokenLedger;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// What granting membership to an existing member does.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegrantBehavior {
    /// No-op; balance stays at 1. Keeps grants safely retryable.
    #[default]
    Idempotent,
    /// Fail with `AlreadyAMember`.
    Reject,
}

/// Organization-level knobs, changeable through proposals.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrganizationSettings {
    #[serde(default)]
    pub regrant: RegrantBehavior,

    /// TTL applied to proposals created without an explicit one.
    #[serde(default)]
    pub default_proposal_ttl_secs: Option<u64>,
}

impl OrganizationSettings {
    pub fn default_proposal_ttl(&self) -> Option<Duration> {
        self.default_proposal_ttl_secs.map(Duration::from_secs)
    }
}

/// One governed entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Organization {
    pub address: Address,
    pub name: String,
    pub creator: Principal,

    /// Membership mint; fixed at creation.
    pub mint: Address,

    /// Freeze controller; set once by initialization.
    pub controller: Option<Address>,

    pub policy: PolicyConfig,

    #[serde(default)]
    pub settings: OrganizationSettings,

    /// Index the next proposal will get. Never decreases.
    pub next_proposal_index: u64,

    pub created_at: u64,
}

impl Organization {
    pub fn is_initialized(&self) -> bool {
        self.controller.is_some()
    }
}

pub fn organization_address(creator: &Principal, name: &str) -> Address {
    Address::derive("organization", &[creator.as_bytes(), name.as_bytes()])
}

pub fn mint_address(organization: &Address) -> Address {
    Address::derive("membership-mint", &[organization.as_bytes()])
}

pub fn controller_address(organization: &Address) -> Address {
    Address::derive("freeze-controller", &[organization.as_bytes()])
}

/// Load an organization that must exist.
pub(crate) fn load(ws: &WorkingSet, address: &Address) -> GovernanceResult<Organization> {
    ws.get::<Organization>(address)?
        .ok_or(GovernanceError::OrganizationNotFound(*address))
}

/// Create an organization and its membership mint.
///
/// Needs the organization and mint addresses loaded.
pub(crate) fn create(
    ws: &mut WorkingSet,
    creator: &Principal,
    name: &str,
    policy: PolicyConfig,
    settings: OrganizationSettings,
    now: u64,
) -> GovernanceResult<Organization> {
    policy.validate()?;

    let address = organization_address(creator, name);
    if ws.get::<Organization>(&address)?.is_some() {
        return Err(GovernanceError::OrganizationExists(address));
    }

    let mint = mint_address(&address);
    TokenLedger::new(ws).create_mint(mint, address, address, 0)?;

    let organization = Organization {
        address,
        name: name.to_string(),
        creator: *creator,
        mint,
        controller: None,
        policy,
        settings,
        next_proposal_index: 0,
        created_at: now,
    };
    ws.put(address, &organization)?;

    Ok(organization)
}
