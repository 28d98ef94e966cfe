//! Freeze controller: the delegated authority over the membership mint.
//!
//! After initialization both the mint authority and the freeze authority of
//! an organization's membership mint resolve to the controller's address and
//! never to a human key. The [`FreezeController`] capability has no public
//! constructor; the proposal executor obtains one through
//! [`FreezeController::authorize`] while replaying a batch.

use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::{Address, Principal};
use crate::organization::{controller_address, Organization};
use crate::proposals::policy::ApprovalPolicy;
use crate::store::WorkingSet;
use crate::token::authority::{OrganizationSigner, Sealed};
use crate::token::{AuthorityKind, MintAuthority, TokenLedger};
use serde::{Deserialize, Serialize};
use tracing::info;

/// Stored controller record, bound 1:1 to an organization.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ControllerRecord {
    pub address: Address,
    pub organization: Address,
    pub mint_authority: bool,
    pub freeze_authority: bool,
    pub initialized_at: u64,
}

/// Capability to sign mint/burn/freeze/thaw for one organization.
#[derive(Debug)]
pub struct FreezeController {
    address: Address,
    organization: Address,
}

impl FreezeController {
    pub fn address(&self) -> Address {
        self.address
    }

    pub fn organization(&self) -> Address {
        self.organization
    }

    /// Resolve the organization's controller for the current execution.
    ///
    /// Needs the controller record loaded.
    pub(crate) fn authorize(ws: &WorkingSet, org: &Organization) -> GovernanceResult<Self> {
        let address = org
            .controller
            .ok_or(GovernanceError::NotInitialized(org.address))?;
        let record = ws
            .get::<ControllerRecord>(&address)?
            .ok_or(GovernanceError::NotInitialized(org.address))?;

        if record.organization != org.address {
            return Err(GovernanceError::UnauthorizedController(org.address));
        }

        Ok(Self {
            address: record.address,
            organization: record.organization,
        })
    }
}

impl Sealed for FreezeController {}

impl MintAuthority for FreezeController {
    fn authority(&self) -> Address {
        self.address
    }
}

/// Create the controller and hand it the mint's mint and freeze authorities.
///
/// Needs the organization, its mint and the controller address loaded.
pub(crate) fn initialize(
    ws: &mut WorkingSet,
    org: &mut Organization,
    caller: &Principal,
    now: u64,
) -> GovernanceResult<ControllerRecord> {
    if org.controller.is_some() {
        return Err(GovernanceError::AlreadyInitialized(org.address));
    }
    if !org.policy.can_propose(caller) {
        return Err(GovernanceError::Unauthorized(*caller));
    }

    let address = controller_address(&org.address);
    if ws.get::<ControllerRecord>(&address)?.is_some() {
        return Err(GovernanceError::AlreadyInitialized(org.address));
    }

    let signer = OrganizationSigner::new(org.address);
    let mut ledger = TokenLedger::new(ws);
    ledger.set_authority(&org.mint, AuthorityKind::MintTokens, Some(address), &signer)?;
    ledger.set_authority(&org.mint, AuthorityKind::FreezeAccount, Some(address), &signer)?;

    let record = ControllerRecord {
        address,
        organization: org.address,
        mint_authority: true,
        freeze_authority: true,
        initialized_at: now,
    };
    ws.put(address, &record)?;

    org.controller = Some(address);
    ws.put(org.address, &*org)?;

    info!(
        organization = %org.address.short(),
        controller = %address.short(),
        "freeze controller initialized"
    );
    Ok(record)
}
