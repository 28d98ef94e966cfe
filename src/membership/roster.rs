//! Membership token controller.
//!
//! A principal is a member of an organization iff their account for the
//! membership mint holds at least one token and is frozen. Grant and revoke
//! bracket every balance change with thaw/freeze inside the same working
//! set, so no committed state ever shows a positive unfrozen balance.

use super::controller::FreezeController;
use crate::error::{GovernanceError, GovernanceResult};
use crate::identity::Principal;
use crate::organization::{Organization, RegrantBehavior};
use crate::store::WorkingSet;
use crate::token::{account_address, Mint, TokenAccount, TokenLedger};
use serde::{Deserialize, Serialize};
use tracing::info;

/// A principal's membership as seen through their token account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Membership {
    pub principal: Principal,
    pub account: Option<TokenAccount>,
}

impl Membership {
    pub fn is_member(&self) -> bool {
        self.account.as_ref().is_some_and(holds_membership)
    }

    pub fn balance(&self) -> u64 {
        self.account.as_ref().map_or(0, |a| a.amount)
    }

    pub fn is_frozen(&self) -> bool {
        self.account.as_ref().is_some_and(TokenAccount::is_frozen)
    }
}

/// Balance of at least one, frozen.
pub fn holds_membership(account: &TokenAccount) -> bool {
    account.amount >= 1 && account.is_frozen()
}

/// Read a principal's membership. Needs their account loaded.
pub fn membership(
    ws: &WorkingSet,
    org: &Organization,
    principal: &Principal,
) -> GovernanceResult<Membership> {
    let account = ws.get::<TokenAccount>(&account_address(&org.mint, principal))?;
    Ok(Membership {
        principal: *principal,
        account,
    })
}

/// The controller must belong to this organization and hold both mint
/// authorities.
fn check_controller(
    ws: &WorkingSet,
    org: &Organization,
    controller: &FreezeController,
) -> GovernanceResult<()> {
    let unauthorized = || GovernanceError::UnauthorizedController(org.address);

    if controller.organization() != org.address || org.controller != Some(controller.address()) {
        return Err(unauthorized());
    }

    let mint = ws
        .get::<Mint>(&org.mint)?
        .ok_or_else(unauthorized)?;
    let expected = Some(controller.address());
    if mint.mint_authority != expected || mint.freeze_authority != expected {
        return Err(unauthorized());
    }
    Ok(())
}

/// Mint one token to `principal` and freeze their account.
pub(crate) fn grant_membership(
    ws: &mut WorkingSet,
    org: &Organization,
    principal: &Principal,
    controller: &FreezeController,
) -> GovernanceResult<TokenAccount> {
    check_controller(ws, org, controller)?;

    let mint = org.mint;
    let address = account_address(&mint, principal);
    let mut ledger = TokenLedger::new(ws);

    let account = match ledger.account(&address)? {
        Some(existing) if holds_membership(&existing) => {
            return match org.settings.regrant {
                RegrantBehavior::Idempotent => Ok(existing),
                RegrantBehavior::Reject => Err(GovernanceError::AlreadyAMember(*principal)),
            };
        }
        Some(existing) => existing,
        None => ledger.create_account(&mint, principal)?,
    };

    let mut account = account;
    if account.is_frozen() {
        account = ledger.thaw(&mint, &address, controller)?;
    }
    if account.amount == 0 {
        ledger.mint_to(&mint, &address, 1, controller)?;
    }
    let account = ledger.freeze(&mint, &address, controller)?;

    info!(
        organization = %org.address.short(),
        principal = %principal.short(),
        "membership granted"
    );
    Ok(account)
}

/// Burn `principal`'s membership tokens and leave the account frozen at zero.
pub(crate) fn revoke_membership(
    ws: &mut WorkingSet,
    org: &Organization,
    principal: &Principal,
    controller: &FreezeController,
) -> GovernanceResult<TokenAccount> {
    check_controller(ws, org, controller)?;

    let mint = org.mint;
    let address = account_address(&mint, principal);
    let mut ledger = TokenLedger::new(ws);

    let account = match ledger.account(&address)? {
        Some(account) if account.amount > 0 => account,
        _ => return Err(GovernanceError::NotAMember(*principal)),
    };

    if account.is_frozen() {
        ledger.thaw(&mint, &address, controller)?;
    }
    ledger.burn(&mint, &address, account.amount, controller)?;
    let account = ledger.freeze(&mint, &address, controller)?;

    info!(
        organization = %org.address.short(),
        principal = %principal.short(),
        "membership revoked"
    );
    Ok(account)
}
