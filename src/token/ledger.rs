//! Token primitives over a working set.
//!
//! Rules enforced here, independent of who calls:
//! - mint/burn need the mint authority, freeze/thaw the freeze authority
//! - a frozen account can neither send, receive, mint into, nor burn
//! - owners move their own balance with `transfer`; nobody else can

use super::authority::MintAuthority;
use super::state::{AccountState, AuthorityKind, Mint, TokenAccount};
use super::{TokenError, TokenResult};
use crate::identity::{Address, Principal};
use crate::store::WorkingSet;

/// Address of `owner`'s account for `mint`.
pub fn account_address(mint: &Address, owner: &Principal) -> Address {
    Address::derive("member-account", &[mint.as_bytes(), owner.as_bytes()])
}

/// Token ledger view over a working set.
pub struct TokenLedger<'w> {
    ws: &'w mut WorkingSet,
}

impl<'w> TokenLedger<'w> {
    pub fn new(ws: &'w mut WorkingSet) -> Self {
        Self { ws }
    }

    /// Create a mint whose authorities both start at `authority`.
    pub fn create_mint(
        &mut self,
        address: Address,
        organization: Address,
        authority: Address,
        decimals: u8,
    ) -> TokenResult<Mint> {
        if self.ws.get::<Mint>(&address)?.is_some() {
            return Err(TokenError::MintExists(address));
        }
        let mint = Mint {
            address,
            organization,
            mint_authority: Some(authority),
            freeze_authority: Some(authority),
            supply: 0,
            decimals,
        };
        self.ws.put(address, &mint)?;
        Ok(mint)
    }

    pub fn mint(&self, address: &Address) -> TokenResult<Mint> {
        self.ws
            .get::<Mint>(address)?
            .ok_or(TokenError::MintNotFound(*address))
    }

    pub fn account(&self, address: &Address) -> TokenResult<Option<TokenAccount>> {
        Ok(self.ws.get::<TokenAccount>(address)?)
    }

    fn existing_account(&self, mint: &Address, address: &Address) -> TokenResult<TokenAccount> {
        let account = self
            .account(address)?
            .ok_or(TokenError::AccountNotFound(*address))?;
        if account.mint != *mint {
            return Err(TokenError::MintMismatch {
                account: *address,
                expected: *mint,
                actual: account.mint,
            });
        }
        Ok(account)
    }

    /// Create `owner`'s empty, unfrozen account for `mint`.
    pub fn create_account(&mut self, mint: &Address, owner: &Principal) -> TokenResult<TokenAccount> {
        self.mint(mint)?;
        let address = account_address(mint, owner);
        if self.account(&address)?.is_some() {
            return Err(TokenError::AccountExists(address));
        }
        let account = TokenAccount {
            address,
            mint: *mint,
            owner: *owner,
            amount: 0,
            state: AccountState::Initialized,
        };
        self.ws.put(address, &account)?;
        Ok(account)
    }

    pub fn mint_to(
        &mut self,
        mint: &Address,
        account: &Address,
        amount: u64,
        authority: &dyn MintAuthority,
    ) -> TokenResult<TokenAccount> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let mut mint_record = self.mint(mint)?;
        check_authority(mint_record.mint_authority, authority)?;

        let mut target = self.existing_account(mint, account)?;
        if target.is_frozen() {
            return Err(TokenError::AccountFrozen(*account));
        }

        mint_record.supply = mint_record
            .supply
            .checked_add(amount)
            .ok_or(TokenError::Overflow(*mint))?;
        target.amount = target
            .amount
            .checked_add(amount)
            .ok_or(TokenError::Overflow(*mint))?;

        self.ws.put(*mint, &mint_record)?;
        self.ws.put(*account, &target)?;
        Ok(target)
    }

    pub fn burn(
        &mut self,
        mint: &Address,
        account: &Address,
        amount: u64,
        authority: &dyn MintAuthority,
    ) -> TokenResult<TokenAccount> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let mut mint_record = self.mint(mint)?;
        check_authority(mint_record.mint_authority, authority)?;

        let mut target = self.existing_account(mint, account)?;
        if target.is_frozen() {
            return Err(TokenError::AccountFrozen(*account));
        }
        if target.amount < amount {
            return Err(TokenError::InsufficientFunds {
                available: target.amount,
                requested: amount,
            });
        }

        target.amount -= amount;
        mint_record.supply = mint_record.supply.saturating_sub(amount);

        self.ws.put(*mint, &mint_record)?;
        self.ws.put(*account, &target)?;
        Ok(target)
    }

    pub fn freeze(
        &mut self,
        mint: &Address,
        account: &Address,
        authority: &dyn MintAuthority,
    ) -> TokenResult<TokenAccount> {
        self.set_state(mint, account, authority, AccountState::Frozen)
    }

    pub fn thaw(
        &mut self,
        mint: &Address,
        account: &Address,
        authority: &dyn MintAuthority,
    ) -> TokenResult<TokenAccount> {
        self.set_state(mint, account, authority, AccountState::Initialized)
    }

    fn set_state(
        &mut self,
        mint: &Address,
        account: &Address,
        authority: &dyn MintAuthority,
        state: AccountState,
    ) -> TokenResult<TokenAccount> {
        let mint_record = self.mint(mint)?;
        check_authority(mint_record.freeze_authority, authority)?;

        let mut target = self.existing_account(mint, account)?;
        match (target.state, state) {
            (AccountState::Frozen, AccountState::Frozen) => {
                return Err(TokenError::AccountFrozen(*account))
            }
            (AccountState::Initialized, AccountState::Initialized) => {
                return Err(TokenError::AccountNotFrozen(*account))
            }
            _ => {}
        }

        target.state = state;
        self.ws.put(*account, &target)?;
        Ok(target)
    }

    /// Replace one of the mint's authorities. Must be signed by the current one.
    pub fn set_authority(
        &mut self,
        mint: &Address,
        kind: AuthorityKind,
        new_authority: Option<Address>,
        current: &dyn MintAuthority,
    ) -> TokenResult<Mint> {
        let mut mint_record = self.mint(mint)?;
        let slot = match kind {
            AuthorityKind::MintTokens => &mut mint_record.mint_authority,
            AuthorityKind::FreezeAccount => &mut mint_record.freeze_authority,
        };
        check_authority(*slot, current)?;
        *slot = new_authority;

        self.ws.put(*mint, &mint_record)?;
        Ok(mint_record)
    }

    /// Owner-signed move of balance between two accounts of the same mint.
    pub fn transfer(
        &mut self,
        mint: &Address,
        source: &Address,
        destination: &Address,
        owner: &Principal,
        amount: u64,
    ) -> TokenResult<()> {
        if amount == 0 {
            return Err(TokenError::ZeroAmount);
        }
        let mut from = self.existing_account(mint, source)?;
        if from.owner != *owner {
            return Err(TokenError::OwnerMismatch {
                account: *source,
                signer: *owner,
            });
        }
        if from.is_frozen() {
            return Err(TokenError::AccountFrozen(*source));
        }

        let mut to = self.existing_account(mint, destination)?;
        if to.is_frozen() {
            return Err(TokenError::AccountFrozen(*destination));
        }
        if from.amount < amount {
            return Err(TokenError::InsufficientFunds {
                available: from.amount,
                requested: amount,
            });
        }
        if source == destination {
            return Ok(());
        }

        from.amount -= amount;
        to.amount = to
            .amount
            .checked_add(amount)
            .ok_or(TokenError::Overflow(*mint))?;

        self.ws.put(*source, &from)?;
        self.ws.put(*destination, &to)?;
        Ok(())
    }
}

fn check_authority(expected: Option<Address>, presented: &dyn MintAuthority) -> TokenResult<()> {
    let presented = presented.authority();
    if expected != Some(presented) {
        return Err(TokenError::AuthorityMismatch {
            expected,
            presented,
        });
    }
    Ok(())
}
