//! Mint and token account records.

use crate::identity::{Address, Principal};
use serde::{Deserialize, Serialize};

/// Token type definition. One per organization for membership.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Mint {
    pub address: Address,

    /// Organization the mint belongs to.
    pub organization: Address,

    /// Who may mint and burn.
    pub mint_authority: Option<Address>,

    /// Who may freeze and thaw accounts.
    pub freeze_authority: Option<Address>,

    pub supply: u64,

    pub decimals: u8,
}

/// Account lifecycle state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AccountState {
    Initialized,
    Frozen,
}

/// A principal's holding of one mint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAccount {
    pub address: Address,
    pub mint: Address,
    pub owner: Principal,
    pub amount: u64,
    pub state: AccountState,
}

impl TokenAccount {
    pub fn is_frozen(&self) -> bool {
        self.state == AccountState::Frozen
    }
}

/// Which authority `set_authority` replaces.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthorityKind {
    MintTokens,
    FreezeAccount,
}
