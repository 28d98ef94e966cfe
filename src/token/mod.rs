//! Token-ledger collaborator.
//!
//! Minimal fungible-token primitives (create account, mint, burn, freeze,
//! thaw, transfer, set authority) on a named mint, gated by authority
//! checks. Membership is modelled on top of these in `membership`.

pub mod authority;
pub mod ledger;
pub mod state;

pub use authority::MintAuthority;
pub use ledger::{account_address, TokenLedger};
pub use state::{AccountState, AuthorityKind, Mint, TokenAccount};

use crate::identity::Address;
use crate::store::StoreError;

/// Result type for token operations.
pub type TokenResult<T> = Result<T, TokenError>;

/// Token ledger errors.
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("Mint {0} not found")]
    MintNotFound(Address),

    #[error("Mint {0} already exists")]
    MintExists(Address),

    #[error("Token account {0} not found")]
    AccountNotFound(Address),

    #[error("Token account {0} already exists")]
    AccountExists(Address),

    #[error("Token account {account} belongs to mint {actual}, not {expected}")]
    MintMismatch {
        account: Address,
        expected: Address,
        actual: Address,
    },

    #[error("Authority {presented} does not match mint authority {expected:?}")]
    AuthorityMismatch {
        expected: Option<Address>,
        presented: Address,
    },

    #[error("Signer {signer} does not own token account {account}")]
    OwnerMismatch { account: Address, signer: Address },

    #[error("Token account {0} is frozen")]
    AccountFrozen(Address),

    #[error("Token account {0} is not frozen")]
    AccountNotFrozen(Address),

    #[error("Insufficient funds: available {available}, requested {requested}")]
    InsufficientFunds { available: u64, requested: u64 },

    #[error("Amount overflow on mint {0}")]
    Overflow(Address),

    #[error("Amount must be greater than zero")]
    ZeroAmount,

    #[error(transparent)]
    Store(#[from] StoreError),
}
