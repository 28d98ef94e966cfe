//! Authority capabilities for the membership mint.
//!
//! [`MintAuthority`] is sealed: the only implementations live in this crate
//! and none of them can be constructed from outside it. Holding a value that
//! implements it is the capability; the ledger still checks that the
//! presented identity matches the mint's recorded authority.

use crate::identity::Address;

mod sealed {
    pub trait Sealed {}
}

pub(crate) use sealed::Sealed;

/// Identity allowed to mint, burn, freeze or thaw on a mint.
pub trait MintAuthority: Sealed {
    /// Address the mint must name as its authority.
    fn authority(&self) -> Address;
}

/// The organization acting as authority over its own mint.
///
/// Only used between organization creation and controller initialization,
/// to hand both authorities over to the freeze controller.
pub(crate) struct OrganizationSigner {
    organization: Address,
}

impl OrganizationSigner {
    pub(crate) fn new(organization: Address) -> Self {
        Self { organization }
    }
}

impl Sealed for OrganizationSigner {}

impl MintAuthority for OrganizationSigner {
    fn authority(&self) -> Address {
        self.organization
    }
}
