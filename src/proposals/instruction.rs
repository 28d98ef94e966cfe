//! Privileged instructions a proposal can carry.
//!
//! Instructions are plain data. Building one does nothing; it only takes
//! effect when a proposal containing it is executed.

use crate::identity::{Address, Principal};
use crate::organization::{Organization, OrganizationSettings};
use crate::proposals::policy::PolicyConfig;
use crate::token::account_address;
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Instruction {
    /// Mint-and-freeze a membership token for `principal`.
    GrantMembership { principal: Principal },

    /// Thaw-burn-refreeze `principal`'s membership token.
    RevokeMembership { principal: Principal },

    /// Replace the organization's settings.
    UpdateSettings { settings: OrganizationSettings },

    /// Replace the organization's approval policy.
    UpdatePolicy { policy: PolicyConfig },
}

impl Instruction {
    pub fn grant(principal: Principal) -> Self {
        Self::GrantMembership { principal }
    }

    pub fn revoke(principal: Principal) -> Self {
        Self::RevokeMembership { principal }
    }

    /// Records this instruction touches besides the organization itself.
    pub fn accounts(&self, org: &Organization) -> Vec<Address> {
        match self {
            Self::GrantMembership { principal } | Self::RevokeMembership { principal } => {
                let mut keys = vec![org.mint, account_address(&org.mint, principal)];
                keys.extend(org.controller);
                keys
            }
            Self::UpdateSettings { .. } | Self::UpdatePolicy { .. } => Vec::new(),
        }
    }
}

impl Instruction {
    /// Operator-facing description, naming principals with `name`.
    pub fn describe(&self, name: impl Fn(&Address) -> String) -> String {
        match self {
            Self::GrantMembership { principal } => format!("grant membership to {}", name(principal)),
            Self::RevokeMembership { principal } => format!("revoke membership of {}", name(principal)),
            Self::UpdateSettings { settings } => format!("update settings to {:?}", settings),
            Self::UpdatePolicy { .. } => "update approval policy".to_string(),
        }
    }
}

impl fmt::Display for Instruction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.describe(Address::short))
    }
}
