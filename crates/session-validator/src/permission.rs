//! Operator permissions and spending limits.

use alloy_primitives::{keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::{
    constants::UNLIMITED,
    wire::{u48, PermissionAbi, TokenAllowanceAbi},
};

/// The standing grant a wallet gives one operator.
///
/// Created or overwritten by the wallet owner through the management surface,
/// or installed lazily by a validated off-chain permit. Budgets are consumed
/// on each validated use and are never implicitly reset; clearing a
/// permission means writing an empty record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperatorPermission {
    /// Merkle root over the operator's sessions.
    pub session_root: B256,
    /// Paymaster every operation must declare; zero means unpinned.
    pub paymaster: Address,
    /// Grant is invalid after this timestamp; `0` means unbounded.
    pub valid_until: u64,
    /// Grant is invalid before this timestamp.
    pub valid_after: u64,
    /// Remaining worst-case gas fee budget; [`UNLIMITED`] is never
    /// decremented.
    pub gas_remaining: u128,
    /// Remaining number of uses; [`UNLIMITED`] is never decremented.
    pub times_remaining: u128,
}

impl Default for OperatorPermission {
    fn default() -> Self {
        Self {
            session_root: B256::ZERO,
            paymaster: Address::ZERO,
            valid_until: 0,
            valid_after: 0,
            gas_remaining: UNLIMITED,
            times_remaining: UNLIMITED,
        }
    }
}

impl OperatorPermission {
    /// An unbounded grant over the given session root.
    pub fn unlimited(session_root: B256) -> Self {
        Self { session_root, ..Default::default() }
    }

    /// Whether this record grants anything at all.
    pub fn is_empty(&self) -> bool {
        self.session_root == B256::ZERO
    }

    /// Canonical hash of the permission, bound into permit digests.
    pub fn hash(&self) -> B256 {
        keccak256(PermissionAbi::from(self).abi_encode())
    }
}

impl From<&OperatorPermission> for PermissionAbi {
    fn from(permission: &OperatorPermission) -> Self {
        Self {
            sessionRoot: permission.session_root,
            paymaster: permission.paymaster,
            validUntil: u48(permission.valid_until),
            validAfter: u48(permission.valid_after),
            gasRemaining: permission.gas_remaining,
            timesRemaining: permission.times_remaining,
        }
    }
}

impl From<&PermissionAbi> for OperatorPermission {
    fn from(abi: &PermissionAbi) -> Self {
        Self {
            session_root: abi.sessionRoot,
            paymaster: abi.paymaster,
            valid_until: abi.validUntil.to::<u64>(),
            valid_after: abi.validAfter.to::<u64>(),
            gas_remaining: abi.gasRemaining,
            times_remaining: abi.timesRemaining,
        }
    }
}

/// A per-token spending cap and the amount consumed so far.
///
/// Absence of a record means the token is unrestricted; a record with a zero
/// allowance forbids any further spend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpendingLimit {
    /// Total amount the operator may move out of the wallet.
    pub allowance: U256,
    /// Amount already spent; invariant `spent <= allowance`.
    pub spent: U256,
}

impl SpendingLimit {
    /// A fresh cap with nothing spent.
    pub fn new(allowance: U256) -> Self {
        Self { allowance, spent: U256::ZERO }
    }

    /// The amount still spendable.
    pub fn remaining(&self) -> U256 {
        self.allowance.saturating_sub(self.spent)
    }
}

/// One token cap as carried in permits and batch management calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllowance {
    /// The token the cap applies to; the zero address is native value.
    pub token: Address,
    /// The cap.
    pub allowance: U256,
}

/// The spending configuration installed with a permission.
pub type SpendingConfig = Vec<TokenAllowance>;

/// Canonical hash of a spending configuration, bound into permit digests.
pub fn spending_config_hash(config: &SpendingConfig) -> B256 {
    let abi: Vec<TokenAllowanceAbi> = config.iter().map(Into::into).collect();
    keccak256(abi.abi_encode())
}

impl From<&TokenAllowance> for TokenAllowanceAbi {
    fn from(allowance: &TokenAllowance) -> Self {
        Self { token: allowance.token, allowance: allowance.allowance }
    }
}

impl From<&TokenAllowanceAbi> for TokenAllowance {
    fn from(abi: &TokenAllowanceAbi) -> Self {
        Self { token: abi.token, allowance: abi.allowance }
    }
}
