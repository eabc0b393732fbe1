//! Off-chain owner permits.
//!
//! A permit lets the wallet owner install or update an operator's permission
//! and spending configuration without a prior on-chain management call: the
//! owner signs a digest binding the exact candidate state to the wallet, the
//! operator, the chain and a monotonically increasing nonce, and the first
//! operation the operator submits carries that signature. Verification is
//! delegated to a sudo-class validator registered on the wallet, EIP-1271
//! style.

use alloy_primitives::{eip191_hash_message, keccak256, Address, B256, U256};
use alloy_sol_types::SolValue;
use auto_impl::auto_impl;

use crate::{
    spending_config_hash, wire::PermitAbi, OperatorPermission, SpendingConfig,
};

/// Signature verification capability supplied by the host wallet.
///
/// The permit path calls this for the sudo validator named in the payload;
/// a typical implementation forwards to that validator's `isValidSignature`.
#[auto_impl(&, Box, Arc)]
pub trait SudoValidator {
    /// Whether `signature` is a valid owner signature over `digest` for
    /// `wallet`, according to the sudo validator at `validator`.
    fn is_valid_signature(
        &self,
        validator: Address,
        wallet: Address,
        digest: B256,
        signature: &[u8],
    ) -> bool;
}

/// Computes the digest an owner signs to authorize a permission update.
///
/// Covers `(wallet, operator, permissionHash, spendingConfigHash, chainId,
/// nonce)`; any replay with a stale nonce or altered candidate state yields a
/// different digest and fails verification.
pub fn permit_digest(
    chain_id: u64,
    wallet: Address,
    operator: Address,
    permission: &OperatorPermission,
    allowances: &SpendingConfig,
    nonce: u64,
) -> B256 {
    let encoded = PermitAbi {
        wallet,
        operator,
        permissionHash: permission.hash(),
        spendingConfigHash: spending_config_hash(allowances),
        chainId: U256::from(chain_id),
        nonce: U256::from(nonce),
    }
    .abi_encode();
    eip191_hash_message(keccak256(encoded))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::TokenAllowance;

    fn permission() -> OperatorPermission {
        OperatorPermission::unlimited(B256::repeat_byte(4))
    }

    #[test]
    fn digest_changes_with_nonce() {
        let wallet = Address::repeat_byte(1);
        let operator = Address::repeat_byte(2);
        let config = Vec::new();
        let a = permit_digest(1, wallet, operator, &permission(), &config, 0);
        let b = permit_digest(1, wallet, operator, &permission(), &config, 1);
        assert_ne!(a, b);
    }

    #[test]
    fn digest_binds_chain_wallet_and_state() {
        let wallet = Address::repeat_byte(1);
        let operator = Address::repeat_byte(2);
        let config = vec![TokenAllowance { token: Address::repeat_byte(3), allowance: U256::from(10) }];
        let base = permit_digest(1, wallet, operator, &permission(), &config, 0);

        assert_ne!(base, permit_digest(2, wallet, operator, &permission(), &config, 0));
        assert_ne!(base, permit_digest(1, Address::repeat_byte(9), operator, &permission(), &config, 0));

        let mut other_permission = permission();
        other_permission.gas_remaining = 7;
        assert_ne!(base, permit_digest(1, wallet, operator, &other_permission, &config, 0));

        assert_ne!(base, permit_digest(1, wallet, operator, &permission(), &Vec::new(), 0));
    }
}
