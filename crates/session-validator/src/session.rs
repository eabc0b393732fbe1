//! Session descriptors and their Merkle commitment.

use alloy_primitives::{keccak256, Address, Bytes, FixedBytes, B256};
use alloy_sol_types::SolValue;
use serde::{Deserialize, Serialize};

use crate::{
    merkle,
    wire::{u48, SessionAbi},
};

/// One permitted call pattern delegated by a wallet to an operator.
///
/// A session is immutable once committed into a Merkle root: changing the
/// permission means publishing a new root, which invalidates every session
/// not re-included in the new tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Session {
    /// Address the operator may call.
    pub target: Address,
    /// Function selector the operator may call; zero for plain value
    /// transfers with empty calldata.
    pub selector: FixedBytes<4>,
    /// RLP-encoded predicate forest constraining the call arguments,
    /// including the reserved native-value slot.
    pub allowed_arguments: Bytes,
    /// Paymaster this session is pinned to; zero means unpinned.
    pub paymaster: Address,
    /// Session is invalid after this timestamp; `0` means unbounded.
    pub valid_until: u64,
    /// Session is invalid before this timestamp.
    pub valid_after: u64,
    /// Number of times the session may be used; `0` and `u128::MAX` both
    /// mean unlimited.
    pub times_limit: u128,
}

impl Session {
    /// The canonical Merkle leaf of this session.
    ///
    /// The hash covers the ABI encoding of all fields in declaration order;
    /// off-chain tree construction must use the same image.
    pub fn leaf(&self) -> B256 {
        keccak256(SessionAbi::from(self).abi_encode())
    }

    /// Verifies this session is committed under `root`.
    pub fn verify_membership(&self, proof: &[B256], root: B256) -> bool {
        merkle::verify_proof(proof, root, self.leaf())
    }

    /// Whether the per-session usage limit is in force.
    pub fn has_usage_limit(&self) -> bool {
        self.times_limit != 0 && self.times_limit != u128::MAX
    }
}

impl From<&Session> for SessionAbi {
    fn from(session: &Session) -> Self {
        Self {
            target: session.target,
            selector: session.selector,
            allowedArguments: session.allowed_arguments.clone(),
            paymaster: session.paymaster,
            validUntil: u48(session.valid_until),
            validAfter: u48(session.valid_after),
            timesLimit: session.times_limit,
        }
    }
}

impl From<&SessionAbi> for Session {
    fn from(abi: &SessionAbi) -> Self {
        Self {
            target: abi.target,
            selector: abi.selector,
            allowed_arguments: abi.allowedArguments.clone(),
            paymaster: abi.paymaster,
            valid_until: abi.validUntil.to::<u64>(),
            valid_after: abi.validAfter.to::<u64>(),
            times_limit: abi.timesLimit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{encode_forest, MerkleTree, Predicate};
    use alloy_primitives::{address, U256};

    fn session(n: u8) -> Session {
        Session {
            target: Address::repeat_byte(n),
            selector: FixedBytes::from([0xa9, 0x05, 0x9c, 0xbb]),
            allowed_arguments: encode_forest(&[
                Predicate::Any,
                Predicate::eq_u256(U256::from(n)),
            ]),
            ..Default::default()
        }
    }

    #[test]
    fn leaf_is_deterministic_and_field_sensitive() {
        let a = session(1);
        assert_eq!(a.leaf(), session(1).leaf());

        let mut b = session(1);
        b.times_limit = 5;
        assert_ne!(a.leaf(), b.leaf());

        let mut c = session(1);
        c.target = address!("00000000000000000000000000000000000000ff");
        assert_ne!(a.leaf(), c.leaf());
    }

    #[test]
    fn membership_follows_the_committed_tree() {
        let sessions: Vec<Session> = (1..=4).map(session).collect();
        let tree = MerkleTree::new(sessions.iter().map(Session::leaf).collect());

        for (i, s) in sessions.iter().enumerate() {
            assert!(s.verify_membership(&tree.proof(i).unwrap(), tree.root()));
        }

        // a session absent from the tree fails against the same root
        assert!(!session(9).verify_membership(&tree.proof(0).unwrap(), tree.root()));
    }

    #[test]
    fn usage_limit_sentinels() {
        let mut s = session(1);
        assert!(!s.has_usage_limit());
        s.times_limit = u128::MAX;
        assert!(!s.has_usage_limit());
        s.times_limit = 3;
        assert!(s.has_usage_limit());
    }
}
