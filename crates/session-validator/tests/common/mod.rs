//! Shared signing fixtures for integration tests.

use alloy_primitives::{keccak256, Address, B256};
use k256::ecdsa::SigningKey;

/// A deterministic signing key derived from a seed byte.
pub fn test_key(seed: u8) -> SigningKey {
    let mut bytes = [0u8; 32];
    bytes[31] = seed;
    SigningKey::from_slice(&bytes).expect("nonzero scalar")
}

/// The Ethereum address of a signing key.
pub fn key_address(key: &SigningKey) -> Address {
    let point = key.verifying_key().to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Address::from_slice(&hash[12..])
}

/// Signs a digest, returning the 65-byte `r || s || v` wire form.
pub fn sign_digest(key: &SigningKey, digest: B256) -> Vec<u8> {
    let (signature, recovery_id) =
        key.sign_prehash_recoverable(digest.as_slice()).expect("signing cannot fail");
    let mut out = signature.to_bytes().to_vec();
    out.push(recovery_id.to_byte() + 27);
    out
}
