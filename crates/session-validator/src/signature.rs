//! Operator signature digests and ECDSA recovery.

use alloy_primitives::{eip191_hash_message, keccak256, Address, B256};
use k256::ecdsa::{RecoveryId, Signature, VerifyingKey};

/// Computes the digest an operator signs for one operation.
///
/// The operation hash is bound to the validator's own address before the
/// EIP-191 prefix so that a signature for one validator instance cannot be
/// replayed against another.
pub fn operator_digest(op_hash: B256, validator: Address) -> B256 {
    let mut buf = [0u8; 52];
    buf[..32].copy_from_slice(op_hash.as_slice());
    buf[32..].copy_from_slice(validator.as_slice());
    eip191_hash_message(keccak256(buf))
}

/// Recovers the Ethereum address that produced a 65-byte `r || s || v`
/// signature over `digest`.
///
/// Accepts `v` in `{0, 1, 27, 28}`. Returns `None` for any malformed or
/// unrecoverable signature; operator-signature problems are soft failures,
/// never hard errors.
pub fn recover_signer(digest: B256, signature: &[u8]) -> Option<Address> {
    let (rs, v) = match signature {
        [rs @ .., v] if rs.len() == 64 => (rs, *v),
        _ => return None,
    };
    let recovery_id = RecoveryId::try_from(match v {
        0 | 1 => v,
        27 | 28 => v - 27,
        _ => return None,
    })
    .ok()?;

    let signature = Signature::from_slice(rs).ok()?;
    let key = VerifyingKey::recover_from_prehash(digest.as_slice(), &signature, recovery_id).ok()?;

    // address = keccak256(uncompressed pubkey minus the 0x04 prefix)[12..]
    let point = key.to_encoded_point(false);
    let hash = keccak256(&point.as_bytes()[1..]);
    Some(Address::from_slice(&hash[12..]))
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use k256::ecdsa::SigningKey;

    /// Signs a digest with the given key, returning the 65-byte wire form.
    pub(crate) fn sign_digest(key: &SigningKey, digest: B256) -> Vec<u8> {
        let (signature, recovery_id) =
            key.sign_prehash_recoverable(digest.as_slice()).expect("signing cannot fail");
        let mut out = signature.to_bytes().to_vec();
        out.push(recovery_id.to_byte() + 27);
        out
    }

    /// The Ethereum address of a signing key.
    pub(crate) fn key_address(key: &SigningKey) -> Address {
        let point = key.verifying_key().to_encoded_point(false);
        let hash = keccak256(&point.as_bytes()[1..]);
        Address::from_slice(&hash[12..])
    }

    pub(crate) fn test_key(seed: u8) -> SigningKey {
        let mut bytes = [0u8; 32];
        bytes[31] = seed;
        SigningKey::from_slice(&bytes).expect("nonzero scalar")
    }

    #[test]
    fn recovers_the_signer() {
        let key = test_key(1);
        let digest = operator_digest(B256::repeat_byte(7), Address::repeat_byte(9));
        let signature = sign_digest(&key, digest);
        assert_eq!(recover_signer(digest, &signature), Some(key_address(&key)));
    }

    #[test]
    fn accepts_zero_based_recovery_id() {
        let key = test_key(2);
        let digest = operator_digest(B256::repeat_byte(1), Address::repeat_byte(2));
        let mut signature = sign_digest(&key, digest);
        let v = signature.pop().unwrap();
        signature.push(v - 27);
        assert_eq!(recover_signer(digest, &signature), Some(key_address(&key)));
    }

    #[test]
    fn rejects_malformed_signatures() {
        let digest = B256::repeat_byte(3);
        assert_eq!(recover_signer(digest, &[0u8; 64]), None);
        assert_eq!(recover_signer(digest, &[0u8; 66]), None);
        let mut bad_v = vec![1u8; 64];
        bad_v.push(9);
        assert_eq!(recover_signer(digest, &bad_v), None);
    }

    #[test]
    fn digest_is_validator_specific() {
        let op_hash = B256::repeat_byte(5);
        assert_ne!(
            operator_digest(op_hash, Address::repeat_byte(1)),
            operator_digest(op_hash, Address::repeat_byte(2)),
        );
    }
}
