//! The extended-signature wire format.
//!
//! The wallet strips the 20-byte validator prefix from the operation's
//! signature field and hands this validator the remainder: one ABI-encoded
//! tuple carrying the Merkle proofs, the operator, the session descriptors,
//! the RLP actual-argument blobs, the operator signature, and optionally an
//! owner permit together with the candidate permission and allowance
//! configuration it installs.

use alloy_primitives::{aliases::U48, Address, Bytes, B256};
use alloy_sol_types::{sol, SolValue};

use crate::{
    OperatorPermission, Session, SpendingConfig, ValidationError, ValidationResult,
};

sol! {
    /// ABI image of a session descriptor; its keccak is the Merkle leaf.
    #[derive(Debug)]
    struct SessionAbi {
        address target;
        bytes4 selector;
        bytes allowedArguments;
        address paymaster;
        uint48 validUntil;
        uint48 validAfter;
        uint128 timesLimit;
    }

    /// ABI image of an operator permission; its keccak binds a permit.
    #[derive(Debug)]
    struct PermissionAbi {
        bytes32 sessionRoot;
        address paymaster;
        uint48 validUntil;
        uint48 validAfter;
        uint128 gasRemaining;
        uint128 timesRemaining;
    }

    /// One per-token spending cap installed alongside a permission.
    #[derive(Debug)]
    struct TokenAllowanceAbi {
        address token;
        uint256 allowance;
    }

    /// The tuple an owner signs to install a permission off-chain.
    #[derive(Debug)]
    struct PermitAbi {
        address wallet;
        address operator;
        bytes32 permissionHash;
        bytes32 spendingConfigHash;
        uint256 chainId;
        uint256 nonce;
    }

    /// The full extended-signature payload.
    #[derive(Debug)]
    struct PayloadAbi {
        bytes32[][] proofs;
        address operator;
        SessionAbi[] sessions;
        bytes[] rlpArguments;
        bytes operatorSignature;
        bytes ownerPermit;
        PermissionAbi permission;
        TokenAllowanceAbi[] allowances;
    }
}

/// Converts a 48-bit timestamp field, masking out-of-range input.
pub(crate) fn u48(value: u64) -> U48 {
    U48::from(value & crate::constants::TIMESTAMP_MAX)
}

/// An owner permit carried in the payload: the sudo validator that vouches
/// for it, its signature, and the state it installs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PermitUpdate {
    /// The sudo-class validator that must verify the permit signature.
    pub sudo_validator: Address,
    /// The owner's signature over the permit digest.
    pub signature: Bytes,
    /// The permission installed when the permit verifies.
    pub permission: OperatorPermission,
    /// The spending caps installed alongside the permission.
    pub allowances: SpendingConfig,
}

/// The decoded extended-signature payload.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SignaturePayload {
    /// One Merkle proof per call, positionally aligned.
    pub proofs: Vec<Vec<B256>>,
    /// The operator acting on the wallet.
    pub operator: Address,
    /// One session descriptor per call, positionally aligned.
    pub sessions: Vec<Session>,
    /// One RLP actual-argument blob per call, positionally aligned.
    pub rlp_arguments: Vec<Bytes>,
    /// The operator's signature over the bound operation hash.
    pub operator_signature: Bytes,
    /// The owner permit, when one is attached.
    pub permit: Option<PermitUpdate>,
}

/// Decodes the extended-signature payload.
///
/// An empty `ownerPermit` field means no permit is attached and the trailing
/// candidate permission/allowances are ignored. A non-empty permit must carry
/// the 20-byte sudo validator address followed by the owner signature.
pub fn decode_payload(data: &[u8]) -> ValidationResult<SignaturePayload> {
    let raw =
        PayloadAbi::abi_decode(data, true).map_err(|_| ValidationError::MalformedPayload)?;

    let permit = if raw.ownerPermit.is_empty() {
        None
    } else {
        if raw.ownerPermit.len() < Address::len_bytes() {
            return Err(ValidationError::MalformedPermit);
        }
        let (validator, signature) = raw.ownerPermit.split_at(Address::len_bytes());
        Some(PermitUpdate {
            sudo_validator: Address::from_slice(validator),
            signature: Bytes::copy_from_slice(signature),
            permission: OperatorPermission::from(&raw.permission),
            allowances: raw.allowances.iter().map(Into::into).collect(),
        })
    };

    Ok(SignaturePayload {
        proofs: raw.proofs,
        operator: raw.operator,
        sessions: raw.sessions.iter().map(Session::from).collect(),
        rlp_arguments: raw.rlpArguments,
        operator_signature: raw.operatorSignature,
        permit,
    })
}

/// Encodes an extended-signature payload.
///
/// This is the operator-side counterpart of [`decode_payload`], used by
/// off-chain tooling and tests to assemble the signature field.
pub fn encode_payload(payload: &SignaturePayload) -> Bytes {
    let (owner_permit, permission, allowances) = match &payload.permit {
        Some(permit) => {
            let mut blob = Vec::with_capacity(Address::len_bytes() + permit.signature.len());
            blob.extend_from_slice(permit.sudo_validator.as_slice());
            blob.extend_from_slice(&permit.signature);
            (
                Bytes::from(blob),
                PermissionAbi::from(&permit.permission),
                permit.allowances.iter().map(Into::into).collect(),
            )
        }
        None => (Bytes::new(), PermissionAbi::from(&OperatorPermission::default()), Vec::new()),
    };

    PayloadAbi {
        proofs: payload.proofs.clone(),
        operator: payload.operator,
        sessions: payload.sessions.iter().map(Into::into).collect(),
        rlpArguments: payload.rlp_arguments.clone(),
        operatorSignature: payload.operator_signature.clone(),
        ownerPermit: owner_permit,
        permission,
        allowances,
    }
    .abi_encode()
    .into()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Predicate, TokenAllowance};
    use alloy_primitives::{address, FixedBytes, U256};

    fn sample_session() -> Session {
        Session {
            target: address!("00000000000000000000000000000000000000aa"),
            selector: FixedBytes::from([0xa9, 0x05, 0x9c, 0xbb]),
            allowed_arguments: crate::encode_forest(&[Predicate::Any]),
            paymaster: Address::ZERO,
            valid_until: 0,
            valid_after: 0,
            times_limit: 0,
        }
    }

    #[test]
    fn payload_roundtrip_without_permit() {
        let payload = SignaturePayload {
            proofs: vec![vec![B256::repeat_byte(1), B256::repeat_byte(2)]],
            operator: address!("00000000000000000000000000000000000000bb"),
            sessions: vec![sample_session()],
            rlp_arguments: vec![crate::encode_actual_arguments(U256::ZERO, &[])],
            operator_signature: Bytes::from(vec![0u8; 65]),
            permit: None,
        };
        let encoded = encode_payload(&payload);
        assert_eq!(decode_payload(&encoded).unwrap(), payload);
    }

    #[test]
    fn payload_roundtrip_with_permit() {
        let payload = SignaturePayload {
            proofs: vec![Vec::new()],
            operator: address!("00000000000000000000000000000000000000bb"),
            sessions: vec![sample_session()],
            rlp_arguments: vec![crate::encode_actual_arguments(U256::ZERO, &[])],
            operator_signature: Bytes::from(vec![0u8; 65]),
            permit: Some(PermitUpdate {
                sudo_validator: address!("00000000000000000000000000000000000000cc"),
                signature: Bytes::from(vec![7u8; 65]),
                permission: OperatorPermission {
                    session_root: B256::repeat_byte(9),
                    ..Default::default()
                },
                allowances: vec![TokenAllowance {
                    token: address!("00000000000000000000000000000000000000dd"),
                    allowance: U256::from(1000),
                }],
            }),
        };
        let encoded = encode_payload(&payload);
        assert_eq!(decode_payload(&encoded).unwrap(), payload);
    }

    #[test]
    fn garbage_payload_is_malformed() {
        assert_eq!(decode_payload(&[0x01, 0x02]).unwrap_err(), ValidationError::MalformedPayload);
    }

    #[test]
    fn permit_shorter_than_an_address_is_malformed() {
        let raw = PayloadAbi {
            proofs: Vec::new(),
            operator: Address::ZERO,
            sessions: Vec::new(),
            rlpArguments: Vec::new(),
            operatorSignature: Bytes::new(),
            ownerPermit: Bytes::from(vec![0xab]),
            permission: PermissionAbi::from(&OperatorPermission::default()),
            allowances: Vec::new(),
        };
        let encoded = raw.abi_encode();
        assert_eq!(decode_payload(&encoded).unwrap_err(), ValidationError::MalformedPermit);
    }
}
