//! Core operation and validation-data types.

use alloy_primitives::{Address, Bytes, B256, U256};
use alloy_sol_types::{sol, SolCall};
use serde::{Deserialize, Serialize};

use crate::{
    constants::{SIG_VALIDATION_FAILED, TIMESTAMP_MAX},
    ValidationError, ValidationResult,
};

sol! {
    /// Single-call execution entry point of the host wallet.
    function execute(address to, uint256 value, bytes calldata data);

    /// Batched execution entry point of the host wallet. The three arrays
    /// must have equal lengths and are consumed positionally.
    function executeBatch(address[] calldata to, uint256[] calldata value, bytes[] calldata data);
}

/// An ERC-4337 user operation as handed to a validator by the wallet's
/// `validateUserOp` path (v0.6 field layout).
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UserOperation {
    /// The wallet executing the operation.
    pub sender: Address,
    /// Anti-replay nonce managed by the entry point.
    pub nonce: U256,
    /// Calldata executed by the wallet when validation passes.
    pub call_data: Bytes,
    /// Gas limit for the execution phase.
    pub call_gas_limit: U256,
    /// Gas limit for the validation phase.
    pub verification_gas_limit: U256,
    /// Gas paid to the bundler ahead of verification.
    pub pre_verification_gas: U256,
    /// Maximum fee per gas the operation is willing to pay.
    pub max_fee_per_gas: U256,
    /// Maximum priority fee per gas.
    pub max_priority_fee_per_gas: U256,
    /// Paymaster address followed by opaque paymaster data, or empty.
    pub paymaster_and_data: Bytes,
    /// Extended signature payload (validator prefix already stripped).
    pub signature: Bytes,
}

impl UserOperation {
    /// Returns the paymaster declared by the operation, if any.
    ///
    /// The paymaster is the leading 20 bytes of `paymaster_and_data`.
    pub fn paymaster(&self) -> Option<Address> {
        (self.paymaster_and_data.len() >= Address::len_bytes())
            .then(|| Address::from_slice(&self.paymaster_and_data[..Address::len_bytes()]))
    }
}

/// One `(to, value, data)` call decoded from the wallet calldata.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Execution {
    /// Call target.
    pub to: Address,
    /// Native value forwarded with the call.
    pub value: U256,
    /// Call data.
    pub data: Bytes,
}

impl Execution {
    /// Returns the 4-byte function selector of the call.
    ///
    /// An empty-data call (plain value transfer) has the zero selector; data
    /// shorter than a selector is malformed.
    pub fn selector(&self) -> ValidationResult<alloy_primitives::FixedBytes<4>> {
        if self.data.is_empty() {
            return Ok(alloy_primitives::FixedBytes::ZERO);
        }
        if self.data.len() < 4 {
            return Err(ValidationError::MalformedCallData);
        }
        Ok(alloy_primitives::FixedBytes::from_slice(&self.data[..4]))
    }
}

/// Decodes the wallet-level calldata into the list of calls it performs.
///
/// Only the fixed execution entry points are authorized by this validator;
/// any other selector fails with [`ValidationError::UnsupportedSelector`].
pub fn decode_wallet_calls(call_data: &[u8]) -> ValidationResult<Vec<Execution>> {
    if call_data.len() < 4 {
        return Err(ValidationError::MalformedCallData);
    }
    let selector: [u8; 4] = call_data[..4].try_into().expect("length checked");

    match selector {
        executeCall::SELECTOR => {
            let call = executeCall::abi_decode(call_data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            Ok(vec![Execution { to: call.to, value: call.value, data: call.data }])
        }
        executeBatchCall::SELECTOR => {
            let call = executeBatchCall::abi_decode(call_data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            if call.to.len() != call.value.len() || call.to.len() != call.data.len() {
                return Err(ValidationError::ExecutionArrayMismatch {
                    targets: call.to.len(),
                    values: call.value.len(),
                    datas: call.data.len(),
                });
            }
            Ok(call
                .to
                .into_iter()
                .zip(call.value)
                .zip(call.data)
                .map(|((to, value), data)| Execution { to, value, data })
                .collect())
        }
        other => Err(ValidationError::UnsupportedSelector(other.into())),
    }
}

/// Outcome of a validation call, operated on as a struct internally and
/// packed into the canonical `uint256` encoding only at the wallet boundary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ValidationData {
    /// Whether operator-signature verification failed.
    pub sig_failed: bool,
    /// Operation is invalid after this timestamp; `0` means unbounded.
    pub valid_until: u64,
    /// Operation is invalid before this timestamp.
    pub valid_after: u64,
}

impl ValidationData {
    /// A successful validation with the given validity window.
    pub fn success(valid_until: u64, valid_after: u64) -> Self {
        Self { sig_failed: false, valid_until, valid_after }
    }

    /// The soft signature-failure sentinel with an empty window.
    pub fn failure() -> Self {
        Self { sig_failed: true, valid_until: 0, valid_after: 0 }
    }

    /// Packs into the canonical validation word: low 160 bits failure flag,
    /// next 48 bits `valid_until`, next 48 bits `valid_after`.
    pub fn pack(&self) -> U256 {
        let flag = if self.sig_failed { SIG_VALIDATION_FAILED } else { U256::ZERO };
        flag | (U256::from(self.valid_until & TIMESTAMP_MAX) << 160) |
            (U256::from(self.valid_after & TIMESTAMP_MAX) << 208)
    }

    /// Unpacks a validation word produced by [`Self::pack`].
    pub fn unpack(word: U256) -> Self {
        let mask160 = (U256::from(1) << 160) - U256::from(1);
        Self {
            sig_failed: word & mask160 != U256::ZERO,
            valid_until: ((word >> 160usize) & U256::from(TIMESTAMP_MAX)).to::<u64>(),
            valid_after: ((word >> 208usize) & U256::from(TIMESTAMP_MAX)).to::<u64>(),
        }
    }
}

/// Intersects two validity windows.
///
/// `valid_until == 0` is treated as unbounded; the intersection keeps the
/// tighter bound on each side.
pub(crate) fn intersect_window(
    (until_a, after_a): (u64, u64),
    (until_b, after_b): (u64, u64),
) -> (u64, u64) {
    let until = match (until_a, until_b) {
        (0, b) => b,
        (a, 0) => a,
        (a, b) => a.min(b),
    };
    (until, after_a.max(after_b))
}

/// Computes the wallet operation hash the entry point signs over.
///
/// Host infrastructure normally provides this hash; the helper exists so
/// tests and off-chain tooling can derive it from the same fields.
pub fn user_op_hash(op: &UserOperation, entry_point: Address, chain_id: u64) -> B256 {
    use alloy_primitives::keccak256;
    use alloy_sol_types::SolValue;

    let packed = (
        op.sender,
        op.nonce,
        keccak256(&op.call_data),
        op.call_gas_limit,
        op.verification_gas_limit,
        op.pre_verification_gas,
        op.max_fee_per_gas,
        op.max_priority_fee_per_gas,
        keccak256(&op.paymaster_and_data),
    )
        .abi_encode();
    keccak256((keccak256(packed), entry_point, U256::from(chain_id)).abi_encode())
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::address;
    use alloy_sol_types::SolCall;

    #[test]
    fn pack_unpack_roundtrip() {
        let data = ValidationData::success(1_700_000_000, 1_600_000_000);
        assert_eq!(ValidationData::unpack(data.pack()), data);

        let failed = ValidationData::failure();
        let word = failed.pack();
        assert_eq!(word, U256::from(1));
        assert!(ValidationData::unpack(word).sig_failed);
    }

    #[test]
    fn pack_is_zero_for_unbounded_success() {
        assert_eq!(ValidationData::success(0, 0).pack(), U256::ZERO);
    }

    #[test]
    fn window_intersection_prefers_tighter_bounds() {
        assert_eq!(intersect_window((0, 0), (100, 5)), (100, 5));
        assert_eq!(intersect_window((200, 10), (100, 5)), (100, 10));
        assert_eq!(intersect_window((50, 0), (0, 80)), (50, 80));
    }

    #[test]
    fn decode_single_execute() {
        let to = address!("00000000000000000000000000000000000000aa");
        let data = executeCall { to, value: U256::from(7), data: Bytes::from(vec![1, 2, 3, 4]) }
            .abi_encode();
        let calls = decode_wallet_calls(&data).unwrap();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].to, to);
        assert_eq!(calls[0].value, U256::from(7));
    }

    #[test]
    fn batch_arrays_must_share_a_length() {
        let data = executeBatchCall {
            to: vec![Address::ZERO, Address::ZERO],
            value: vec![U256::ZERO],
            data: vec![Bytes::new(), Bytes::new()],
        }
        .abi_encode();
        let err = decode_wallet_calls(&data).unwrap_err();
        assert_eq!(
            err,
            ValidationError::ExecutionArrayMismatch { targets: 2, values: 1, datas: 2 }
        );
    }

    #[test]
    fn reject_unknown_selector() {
        let err = decode_wallet_calls(&[0xde, 0xad, 0xbe, 0xef]).unwrap_err();
        assert!(matches!(err, ValidationError::UnsupportedSelector(_)));
    }

    #[test]
    fn selector_of_plain_transfer_is_zero() {
        let call = Execution {
            to: Address::ZERO,
            value: U256::from(1),
            data: Bytes::new(),
        };
        assert_eq!(call.selector().unwrap(), alloy_primitives::FixedBytes::ZERO);
    }
}
