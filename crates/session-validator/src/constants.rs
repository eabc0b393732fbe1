//! Constants shared across the validation engine.

use alloy_primitives::{Address, U256};

/// Sentinel placed in the low 160 bits of the packed validation word when the
/// operator signature does not verify. Mirrors the canonical
/// `SIG_VALIDATION_FAILED = 1` of the account-abstraction entry point.
pub const SIG_VALIDATION_FAILED: U256 = U256::from_limbs([1, 0, 0, 0]);

/// Budget value treated as "unlimited". An unlimited budget is never
/// decremented, so repeated use cannot artificially exhaust it.
pub const UNLIMITED: u128 = u128::MAX;

/// Gas multiplier applied to the verification gas limit when the operation
/// declares a paymaster. Covers the paymaster's validation and post-op
/// overhead in the worst-case fee estimate.
pub const PAYMASTER_GAS_MULTIPLIER: u64 = 3;

/// Multiplier applied when no paymaster is present.
pub const NO_PAYMASTER_GAS_MULTIPLIER: u64 = 1;

/// Pseudo-token under which native value spending is accounted.
pub const NATIVE_TOKEN: Address = Address::ZERO;

/// Largest timestamp representable in the 48-bit window fields.
pub const TIMESTAMP_MAX: u64 = (1 << 48) - 1;
