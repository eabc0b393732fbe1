//! Error types of the validation engine.
//!
//! The taxonomy follows the hard/soft split of the account-abstraction flow:
//! malformed input and permission violations are `Err` values (the host
//! wallet's outer try/catch converts them into the generic failure sentinel),
//! while operator-signature invalidity is *not* an error — it is reported
//! through the failure flag of the returned validation data so that
//! gas-estimation calls with placeholder signatures keep working.

use alloy_primitives::{Address, B256, U256};

/// Failures of a single validation call.
///
/// Every variant is a hard rejection: the operation is entirely refused and
/// no accounting state is committed.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    /// The extended signature payload does not ABI-decode.
    #[error("malformed signature payload")]
    MalformedPayload,

    /// The wallet calldata does not decode as a supported execution call.
    #[error("malformed wallet calldata")]
    MalformedCallData,

    /// The wallet calldata selector is not one of the supported execution
    /// entry points.
    #[error("unsupported wallet selector {0}")]
    UnsupportedSelector(alloy_primitives::FixedBytes<4>),

    /// A predicate tree or actual-argument blob is not valid RLP.
    #[error("malformed argument encoding")]
    MalformedArguments,

    /// A predicate node carries an unknown tag byte.
    #[error("invalid calldata prefix {0:#04x}")]
    InvalidPredicateTag(u8),

    /// A comparison leaf operand is not a 32-byte ABI word.
    #[error("comparison operand is {0} bytes, expected 32")]
    InvalidOperandWidth(usize),

    /// The allowed-argument and actual-argument lists have different lengths.
    #[error("argument length mismatch: {allowed} allowed, {actual} actual")]
    ArgumentLengthMismatch {
        /// Number of declared argument slots.
        allowed: usize,
        /// Number of actual argument slots.
        actual: usize,
    },

    /// The batched execution calldata's target, value and data arrays have
    /// different lengths.
    #[error("execution array mismatch: {targets} targets, {values} values, {datas} payloads")]
    ExecutionArrayMismatch {
        /// Number of call targets.
        targets: usize,
        /// Number of native values.
        values: usize,
        /// Number of calldata payloads.
        datas: usize,
    },

    /// A batched operation's sessions, proofs, argument blobs and calls are
    /// not positionally aligned.
    #[error("batch length mismatch: {calls} calls, {sessions} sessions, {proofs} proofs, {args} argument blobs")]
    BatchLengthMismatch {
        /// Number of decoded calls.
        calls: usize,
        /// Number of session descriptors.
        sessions: usize,
        /// Number of Merkle proofs.
        proofs: usize,
        /// Number of actual-argument blobs.
        args: usize,
    },

    /// A window timestamp does not fit the 48-bit packed representation.
    #[error("timestamp {0} exceeds the 48-bit window range")]
    TimestampOverflow(u64),

    /// No permission record exists for the `(wallet, operator)` pair.
    #[error("no permission for operator {0}")]
    NoPermission(Address),

    /// The session descriptor is not a leaf of the committed root.
    #[error("session not committed under root {0}")]
    SessionNotFound(B256),

    /// The call target does not match the session descriptor.
    #[error("target mismatch: session allows {allowed}, call targets {actual}")]
    TargetMismatch {
        /// Target the session permits.
        allowed: Address,
        /// Target of the actual call.
        actual: Address,
    },

    /// The call selector does not match the session descriptor.
    #[error("selector mismatch")]
    SelectorMismatch,

    /// The actual call arguments do not satisfy the session's predicate tree.
    #[error("arguments rejected by session predicate")]
    ArgumentMismatch,

    /// The operation's paymaster differs from the pinned one.
    #[error("paymaster mismatch: pinned {pinned}, declared {declared}")]
    PaymasterMismatch {
        /// Paymaster pinned in the permission.
        pinned: Address,
        /// Paymaster declared by the operation.
        declared: Address,
    },

    /// A token spend would push cumulative spending past the allowance.
    #[error("allowance exceeded for token {token}: spent {spent} + {amount} > {allowance}")]
    AllowanceExceeded {
        /// Token being spent.
        token: Address,
        /// Amount already spent.
        spent: U256,
        /// Amount the operation would add.
        amount: U256,
        /// Configured allowance cap.
        allowance: U256,
    },

    /// The worst-case fee exceeds the operator's remaining gas budget.
    #[error("gas budget exceeded: fee {fee} > remaining {remaining}")]
    GasBudgetExceeded {
        /// Worst-case fee of the operation.
        fee: U256,
        /// Remaining gas budget.
        remaining: u128,
    },

    /// The operator's remaining use count is zero.
    #[error("usage budget exhausted")]
    UsageExhausted,

    /// A session-level usage limit has been reached.
    #[error("session usage limit reached: {used} of {limit}")]
    SessionUsageExceeded {
        /// Uses already recorded for the session.
        used: u128,
        /// Configured per-session limit.
        limit: u128,
    },

    /// The owner permit is present but does not parse.
    #[error("malformed owner permit")]
    MalformedPermit,

    /// The validator named by the owner permit is not registered as sudo.
    #[error("permit signer {0} is not a sudo validator")]
    NotSudoValidator(Address),

    /// The owner permit signature does not verify against the current nonce.
    #[error("invalid owner permit signature")]
    InvalidPermit,

    /// The permit digest has been revoked by the wallet.
    #[error("signature hash revoked")]
    SignatureRevoked,
}

/// Shorthand result used throughout the crate.
pub type ValidationResult<T> = Result<T, ValidationError>;
