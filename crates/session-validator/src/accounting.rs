//! Usage and allowance accounting.
//!
//! Budgets are checked against the *worst case* of an operation before any
//! call executes: the aggregate fee the operation could burn, one unit of the
//! operator's use count, and every token amount the batch could move out of
//! the wallet. Checks produce a staged [`PendingCharges`] record; the caller
//! commits it only when the whole validation succeeds, so a rejected
//! operation leaves every stored budget untouched.

use alloy_primitives::{Address, U256};
use alloy_sol_types::{sol, SolCall};

use crate::{
    constants::{NATIVE_TOKEN, NO_PAYMASTER_GAS_MULTIPLIER, PAYMASTER_GAS_MULTIPLIER, UNLIMITED},
    Execution, OperatorPermission, SpendingLimit, UserOperation, ValidationError,
    ValidationResult,
};

sol! {
    /// The ERC-20 surface recognized by spending accounting.
    interface IERC20 {
        function transfer(address to, uint256 amount) external returns (bool);
        function transferFrom(address from, address to, uint256 amount) external returns (bool);
        function approve(address spender, uint256 amount) external returns (bool);
        function increaseAllowance(address spender, uint256 addedValue) external returns (bool);
    }
}

/// The budget consumption of one operation, staged before commit.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingCharges {
    /// Worst-case fee to subtract from the gas budget; zero when the budget
    /// is unlimited.
    pub gas: u128,
    /// Whether to consume one unit of the use count.
    pub times: bool,
    /// Aggregated token outflows, one entry per token.
    pub spends: Vec<(Address, U256)>,
}

/// Computes the worst-case fee of an operation.
///
/// `(call_gas_limit + verification_gas_limit * m + pre_verification_gas) *
/// max_fee_per_gas`, where `m` is [`PAYMASTER_GAS_MULTIPLIER`] when a
/// paymaster is declared (covering its validation and post-op overhead) and
/// [`NO_PAYMASTER_GAS_MULTIPLIER`] otherwise.
pub fn worst_case_fee(op: &UserOperation) -> U256 {
    let multiplier = if op.paymaster().is_some() {
        PAYMASTER_GAS_MULTIPLIER
    } else {
        NO_PAYMASTER_GAS_MULTIPLIER
    };
    op.call_gas_limit
        .saturating_add(op.verification_gas_limit.saturating_mul(U256::from(multiplier)))
        .saturating_add(op.pre_verification_gas)
        .saturating_mul(op.max_fee_per_gas)
}

/// Extracts the token outflows of one call.
///
/// Native value is accounted under [`NATIVE_TOKEN`]. ERC-20 calls are
/// recognized by selector and only counted when they move value *out* of the
/// wallet: a `transfer` to the wallet itself or a `transferFrom` pulling from
/// elsewhere is free. A recognized selector with an undecodable body is a
/// hard error, never silently ignored.
pub fn call_outflows(wallet: Address, call: &Execution) -> ValidationResult<Vec<(Address, U256)>> {
    let mut outflows = Vec::new();
    if call.value > U256::ZERO {
        outflows.push((NATIVE_TOKEN, call.value));
    }
    if call.data.len() < 4 {
        return Ok(outflows);
    }

    let token = call.to;
    let selector: [u8; 4] = call.data[..4].try_into().expect("length checked");
    let amount = match selector {
        IERC20::transferCall::SELECTOR => {
            let args = IERC20::transferCall::abi_decode(&call.data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            (args.to != wallet).then_some(args.amount)
        }
        IERC20::transferFromCall::SELECTOR => {
            let args = IERC20::transferFromCall::abi_decode(&call.data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            (args.from == wallet).then_some(args.amount)
        }
        IERC20::approveCall::SELECTOR => {
            let args = IERC20::approveCall::abi_decode(&call.data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            (args.spender != wallet).then_some(args.amount)
        }
        IERC20::increaseAllowanceCall::SELECTOR => {
            let args = IERC20::increaseAllowanceCall::abi_decode(&call.data, true)
                .map_err(|_| ValidationError::MalformedCallData)?;
            (args.spender != wallet).then_some(args.addedValue)
        }
        _ => None,
    };
    if let Some(amount) = amount {
        if amount > U256::ZERO {
            outflows.push((token, amount));
        }
    }
    Ok(outflows)
}

/// Checks an operation's aggregate cost against the operator's budgets and
/// stages the resulting charges.
///
/// `limit_of` resolves the effective spending limit for a token — the stored
/// record, or the candidate configuration when a permit is being installed
/// in the same operation. A token with no limit is unrestricted; a limit
/// with a zero allowance forbids any spend. The gas comparison is inclusive:
/// a fee exactly equal to the remaining budget passes.
pub fn stage_charges(
    wallet: Address,
    op: &UserOperation,
    calls: &[Execution],
    permission: &OperatorPermission,
    limit_of: impl Fn(Address) -> Option<SpendingLimit>,
) -> ValidationResult<PendingCharges> {
    let mut charges = PendingCharges::default();

    // gas budget
    let fee = worst_case_fee(op);
    if permission.gas_remaining != UNLIMITED {
        if fee > U256::from(permission.gas_remaining) {
            return Err(ValidationError::GasBudgetExceeded {
                fee,
                remaining: permission.gas_remaining,
            });
        }
        charges.gas = fee.to::<u128>();
    }

    // use count
    if permission.times_remaining == 0 {
        return Err(ValidationError::UsageExhausted);
    }
    charges.times = permission.times_remaining != UNLIMITED;

    // token outflows, aggregated across the batch
    for call in calls {
        for (token, amount) in call_outflows(wallet, call)? {
            match charges.spends.iter_mut().find(|(t, _)| *t == token) {
                Some((_, total)) => *total = total.saturating_add(amount),
                None => charges.spends.push((token, amount)),
            }
        }
    }
    for (token, amount) in &charges.spends {
        if let Some(limit) = limit_of(*token) {
            if limit.spent.saturating_add(*amount) > limit.allowance {
                return Err(ValidationError::AllowanceExceeded {
                    token: *token,
                    spent: limit.spent,
                    amount: *amount,
                    allowance: limit.allowance,
                });
            }
        }
    }

    Ok(charges)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{address, Bytes};
    use alloy_sol_types::SolCall;

    const WALLET: Address = address!("0000000000000000000000000000000000001111");
    const TOKEN: Address = address!("0000000000000000000000000000000000002222");
    const OTHER: Address = address!("0000000000000000000000000000000000003333");

    fn transfer_call(to: Address, amount: u64) -> Execution {
        Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: IERC20::transferCall { to, amount: U256::from(amount) }.abi_encode().into(),
        }
    }

    fn op_with_gas(call: u64, verification: u64, pre: u64, fee: u64, paymaster: bool) -> UserOperation {
        UserOperation {
            sender: WALLET,
            call_gas_limit: U256::from(call),
            verification_gas_limit: U256::from(verification),
            pre_verification_gas: U256::from(pre),
            max_fee_per_gas: U256::from(fee),
            paymaster_and_data: if paymaster {
                Bytes::copy_from_slice(OTHER.as_slice())
            } else {
                Bytes::new()
            },
            ..Default::default()
        }
    }

    #[test]
    fn fee_multiplier_depends_on_paymaster() {
        assert_eq!(worst_case_fee(&op_with_gas(100, 50, 10, 2, false)), U256::from(320));
        assert_eq!(worst_case_fee(&op_with_gas(100, 50, 10, 2, true)), U256::from(520));
    }

    #[test]
    fn outgoing_transfer_is_counted() {
        let outflows = call_outflows(WALLET, &transfer_call(OTHER, 100)).unwrap();
        assert_eq!(outflows, vec![(TOKEN, U256::from(100))]);
    }

    #[test]
    fn transfer_back_to_wallet_is_free() {
        assert!(call_outflows(WALLET, &transfer_call(WALLET, 100)).unwrap().is_empty());
    }

    #[test]
    fn transfer_from_only_counts_wallet_sourced_pulls() {
        let pull_from_wallet = Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: IERC20::transferFromCall {
                from: WALLET,
                to: OTHER,
                amount: U256::from(5),
            }
            .abi_encode()
            .into(),
        };
        assert_eq!(call_outflows(WALLET, &pull_from_wallet).unwrap(), vec![(TOKEN, U256::from(5))]);

        let pull_from_other = Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: IERC20::transferFromCall {
                from: OTHER,
                to: WALLET,
                amount: U256::from(5),
            }
            .abi_encode()
            .into(),
        };
        assert!(call_outflows(WALLET, &pull_from_other).unwrap().is_empty());
    }

    #[test]
    fn approvals_count_as_outflows() {
        let approve = Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: IERC20::approveCall { spender: OTHER, amount: U256::from(9) }
                .abi_encode()
                .into(),
        };
        assert_eq!(call_outflows(WALLET, &approve).unwrap(), vec![(TOKEN, U256::from(9))]);
    }

    #[test]
    fn native_value_is_accounted_under_the_zero_token() {
        let call = Execution { to: OTHER, value: U256::from(42), data: Bytes::new() };
        assert_eq!(call_outflows(WALLET, &call).unwrap(), vec![(NATIVE_TOKEN, U256::from(42))]);
    }

    #[test]
    fn recognized_selector_with_garbage_body_is_malformed() {
        let call = Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: Bytes::from(IERC20::transferCall::SELECTOR.to_vec()),
        };
        assert_eq!(
            call_outflows(WALLET, &call).unwrap_err(),
            ValidationError::MalformedCallData
        );
    }

    #[test]
    fn unrecognized_selectors_are_ignored() {
        let call = Execution {
            to: TOKEN,
            value: U256::ZERO,
            data: Bytes::from(vec![0xde, 0xad, 0xbe, 0xef, 0x00]),
        };
        assert!(call_outflows(WALLET, &call).unwrap().is_empty());
    }

    #[test]
    fn gas_boundary_is_inclusive() {
        let op = op_with_gas(100, 50, 10, 2, false); // fee = 320
        let mut permission = OperatorPermission { gas_remaining: 320, ..Default::default() };
        let charges = stage_charges(WALLET, &op, &[], &permission, |_| None).unwrap();
        assert_eq!(charges.gas, 320);

        permission.gas_remaining = 319;
        let err = stage_charges(WALLET, &op, &[], &permission, |_| None).unwrap_err();
        assert!(matches!(err, ValidationError::GasBudgetExceeded { remaining: 319, .. }));
    }

    #[test]
    fn unlimited_budgets_are_never_charged() {
        let op = op_with_gas(100, 50, 10, 2, false);
        let permission = OperatorPermission::default();
        let charges = stage_charges(WALLET, &op, &[], &permission, |_| None).unwrap();
        assert_eq!(charges.gas, 0);
        assert!(!charges.times);
    }

    #[test]
    fn exhausted_use_count_fails() {
        let op = op_with_gas(0, 0, 0, 0, false);
        let permission = OperatorPermission { times_remaining: 0, ..Default::default() };
        assert_eq!(
            stage_charges(WALLET, &op, &[], &permission, |_| None).unwrap_err(),
            ValidationError::UsageExhausted
        );
    }

    #[test]
    fn batch_spends_aggregate_per_token() {
        let op = op_with_gas(0, 0, 0, 0, false);
        let permission = OperatorPermission::default();
        let calls = [transfer_call(OTHER, 60), transfer_call(OTHER, 50)];

        // 110 aggregated against a 100 cap fails even though each call fits
        let err = stage_charges(WALLET, &op, &calls, &permission, |token| {
            (token == TOKEN).then(|| SpendingLimit::new(U256::from(100)))
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::AllowanceExceeded { .. }));

        let charges = stage_charges(WALLET, &op, &calls, &permission, |token| {
            (token == TOKEN).then(|| SpendingLimit::new(U256::from(110)))
        })
        .unwrap();
        assert_eq!(charges.spends, vec![(TOKEN, U256::from(110))]);
    }

    #[test]
    fn unset_token_limit_is_unrestricted_but_zero_allowance_forbids() {
        let op = op_with_gas(0, 0, 0, 0, false);
        let permission = OperatorPermission::default();
        let calls = [transfer_call(OTHER, 1)];

        assert!(stage_charges(WALLET, &op, &calls, &permission, |_| None).is_ok());

        let err = stage_charges(WALLET, &op, &calls, &permission, |_| {
            Some(SpendingLimit::new(U256::ZERO))
        })
        .unwrap_err();
        assert!(matches!(err, ValidationError::AllowanceExceeded { .. }));
    }
}
