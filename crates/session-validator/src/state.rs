//! Persisted validator state.
//!
//! Contract storage becomes four namespaced tables keyed by composite
//! tuples; the wallet address in every key provides the per-wallet isolation
//! the wallet's own storage root gives on-chain. Mutations arrive either
//! through the owner-authorized management surface (the host wallet enforces
//! that only its sudo path reaches these calls) or through a committed
//! [`PendingUpdate`] at the end of a successful validation.

use std::collections::{HashMap, HashSet};

use alloy_primitives::{Address, B256, U256};

use crate::{
    constants::{TIMESTAMP_MAX, UNLIMITED},
    is_allowed_calldata, OperatorPermission, PendingCharges, Session, SpendingConfig,
    SpendingLimit, TokenAllowance, ValidationError, ValidationResult,
};

/// The full effect of one successful validation, staged first and applied
/// atomically: a permit installation (if one was attached), the budget
/// charges, and the per-session usage increments.
#[derive(Debug, Clone, Default)]
pub struct PendingUpdate {
    /// Wallet the operation acts on.
    pub wallet: Address,
    /// Operator that authenticated.
    pub operator: Address,
    /// Candidate permission and allowances installed by a verified permit.
    pub install: Option<(OperatorPermission, SpendingConfig)>,
    /// Budget charges staged by accounting.
    pub charges: PendingCharges,
    /// Session leaves whose usage counters advance.
    pub session_uses: Vec<B256>,
}

/// The validator's storage tables.
#[derive(Debug, Clone, Default)]
pub struct ValidatorState {
    /// Permission per `(wallet, operator)`.
    permissions: HashMap<(Address, Address), OperatorPermission>,
    /// Spending limit per `(wallet, operator, token)`.
    spending: HashMap<(Address, Address, Address), SpendingLimit>,
    /// Permit nonce per `(wallet, operator)`; absent means zero.
    permit_nonces: HashMap<(Address, Address), u64>,
    /// Usage count per `(wallet, session leaf)`.
    session_usage: HashMap<(Address, B256), u128>,
    /// Revoked digests per wallet; monotonic.
    revoked: HashSet<(Address, B256)>,
}

impl ValidatorState {
    /// Creates empty tables.
    pub fn new() -> Self {
        Self::default()
    }
}

/// Owner-authorized management operations.
impl ValidatorState {
    /// Sets or overwrites an operator's full permission.
    ///
    /// Window timestamps must fit the 48-bit packed representation;
    /// anything wider would commit a different window than requested.
    pub fn set_operator_permission(
        &mut self,
        wallet: Address,
        operator: Address,
        permission: OperatorPermission,
    ) -> ValidationResult<()> {
        for timestamp in [permission.valid_until, permission.valid_after] {
            if timestamp > TIMESTAMP_MAX {
                return Err(ValidationError::TimestampOverflow(timestamp));
            }
        }
        self.permissions.insert((wallet, operator), permission);
        Ok(())
    }

    /// Replaces an operator's session root, creating an otherwise-unbounded
    /// permission when none exists. Every session absent from the new tree
    /// stops verifying immediately.
    pub fn set_session_root(&mut self, wallet: Address, operator: Address, root: B256) {
        self.permissions
            .entry((wallet, operator))
            .and_modify(|permission| permission.session_root = root)
            .or_insert_with(|| OperatorPermission::unlimited(root));
    }

    /// Sets an operator's remaining gas and use-count budget.
    pub fn set_operator_budget(
        &mut self,
        wallet: Address,
        operator: Address,
        gas_remaining: u128,
        times_remaining: u128,
    ) {
        let permission = self.permissions.entry((wallet, operator)).or_default();
        permission.gas_remaining = gas_remaining;
        permission.times_remaining = times_remaining;
    }

    /// Sets one per-token spending cap, resetting the spent counter.
    pub fn set_spending_limit(
        &mut self,
        wallet: Address,
        operator: Address,
        token: Address,
        allowance: U256,
    ) {
        self.spending.insert((wallet, operator, token), SpendingLimit::new(allowance));
    }

    /// Batch form of [`Self::set_spending_limit`].
    pub fn set_spending_limits(
        &mut self,
        wallet: Address,
        operator: Address,
        config: &[TokenAllowance],
    ) {
        for entry in config {
            self.set_spending_limit(wallet, operator, entry.token, entry.allowance);
        }
    }

    /// Marks a digest as revoked for a wallet. Revocation is permanent.
    pub fn revoke_signature(&mut self, wallet: Address, digest: B256) {
        self.revoked.insert((wallet, digest));
    }
}

/// Read-only queries.
impl ValidatorState {
    /// The permission of an operator, if any.
    pub fn operator_permission(
        &self,
        wallet: Address,
        operator: Address,
    ) -> Option<&OperatorPermission> {
        self.permissions.get(&(wallet, operator))
    }

    /// The committed session root of an operator.
    pub fn session_root(&self, wallet: Address, operator: Address) -> Option<B256> {
        self.operator_permission(wallet, operator).map(|permission| permission.session_root)
    }

    /// Remaining gas budget; [`UNLIMITED`] when no permission exists (an
    /// absent record constrains nothing by itself — validation fails earlier
    /// on the missing permission).
    pub fn remaining_gas(&self, wallet: Address, operator: Address) -> u128 {
        self.operator_permission(wallet, operator)
            .map_or(UNLIMITED, |permission| permission.gas_remaining)
    }

    /// Remaining use count.
    pub fn remaining_times(&self, wallet: Address, operator: Address) -> u128 {
        self.operator_permission(wallet, operator)
            .map_or(UNLIMITED, |permission| permission.times_remaining)
    }

    /// The spending limit configured for a token, if any.
    pub fn spending_limit(
        &self,
        wallet: Address,
        operator: Address,
        token: Address,
    ) -> Option<SpendingLimit> {
        self.spending.get(&(wallet, operator, token)).copied()
    }

    /// The next permit nonce expected for an operator.
    pub fn permit_nonce(&self, wallet: Address, operator: Address) -> u64 {
        self.permit_nonces.get(&(wallet, operator)).copied().unwrap_or_default()
    }

    /// How often a committed session has been used.
    pub fn session_uses(&self, wallet: Address, leaf: B256) -> u128 {
        self.session_usage.get(&(wallet, leaf)).copied().unwrap_or_default()
    }

    /// Whether a digest has been revoked for a wallet.
    pub fn is_signature_revoked(&self, wallet: Address, digest: B256) -> bool {
        self.revoked.contains(&(wallet, digest))
    }

    /// Debug helper: whether `session` proves into the root currently
    /// stored for the operator.
    pub fn validate_session_root(
        &self,
        wallet: Address,
        operator: Address,
        session: &Session,
        proof: &[B256],
    ) -> bool {
        self.session_root(wallet, operator)
            .is_some_and(|root| session.verify_membership(proof, root))
    }

    /// Debug helper: evaluates a session's predicate forest against an
    /// RLP actual-argument blob, exactly as validation would.
    pub fn validate_arguments(
        &self,
        session: &Session,
        args: &[u8],
        native_value: U256,
    ) -> ValidationResult<bool> {
        is_allowed_calldata(&session.allowed_arguments, args, native_value)
    }
}

/// Commit path.
impl ValidatorState {
    /// Applies a staged update in one step.
    ///
    /// The permit installation lands first so the budget charges consume the
    /// freshly installed permission, matching the in-call ordering of the
    /// validation state machine.
    pub(crate) fn commit(&mut self, update: PendingUpdate) {
        let PendingUpdate { wallet, operator, install, charges, session_uses } = update;

        if let Some((permission, config)) = install {
            // permit windows come off the 48-bit wire fields, always in range
            self.permissions.insert((wallet, operator), permission);
            self.set_spending_limits(wallet, operator, &config);
            *self.permit_nonces.entry((wallet, operator)).or_default() += 1;
        }

        if let Some(permission) = self.permissions.get_mut(&(wallet, operator)) {
            permission.gas_remaining = permission.gas_remaining.saturating_sub(charges.gas);
            if charges.times && permission.times_remaining != UNLIMITED {
                permission.times_remaining -= 1;
            }
        }

        for (token, amount) in charges.spends {
            if let Some(limit) = self.spending.get_mut(&(wallet, operator, token)) {
                limit.spent = limit.spent.saturating_add(amount);
            }
        }

        for leaf in session_uses {
            *self.session_usage.entry((wallet, leaf)).or_default() += 1;
        }
    }
}
