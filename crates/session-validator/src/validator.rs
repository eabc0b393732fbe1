//! The session-key validation engine.
//!
//! [`SessionKeyValidator`] ties the pieces together: it decodes the wallet
//! calldata and the extended signature payload, verifies an attached owner
//! permit, checks every call against its session descriptor and the
//! operator's budgets, authenticates the operator, and only then commits the
//! staged state. Any hard failure leaves the tables untouched.

use alloy_primitives::{Address, B256};
use derive_more::{Deref, DerefMut};

use crate::{
    decode_payload, decode_wallet_calls, intersect_window, is_allowed_calldata, operator_digest,
    permit_digest, recover_signer, stage_charges, Execution, ModuleRegistry, OperatorPermission,
    PendingUpdate, SignaturePayload, SpendingConfig, SpendingLimit, SudoValidator, UserOperation,
    ValidationData, ValidationError, ValidationResult, ValidatorState,
};

/// The session-key validator for one deployment.
///
/// `address` and `chain_id` identify the deployment; both are mixed into the
/// signed digests so signatures cannot be replayed against another validator
/// instance or chain. The state tables are reachable through `Deref` for
/// management and queries.
#[derive(Debug, Deref, DerefMut)]
pub struct SessionKeyValidator<S> {
    /// Address this validator is installed under.
    pub address: Address,
    /// Chain the validator serves.
    pub chain_id: u64,
    /// Module, hook and validator registries of the host wallet.
    pub registry: ModuleRegistry,
    /// Owner-signature verification supplied by the host wallet.
    pub sudo: S,
    /// Persisted tables.
    #[deref]
    #[deref_mut]
    pub state: ValidatorState,
}

impl<S> SessionKeyValidator<S> {
    /// Creates a validator with empty state.
    pub fn new(address: Address, chain_id: u64, sudo: S) -> Self {
        Self {
            address,
            chain_id,
            registry: ModuleRegistry::new(),
            sudo,
            state: ValidatorState::new(),
        }
    }
}

impl<S: SudoValidator> SessionKeyValidator<S> {
    /// Validates a user operation against the operator's sessions and
    /// budgets.
    ///
    /// Returns the packed-word view of the outcome: on success the
    /// intersected validity window of the permission and every session used,
    /// with all charges committed; when only the operator signature fails,
    /// the failure sentinel with nothing committed. Every other violation is
    /// a hard `Err` and likewise commits nothing.
    pub fn validate_user_op(
        &mut self,
        op: &UserOperation,
        op_hash: B256,
    ) -> ValidationResult<ValidationData> {
        let wallet = op.sender;
        let calls = decode_wallet_calls(&op.call_data)?;
        let payload = decode_payload(&op.signature)?;
        let operator = payload.operator;

        // An attached permit is verified up front; the candidate permission
        // it carries governs the rest of the checks but lands in the tables
        // only at commit time.
        let install = self.verify_permit(wallet, operator, &payload)?;

        let permission = match &install {
            Some((permission, _)) => permission.clone(),
            None => self
                .state
                .operator_permission(wallet, operator)
                .filter(|permission| !permission.is_empty())
                .cloned()
                .ok_or(ValidationError::NoPermission(operator))?,
        };

        if permission.paymaster != Address::ZERO {
            let declared = op.paymaster().unwrap_or_default();
            if declared != permission.paymaster {
                return Err(ValidationError::PaymasterMismatch {
                    pinned: permission.paymaster,
                    declared,
                });
            }
        }

        let charges = stage_charges(wallet, op, &calls, &permission, |token| {
            if let Some((_, allowances)) = &install {
                if let Some(entry) = allowances.iter().find(|entry| entry.token == token) {
                    return Some(SpendingLimit::new(entry.allowance));
                }
            }
            self.state.spending_limit(wallet, operator, token)
        })?;

        let declared_paymaster = op.paymaster().unwrap_or_default();
        let (window, session_uses) =
            self.check_calls(wallet, &calls, &payload, &permission, declared_paymaster)?;

        // Operator-signature invalidity is the one soft outcome: the
        // sentinel lets gas estimation run with a placeholder signature.
        let digest = operator_digest(op_hash, self.address);
        if self.state.is_signature_revoked(wallet, digest) {
            return Err(ValidationError::SignatureRevoked);
        }
        if recover_signer(digest, &payload.operator_signature) != Some(operator) {
            return Ok(ValidationData::failure());
        }

        self.state.commit(PendingUpdate {
            wallet,
            operator,
            install,
            charges,
            session_uses,
        });
        Ok(ValidationData::success(window.0, window.1))
    }

    /// [`Self::validate_user_op`] with hard failures folded into the failure
    /// sentinel, mirroring the outer try/catch of the host wallet.
    pub fn validate_user_op_soft(&mut self, op: &UserOperation, op_hash: B256) -> ValidationData {
        self.validate_user_op(op, op_hash).unwrap_or_else(|_| ValidationData::failure())
    }

    /// Verifies the owner permit attached to a payload, if any, returning
    /// the candidate state it installs.
    fn verify_permit(
        &self,
        wallet: Address,
        operator: Address,
        payload: &SignaturePayload,
    ) -> ValidationResult<Option<(OperatorPermission, SpendingConfig)>> {
        let Some(permit) = &payload.permit else { return Ok(None) };

        if !self.registry.is_sudo(permit.sudo_validator) {
            return Err(ValidationError::NotSudoValidator(permit.sudo_validator));
        }

        let digest = permit_digest(
            self.chain_id,
            wallet,
            operator,
            &permit.permission,
            &permit.allowances,
            self.state.permit_nonce(wallet, operator),
        );
        if self.state.is_signature_revoked(wallet, digest) {
            return Err(ValidationError::SignatureRevoked);
        }
        if !self.sudo.is_valid_signature(permit.sudo_validator, wallet, digest, &permit.signature)
        {
            return Err(ValidationError::InvalidPermit);
        }

        Ok(Some((permit.permission.clone(), permit.allowances.clone())))
    }

    /// Checks every call against its positionally aligned session descriptor
    /// and proof.
    ///
    /// Returns the validity window intersected across the permission and all
    /// sessions, plus the leaves whose usage counters must advance.
    fn check_calls(
        &self,
        wallet: Address,
        calls: &[Execution],
        payload: &SignaturePayload,
        permission: &OperatorPermission,
        declared_paymaster: Address,
    ) -> ValidationResult<((u64, u64), Vec<B256>)> {
        if payload.sessions.len() != calls.len()
            || payload.proofs.len() != calls.len()
            || payload.rlp_arguments.len() != calls.len()
        {
            return Err(ValidationError::BatchLengthMismatch {
                calls: calls.len(),
                sessions: payload.sessions.len(),
                proofs: payload.proofs.len(),
                args: payload.rlp_arguments.len(),
            });
        }

        let mut window = (permission.valid_until, permission.valid_after);
        let mut session_uses = Vec::new();

        for ((call, session), (proof, args)) in calls
            .iter()
            .zip(&payload.sessions)
            .zip(payload.proofs.iter().zip(&payload.rlp_arguments))
        {
            if call.to != session.target {
                return Err(ValidationError::TargetMismatch {
                    allowed: session.target,
                    actual: call.to,
                });
            }
            if call.selector()? != session.selector {
                return Err(ValidationError::SelectorMismatch);
            }
            if session.paymaster != Address::ZERO && declared_paymaster != session.paymaster {
                return Err(ValidationError::PaymasterMismatch {
                    pinned: session.paymaster,
                    declared: declared_paymaster,
                });
            }

            let leaf = session.leaf();
            if !session.verify_membership(proof, permission.session_root) {
                return Err(ValidationError::SessionNotFound(permission.session_root));
            }

            if session.has_usage_limit() {
                let staged = session_uses.iter().filter(|l| **l == leaf).count() as u128;
                let used = self.state.session_uses(wallet, leaf) + staged;
                if used >= session.times_limit {
                    return Err(ValidationError::SessionUsageExceeded {
                        used,
                        limit: session.times_limit,
                    });
                }
                session_uses.push(leaf);
            }

            if !is_allowed_calldata(&session.allowed_arguments, args, call.value)? {
                return Err(ValidationError::ArgumentMismatch);
            }

            window = intersect_window(window, (session.valid_until, session.valid_after));
        }

        Ok((window, session_uses))
    }
}
