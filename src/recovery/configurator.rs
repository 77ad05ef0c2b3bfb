// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Recovery module installation.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes, FixedBytes, U256};
use alloy::sol_types::{SolCall, SolValue};

use super::account::{ExecutionReceipt, SmartAccountHandle, EXECUTOR_MODULE_TYPE};
use super::account_code::AccountCode;
use super::chain::RecoveryChainReader;
use super::delay::ensure_minimum_delay;
use super::error::{Operation, RecoveryError};
use super::guardian::{derive_guardian_identity, validate_email, GuardianIdentity};
use crate::blockchain::contracts::{IERC7579Account, ISafe};

/// Each guardian carries weight 1 and one approval suffices.
pub const GUARDIAN_WEIGHT: u64 = 1;
pub const GUARDIAN_THRESHOLD: u64 = 1;

/// Window after `executeAfter` in which a recovery can still complete: 2 weeks.
pub const RECOVERY_EXPIRY_SECS: u64 = 2 * 7 * 24 * 60 * 60;

/// Context passed to `isModuleInstalled` and stored in the module config.
pub fn is_installed_context() -> Bytes {
    Bytes::from(vec![0u8])
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InstallOutcome {
    Installed {
        guardian: GuardianIdentity,
        receipt: ExecutionReceipt,
    },
    /// Module was already installed; nothing was submitted.
    AlreadyInstalled { guardian: GuardianIdentity },
}

impl InstallOutcome {
    pub fn guardian(&self) -> GuardianIdentity {
        match self {
            InstallOutcome::Installed { guardian, .. }
            | InstallOutcome::AlreadyInstalled { guardian } => *guardian,
        }
    }
}

/// ABI-encoded module configuration tuple:
/// `(validator, isInstalledContext, selector, guardians, weights, threshold, delay, expiry)`.
pub fn module_init_data(account: Address, guardian: GuardianIdentity, delay_secs: u64) -> Bytes {
    let selector = FixedBytes::<4>::from(ISafe::swapOwnerCall::SELECTOR);
    (
        account,
        is_installed_context(),
        selector,
        vec![guardian.address()],
        vec![U256::from(GUARDIAN_WEIGHT)],
        U256::from(GUARDIAN_THRESHOLD),
        U256::from(delay_secs),
        U256::from(RECOVERY_EXPIRY_SECS),
    )
        .abi_encode_params()
        .into()
}

/// Installs the email recovery module on a smart account.
#[derive(Clone)]
pub struct RecoveryModuleConfigurator {
    module: Address,
    chain: Arc<dyn RecoveryChainReader>,
    minimum_delay_secs: u64,
}

impl RecoveryModuleConfigurator {
    pub fn new(module: Address, chain: Arc<dyn RecoveryChainReader>, minimum_delay_secs: u64) -> Self {
        Self {
            module,
            chain,
            minimum_delay_secs,
        }
    }

    /// Install the module bound to the guardian derived from `email`.
    ///
    /// Idempotent: if the module is already installed the guardian is
    /// returned without submitting anything. Submission failures are
    /// returned as-is and never retried.
    pub async fn install(
        &self,
        account: &SmartAccountHandle,
        account_code: &AccountCode,
        guardian_email: &str,
        delay_secs: u64,
    ) -> Result<InstallOutcome, RecoveryError> {
        let email = validate_email(guardian_email)?;
        ensure_minimum_delay(delay_secs, self.minimum_delay_secs)?;

        let address = account.address();
        let guardian = derive_guardian_identity(address, account_code, &email);

        let has_code = self.chain.has_code(address).await?;
        if account
            .is_module_installed(self.chain.as_ref(), self.module, has_code)
            .await?
        {
            tracing::info!(account = %address, module = %self.module, "Recovery module already installed");
            return Ok(InstallOutcome::AlreadyInstalled { guardian });
        }

        let init_data = account.wrap_executor_init_data(module_init_data(address, guardian, delay_secs));
        let calldata = IERC7579Account::installModuleCall {
            moduleTypeId: U256::from(EXECUTOR_MODULE_TYPE),
            module: self.module,
            initData: init_data,
        }
        .abi_encode();

        let receipt = account
            .execute_call(account.self_call(calldata.into()), has_code)
            .await
            .map_err(|e| {
                tracing::error!(account = %address, error = %e, "Module installation failed");
                RecoveryError::submission(Operation::InstallModule, e)
            })?;

        tracing::info!(
            account = %address,
            guardian = %guardian,
            tx_hash = %receipt.hash,
            delay_secs,
            "Recovery module installed"
        );
        Ok(InstallOutcome::Installed { guardian, receipt })
    }
}
