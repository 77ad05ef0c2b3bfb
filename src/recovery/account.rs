// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Smart account capability surface.
//!
//! The configurator and state machine only talk to a [`SmartAccountHandle`];
//! the Safe/Kernel differences live behind its methods. How a call actually
//! reaches the chain (signed transaction, bundler user operation, passkey
//! signature) is hidden behind [`CallExecutor`].

use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::{Address, Bytes, B256, U256};
use alloy::sol_types::SolValue;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::chain::RecoveryChainReader;
use super::error::RecoveryError;

/// ERC-7579 module type id for executors.
pub const EXECUTOR_MODULE_TYPE: u64 = 2;

/// A call the account should make.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCall {
    pub to: Address,
    pub value: U256,
    pub data: Bytes,
}

#[derive(Debug, thiserror::Error)]
pub enum ExecutionError {
    #[error("Call rejected: {0}")]
    Rejected(String),

    #[error("Transaction {0} reverted")]
    Reverted(B256),

    #[error("Transport error: {0}")]
    Transport(String),
}

/// Opaque "execute this call on behalf of the account" capability.
///
/// Implementations wait for inclusion and return the transaction (or user
/// operation) hash only once the call has succeeded.
#[async_trait]
pub trait CallExecutor: Send + Sync {
    async fn execute(&self, account: Address, call: AccountCall) -> Result<B256, ExecutionError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionPath {
    /// Plain transaction against deployed (or delegated) bytecode
    Direct,
    /// ERC-4337 user operation through a bundler
    UserOperation,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExecutionReceipt {
    pub hash: B256,
    pub path: ExecutionPath,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AccountKind {
    Safe,
    Kernel,
}

impl AccountKind {
    pub fn as_str(self) -> &'static str {
        match self {
            AccountKind::Safe => "safe",
            AccountKind::Kernel => "kernel",
        }
    }
}

impl fmt::Display for AccountKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AccountKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "safe" => Ok(AccountKind::Safe),
            "kernel" => Ok(AccountKind::Kernel),
            other => Err(format!("unknown account kind `{other}`")),
        }
    }
}

/// Address plus the executors able to act for it.
#[derive(Clone)]
pub struct AccountBinding {
    pub address: Address,
    /// Always available: the account's user-operation pathway.
    pub user_operations: Arc<dyn CallExecutor>,
    /// Conventional transactions, for accounts with bytecode whose owner
    /// key can sign directly (e.g. an EIP-7702 delegated EOA).
    pub direct: Option<Arc<dyn CallExecutor>>,
}

impl AccountBinding {
    pub fn new(address: Address, user_operations: Arc<dyn CallExecutor>) -> Self {
        Self {
            address,
            user_operations,
            direct: None,
        }
    }

    pub fn with_direct(mut self, direct: Arc<dyn CallExecutor>) -> Self {
        self.direct = Some(direct);
        self
    }
}

impl fmt::Debug for AccountBinding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AccountBinding")
            .field("address", &self.address)
            .field("direct", &self.direct.is_some())
            .finish()
    }
}

#[derive(Debug, Clone)]
pub enum SmartAccountHandle {
    Safe(AccountBinding),
    Kernel(AccountBinding),
}

impl SmartAccountHandle {
    pub fn new(kind: AccountKind, binding: AccountBinding) -> Self {
        match kind {
            AccountKind::Safe => SmartAccountHandle::Safe(binding),
            AccountKind::Kernel => SmartAccountHandle::Kernel(binding),
        }
    }

    fn binding(&self) -> &AccountBinding {
        match self {
            SmartAccountHandle::Safe(binding) | SmartAccountHandle::Kernel(binding) => binding,
        }
    }

    pub fn address(&self) -> Address {
        self.binding().address
    }

    pub fn kind(&self) -> AccountKind {
        match self {
            SmartAccountHandle::Safe(_) => AccountKind::Safe,
            SmartAccountHandle::Kernel(_) => AccountKind::Kernel,
        }
    }

    /// Init data for `installModule(executor, ...)` in the account's format.
    ///
    /// Kernel expects a hook address followed by `abi.encode(executorData,
    /// hookData)`; no hook is used, so both the address and the hook data
    /// are empty.
    pub fn wrap_executor_init_data(&self, init_data: Bytes) -> Bytes {
        match self {
            SmartAccountHandle::Safe(_) => init_data,
            SmartAccountHandle::Kernel(_) => {
                let encoded = (init_data, Bytes::new()).abi_encode_params();
                let mut wrapped = Vec::with_capacity(20 + encoded.len());
                wrapped.extend_from_slice(Address::ZERO.as_slice());
                wrapped.extend_from_slice(&encoded);
                wrapped.into()
            }
        }
    }

    /// A zero-value call from the account to itself.
    pub fn self_call(&self, data: Bytes) -> AccountCall {
        AccountCall {
            to: self.address(),
            value: U256::ZERO,
            data,
        }
    }

    /// Submit `call`, directly when the account has bytecode and a direct
    /// executor is bound, otherwise as a user operation.
    pub async fn execute_call(
        &self,
        call: AccountCall,
        has_code: bool,
    ) -> Result<ExecutionReceipt, ExecutionError> {
        let binding = self.binding();
        let (executor, path) = match (&binding.direct, has_code) {
            (Some(direct), true) => (direct, ExecutionPath::Direct),
            _ => (&binding.user_operations, ExecutionPath::UserOperation),
        };
        tracing::debug!(
            account = %binding.address,
            kind = %self.kind(),
            path = ?path,
            "Submitting account call"
        );
        let hash = executor.execute(binding.address, call).await?;
        Ok(ExecutionReceipt { hash, path })
    }

    /// Whether `module` is installed as an executor. An account without
    /// bytecode cannot have modules, so the chain is not asked.
    pub async fn is_module_installed(
        &self,
        reader: &dyn RecoveryChainReader,
        module: Address,
        has_code: bool,
    ) -> Result<bool, RecoveryError> {
        if !has_code {
            return Ok(false);
        }
        reader.is_executor_installed(self.address(), module).await
    }
}
