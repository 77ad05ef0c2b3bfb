// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Read-only chain access needed by the recovery lifecycle.

use alloy::primitives::Address;
use async_trait::async_trait;

use super::error::RecoveryError;
use super::types::{GuardianConfig, RecoveryRequest};

/// Chain reads against one recovery module deployment.
///
/// `ChainClient` implements this over JSON-RPC; tests use in-memory fakes.
/// Errors are already mapped to [`RecoveryError::Chain`] with the failing
/// operation attached.
#[async_trait]
pub trait RecoveryChainReader: Send + Sync {
    async fn guardian_config(&self, account: Address) -> Result<GuardianConfig, RecoveryError>;

    async fn recovery_request(&self, account: Address) -> Result<RecoveryRequest, RecoveryError>;

    async fn acceptance_command_templates(&self) -> Result<Vec<Vec<String>>, RecoveryError>;

    async fn recovery_command_templates(&self) -> Result<Vec<Vec<String>>, RecoveryError>;

    /// Current owners of a Safe, in linked-list order.
    async fn owners(&self, account: Address) -> Result<Vec<Address>, RecoveryError>;

    /// Whether the address has deployed (or delegated) bytecode.
    async fn has_code(&self, account: Address) -> Result<bool, RecoveryError>;

    /// `isModuleInstalled(2, module, 0x00)` on the account.
    async fn is_executor_installed(
        &self,
        account: Address,
        module: Address,
    ) -> Result<bool, RecoveryError>;

    /// Timestamp of the latest block, in seconds.
    async fn latest_block_timestamp(&self) -> Result<u64, RecoveryError>;
}
