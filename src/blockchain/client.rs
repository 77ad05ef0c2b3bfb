// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! JSON-RPC client for the recovery module and the accounts it protects.

use alloy::{
    eips::BlockNumberOrTag,
    network::Ethereum,
    primitives::{Address, Bytes, U256},
    providers::{
        fillers::{BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller},
        Identity, Provider, ProviderBuilder, RootProvider,
    },
};
use async_trait::async_trait;

use super::contracts::{IERC7579Account, IEmailRecoveryModule, ISafe};
use crate::recovery::account::EXECUTOR_MODULE_TYPE;
use crate::recovery::chain::RecoveryChainReader;
use crate::recovery::configurator::is_installed_context;
use crate::recovery::error::{Operation, RecoveryError};
use crate::recovery::types::{GuardianConfig, RecoveryRequest};

/// HTTP provider type with the default fillers.
pub(crate) type HttpProvider = FillProvider<
    JoinFill<
        Identity,
        JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
    >,
    RootProvider<Ethereum>,
>;

/// Parse an RPC endpoint.
pub(crate) fn parse_rpc_url(rpc_url: &str) -> Result<url::Url, ChainClientError> {
    rpc_url
        .parse()
        .map_err(|e: url::ParseError| ChainClientError::InvalidRpcUrl(e.to_string()))
}

/// Read-only client bound to one recovery module deployment.
#[derive(Clone)]
pub struct ChainClient {
    module: Address,
    provider: HttpProvider,
}

impl ChainClient {
    pub fn new(rpc_url: &str, module: Address) -> Result<Self, ChainClientError> {
        let url = parse_rpc_url(rpc_url)?;
        let provider = ProviderBuilder::new().connect_http(url);
        Ok(Self { module, provider })
    }

    pub fn module(&self) -> Address {
        self.module
    }

    fn recovery_module(&self) -> IEmailRecoveryModule::IEmailRecoveryModuleInstance<HttpProvider> {
        IEmailRecoveryModule::new(self.module, self.provider.clone())
    }
}

/// Saturate on-chain `uint256` timestamps into `u64` seconds.
fn timestamp(value: U256) -> u64 {
    u64::try_from(value).unwrap_or(u64::MAX)
}

#[async_trait]
impl RecoveryChainReader for ChainClient {
    async fn guardian_config(&self, account: Address) -> Result<GuardianConfig, RecoveryError> {
        let config = self
            .recovery_module()
            .getGuardianConfig(account)
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadGuardianConfig, e))?;

        Ok(GuardianConfig {
            guardian_count: config.guardianCount,
            total_weight: config.totalWeight,
            accepted_weight: config.acceptedWeight,
            threshold: config.threshold,
        })
    }

    async fn recovery_request(&self, account: Address) -> Result<RecoveryRequest, RecoveryError> {
        let request = self
            .recovery_module()
            .getRecoveryRequest(account)
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadRecoveryRequest, e))?;

        Ok(RecoveryRequest {
            execute_after: timestamp(request.executeAfter),
            execute_before: timestamp(request.executeBefore),
            current_weight: request.currentWeight,
            recovery_data_hash: request.recoveryDataHash,
        })
    }

    async fn acceptance_command_templates(&self) -> Result<Vec<Vec<String>>, RecoveryError> {
        self.recovery_module()
            .acceptanceCommandTemplates()
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadCommandTemplates, e))
    }

    async fn recovery_command_templates(&self) -> Result<Vec<Vec<String>>, RecoveryError> {
        self.recovery_module()
            .recoveryCommandTemplates()
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadCommandTemplates, e))
    }

    async fn owners(&self, account: Address) -> Result<Vec<Address>, RecoveryError> {
        ISafe::new(account, self.provider.clone())
            .getOwners()
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadOwners, e))
    }

    async fn has_code(&self, account: Address) -> Result<bool, RecoveryError> {
        let code: Bytes = self
            .provider
            .get_code_at(account)
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadAccountCode, e))?;
        Ok(!code.is_empty())
    }

    async fn is_executor_installed(
        &self,
        account: Address,
        module: Address,
    ) -> Result<bool, RecoveryError> {
        IERC7579Account::new(account, self.provider.clone())
            .isModuleInstalled(U256::from(EXECUTOR_MODULE_TYPE), module, is_installed_context())
            .call()
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadModuleInstalled, e))
    }

    async fn latest_block_timestamp(&self) -> Result<u64, RecoveryError> {
        let block = self
            .provider
            .get_block_by_number(BlockNumberOrTag::Latest)
            .await
            .map_err(|e| RecoveryError::chain(Operation::ReadLatestBlock, e))?
            .ok_or_else(|| RecoveryError::chain(Operation::ReadLatestBlock, "No latest block"))?;
        Ok(block.header.timestamp)
    }
}

/// Errors that can occur while setting up blockchain access.
#[derive(Debug, thiserror::Error)]
pub enum ChainClientError {
    #[error("Invalid RPC URL: {0}")]
    InvalidRpcUrl(String),

    #[error("Invalid private key: {0}")]
    InvalidPrivateKey(String),
}
