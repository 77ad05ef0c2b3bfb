// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Direct transaction submission for EIP-7702 delegated accounts.
//!
//! A delegated EOA runs its smart-account code when it calls itself, so a
//! transaction signed by the account key with `to = account` reaches the
//! account as a self-call, and any other target sees the account as
//! `msg.sender`. This is the `direct` path of an
//! [`AccountBinding`](crate::recovery::account::AccountBinding).

use alloy::{
    network::{Ethereum, EthereumWallet},
    primitives::{Address, B256},
    providers::{
        fillers::{
            BlobGasFiller, ChainIdFiller, FillProvider, GasFiller, JoinFill, NonceFiller,
            WalletFiller,
        },
        Identity, Provider, ProviderBuilder, RootProvider,
    },
    rpc::types::TransactionRequest,
    signers::local::PrivateKeySigner,
};
use async_trait::async_trait;

use super::client::{parse_rpc_url, ChainClientError};
use crate::recovery::account::{AccountCall, CallExecutor, ExecutionError};

/// HTTP provider type with the default fillers and a signing wallet.
pub(crate) type SignerProvider = FillProvider<
    JoinFill<
        JoinFill<
            Identity,
            JoinFill<GasFiller, JoinFill<BlobGasFiller, JoinFill<NonceFiller, ChainIdFiller>>>,
        >,
        WalletFiller<EthereumWallet>,
    >,
    RootProvider<Ethereum>,
>;

pub(crate) fn signer_provider(
    rpc_url: &str,
    signer: PrivateKeySigner,
) -> Result<SignerProvider, ChainClientError> {
    let url = parse_rpc_url(rpc_url)?;
    Ok(ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(url))
}

/// Sends account calls as ordinary transactions signed by the account key.
pub struct SignerCallExecutor {
    account: Address,
    provider: SignerProvider,
}

impl SignerCallExecutor {
    pub fn new(rpc_url: &str, account_key: PrivateKeySigner) -> Result<Self, ChainClientError> {
        let account = account_key.address();
        Ok(Self {
            account,
            provider: signer_provider(rpc_url, account_key)?,
        })
    }

    pub fn account(&self) -> Address {
        self.account
    }
}

#[async_trait]
impl CallExecutor for SignerCallExecutor {
    async fn execute(&self, account: Address, call: AccountCall) -> Result<B256, ExecutionError> {
        if account != self.account {
            return Err(ExecutionError::Rejected(format!(
                "signer {} cannot act for account {account}",
                self.account
            )));
        }

        let tx = TransactionRequest::default()
            .from(self.account)
            .to(call.to)
            .value(call.value)
            .input(call.data.into());

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| ExecutionError::Transport(format!("Failed to send: {e}")))?;
        let tx_hash = *pending.tx_hash();
        tracing::debug!(account = %account, tx_hash = %tx_hash, "Account call sent");

        let receipt = pending
            .get_receipt()
            .await
            .map_err(|e| ExecutionError::Transport(format!("Failed to get receipt: {e}")))?;
        if !receipt.status() {
            return Err(ExecutionError::Reverted(tx_hash));
        }
        Ok(tx_hash)
    }
}
