// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # EIP-7702 Delegation Relay
//!
//! Upgrading a burner EOA into a Safe needs one type-4 transaction carrying
//! the EOA's signed authorization plus a `Safe.setup` call on the EOA itself.
//! The EOA holds no ETH, so a funded relayer key sends it.
//!
//! ## Senders
//!
//! | Sender | Used when |
//! |--------|-----------|
//! | [`RemoteDelegationClient`] | a relay URL is configured; `POST {url}/api/relay/delegate` |
//! | [`DelegationRelayer`] | a relayer private key is available locally |
//!
//! The relay server in this crate's binary wraps a [`DelegationRelayer`].
//!
//! Authorization signing happens elsewhere; the signed authorization is an
//! input here.

use std::time::Duration;

use alloy::{
    eips::eip7702::{Authorization, SignedAuthorization},
    primitives::{Address, Bytes, B256, U256},
    providers::Provider,
    rpc::types::TransactionRequest,
    sol_types::SolCall,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use utoipa::ToSchema;

use super::contracts::{ISafe, ISafe7579Launchpad};
use super::executor::{signer_provider, SignerProvider};
use super::signing::signer_from_hex;
use super::types::Deployment;
use super::ChainClientError;

const DELEGATE_PATH: &str = "/api/relay/delegate";
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Owners and signature threshold of the freshly set up Safe.
const SAFE_THRESHOLD: u64 = 1;

// =============================================================================
// Wire types
// =============================================================================

/// Signed EIP-7702 authorization as produced by the signing wallet.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationPayload {
    /// Contract the EOA delegates to
    #[schema(value_type = String, example = "0x41675C099F32341bf84BFc5382aF534df5C7461a")]
    pub address: Address,
    pub chain_id: u64,
    pub nonce: u64,
    #[schema(value_type = String)]
    pub r: U256,
    #[schema(value_type = String)]
    pub s: U256,
    /// Legacy recovery id (27/28 or 0/1); used when `yParity` is absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub v: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y_parity: Option<u8>,
}

impl AuthorizationPayload {
    fn parity(&self) -> Result<u8, DelegationError> {
        match (self.y_parity, self.v) {
            (Some(parity @ (0 | 1)), _) => Ok(parity),
            (Some(other), _) => Err(DelegationError::InvalidAuthorization(format!(
                "yParity must be 0 or 1, got {other}"
            ))),
            (None, Some(v @ (0 | 1))) => Ok(v as u8),
            (None, Some(v @ (27 | 28))) => Ok((v - 27) as u8),
            (None, Some(v)) => Err(DelegationError::InvalidAuthorization(format!(
                "unsupported v value {v}"
            ))),
            (None, None) => Err(DelegationError::InvalidAuthorization(
                "either yParity or v is required".to_string(),
            )),
        }
    }

    /// Convert into the transaction's authorization list entry.
    pub fn to_signed(&self) -> Result<SignedAuthorization, DelegationError> {
        let inner = Authorization {
            chain_id: U256::from(self.chain_id),
            address: self.address,
            nonce: self.nonce,
        };
        Ok(SignedAuthorization::new_unchecked(
            inner,
            self.parity()?,
            self.r,
            self.s,
        ))
    }
}

/// Body of `POST /api/relay/delegate`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DelegateRequest {
    /// The delegating EOA
    #[schema(value_type = String)]
    pub to: Address,
    /// Calldata executed on the EOA once delegated
    #[schema(value_type = String)]
    pub data: Bytes,
    pub authorization: AuthorizationPayload,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, ToSchema)]
pub struct DelegateResponse {
    #[serde(rename = "txHash")]
    #[schema(value_type = String)]
    pub tx_hash: B256,
}

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum DelegationError {
    #[error("Invalid authorization: {0}")]
    InvalidAuthorization(String),

    #[error("Failed to relay transaction: {0}")]
    Submission(String),

    #[error("Delegation relay unreachable: {0}")]
    Transport(String),

    #[error("Delegation relay rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("Delegation relay returned an invalid response: {0}")]
    InvalidResponse(String),

    #[error("Delegation relay is not configured: {0}")]
    NotConfigured(String),

    #[error(transparent)]
    Chain(#[from] ChainClientError),
}

// =============================================================================
// DelegationSender
// =============================================================================

#[async_trait]
pub trait DelegationSender: Send + Sync {
    /// Submit the delegation transaction and return its hash without waiting
    /// for inclusion.
    async fn delegate(&self, request: &DelegateRequest) -> Result<DelegateResponse, DelegationError>;
}

/// Sends delegation transactions from a local, funded relayer key.
pub struct DelegationRelayer {
    relayer: Address,
    provider: SignerProvider,
}

impl DelegationRelayer {
    pub fn new(rpc_url: &str, relayer_private_key: &str) -> Result<Self, DelegationError> {
        let signer = signer_from_hex(relayer_private_key)?;
        let relayer = signer.address();
        Ok(Self {
            relayer,
            provider: signer_provider(rpc_url, signer)?,
        })
    }

    pub fn relayer(&self) -> Address {
        self.relayer
    }
}

#[async_trait]
impl DelegationSender for DelegationRelayer {
    async fn delegate(&self, request: &DelegateRequest) -> Result<DelegateResponse, DelegationError> {
        let authorization = request.authorization.to_signed()?;
        tracing::info!(
            to = %request.to,
            delegate = %request.authorization.address,
            chain_id = request.authorization.chain_id,
            nonce = request.authorization.nonce,
            "Relaying EIP-7702 delegation"
        );

        let tx = TransactionRequest {
            authorization_list: Some(vec![authorization]),
            ..Default::default()
        }
        .from(self.relayer)
        .to(request.to)
        .input(request.data.clone().into());

        let pending = self
            .provider
            .send_transaction(tx)
            .await
            .map_err(|e| DelegationError::Submission(e.to_string()))?;
        let tx_hash = *pending.tx_hash();

        tracing::info!(to = %request.to, tx_hash = %tx_hash, "Delegation relayed");
        Ok(DelegateResponse { tx_hash })
    }
}

/// Client for a delegation relay running elsewhere.
#[derive(Debug, Clone)]
pub struct RemoteDelegationClient {
    base_url: String,
    http: reqwest::Client,
}

impl RemoteDelegationClient {
    pub fn new(base_url: &str) -> Result<Self, DelegationError> {
        let http = reqwest::Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| DelegationError::NotConfigured(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            http,
        })
    }
}

/// Pull a human-readable message out of an error body.
fn relay_error_message(body: &str, fallback: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|value| {
            ["message", "error"]
                .iter()
                .find_map(|key| value.get(*key).and_then(Value::as_str).map(str::to_string))
        })
        .unwrap_or_else(|| fallback.to_string())
}

#[async_trait]
impl DelegationSender for RemoteDelegationClient {
    async fn delegate(&self, request: &DelegateRequest) -> Result<DelegateResponse, DelegationError> {
        let url = format!("{}{DELEGATE_PATH}", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| DelegationError::Transport(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| DelegationError::Transport(e.to_string()))?;

        if !status.is_success() {
            let message = relay_error_message(&body, status.canonical_reason().unwrap_or("request failed"));
            tracing::warn!(status = status.as_u16(), error = %message, "Delegation relay rejected request");
            return Err(DelegationError::Rejected {
                status: status.as_u16(),
                message,
            });
        }

        serde_json::from_str(&body).map_err(|e| DelegationError::InvalidResponse(e.to_string()))
    }
}

/// Remote relay when a URL is configured, otherwise a local relayer key.
pub enum DelegationSubmitter {
    Remote(RemoteDelegationClient),
    Local(DelegationRelayer),
}

impl DelegationSubmitter {
    pub fn configure(
        relay_url: Option<&str>,
        rpc_url: &str,
        relayer_private_key: Option<&str>,
    ) -> Result<Self, DelegationError> {
        match (relay_url, relayer_private_key) {
            (Some(url), _) => Ok(Self::Remote(RemoteDelegationClient::new(url)?)),
            (None, Some(key)) => Ok(Self::Local(DelegationRelayer::new(rpc_url, key)?)),
            (None, None) => Err(DelegationError::NotConfigured(
                "neither a relay URL nor a relayer private key is set".to_string(),
            )),
        }
    }
}

#[async_trait]
impl DelegationSender for DelegationSubmitter {
    async fn delegate(&self, request: &DelegateRequest) -> Result<DelegateResponse, DelegationError> {
        match self {
            DelegationSubmitter::Remote(client) => client.delegate(request).await,
            DelegationSubmitter::Local(relayer) => relayer.delegate(request).await,
        }
    }
}

// =============================================================================
// Safe setup
// =============================================================================

/// `Safe.setup` calldata that makes `owner` the single owner and enables the
/// Safe7579 adapter through the launchpad.
pub fn safe_setup_calldata(owner: Address, deployment: &Deployment) -> Bytes {
    let launchpad_call = ISafe7579Launchpad::addSafe7579Call {
        safe7579: deployment.safe7579_adapter,
        validators: Vec::new(),
        executors: Vec::new(),
        fallbacks: Vec::new(),
        hooks: Vec::new(),
        attesters: vec![deployment.attester],
        threshold: 1,
    };

    ISafe::setupCall {
        owners: vec![owner],
        threshold: U256::from(SAFE_THRESHOLD),
        to: deployment.safe7579_launchpad,
        data: launchpad_call.abi_encode().into(),
        fallbackHandler: deployment.safe7579_adapter,
        paymentToken: Address::ZERO,
        payment: U256::ZERO,
        paymentReceiver: Address::ZERO,
    }
    .abi_encode()
    .into()
}

/// Delegation request upgrading `burner` into a Safe owned by `owner`.
pub fn upgrade_eoa_request(
    burner: Address,
    owner: Address,
    authorization: AuthorizationPayload,
    deployment: &Deployment,
) -> DelegateRequest {
    DelegateRequest {
        to: burner,
        data: safe_setup_calldata(owner, deployment),
        authorization,
    }
}
