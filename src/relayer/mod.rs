// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Email Relayer Client
//!
//! HTTP client for the ZK email relayer that emails the guardian and submits
//! the final recovery transaction.
//!
//! ## Endpoints
//!
//! | Method | Path | Purpose |
//! |--------|------|---------|
//! | POST | `/acceptanceRequest` | email the guardian to accept guardianship |
//! | POST | `/recoveryRequest` | email the guardian to approve a recovery |
//! | POST | `/completeRequest` | submit the completion transaction |
//!
//! Every call goes through [`retry::with_one_retry`]: network errors and 5xx
//! responses get exactly one more attempt after a short delay, anything else
//! fails immediately.

pub mod retry;

use std::time::Duration;

use alloy::primitives::{hex, Address};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::RecoveryConfig;
use retry::{with_one_retry, Retryable};

const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum RelayerError {
    #[error("request to {path} failed: {message}")]
    Transport { path: String, message: String },

    #[error("{path} returned {status}: {message}")]
    Server {
        path: String,
        status: u16,
        message: String,
    },

    #[error("{path} rejected the request ({status}): {message}")]
    Rejected {
        path: String,
        status: u16,
        message: String,
    },

    #[error("{path} returned an invalid response: {message}")]
    InvalidResponse { path: String, message: String },

    #[error("relayer client configuration error: {0}")]
    Config(String),
}

impl Retryable for RelayerError {
    fn is_transient(&self) -> bool {
        matches!(
            self,
            RelayerError::Transport { .. } | RelayerError::Server { .. }
        )
    }
}

// =============================================================================
// Request / Response Types
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AcceptanceRequest {
    pub controller_eth_addr: String,
    pub guardian_email_addr: String,
    /// Account code as un-prefixed hex
    pub account_code: String,
    pub template_idx: usize,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RecoveryRequestBody {
    pub controller_eth_addr: String,
    pub guardian_email_addr: String,
    pub template_idx: usize,
    pub command: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CompleteRecoveryRequest {
    pub controller_eth_addr: String,
    pub account_eth_addr: String,
    /// `abi.encode(account, swapCalldata)` as 0x-prefixed hex
    pub complete_calldata: String,
}

impl AcceptanceRequest {
    pub fn new(
        module: Address,
        guardian_email: &str,
        account_code_hex: String,
        template_idx: usize,
        command: String,
    ) -> Self {
        Self {
            controller_eth_addr: module.to_string(),
            guardian_email_addr: guardian_email.to_string(),
            account_code: account_code_hex,
            template_idx,
            command,
        }
    }
}

impl RecoveryRequestBody {
    pub fn new(module: Address, guardian_email: &str, template_idx: usize, command: String) -> Self {
        Self {
            controller_eth_addr: module.to_string(),
            guardian_email_addr: guardian_email.to_string(),
            template_idx,
            command,
        }
    }
}

impl CompleteRecoveryRequest {
    pub fn new(module: Address, account: Address, recovery_data: &[u8]) -> Self {
        Self {
            controller_eth_addr: module.to_string(),
            account_eth_addr: account.to_string(),
            complete_calldata: hex::encode_prefixed(recovery_data),
        }
    }
}

/// Acknowledgement for the email-sending endpoints. The body is opaque.
#[derive(Debug, Clone, PartialEq)]
pub struct RelayerAck {
    pub status: u16,
    pub body: Value,
}

/// Relayer request id, which deployments return as either a number or a string.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub enum RequestId {
    Number(u64),
    Text(String),
}

/// Validated body of a completion response.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields, rename_all = "camelCase")]
pub struct CompletionReceipt {
    #[serde(default)]
    pub request_id: Option<RequestId>,
    #[serde(default)]
    pub transaction_hash: Option<String>,
}

impl CompletionReceipt {
    /// Parse and validate a completion body. Unknown fields, wrong types, or
    /// a body with neither field are rejected.
    pub fn parse(body: &str) -> Result<Self, String> {
        let receipt: CompletionReceipt =
            serde_json::from_str(body).map_err(|e| format!("unexpected payload: {e}"))?;
        if receipt.request_id.is_none() && receipt.transaction_hash.is_none() {
            return Err("payload carries neither requestId nor transactionHash".to_string());
        }
        if let Some(hash) = &receipt.transaction_hash {
            let valid = hex::decode(hash).map(|b| b.len() == 32).unwrap_or(false);
            if !valid {
                return Err(format!("transactionHash `{hash}` is not a 32-byte hex value"));
            }
        }
        Ok(receipt)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompleteRecoveryResponse {
    pub status: u16,
    pub data: CompletionReceipt,
}

// =============================================================================
// RelayerApi
// =============================================================================

/// The three relayer operations the recovery lifecycle uses.
#[async_trait]
pub trait RelayerApi: Send + Sync {
    async fn acceptance_request(&self, request: &AcceptanceRequest) -> Result<RelayerAck, RelayerError>;

    async fn recovery_request(&self, request: &RecoveryRequestBody) -> Result<RelayerAck, RelayerError>;

    async fn complete_recovery(
        &self,
        request: &CompleteRecoveryRequest,
    ) -> Result<CompleteRecoveryResponse, RelayerError>;
}

// =============================================================================
// RelayerClient
// =============================================================================

#[derive(Debug, Clone)]
pub struct RelayerClient {
    base_url: String,
    retry_delay: Duration,
    http: Client,
}

impl RelayerClient {
    pub fn new(base_url: &str, retry_delay: Duration) -> Result<Self, RelayerError> {
        let http = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .build()
            .map_err(|e| RelayerError::Config(format!("failed to build HTTP client: {e}")))?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            retry_delay,
            http,
        })
    }

    pub fn from_config(config: &RecoveryConfig) -> Result<Self, RelayerError> {
        Self::new(&config.relayer_url, config.policy.relayer_retry_delay)
    }

    /// POST a JSON body once and return the status and raw response text.
    async fn post_once<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(StatusCode, String), RelayerError> {
        let response = self
            .http
            .post(format!("{}{}", self.base_url, path))
            .json(body)
            .send()
            .await
            .map_err(|e| RelayerError::Transport {
                path: path.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        let text = response.text().await.map_err(|e| RelayerError::Transport {
            path: path.to_string(),
            message: format!("failed to read body: {e}"),
        })?;

        if status.is_server_error() {
            return Err(RelayerError::Server {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        if !status.is_success() {
            return Err(RelayerError::Rejected {
                path: path.to_string(),
                status: status.as_u16(),
                message: error_message(&text),
            });
        }
        Ok((status, text))
    }

    async fn post_with_retry<B: Serialize + Sync>(&self, path: &str, body: &B) -> Result<(StatusCode, String), RelayerError> {
        with_one_retry(path, self.retry_delay, || self.post_once(path, body)).await
    }
}

#[async_trait]
impl RelayerApi for RelayerClient {
    async fn acceptance_request(&self, request: &AcceptanceRequest) -> Result<RelayerAck, RelayerError> {
        tracing::info!(
            module = %request.controller_eth_addr,
            template_idx = request.template_idx,
            "Sending guardian acceptance request"
        );
        let (status, text) = self.post_with_retry("/acceptanceRequest", request).await?;
        Ok(RelayerAck {
            status: status.as_u16(),
            body: parse_opaque(&text),
        })
    }

    async fn recovery_request(&self, request: &RecoveryRequestBody) -> Result<RelayerAck, RelayerError> {
        tracing::info!(
            module = %request.controller_eth_addr,
            template_idx = request.template_idx,
            "Sending recovery request"
        );
        let (status, text) = self.post_with_retry("/recoveryRequest", request).await?;
        Ok(RelayerAck {
            status: status.as_u16(),
            body: parse_opaque(&text),
        })
    }

    async fn complete_recovery(
        &self,
        request: &CompleteRecoveryRequest,
    ) -> Result<CompleteRecoveryResponse, RelayerError> {
        const PATH: &str = "/completeRequest";
        tracing::info!(
            module = %request.controller_eth_addr,
            account = %request.account_eth_addr,
            "Requesting recovery completion"
        );
        let (status, text) = self.post_with_retry(PATH, request).await?;
        let data = CompletionReceipt::parse(&text).map_err(|message| {
            tracing::error!(body = %text, error = %message, "Relayer completion response rejected");
            RelayerError::InvalidResponse {
                path: PATH.to_string(),
                message,
            }
        })?;
        Ok(CompleteRecoveryResponse {
            status: status.as_u16(),
            data,
        })
    }
}

fn parse_opaque(text: &str) -> Value {
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_string()))
}

/// Pull a human-readable message out of an error body, passing the raw text
/// through when it is not the usual `{ "message" | "error": ... }` shape.
fn error_message(body: &str) -> String {
    let parsed: Option<Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|v| {
        v.get("message")
            .or_else(|| v.get("error"))
            .and_then(Value::as_str)
            .map(str::to_string)
    });
    match message {
        Some(message) => message,
        None if body.trim().is_empty() => "empty response body".to_string(),
        None => body.trim().to_string(),
    }
}
