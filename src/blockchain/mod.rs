// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! EVM integration for the recovery flow.
//!
//! This module provides:
//! - Contract interfaces for the recovery module, Safe and ERC-7579 accounts
//! - A JSON-RPC reader implementing `RecoveryChainReader`
//! - Direct transaction submission for EIP-7702 delegated accounts
//! - The EIP-7702 delegation relay (local key or remote service)

pub mod client;
pub mod contracts;
pub mod delegation;
pub mod executor;
pub mod signing;
pub mod types;

pub use client::{ChainClient, ChainClientError};
pub use delegation::{
    DelegateRequest, DelegateResponse, DelegationError, DelegationSender, DelegationSubmitter,
};
pub use executor::SignerCallExecutor;
pub use types::*;
