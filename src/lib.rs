// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Email Guardian Recovery - Social Recovery Orchestrator
//!
//! This crate drives email-guardian social recovery for Safe and Kernel smart
//! accounts protected by an ERC-7579 email recovery module, and ships the
//! EIP-7702 delegation relay used to upgrade burner EOAs into Safes.
//!
//! ## Modules
//!
//! - `recovery` - Recovery lifecycle (guardian setup, request, completion)
//! - `relayer` - ZK email relayer HTTP client
//! - `blockchain` - Contract bindings, chain reads, EIP-7702 delegation
//! - `storage` - Persisted recovery session (redb)
//! - `api` - Delegation relay HTTP API (Axum)

pub mod api;
pub mod blockchain;
pub mod config;
pub mod error;
pub mod recovery;
pub mod relayer;
pub mod state;
pub mod storage;
