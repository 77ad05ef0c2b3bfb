// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Blockchain types and constants.

use alloy::primitives::{address, Address};

/// EVM network configuration.
#[derive(Debug, Clone)]
pub struct NetworkConfig {
    /// Network name for display
    pub name: &'static str,
    /// Chain ID
    pub chain_id: u64,
    /// Public RPC endpoint URL
    pub rpc_url: &'static str,
    /// Block explorer URL
    pub explorer_url: &'static str,
}

impl NetworkConfig {
    pub fn tx_url(&self, tx_hash: impl std::fmt::Display) -> String {
        format!("{}/tx/{tx_hash}", self.explorer_url)
    }
}

/// Base Sepolia testnet configuration.
pub const BASE_SEPOLIA: NetworkConfig = NetworkConfig {
    name: "Base Sepolia",
    chain_id: 84532,
    rpc_url: "https://sepolia.base.org",
    explorer_url: "https://sepolia.basescan.org",
};

/// Contract deployment addresses used by the recovery flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Deployment {
    /// Universal email recovery module (ERC-7579 executor)
    pub recovery_module: Address,
    /// Safe7579 adapter, also the Safe's fallback handler
    pub safe7579_adapter: Address,
    /// Safe7579 launchpad delegate-called from `Safe.setup`
    pub safe7579_launchpad: Address,
    /// Module registry attester trusted by the adapter
    pub attester: Address,
}

/// Base Sepolia deployment.
pub const BASE_SEPOLIA_DEPLOYMENT: Deployment = Deployment {
    recovery_module: address!("0x636632FA22052d2a4Fb6e3Bab84551B620b9C1F9"),
    safe7579_adapter: address!("0x7579EE8307284F293B1927136486880611F20002"),
    safe7579_launchpad: address!("0x7579011aB74c46090561ea277Ba79D510c6C00ff"),
    attester: address!("0xA4C777199658a41688E9488c4EcbD7a2925Cc23A"),
};
