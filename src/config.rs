// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Runtime Configuration
//!
//! This module defines environment variable names and default values used
//! throughout the crate. Configuration is loaded from the environment at
//! startup.
//!
//! ## Environment Variables
//!
//! | Variable | Description | Default |
//! |----------|-------------|---------|
//! | `RPC_URL` | JSON-RPC endpoint of the chain | `https://sepolia.base.org` |
//! | `RELAYER_URL` | ZK email relayer base URL | Required |
//! | `RECOVERY_MODULE_ADDRESS` | Email recovery module | Base Sepolia deployment |
//! | `MIN_RECOVERY_DELAY_SECS` | Shortest accepted timelock | `21600` (6 h) |
//! | `POLL_INTERVAL_SECS` | Guardian acceptance / approval poll interval | `5` |
//! | `RELAYER_RETRY_DELAY_MS` | Delay before the single relayer retry | `1000` |
//! | `SESSION_DB_PATH` | redb file holding the recovery session | `recovery-session.redb` |
//! | `DELEGATE_RELAYER_PRIVATE_KEY` | Key paying for EIP-7702 delegations | Required for the relay |
//! | `HOST` | Relay bind address | `0.0.0.0` |
//! | `PORT` | Relay bind port | `8080` |
//! | `LOG_FORMAT` | Logging format (`json` or `pretty`) | `pretty` |
//! | `RUST_LOG` | Log level filter | `info,tower_http=debug` |

use std::path::PathBuf;
use std::time::Duration;

use alloy::primitives::Address;

use crate::blockchain::types::{BASE_SEPOLIA, BASE_SEPOLIA_DEPLOYMENT};
use crate::recovery::delay::DEFAULT_MINIMUM_DELAY_SECS;

pub const RPC_URL_ENV: &str = "RPC_URL";
pub const RELAYER_URL_ENV: &str = "RELAYER_URL";
pub const RECOVERY_MODULE_ENV: &str = "RECOVERY_MODULE_ADDRESS";
pub const MIN_RECOVERY_DELAY_ENV: &str = "MIN_RECOVERY_DELAY_SECS";
pub const POLL_INTERVAL_ENV: &str = "POLL_INTERVAL_SECS";
pub const RELAYER_RETRY_DELAY_ENV: &str = "RELAYER_RETRY_DELAY_MS";

/// Environment variable name for the recovery session database path.
///
/// The file stores the account code, guardian email and pending new owner,
/// so it must survive restarts (see `storage::session`).
pub const SESSION_DB_PATH_ENV: &str = "SESSION_DB_PATH";

/// Private key of the EOA that pays for EIP-7702 delegation transactions.
pub const DELEGATE_RELAYER_KEY_ENV: &str = "DELEGATE_RELAYER_PRIVATE_KEY";

pub const HOST_ENV: &str = "HOST";
pub const LOG_FORMAT_ENV: &str = "LOG_FORMAT";
pub const PORT_ENV: &str = "PORT";

const DEFAULT_SESSION_DB_PATH: &str = "recovery-session.redb";
const DEFAULT_HOST: &str = "0.0.0.0";
const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("missing required environment variable {0}")]
    Missing(&'static str),

    #[error("invalid value for {name}: {reason}")]
    Invalid { name: &'static str, reason: String },
}

// =============================================================================
// Recovery policy
// =============================================================================

/// Timing constants of the recovery lifecycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecoveryPolicy {
    /// Shortest delay accepted when installing the module.
    pub minimum_delay_secs: u64,
    pub poll_interval: Duration,
    pub countdown_tick: Duration,
    pub relayer_retry_delay: Duration,
}

impl Default for RecoveryPolicy {
    fn default() -> Self {
        Self {
            minimum_delay_secs: DEFAULT_MINIMUM_DELAY_SECS,
            poll_interval: Duration::from_secs(5),
            countdown_tick: Duration::from_secs(1),
            relayer_retry_delay: Duration::from_secs(1),
        }
    }
}

impl RecoveryPolicy {
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        Ok(Self {
            minimum_delay_secs: env_parsed(MIN_RECOVERY_DELAY_ENV)?
                .unwrap_or(defaults.minimum_delay_secs),
            poll_interval: env_parsed(POLL_INTERVAL_ENV)?
                .map(|secs| poll_interval(POLL_INTERVAL_ENV, secs))
                .transpose()?
                .unwrap_or(defaults.poll_interval),
            countdown_tick: defaults.countdown_tick,
            relayer_retry_delay: env_parsed(RELAYER_RETRY_DELAY_ENV)?
                .map(Duration::from_millis)
                .unwrap_or(defaults.relayer_retry_delay),
        })
    }
}

// =============================================================================
// Recovery orchestrator
// =============================================================================

#[derive(Debug, Clone)]
pub struct RecoveryConfig {
    pub rpc_url: String,
    pub relayer_url: String,
    pub recovery_module: Address,
    pub session_db_path: PathBuf,
    pub policy: RecoveryPolicy,
}

impl RecoveryConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let recovery_module = match env_optional(RECOVERY_MODULE_ENV) {
            Some(raw) => parse_address(RECOVERY_MODULE_ENV, &raw)?,
            None => BASE_SEPOLIA_DEPLOYMENT.recovery_module,
        };

        Ok(Self {
            rpc_url: env_or_default(RPC_URL_ENV, BASE_SEPOLIA.rpc_url),
            relayer_url: env_required(RELAYER_URL_ENV)?,
            recovery_module,
            session_db_path: PathBuf::from(env_or_default(
                SESSION_DB_PATH_ENV,
                DEFAULT_SESSION_DB_PATH,
            )),
            policy: RecoveryPolicy::from_env()?,
        })
    }
}

// =============================================================================
// Delegation relay
// =============================================================================

#[derive(Clone)]
pub struct DelegationConfig {
    pub host: String,
    pub port: u16,
    pub rpc_url: String,
    pub relayer_private_key: String,
}

impl std::fmt::Debug for DelegationConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DelegationConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("rpc_url", &self.rpc_url)
            .field("relayer_private_key", &"<redacted>")
            .finish()
    }
}

impl DelegationConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Ok(Self {
            host: env_or_default(HOST_ENV, DEFAULT_HOST),
            port: env_parsed(PORT_ENV)?.unwrap_or(DEFAULT_PORT),
            rpc_url: env_or_default(RPC_URL_ENV, BASE_SEPOLIA.rpc_url),
            relayer_private_key: env_required(DELEGATE_RELAYER_KEY_ENV)?,
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

// =============================================================================
// Helpers
// =============================================================================

fn env_required(name: &'static str) -> Result<String, ConfigError> {
    env_optional(name).ok_or(ConfigError::Missing(name))
}

fn env_optional(name: &str) -> Option<String> {
    std::env::var(name)
        .ok()
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn env_or_default(name: &str, default: &str) -> String {
    env_optional(name).unwrap_or_else(|| default.to_string())
}

fn env_parsed<T>(name: &'static str) -> Result<Option<T>, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    env_optional(name)
        .map(|raw| parse_value(name, &raw))
        .transpose()
}

fn parse_value<T>(name: &'static str, raw: &str) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
{
    raw.parse().map_err(|e: T::Err| ConfigError::Invalid {
        name,
        reason: e.to_string(),
    })
}

fn parse_address(name: &'static str, raw: &str) -> Result<Address, ConfigError> {
    parse_value(name, raw)
}

/// Polls hit the RPC endpoint every round, so zero is refused.
fn poll_interval(name: &'static str, secs: u64) -> Result<Duration, ConfigError> {
    if secs == 0 {
        return Err(ConfigError::Invalid {
            name,
            reason: "must be at least 1 second".to_string(),
        });
    }
    Ok(Duration::from_secs(secs))
}
