// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Error taxonomy for the recovery lifecycle.
//!
//! Every error that reaches the caller carries a human-readable message and,
//! where a network or chain boundary was involved, the [`Operation`] that
//! failed so the caller can decide whether to retry the whole user action.
//!
//! | Class | Variant | Retried automatically |
//! |-------|---------|-----------------------|
//! | Input validation | [`RecoveryError::Validation`] | never |
//! | State-sync problems | [`RecoveryError::Precondition`] | never |
//! | Relayer failures | [`RecoveryError::Relay`] | once, inside the relayer client |
//! | On-chain submissions | [`RecoveryError::Submission`] | never |
//! | Chain reads | [`RecoveryError::Chain`] | never |

use std::fmt;

use alloy::primitives::Address;

use crate::blockchain::ChainClientError;
use crate::relayer::RelayerError;
use crate::storage::StoreError;

/// Fallback shown when an underlying error carries no usable message.
pub const GENERIC_FAILURE_MESSAGE: &str = "Something went wrong, please try again.";

/// The user-visible operation an error belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    InstallModule,
    AcceptanceRequest,
    RecoveryRequest,
    CompleteRecovery,
    CancelRecovery,
    ReadGuardianConfig,
    ReadRecoveryRequest,
    ReadCommandTemplates,
    ReadOwners,
    ReadAccountCode,
    ReadModuleInstalled,
    ReadLatestBlock,
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Operation::InstallModule => "install_module",
            Operation::AcceptanceRequest => "acceptance_request",
            Operation::RecoveryRequest => "recovery_request",
            Operation::CompleteRecovery => "complete_recovery",
            Operation::CancelRecovery => "cancel_recovery",
            Operation::ReadGuardianConfig => "get_guardian_config",
            Operation::ReadRecoveryRequest => "get_recovery_request",
            Operation::ReadCommandTemplates => "get_command_templates",
            Operation::ReadOwners => "get_owners",
            Operation::ReadAccountCode => "get_code",
            Operation::ReadModuleInstalled => "is_module_installed",
            Operation::ReadLatestBlock => "get_latest_block",
        };
        f.write_str(name)
    }
}

/// Input rejected locally before any network or chain call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("Guardian email not set")]
    MissingGuardianEmail,

    #[error("Invalid guardian email: {0}")]
    InvalidGuardianEmail(String),

    #[error("New owner not set")]
    MissingNewOwner,

    #[error("Invalid address: {0}")]
    InvalidAddress(String),

    #[error("Recovery delay must be at least {minimum_secs} seconds (got {requested_secs})")]
    DelayBelowMinimum {
        requested_secs: u64,
        minimum_secs: u64,
    },

    #[error("Recovery delay overflows: {0}")]
    DelayOverflow(String),

    #[error("New owner {0} is the owner being replaced")]
    NewOwnerUnchanged(Address),

    #[error("New owner {0} is already an owner of the account")]
    NewOwnerAlreadyOwner(Address),

    #[error("Invalid account code: {0}")]
    InvalidAccountCode(String),
}

/// Local or on-chain state does not allow the requested step.
///
/// These point at a state-sync problem rather than a network problem.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PreconditionError {
    #[error("Recovery delay has not passed ({remaining_secs} seconds remaining)")]
    TimelockNotElapsed { remaining_secs: u64 },

    #[error("Owner {owner} not found in the account's owner list")]
    OwnerNotFound { owner: Address },

    #[error("Account has no owners")]
    EmptyOwnerList,

    #[error("Account code not found in storage despite module being installed. Reset and try again.")]
    MissingAccountCode,

    #[error("Cannot {operation} while recovery is {state}")]
    UnexpectedState { operation: Operation, state: String },

    #[error("Command template {index} not found on the recovery module")]
    MissingCommandTemplate { index: usize },

    #[error("Command template has no `{placeholder}` placeholder")]
    TemplatePlaceholderMissing { placeholder: String },
}

/// Errors surfaced by the recovery orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum RecoveryError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Precondition(#[from] PreconditionError),

    #[error("Relayer {operation} failed: {source}")]
    Relay {
        operation: Operation,
        #[source]
        source: RelayerError,
    },

    #[error("{operation} submission failed: {message}")]
    Submission { operation: Operation, message: String },

    #[error("Chain read {operation} failed: {message}")]
    Chain { operation: Operation, message: String },

    #[error("Session storage error: {0}")]
    Storage(#[from] StoreError),

    #[error("Secure randomness unavailable: {0}")]
    Randomness(String),
}

impl RecoveryError {
    pub fn relay(operation: Operation, source: RelayerError) -> Self {
        RecoveryError::Relay { operation, source }
    }

    /// Build a submission error, keeping only the short human-readable part
    /// of the underlying message.
    pub fn submission(operation: Operation, raw: impl fmt::Display) -> Self {
        RecoveryError::Submission {
            operation,
            message: short_message(&raw.to_string()),
        }
    }

    pub fn chain(operation: Operation, raw: impl fmt::Display) -> Self {
        RecoveryError::Chain {
            operation,
            message: raw.to_string(),
        }
    }

    /// The operation that failed, when the error crossed a network boundary.
    pub fn operation(&self) -> Option<Operation> {
        match self {
            RecoveryError::Relay { operation, .. }
            | RecoveryError::Submission { operation, .. }
            | RecoveryError::Chain { operation, .. } => Some(*operation),
            RecoveryError::Precondition(PreconditionError::UnexpectedState {
                operation, ..
            }) => Some(*operation),
            _ => None,
        }
    }

    /// Whether re-running the whole user action might succeed without the
    /// user changing anything.
    pub fn is_retryable_action(&self) -> bool {
        matches!(
            self,
            RecoveryError::Relay { .. } | RecoveryError::Submission { .. } | RecoveryError::Chain { .. }
        )
    }
}

/// Errors wiring a state machine to its production collaborators.
#[derive(Debug, thiserror::Error)]
pub enum ConnectError {
    #[error(transparent)]
    Chain(#[from] ChainClientError),

    #[error(transparent)]
    Relayer(#[from] RelayerError),

    #[error(transparent)]
    Storage(#[from] StoreError),
}

/// Extract a short human-readable message from a verbose error string.
///
/// RPC and bundler errors tend to carry request dumps after the first line;
/// only the first non-empty line is kept.
pub fn short_message(raw: &str) -> String {
    raw.lines()
        .map(str::trim)
        .find(|line| !line.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| GENERIC_FAILURE_MESSAGE.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn short_message_keeps_first_line() {
        let raw = "User rejected the request.\n\nRequest Arguments:\n  from: 0xabc";
        assert_eq!(short_message(raw), "User rejected the request.");
    }

    #[test]
    fn short_message_falls_back_when_empty() {
        assert_eq!(short_message("  \n "), GENERIC_FAILURE_MESSAGE);
    }

    #[test]
    fn operation_is_reported_for_boundary_errors() {
        let err = RecoveryError::submission(Operation::CancelRecovery, "reverted");
        assert_eq!(err.operation(), Some(Operation::CancelRecovery));
        assert!(err.is_retryable_action());

        let err = RecoveryError::from(ValidationError::MissingNewOwner);
        assert_eq!(err.operation(), None);
        assert!(!err.is_retryable_action());
        assert_eq!(err.to_string(), "New owner not set");
    }

    #[test]
    fn timelock_message_names_remaining_time() {
        let err = RecoveryError::from(PreconditionError::TimelockNotElapsed { remaining_secs: 42 });
        assert!(err.to_string().contains("42 seconds"));
    }
}
