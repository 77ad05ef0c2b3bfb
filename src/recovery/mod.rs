// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Email Guardian Recovery
//!
//! Social recovery for smart accounts through an email-identified guardian:
//!
//! 1. `setup_guardian` generates a secret account code, derives the
//!    guardian's address from it, installs the recovery module and asks the
//!    relayer to email the guardian.
//! 2. The guardian accepts by replying to the email; the module records it.
//! 3. `request_recovery` asks the guardian to approve swapping the account's
//!    owner; once approved, the module's timelock starts.
//! 4. After the timelock, `complete_recovery` has the relayer execute the
//!    owner swap. `cancel_recovery` aborts it at any point before that.
//!
//! ## Modules
//!
//! - `account_code` / `guardian` - secret code and guardian derivation
//! - `configurator` - module installation payload and submission
//! - `ownership` - `swapOwner` calldata and recovery data
//! - `state_machine` / `polling` - lifecycle, waits and countdown
//! - `chain` / `account` - chain reads and account execution seams

pub mod account;
pub mod account_code;
pub mod chain;
pub mod command;
pub mod configurator;
pub mod delay;
pub mod error;
pub mod guardian;
pub mod ownership;
mod polling;
pub mod state_machine;
pub mod types;

pub use account::{
    AccountBinding, AccountCall, AccountKind, CallExecutor, ExecutionError, ExecutionPath,
    ExecutionReceipt, SmartAccountHandle,
};
pub use account_code::AccountCode;
pub use chain::RecoveryChainReader;
pub use configurator::{InstallOutcome, RecoveryModuleConfigurator};
pub use delay::{format_countdown, RecoveryDelay, TimeUnit};
pub use error::{Operation, PreconditionError, RecoveryError, ValidationError};
pub use guardian::{derive_guardian_identity, GuardianIdentity};
pub use ownership::{build_swap, OwnerSwap};
pub use state_machine::{RecoveryState, RecoveryStateMachine, RequestedRecovery, SetupOutcome};
pub use types::{GuardianConfig, RecoveryRequest};
