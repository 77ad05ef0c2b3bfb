// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Recovery Lifecycle State Machine
//!
//! Drives one smart account through the email-guardian recovery lifecycle:
//!
//! ```text
//! NotConfigured ──setup_guardian──▶ AwaitingGuardianAcceptance ──(poll)──▶ Ready
//! Ready ──request_recovery──▶ RecoveryRequested ──(poll)──▶ TimelockPending ──(tick)──▶ Completable
//! Completable ──complete_recovery──▶ Completed
//! RecoveryRequested | TimelockPending | Completable ──cancel_recovery──▶ Ready
//! any ──reset──▶ NotConfigured
//! ```
//!
//! The chain is the source of truth; [`RecoveryStateMachine::sync`] re-derives
//! the state from it after a restart. State is published on a
//! `tokio::sync::watch` channel and observers only read it.
//!
//! ## Late Results
//!
//! Every transition names the states it may leave from, and is dropped if the
//! machine has been cancelled or reset since the operation started (tracked
//! by an epoch counter). A relayer response that arrives after a cancel can
//! therefore never resurrect a state.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, PoisonError};

use alloy::primitives::{Address, B256, U256};
use alloy::sol_types::SolCall;
use tokio::sync::watch;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

use super::account::{AccountCall, ExecutionReceipt, SmartAccountHandle};
use super::account_code::AccountCode;
use super::chain::RecoveryChainReader;
use super::command::{hydrate_command, ETH_ADDR_PLACEHOLDER, STRING_PLACEHOLDER, TEMPLATE_IDX};
use super::configurator::{InstallOutcome, RecoveryModuleConfigurator};
use super::delay::{format_countdown, RecoveryDelay};
use super::error::{ConnectError, Operation, PreconditionError, RecoveryError, ValidationError};
use super::guardian::{validate_email, GuardianIdentity};
use super::ownership::{build_swap, recovery_data, recovery_data_hash, OwnerSwap};
use super::types::RecoveryRequest;
use crate::blockchain::contracts::IEmailRecoveryModule;
use crate::blockchain::ChainClient;
use crate::config::{RecoveryConfig, RecoveryPolicy};
use crate::relayer::{
    AcceptanceRequest, CompleteRecoveryRequest, CompleteRecoveryResponse, RecoveryRequestBody,
    RelayerApi, RelayerClient,
};
use crate::storage::{RedbStore, SessionRepository};

// =============================================================================
// State
// =============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryState {
    NotConfigured,
    AwaitingGuardianAcceptance,
    Ready,
    RecoveryRequested,
    TimelockPending { remaining_secs: u64 },
    Completable,
    Completed,
}

impl RecoveryState {
    /// A recovery request is open on-chain.
    pub fn is_recovery_in_progress(&self) -> bool {
        matches!(
            self,
            RecoveryState::RecoveryRequested
                | RecoveryState::TimelockPending { .. }
                | RecoveryState::Completable
        )
    }

    fn name(&self) -> &'static str {
        match self {
            RecoveryState::NotConfigured => "not_configured",
            RecoveryState::AwaitingGuardianAcceptance => "awaiting_guardian_acceptance",
            RecoveryState::Ready => "ready",
            RecoveryState::RecoveryRequested => "recovery_requested",
            RecoveryState::TimelockPending { .. } => "timelock_pending",
            RecoveryState::Completable => "completable",
            RecoveryState::Completed => "completed",
        }
    }
}

impl fmt::Display for RecoveryState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryState::TimelockPending { remaining_secs } => {
                write!(f, "timelock_pending ({})", format_countdown(*remaining_secs))
            }
            other => f.write_str(other.name()),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetupOutcome {
    /// The guardian has been emailed. `installation` is `None` when the
    /// module was already installed and only the email was resent.
    AcceptanceRequested {
        guardian: GuardianIdentity,
        installation: Option<ExecutionReceipt>,
    },
    /// The guardian already accepted; nothing was sent.
    AlreadyAccepted,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestedRecovery {
    pub new_owner: Address,
    pub previous_owner: Address,
    pub recovery_data_hash: B256,
    pub command: String,
}

// =============================================================================
// Internals
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub(crate) enum WaitPurpose {
    GuardianAcceptance,
    RecoveryApproval,
    Countdown,
}

/// `executeAfter` pinned against one chain timestamp read.
#[derive(Debug, Clone, Copy)]
pub(crate) struct TimelockCountdown {
    pub execute_after: u64,
    pub chain_now: u64,
    pub synced_at: Instant,
}

impl TimelockCountdown {
    pub fn remaining_secs(&self) -> u64 {
        let elapsed = self.synced_at.elapsed().as_secs();
        self.execute_after
            .saturating_sub(self.chain_now.saturating_add(elapsed))
    }
}

pub(crate) struct Inner {
    pub account: SmartAccountHandle,
    pub module: Address,
    pub chain: Arc<dyn RecoveryChainReader>,
    pub relayer: Arc<dyn RelayerApi>,
    pub session: SessionRepository,
    pub configurator: RecoveryModuleConfigurator,
    pub policy: RecoveryPolicy,
    pub state: watch::Sender<RecoveryState>,
    pub waits: Mutex<HashMap<WaitPurpose, CancellationToken>>,
    pub countdown: Mutex<Option<TimelockCountdown>>,
    pub epoch: AtomicU64,
}

// =============================================================================
// RecoveryStateMachine
// =============================================================================

/// Cheap to clone; clones share the same state and wait tasks.
#[derive(Clone)]
pub struct RecoveryStateMachine {
    pub(crate) inner: Arc<Inner>,
}

impl RecoveryStateMachine {
    pub fn new(
        account: SmartAccountHandle,
        module: Address,
        chain: Arc<dyn RecoveryChainReader>,
        relayer: Arc<dyn RelayerApi>,
        session: SessionRepository,
        policy: RecoveryPolicy,
    ) -> Self {
        let configurator =
            RecoveryModuleConfigurator::new(module, chain.clone(), policy.minimum_delay_secs);
        let (state, _) = watch::channel(RecoveryState::NotConfigured);
        Self {
            inner: Arc::new(Inner {
                account,
                module,
                chain,
                relayer,
                session,
                configurator,
                policy,
                state,
                waits: Mutex::new(HashMap::new()),
                countdown: Mutex::new(None),
                epoch: AtomicU64::new(0),
            }),
        }
    }

    /// Wire a machine to the JSON-RPC chain, the HTTP relayer and the redb
    /// session file named in `config`, and remember the account in the
    /// session.
    pub fn connect(config: &RecoveryConfig, account: SmartAccountHandle) -> Result<Self, ConnectError> {
        let chain = ChainClient::new(&config.rpc_url, config.recovery_module)?;
        let relayer = RelayerClient::from_config(config)?;
        let session = SessionRepository::new(Arc::new(RedbStore::open(&config.session_db_path)?));
        session.set_account(account.address(), account.kind())?;

        tracing::info!(
            account = %account.address(),
            kind = %account.kind(),
            module = %config.recovery_module,
            relayer = %config.relayer_url,
            "Recovery state machine connected"
        );
        Ok(Self::new(
            account,
            config.recovery_module,
            Arc::new(chain),
            Arc::new(relayer),
            session,
            config.policy.clone(),
        ))
    }

    pub fn account(&self) -> Address {
        self.inner.account.address()
    }

    pub fn state(&self) -> RecoveryState {
        self.inner.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<RecoveryState> {
        self.inner.state.subscribe()
    }

    /// Seconds left on the cached timelock countdown, if one is running.
    pub fn countdown_remaining(&self) -> Option<u64> {
        self.inner
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .map(|countdown| countdown.remaining_secs())
    }

    /// Human-readable countdown, e.g. `"2 Hours and 5 Mins"`.
    pub fn countdown_display(&self) -> Option<String> {
        self.countdown_remaining().map(format_countdown)
    }

    // =========================================================================
    // Transition plumbing
    // =========================================================================

    pub(crate) fn epoch(&self) -> u64 {
        self.inner.epoch.load(Ordering::SeqCst)
    }

    fn bump_epoch(&self) {
        self.inner.epoch.fetch_add(1, Ordering::SeqCst);
    }

    /// Move to `next` if the machine is still in the epoch the caller started
    /// in and the current state satisfies `allowed`. Returns whether the
    /// transition was accepted.
    pub(crate) fn transition<F>(&self, epoch: u64, allowed: F, next: RecoveryState) -> bool
    where
        F: Fn(&RecoveryState) -> bool,
    {
        let mut accepted = false;
        let mut previous = None;
        self.inner.state.send_if_modified(|current| {
            // Checked under the channel lock so a concurrent reset either
            // overwrites this transition or invalidates it.
            if self.inner.epoch.load(Ordering::SeqCst) != epoch || !allowed(current) {
                return false;
            }
            accepted = true;
            if *current == next {
                return false;
            }
            previous = Some(std::mem::replace(current, next.clone()));
            true
        });

        match previous {
            Some(from) if from.name() != next.name() => {
                tracing::info!(
                    account = %self.account(),
                    from = from.name(),
                    to = next.name(),
                    "Recovery state transition"
                );
            }
            _ if !accepted => {
                tracing::debug!(
                    account = %self.account(),
                    to = next.name(),
                    current = %self.state(),
                    "Dropping stale recovery transition"
                );
            }
            _ => {}
        }
        accepted
    }

    fn force_state(&self, next: RecoveryState) {
        let previous = self.inner.state.send_replace(next.clone());
        if previous.name() != next.name() {
            tracing::info!(
                account = %self.account(),
                from = previous.name(),
                to = next.name(),
                "Recovery state reset"
            );
        }
    }

    fn unexpected_state(&self, operation: Operation) -> RecoveryError {
        PreconditionError::UnexpectedState {
            operation,
            state: self.state().to_string(),
        }
        .into()
    }

    pub(crate) fn set_countdown(&self, countdown: Option<TimelockCountdown>) {
        *self
            .inner
            .countdown
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = countdown;
    }

    // =========================================================================
    // Sync
    // =========================================================================

    /// Re-derive the state from the chain and restart the matching wait.
    pub async fn sync(&self) -> Result<RecoveryState, RecoveryError> {
        let epoch = self.epoch();
        let account = self.account();
        let config = self.inner.chain.guardian_config(account).await?;

        if !config.is_installed() {
            self.cancel_waits(&[WaitPurpose::RecoveryApproval, WaitPurpose::Countdown]);
            self.apply_synced(epoch, RecoveryState::NotConfigured);
            return Ok(self.state());
        }

        if !config.is_accepted() {
            self.apply_synced(epoch, RecoveryState::AwaitingGuardianAcceptance);
            self.watch_guardian_acceptance();
            return Ok(self.state());
        }

        let request = self.inner.chain.recovery_request(account).await?;
        if !request.is_open() {
            self.cancel_waits(&[WaitPurpose::Countdown]);
            self.set_countdown(None);
            // The module records nothing until the guardian replies, so a
            // stored new owner is the only trace of a pending request.
            if self.inner.session.new_owner()?.is_some() {
                self.apply_synced(epoch, RecoveryState::RecoveryRequested);
                self.watch_recovery_approval();
            } else {
                self.cancel_waits(&[WaitPurpose::RecoveryApproval]);
                self.apply_synced(epoch, RecoveryState::Ready);
            }
            return Ok(self.state());
        }

        if !request.has_quorum(config.threshold) {
            self.apply_synced(epoch, RecoveryState::RecoveryRequested);
            self.watch_recovery_approval();
            return Ok(self.state());
        }

        let chain_now = self.inner.chain.latest_block_timestamp().await?;
        self.enter_timelock(epoch, &request, chain_now, |_| true);
        Ok(self.state())
    }

    fn apply_synced(&self, epoch: u64, next: RecoveryState) {
        self.transition(epoch, |_| true, next);
    }

    /// Cache the countdown for an approved request and move to
    /// `TimelockPending` or straight to `Completable`.
    pub(crate) fn enter_timelock<F>(&self, epoch: u64, request: &RecoveryRequest, chain_now: u64, allowed: F)
    where
        F: Fn(&RecoveryState) -> bool,
    {
        if epoch != self.epoch() {
            return;
        }
        let countdown = TimelockCountdown {
            execute_after: request.execute_after,
            chain_now,
            synced_at: Instant::now(),
        };
        let remaining_secs = countdown.remaining_secs();
        self.set_countdown(Some(countdown));

        if remaining_secs == 0 {
            self.transition(epoch, &allowed, RecoveryState::Completable);
            return;
        }
        if self.transition(epoch, &allowed, RecoveryState::TimelockPending { remaining_secs }) {
            tracing::info!(
                account = %self.account(),
                remaining = %format_countdown(remaining_secs),
                "Recovery approved, timelock running"
            );
            self.start_countdown();
        }
    }

    // =========================================================================
    // Guardian setup
    // =========================================================================

    /// Install the module (if needed) and email the guardian for acceptance.
    pub async fn setup_guardian(
        &self,
        guardian_email: &str,
        delay: RecoveryDelay,
    ) -> Result<SetupOutcome, RecoveryError> {
        let email = validate_email(guardian_email)?;
        let delay_secs = delay.validated_secs(self.inner.policy.minimum_delay_secs)?;

        let epoch = self.epoch();
        if self.state().is_recovery_in_progress() {
            return Err(self.unexpected_state(Operation::AcceptanceRequest));
        }

        let account = self.account();
        let config = self.inner.chain.guardian_config(account).await?;
        if config.is_accepted() {
            tracing::info!(account = %account, "Guardian already accepted");
            self.transition(
                epoch,
                |s| matches!(s, RecoveryState::NotConfigured | RecoveryState::AwaitingGuardianAcceptance),
                RecoveryState::Ready,
            );
            return Ok(SetupOutcome::AlreadyAccepted);
        }

        let account_code = if config.is_installed() {
            // The on-chain guardian was derived from the stored code; a new
            // one would orphan it.
            self.inner
                .session
                .account_code()?
                .ok_or(PreconditionError::MissingAccountCode)?
        } else {
            let code = AccountCode::generate()?;
            self.inner.session.set_account_code(&code)?;
            code
        };
        self.inner.session.set_guardian_email(&email)?;

        let outcome = self
            .inner
            .configurator
            .install(&self.inner.account, &account_code, &email, delay_secs)
            .await?;
        let installation = match outcome {
            InstallOutcome::Installed { receipt, .. } => Some(receipt),
            InstallOutcome::AlreadyInstalled { .. } => None,
        };

        let account_hex = account.to_string();
        let templates = self.inner.chain.acceptance_command_templates().await?;
        let command = hydrate_command(
            &templates,
            TEMPLATE_IDX,
            &[(ETH_ADDR_PLACEHOLDER, account_hex.as_str())],
        )?;

        let request = AcceptanceRequest::new(
            self.inner.module,
            &email,
            account_code.to_relayer_hex(),
            TEMPLATE_IDX,
            command,
        );
        self.inner
            .relayer
            .acceptance_request(&request)
            .await
            .map_err(|e| {
                tracing::error!(account = %account, error = %e, "Acceptance request failed");
                RecoveryError::relay(Operation::AcceptanceRequest, e)
            })?;

        if self.transition(
            epoch,
            |s| matches!(s, RecoveryState::NotConfigured | RecoveryState::AwaitingGuardianAcceptance),
            RecoveryState::AwaitingGuardianAcceptance,
        ) {
            self.watch_guardian_acceptance();
        }

        Ok(SetupOutcome::AcceptanceRequested {
            guardian: outcome.guardian(),
            installation,
        })
    }

    // =========================================================================
    // Recovery request
    // =========================================================================

    /// Ask the guardian to approve replacing the account's first owner with
    /// `new_owner`. Falls back to the stored guardian email when none is given.
    pub async fn request_recovery(
        &self,
        new_owner: &str,
        guardian_email: Option<&str>,
    ) -> Result<RequestedRecovery, RecoveryError> {
        let email = match guardian_email.filter(|e| !e.trim().is_empty()) {
            Some(email) => validate_email(email)?,
            None => self
                .inner
                .session
                .guardian_email()?
                .ok_or(ValidationError::MissingGuardianEmail)?,
        };
        let new_owner = parse_new_owner(new_owner)?;

        let epoch = self.epoch();
        if self.state() != RecoveryState::Ready {
            return Err(self.unexpected_state(Operation::RecoveryRequest));
        }

        let account = self.account();
        let swap = self.current_swap(new_owner).await?;
        self.inner.session.set_new_owner(new_owner)?;

        let data = recovery_data(account, &swap);
        let hash = recovery_data_hash(&data);
        let (account_hex, hash_hex) = (account.to_string(), hash.to_string());
        let templates = self.inner.chain.recovery_command_templates().await?;
        let command = hydrate_command(
            &templates,
            TEMPLATE_IDX,
            &[
                (ETH_ADDR_PLACEHOLDER, account_hex.as_str()),
                (STRING_PLACEHOLDER, hash_hex.as_str()),
            ],
        )?;

        let request = RecoveryRequestBody::new(self.inner.module, &email, TEMPLATE_IDX, command.clone());
        if let Err(e) = self.inner.relayer.recovery_request(&request).await {
            tracing::error!(account = %account, error = %e, "Recovery request failed");
            if let Err(store) = self.inner.session.clear_new_owner() {
                tracing::warn!(account = %account, error = %store, "Failed to clear new owner");
            }
            return Err(RecoveryError::relay(Operation::RecoveryRequest, e));
        }

        if self.transition(
            epoch,
            |s| *s == RecoveryState::Ready,
            RecoveryState::RecoveryRequested,
        ) {
            self.watch_recovery_approval();
        }

        Ok(RequestedRecovery {
            new_owner,
            previous_owner: swap.previous_owner,
            recovery_data_hash: hash,
            command,
        })
    }

    /// `swapOwner` replacing the first owner with `new_owner`.
    async fn current_swap(&self, new_owner: Address) -> Result<OwnerSwap, RecoveryError> {
        let owners = self.inner.chain.owners(self.account()).await?;
        let old_owner = *owners.first().ok_or(PreconditionError::EmptyOwnerList)?;
        build_swap(old_owner, new_owner, &owners)
    }

    // =========================================================================
    // Completion
    // =========================================================================

    /// Ask the relayer to execute the approved recovery.
    ///
    /// Refuses without any network call while the cached timelock countdown
    /// is still running.
    pub async fn complete_recovery(&self) -> Result<CompleteRecoveryResponse, RecoveryError> {
        if let Some(remaining_secs) = self.countdown_remaining().filter(|r| *r > 0) {
            return Err(PreconditionError::TimelockNotElapsed { remaining_secs }.into());
        }
        if let RecoveryState::TimelockPending { remaining_secs } = self.state() {
            return Err(PreconditionError::TimelockNotElapsed { remaining_secs }.into());
        }
        if self.state() != RecoveryState::Completable {
            return Err(self.unexpected_state(Operation::CompleteRecovery));
        }
        let new_owner = self
            .inner
            .session
            .new_owner()?
            .ok_or(ValidationError::MissingNewOwner)?;

        let epoch = self.epoch();
        let account = self.account();
        let swap = self.current_swap(new_owner).await?;
        let data = recovery_data(account, &swap);

        let request = CompleteRecoveryRequest::new(self.inner.module, account, &data);
        let response = self
            .inner
            .relayer
            .complete_recovery(&request)
            .await
            .map_err(|e| {
                tracing::error!(account = %account, error = %e, "Recovery completion failed");
                RecoveryError::relay(Operation::CompleteRecovery, e)
            })?;

        self.inner.session.clear_new_owner()?;
        if self.transition(
            epoch,
            |s| *s == RecoveryState::Completable,
            RecoveryState::Completed,
        ) {
            self.cancel_waits(&[WaitPurpose::RecoveryApproval, WaitPurpose::Countdown]);
            self.set_countdown(None);
            tracing::info!(
                account = %account,
                new_owner = %new_owner,
                request_id = ?response.data.request_id,
                tx_hash = ?response.data.transaction_hash,
                "Recovery completed"
            );
        } else {
            tracing::debug!(
                account = %account,
                state = %self.state(),
                request_id = ?response.data.request_id,
                "Relayer accepted completion after the recovery was cancelled or reset"
            );
        }
        Ok(response)
    }

    // =========================================================================
    // Cancel / reset
    // =========================================================================

    /// Cancel the open recovery request through the account.
    pub async fn cancel_recovery(&self) -> Result<ExecutionReceipt, RecoveryError> {
        if !self.state().is_recovery_in_progress() {
            return Err(self.unexpected_state(Operation::CancelRecovery));
        }

        let account = self.account();
        let has_code = self.inner.chain.has_code(account).await?;
        let call = AccountCall {
            to: self.inner.module,
            value: U256::ZERO,
            data: IEmailRecoveryModule::cancelRecoveryCall {}.abi_encode().into(),
        };
        let receipt = self
            .inner
            .account
            .execute_call(call, has_code)
            .await
            .map_err(|e| {
                tracing::error!(account = %account, error = %e, "Cancel recovery failed");
                RecoveryError::submission(Operation::CancelRecovery, e)
            })?;

        self.inner.session.clear_new_owner()?;
        self.cancel_waits(&[WaitPurpose::RecoveryApproval, WaitPurpose::Countdown]);
        self.set_countdown(None);
        self.bump_epoch();
        self.transition(
            self.epoch(),
            RecoveryState::is_recovery_in_progress,
            RecoveryState::Ready,
        );
        tracing::info!(account = %account, tx_hash = %receipt.hash, "Recovery cancelled");
        Ok(receipt)
    }

    /// Stop every wait, wipe the persisted session and start over.
    ///
    /// Returns the new burner salt nonce.
    pub fn reset(&self) -> Result<u64, RecoveryError> {
        self.bump_epoch();
        self.cancel_waits(&[
            WaitPurpose::GuardianAcceptance,
            WaitPurpose::RecoveryApproval,
            WaitPurpose::Countdown,
        ]);
        self.set_countdown(None);
        self.force_state(RecoveryState::NotConfigured);
        let salt_nonce = self.inner.session.reset()?;
        tracing::info!(account = %self.account(), salt_nonce, "Recovery session reset");
        Ok(salt_nonce)
    }
}

fn parse_new_owner(raw: &str) -> Result<Address, ValidationError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(ValidationError::MissingNewOwner);
    }
    raw.parse::<Address>()
        .map_err(|_| ValidationError::InvalidAddress(raw.to_string()))
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicBool, AtomicUsize};
    use std::time::Duration;

    use alloy::primitives::{address, hex};
    use async_trait::async_trait;
    use tokio::sync::Notify;

    use super::*;
    use crate::recovery::account::testing::RecordingExecutor;
    use crate::recovery::account::{AccountBinding, AccountKind};
    use crate::recovery::chain::testing::FakeChain;
    use crate::recovery::delay::TimeUnit;
    use crate::recovery::ownership::SENTINEL_OWNER;
    use crate::relayer::{CompletionReceipt, RelayerAck, RelayerError, RequestId};
    use crate::storage::InMemoryStore;

    const ACCOUNT: Address = address!("0xa11ce00000000000000000000000000000000001");
    const MODULE: Address = address!("0x3636363636363636363636363636363636363636");
    const OLD_OWNER: Address = address!("0x0b0b000000000000000000000000000000000001");
    const NEW_OWNER: &str = "0xc0ffee0000000000000000000000000000000002";

    #[derive(Default)]
    struct FakeRelayer {
        acceptance: Mutex<Vec<AcceptanceRequest>>,
        recovery: Mutex<Vec<RecoveryRequestBody>>,
        completions: Mutex<Vec<CompleteRecoveryRequest>>,
        reject: AtomicBool,
        gated: AtomicBool,
        entered: Notify,
        release: Notify,
    }

    impl FakeRelayer {
        fn outcome(&self, path: &str) -> Result<(), RelayerError> {
            if self.reject.load(Ordering::SeqCst) {
                return Err(RelayerError::Rejected {
                    path: path.to_string(),
                    status: 400,
                    message: "guardian email not found".to_string(),
                });
            }
            Ok(())
        }

        async fn hold_if_gated(&self) {
            if self.gated.load(Ordering::SeqCst) {
                self.entered.notify_one();
                self.release.notified().await;
            }
        }

        fn ack() -> RelayerAck {
            RelayerAck {
                status: 200,
                body: serde_json::json!({ "status": "ok" }),
            }
        }
    }

    #[async_trait]
    impl RelayerApi for FakeRelayer {
        async fn acceptance_request(&self, request: &AcceptanceRequest) -> Result<RelayerAck, RelayerError> {
            self.acceptance.lock().unwrap().push(request.clone());
            self.hold_if_gated().await;
            self.outcome("/acceptanceRequest").map(|_| Self::ack())
        }

        async fn recovery_request(&self, request: &RecoveryRequestBody) -> Result<RelayerAck, RelayerError> {
            self.recovery.lock().unwrap().push(request.clone());
            self.hold_if_gated().await;
            self.outcome("/recoveryRequest").map(|_| Self::ack())
        }

        async fn complete_recovery(
            &self,
            request: &CompleteRecoveryRequest,
        ) -> Result<CompleteRecoveryResponse, RelayerError> {
            self.completions.lock().unwrap().push(request.clone());
            self.hold_if_gated().await;
            self.outcome("/completeRequest")?;
            Ok(CompleteRecoveryResponse {
                status: 200,
                data: CompletionReceipt {
                    request_id: Some(RequestId::Number(7)),
                    transaction_hash: None,
                },
            })
        }
    }

    struct Harness {
        machine: RecoveryStateMachine,
        chain: Arc<FakeChain>,
        relayer: Arc<FakeRelayer>,
        executor: Arc<RecordingExecutor>,
        session: SessionRepository,
    }

    fn harness() -> Harness {
        let chain = Arc::new(FakeChain::default());
        *chain.owners.lock().unwrap() = vec![OLD_OWNER];
        let relayer = Arc::new(FakeRelayer::default());
        let executor = Arc::new(RecordingExecutor::default());
        let session = SessionRepository::new(Arc::new(InMemoryStore::new()));
        let handle = SmartAccountHandle::new(
            AccountKind::Safe,
            AccountBinding::new(ACCOUNT, executor.clone()),
        );
        let machine = RecoveryStateMachine::new(
            handle,
            MODULE,
            chain.clone(),
            relayer.clone(),
            session.clone(),
            RecoveryPolicy::default(),
        );
        Harness {
            machine,
            chain,
            relayer,
            executor,
            session,
        }
    }

    fn new_owner() -> Address {
        NEW_OWNER.parse().unwrap()
    }

    fn six_hours() -> RecoveryDelay {
        RecoveryDelay::new(6, TimeUnit::Hours)
    }

    /// Guardian accepted, stored email, machine synced to `Ready`.
    async fn ready_harness() -> Harness {
        let h = harness();
        h.chain.set_installed(true);
        h.session.set_guardian_email("guardian@example.com").unwrap();
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Ready);
        h
    }

    fn reads(counter: &AtomicUsize) -> usize {
        counter.load(Ordering::SeqCst)
    }

    #[tokio::test(start_paused = true)]
    async fn sync_derives_state_from_chain() {
        let h = harness();
        let now = h.chain.now();

        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::NotConfigured);

        h.chain.set_installed(false);
        assert_eq!(
            h.machine.sync().await.unwrap(),
            RecoveryState::AwaitingGuardianAcceptance
        );

        h.chain.set_installed(true);
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Ready);

        // requested but not yet approved: nothing on chain, new owner stored
        h.session.set_new_owner(new_owner()).unwrap();
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::RecoveryRequested);

        h.chain.set_request(now + 600, 1);
        assert_eq!(
            h.machine.sync().await.unwrap(),
            RecoveryState::TimelockPending { remaining_secs: 600 }
        );
        assert_eq!(h.machine.countdown_display().as_deref(), Some("10 Mins"));

        h.chain.set_request(now - 1, 1);
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Completable);

        h.chain.clear_request();
        h.session.clear_new_owner().unwrap();
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Ready);
        assert_eq!(h.machine.countdown_remaining(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn reload_resumes_unapproved_recovery() {
        let h = ready_harness().await;
        h.machine.request_recovery(NEW_OWNER, None).await.unwrap();
        assert_eq!(h.relayer.recovery.lock().unwrap().len(), 1);

        let reloaded = RecoveryStateMachine::new(
            SmartAccountHandle::new(
                AccountKind::Safe,
                AccountBinding::new(ACCOUNT, h.executor.clone()),
            ),
            MODULE,
            h.chain.clone(),
            h.relayer.clone(),
            h.session.clone(),
            RecoveryPolicy::default(),
        );
        assert_eq!(
            reloaded.sync().await.unwrap(),
            RecoveryState::RecoveryRequested
        );

        let mut rx = reloaded.subscribe();
        h.chain.set_request(h.chain.now() + 600, 1);
        rx.wait_for(|s| matches!(s, RecoveryState::TimelockPending { .. }))
            .await
            .unwrap();
        assert_eq!(h.relayer.recovery.lock().unwrap().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn setup_installs_module_and_waits_for_acceptance() {
        let h = harness();
        let mut rx = h.machine.subscribe();

        let outcome = h
            .machine
            .setup_guardian(" Guardian@Example.com ", six_hours())
            .await
            .unwrap();
        let SetupOutcome::AcceptanceRequested { installation, .. } = outcome else {
            panic!("expected acceptance request, got {outcome:?}");
        };
        assert!(installation.is_some());
        assert_eq!(h.executor.call_count(), 1);
        assert_eq!(h.machine.state(), RecoveryState::AwaitingGuardianAcceptance);

        let stored_code = h.session.account_code().unwrap().unwrap();
        let sent = h.relayer.acceptance.lock().unwrap()[0].clone();
        assert_eq!(sent.guardian_email_addr, "guardian@example.com");
        assert_eq!(sent.account_code, stored_code.to_relayer_hex());
        assert_eq!(sent.command, format!("Accept guardian request for {ACCOUNT}"));
        assert_eq!(
            h.session.guardian_email().unwrap().as_deref(),
            Some("guardian@example.com")
        );

        h.chain.set_installed(true);
        rx.wait_for(|s| *s == RecoveryState::Ready).await.unwrap();

        let settled = reads(&h.chain.config_reads);
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(reads(&h.chain.config_reads), settled);
    }

    #[tokio::test(start_paused = true)]
    async fn setup_with_installed_module_reuses_stored_code() {
        let h = harness();
        h.chain.set_installed(false);
        let err = h
            .machine
            .setup_guardian("guardian@example.com", six_hours())
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Precondition(PreconditionError::MissingAccountCode)
        ));
        assert!(h.relayer.acceptance.lock().unwrap().is_empty());
        assert_eq!(h.executor.call_count(), 0);

        let code = AccountCode::from_hex(&"0a".repeat(32)).unwrap();
        h.session.set_account_code(&code).unwrap();
        let outcome = h
            .machine
            .setup_guardian("guardian@example.com", six_hours())
            .await
            .unwrap();
        assert!(matches!(
            outcome,
            SetupOutcome::AcceptanceRequested { installation: None, .. }
        ));
        assert_eq!(h.executor.call_count(), 0);
        assert_eq!(
            h.relayer.acceptance.lock().unwrap()[0].account_code,
            code.to_relayer_hex()
        );
    }

    #[tokio::test(start_paused = true)]
    async fn setup_after_acceptance_sends_nothing() {
        let h = harness();
        h.chain.set_installed(true);

        let outcome = h
            .machine
            .setup_guardian("guardian@example.com", six_hours())
            .await
            .unwrap();
        assert_eq!(outcome, SetupOutcome::AlreadyAccepted);
        assert_eq!(h.machine.state(), RecoveryState::Ready);
        assert!(h.relayer.acceptance.lock().unwrap().is_empty());
        assert_eq!(h.executor.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn short_delay_is_rejected_before_any_call() {
        let h = harness();
        let err = h
            .machine
            .setup_guardian("guardian@example.com", RecoveryDelay::new(5, TimeUnit::Hours))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Validation(ValidationError::DelayBelowMinimum { .. })
        ));
        assert_eq!(reads(&h.chain.config_reads), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn approved_recovery_counts_down_without_chain_reads() {
        let h = ready_harness().await;
        let mut rx = h.machine.subscribe();

        let requested = h.machine.request_recovery(NEW_OWNER, None).await.unwrap();
        assert_eq!(requested.new_owner, new_owner());
        assert_eq!(requested.previous_owner, SENTINEL_OWNER);
        assert_eq!(
            requested.command,
            format!(
                "Recover account {ACCOUNT} using recovery hash {}",
                requested.recovery_data_hash
            )
        );
        assert_eq!(h.machine.state(), RecoveryState::RecoveryRequested);
        assert_eq!(h.session.new_owner().unwrap(), Some(new_owner()));
        assert_eq!(h.relayer.recovery.lock().unwrap()[0].command, requested.command);

        h.chain.set_request(h.chain.now() + 120, 1);
        rx.wait_for(|s| matches!(s, RecoveryState::TimelockPending { .. }))
            .await
            .unwrap();
        assert_eq!(reads(&h.chain.block_reads), 1);
        let request_reads = reads(&h.chain.request_reads);

        rx.wait_for(|s| *s == RecoveryState::Completable).await.unwrap();
        assert_eq!(reads(&h.chain.block_reads), 1);
        assert_eq!(reads(&h.chain.request_reads), request_reads);
    }

    #[tokio::test(start_paused = true)]
    async fn countdown_decreases_every_second_until_completable() {
        let h = ready_harness().await;
        h.machine.request_recovery(NEW_OWNER, None).await.unwrap();
        let mut rx = h.machine.subscribe();

        h.chain.set_request(h.chain.now() + 400, 1);
        let mut seen = Vec::new();
        loop {
            rx.changed().await.unwrap();
            let state = rx.borrow_and_update().clone();
            match state {
                RecoveryState::TimelockPending { remaining_secs } => seen.push(remaining_secs),
                RecoveryState::Completable => break,
                other => panic!("unexpected state {other}"),
            }
        }

        assert_eq!(seen.first(), Some(&400));
        assert!(seen.windows(2).all(|pair| pair[0] > pair[1]), "{seen:?}");
        assert!(seen.len() > 1);
        assert_eq!(reads(&h.chain.block_reads), 1);
        assert_eq!(h.machine.countdown_remaining(), Some(0));
    }

    #[tokio::test(start_paused = true)]
    async fn request_recovery_requires_ready_state() {
        let h = harness();
        let err = h
            .machine
            .request_recovery(NEW_OWNER, Some("guardian@example.com"))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Precondition(PreconditionError::UnexpectedState { .. })
        ));
        assert!(h.relayer.recovery.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn relay_rejection_leaves_state_unchanged() {
        let h = ready_harness().await;
        h.relayer.reject.store(true, Ordering::SeqCst);

        let err = h.machine.request_recovery(NEW_OWNER, None).await.unwrap_err();
        assert_eq!(err.operation(), Some(Operation::RecoveryRequest));
        assert!(matches!(err, RecoveryError::Relay { .. }));
        assert_eq!(h.machine.state(), RecoveryState::Ready);
        assert_eq!(h.session.new_owner().unwrap(), None);
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_is_refused_while_timelock_runs() {
        let h = ready_harness().await;
        h.session.set_new_owner(new_owner()).unwrap();
        h.chain.set_request(h.chain.now() + 600, 1);
        h.machine.sync().await.unwrap();

        let err = h.machine.complete_recovery().await.unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Precondition(PreconditionError::TimelockNotElapsed {
                remaining_secs: 600
            })
        ));
        assert!(h.relayer.completions.lock().unwrap().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn completion_submits_recovery_data_and_clears_new_owner() {
        let h = ready_harness().await;
        h.session.set_new_owner(new_owner()).unwrap();
        h.chain.set_request(h.chain.now() - 1, 1);
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Completable);

        let response = h.machine.complete_recovery().await.unwrap();
        assert_eq!(response.data.request_id, Some(RequestId::Number(7)));
        assert_eq!(h.machine.state(), RecoveryState::Completed);
        assert_eq!(h.session.new_owner().unwrap(), None);

        let swap = build_swap(OLD_OWNER, new_owner(), &[OLD_OWNER]).unwrap();
        let sent = h.relayer.completions.lock().unwrap()[0].clone();
        assert_eq!(
            sent.complete_calldata,
            hex::encode_prefixed(recovery_data(ACCOUNT, &swap))
        );
        assert_eq!(sent.account_eth_addr, ACCOUNT.to_string());
        assert_eq!(sent.controller_eth_addr, MODULE.to_string());
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_returns_to_ready_and_stops_countdown() {
        let h = ready_harness().await;
        h.session.set_new_owner(new_owner()).unwrap();
        h.chain.set_request(h.chain.now() + 600, 1);
        h.machine.sync().await.unwrap();

        let receipt = h.machine.cancel_recovery().await.unwrap();
        assert_eq!(receipt.hash, B256::repeat_byte(0x77));
        let call = h.executor.last_call().unwrap();
        assert_eq!(call.to, MODULE);
        assert_eq!(
            call.data,
            alloy::primitives::Bytes::from(IEmailRecoveryModule::cancelRecoveryCall {}.abi_encode())
        );
        assert_eq!(h.machine.state(), RecoveryState::Ready);
        assert_eq!(h.machine.countdown_remaining(), None);
        assert_eq!(h.session.new_owner().unwrap(), None);

        tokio::time::sleep(Duration::from_secs(700)).await;
        assert_eq!(h.machine.state(), RecoveryState::Ready);
    }

    #[tokio::test(start_paused = true)]
    async fn cancel_outside_recovery_is_refused() {
        let h = ready_harness().await;
        let err = h.machine.cancel_recovery().await.unwrap_err();
        assert!(matches!(
            err,
            RecoveryError::Precondition(PreconditionError::UnexpectedState { .. })
        ));
        assert_eq!(h.executor.call_count(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn late_relay_result_after_reset_is_dropped() {
        let h = ready_harness().await;
        let request_reads = reads(&h.chain.request_reads);
        h.relayer.gated.store(true, Ordering::SeqCst);

        let machine = h.machine.clone();
        let pending =
            tokio::spawn(async move { machine.request_recovery(NEW_OWNER, None).await });
        h.relayer.entered.notified().await;

        let salt_nonce = h.machine.reset().unwrap();
        assert_eq!(salt_nonce, 1);
        h.relayer.release.notify_one();

        pending.await.unwrap().unwrap();
        assert_eq!(h.machine.state(), RecoveryState::NotConfigured);

        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(reads(&h.chain.request_reads), request_reads);
        assert_eq!(h.machine.state(), RecoveryState::NotConfigured);
    }

    #[tokio::test(start_paused = true)]
    async fn completion_after_reset_keeps_the_reset_state() {
        let h = ready_harness().await;
        h.session.set_new_owner(new_owner()).unwrap();
        h.chain.set_request(h.chain.now() - 1, 1);
        assert_eq!(h.machine.sync().await.unwrap(), RecoveryState::Completable);
        h.relayer.gated.store(true, Ordering::SeqCst);

        let machine = h.machine.clone();
        let pending = tokio::spawn(async move { machine.complete_recovery().await });
        h.relayer.entered.notified().await;

        h.machine.reset().unwrap();
        h.relayer.release.notify_one();

        let response = pending.await.unwrap().unwrap();
        assert_eq!(response.data.request_id, Some(RequestId::Number(7)));
        assert_eq!(h.machine.state(), RecoveryState::NotConfigured);
        assert_eq!(h.session.new_owner().unwrap(), None);
    }

    #[tokio::test]
    async fn connect_opens_session_and_records_account() {
        let dir = tempfile::tempdir().unwrap();
        let config = RecoveryConfig {
            rpc_url: "http://127.0.0.1:8545".to_string(),
            relayer_url: "http://127.0.0.1:4500".to_string(),
            recovery_module: MODULE,
            session_db_path: dir.path().join("session.redb"),
            policy: RecoveryPolicy::default(),
        };
        let handle = SmartAccountHandle::new(
            AccountKind::Kernel,
            AccountBinding::new(ACCOUNT, Arc::new(RecordingExecutor::default())),
        );

        let machine = RecoveryStateMachine::connect(&config, handle).unwrap();
        assert_eq!(machine.account(), ACCOUNT);
        assert_eq!(machine.state(), RecoveryState::NotConfigured);
        assert_eq!(
            machine.inner.session.account().unwrap(),
            Some((ACCOUNT, AccountKind::Kernel))
        );
        assert!(config.session_db_path.exists());
    }

    #[test]
    fn new_owner_input_is_validated() {
        assert_eq!(parse_new_owner("  "), Err(ValidationError::MissingNewOwner));
        assert!(matches!(
            parse_new_owner("0x1234"),
            Err(ValidationError::InvalidAddress(_))
        ));
        assert_eq!(parse_new_owner(&format!(" {NEW_OWNER} ")), Ok(new_owner()));
    }

    #[test]
    fn state_display_includes_countdown() {
        assert_eq!(RecoveryState::Ready.to_string(), "ready");
        assert_eq!(
            RecoveryState::TimelockPending { remaining_secs: 3_665 }.to_string(),
            "timelock_pending (1 Hour, 1 Min and 5 Secs)"
        );
    }
}
