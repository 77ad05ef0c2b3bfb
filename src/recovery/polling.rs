// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Recovery Wait Tasks
//!
//! The chain never pushes, so progress made by the guardian is observed by
//! polling. Each wait is a spawned task owned by the state machine:
//!
//! | Wait | Interval | Stops when |
//! |------|----------|------------|
//! | guardian acceptance | `poll_interval` (5 s) | `acceptedWeight >= threshold` |
//! | recovery approval | `poll_interval` (5 s) | `currentWeight >= threshold` |
//! | timelock countdown | `countdown_tick` (1 s) | remaining time reaches zero |
//!
//! Starting a wait cancels the previous task for the same purpose through its
//! `CancellationToken`. Poll errors are logged and the next round retries.

use std::future::Future;
use std::sync::PoisonError;
use std::time::Duration;

use alloy::primitives::Address;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use super::error::RecoveryError;
use super::state_machine::{RecoveryState, RecoveryStateMachine, WaitPurpose};
use super::types::RecoveryRequest;

/// Outcome of one polling round.
enum Round {
    Continue,
    Done,
}

impl RecoveryStateMachine {
    /// Spawn `task` as the wait for `purpose`, cancelling any previous one.
    fn spawn_wait<F, Fut>(&self, purpose: WaitPurpose, task: F)
    where
        F: FnOnce(CancellationToken) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let token = CancellationToken::new();
        let previous = self
            .inner
            .waits
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(purpose, token.clone());
        if let Some(previous) = previous {
            previous.cancel();
        }
        tokio::spawn(task(token));
    }

    pub(crate) fn cancel_waits(&self, purposes: &[WaitPurpose]) {
        let mut waits = self.inner.waits.lock().unwrap_or_else(PoisonError::into_inner);
        for purpose in purposes {
            if let Some(token) = waits.remove(purpose) {
                token.cancel();
            }
        }
    }

    /// Run `round` every `interval` until it reports done or `token` fires.
    async fn poll_until<F, Fut>(&self, label: &'static str, interval: Duration, token: CancellationToken, mut round: F)
    where
        F: FnMut(RecoveryStateMachine) -> Fut,
        Fut: Future<Output = Round>,
    {
        debug!(
            account = %self.account(),
            wait = label,
            interval_secs = interval.as_secs(),
            "Recovery wait starting"
        );
        loop {
            tokio::select! {
                _ = tokio::time::sleep(interval) => {},
                _ = token.cancelled() => {
                    debug!(account = %self.account(), wait = label, "Recovery wait cancelled");
                    return;
                }
            }
            if let Round::Done = round(self.clone()).await {
                info!(account = %self.account(), wait = label, "Recovery wait finished");
                return;
            }
        }
    }

    // =========================================================================
    // Guardian acceptance
    // =========================================================================

    /// Poll the guardian config until the guardian has accepted, then move
    /// `AwaitingGuardianAcceptance → Ready`.
    pub fn watch_guardian_acceptance(&self) {
        let machine = self.clone();
        let epoch = self.epoch();
        let interval = self.inner.policy.poll_interval;
        self.spawn_wait(WaitPurpose::GuardianAcceptance, move |token| async move {
            machine
                .poll_until("guardian_acceptance", interval, token, move |machine| async move {
                    machine.acceptance_round(epoch).await
                })
                .await;
        });
    }

    async fn acceptance_round(&self, epoch: u64) -> Round {
        if epoch != self.epoch() || self.state() != RecoveryState::AwaitingGuardianAcceptance {
            return Round::Done;
        }
        match self.inner.chain.guardian_config(self.account()).await {
            Ok(config) if config.is_accepted() => {
                self.transition(
                    epoch,
                    |s| *s == RecoveryState::AwaitingGuardianAcceptance,
                    RecoveryState::Ready,
                );
                Round::Done
            }
            Ok(_) => Round::Continue,
            Err(e) => {
                warn!(account = %self.account(), error = %e, "Guardian acceptance poll failed");
                Round::Continue
            }
        }
    }

    // =========================================================================
    // Recovery approval
    // =========================================================================

    /// Poll the recovery request until guardian approvals reach the threshold,
    /// then start the timelock countdown.
    pub fn watch_recovery_approval(&self) {
        let machine = self.clone();
        let epoch = self.epoch();
        let interval = self.inner.policy.poll_interval;
        self.spawn_wait(WaitPurpose::RecoveryApproval, move |token| async move {
            machine
                .poll_until("recovery_approval", interval, token, move |machine| async move {
                    machine.approval_round(epoch).await
                })
                .await;
        });
    }

    async fn approval_round(&self, epoch: u64) -> Round {
        if epoch != self.epoch() || self.state() != RecoveryState::RecoveryRequested {
            return Round::Done;
        }
        let account = self.account();
        let result = self.read_approval(account).await;

        match result {
            Ok(Some((request, chain_now))) => {
                self.enter_timelock(epoch, &request, chain_now, |s| {
                    *s == RecoveryState::RecoveryRequested
                });
                Round::Done
            }
            Ok(None) => Round::Continue,
            Err(e) => {
                warn!(account = %account, error = %e, "Recovery approval poll failed");
                Round::Continue
            }
        }
    }

    /// The approved request and the chain time it was read at, once
    /// approvals reach the threshold.
    async fn read_approval(&self, account: Address) -> Result<Option<(RecoveryRequest, u64)>, RecoveryError> {
        let config = self.inner.chain.guardian_config(account).await?;
        let request = self.inner.chain.recovery_request(account).await?;
        if !request.has_quorum(config.threshold) {
            return Ok(None);
        }
        let chain_now = self.inner.chain.latest_block_timestamp().await?;
        Ok(Some((request, chain_now)))
    }

    // =========================================================================
    // Countdown
    // =========================================================================

    /// Tick the cached countdown down locally; no chain reads.
    pub(crate) fn start_countdown(&self) {
        let machine = self.clone();
        let epoch = self.epoch();
        let tick = self.inner.policy.countdown_tick;
        self.spawn_wait(WaitPurpose::Countdown, move |token| async move {
            machine.run_countdown(epoch, tick, token).await;
        });
    }

    async fn run_countdown(self, epoch: u64, tick: Duration, token: CancellationToken) {
        let pending = |s: &RecoveryState| matches!(s, RecoveryState::TimelockPending { .. });
        loop {
            tokio::select! {
                _ = tokio::time::sleep(tick) => {},
                _ = token.cancelled() => return,
            }
            let Some(remaining_secs) = self.countdown_remaining() else {
                return;
            };
            if remaining_secs == 0 {
                if self.transition(epoch, pending, RecoveryState::Completable) {
                    info!(account = %self.account(), "Recovery timelock elapsed");
                }
                return;
            }
            if !self.transition(epoch, pending, RecoveryState::TimelockPending { remaining_secs }) {
                return;
            }
        }
    }
}
