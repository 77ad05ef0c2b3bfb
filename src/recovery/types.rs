// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! On-chain recovery module views.

use alloy::primitives::{B256, U256};

/// Guardian configuration of one account on the recovery module.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct GuardianConfig {
    pub guardian_count: U256,
    pub total_weight: U256,
    pub accepted_weight: U256,
    pub threshold: U256,
}

impl GuardianConfig {
    /// The module writes a non-zero threshold when it is installed.
    pub fn is_installed(&self) -> bool {
        !self.threshold.is_zero()
    }

    /// Enough guardian weight has accepted for recovery to be requested.
    pub fn is_accepted(&self) -> bool {
        self.is_installed() && self.accepted_weight >= self.threshold
    }
}

/// The account's current recovery request. All zero when none is open.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RecoveryRequest {
    pub execute_after: u64,
    pub execute_before: u64,
    pub current_weight: U256,
    pub recovery_data_hash: B256,
}

impl RecoveryRequest {
    pub fn is_open(&self) -> bool {
        self.execute_after != 0 || !self.current_weight.is_zero()
    }

    /// Guardian approvals have reached the threshold.
    pub fn has_quorum(&self, threshold: U256) -> bool {
        !threshold.is_zero() && self.current_weight >= threshold
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn guardian_config_states() {
        let uninstalled = GuardianConfig::default();
        assert!(!uninstalled.is_installed());
        assert!(!uninstalled.is_accepted());

        let pending = GuardianConfig {
            guardian_count: U256::from(1),
            total_weight: U256::from(1),
            accepted_weight: U256::ZERO,
            threshold: U256::from(1),
        };
        assert!(pending.is_installed());
        assert!(!pending.is_accepted());

        let accepted = GuardianConfig {
            accepted_weight: U256::from(1),
            ..pending
        };
        assert!(accepted.is_accepted());
    }

    #[test]
    fn recovery_request_timing() {
        let request = RecoveryRequest {
            execute_after: 1_000,
            execute_before: 2_000,
            current_weight: U256::from(1),
            recovery_data_hash: B256::repeat_byte(0xab),
        };
        assert!(request.is_open());
        assert!(request.has_quorum(U256::from(1)));
        assert!(!request.has_quorum(U256::from(2)));
        assert!(!request.has_quorum(U256::ZERO));
        assert!(!RecoveryRequest::default().is_open());
    }
}
