// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Contract interfaces used by the recovery flow.

use alloy::sol;

// Email recovery module (ERC-7579 executor)
sol! {
    #[sol(rpc)]
    interface IEmailRecoveryModule {
        struct GuardianConfig {
            uint256 guardianCount;
            uint256 totalWeight;
            uint256 acceptedWeight;
            uint256 threshold;
        }

        struct RecoveryRequest {
            uint256 executeAfter;
            uint256 executeBefore;
            uint256 currentWeight;
            bytes32 recoveryDataHash;
        }

        function getGuardianConfig(address account) external view returns (GuardianConfig memory);
        function getRecoveryRequest(address account) external view returns (RecoveryRequest memory);
        function acceptanceCommandTemplates() external pure returns (string[][] memory);
        function recoveryCommandTemplates() external pure returns (string[][] memory);
        function cancelRecovery() external;
    }
}

// Safe owner management
sol! {
    #[sol(rpc)]
    interface ISafe {
        function getOwners() external view returns (address[] memory);
        function swapOwner(address prevOwner, address oldOwner, address newOwner) external;
        function setup(
            address[] calldata owners,
            uint256 threshold,
            address to,
            bytes calldata data,
            address fallbackHandler,
            address paymentToken,
            uint256 payment,
            address paymentReceiver
        ) external;
    }
}

// ERC-7579 module management
sol! {
    #[sol(rpc)]
    interface IERC7579Account {
        function installModule(uint256 moduleTypeId, address module, bytes calldata initData) external payable;
        function isModuleInstalled(uint256 moduleTypeId, address module, bytes calldata additionalContext) external view returns (bool);
    }
}

// Safe7579 launchpad, called from Safe.setup during an EIP-7702 upgrade
sol! {
    interface ISafe7579Launchpad {
        struct ModuleInit {
            address module;
            bytes initData;
        }

        function addSafe7579(
            address safe7579,
            ModuleInit[] calldata validators,
            ModuleInit[] calldata executors,
            ModuleInit[] calldata fallbacks,
            ModuleInit[] calldata hooks,
            address[] calldata attesters,
            uint8 threshold
        ) external;
    }
}
