// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Ownership transfer calldata.
//!
//! Safe stores its owners as a singly linked list headed by the sentinel
//! `0x…01`. `swapOwner(prev, old, new)` needs the element that points at
//! `old`, which is the sentinel when `old` is first in `getOwners()`.

use alloy::primitives::{address, keccak256, Address, Bytes, B256};
use alloy::sol_types::{SolCall, SolValue};

use super::error::{PreconditionError, RecoveryError, ValidationError};
use crate::blockchain::contracts::ISafe;

/// Head of the Safe owner list.
pub const SENTINEL_OWNER: Address = address!("0x0000000000000000000000000000000000000001");

/// An encoded `swapOwner` call and the previous owner it was built with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OwnerSwap {
    pub previous_owner: Address,
    pub old_owner: Address,
    pub new_owner: Address,
    pub calldata: Bytes,
}

/// Element preceding `old_owner` in the linked list.
pub fn previous_owner(old_owner: Address, owners: &[Address]) -> Result<Address, PreconditionError> {
    let index = owners
        .iter()
        .position(|owner| *owner == old_owner)
        .ok_or(PreconditionError::OwnerNotFound { owner: old_owner })?;
    Ok(if index == 0 {
        SENTINEL_OWNER
    } else {
        owners[index - 1]
    })
}

/// Build `swapOwner(prev, old, new)` against the current owner list.
pub fn build_swap(
    old_owner: Address,
    new_owner: Address,
    owners: &[Address],
) -> Result<OwnerSwap, RecoveryError> {
    if new_owner == Address::ZERO || new_owner == SENTINEL_OWNER {
        return Err(ValidationError::InvalidAddress(new_owner.to_string()).into());
    }
    if new_owner == old_owner {
        return Err(ValidationError::NewOwnerUnchanged(new_owner).into());
    }
    let previous_owner = previous_owner(old_owner, owners)?;
    if owners.contains(&new_owner) {
        return Err(ValidationError::NewOwnerAlreadyOwner(new_owner).into());
    }

    let calldata = ISafe::swapOwnerCall {
        prevOwner: previous_owner,
        oldOwner: old_owner,
        newOwner: new_owner,
    }
    .abi_encode();

    Ok(OwnerSwap {
        previous_owner,
        old_owner,
        new_owner,
        calldata: calldata.into(),
    })
}

/// `abi.encode(account, swapCalldata)`, the payload the module executes
/// once recovery completes.
pub fn recovery_data(account: Address, swap: &OwnerSwap) -> Bytes {
    (account, swap.calldata.clone()).abi_encode_params().into()
}

pub fn recovery_data_hash(recovery_data: &[u8]) -> B256 {
    keccak256(recovery_data)
}
