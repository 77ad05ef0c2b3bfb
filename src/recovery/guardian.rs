// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Guardian identity derivation.
//!
//! The guardian registered on-chain is not the email address itself but an
//! address-shaped commitment over the account, the secret account code and
//! the normalized email:
//!
//! ```text
//! salt     = keccak256(abi.encode("EMAIL_RECOVERY_GUARDIAN_SALT", email, accountCode))
//! identity = last20(keccak256(abi.encode(account, salt)))
//! ```
//!
//! Without the account code the identity cannot be linked back to the email.

use std::fmt;

use alloy::primitives::{keccak256, Address};
use alloy::sol_types::SolValue;
use unicode_normalization::UnicodeNormalization;

use super::account_code::AccountCode;
use super::error::ValidationError;

/// Domain separator mixed into the guardian salt.
pub const GUARDIAN_SALT_DOMAIN: &str = "EMAIL_RECOVERY_GUARDIAN_SALT";

/// Canonical form of a guardian email: NFKC, trimmed, ASCII-lowercased.
///
/// Every derivation and every relayer call goes through this, so two
/// spellings of the same address always map to the same guardian.
pub fn normalize_email(raw: &str) -> String {
    let composed: String = raw.nfkc().collect();
    composed.trim().to_ascii_lowercase()
}

/// Normalize and sanity-check a guardian email.
pub fn validate_email(raw: &str) -> Result<String, ValidationError> {
    let email = normalize_email(raw);
    if email.is_empty() {
        return Err(ValidationError::MissingGuardianEmail);
    }
    let well_formed = match email.split_once('@') {
        Some((local, domain)) => {
            !local.is_empty()
                && !domain.is_empty()
                && !domain.contains('@')
                && !email.chars().any(char::is_whitespace)
        }
        None => false,
    };
    if !well_formed {
        return Err(ValidationError::InvalidGuardianEmail(email));
    }
    Ok(email)
}

/// On-chain guardian address for an email guardian.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GuardianIdentity(Address);

impl GuardianIdentity {
    pub fn address(&self) -> Address {
        self.0
    }
}

impl fmt::Display for GuardianIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Display::fmt(&self.0, f)
    }
}

/// Derive the guardian identity. Pure; the email is normalized first.
pub fn derive_guardian_identity(
    account: Address,
    account_code: &AccountCode,
    email: &str,
) -> GuardianIdentity {
    let salt = keccak256(
        (
            GUARDIAN_SALT_DOMAIN.to_string(),
            normalize_email(email),
            account_code.as_b256(),
        )
            .abi_encode_params(),
    );
    let digest = keccak256((account, salt).abi_encode_params());
    GuardianIdentity(Address::from_slice(&digest[12..]))
}
