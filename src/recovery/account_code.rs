// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Secret account code binding a guardian to an account.
//!
//! The code is a 32-byte value drawn uniformly from the BN254 scalar field so
//! the email relayer's circuits can use it directly as a field element. It is
//! persisted locally and only ever leaves the process as the un-prefixed hex
//! string sent with an acceptance request.

use std::fmt;

use alloy::primitives::{hex, uint, B256, U256};
use k256::elliptic_curve::rand_core::{OsRng, RngCore};

use super::error::{RecoveryError, ValidationError};

/// BN254 scalar field modulus.
pub const BN254_SCALAR_MODULUS: U256 =
    uint!(0x30644e72e131a029b85045b68181585d2833e84879b9709143e1f593f0000001_U256);

/// The modulus fits in 254 bits; clearing the top two bits keeps the
/// rejection rate around one in four.
const TOP_BYTE_MASK: u8 = 0x3f;

/// Bound on rejection-sampling rounds. Exhausting it means the RNG is broken.
const MAX_SAMPLING_ROUNDS: usize = 128;

#[derive(Clone, Copy, PartialEq, Eq)]
pub struct AccountCode(B256);

impl AccountCode {
    /// Draw a fresh code from the OS CSPRNG.
    pub fn generate() -> Result<Self, RecoveryError> {
        let mut rng = OsRng;
        for _ in 0..MAX_SAMPLING_ROUNDS {
            let mut bytes = [0u8; 32];
            rng.try_fill_bytes(&mut bytes)
                .map_err(|e| RecoveryError::Randomness(e.to_string()))?;
            bytes[0] &= TOP_BYTE_MASK;
            if U256::from_be_bytes(bytes) < BN254_SCALAR_MODULUS {
                return Ok(Self(B256::from(bytes)));
            }
        }
        Err(RecoveryError::Randomness(
            "rejection sampling did not converge".to_string(),
        ))
    }

    /// Parse a persisted code, with or without the `0x` prefix.
    pub fn from_hex(raw: &str) -> Result<Self, ValidationError> {
        let bytes = hex::decode(raw.trim())
            .map_err(|e| ValidationError::InvalidAccountCode(e.to_string()))?;
        let bytes: [u8; 32] = bytes.try_into().map_err(|v: Vec<u8>| {
            ValidationError::InvalidAccountCode(format!("expected 32 bytes, got {}", v.len()))
        })?;
        if U256::from_be_bytes(bytes) >= BN254_SCALAR_MODULUS {
            return Err(ValidationError::InvalidAccountCode(
                "value is outside the BN254 scalar field".to_string(),
            ));
        }
        Ok(Self(B256::from(bytes)))
    }

    /// `0x`-prefixed hex, used for local persistence.
    pub fn to_hex(&self) -> String {
        hex::encode_prefixed(self.0)
    }

    /// Un-prefixed hex as the relayer expects it.
    pub fn to_relayer_hex(&self) -> String {
        hex::encode(self.0)
    }

    pub fn as_b256(&self) -> B256 {
        self.0
    }
}

impl fmt::Debug for AccountCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("AccountCode(<redacted>)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_codes_are_field_elements() {
        for _ in 0..64 {
            let code = AccountCode::generate().unwrap();
            assert!(U256::from_be_bytes(code.as_b256().0) < BN254_SCALAR_MODULUS);
        }
    }

    #[test]
    fn generated_codes_differ() {
        let a = AccountCode::generate().unwrap();
        let b = AccountCode::generate().unwrap();
        assert_ne!(a, b);
    }

    #[test]
    fn hex_forms() {
        let code = AccountCode::from_hex(&format!("0x{}", "01".repeat(32))).unwrap();
        assert_eq!(code.to_relayer_hex(), "01".repeat(32));
        assert_eq!(code.to_hex(), format!("0x{}", "01".repeat(32)));
        assert_eq!(AccountCode::from_hex(&code.to_relayer_hex()).unwrap(), code);
    }

    #[test]
    fn rejects_wrong_length_and_out_of_field() {
        assert!(AccountCode::from_hex("0x1234").is_err());
        assert!(AccountCode::from_hex(&"ff".repeat(32)).is_err());
        assert!(AccountCode::from_hex("zz").is_err());

        let modulus = hex::encode(BN254_SCALAR_MODULUS.to_be_bytes::<32>());
        assert!(AccountCode::from_hex(&modulus).is_err());
    }

    #[test]
    fn debug_is_redacted() {
        let code = AccountCode::from_hex(&"01".repeat(32)).unwrap();
        let rendered = format!("{code:?}");
        assert!(!rendered.contains("0101"));
        assert_eq!(rendered, "AccountCode(<redacted>)");
    }
}
