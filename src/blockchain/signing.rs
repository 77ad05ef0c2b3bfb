// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Local signing keys.
//!
//! Two keys live here: the relayer key that pays for EIP-7702 delegation
//! transactions, and the burner owner key generated for a fresh account and
//! kept in the recovery session until the session is reset.

use alloy::{hex, network::EthereumWallet, signers::local::PrivateKeySigner};
use k256::ecdsa::SigningKey;
use k256::elliptic_curve::rand_core::OsRng;

use super::client::ChainClientError;
use crate::storage::{SessionRepository, StoreError};

/// Create a signer from a hex private key, with or without `0x`.
pub fn signer_from_hex(private_key_hex: &str) -> Result<PrivateKeySigner, ChainClientError> {
    let key_bytes = hex::decode(private_key_hex.trim())
        .map_err(|e| ChainClientError::InvalidPrivateKey(e.to_string()))?;

    PrivateKeySigner::from_slice(&key_bytes)
        .map_err(|e| ChainClientError::InvalidPrivateKey(e.to_string()))
}

/// Create an Ethereum wallet from a hex private key.
pub fn wallet_from_hex(private_key_hex: &str) -> Result<EthereumWallet, ChainClientError> {
    Ok(EthereumWallet::from(signer_from_hex(private_key_hex)?))
}

/// Generate a new secp256k1 key from the OS CSPRNG.
pub fn generate_signer() -> PrivateKeySigner {
    PrivateKeySigner::from_signing_key(SigningKey::random(&mut OsRng))
}

/// Burner owner of the current session.
#[derive(Debug, Clone)]
pub struct BurnerOwner {
    pub signer: PrivateKeySigner,
    /// Salt nonce of the session the key belongs to.
    pub salt_nonce: u64,
    /// Whether the key was generated by this call.
    pub created: bool,
}

#[derive(Debug, thiserror::Error)]
pub enum BurnerError {
    #[error(transparent)]
    Storage(#[from] StoreError),

    #[error(transparent)]
    Key(#[from] ChainClientError),
}

/// Load the session's burner owner key, generating and persisting one if the
/// session has none yet.
pub fn load_or_create_burner(session: &SessionRepository) -> Result<BurnerOwner, BurnerError> {
    let salt_nonce = session.salt_nonce()?;
    if let Some(key_hex) = session.burner_owner_key()? {
        return Ok(BurnerOwner {
            signer: signer_from_hex(&key_hex)?,
            salt_nonce,
            created: false,
        });
    }

    let signer = generate_signer();
    session.set_burner_owner_key(&hex::encode_prefixed(signer.to_bytes()))?;
    tracing::info!(owner = %signer.address(), salt_nonce, "Generated burner owner key");
    Ok(BurnerOwner {
        signer,
        salt_nonce,
        created: true,
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::storage::InMemoryStore;

    // Well-known anvil account #0
    const TEST_KEY: &str = "0xac0974bec39a17e36ba4a6b4d238ff944bacb478cbed5efcae784d7bf4f2ff80";

    #[test]
    fn test_signer_from_hex() {
        let signer = signer_from_hex(TEST_KEY).unwrap();
        assert_eq!(
            signer.address().to_string(),
            "0xf39Fd6e51aad88F6F4ce6aB8827279cffFb92266"
        );
        let unprefixed = signer_from_hex(TEST_KEY.trim_start_matches("0x")).unwrap();
        assert_eq!(unprefixed.address(), signer.address());
    }

    #[test]
    fn test_invalid_key_is_rejected() {
        assert!(matches!(
            signer_from_hex("0x1234"),
            Err(ChainClientError::InvalidPrivateKey(_))
        ));
        assert!(wallet_from_hex("not hex").is_err());
    }

    #[test]
    fn burner_is_created_once_and_replaced_after_reset() {
        let session = SessionRepository::new(Arc::new(InMemoryStore::new()));

        let first = load_or_create_burner(&session).unwrap();
        assert!(first.created);
        assert_eq!(first.salt_nonce, 0);

        let again = load_or_create_burner(&session).unwrap();
        assert!(!again.created);
        assert_eq!(again.signer.address(), first.signer.address());

        session.reset().unwrap();
        let fresh = load_or_create_burner(&session).unwrap();
        assert!(fresh.created);
        assert_eq!(fresh.salt_nonce, 1);
        assert_ne!(fresh.signer.address(), first.signer.address());
    }
}
