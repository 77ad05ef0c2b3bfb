// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Typed access to the persisted recovery session.

use std::str::FromStr;
use std::sync::Arc;

use alloy::primitives::Address;

use super::{KeyValueStore, StoreError, StoreResult};
use crate::recovery::account::AccountKind;
use crate::recovery::account_code::AccountCode;

/// Every key the session writes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SessionField {
    AccountCode,
    GuardianEmail,
    NewOwnerAddress,
    SafeAccount,
    AccountKind,
    BurnerOwnerKey,
    SaltNonce,
}

impl SessionField {
    pub const ALL: [SessionField; 7] = [
        SessionField::AccountCode,
        SessionField::GuardianEmail,
        SessionField::NewOwnerAddress,
        SessionField::SafeAccount,
        SessionField::AccountKind,
        SessionField::BurnerOwnerKey,
        SessionField::SaltNonce,
    ];

    pub fn key(self) -> &'static str {
        match self {
            SessionField::AccountCode => "accountCode",
            SessionField::GuardianEmail => "guardianEmail",
            SessionField::NewOwnerAddress => "newOwnerAddress",
            SessionField::SafeAccount => "safeAccount",
            SessionField::AccountKind => "accountKind",
            SessionField::BurnerOwnerKey => "burnerEOA7702OwnerPrivateKey",
            SessionField::SaltNonce => "saltNonce",
        }
    }
}

/// Repository over a [`KeyValueStore`] with one typed accessor per field.
#[derive(Clone)]
pub struct SessionRepository {
    store: Arc<dyn KeyValueStore>,
}

impl SessionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    fn read(&self, field: SessionField) -> StoreResult<Option<String>> {
        Ok(self
            .store
            .get(field.key())?
            .filter(|value| !value.trim().is_empty()))
    }

    fn write(&self, field: SessionField, value: &str) -> StoreResult<()> {
        self.store.set(field.key(), value)
    }

    fn clear(&self, field: SessionField) -> StoreResult<()> {
        self.store.remove(field.key())
    }

    fn corrupt(field: SessionField, reason: impl ToString) -> StoreError {
        StoreError::Corrupt {
            field: field.key(),
            reason: reason.to_string(),
        }
    }

    fn read_address(&self, field: SessionField) -> StoreResult<Option<Address>> {
        self.read(field)?
            .map(|raw| Address::from_str(raw.trim()).map_err(|e| Self::corrupt(field, e)))
            .transpose()
    }

    // =========================================================================
    // Account code
    // =========================================================================

    pub fn account_code(&self) -> StoreResult<Option<AccountCode>> {
        self.read(SessionField::AccountCode)?
            .map(|raw| {
                AccountCode::from_hex(&raw).map_err(|e| Self::corrupt(SessionField::AccountCode, e))
            })
            .transpose()
    }

    pub fn set_account_code(&self, code: &AccountCode) -> StoreResult<()> {
        self.write(SessionField::AccountCode, &code.to_hex())
    }

    // =========================================================================
    // Guardian email
    // =========================================================================

    pub fn guardian_email(&self) -> StoreResult<Option<String>> {
        self.read(SessionField::GuardianEmail)
    }

    pub fn set_guardian_email(&self, email: &str) -> StoreResult<()> {
        self.write(SessionField::GuardianEmail, email)
    }

    // =========================================================================
    // Pending new owner
    // =========================================================================

    pub fn new_owner(&self) -> StoreResult<Option<Address>> {
        self.read_address(SessionField::NewOwnerAddress)
    }

    pub fn set_new_owner(&self, owner: Address) -> StoreResult<()> {
        self.write(SessionField::NewOwnerAddress, &owner.to_string())
    }

    pub fn clear_new_owner(&self) -> StoreResult<()> {
        self.clear(SessionField::NewOwnerAddress)
    }

    // =========================================================================
    // Smart account
    // =========================================================================

    pub fn account(&self) -> StoreResult<Option<(Address, AccountKind)>> {
        let Some(address) = self.read_address(SessionField::SafeAccount)? else {
            return Ok(None);
        };
        let kind = match self.read(SessionField::AccountKind)? {
            Some(raw) => AccountKind::from_str(&raw)
                .map_err(|e| Self::corrupt(SessionField::AccountKind, e))?,
            None => AccountKind::Safe,
        };
        Ok(Some((address, kind)))
    }

    pub fn set_account(&self, address: Address, kind: AccountKind) -> StoreResult<()> {
        self.write(SessionField::SafeAccount, &address.to_string())?;
        self.write(SessionField::AccountKind, kind.as_str())
    }

    // =========================================================================
    // Burner owner
    // =========================================================================

    pub fn burner_owner_key(&self) -> StoreResult<Option<String>> {
        self.read(SessionField::BurnerOwnerKey)
    }

    pub fn set_burner_owner_key(&self, key_hex: &str) -> StoreResult<()> {
        self.write(SessionField::BurnerOwnerKey, key_hex)
    }

    pub fn salt_nonce(&self) -> StoreResult<u64> {
        match self.read(SessionField::SaltNonce)? {
            Some(raw) => raw
                .trim()
                .parse::<u64>()
                .map_err(|e| Self::corrupt(SessionField::SaltNonce, e)),
            None => Ok(0),
        }
    }

    // =========================================================================
    // Reset
    // =========================================================================

    /// Wipe every persisted field and advance the salt nonce so the next
    /// burner account lands on a fresh address.
    ///
    /// Returns the new salt nonce.
    pub fn reset(&self) -> StoreResult<u64> {
        // A corrupt nonce should not block a reset.
        let next = self.salt_nonce().unwrap_or(0).saturating_add(1);
        for field in SessionField::ALL {
            self.clear(field)?;
        }
        self.write(SessionField::SaltNonce, &next.to_string())?;
        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::InMemoryStore;

    fn repo() -> (SessionRepository, Arc<InMemoryStore>) {
        let store = Arc::new(InMemoryStore::new());
        (SessionRepository::new(store.clone()), store)
    }

    #[test]
    fn account_code_roundtrips_through_hex() {
        let (repo, _) = repo();
        assert!(repo.account_code().unwrap().is_none());

        let code = AccountCode::generate().unwrap();
        repo.set_account_code(&code).unwrap();
        assert_eq!(repo.account_code().unwrap(), Some(code));
    }

    #[test]
    fn corrupt_address_is_reported() {
        let (repo, store) = repo();
        store.set("newOwnerAddress", "not-an-address").unwrap();
        let err = repo.new_owner().unwrap_err();
        assert!(matches!(err, StoreError::Corrupt { field: "newOwnerAddress", .. }));
    }

    #[test]
    fn account_kind_defaults_to_safe() {
        let (repo, store) = repo();
        let addr: Address = "0x1111111111111111111111111111111111111111".parse().unwrap();
        store.set("safeAccount", &addr.to_string()).unwrap();
        assert_eq!(repo.account().unwrap(), Some((addr, AccountKind::Safe)));

        repo.set_account(addr, AccountKind::Kernel).unwrap();
        assert_eq!(repo.account().unwrap(), Some((addr, AccountKind::Kernel)));
    }

    #[test]
    fn reset_wipes_fields_and_advances_salt_nonce() {
        let (repo, store) = repo();
        repo.set_guardian_email("guardian@example.com").unwrap();
        repo.set_new_owner(Address::repeat_byte(0x22)).unwrap();
        repo.set_burner_owner_key("0xabc").unwrap();

        assert_eq!(repo.reset().unwrap(), 1);
        assert_eq!(repo.reset().unwrap(), 2);

        assert!(repo.guardian_email().unwrap().is_none());
        assert!(repo.new_owner().unwrap().is_none());
        assert!(repo.burner_owner_key().unwrap().is_none());
        assert_eq!(store.get("saltNonce").unwrap().as_deref(), Some("2"));
    }
}
