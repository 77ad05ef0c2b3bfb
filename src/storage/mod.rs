// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! # Session Storage Module
//!
//! Persists the small amount of local state the recovery lifecycle needs to
//! survive a restart. The chain is the source of truth for module and
//! recovery state; this store only holds what cannot be read back from it.
//!
//! ## Persisted Fields
//!
//! | Key | Value |
//! |-----|-------|
//! | `accountCode` | 32-byte account code, 0x-prefixed hex |
//! | `guardianEmail` | normalized guardian email |
//! | `newOwnerAddress` | pending recovery target |
//! | `safeAccount` | smart account address |
//! | `accountKind` | `safe` or `kernel` |
//! | `burnerEOA7702OwnerPrivateKey` | burner owner key, 0x-prefixed hex |
//! | `saltNonce` | decimal counter advanced on every reset |
//!
//! ## Backends
//!
//! - [`InMemoryStore`]: process-local, used by tests and short-lived sessions
//! - [`RedbStore`]: embedded ACID database file (redb)

pub mod database;
pub mod memory;
pub mod session;

pub use database::RedbStore;
pub use memory::InMemoryStore;
pub use session::{SessionField, SessionRepository};

// =============================================================================
// Error Type
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("redb database error: {0}")]
    RedbDatabase(#[from] redb::DatabaseError),

    #[error("redb transaction error: {0}")]
    RedbTransaction(#[from] redb::TransactionError),

    #[error("redb table error: {0}")]
    RedbTable(#[from] redb::TableError),

    #[error("redb storage error: {0}")]
    RedbStorage(#[from] redb::StorageError),

    #[error("redb commit error: {0}")]
    RedbCommit(#[from] redb::CommitError),

    #[error("Stored value for `{field}` is corrupt: {reason}")]
    Corrupt { field: &'static str, reason: String },

    #[error("Store lock poisoned")]
    Poisoned,
}

pub type StoreResult<T> = Result<T, StoreError>;

// =============================================================================
// KeyValueStore
// =============================================================================

/// Minimal string key-value persistence used by [`SessionRepository`].
///
/// Implementations must be safe to share between the state machine and its
/// background wait tasks.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str) -> StoreResult<()>;

    fn remove(&self, key: &str) -> StoreResult<()>;
}
