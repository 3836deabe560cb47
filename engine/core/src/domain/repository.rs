// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Domain Repository Interfaces
//!
//! Persistence contracts used by the engine. Storage is injected, never
//! reached as ambient global state.
//!
//! | Trait | Holds | Implementations |
//! |-------|-------|-----------------|
//! | `KeyValueStore` | raw JSON strings by key | `InMemoryKeyValueStore`, `JsonFileKeyValueStore` |
//! | `MetaTransactionRepository` | signed-but-unsettled meta-transactions per contract | `KvMetaTransactionRepository` |
//! | `TokenListRepository` | user-added token addresses per contract | `KvTokenListRepository` |
//!
//! Values are JSON; every large integer inside them is a decimal string.

use alloy_primitives::Address;
use async_trait::async_trait;

use crate::domain::meta_tx::{MetaTxId, SignedMetaTransaction};

/// Minimal key-value persistence boundary.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, RepositoryError>;

    async fn set(&self, key: &str, value: String) -> Result<(), RepositoryError>;

    async fn delete(&self, key: &str) -> Result<(), RepositoryError>;
}

/// Locally held meta-transactions, keyed by `(contract, id)`.
#[async_trait]
pub trait MetaTransactionRepository: Send + Sync {
    /// All entries for a contract, ordered by nonce.
    async fn find_by_contract(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, RepositoryError>;

    async fn find_by_id(&self, contract: Address, id: MetaTxId) -> Result<Option<SignedMetaTransaction>, RepositoryError>;

    /// Insert or replace.
    async fn save(&self, meta_tx: &SignedMetaTransaction) -> Result<(), RepositoryError>;

    async fn delete(&self, contract: Address, id: MetaTxId) -> Result<(), RepositoryError>;
}

/// User-maintained list of ERC-20 tokens tracked for a vault contract.
#[async_trait]
pub trait TokenListRepository: Send + Sync {
    async fn list(&self, contract: Address) -> Result<Vec<Address>, RepositoryError>;

    /// Returns `false` if the token was already tracked.
    async fn add(&self, contract: Address, token: Address) -> Result<bool, RepositoryError>;

    /// Returns `false` if the token was not tracked.
    async fn remove(&self, contract: Address, token: Address) -> Result<bool, RepositoryError>;
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    #[error("Entity not found: {0}")]
    NotFound(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Serialization error: {0}")]
    Serialization(String),
}

impl From<serde_json::Error> for RepositoryError {
    fn from(err: serde_json::Error) -> Self {
        RepositoryError::Serialization(err.to_string())
    }
}

impl From<std::io::Error> for RepositoryError {
    fn from(err: std::io::Error) -> Self {
        RepositoryError::Storage(err.to_string())
    }
}
