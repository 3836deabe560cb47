// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use alloy_primitives::Address;
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::Mutex;

use crate::domain::meta_tx::{MetaTxId, SignedMetaTransaction};
use crate::domain::repository::{
    KeyValueStore, MetaTransactionRepository, RepositoryError, TokenListRepository,
};

const META_TX_PREFIX: &str = "vaultguard.metatx";
const TOKEN_LIST_PREFIX: &str = "vaultguard.tokens";

pub fn meta_tx_key(contract: Address) -> String {
    format!("{}.0x{}", META_TX_PREFIX, hex::encode(contract.as_slice()))
}

pub fn token_list_key(contract: Address) -> String {
    format!("{}.0x{}", TOKEN_LIST_PREFIX, hex::encode(contract.as_slice()))
}

/// Contract addresses that currently hold at least one stored meta-transaction.
pub fn contracts_with_meta_txs<'a>(keys: impl IntoIterator<Item = &'a str>) -> Vec<Address> {
    let prefix = format!("{}.", META_TX_PREFIX);
    keys.into_iter()
        .filter_map(|key| key.strip_prefix(prefix.as_str()))
        .filter_map(|addr| addr.parse::<Address>().ok())
        .collect()
}

/// Meta-transactions stored as one JSON array per contract.
///
/// Updates rewrite the whole array, so `save` and `delete` hold `write_lock`
/// from the read to the write. Clones share the lock.
#[derive(Clone)]
pub struct KvMetaTransactionRepository {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl KvMetaTransactionRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }

    async fn load(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, RepositoryError> {
        match self.store.get(&meta_tx_key(contract)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn write(&self, contract: Address, mut entries: Vec<SignedMetaTransaction>) -> Result<(), RepositoryError> {
        let key = meta_tx_key(contract);
        if entries.is_empty() {
            return self.store.delete(&key).await;
        }
        entries.sort_by(|a, b| a.payload.nonce.cmp(&b.payload.nonce).then(a.id().cmp(&b.id())));
        self.store.set(&key, serde_json::to_string(&entries)?).await
    }
}

#[async_trait]
impl MetaTransactionRepository for KvMetaTransactionRepository {
    async fn find_by_contract(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, RepositoryError> {
        let mut entries = self.load(contract).await?;
        entries.sort_by(|a, b| a.payload.nonce.cmp(&b.payload.nonce).then(a.id().cmp(&b.id())));
        Ok(entries)
    }

    async fn find_by_id(&self, contract: Address, id: MetaTxId) -> Result<Option<SignedMetaTransaction>, RepositoryError> {
        Ok(self.load(contract).await?.into_iter().find(|tx| tx.id() == id))
    }

    async fn save(&self, meta_tx: &SignedMetaTransaction) -> Result<(), RepositoryError> {
        let contract = meta_tx.contract_address();
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(contract).await?;
        match entries.iter_mut().find(|tx| tx.id() == meta_tx.id()) {
            Some(existing) => *existing = meta_tx.clone(),
            None => entries.push(meta_tx.clone()),
        }
        self.write(contract, entries).await
    }

    async fn delete(&self, contract: Address, id: MetaTxId) -> Result<(), RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut entries = self.load(contract).await?;
        let before = entries.len();
        entries.retain(|tx| tx.id() != id);
        if entries.len() == before {
            return Err(RepositoryError::NotFound(id.to_string()));
        }
        self.write(contract, entries).await
    }
}

#[derive(Clone)]
pub struct KvTokenListRepository {
    store: Arc<dyn KeyValueStore>,
    write_lock: Arc<Mutex<()>>,
}

impl KvTokenListRepository {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self {
            store,
            write_lock: Arc::new(Mutex::new(())),
        }
    }
}

#[async_trait]
impl TokenListRepository for KvTokenListRepository {
    async fn list(&self, contract: Address) -> Result<Vec<Address>, RepositoryError> {
        match self.store.get(&token_list_key(contract)).await? {
            Some(json) => Ok(serde_json::from_str(&json)?),
            None => Ok(Vec::new()),
        }
    }

    async fn add(&self, contract: Address, token: Address) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.list(contract).await?;
        if tokens.contains(&token) {
            return Ok(false);
        }
        tokens.push(token);
        self.store
            .set(&token_list_key(contract), serde_json::to_string(&tokens)?)
            .await?;
        Ok(true)
    }

    async fn remove(&self, contract: Address, token: Address) -> Result<bool, RepositoryError> {
        let _guard = self.write_lock.lock().await;
        let mut tokens = self.list(contract).await?;
        let before = tokens.len();
        tokens.retain(|t| *t != token);
        if tokens.len() == before {
            return Ok(false);
        }
        let key = token_list_key(contract);
        if tokens.is_empty() {
            self.store.delete(&key).await?;
        } else {
            self.store.set(&key, serde_json::to_string(&tokens)?).await?;
        }
        Ok(true)
    }
}
