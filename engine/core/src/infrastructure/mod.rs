// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod event_bus;
pub mod kv_store;
pub mod repositories;
pub mod signature;

pub use event_bus::{DomainEvent, EventBus, EventBusError};
pub use kv_store::{InMemoryKeyValueStore, JsonFileKeyValueStore};
pub use repositories::{KvMetaTransactionRepository, KvTokenListRepository};
pub use signature::{Ed25519SignatureRecovery, Ed25519Signer};
