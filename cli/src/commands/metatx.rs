// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Local meta-transaction store commands
//!
//! Commands: list, purge

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use vaultguard_core::domain::clock::{Clock, SystemClock};
use vaultguard_core::domain::meta_tx::{BroadcastStatus, SignedMetaTransaction};
use vaultguard_core::domain::repository::{KeyValueStore, MetaTransactionRepository};
use vaultguard_core::infrastructure::repositories::contracts_with_meta_txs;
use vaultguard_core::infrastructure::{JsonFileKeyValueStore, KvMetaTransactionRepository};

use super::{open_store, parse_address};

#[derive(Subcommand)]
pub enum MetaTxCommand {
    /// List stored meta-transactions
    List {
        /// Only this contract (default: every contract in the store)
        #[arg(long, value_name = "ADDRESS")]
        contract: Option<String>,

        /// Print entries as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete unbroadcast entries whose deadline has passed
    Purge {
        /// Only this contract (default: every contract in the store)
        #[arg(long, value_name = "ADDRESS")]
        contract: Option<String>,

        /// Report what would be deleted without deleting
        #[arg(long)]
        dry_run: bool,
    },
}

pub async fn handle_command(
    command: MetaTxCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let (_, store) = open_store(config_override)?;

    match command {
        MetaTxCommand::List { contract, json } => list(&store, contract, json).await,
        MetaTxCommand::Purge { contract, dry_run } => {
            purge(&store, contract, dry_run, &SystemClock).await.map(|_| ())
        }
    }
}

async fn target_contracts(
    store: &JsonFileKeyValueStore,
    contract: Option<String>,
) -> Result<Vec<alloy_primitives::Address>> {
    match contract {
        Some(raw) => Ok(vec![parse_address(&raw)?]),
        None => {
            let keys = store.keys().await.context("Failed to read store")?;
            Ok(contracts_with_meta_txs(keys.iter().map(String::as_str)))
        }
    }
}

fn repository(store: &Arc<JsonFileKeyValueStore>) -> KvMetaTransactionRepository {
    let store: Arc<dyn KeyValueStore> = store.clone();
    KvMetaTransactionRepository::new(store)
}

async fn list(store: &Arc<JsonFileKeyValueStore>, contract: Option<String>, json: bool) -> Result<()> {
    let repo = repository(store);
    let now = SystemClock.now();
    let mut all: Vec<SignedMetaTransaction> = Vec::new();

    for contract in target_contracts(store, contract).await? {
        all.extend(
            repo.find_by_contract(contract)
                .await
                .with_context(|| format!("Failed to load meta-transactions for {}", contract))?,
        );
    }

    if json {
        println!("{}", serde_json::to_string_pretty(&all)?);
        return Ok(());
    }

    if all.is_empty() {
        println!("{}", "No stored meta-transactions".dimmed());
        return Ok(());
    }

    for tx in &all {
        let payload = &tx.payload;
        let status = match tx.broadcast_status {
            BroadcastStatus::Unbroadcast if tx.is_expired(now) => "EXPIRED".red(),
            BroadcastStatus::Unbroadcast => "UNBROADCAST".yellow(),
            BroadcastStatus::Broadcasted => "BROADCASTED".cyan(),
            BroadcastStatus::Confirmed => "CONFIRMED".green(),
            BroadcastStatus::Failed => "FAILED".red(),
        };
        println!("{} {}", tx.id().to_string().bold(), status);
        println!("  Contract:  {}", payload.contract_address);
        println!("  Operation: {}", payload.operation_type);
        println!("  Nonce:     {}", payload.nonce);
        println!("  Signer:    {}", payload.signer);
        println!("  Deadline:  {}", payload.deadline.to_rfc3339());
        println!("  Max gas:   {} wei", payload.max_gas_price);
        if let Some(hash) = &tx.broadcast_tx_hash {
            println!("  Tx hash:   {}", hash);
        }
        if let Some(reason) = &tx.failure_reason {
            println!("  Failure:   {}", reason);
        }
    }

    Ok(())
}

async fn purge(
    store: &Arc<JsonFileKeyValueStore>,
    contract: Option<String>,
    dry_run: bool,
    clock: &dyn Clock,
) -> Result<Vec<SignedMetaTransaction>> {
    let repo = repository(store);
    let now = clock.now();
    let mut purged = Vec::new();

    for contract in target_contracts(store, contract).await? {
        let stale: Vec<_> = repo
            .find_by_contract(contract)
            .await
            .with_context(|| format!("Failed to load meta-transactions for {}", contract))?
            .into_iter()
            .filter(|tx| tx.is_stale(now))
            .collect();

        for tx in stale {
            if !dry_run {
                repo.delete(contract, tx.id())
                    .await
                    .with_context(|| format!("Failed to delete {}", tx.id()))?;
            }
            tracing::warn!(contract = %contract, meta_tx_id = %tx.id(), dry_run, "Purging expired meta-transaction");
            purged.push(tx);
        }
    }

    let verb = if dry_run { "Would purge" } else { "Purged" };
    println!(
        "{}",
        format!("✓ {} {} expired meta-transaction(s)", verb, purged.len()).green()
    );

    Ok(purged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::{Address, Bytes, U256};
    use chrono::{Duration, TimeZone, Utc};
    use vaultguard_core::domain::clock::ManualClock;
    use vaultguard_core::domain::meta_tx::MetaTxPayload;
    use vaultguard_core::domain::operation::OperationParams;
    use vaultguard_core::domain::units::gwei;

    fn entry(contract: Address, nonce: u64, signed_at: chrono::DateTime<Utc>) -> SignedMetaTransaction {
        let payload = MetaTxPayload::new(
            contract,
            OperationParams::TimelockUpdate { new_period_days: 3 },
            U256::from(nonce),
            Address::repeat_byte(0x11),
            signed_at,
            Duration::hours(1),
            gwei(50),
        )
        .unwrap();
        SignedMetaTransaction::new(payload, Bytes::from(vec![0u8; 96]))
    }

    #[tokio::test]
    async fn test_purge_removes_only_stale_entries() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileKeyValueStore::new(dir.path().join("store.json")));
        let repo = repository(&store);

        let t0 = Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap();
        let contract = Address::repeat_byte(0xc0);
        let old = entry(contract, 0, t0);
        let fresh = entry(contract, 1, t0 + Duration::hours(2));
        let mut broadcast = entry(contract, 2, t0);
        broadcast.mark_broadcasted(Default::default());
        for tx in [&old, &fresh, &broadcast] {
            repo.save(tx).await.unwrap();
        }

        let clock = ManualClock::new(t0 + Duration::hours(2));

        let preview = purge(&store, None, true, &clock).await.unwrap();
        assert_eq!(preview.len(), 1);
        assert_eq!(repo.find_by_contract(contract).await.unwrap().len(), 3);

        let purged = purge(&store, Some(contract.to_string()), false, &clock).await.unwrap();
        assert_eq!(purged.len(), 1);
        assert_eq!(purged[0].id(), old.id());

        let remaining: Vec<_> = repo
            .find_by_contract(contract)
            .await
            .unwrap()
            .into_iter()
            .map(|tx| tx.id())
            .collect();
        assert_eq!(remaining, vec![fresh.id(), broadcast.id()]);
    }

    #[tokio::test]
    async fn test_rejects_malformed_contract() {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(JsonFileKeyValueStore::new(dir.path().join("store.json")));
        let clock = ManualClock::new(Utc::now());
        assert!(purge(&store, Some("not-an-address".into()), false, &clock).await.is_err());
    }
}
