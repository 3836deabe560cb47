// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Token list commands
//!
//! Commands: list, add, remove

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;
use std::sync::Arc;

use vaultguard_core::domain::repository::{KeyValueStore, TokenListRepository};
use vaultguard_core::infrastructure::KvTokenListRepository;

use super::{open_store, parse_address};

#[derive(Subcommand)]
pub enum TokensCommand {
    /// List tokens tracked for a vault contract
    List {
        #[arg(value_name = "CONTRACT")]
        contract: String,
    },

    /// Track a token
    Add {
        #[arg(value_name = "CONTRACT")]
        contract: String,

        #[arg(value_name = "TOKEN")]
        token: String,
    },

    /// Stop tracking a token
    Remove {
        #[arg(value_name = "CONTRACT")]
        contract: String,

        #[arg(value_name = "TOKEN")]
        token: String,
    },
}

pub async fn handle_command(
    command: TokensCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    let (_, store) = open_store(config_override)?;
    let store: Arc<dyn KeyValueStore> = store;
    let repo = KvTokenListRepository::new(store);

    match command {
        TokensCommand::List { contract } => {
            let contract = parse_address(&contract)?;
            let tokens = repo
                .list(contract)
                .await
                .context("Failed to read token list")?;
            if tokens.is_empty() {
                println!("{}", "No tokens tracked".dimmed());
            }
            for token in tokens {
                println!("{}", token);
            }
        }
        TokensCommand::Add { contract, token } => {
            let contract = parse_address(&contract)?;
            let token = parse_address(&token)?;
            if repo.add(contract, token).await.context("Failed to update token list")? {
                println!("{}", format!("✓ Tracking {}", token).green());
            } else {
                println!("{}", format!("{} is already tracked", token).yellow());
            }
        }
        TokensCommand::Remove { contract, token } => {
            let contract = parse_address(&contract)?;
            let token = parse_address(&token)?;
            if repo.remove(contract, token).await.context("Failed to update token list")? {
                println!("{}", format!("✓ Stopped tracking {}", token).green());
            } else {
                println!("{}", format!("{} was not tracked", token).yellow());
            }
        }
    }

    Ok(())
}
