// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Command implementations for the Vaultguard CLI

pub mod config;
pub mod metatx;
pub mod tokens;

pub use self::config::ConfigCommand;
pub use self::metatx::MetaTxCommand;
pub use self::tokens::TokensCommand;

use alloy_primitives::Address;
use anyhow::{Context, Result};
use std::path::PathBuf;
use std::sync::Arc;

use vaultguard_core::infrastructure::JsonFileKeyValueStore;
use vaultguard_core::domain::config::EngineConfig;

/// Load configuration and open the file-backed store it points at.
pub(crate) fn open_store(
    config_override: Option<PathBuf>,
) -> Result<(EngineConfig, Arc<JsonFileKeyValueStore>)> {
    let config = EngineConfig::load_or_default(config_override)
        .context("Failed to load configuration")?;
    let store = Arc::new(JsonFileKeyValueStore::new(&config.store.path));
    Ok((config, store))
}

pub(crate) fn parse_address(raw: &str) -> Result<Address> {
    raw.parse::<Address>()
        .with_context(|| format!("Invalid address: {}", raw))
}
