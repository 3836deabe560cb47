// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Engine Configuration
//
// Policy knobs for the workflow engine:
// - Time-lock bounds accepted for TimelockUpdate requests
// - Meta-transaction deadline buffer and gas-price ceiling defaults
// - Operational timeout applied to every chain call
// - Event bus capacity and local store location

use alloy_primitives::U256;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::domain::units::{gwei, u256_string};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    #[serde(default)]
    pub timelock: TimelockPolicy,

    #[serde(default)]
    pub meta_tx: MetaTxPolicy,

    #[serde(default)]
    pub chain: ChainSettings,

    #[serde(default)]
    pub events: EventSettings,

    #[serde(default)]
    pub store: StoreSettings,
}

/// Accepted time-lock period range, in days (inclusive).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TimelockPolicy {
    #[serde(default = "default_min_days")]
    pub min_days: u64,

    #[serde(default = "default_max_days")]
    pub max_days: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTxPolicy {
    /// Validity window added to the signing time.
    #[serde(default = "default_deadline_buffer", with = "humantime_serde")]
    pub deadline_buffer: Duration,

    /// Default ceiling signed into new meta-transactions.
    #[serde(default = "default_max_gas_price", with = "u256_string")]
    pub max_gas_price_wei: U256,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChainSettings {
    /// Abandon a stuck submit/wait/read after this long.
    #[serde(default = "default_call_timeout", with = "humantime_serde")]
    pub call_timeout: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventSettings {
    #[serde(default = "default_capacity")]
    pub capacity: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoreSettings {
    #[serde(default = "default_store_path")]
    pub path: PathBuf,
}

fn default_min_days() -> u64 {
    1
}

fn default_max_days() -> u64 {
    30
}

fn default_deadline_buffer() -> Duration {
    Duration::from_secs(3600)
}

fn default_max_gas_price() -> U256 {
    gwei(50)
}

fn default_call_timeout() -> Duration {
    Duration::from_secs(120)
}

fn default_capacity() -> usize {
    1000
}

fn default_store_path() -> PathBuf {
    PathBuf::from("./vaultguard-store.json")
}

impl Default for TimelockPolicy {
    fn default() -> Self {
        Self {
            min_days: default_min_days(),
            max_days: default_max_days(),
        }
    }
}

impl TimelockPolicy {
    pub fn contains(&self, days: u64) -> bool {
        (self.min_days..=self.max_days).contains(&days)
    }
}

impl Default for MetaTxPolicy {
    fn default() -> Self {
        Self {
            deadline_buffer: default_deadline_buffer(),
            max_gas_price_wei: default_max_gas_price(),
        }
    }
}

impl Default for ChainSettings {
    fn default() -> Self {
        Self {
            call_timeout: default_call_timeout(),
        }
    }
}

impl Default for EventSettings {
    fn default() -> Self {
        Self {
            capacity: default_capacity(),
        }
    }
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            path: default_store_path(),
        }
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            timelock: TimelockPolicy::default(),
            meta_tx: MetaTxPolicy::default(),
            chain: ChainSettings::default(),
            events: EventSettings::default(),
            store: StoreSettings::default(),
        }
    }
}

impl EngineConfig {
    /// Load configuration from YAML file
    pub fn from_yaml_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config = serde_yaml::from_str(&content)?;
        Ok(config)
    }

    /// Save configuration to YAML file
    pub fn to_yaml_file(&self, path: impl AsRef<Path>) -> anyhow::Result<()> {
        let yaml = serde_yaml::to_string(self)?;
        std::fs::write(path, yaml)?;
        Ok(())
    }

    pub fn from_yaml_str(yaml: &str) -> anyhow::Result<Self> {
        let config = serde_yaml::from_str(yaml)?;
        Ok(config)
    }

    /// Discover configuration file using precedence order
    /// 1. VAULTGUARD_CONFIG_PATH environment variable
    /// 2. ./vaultguard.yaml (working directory)
    /// 3. ~/.vaultguard/config.yaml (user home)
    pub fn discover_config() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("VAULTGUARD_CONFIG_PATH") {
            let path = PathBuf::from(path);
            if path.exists() {
                return Some(path);
            }
        }

        let cwd = PathBuf::from("./vaultguard.yaml");
        if cwd.exists() {
            return Some(cwd);
        }

        if let Some(home) = dirs::home_dir() {
            let user_config = home.join(".vaultguard").join("config.yaml");
            if user_config.exists() {
                return Some(user_config);
            }
        }

        None
    }

    /// Load configuration with discovery, fallback to default
    pub fn load_or_default(cli_path: Option<PathBuf>) -> anyhow::Result<Self> {
        if let Some(path) = cli_path {
            tracing::info!("Loading configuration from explicit path: {:?}", path);
            let mut config = Self::from_yaml_file(&path)
                .map_err(|e| anyhow::anyhow!("Failed to load config at {:?}: {}", path, e))?;
            config.apply_env_overrides();
            return Ok(config);
        }

        if let Some(config_path) = Self::discover_config() {
            tracing::info!("Loading configuration from discovered path: {:?}", config_path);
            let mut config = Self::from_yaml_file(config_path)?;
            config.apply_env_overrides();
            Ok(config)
        } else {
            tracing::warn!("No configuration file found in standard locations. Using defaults.");
            let mut config = Self::default();
            config.apply_env_overrides();
            Ok(config)
        }
    }

    /// Apply environment variable overrides to configuration
    pub fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("VAULTGUARD_CHAIN_TIMEOUT_SECS") {
            match val.parse::<u64>() {
                Ok(secs) => {
                    tracing::info!("Environment override: VAULTGUARD_CHAIN_TIMEOUT_SECS={}", secs);
                    self.chain.call_timeout = Duration::from_secs(secs);
                }
                Err(_) => tracing::warn!(
                    "Invalid value for VAULTGUARD_CHAIN_TIMEOUT_SECS: '{}'. Expected seconds. Ignoring.",
                    val
                ),
            }
        }

        if let Ok(val) = std::env::var("VAULTGUARD_MAX_GAS_PRICE_WEI") {
            match val.parse::<U256>() {
                Ok(wei) => {
                    tracing::info!("Environment override: VAULTGUARD_MAX_GAS_PRICE_WEI={}", wei);
                    self.meta_tx.max_gas_price_wei = wei;
                }
                Err(_) => tracing::warn!(
                    "Invalid value for VAULTGUARD_MAX_GAS_PRICE_WEI: '{}'. Expected an integer. Ignoring.",
                    val
                ),
            }
        }
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.timelock.min_days == 0 {
            anyhow::bail!("timelock.min_days must be at least 1");
        }
        if self.timelock.min_days > self.timelock.max_days {
            anyhow::bail!(
                "timelock.min_days ({}) cannot exceed timelock.max_days ({})",
                self.timelock.min_days,
                self.timelock.max_days
            );
        }
        if self.meta_tx.deadline_buffer.is_zero() {
            anyhow::bail!("meta_tx.deadline_buffer cannot be zero");
        }
        if self.chain.call_timeout.is_zero() {
            anyhow::bail!("chain.call_timeout cannot be zero");
        }
        if self.events.capacity == 0 {
            anyhow::bail!("events.capacity cannot be zero");
        }
        Ok(())
    }
}
