// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Configuration management commands
//!
//! Commands: show, validate, generate

use anyhow::{Context, Result};
use clap::Subcommand;
use colored::Colorize;
use std::path::PathBuf;

use vaultguard_core::domain::config::EngineConfig;
use vaultguard_core::domain::units::GWEI;

#[derive(Subcommand)]
pub enum ConfigCommand {
    /// Show current configuration
    Show {
        /// Show config file paths checked
        #[arg(long)]
        paths: bool,
    },

    /// Validate configuration file
    Validate {
        /// Path to config file (default: discover)
        #[arg(value_name = "FILE")]
        file: Option<PathBuf>,
    },

    /// Generate a configuration file populated with defaults
    Generate {
        /// Output path (default: ./vaultguard.yaml)
        #[arg(short, long, default_value = "./vaultguard.yaml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },
}

pub async fn handle_command(
    command: ConfigCommand,
    config_override: Option<PathBuf>,
) -> Result<()> {
    match command {
        ConfigCommand::Show { paths } => show(config_override, paths).await,
        ConfigCommand::Validate { file } => validate(file.or(config_override)).await,
        ConfigCommand::Generate { output, force } => generate(output, force).await,
    }
}

async fn show(config_override: Option<PathBuf>, show_paths: bool) -> Result<()> {
    let config = EngineConfig::load_or_default(config_override.clone())
        .context("Failed to load configuration")?;

    if show_paths {
        println!("{}", "Configuration discovery paths:".bold());
        if let Some(path) = &config_override {
            println!("  1. --config flag: {}", path.display());
        } else {
            println!("  1. --config flag: {}", "(not set)".dimmed());
        }
        println!(
            "  2. VAULTGUARD_CONFIG_PATH: {}",
            std::env::var("VAULTGUARD_CONFIG_PATH")
                .unwrap_or_else(|_| "(not set)".to_string())
                .dimmed()
        );
        println!("  3. ./vaultguard.yaml");
        println!("  4. ~/.vaultguard/config.yaml");
        println!();
    }

    println!("{}", "Current configuration:".bold());
    println!();

    println!("{}", "Time-lock:".bold());
    println!(
        "  Accepted period: {} - {} days",
        config.timelock.min_days, config.timelock.max_days
    );
    println!();

    println!("{}", "Meta-transactions:".bold());
    println!(
        "  Deadline buffer: {}",
        humanize(config.meta_tx.deadline_buffer)
    );
    let ceiling = config.meta_tx.max_gas_price_wei;
    println!(
        "  Max gas price: {} wei ({} gwei)",
        ceiling,
        ceiling / alloy_primitives::U256::from(GWEI)
    );
    println!();

    println!("{}", "Chain:".bold());
    println!("  Call timeout: {}", humanize(config.chain.call_timeout));
    println!();

    println!("{}", "Local state:".bold());
    println!("  Event capacity: {}", config.events.capacity);
    println!("  Store: {}", config.store.path.display());
    println!();

    Ok(())
}

async fn validate(config_path: Option<PathBuf>) -> Result<()> {
    println!("Validating configuration...");

    let config = EngineConfig::load_or_default(config_path)
        .context("Failed to load configuration")?;

    config
        .validate()
        .context("Configuration validation failed")?;

    println!("{}", "✓ Configuration is valid".green());

    Ok(())
}

async fn generate(output: PathBuf, force: bool) -> Result<()> {
    if output.exists() && !force {
        anyhow::bail!(
            "{} already exists (use --force to overwrite)",
            output.display()
        );
    }

    EngineConfig::default()
        .to_yaml_file(&output)
        .with_context(|| format!("Failed to write config to {:?}", output))?;

    println!(
        "{}",
        format!("✓ Configuration generated: {}", output.display()).green()
    );

    Ok(())
}

fn humanize(duration: std::time::Duration) -> String {
    let secs = duration.as_secs();
    match (secs / 3600, (secs % 3600) / 60, secs % 60) {
        (0, 0, s) => format!("{}s", s),
        (0, m, 0) => format!("{}m", m),
        (h, 0, 0) => format!("{}h", h),
        _ => format!("{}s", secs),
    }
}
