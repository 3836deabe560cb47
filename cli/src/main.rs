// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! # Vaultguard CLI
//!
//! Operator tooling around the workflow engine's local state.
//!
//! ## Commands
//!
//! - `vaultguard config show|validate|generate` - Configuration management
//! - `vaultguard metatx list|purge` - Inspect and clean the signed meta-transaction store
//! - `vaultguard tokens list|add|remove` - Per-contract token list

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use colored::Colorize;
use std::path::PathBuf;

mod commands;

use commands::{ConfigCommand, MetaTxCommand, TokensCommand};

/// Vaultguard - secured contract workflow tooling
#[derive(Parser)]
#[command(name = "vaultguard")]
#[command(version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    /// Path to configuration file (overrides discovery)
    #[arg(
        short,
        long,
        global = true,
        env = "VAULTGUARD_CONFIG_PATH",
        value_name = "FILE"
    )]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, global = true, env = "VAULTGUARD_LOG_LEVEL", default_value = "warn")]
    log_level: String,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Configuration management
    #[command(name = "config")]
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },

    /// Locally stored meta-transactions
    #[command(name = "metatx")]
    MetaTx {
        #[command(subcommand)]
        command: MetaTxCommand,
    },

    /// Tracked tokens per vault contract
    #[command(name = "tokens")]
    Tokens {
        #[command(subcommand)]
        command: TokensCommand,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    init_logging(&cli.log_level)?;

    match cli.command {
        Some(Commands::Config { command }) => {
            commands::config::handle_command(command, cli.config).await
        }
        Some(Commands::MetaTx { command }) => {
            commands::metatx::handle_command(command, cli.config).await
        }
        Some(Commands::Tokens { command }) => {
            commands::tokens::handle_command(command, cli.config).await
        }
        None => {
            eprintln!("{}", "No command specified. Use --help for usage.".yellow());
            std::process::exit(1);
        }
    }
}

/// Initialize tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = tracing_subscriber::EnvFilter::try_from_default_env()
        .or_else(|_| tracing_subscriber::EnvFilter::try_new(level))
        .context("Failed to create log filter")?;

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .init();

    Ok(())
}
