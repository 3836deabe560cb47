// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Domain
//!
//! Entities, value objects and boundary traits of the security workflow.
//!
//! # Architecture
//!
//! - **Layer:** Domain Layer
//! - **Purpose:** Operation catalogue, role rules, record state machines

pub mod units;
pub mod operation;
pub mod registry;
pub mod errors;
pub mod roles;
pub mod clock;
pub mod tx_record;
pub mod meta_tx;
pub mod signature;
pub mod chain;
pub mod repository;
pub mod events;
pub mod config;
