// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! Vaultguard Core
//!
//! Workflow engine for secured contracts: time-locked two-phase requests,
//! owner-signed meta-transactions, and the pending-operation view built on
//! top of both.
//!
//! # Architecture
//!
//! - **Layer:** Core System
//! - **Purpose:** Domain model, use cases and adapters for secured-contract operations

pub mod domain;
pub mod application;
pub mod infrastructure;

pub use domain::*;
