// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

pub mod chain_gateway;
pub mod pending_tracker;
pub mod temporal_workflow;
pub mod meta_tx_engine;
pub mod security_operations;
mod notify;

// Re-export services for convenience
pub use chain_gateway::ChainGateway;
pub use meta_tx_engine::MetaTransactionEngine;
pub use pending_tracker::{filter_by_kind, PendingOperationTracker, PendingSnapshot};
pub use security_operations::{
    EngineDependencies, SecurityOperationsUseCase, StandardSecurityOperationsService, SubmissionOutcome,
};
pub use temporal_workflow::TemporalWorkflow;
