// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use alloy_primitives::{Address, U256};
use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::chain::ChainError;
use crate::domain::meta_tx::MetaTxId;
use crate::domain::operation::{OperationType, OperationTypeId, TxId};
use crate::domain::repository::RepositoryError;
use crate::domain::roles::Action;

/// Failures of the security workflow.
///
/// Validation and authorization variants leave the attempted action
/// unchanged. `ChainCallFailed` means the local view may be stale; the
/// application layer refreshes before returning it.
#[derive(Debug, Error)]
pub enum WorkflowError {
    #[error("{caller} is not authorized to {action}")]
    Unauthorized { action: Action, caller: Address },

    #[error("Operation {tx_id} is time-locked until {release_time}")]
    NotReady { tx_id: TxId, release_time: DateTime<Utc> },

    #[error("Operation {0} is already settled")]
    AlreadySettled(String),

    #[error("A pending {operation} request already exists for contract {contract}")]
    DuplicatePendingOperation { contract: Address, operation: OperationType },

    #[error("Invalid signature: {0}")]
    InvalidSignature(String),

    #[error("Signature recovered to {recovered}, expected {expected}")]
    SignerMismatch { expected: Address, recovered: Address },

    #[error("Meta-transaction {id} expired at {deadline}")]
    Expired { id: MetaTxId, deadline: DateTime<Utc> },

    #[error("Network gas price {current} wei exceeds the signed ceiling of {max} wei")]
    GasPriceExceeded { current: U256, max: U256 },

    #[error("An equivalent meta-transaction is already stored: {0}")]
    DuplicateMetaTransaction(MetaTxId),

    #[error("Unknown operation type: {0}")]
    UnknownOperationType(OperationTypeId),

    #[error("Chain call failed: {0}")]
    ChainCallFailed(#[from] ChainError),

    #[error("Operation {tx_id} not found for contract {contract}")]
    OperationNotFound { contract: Address, tx_id: TxId },

    #[error("Meta-transaction {0} not found")]
    MetaTransactionNotFound(MetaTxId),

    #[error("Invalid parameters: {0}")]
    InvalidParameters(String),

    #[error("Time-lock period of {requested} days is outside the allowed range [{min}, {max}]")]
    TimelockOutOfBounds { requested: u64, min: u64, max: u64 },

    #[error("Repository error: {0}")]
    Repository(#[from] RepositoryError),
}

impl WorkflowError {
    /// Validation and authorization failures: the action was rejected before
    /// anything reached the chain.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::ChainCallFailed(_) | Self::Repository(_))
    }

    /// Short title used when the error is surfaced as a notification.
    pub fn title(&self) -> &'static str {
        match self {
            Self::Unauthorized { .. } => "Not authorized",
            Self::NotReady { .. } => "Time-lock not elapsed",
            Self::AlreadySettled(_) => "Already settled",
            Self::DuplicatePendingOperation { .. } => "Request already pending",
            Self::InvalidSignature(_) => "Invalid signature",
            Self::SignerMismatch { .. } => "Wrong signer",
            Self::Expired { .. } => "Meta-transaction expired",
            Self::GasPriceExceeded { .. } => "Gas price too high",
            Self::DuplicateMetaTransaction(_) => "Duplicate meta-transaction",
            Self::UnknownOperationType(_) => "Unknown operation",
            Self::ChainCallFailed(_) => "Transaction failed",
            Self::OperationNotFound { .. } | Self::MetaTransactionNotFound(_) => "Not found",
            Self::InvalidParameters(_) | Self::TimelockOutOfBounds { .. } => "Invalid request",
            Self::Repository(_) => "Storage error",
        }
    }
}
