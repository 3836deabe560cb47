// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Chain Client Boundary
//!
//! The engine treats the chain as an opaque request/response service. It
//! hands over [`CallDescriptor`]s, receives [`TransactionHandle`]s whose
//! `wait()` yields a [`Receipt`], and issues typed [`ChainQuery`] reads.
//! ABI encoding, RPC transport and gas estimation all live behind this trait.

use alloy_primitives::{Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::meta_tx::SignedMetaTransaction;
use crate::domain::operation::{OperationParams, OperationType, OperationTypeId, TxId};
use crate::domain::roles::RoleSet;
use crate::domain::tx_record::TxStatus;

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ChainError {
    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Transaction reverted: {0}")]
    Reverted(String),

    #[error("Chain call timed out after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Unexpected response to {query}: {detail}")]
    UnexpectedResponse { query: String, detail: String },
}

/// Read-only snapshot of a secured contract.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContractState {
    pub address: Address,
    pub roles: RoleSet,
    pub timelock_period_secs: u64,
}

impl ContractState {
    pub fn timelock_period(&self) -> Result<Duration, ChainError> {
        i64::try_from(self.timelock_period_secs)
            .ok()
            .and_then(Duration::try_seconds)
            .ok_or_else(|| self.bad_timelock())
    }

    /// Release time of a request filed at `requested_at`.
    pub fn release_time(&self, requested_at: DateTime<Utc>) -> Result<DateTime<Utc>, ChainError> {
        requested_at
            .checked_add_signed(self.timelock_period()?)
            .ok_or_else(|| self.bad_timelock())
    }

    fn bad_timelock(&self) -> ChainError {
        ChainError::UnexpectedResponse {
            query: format!("contract_state({})", self.address),
            detail: format!("time-lock period of {}s is out of range", self.timelock_period_secs),
        }
    }
}

/// Operation record as reported by the chain. The type id is opaque and the
/// parameters are undecoded until the registry recognises the type.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChainOperation {
    pub tx_id: TxId,
    pub operation_type_id: OperationTypeId,
    pub status: TxStatus,
    pub requested_at: DateTime<Utc>,
    pub release_time: DateTime<Utc>,
    pub requester: Address,
    pub params: serde_json::Value,
}

/// A state-changing call against a contract.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CallDescriptor {
    RequestOperation {
        contract: Address,
        from: Address,
        params: OperationParams,
    },
    ApproveOperation {
        contract: Address,
        from: Address,
        tx_id: TxId,
    },
    CancelOperation {
        contract: Address,
        from: Address,
        tx_id: TxId,
    },
    ExecuteMetaTx {
        contract: Address,
        from: Address,
        meta_tx: Box<SignedMetaTransaction>,
        gas_price: U256,
    },
}

impl CallDescriptor {
    pub fn contract(&self) -> Address {
        match self {
            Self::RequestOperation { contract, .. }
            | Self::ApproveOperation { contract, .. }
            | Self::CancelOperation { contract, .. }
            | Self::ExecuteMetaTx { contract, .. } => *contract,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Self::RequestOperation { .. } => "request",
            Self::ApproveOperation { .. } => "approve",
            Self::CancelOperation { .. } => "cancel",
            Self::ExecuteMetaTx { .. } => "execute_meta_tx",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChainQuery {
    ContractState { contract: Address },
    Operations { contract: Address },
    MetaTxNonce { contract: Address, operation: OperationType },
    GasPrice,
}

impl std::fmt::Display for ChainQuery {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ContractState { contract } => write!(f, "contract_state({})", contract),
            Self::Operations { contract } => write!(f, "operations({})", contract),
            Self::MetaTxNonce { contract, operation } => write!(f, "meta_tx_nonce({}, {})", contract, operation),
            Self::GasPrice => f.write_str("gas_price"),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ChainValue {
    ContractState(ContractState),
    Operations(Vec<ChainOperation>),
    Nonce(U256),
    GasPrice(U256),
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    pub tx_hash: B256,
    pub success: bool,
    /// Identifier assigned by the contract to a newly filed request.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tx_id: Option<TxId>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revert_reason: Option<String>,
}

/// Handle to a submitted transaction.
#[async_trait]
pub trait TransactionHandle: Send {
    fn tx_hash(&self) -> B256;

    /// Resolve once the transaction is mined.
    async fn wait(self: Box<Self>) -> Result<Receipt, ChainError>;
}

#[async_trait]
pub trait ChainClient: Send + Sync {
    async fn submit(&self, call: CallDescriptor) -> Result<Box<dyn TransactionHandle>, ChainError>;

    async fn read(&self, query: ChainQuery) -> Result<ChainValue, ChainError>;
}
