// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Meta-Transactions
//!
//! An off-chain-signed authorization for a single-phase operation. The owner
//! signs a [`MetaTxPayload`]; the broadcaster later submits it on-chain.
//!
//! ## Lifecycle
//!
//! ```text
//! build ─▶ sign ─▶ UNBROADCAST ─▶ BROADCASTED ─▶ CONFIRMED
//!                      │                     └─▶ FAILED
//!                      └─ deadline passes ─▶ purged
//! ```
//!
//! A payload is never accepted for broadcast after `deadline`, nor at a
//! network gas price above `max_gas_price`.

use alloy_primitives::{keccak256, Address, Bytes, B256, U256};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::errors::WorkflowError;
use crate::domain::operation::{OperationParams, OperationType};
use crate::domain::units::u256_string;

/// Unique identifier of a meta-transaction, derived from
/// `(contract, operation type, nonce)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct MetaTxId(pub B256);

impl MetaTxId {
    pub fn derive(contract: Address, operation_type: OperationType, nonce: U256) -> Self {
        let mut buf = Vec::with_capacity(20 + 32 + 32);
        buf.extend_from_slice(contract.as_slice());
        buf.extend_from_slice(operation_type.type_id().0.as_slice());
        buf.extend_from_slice(&nonce.to_be_bytes::<32>());
        Self(keccak256(&buf))
    }
}

impl fmt::Display for MetaTxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Caller-supplied overrides for deadline and gas ceiling.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct MetaTxOptions {
    /// Seconds from signing until the payload expires.
    pub deadline_seconds: Option<u64>,
    pub max_gas_price_wei: Option<U256>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum BroadcastStatus {
    Unbroadcast,
    Broadcasted,
    Confirmed,
    Failed,
}

/// Unsigned payload with its canonical digest.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetaTxPayload {
    pub id: MetaTxId,
    pub contract_address: Address,
    pub operation_type: OperationType,
    pub params: OperationParams,
    #[serde(with = "u256_string")]
    pub nonce: U256,
    pub signer: Address,
    pub signed_at: DateTime<Utc>,
    pub deadline: DateTime<Utc>,
    #[serde(with = "u256_string")]
    pub max_gas_price: U256,
}

impl MetaTxPayload {
    /// `None` when the deadline falls outside the representable time range.
    pub fn new(
        contract_address: Address,
        params: OperationParams,
        nonce: U256,
        signer: Address,
        signed_at: DateTime<Utc>,
        deadline_buffer: Duration,
        max_gas_price: U256,
    ) -> Option<Self> {
        let deadline = signed_at.checked_add_signed(deadline_buffer)?;
        let operation_type = params.operation_type();
        Some(Self {
            id: MetaTxId::derive(contract_address, operation_type, nonce),
            contract_address,
            operation_type,
            params,
            nonce,
            signer,
            signed_at,
            deadline,
            max_gas_price,
        })
    }

    /// Canonical byte encoding that the signature covers.
    pub fn signing_bytes(&self) -> Vec<u8> {
        let mut buf = Vec::with_capacity(256);
        buf.extend_from_slice(self.id.0.as_slice());
        buf.extend_from_slice(self.contract_address.as_slice());
        buf.extend_from_slice(self.signer.as_slice());
        buf.extend_from_slice(&self.nonce.to_be_bytes::<32>());
        buf.extend_from_slice(&U256::from(self.deadline.timestamp().max(0) as u64).to_be_bytes::<32>());
        buf.extend_from_slice(&self.max_gas_price.to_be_bytes::<32>());
        buf.extend_from_slice(keccak256(self.params.encode()).as_slice());
        buf
    }

    pub fn digest(&self) -> B256 {
        keccak256(self.signing_bytes())
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now > self.deadline
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SignedMetaTransaction {
    pub payload: MetaTxPayload,
    pub signature: Bytes,
    pub broadcast_status: BroadcastStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub broadcast_tx_hash: Option<B256>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub failure_reason: Option<String>,
}

impl SignedMetaTransaction {
    pub fn new(payload: MetaTxPayload, signature: Bytes) -> Self {
        Self {
            payload,
            signature,
            broadcast_status: BroadcastStatus::Unbroadcast,
            broadcast_tx_hash: None,
            failure_reason: None,
        }
    }

    pub fn id(&self) -> MetaTxId {
        self.payload.id
    }

    pub fn contract_address(&self) -> Address {
        self.payload.contract_address
    }

    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.payload.is_expired(now)
    }

    /// Signed but never handed to the chain, and past its deadline.
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.broadcast_status == BroadcastStatus::Unbroadcast && self.is_expired(now)
    }

    /// Whether `other` authorizes the same thing and is still usable.
    pub fn is_equivalent_live(&self, other: &SignedMetaTransaction, now: DateTime<Utc>) -> bool {
        if self.id() == other.id() {
            return true;
        }
        self.broadcast_status == BroadcastStatus::Unbroadcast
            && !self.is_expired(now)
            && self.payload.contract_address == other.payload.contract_address
            && self.payload.params == other.payload.params
    }

    /// Broadcast preconditions, checked in order: deadline, then gas ceiling.
    pub fn check_broadcastable(&self, now: DateTime<Utc>, current_gas_price: U256) -> Result<(), WorkflowError> {
        if self.is_expired(now) {
            return Err(WorkflowError::Expired {
                id: self.id(),
                deadline: self.payload.deadline,
            });
        }
        if current_gas_price > self.payload.max_gas_price {
            return Err(WorkflowError::GasPriceExceeded {
                current: current_gas_price,
                max: self.payload.max_gas_price,
            });
        }
        if self.broadcast_status != BroadcastStatus::Unbroadcast {
            return Err(WorkflowError::AlreadySettled(self.id().to_string()));
        }
        Ok(())
    }

    pub fn mark_broadcasted(&mut self, tx_hash: B256) {
        self.broadcast_status = BroadcastStatus::Broadcasted;
        self.broadcast_tx_hash = Some(tx_hash);
    }

    pub fn mark_confirmed(&mut self) {
        self.broadcast_status = BroadcastStatus::Confirmed;
    }

    pub fn mark_failed(&mut self, reason: impl Into<String>) {
        self.broadcast_status = BroadcastStatus::Failed;
        self.failure_reason = Some(reason.into());
    }
}
