// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Operation Types and Parameters
//!
//! Closed set of privileged operations a secured contract accepts, the opaque
//! on-chain identifier each one is known by, and the typed payload carried by
//! a request.
//!
//! | Type | Payload | Scope |
//! |------|---------|-------|
//! | `OwnershipTransfer` | new owner | Core |
//! | `BroadcasterUpdate` | new broadcaster | Core |
//! | `RecoveryUpdate` | new recovery address | Core |
//! | `TimelockUpdate` | new period in days | Core |
//! | `WithdrawEth` | recipient, amount | Vault |
//! | `WithdrawToken` | token, recipient, amount | Vault |

use alloy_primitives::{keccak256, Address, B256, U256};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::units::u256_string;

/// Identifier of an operation record, assigned by the chain (or the engine)
/// when the request is filed. Immutable once assigned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct TxId(#[serde(with = "u256_string")] pub U256);

impl TxId {
    pub fn new(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl fmt::Display for TxId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Opaque operation-type identifier as emitted by contracts
/// (`keccak256` of the canonical operation name).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct OperationTypeId(pub B256);

impl OperationTypeId {
    pub fn from_name(name: &str) -> Self {
        Self(keccak256(name.as_bytes()))
    }
}

impl fmt::Display for OperationTypeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Security action a contract can be asked to perform.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationType {
    OwnershipTransfer,
    BroadcasterUpdate,
    RecoveryUpdate,
    TimelockUpdate,
    WithdrawEth,
    WithdrawToken,
}

impl OperationType {
    pub const ALL: [OperationType; 6] = [
        OperationType::OwnershipTransfer,
        OperationType::BroadcasterUpdate,
        OperationType::RecoveryUpdate,
        OperationType::TimelockUpdate,
        OperationType::WithdrawEth,
        OperationType::WithdrawToken,
    ];

    /// Name hashed into the on-chain operation-type identifier.
    pub fn canonical_name(&self) -> &'static str {
        match self {
            Self::OwnershipTransfer => "OWNERSHIP_TRANSFER",
            Self::BroadcasterUpdate => "BROADCASTER_UPDATE",
            Self::RecoveryUpdate => "RECOVERY_UPDATE",
            Self::TimelockUpdate => "TIMELOCK_UPDATE",
            Self::WithdrawEth => "WITHDRAW_ETH",
            Self::WithdrawToken => "WITHDRAW_TOKEN",
        }
    }

    /// Kebab-case form used in action names (`approve-ownership-transfer`).
    pub fn slug(&self) -> &'static str {
        match self {
            Self::OwnershipTransfer => "ownership-transfer",
            Self::BroadcasterUpdate => "broadcaster-update",
            Self::RecoveryUpdate => "recovery-update",
            Self::TimelockUpdate => "timelock-update",
            Self::WithdrawEth => "withdraw-eth",
            Self::WithdrawToken => "withdraw-token",
        }
    }

    pub fn from_slug(slug: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|op| op.slug() == slug)
    }

    pub fn type_id(&self) -> OperationTypeId {
        OperationTypeId::from_name(self.canonical_name())
    }

    /// Whether settling this operation changes the contract's role set.
    pub fn changes_roles(&self) -> bool {
        matches!(
            self,
            Self::OwnershipTransfer | Self::BroadcasterUpdate | Self::RecoveryUpdate
        )
    }
}

impl fmt::Display for OperationType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.canonical_name())
    }
}

/// Typed payload of an operation request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum OperationParams {
    OwnershipTransfer {
        new_owner: Address,
    },
    BroadcasterUpdate {
        new_broadcaster: Address,
    },
    RecoveryUpdate {
        new_recovery: Address,
    },
    TimelockUpdate {
        new_period_days: u64,
    },
    WithdrawEth {
        recipient: Address,
        #[serde(with = "u256_string")]
        amount: U256,
    },
    WithdrawToken {
        token: Address,
        recipient: Address,
        #[serde(with = "u256_string")]
        amount: U256,
    },
}

impl OperationParams {
    pub fn operation_type(&self) -> OperationType {
        match self {
            Self::OwnershipTransfer { .. } => OperationType::OwnershipTransfer,
            Self::BroadcasterUpdate { .. } => OperationType::BroadcasterUpdate,
            Self::RecoveryUpdate { .. } => OperationType::RecoveryUpdate,
            Self::TimelockUpdate { .. } => OperationType::TimelockUpdate,
            Self::WithdrawEth { .. } => OperationType::WithdrawEth,
            Self::WithdrawToken { .. } => OperationType::WithdrawToken,
        }
    }

    /// Structural checks that do not depend on contract state or policy.
    pub fn validate(&self) -> Result<(), String> {
        match self {
            Self::OwnershipTransfer { new_owner: addr }
            | Self::BroadcasterUpdate { new_broadcaster: addr }
            | Self::RecoveryUpdate { new_recovery: addr } => {
                if addr.is_zero() {
                    return Err("target address cannot be the zero address".to_string());
                }
            }
            Self::TimelockUpdate { .. } => {}
            Self::WithdrawEth { recipient, amount } => {
                if recipient.is_zero() {
                    return Err("recipient cannot be the zero address".to_string());
                }
                if amount.is_zero() {
                    return Err("withdrawal amount must be greater than zero".to_string());
                }
            }
            Self::WithdrawToken { token, recipient, amount } => {
                if token.is_zero() {
                    return Err("token cannot be the zero address".to_string());
                }
                if recipient.is_zero() {
                    return Err("recipient cannot be the zero address".to_string());
                }
                if amount.is_zero() {
                    return Err("withdrawal amount must be greater than zero".to_string());
                }
            }
        }
        Ok(())
    }

    /// Canonical bytes of the payload, used inside meta-transaction digests.
    pub fn encode(&self) -> Vec<u8> {
        let mut out = Vec::with_capacity(96);
        out.extend_from_slice(self.operation_type().type_id().0.as_slice());
        match self {
            Self::OwnershipTransfer { new_owner: addr }
            | Self::BroadcasterUpdate { new_broadcaster: addr }
            | Self::RecoveryUpdate { new_recovery: addr } => {
                out.extend_from_slice(addr.as_slice());
            }
            Self::TimelockUpdate { new_period_days } => {
                out.extend_from_slice(&U256::from(*new_period_days).to_be_bytes::<32>());
            }
            Self::WithdrawEth { recipient, amount } => {
                out.extend_from_slice(recipient.as_slice());
                out.extend_from_slice(&amount.to_be_bytes::<32>());
            }
            Self::WithdrawToken { token, recipient, amount } => {
                out.extend_from_slice(token.as_slice());
                out.extend_from_slice(recipient.as_slice());
                out.extend_from_slice(&amount.to_be_bytes::<32>());
            }
        }
        out
    }
}
