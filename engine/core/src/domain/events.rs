// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use alloy_primitives::{Address, B256};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::domain::meta_tx::MetaTxId;
use crate::domain::operation::{OperationType, TxId};
use crate::domain::roles::RoleSet;

/// State transitions of pending operations and meta-transactions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum WorkflowEvent {
    OperationRequested {
        contract: Address,
        tx_id: TxId,
        operation: OperationType,
        requester: Address,
        release_time: DateTime<Utc>,
    },
    OperationApproved {
        contract: Address,
        tx_id: TxId,
        operation: OperationType,
        approved_at: DateTime<Utc>,
    },
    OperationCancelled {
        contract: Address,
        tx_id: TxId,
        operation: OperationType,
        cancelled_at: DateTime<Utc>,
    },
    MetaTxSigned {
        contract: Address,
        id: MetaTxId,
        operation: OperationType,
        signer: Address,
        deadline: DateTime<Utc>,
    },
    MetaTxStored {
        contract: Address,
        id: MetaTxId,
    },
    MetaTxBroadcast {
        contract: Address,
        id: MetaTxId,
        tx_hash: B256,
    },
    MetaTxConfirmed {
        contract: Address,
        id: MetaTxId,
        tx_hash: B256,
    },
    MetaTxFailed {
        contract: Address,
        id: MetaTxId,
        reason: String,
    },
    MetaTxExpired {
        contract: Address,
        id: MetaTxId,
        deadline: DateTime<Utc>,
    },
    RolesRefreshed {
        contract: Address,
        roles: RoleSet,
        refreshed_at: DateTime<Utc>,
    },
}

impl WorkflowEvent {
    pub fn contract(&self) -> Address {
        match self {
            Self::OperationRequested { contract, .. }
            | Self::OperationApproved { contract, .. }
            | Self::OperationCancelled { contract, .. }
            | Self::MetaTxSigned { contract, .. }
            | Self::MetaTxStored { contract, .. }
            | Self::MetaTxBroadcast { contract, .. }
            | Self::MetaTxConfirmed { contract, .. }
            | Self::MetaTxFailed { contract, .. }
            | Self::MetaTxExpired { contract, .. }
            | Self::RolesRefreshed { contract, .. } => *contract,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationLevel {
    Error,
    Warning,
    Info,
    Success,
}

/// User-facing outcome message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    pub id: Uuid,
    #[serde(rename = "type")]
    pub level: NotificationLevel,
    pub title: String,
    pub description: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub contract: Option<Address>,
    pub created_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(level: NotificationLevel, title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            level,
            title: title.into(),
            description: description.into(),
            contract: None,
            created_at: Utc::now(),
        }
    }

    pub fn error(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Error, title, description)
    }

    pub fn warning(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Warning, title, description)
    }

    pub fn info(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Info, title, description)
    }

    pub fn success(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self::new(NotificationLevel::Success, title, description)
    }

    pub fn for_contract(mut self, contract: Address) -> Self {
        self.contract = Some(contract);
        self
    }
}

/// Fire-and-forget receiver of notifications.
pub trait NotificationSink: Send + Sync {
    fn notify(&self, notification: Notification);
}

/// Receiver of domain events.
pub trait EventPublisher: Send + Sync {
    fn publish_workflow_event(&self, event: WorkflowEvent);
}
