// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # TxRecord Aggregate
//!
//! One in-flight or settled two-phase operation. The state machine is
//! `PENDING → COMPLETED | CANCELLED`; both outcomes are terminal.
//!
//! Everything about a record's readiness is derived from its own fields
//! (`status`, `release_time`): there are no hidden timers, so any client can
//! recompute "ready for approval" and the progress bar locally.

use alloy_primitives::Address;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use crate::domain::errors::WorkflowError;
use crate::domain::operation::{OperationParams, OperationType, TxId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TxStatus {
    Pending,
    Completed,
    Cancelled,
}

impl TxStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, TxStatus::Pending)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TxRecord {
    pub tx_id: TxId,
    pub contract_address: Address,
    pub operation_type: OperationType,
    pub status: TxStatus,
    pub requested_at: DateTime<Utc>,
    pub release_time: DateTime<Utc>,
    pub params: OperationParams,
    pub requester: Address,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub settled_at: Option<DateTime<Utc>>,
}

impl TxRecord {
    /// Create a PENDING record whose release time is `requested_at + lock`.
    /// A negative lock is treated as zero so `release_time >= requested_at`.
    /// `None` if the release time is not representable.
    pub fn request(
        tx_id: TxId,
        contract_address: Address,
        params: OperationParams,
        requester: Address,
        requested_at: DateTime<Utc>,
        lock: Duration,
    ) -> Option<Self> {
        let release_time = requested_at.checked_add_signed(lock.max(Duration::zero()))?;
        Some(Self {
            tx_id,
            contract_address,
            operation_type: params.operation_type(),
            status: TxStatus::Pending,
            requested_at,
            release_time,
            params,
            requester,
            settled_at: None,
        })
    }

    pub fn is_pending(&self) -> bool {
        self.status == TxStatus::Pending
    }

    pub fn lock_duration(&self) -> Duration {
        self.release_time - self.requested_at
    }

    pub fn is_ready(&self, now: DateTime<Utc>) -> bool {
        self.is_pending() && now >= self.release_time
    }

    /// Time left until approval becomes valid; zero once released.
    pub fn time_remaining(&self, now: DateTime<Utc>) -> Duration {
        (self.release_time - now).max(Duration::zero())
    }

    /// Share of the time-lock that has elapsed, clamped to `[0, 100]`.
    pub fn progress_percent(&self, now: DateTime<Utc>) -> u8 {
        let lock = self.lock_duration().num_milliseconds();
        if lock <= 0 {
            return 100;
        }
        let elapsed = (now - (self.release_time - self.lock_duration())).num_milliseconds();
        let percent = elapsed.saturating_mul(100) / lock;
        percent.clamp(0, 100) as u8
    }

    pub fn ensure_approvable(&self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::AlreadySettled(self.tx_id.to_string()));
        }
        if now < self.release_time {
            return Err(WorkflowError::NotReady {
                tx_id: self.tx_id,
                release_time: self.release_time,
            });
        }
        Ok(())
    }

    pub fn ensure_cancellable(&self) -> Result<(), WorkflowError> {
        if self.status.is_terminal() {
            return Err(WorkflowError::AlreadySettled(self.tx_id.to_string()));
        }
        Ok(())
    }

    pub fn approve(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.ensure_approvable(now)?;
        self.status = TxStatus::Completed;
        self.settled_at = Some(now);
        Ok(())
    }

    pub fn cancel(&mut self, now: DateTime<Utc>) -> Result<(), WorkflowError> {
        self.ensure_cancellable()?;
        self.status = TxStatus::Cancelled;
        self.settled_at = Some(now);
        Ok(())
    }
}

/// Merge a freshly fetched record with the locally known one.
///
/// The fetched record wins, except that a locally settled record is never
/// regressed back to PENDING by a stale fetch.
pub fn reconcile(local: Option<&TxRecord>, fetched: TxRecord) -> TxRecord {
    match local {
        Some(local) if local.status.is_terminal() && !fetched.status.is_terminal() => local.clone(),
        _ => fetched,
    }
}
