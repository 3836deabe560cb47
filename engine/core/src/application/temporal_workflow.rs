// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Temporal Workflow
//!
//! Two-phase operations: a request files a PENDING record on-chain with
//! `release_time = now + timelock_period`; once released, the owner approves
//! it, or the authorized role cancels it while still pending.
//!
//! ```text
//! NONE ──request──▶ PENDING ──approve (now >= release_time)──▶ COMPLETED
//!                      └──────cancel──────────────────────────▶ CANCELLED
//! ```
//!
//! Local records change only after the chain confirms the call. A failed
//! chain call refreshes the tracker before the error is returned.

use alloy_primitives::Address;
use std::sync::Arc;
use tracing::{info, warn};

use crate::application::chain_gateway::ChainGateway;
use crate::application::notify::report_failure;
use crate::application::pending_tracker::PendingOperationTracker;
use crate::domain::chain::{CallDescriptor, ChainError, ContractState};
use crate::domain::clock::Clock;
use crate::domain::config::TimelockPolicy;
use crate::domain::errors::WorkflowError;
use crate::domain::events::{EventPublisher, Notification, NotificationSink, WorkflowEvent};
use crate::domain::operation::{OperationParams, OperationType, TxId};
use crate::domain::registry::OperationRegistry;
use crate::domain::roles::{Action, RoleGuard};
use crate::domain::tx_record::TxRecord;

/// Reject a TimelockUpdate whose new period falls outside `policy`.
pub fn check_timelock_bounds(policy: &TimelockPolicy, params: &OperationParams) -> Result<(), WorkflowError> {
    if let OperationParams::TimelockUpdate { new_period_days } = params {
        if !policy.contains(*new_period_days) {
            return Err(WorkflowError::TimelockOutOfBounds {
                requested: *new_period_days,
                min: policy.min_days,
                max: policy.max_days,
            });
        }
    }
    Ok(())
}

pub(crate) fn authorize(action: Action, caller: Address, state: &ContractState) -> Result<(), WorkflowError> {
    if RoleGuard::authorize_caller(action, caller, &state.roles) {
        Ok(())
    } else {
        Err(WorkflowError::Unauthorized { action, caller })
    }
}

pub struct TemporalWorkflow {
    gateway: Arc<ChainGateway>,
    tracker: Arc<PendingOperationTracker>,
    registry: Arc<OperationRegistry>,
    notifications: Arc<dyn NotificationSink>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    timelock: TimelockPolicy,
}

impl TemporalWorkflow {
    pub fn new(
        gateway: Arc<ChainGateway>,
        tracker: Arc<PendingOperationTracker>,
        registry: Arc<OperationRegistry>,
        notifications: Arc<dyn NotificationSink>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        timelock: TimelockPolicy,
    ) -> Self {
        Self {
            gateway,
            tracker,
            registry,
            notifications,
            events,
            clock,
            timelock,
        }
    }

    /// File a new time-locked request on behalf of `caller`.
    pub async fn request(
        &self,
        contract: Address,
        params: OperationParams,
        caller: Address,
    ) -> Result<TxRecord, WorkflowError> {
        match self.try_request(contract, params, caller).await {
            Ok(record) => Ok(record),
            Err(e) => {
                report_failure(&self.tracker, self.notifications.as_ref(), contract, "request", &e).await;
                Err(e)
            }
        }
    }

    async fn try_request(
        &self,
        contract: Address,
        params: OperationParams,
        caller: Address,
    ) -> Result<TxRecord, WorkflowError> {
        params.validate().map_err(WorkflowError::InvalidParameters)?;
        check_timelock_bounds(&self.timelock, &params)?;
        let operation = params.operation_type();

        let state = self.tracker.contract_state(contract).await?;
        authorize(Action::Request(operation), caller, &state)?;
        let lock = state.timelock_period()?;
        state.release_time(self.clock.now())?;

        // The chain may hold a pending request this process never saw.
        let _reservation = if self.registry.describe(operation).allows_concurrent {
            None
        } else {
            self.tracker.refresh(contract).await?;
            Some(self.tracker.reserve_slot(contract, operation)?)
        };

        let receipt = self
            .gateway
            .submit_and_wait(CallDescriptor::RequestOperation {
                contract,
                from: caller,
                params: params.clone(),
            })
            .await?;

        let tx_id = receipt.tx_id.ok_or_else(|| ChainError::UnexpectedResponse {
            query: "request".to_string(),
            detail: format!("receipt {} carries no tx id", receipt.tx_hash),
        })?;

        let requested_at = self.clock.now();
        let record = TxRecord::request(tx_id, contract, params, caller, requested_at, lock)
            .ok_or_else(|| ChainError::UnexpectedResponse {
                query: "request".to_string(),
                detail: format!("release time of {} overflows from {}", tx_id, requested_at),
            })?;
        self.tracker.upsert(record.clone());

        info!(
            %contract,
            %tx_id,
            %operation,
            release_time = %record.release_time,
            "Operation requested"
        );
        self.events.publish_workflow_event(WorkflowEvent::OperationRequested {
            contract,
            tx_id,
            operation,
            requester: caller,
            release_time: record.release_time,
        });
        self.notifications.notify(
            Notification::success(
                "Request submitted",
                format!("{} request {} can be approved after {}", operation, tx_id, record.release_time),
            )
            .for_contract(contract),
        );

        Ok(record)
    }

    /// Approve a released request. Only valid while PENDING and once
    /// `now >= release_time`.
    pub async fn approve(&self, contract: Address, tx_id: TxId, caller: Address) -> Result<TxRecord, WorkflowError> {
        match self.try_approve(contract, tx_id, caller).await {
            Ok(record) => Ok(record),
            Err(e) => {
                report_failure(&self.tracker, self.notifications.as_ref(), contract, "approve", &e).await;
                Err(e)
            }
        }
    }

    async fn try_approve(&self, contract: Address, tx_id: TxId, caller: Address) -> Result<TxRecord, WorkflowError> {
        let record = self.lookup(contract, tx_id).await?;
        let operation = record.operation_type;

        let state = self.tracker.contract_state(contract).await?;
        authorize(Action::Approve(operation), caller, &state)?;
        record.ensure_approvable(self.clock.now())?;

        self.gateway
            .submit_and_wait(CallDescriptor::ApproveOperation {
                contract,
                from: caller,
                tx_id,
            })
            .await?;

        let mut settled = record;
        settled.approve(self.clock.now())?;
        self.tracker.upsert(settled.clone());

        info!(%contract, %tx_id, %operation, "Operation approved");
        self.events.publish_workflow_event(WorkflowEvent::OperationApproved {
            contract,
            tx_id,
            operation,
            approved_at: settled.settled_at.unwrap_or_else(|| self.clock.now()),
        });
        self.after_settlement(contract, operation).await;
        self.notifications.notify(
            Notification::success("Operation approved", format!("{} request {} completed", operation, tx_id))
                .for_contract(contract),
        );

        Ok(settled)
    }

    /// Cancel a request that is still PENDING.
    pub async fn cancel(&self, contract: Address, tx_id: TxId, caller: Address) -> Result<TxRecord, WorkflowError> {
        match self.try_cancel(contract, tx_id, caller).await {
            Ok(record) => Ok(record),
            Err(e) => {
                report_failure(&self.tracker, self.notifications.as_ref(), contract, "cancel", &e).await;
                Err(e)
            }
        }
    }

    async fn try_cancel(&self, contract: Address, tx_id: TxId, caller: Address) -> Result<TxRecord, WorkflowError> {
        let record = self.lookup(contract, tx_id).await?;
        let operation = record.operation_type;

        let state = self.tracker.contract_state(contract).await?;
        authorize(Action::Cancel(operation), caller, &state)?;
        record.ensure_cancellable()?;

        self.gateway
            .submit_and_wait(CallDescriptor::CancelOperation {
                contract,
                from: caller,
                tx_id,
            })
            .await?;

        let mut settled = record;
        settled.cancel(self.clock.now())?;
        self.tracker.upsert(settled.clone());

        info!(%contract, %tx_id, %operation, "Operation cancelled");
        self.events.publish_workflow_event(WorkflowEvent::OperationCancelled {
            contract,
            tx_id,
            operation,
            cancelled_at: settled.settled_at.unwrap_or_else(|| self.clock.now()),
        });
        self.notifications.notify(
            Notification::info("Operation cancelled", format!("{} request {} cancelled", operation, tx_id))
                .for_contract(contract),
        );

        Ok(settled)
    }

    async fn lookup(&self, contract: Address, tx_id: TxId) -> Result<TxRecord, WorkflowError> {
        if let Some(record) = self.tracker.record(contract, tx_id) {
            return Ok(record);
        }
        self.tracker.refresh(contract).await?;
        self.tracker
            .record(contract, tx_id)
            .ok_or(WorkflowError::OperationNotFound { contract, tx_id })
    }

    /// Roles and the time-lock period may have changed on-chain.
    async fn after_settlement(&self, contract: Address, operation: OperationType) {
        if operation.changes_roles() || operation == OperationType::TimelockUpdate {
            if let Err(e) = self.tracker.reload_contract_state(contract).await {
                warn!(%contract, %operation, error = %e, "Failed to reload contract state after settlement");
            }
        }
    }
}
