// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

use alloy_primitives::Address;
use tracing::warn;

use crate::application::pending_tracker::PendingOperationTracker;
use crate::domain::errors::WorkflowError;
use crate::domain::events::{Notification, NotificationSink};

/// Surface a failed action: refresh first if the chain may have moved,
/// then log and notify with the error text unchanged.
pub(crate) async fn report_failure(
    tracker: &PendingOperationTracker,
    notifications: &dyn NotificationSink,
    contract: Address,
    action: &str,
    err: &WorkflowError,
) {
    if matches!(err, WorkflowError::ChainCallFailed(_)) {
        tracker.refresh_after_failure(contract).await;
    }
    warn!(%contract, action, error = %err, terminal = err.is_terminal(), "Action rejected");
    notifications.notify(Notification::error(err.title(), err.to_string()).for_contract(contract));
}
