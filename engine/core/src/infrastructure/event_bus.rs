// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

// Event Bus Implementation - Pub/Sub for Workflow Events and Notifications
//
// In-memory fan-out over a tokio broadcast channel. The workflow services
// publish through the `EventPublisher` and `NotificationSink` traits; the CLI
// and any UI layer subscribe here. Events are lost on restart.

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, warn};

use crate::domain::events::{EventPublisher, Notification, NotificationSink, WorkflowEvent};

/// Unified event type carried by the bus
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEvent {
    Workflow(WorkflowEvent),
    Notification(Notification),
}

impl DomainEvent {
    /// Contract the event concerns, if any
    pub fn contract(&self) -> Option<Address> {
        match self {
            DomainEvent::Workflow(event) => Some(event.contract()),
            DomainEvent::Notification(notification) => notification.contract,
        }
    }
}

#[derive(Clone)]
pub struct EventBus {
    sender: Arc<broadcast::Sender<DomainEvent>>,
}

impl EventBus {
    /// Capacity bounds how many events a slow subscriber may fall behind
    /// before older events are dropped for it.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self {
            sender: Arc::new(sender),
        }
    }

    pub fn with_default_capacity() -> Self {
        Self::new(1000)
    }

    fn publish(&self, event: DomainEvent) {
        debug!("Publishing event: {:?}", event);

        let receiver_count = self.sender.send(event).unwrap_or(0);
        if receiver_count == 0 {
            debug!("No subscribers listening to event");
        }
    }

    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Subscribe to events concerning a single contract
    pub fn subscribe_contract(&self, contract: Address) -> ContractEventReceiver {
        ContractEventReceiver {
            receiver: self.sender.subscribe(),
            contract,
        }
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl EventPublisher for EventBus {
    fn publish_workflow_event(&self, event: WorkflowEvent) {
        self.publish(DomainEvent::Workflow(event));
    }
}

impl NotificationSink for EventBus {
    fn notify(&self, notification: Notification) {
        self.publish(DomainEvent::Notification(notification));
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::with_default_capacity()
    }
}

fn map_recv_error(e: broadcast::error::RecvError) -> EventBusError {
    match e {
        broadcast::error::RecvError::Closed => EventBusError::Closed,
        broadcast::error::RecvError::Lagged(n) => {
            warn!("Event receiver lagged by {} events", n);
            EventBusError::Lagged(n)
        }
    }
}

pub struct EventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
}

impl EventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.recv().await.map_err(map_recv_error)
    }

    /// Try to receive an event without blocking
    pub fn try_recv(&mut self) -> Result<DomainEvent, EventBusError> {
        self.receiver.try_recv().map_err(|e| match e {
            broadcast::error::TryRecvError::Empty => EventBusError::Empty,
            broadcast::error::TryRecvError::Closed => EventBusError::Closed,
            broadcast::error::TryRecvError::Lagged(n) => {
                warn!("Event receiver lagged by {} events", n);
                EventBusError::Lagged(n)
            }
        })
    }

    /// Drain everything currently buffered
    pub fn drain(&mut self) -> Vec<DomainEvent> {
        let mut out = Vec::new();
        loop {
            match self.try_recv() {
                Ok(event) => out.push(event),
                Err(EventBusError::Lagged(_)) => continue,
                Err(_) => break,
            }
        }
        out
    }
}

/// Receiver filtered to one contract
pub struct ContractEventReceiver {
    receiver: broadcast::Receiver<DomainEvent>,
    contract: Address,
}

impl ContractEventReceiver {
    pub async fn recv(&mut self) -> Result<DomainEvent, EventBusError> {
        loop {
            let event = self.receiver.recv().await.map_err(map_recv_error)?;
            if event.contract() == Some(self.contract) {
                return Ok(event);
            }
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum EventBusError {
    #[error("Event bus is closed")]
    Closed,

    #[error("No events available")]
    Empty,

    #[error("Receiver lagged by {0} events (events were dropped)")]
    Lagged(u64),
}
