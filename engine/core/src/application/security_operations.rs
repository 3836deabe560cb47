// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Security Operations Use Case
//!
//! Entry point for a connected account acting on a secured contract. Routes
//! each operation to the workflow the registry assigns it:
//!
//! ```text
//! submit(params) ──registry──▶ TEMPORAL ─▶ TemporalWorkflow::request
//!                          └─▶ META_TX  ─▶ build ─▶ sign ─▶ attach_signature ─▶ store
//! ```
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Control flow RoleGuard → registry dispatch → workflow
//! - **Collaborators:**
//!   - Application: TemporalWorkflow, MetaTransactionEngine, PendingOperationTracker
//!   - Infrastructure: MessageSigner, EventBus

use alloy_primitives::Address;
use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;

use crate::application::chain_gateway::ChainGateway;
use crate::application::meta_tx_engine::MetaTransactionEngine;
use crate::application::notify::report_failure;
use crate::application::pending_tracker::{PendingOperationTracker, PendingSnapshot};
use crate::application::temporal_workflow::TemporalWorkflow;
use crate::domain::chain::ChainClient;
use crate::domain::clock::Clock;
use crate::domain::config::EngineConfig;
use crate::domain::errors::WorkflowError;
use crate::domain::events::NotificationSink;
use crate::domain::meta_tx::{MetaTxId, MetaTxOptions, SignedMetaTransaction};
use crate::domain::operation::{OperationParams, TxId};
use crate::domain::registry::{OperationRegistry, WorkflowKind};
use crate::domain::repository::KeyValueStore;
use crate::domain::roles::{Action, RoleGuard};
use crate::domain::signature::{MessageSigner, SignatureRecovery};
use crate::domain::tx_record::TxRecord;
use crate::infrastructure::event_bus::EventBus;
use crate::infrastructure::repositories::KvMetaTransactionRepository;

/// Result of submitting an operation
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "workflow", rename_all = "snake_case")]
pub enum SubmissionOutcome {
    /// A time-locked request was filed on-chain
    Requested(TxRecord),
    /// A signed meta-transaction is stored and awaits broadcast
    Signed(SignedMetaTransaction),
}

#[async_trait]
pub trait SecurityOperationsUseCase: Send + Sync {
    /// Start an operation through the workflow its type requires.
    ///
    /// # Errors
    ///
    /// - Unauthorized: the connected account lacks the required role
    /// - DuplicatePendingOperation: the single request slot is taken
    /// - InvalidParameters / TimelockOutOfBounds: rejected before any chain call
    /// - ChainCallFailed: the chain call failed; the local view was refreshed
    async fn submit(
        &self,
        contract: Address,
        params: OperationParams,
        options: MetaTxOptions,
    ) -> Result<SubmissionOutcome, WorkflowError>;

    async fn approve(&self, contract: Address, tx_id: TxId) -> Result<TxRecord, WorkflowError>;

    async fn cancel(&self, contract: Address, tx_id: TxId) -> Result<TxRecord, WorkflowError>;

    /// Broadcast a stored meta-transaction at the current network gas price.
    async fn broadcast(&self, contract: Address, id: MetaTxId) -> Result<SignedMetaTransaction, WorkflowError>;

    /// Actions the connected account may take on `contract`.
    async fn permitted_actions(&self, contract: Address) -> Result<Vec<Action>, WorkflowError>;

    /// Pending requests and stored meta-transactions. Broadcasts without an
    /// observed receipt are reconciled against the chain first.
    async fn pending(&self, contract: Address) -> Result<PendingSnapshot, WorkflowError>;
}

/// Collaborators injected into the engine.
pub struct EngineDependencies {
    pub chain: Arc<dyn ChainClient>,
    pub store: Arc<dyn KeyValueStore>,
    pub signer: Arc<dyn MessageSigner>,
    pub recovery: Arc<dyn SignatureRecovery>,
    pub event_bus: Arc<EventBus>,
    pub clock: Arc<dyn Clock>,
}

pub struct StandardSecurityOperationsService {
    registry: Arc<OperationRegistry>,
    tracker: Arc<PendingOperationTracker>,
    temporal: Arc<TemporalWorkflow>,
    meta_tx: Arc<MetaTransactionEngine>,
    signer: Arc<dyn MessageSigner>,
    notifications: Arc<dyn NotificationSink>,
}

impl StandardSecurityOperationsService {
    pub fn new(
        registry: Arc<OperationRegistry>,
        tracker: Arc<PendingOperationTracker>,
        temporal: Arc<TemporalWorkflow>,
        meta_tx: Arc<MetaTransactionEngine>,
        signer: Arc<dyn MessageSigner>,
        notifications: Arc<dyn NotificationSink>,
    ) -> Self {
        Self {
            registry,
            tracker,
            temporal,
            meta_tx,
            signer,
            notifications,
        }
    }

    /// Assemble the full engine from configuration and injected collaborators.
    pub fn wire(config: &EngineConfig, deps: EngineDependencies) -> Self {
        let registry = Arc::new(OperationRegistry::standard());
        let gateway = Arc::new(ChainGateway::new(deps.chain, config.chain.call_timeout));
        let repository = Arc::new(KvMetaTransactionRepository::new(deps.store));

        let tracker = Arc::new(PendingOperationTracker::new(
            gateway.clone(),
            registry.clone(),
            repository.clone(),
            deps.event_bus.clone(),
            deps.clock.clone(),
        ));
        let temporal = Arc::new(TemporalWorkflow::new(
            gateway.clone(),
            tracker.clone(),
            registry.clone(),
            deps.event_bus.clone(),
            deps.event_bus.clone(),
            deps.clock.clone(),
            config.timelock.clone(),
        ));
        let meta_tx = Arc::new(MetaTransactionEngine::new(
            gateway,
            tracker.clone(),
            registry.clone(),
            repository,
            deps.recovery,
            deps.event_bus.clone(),
            deps.event_bus.clone(),
            deps.clock,
            config.meta_tx.clone(),
            config.timelock.clone(),
        ));

        Self::new(registry, tracker, temporal, meta_tx, deps.signer, deps.event_bus)
    }

    pub fn caller(&self) -> Address {
        self.signer.address()
    }

    pub fn tracker(&self) -> &Arc<PendingOperationTracker> {
        &self.tracker
    }

    pub fn temporal(&self) -> &Arc<TemporalWorkflow> {
        &self.temporal
    }

    pub fn meta_transactions(&self) -> &Arc<MetaTransactionEngine> {
        &self.meta_tx
    }

    async fn sign_and_store(
        &self,
        contract: Address,
        params: OperationParams,
        options: MetaTxOptions,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        let payload = self.meta_tx.build(contract, params, self.caller(), options).await?;

        let signature = match self.signer.sign_digest(&payload.digest()).await {
            Ok(signature) => signature,
            Err(e) => {
                let err = WorkflowError::InvalidSignature(e.to_string());
                report_failure(&self.tracker, self.notifications.as_ref(), contract, "sign", &err).await;
                return Err(err);
            }
        };

        let signed = self.meta_tx.attach_signature(payload, signature).await?;
        self.meta_tx.store(&signed).await?;
        Ok(signed)
    }
}

#[async_trait]
impl SecurityOperationsUseCase for StandardSecurityOperationsService {
    async fn submit(
        &self,
        contract: Address,
        params: OperationParams,
        options: MetaTxOptions,
    ) -> Result<SubmissionOutcome, WorkflowError> {
        match self.registry.workflow_kind(params.operation_type()) {
            WorkflowKind::Temporal => Ok(SubmissionOutcome::Requested(
                self.temporal.request(contract, params, self.caller()).await?,
            )),
            WorkflowKind::MetaTx => Ok(SubmissionOutcome::Signed(
                self.sign_and_store(contract, params, options).await?,
            )),
        }
    }

    async fn approve(&self, contract: Address, tx_id: TxId) -> Result<TxRecord, WorkflowError> {
        self.temporal.approve(contract, tx_id, self.caller()).await
    }

    async fn cancel(&self, contract: Address, tx_id: TxId) -> Result<TxRecord, WorkflowError> {
        self.temporal.cancel(contract, tx_id, self.caller()).await
    }

    async fn broadcast(&self, contract: Address, id: MetaTxId) -> Result<SignedMetaTransaction, WorkflowError> {
        self.meta_tx.broadcast_at_network_price(contract, id, self.caller()).await
    }

    async fn permitted_actions(&self, contract: Address) -> Result<Vec<Action>, WorkflowError> {
        let state = self.tracker.contract_state(contract).await?;
        Ok(RoleGuard::permitted_actions(self.caller(), &state.roles))
    }

    async fn pending(&self, contract: Address) -> Result<PendingSnapshot, WorkflowError> {
        self.meta_tx.reconcile_broadcasts(contract).await?;
        self.tracker.snapshot(contract).await
    }
}
