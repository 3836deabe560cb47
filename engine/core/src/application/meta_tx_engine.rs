// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Meta-Transaction Engine
//!
//! Single-phase operations authorized by an owner signature instead of a
//! time-lock. The engine builds the payload, verifies the attached
//! signature, keeps signed payloads in the local store until they are
//! broadcast, and hands them to the chain for the broadcaster.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** build / attach_signature / store / broadcast / reconcile_broadcasts / purge_expired
//! - **Collaborators:**
//!   - Domain: MetaTxPayload, SignedMetaTransaction, RoleGuard
//!   - Infrastructure: ChainGateway, MetaTransactionRepository, SignatureRecovery, EventBus
//!
//! # Broadcast checks (in order)
//!
//! | Check | Error |
//! |-------|-------|
//! | `now > deadline` | `Expired` |
//! | `gas_price > max_gas_price` | `GasPriceExceeded` |
//! | already broadcast | `AlreadySettled` |
//! | caller is not the broadcaster | `Unauthorized` |
//!
//! Confirmed entries are removed from the store; failed entries stay so the
//! failure remains visible. A broadcast whose receipt never arrived stays
//! BROADCASTED until `reconcile_broadcasts` compares it with the chain nonce.

use alloy_primitives::{Address, Bytes, B256, U256};
use chrono::Duration;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::chain_gateway::ChainGateway;
use crate::application::notify::report_failure;
use crate::application::pending_tracker::PendingOperationTracker;
use crate::application::temporal_workflow::{authorize, check_timelock_bounds};
use crate::domain::chain::{CallDescriptor, ChainError};
use crate::domain::clock::Clock;
use crate::domain::config::{MetaTxPolicy, TimelockPolicy};
use crate::domain::errors::WorkflowError;
use crate::domain::events::{EventPublisher, Notification, NotificationSink, WorkflowEvent};
use crate::domain::meta_tx::{BroadcastStatus, MetaTxId, MetaTxOptions, MetaTxPayload, SignedMetaTransaction};
use crate::domain::operation::{OperationParams, OperationType};
use crate::domain::registry::{OperationRegistry, WorkflowKind};
use crate::domain::repository::MetaTransactionRepository;
use crate::domain::roles::{Action, RoleGuard};
use crate::domain::signature::SignatureRecovery;

pub struct MetaTransactionEngine {
    gateway: Arc<ChainGateway>,
    tracker: Arc<PendingOperationTracker>,
    registry: Arc<OperationRegistry>,
    repository: Arc<dyn MetaTransactionRepository>,
    recovery: Arc<dyn SignatureRecovery>,
    notifications: Arc<dyn NotificationSink>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    policy: MetaTxPolicy,
    timelock: TimelockPolicy,
}

impl MetaTransactionEngine {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        gateway: Arc<ChainGateway>,
        tracker: Arc<PendingOperationTracker>,
        registry: Arc<OperationRegistry>,
        repository: Arc<dyn MetaTransactionRepository>,
        recovery: Arc<dyn SignatureRecovery>,
        notifications: Arc<dyn NotificationSink>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
        policy: MetaTxPolicy,
        timelock: TimelockPolicy,
    ) -> Self {
        Self {
            gateway,
            tracker,
            registry,
            repository,
            recovery,
            notifications,
            events,
            clock,
            policy,
            timelock,
        }
    }

    async fn fail<T>(&self, contract: Address, action: &str, err: WorkflowError) -> Result<T, WorkflowError> {
        report_failure(&self.tracker, self.notifications.as_ref(), contract, action, &err).await;
        Err(err)
    }

    /// Build an unsigned payload for `signer` with a fresh nonce.
    pub async fn build(
        &self,
        contract: Address,
        params: OperationParams,
        signer: Address,
        options: MetaTxOptions,
    ) -> Result<MetaTxPayload, WorkflowError> {
        match self.try_build(contract, params, signer, options).await {
            Ok(payload) => Ok(payload),
            Err(e) => self.fail(contract, "build", e).await,
        }
    }

    async fn try_build(
        &self,
        contract: Address,
        params: OperationParams,
        signer: Address,
        options: MetaTxOptions,
    ) -> Result<MetaTxPayload, WorkflowError> {
        params.validate().map_err(WorkflowError::InvalidParameters)?;
        check_timelock_bounds(&self.timelock, &params)?;
        let operation = params.operation_type();

        if self.registry.workflow_kind(operation) != WorkflowKind::MetaTx {
            return Err(WorkflowError::InvalidParameters(format!(
                "{} uses the time-locked workflow, not meta-transactions",
                operation
            )));
        }

        let state = self.tracker.contract_state(contract).await?;
        authorize(Action::SignMetaTx(operation), signer, &state)?;

        let deadline_buffer = match options.deadline_seconds {
            Some(0) => {
                return Err(WorkflowError::InvalidParameters(
                    "deadline must be at least one second after signing".to_string(),
                ))
            }
            Some(secs) => i64::try_from(secs)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(|| WorkflowError::InvalidParameters(format!("deadline of {} seconds is out of range", secs)))?,
            None => Duration::from_std(self.policy.deadline_buffer)
                .map_err(|e| WorkflowError::InvalidParameters(format!("deadline buffer out of range: {}", e)))?,
        };
        let max_gas_price = options.max_gas_price_wei.unwrap_or(self.policy.max_gas_price_wei);

        let nonce = self.next_nonce(contract, operation).await?;
        let payload = MetaTxPayload::new(
            contract,
            params,
            nonce,
            signer,
            self.clock.now(),
            deadline_buffer,
            max_gas_price,
        )
        .ok_or_else(|| {
            WorkflowError::InvalidParameters(format!(
                "deadline {} after signing is out of range",
                deadline_buffer
            ))
        })?;

        debug!(
            %contract,
            meta_tx_id = %payload.id,
            %operation,
            nonce = %payload.nonce,
            deadline = %payload.deadline,
            "Built meta-transaction payload"
        );
        Ok(payload)
    }

    /// Chain nonce, bumped past anything already held locally for the same
    /// `(contract, operation)` slot.
    async fn next_nonce(&self, contract: Address, operation: OperationType) -> Result<U256, WorkflowError> {
        let chain_nonce = self.gateway.meta_tx_nonce(contract, operation).await?;
        let local_next = self
            .repository
            .find_by_contract(contract)
            .await?
            .iter()
            .filter(|tx| tx.payload.operation_type == operation)
            .map(|tx| tx.payload.nonce.saturating_add(U256::from(1u8)))
            .max()
            .unwrap_or(U256::ZERO);
        Ok(chain_nonce.max(local_next))
    }

    /// Verify that `signature` recovers to the payload's signer and that the
    /// signer holds the role required to authorize this operation.
    pub async fn attach_signature(
        &self,
        payload: MetaTxPayload,
        signature: Bytes,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        let contract = payload.contract_address;
        match self.try_attach_signature(payload, signature).await {
            Ok(signed) => Ok(signed),
            Err(e) => self.fail(contract, "attach_signature", e).await,
        }
    }

    async fn try_attach_signature(
        &self,
        payload: MetaTxPayload,
        signature: Bytes,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        let contract = payload.contract_address;
        let operation = payload.operation_type;

        let recovered = self
            .recovery
            .recover(&payload.digest(), &signature)
            .map_err(|e| WorkflowError::InvalidSignature(e.to_string()))?;

        if recovered != payload.signer {
            return Err(WorkflowError::SignerMismatch {
                expected: payload.signer,
                recovered,
            });
        }

        let state = self.tracker.contract_state(contract).await?;
        let action = Action::SignMetaTx(operation);
        if !RoleGuard::authorize_caller(action, recovered, &state.roles) {
            let expected = RoleGuard::required_roles(action)
                .first()
                .map(|role| state.roles.holder(*role))
                .unwrap_or(Address::ZERO);
            return Err(WorkflowError::SignerMismatch { expected, recovered });
        }

        let signed = SignedMetaTransaction::new(payload, signature);
        info!(%contract, meta_tx_id = %signed.id(), %operation, signer = %recovered, "Meta-transaction signed");
        self.events.publish_workflow_event(WorkflowEvent::MetaTxSigned {
            contract,
            id: signed.id(),
            operation,
            signer: recovered,
            deadline: signed.payload.deadline,
        });
        Ok(signed)
    }

    /// Persist a signed meta-transaction for later broadcast.
    pub async fn store(&self, meta_tx: &SignedMetaTransaction) -> Result<(), WorkflowError> {
        let contract = meta_tx.contract_address();
        match self.try_store(meta_tx).await {
            Ok(()) => Ok(()),
            Err(e) => self.fail(contract, "store", e).await,
        }
    }

    async fn try_store(&self, meta_tx: &SignedMetaTransaction) -> Result<(), WorkflowError> {
        let contract = meta_tx.contract_address();
        let now = self.clock.now();

        if let Some(existing) = self
            .repository
            .find_by_contract(contract)
            .await?
            .into_iter()
            .find(|existing| existing.is_equivalent_live(meta_tx, now))
        {
            return Err(WorkflowError::DuplicateMetaTransaction(existing.id()));
        }

        self.repository.save(meta_tx).await?;

        info!(%contract, meta_tx_id = %meta_tx.id(), operation = %meta_tx.payload.operation_type, "Meta-transaction stored");
        self.events.publish_workflow_event(WorkflowEvent::MetaTxStored {
            contract,
            id: meta_tx.id(),
        });
        self.notifications.notify(
            Notification::success(
                "Meta-transaction signed",
                format!(
                    "{} is ready for broadcast until {}",
                    meta_tx.payload.operation_type, meta_tx.payload.deadline
                ),
            )
            .for_contract(contract),
        );
        Ok(())
    }

    pub async fn list(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, WorkflowError> {
        Ok(self.repository.find_by_contract(contract).await?)
    }

    /// Broadcast a stored meta-transaction at the given network gas price.
    pub async fn broadcast(
        &self,
        contract: Address,
        id: MetaTxId,
        caller: Address,
        current_gas_price: U256,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        match self.try_broadcast(contract, id, caller, current_gas_price).await {
            Ok(tx) => Ok(tx),
            Err(e) => self.fail(contract, "broadcast", e).await,
        }
    }

    /// Broadcast at the gas price currently reported by the chain.
    pub async fn broadcast_at_network_price(
        &self,
        contract: Address,
        id: MetaTxId,
        caller: Address,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        let gas_price = match self.gateway.gas_price().await {
            Ok(price) => price,
            Err(e) => return self.fail(contract, "broadcast", e.into()).await,
        };
        self.broadcast(contract, id, caller, gas_price).await
    }

    async fn try_broadcast(
        &self,
        contract: Address,
        id: MetaTxId,
        caller: Address,
        current_gas_price: U256,
    ) -> Result<SignedMetaTransaction, WorkflowError> {
        let mut meta_tx = self
            .repository
            .find_by_id(contract, id)
            .await?
            .ok_or(WorkflowError::MetaTransactionNotFound(id))?;
        let operation = meta_tx.payload.operation_type;

        meta_tx.check_broadcastable(self.clock.now(), current_gas_price)?;

        let state = self.tracker.contract_state(contract).await?;
        authorize(Action::BroadcastMetaTx(operation), caller, &state)?;

        // Nothing is recorded unless the chain accepted the submission.
        let handle = self
            .gateway
            .submit(CallDescriptor::ExecuteMetaTx {
                contract,
                from: caller,
                meta_tx: Box::new(meta_tx.clone()),
                gas_price: current_gas_price,
            })
            .await?;

        let tx_hash = handle.tx_hash();
        meta_tx.mark_broadcasted(tx_hash);
        self.repository.save(&meta_tx).await?;
        info!(%contract, meta_tx_id = %id, %tx_hash, gas_price = %current_gas_price, "Meta-transaction broadcast");
        self.events.publish_workflow_event(WorkflowEvent::MetaTxBroadcast {
            contract,
            id,
            tx_hash,
        });

        // A wait failure leaves the entry BROADCASTED: the outcome is unknown.
        let receipt = self.gateway.wait(handle).await?;

        if !receipt.success {
            let reason = receipt
                .revert_reason
                .clone()
                .unwrap_or_else(|| format!("transaction {} reverted", receipt.tx_hash));
            meta_tx.mark_failed(reason.clone());
            self.repository.save(&meta_tx).await?;
            self.events.publish_workflow_event(WorkflowEvent::MetaTxFailed {
                contract,
                id,
                reason: reason.clone(),
            });
            return Err(ChainError::Reverted(reason).into());
        }

        self.settle_confirmed(&mut meta_tx, tx_hash).await?;
        Ok(meta_tx)
    }

    async fn settle_confirmed(&self, meta_tx: &mut SignedMetaTransaction, tx_hash: B256) -> Result<(), WorkflowError> {
        let contract = meta_tx.contract_address();
        let id = meta_tx.id();
        let operation = meta_tx.payload.operation_type;

        meta_tx.mark_confirmed();
        self.repository.delete(contract, id).await?;
        info!(%contract, meta_tx_id = %id, %tx_hash, "Meta-transaction confirmed");
        self.events.publish_workflow_event(WorkflowEvent::MetaTxConfirmed {
            contract,
            id,
            tx_hash,
        });

        if operation.changes_roles() || operation == OperationType::TimelockUpdate {
            if let Err(e) = self.tracker.reload_contract_state(contract).await {
                warn!(%contract, %operation, error = %e, "Failed to reload contract state after settlement");
            }
        }
        self.notifications.notify(
            Notification::success("Meta-transaction confirmed", format!("{} executed in {}", operation, tx_hash))
                .for_contract(contract),
        );
        Ok(())
    }

    /// Settle BROADCASTED entries whose receipt was never observed.
    ///
    /// The chain nonce for the entry's operation moving past the payload's
    /// nonce means the payload was executed, so the entry is confirmed and
    /// removed. An entry whose nonce is still unused once its deadline has
    /// passed can no longer execute and is marked FAILED. Anything else is
    /// left BROADCASTED. Returns the entries that changed.
    pub async fn reconcile_broadcasts(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, WorkflowError> {
        let in_flight: Vec<_> = self
            .repository
            .find_by_contract(contract)
            .await?
            .into_iter()
            .filter(|tx| tx.broadcast_status == BroadcastStatus::Broadcasted)
            .collect();
        if in_flight.is_empty() {
            return Ok(Vec::new());
        }

        let mut chain_nonces: HashMap<OperationType, U256> = HashMap::new();
        let mut settled = Vec::new();

        for mut meta_tx in in_flight {
            let operation = meta_tx.payload.operation_type;
            let chain_nonce = match chain_nonces.get(&operation) {
                Some(nonce) => *nonce,
                None => {
                    let nonce = self.gateway.meta_tx_nonce(contract, operation).await?;
                    chain_nonces.insert(operation, nonce);
                    nonce
                }
            };

            if chain_nonce > meta_tx.payload.nonce {
                let tx_hash = meta_tx.broadcast_tx_hash.unwrap_or(B256::ZERO);
                self.settle_confirmed(&mut meta_tx, tx_hash).await?;
                settled.push(meta_tx);
            } else if meta_tx.is_expired(self.clock.now()) {
                let reason = format!("not executed before its deadline {}", meta_tx.payload.deadline);
                meta_tx.mark_failed(reason.clone());
                self.repository.save(&meta_tx).await?;
                warn!(%contract, meta_tx_id = %meta_tx.id(), %operation, "Broadcast meta-transaction never executed");
                self.events.publish_workflow_event(WorkflowEvent::MetaTxFailed {
                    contract,
                    id: meta_tx.id(),
                    reason: reason.clone(),
                });
                self.notifications.notify(
                    Notification::warning("Meta-transaction failed", format!("{} was {}", operation, reason))
                        .for_contract(contract),
                );
                settled.push(meta_tx);
            }
        }

        Ok(settled)
    }

    /// Remove stored entries whose deadline passed before they were
    /// broadcast. Each removal is announced with a warning notification.
    /// Broadcasts with no observed receipt are reconciled first.
    pub async fn purge_expired(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, WorkflowError> {
        self.reconcile_broadcasts(contract).await?;
        let now = self.clock.now();
        let stale: Vec<_> = self
            .repository
            .find_by_contract(contract)
            .await?
            .into_iter()
            .filter(|tx| tx.is_stale(now))
            .collect();

        for tx in &stale {
            self.repository.delete(contract, tx.id()).await?;
            warn!(
                %contract,
                meta_tx_id = %tx.id(),
                operation = %tx.payload.operation_type,
                deadline = %tx.payload.deadline,
                "Purged expired meta-transaction"
            );
            self.events.publish_workflow_event(WorkflowEvent::MetaTxExpired {
                contract,
                id: tx.id(),
                deadline: tx.payload.deadline,
            });
            self.notifications.notify(
                Notification::warning(
                    "Meta-transaction expired",
                    format!(
                        "Signed {} expired at {} without being broadcast and was removed",
                        tx.payload.operation_type, tx.payload.deadline
                    ),
                )
                .for_contract(contract),
            );
        }

        Ok(stale)
    }
}
