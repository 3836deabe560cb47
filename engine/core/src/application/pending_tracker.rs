// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Pending Operation Tracker
//!
//! Per-contract view of the operations a user can see: the chain's operation
//! history merged with what this process has filed or settled locally, plus
//! the signed meta-transactions still held in the local store.
//!
//! # DDD Pattern: Application Service
//!
//! - **Layer:** Application
//! - **Responsibility:** Reconcile chain state with local state, guard request slots
//! - **Collaborators:**
//!   - Domain: TxRecord, OperationRegistry, ContractState
//!   - Infrastructure: ChainGateway, MetaTransactionRepository, EventPublisher
//!
//! # Reconciliation
//!
//! | Local | Fetched | Result |
//! |-------|---------|--------|
//! | none | any | fetched |
//! | PENDING | any | fetched |
//! | COMPLETED / CANCELLED | PENDING | local (never regress) |
//! | COMPLETED / CANCELLED | terminal | fetched |
//!
//! Records the chain does not report are kept; records are never deleted.

use alloy_primitives::Address;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, info, warn};

use crate::application::chain_gateway::ChainGateway;
use crate::domain::chain::{ChainOperation, ContractState};
use crate::domain::clock::Clock;
use crate::domain::errors::WorkflowError;
use crate::domain::events::{EventPublisher, WorkflowEvent};
use crate::domain::meta_tx::SignedMetaTransaction;
use crate::domain::operation::{OperationParams, OperationType, TxId};
use crate::domain::registry::OperationRegistry;
use crate::domain::repository::MetaTransactionRepository;
use crate::domain::tx_record::{reconcile, TxRecord};

/// Keep only the records matching `predicate`, preserving order.
pub fn filter_by_kind<P>(records: &[TxRecord], predicate: P) -> Vec<TxRecord>
where
    P: Fn(&TxRecord) -> bool,
{
    records.iter().filter(|record| predicate(record)).cloned().collect()
}

#[derive(Debug, Default)]
struct ContractView {
    records: BTreeMap<TxId, TxRecord>,
    state: Option<ContractState>,
}

/// Everything visible for one contract at a point in time.
#[derive(Debug, Clone, Serialize)]
pub struct PendingSnapshot {
    pub contract: Address,
    pub records: Vec<TxRecord>,
    pub meta_transactions: Vec<SignedMetaTransaction>,
    pub refreshed_at: DateTime<Utc>,
}

type Slot = (Address, OperationType);

/// Holds a `(contract, operation)` request slot while a request is in flight.
/// Dropping it (including by cancelling the owning future) frees the slot.
pub struct SlotReservation {
    slots: Arc<Mutex<HashSet<Slot>>>,
    slot: Slot,
}

impl Drop for SlotReservation {
    fn drop(&mut self) {
        self.slots.lock().remove(&self.slot);
    }
}

pub struct PendingOperationTracker {
    gateway: Arc<ChainGateway>,
    registry: Arc<OperationRegistry>,
    meta_txs: Arc<dyn MetaTransactionRepository>,
    events: Arc<dyn EventPublisher>,
    clock: Arc<dyn Clock>,
    views: RwLock<HashMap<Address, ContractView>>,
    reservations: Arc<Mutex<HashSet<Slot>>>,
}

impl PendingOperationTracker {
    pub fn new(
        gateway: Arc<ChainGateway>,
        registry: Arc<OperationRegistry>,
        meta_txs: Arc<dyn MetaTransactionRepository>,
        events: Arc<dyn EventPublisher>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            gateway,
            registry,
            meta_txs,
            events,
            clock,
            views: RwLock::new(HashMap::new()),
            reservations: Arc::new(Mutex::new(HashSet::new())),
        }
    }

    pub fn registry(&self) -> &OperationRegistry {
        &self.registry
    }

    /// Re-fetch the contract's state and operation history and merge it into
    /// the local view. Returns every known record ordered by `tx_id`.
    pub async fn refresh(&self, contract: Address) -> Result<Vec<TxRecord>, WorkflowError> {
        let state = self.gateway.contract_state(contract).await?;
        let fetched = self.gateway.operations(contract).await?;
        let fetched_count = fetched.len();

        let decoded: Vec<TxRecord> = fetched
            .into_iter()
            .filter_map(|op| self.decode(contract, op))
            .collect();

        self.apply_state(state);

        let records = {
            let mut views = self.views.write();
            let view = views.entry(contract).or_default();
            for record in decoded {
                let local = view.records.get(&record.tx_id);
                let mut merged = reconcile(local, record);
                if let Some(local) = local {
                    if local.status == merged.status && merged.settled_at.is_none() {
                        merged.settled_at = local.settled_at;
                    }
                }
                view.records.insert(merged.tx_id, merged);
            }
            view.records.values().cloned().collect::<Vec<_>>()
        };

        debug!(%contract, fetched = fetched_count, known = records.len(), "Refreshed pending operations");
        Ok(records)
    }

    /// Refresh after a failed chain call; a failure here is logged, not returned.
    pub async fn refresh_after_failure(&self, contract: Address) {
        if let Err(e) = self.refresh(contract).await {
            warn!(%contract, error = %e, "Refresh after failed chain call also failed");
        }
    }

    fn decode(&self, contract: Address, op: ChainOperation) -> Option<TxRecord> {
        let descriptor = match self.registry.resolve(&op.operation_type_id) {
            Ok(descriptor) => descriptor,
            Err(e) => {
                debug!(%contract, tx_id = %op.tx_id, error = %e, "Skipping operation of unknown type");
                return None;
            }
        };

        let params: OperationParams = match serde_json::from_value(op.params) {
            Ok(params) => params,
            Err(e) => {
                warn!(%contract, tx_id = %op.tx_id, error = %e, "Skipping operation with undecodable parameters");
                return None;
            }
        };

        if params.operation_type() != descriptor.operation_type {
            warn!(
                %contract,
                tx_id = %op.tx_id,
                declared = %descriptor.operation_type,
                decoded = %params.operation_type(),
                "Skipping operation whose parameters do not match its type"
            );
            return None;
        }

        Some(TxRecord {
            tx_id: op.tx_id,
            contract_address: contract,
            operation_type: descriptor.operation_type,
            status: op.status,
            requested_at: op.requested_at,
            release_time: op.release_time.max(op.requested_at),
            params,
            requester: op.requester,
            settled_at: None,
        })
    }

    fn apply_state(&self, state: ContractState) {
        let contract = state.address;
        let roles = state.roles;
        let changed = {
            let mut views = self.views.write();
            let view = views.entry(contract).or_default();
            let changed = view.state.as_ref().map(|s| s.roles) != Some(roles);
            view.state = Some(state);
            changed
        };

        if changed {
            info!(%contract, owner = %roles.owner, broadcaster = %roles.broadcaster, recovery = %roles.recovery, "Role snapshot updated");
            self.events.publish_workflow_event(WorkflowEvent::RolesRefreshed {
                contract,
                roles,
                refreshed_at: self.clock.now(),
            });
        }
    }

    /// Cached contract state, loaded from the chain on first use.
    pub async fn contract_state(&self, contract: Address) -> Result<ContractState, WorkflowError> {
        if let Some(state) = self.cached_state(contract) {
            return Ok(state);
        }
        self.reload_contract_state(contract).await
    }

    pub fn cached_state(&self, contract: Address) -> Option<ContractState> {
        self.views.read().get(&contract).and_then(|view| view.state.clone())
    }

    /// Read roles and time-lock period again, e.g. after a role change settles.
    pub async fn reload_contract_state(&self, contract: Address) -> Result<ContractState, WorkflowError> {
        let state = self.gateway.contract_state(contract).await?;
        self.apply_state(state.clone());
        Ok(state)
    }

    pub fn records(&self, contract: Address) -> Vec<TxRecord> {
        self.views
            .read()
            .get(&contract)
            .map(|view| view.records.values().cloned().collect())
            .unwrap_or_default()
    }

    pub fn record(&self, contract: Address, tx_id: TxId) -> Option<TxRecord> {
        self.views
            .read()
            .get(&contract)
            .and_then(|view| view.records.get(&tx_id).cloned())
    }

    pub fn pending(&self, contract: Address) -> Vec<TxRecord> {
        filter_by_kind(&self.records(contract), TxRecord::is_pending)
    }

    pub fn has_pending(&self, contract: Address, operation: OperationType) -> bool {
        self.views
            .read()
            .get(&contract)
            .map(|view| {
                view.records
                    .values()
                    .any(|r| r.is_pending() && r.operation_type == operation)
            })
            .unwrap_or(false)
    }

    /// Insert or update a record. A settled record is never replaced by a
    /// pending one.
    pub fn upsert(&self, record: TxRecord) {
        let mut views = self.views.write();
        let view = views.entry(record.contract_address).or_default();
        let merged = reconcile(view.records.get(&record.tx_id), record);
        view.records.insert(merged.tx_id, merged);
    }

    /// Claim the single request slot for `(contract, operation)`.
    pub fn reserve_slot(&self, contract: Address, operation: OperationType) -> Result<SlotReservation, WorkflowError> {
        let mut slots = self.reservations.lock();
        let slot = (contract, operation);
        if slots.contains(&slot) || self.has_pending(contract, operation) {
            return Err(WorkflowError::DuplicatePendingOperation { contract, operation });
        }
        slots.insert(slot);
        Ok(SlotReservation {
            slots: self.reservations.clone(),
            slot,
        })
    }

    /// Signed meta-transactions still held locally and not yet past their
    /// deadline unbroadcast.
    pub async fn meta_transactions(&self, contract: Address) -> Result<Vec<SignedMetaTransaction>, WorkflowError> {
        let now = self.clock.now();
        Ok(self
            .meta_txs
            .find_by_contract(contract)
            .await?
            .into_iter()
            .filter(|tx| !tx.is_stale(now))
            .collect())
    }

    pub async fn snapshot(&self, contract: Address) -> Result<PendingSnapshot, WorkflowError> {
        let records = self.refresh(contract).await?;
        let meta_transactions = self.meta_transactions(contract).await?;
        Ok(PendingSnapshot {
            contract,
            records,
            meta_transactions,
            refreshed_at: self.clock.now(),
        })
    }

    /// Core security operations (ownership, broadcaster, recovery, time-lock).
    pub fn core_operations(&self, records: &[TxRecord]) -> Vec<TxRecord> {
        filter_by_kind(records, |r| self.registry.is_core(r.operation_type))
    }

    /// Domain-specific operations such as vault withdrawals.
    pub fn domain_operations(&self, records: &[TxRecord]) -> Vec<TxRecord> {
        filter_by_kind(records, |r| !self.registry.is_core(r.operation_type))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::chain::{CallDescriptor, ChainClient, ChainError, ChainQuery, ChainValue, TransactionHandle};
    use crate::domain::clock::ManualClock;
    use crate::domain::operation::OperationTypeId;
    use crate::domain::roles::RoleSet;
    use crate::domain::tx_record::TxStatus;
    use crate::infrastructure::event_bus::EventBus;
    use crate::infrastructure::kv_store::InMemoryKeyValueStore;
    use crate::infrastructure::repositories::KvMetaTransactionRepository;
    use alloy_primitives::U256;
    use async_trait::async_trait;
    use chrono::{Duration, TimeZone};

    fn contract() -> Address {
        Address::repeat_byte(0xaa)
    }

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 1, 0, 0, 0).unwrap()
    }

    struct FixedChain {
        ops: Mutex<Vec<ChainOperation>>,
    }

    #[async_trait]
    impl ChainClient for FixedChain {
        async fn submit(&self, _call: CallDescriptor) -> Result<Box<dyn TransactionHandle>, ChainError> {
            Err(ChainError::Transport("read-only".to_string()))
        }

        async fn read(&self, query: ChainQuery) -> Result<ChainValue, ChainError> {
            match query {
                ChainQuery::ContractState { contract } => Ok(ChainValue::ContractState(ContractState {
                    address: contract,
                    roles: RoleSet {
                        owner: Address::repeat_byte(0x01),
                        broadcaster: Address::repeat_byte(0x02),
                        recovery: Address::repeat_byte(0x03),
                    },
                    timelock_period_secs: 86_400,
                })),
                ChainQuery::Operations { .. } => Ok(ChainValue::Operations(self.ops.lock().clone())),
                ChainQuery::MetaTxNonce { .. } => Ok(ChainValue::Nonce(U256::ZERO)),
                ChainQuery::GasPrice => Ok(ChainValue::GasPrice(U256::ZERO)),
            }
        }
    }

    fn chain_op(tx_id: u64, type_id: OperationTypeId, params: OperationParams, status: TxStatus) -> ChainOperation {
        ChainOperation {
            tx_id: TxId::new(tx_id),
            operation_type_id: type_id,
            status,
            requested_at: t0(),
            release_time: t0() + Duration::days(1),
            requester: Address::repeat_byte(0x01),
            params: serde_json::to_value(params).unwrap(),
        }
    }

    fn tracker(ops: Vec<ChainOperation>) -> (PendingOperationTracker, Arc<FixedChain>) {
        let chain = Arc::new(FixedChain { ops: Mutex::new(ops) });
        let tracker = PendingOperationTracker::new(
            Arc::new(ChainGateway::new(chain.clone(), std::time::Duration::from_secs(5))),
            Arc::new(OperationRegistry::standard()),
            Arc::new(KvMetaTransactionRepository::new(Arc::new(InMemoryKeyValueStore::new()))),
            Arc::new(EventBus::new(16)),
            Arc::new(ManualClock::new(t0())),
        );
        (tracker, chain)
    }

    fn withdraw() -> OperationParams {
        OperationParams::WithdrawEth {
            recipient: Address::repeat_byte(0x09),
            amount: U256::from(5u8),
        }
    }

    fn transfer() -> OperationParams {
        OperationParams::OwnershipTransfer {
            new_owner: Address::repeat_byte(0x05),
        }
    }

    #[tokio::test]
    async fn test_unknown_types_are_filtered_out() {
        let (tracker, _) = tracker(vec![
            chain_op(2, OperationType::WithdrawEth.type_id(), withdraw(), TxStatus::Pending),
            chain_op(1, OperationTypeId::from_name("MINT_NFT"), withdraw(), TxStatus::Pending),
            chain_op(3, OperationType::OwnershipTransfer.type_id(), transfer(), TxStatus::Pending),
        ]);

        let records = tracker.refresh(contract()).await.unwrap();
        let ids: Vec<_> = records.iter().map(|r| r.tx_id).collect();
        assert_eq!(ids, vec![TxId::new(2), TxId::new(3)]);

        let core = tracker.core_operations(&records);
        assert_eq!(core.len(), 1);
        assert_eq!(core[0].operation_type, OperationType::OwnershipTransfer);
        assert_eq!(tracker.domain_operations(&records)[0].tx_id, TxId::new(2));
    }

    #[tokio::test]
    async fn test_refresh_is_idempotent() {
        let (tracker, _) = tracker(vec![
            chain_op(1, OperationType::OwnershipTransfer.type_id(), transfer(), TxStatus::Cancelled),
            chain_op(2, OperationType::WithdrawEth.type_id(), withdraw(), TxStatus::Pending),
        ]);
        let first = tracker.refresh(contract()).await.unwrap();
        let second = tracker.refresh(contract()).await.unwrap();
        assert_eq!(first, second);
    }

    #[tokio::test]
    async fn test_stale_fetch_does_not_regress_settled_record() {
        let (tracker, _) = tracker(vec![chain_op(
            1,
            OperationType::OwnershipTransfer.type_id(),
            transfer(),
            TxStatus::Pending,
        )]);
        tracker.refresh(contract()).await.unwrap();

        let mut settled = tracker.record(contract(), TxId::new(1)).unwrap();
        settled.approve(t0() + Duration::days(2)).unwrap();
        tracker.upsert(settled);

        let records = tracker.refresh(contract()).await.unwrap();
        assert_eq!(records[0].status, TxStatus::Completed);
        assert!(records[0].settled_at.is_some());
    }

    #[tokio::test]
    async fn test_mismatched_params_are_skipped() {
        let (tracker, _) = tracker(vec![chain_op(
            1,
            OperationType::BroadcasterUpdate.type_id(),
            transfer(),
            TxStatus::Pending,
        )]);
        assert!(tracker.refresh(contract()).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_slot_reservation() {
        let (tracker, _) = tracker(vec![]);
        let reservation = tracker
            .reserve_slot(contract(), OperationType::OwnershipTransfer)
            .unwrap();
        assert!(matches!(
            tracker.reserve_slot(contract(), OperationType::OwnershipTransfer),
            Err(WorkflowError::DuplicatePendingOperation { .. })
        ));
        assert!(tracker.reserve_slot(contract(), OperationType::BroadcasterUpdate).is_ok());

        drop(reservation);
        assert!(tracker.reserve_slot(contract(), OperationType::OwnershipTransfer).is_ok());
    }

    #[tokio::test]
    async fn test_pending_record_blocks_slot() {
        let (tracker, _) = tracker(vec![chain_op(
            4,
            OperationType::OwnershipTransfer.type_id(),
            transfer(),
            TxStatus::Pending,
        )]);
        tracker.refresh(contract()).await.unwrap();
        assert!(tracker.has_pending(contract(), OperationType::OwnershipTransfer));
        assert!(tracker.reserve_slot(contract(), OperationType::OwnershipTransfer).is_err());
    }

    #[test]
    fn test_filter_by_kind_preserves_order() {
        let make = |id: u64, params: OperationParams| {
            TxRecord::request(TxId::new(id), contract(), params, Address::ZERO, t0(), Duration::days(1)).unwrap()
        };
        let records = vec![make(1, withdraw()), make(2, transfer()), make(3, withdraw())];
        let withdrawals = filter_by_kind(&records, |r| r.operation_type == OperationType::WithdrawEth);
        let ids: Vec<_> = withdrawals.iter().map(|r| r.tx_id).collect();
        assert_eq!(ids, vec![TxId::new(1), TxId::new(3)]);
    }
}
