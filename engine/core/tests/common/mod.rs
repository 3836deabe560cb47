// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Shared fixtures: a simulated secured contract behind `ChainClient`, a
//! manual clock, and one engine instance per connected account.

#![allow(dead_code)]

use alloy_primitives::{keccak256, Address, B256, U256};
use async_trait::async_trait;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;

use vaultguard_core::application::{EngineDependencies, StandardSecurityOperationsService};
use vaultguard_core::domain::chain::{
    CallDescriptor, ChainClient, ChainError, ChainOperation, ChainQuery, ChainValue, ContractState, Receipt,
    TransactionHandle,
};
use vaultguard_core::domain::clock::{Clock, ManualClock};
use vaultguard_core::domain::config::EngineConfig;
use vaultguard_core::domain::events::{Notification, WorkflowEvent};
use vaultguard_core::domain::operation::{OperationParams, OperationType, OperationTypeId, TxId};
use vaultguard_core::domain::roles::RoleSet;
use vaultguard_core::domain::signature::MessageSigner;
use vaultguard_core::domain::tx_record::TxStatus;
use vaultguard_core::domain::units::gwei;
use vaultguard_core::infrastructure::{
    DomainEvent, Ed25519SignatureRecovery, Ed25519Signer, EventBus, InMemoryKeyValueStore,
};

pub fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 4, 1, 9, 0, 0).unwrap()
}

struct MockContract {
    roles: RoleSet,
    timelock_secs: u64,
    operations: Vec<ChainOperation>,
    nonces: HashMap<OperationType, U256>,
}

#[derive(Default)]
struct MockBehaviour {
    fail_next_submit: Option<ChainError>,
    revert_next: Option<String>,
    wait_delay: Option<std::time::Duration>,
}

/// In-memory secured contract. Submissions take effect immediately; `wait`
/// optionally stalls to simulate slow mining.
pub struct MockChain {
    clock: ManualClock,
    contracts: Mutex<HashMap<Address, MockContract>>,
    behaviour: Mutex<MockBehaviour>,
    submitted: Mutex<Vec<CallDescriptor>>,
    gas_price: Mutex<U256>,
    next_tx_id: Mutex<u64>,
    next_hash: Mutex<u64>,
}

impl MockChain {
    pub fn new(clock: ManualClock) -> Self {
        Self {
            clock,
            contracts: Mutex::new(HashMap::new()),
            behaviour: Mutex::new(MockBehaviour::default()),
            submitted: Mutex::new(Vec::new()),
            gas_price: Mutex::new(gwei(20)),
            next_tx_id: Mutex::new(1),
            next_hash: Mutex::new(1),
        }
    }

    pub fn deploy(&self, contract: Address, roles: RoleSet, timelock: Duration) {
        self.contracts.lock().insert(
            contract,
            MockContract {
                roles,
                timelock_secs: timelock.num_seconds() as u64,
                operations: Vec::new(),
                nonces: HashMap::new(),
            },
        );
    }

    pub fn roles(&self, contract: Address) -> RoleSet {
        self.contracts.lock()[&contract].roles
    }

    pub fn timelock_secs(&self, contract: Address) -> u64 {
        self.contracts.lock()[&contract].timelock_secs
    }

    /// Overwrite the stored period with a raw value, however implausible.
    pub fn set_timelock_secs(&self, contract: Address, secs: u64) {
        if let Some(c) = self.contracts.lock().get_mut(&contract) {
            c.timelock_secs = secs;
        }
    }

    pub fn operation_status(&self, contract: Address, tx_id: TxId) -> Option<TxStatus> {
        self.contracts.lock()[&contract]
            .operations
            .iter()
            .find(|op| op.tx_id == tx_id)
            .map(|op| op.status)
    }

    /// Settle an operation behind the engine's back (another session).
    pub fn force_status(&self, contract: Address, tx_id: TxId, status: TxStatus) {
        let mut contracts = self.contracts.lock();
        if let Some(op) = contracts
            .get_mut(&contract)
            .and_then(|c| c.operations.iter_mut().find(|op| op.tx_id == tx_id))
        {
            op.status = status;
        }
    }

    /// Add an operation of a type the engine does not know about.
    pub fn inject_foreign_operation(&self, contract: Address, name: &str) -> TxId {
        let tx_id = self.take_tx_id();
        let now = self.clock_now();
        if let Some(c) = self.contracts.lock().get_mut(&contract) {
            c.operations.push(ChainOperation {
                tx_id,
                operation_type_id: OperationTypeId::from_name(name),
                status: TxStatus::Pending,
                requested_at: now,
                release_time: now,
                requester: Address::repeat_byte(0x77),
                params: serde_json::json!({ "kind": "mint", "amount": "1" }),
            });
        }
        tx_id
    }

    pub fn set_gas_price(&self, price: U256) {
        *self.gas_price.lock() = price;
    }

    pub fn fail_next_submit(&self, err: ChainError) {
        self.behaviour.lock().fail_next_submit = Some(err);
    }

    pub fn revert_next(&self, reason: &str) {
        self.behaviour.lock().revert_next = Some(reason.to_string());
    }

    pub fn set_wait_delay(&self, delay: Option<std::time::Duration>) {
        self.behaviour.lock().wait_delay = delay;
    }

    pub fn submitted(&self) -> Vec<CallDescriptor> {
        self.submitted.lock().clone()
    }

    fn clock_now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    fn take_tx_id(&self) -> TxId {
        let mut next = self.next_tx_id.lock();
        let id = TxId::new(*next);
        *next += 1;
        id
    }

    fn take_hash(&self) -> B256 {
        let mut next = self.next_hash.lock();
        let hash = keccak256(next.to_be_bytes());
        *next += 1;
        hash
    }

    fn apply_params(contract: &mut MockContract, params: &OperationParams) {
        match params {
            OperationParams::OwnershipTransfer { new_owner } => contract.roles.owner = *new_owner,
            OperationParams::BroadcasterUpdate { new_broadcaster } => contract.roles.broadcaster = *new_broadcaster,
            OperationParams::RecoveryUpdate { new_recovery } => contract.roles.recovery = *new_recovery,
            OperationParams::TimelockUpdate { new_period_days } => contract.timelock_secs = new_period_days * 86_400,
            OperationParams::WithdrawEth { .. } | OperationParams::WithdrawToken { .. } => {}
        }
    }

    /// Execute a call against the contract; `Err` is a revert reason.
    fn execute(&self, call: &CallDescriptor) -> Result<Option<TxId>, String> {
        let now = self.clock_now();
        let mut contracts = self.contracts.lock();
        let contract = contracts
            .get_mut(&call.contract())
            .ok_or_else(|| "no contract at address".to_string())?;

        match call {
            CallDescriptor::RequestOperation { from, params, .. } => {
                let tx_id = self.take_tx_id();
                contract.operations.push(ChainOperation {
                    tx_id,
                    operation_type_id: params.operation_type().type_id(),
                    status: TxStatus::Pending,
                    requested_at: now,
                    release_time: now + Duration::seconds(contract.timelock_secs as i64),
                    requester: *from,
                    params: serde_json::to_value(params).map_err(|e| e.to_string())?,
                });
                Ok(Some(tx_id))
            }
            CallDescriptor::ApproveOperation { tx_id, .. } => {
                let op = contract
                    .operations
                    .iter_mut()
                    .find(|op| op.tx_id == *tx_id)
                    .ok_or_else(|| "unknown tx id".to_string())?;
                if op.status != TxStatus::Pending {
                    return Err("operation not pending".to_string());
                }
                if now < op.release_time {
                    return Err("time-lock not elapsed".to_string());
                }
                op.status = TxStatus::Completed;
                let params: OperationParams = serde_json::from_value(op.params.clone()).map_err(|e| e.to_string())?;
                Self::apply_params(contract, &params);
                Ok(Some(*tx_id))
            }
            CallDescriptor::CancelOperation { tx_id, .. } => {
                let op = contract
                    .operations
                    .iter_mut()
                    .find(|op| op.tx_id == *tx_id)
                    .ok_or_else(|| "unknown tx id".to_string())?;
                if op.status != TxStatus::Pending {
                    return Err("operation not pending".to_string());
                }
                op.status = TxStatus::Cancelled;
                Ok(Some(*tx_id))
            }
            CallDescriptor::ExecuteMetaTx { meta_tx, gas_price, .. } => {
                let payload = &meta_tx.payload;
                if now > payload.deadline {
                    return Err("meta-transaction expired".to_string());
                }
                if *gas_price > payload.max_gas_price {
                    return Err("gas price above signed ceiling".to_string());
                }
                let nonce = contract.nonces.entry(payload.operation_type).or_insert(U256::ZERO);
                if payload.nonce < *nonce {
                    return Err("nonce already used".to_string());
                }
                *nonce = payload.nonce + U256::from(1u8);
                Self::apply_params(contract, &payload.params);
                Ok(None)
            }
        }
    }
}

struct MockHandle {
    receipt: Receipt,
    delay: Option<std::time::Duration>,
}

#[async_trait]
impl TransactionHandle for MockHandle {
    fn tx_hash(&self) -> B256 {
        self.receipt.tx_hash
    }

    async fn wait(self: Box<Self>) -> Result<Receipt, ChainError> {
        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }
        Ok(self.receipt)
    }
}

#[async_trait]
impl ChainClient for MockChain {
    async fn submit(&self, call: CallDescriptor) -> Result<Box<dyn TransactionHandle>, ChainError> {
        let (fail, revert, delay) = {
            let mut behaviour = self.behaviour.lock();
            (behaviour.fail_next_submit.take(), behaviour.revert_next.take(), behaviour.wait_delay)
        };
        if let Some(err) = fail {
            return Err(err);
        }
        self.submitted.lock().push(call.clone());

        let tx_hash = self.take_hash();
        let outcome = match revert {
            Some(reason) => Err(reason),
            None => self.execute(&call),
        };
        let receipt = match outcome {
            Ok(tx_id) => Receipt {
                tx_hash,
                success: true,
                tx_id,
                revert_reason: None,
            },
            Err(reason) => Receipt {
                tx_hash,
                success: false,
                tx_id: None,
                revert_reason: Some(reason),
            },
        };
        Ok(Box::new(MockHandle { receipt, delay }))
    }

    async fn read(&self, query: ChainQuery) -> Result<ChainValue, ChainError> {
        let contracts = self.contracts.lock();
        match query {
            ChainQuery::ContractState { contract } => {
                let c = contracts
                    .get(&contract)
                    .ok_or_else(|| ChainError::Reverted("no contract at address".to_string()))?;
                Ok(ChainValue::ContractState(ContractState {
                    address: contract,
                    roles: c.roles,
                    timelock_period_secs: c.timelock_secs,
                }))
            }
            ChainQuery::Operations { contract } => Ok(ChainValue::Operations(
                contracts.get(&contract).map(|c| c.operations.clone()).unwrap_or_default(),
            )),
            ChainQuery::MetaTxNonce { contract, operation } => Ok(ChainValue::Nonce(
                contracts
                    .get(&contract)
                    .and_then(|c| c.nonces.get(&operation).copied())
                    .unwrap_or(U256::ZERO),
            )),
            ChainQuery::GasPrice => Ok(ChainValue::GasPrice(*self.gas_price.lock())),
        }
    }
}

/// One deployed contract with three role holders, each able to open an
/// engine session of their own.
pub struct Harness {
    pub contract: Address,
    pub clock: ManualClock,
    pub chain: Arc<MockChain>,
    pub store: Arc<InMemoryKeyValueStore>,
    pub bus: Arc<EventBus>,
    pub owner: Arc<Ed25519Signer>,
    pub broadcaster: Arc<Ed25519Signer>,
    pub recovery: Arc<Ed25519Signer>,
    pub config: EngineConfig,
}

impl Harness {
    pub fn new(timelock: Duration) -> Self {
        let clock = ManualClock::new(t0());
        let chain = Arc::new(MockChain::new(clock.clone()));
        let owner = Arc::new(Ed25519Signer::from_secret_bytes(&[1u8; 32]).unwrap());
        let broadcaster = Arc::new(Ed25519Signer::from_secret_bytes(&[2u8; 32]).unwrap());
        let recovery = Arc::new(Ed25519Signer::from_secret_bytes(&[3u8; 32]).unwrap());
        let contract = Address::repeat_byte(0xc0);

        chain.deploy(
            contract,
            RoleSet {
                owner: owner.address(),
                broadcaster: broadcaster.address(),
                recovery: recovery.address(),
            },
            timelock,
        );

        let mut config = EngineConfig::default();
        config.chain.call_timeout = std::time::Duration::from_secs(30);

        Self {
            contract,
            clock,
            chain,
            store: Arc::new(InMemoryKeyValueStore::new()),
            bus: Arc::new(EventBus::new(256)),
            owner,
            broadcaster,
            recovery,
            config,
        }
    }

    /// Engine session for the account behind `signer`.
    pub fn session(&self, signer: Arc<Ed25519Signer>) -> StandardSecurityOperationsService {
        StandardSecurityOperationsService::wire(
            &self.config,
            EngineDependencies {
                chain: self.chain.clone(),
                store: self.store.clone(),
                signer,
                recovery: Arc::new(Ed25519SignatureRecovery),
                event_bus: self.bus.clone(),
                clock: Arc::new(self.clock.clone()),
            },
        )
    }

    pub fn owner_session(&self) -> StandardSecurityOperationsService {
        self.session(self.owner.clone())
    }

    pub fn broadcaster_session(&self) -> StandardSecurityOperationsService {
        self.session(self.broadcaster.clone())
    }

    pub fn recovery_session(&self) -> StandardSecurityOperationsService {
        self.session(self.recovery.clone())
    }

    pub fn clock_now_plus(&self, by: Duration) -> DateTime<Utc> {
        self.clock.now() + by
    }
}

pub fn notifications(events: &[DomainEvent]) -> Vec<Notification> {
    events
        .iter()
        .filter_map(|event| match event {
            DomainEvent::Notification(n) => Some(n.clone()),
            _ => None,
        })
        .collect()
}

pub fn workflow_events(events: &[DomainEvent]) -> Vec<WorkflowEvent> {
    events
        .iter()
        .filter_map(|event| match event {
            DomainEvent::Workflow(e) => Some(e.clone()),
            _ => None,
        })
        .collect()
}
