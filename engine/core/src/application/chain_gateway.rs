// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0

//! Chain Gateway
//!
//! Wraps the injected [`ChainClient`] with the operational timeout and typed
//! reads. A meta-transaction deadline is a domain rule; this timeout is
//! plumbing, applied to every submit, wait and read so that a stuck RPC call
//! surfaces as `ChainError::Timeout` instead of hanging the workflow.

use alloy_primitives::{Address, U256};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::domain::chain::{
    CallDescriptor, ChainClient, ChainError, ChainOperation, ChainQuery, ChainValue, ContractState, Receipt,
    TransactionHandle,
};
use crate::domain::operation::OperationType;

pub struct ChainGateway {
    client: Arc<dyn ChainClient>,
    timeout: Duration,
}

impl ChainGateway {
    pub fn new(client: Arc<dyn ChainClient>, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    async fn guarded<T, F>(&self, label: &str, fut: F) -> Result<T, ChainError>
    where
        F: Future<Output = Result<T, ChainError>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result,
            Err(_) => {
                warn!(call = label, timeout = ?self.timeout, "Chain call abandoned after timeout");
                Err(ChainError::Timeout(self.timeout))
            }
        }
    }

    /// Hand a call to the chain. An error here means the call was not
    /// accepted, or that acceptance is unknown.
    pub async fn submit(&self, call: CallDescriptor) -> Result<Box<dyn TransactionHandle>, ChainError> {
        let label = call.label();
        let contract = call.contract();
        let handle = self.guarded(label, self.client.submit(call)).await?;
        debug!(call = label, %contract, tx_hash = %handle.tx_hash(), "Chain call submitted");
        Ok(handle)
    }

    pub async fn wait(&self, handle: Box<dyn TransactionHandle>) -> Result<Receipt, ChainError> {
        self.guarded("wait", handle.wait()).await
    }

    /// Submit and wait; a mined-but-reverted receipt becomes `ChainError::Reverted`.
    pub async fn submit_and_wait(&self, call: CallDescriptor) -> Result<Receipt, ChainError> {
        let handle = self.submit(call).await?;
        let receipt = self.wait(handle).await?;
        if !receipt.success {
            return Err(ChainError::Reverted(
                receipt
                    .revert_reason
                    .unwrap_or_else(|| format!("transaction {} reverted", receipt.tx_hash)),
            ));
        }
        Ok(receipt)
    }

    async fn read(&self, query: ChainQuery) -> Result<ChainValue, ChainError> {
        let label = query.to_string();
        self.guarded(&label, self.client.read(query)).await
    }

    pub async fn contract_state(&self, contract: Address) -> Result<ContractState, ChainError> {
        let query = ChainQuery::ContractState { contract };
        let label = query.to_string();
        match self.read(query).await? {
            ChainValue::ContractState(state) => Ok(state),
            other => Err(unexpected(label, &other)),
        }
    }

    pub async fn operations(&self, contract: Address) -> Result<Vec<ChainOperation>, ChainError> {
        let query = ChainQuery::Operations { contract };
        let label = query.to_string();
        match self.read(query).await? {
            ChainValue::Operations(ops) => Ok(ops),
            other => Err(unexpected(label, &other)),
        }
    }

    pub async fn meta_tx_nonce(&self, contract: Address, operation: OperationType) -> Result<U256, ChainError> {
        let query = ChainQuery::MetaTxNonce { contract, operation };
        let label = query.to_string();
        match self.read(query).await? {
            ChainValue::Nonce(nonce) => Ok(nonce),
            other => Err(unexpected(label, &other)),
        }
    }

    pub async fn gas_price(&self) -> Result<U256, ChainError> {
        let query = ChainQuery::GasPrice;
        let label = query.to_string();
        match self.read(query).await? {
            ChainValue::GasPrice(price) => Ok(price),
            other => Err(unexpected(label, &other)),
        }
    }
}

fn unexpected(query: String, value: &ChainValue) -> ChainError {
    let detail = match value {
        ChainValue::ContractState(_) => "contract state",
        ChainValue::Operations(_) => "operation list",
        ChainValue::Nonce(_) => "nonce",
        ChainValue::GasPrice(_) => "gas price",
    };
    ChainError::UnexpectedResponse {
        query,
        detail: format!("got {}", detail),
    }
}
