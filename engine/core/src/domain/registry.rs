// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Operation Registry
//!
//! Maps opaque on-chain operation-type identifiers to the operations this
//! engine understands, together with the workflow model each one follows.
//!
//! The registry is built once from a static table and never mutated. Lookups
//! for identifiers outside the table fail with
//! [`WorkflowError::UnknownOperationType`]; callers that merely list
//! operations (history views, reconciliation) filter such entries out instead
//! of reporting them, since domain contracts may emit operation types this
//! engine has never heard of.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::domain::errors::WorkflowError;
use crate::domain::operation::{OperationType, OperationTypeId};

/// Workflow model applied to an operation type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum WorkflowKind {
    /// Request, wait out the time-lock, then approve or cancel.
    Temporal,
    /// Single-phase off-chain signature broadcast by the broadcaster role.
    MetaTx,
}

/// Which surface an operation belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationScope {
    /// Ownership, broadcaster, recovery and time-lock management.
    Core,
    /// Domain-specific vault operations.
    Vault,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OperationDescriptor {
    pub operation_type: OperationType,
    pub type_id: OperationTypeId,
    pub name: String,
    pub workflow_kind: WorkflowKind,
    pub scope: OperationScope,
    /// Whether several PENDING records of this type may coexist per contract.
    pub allows_concurrent: bool,
}

const OPERATION_TABLE: &[(OperationType, WorkflowKind, OperationScope, bool)] = &[
    (OperationType::OwnershipTransfer, WorkflowKind::Temporal, OperationScope::Core, false),
    (OperationType::BroadcasterUpdate, WorkflowKind::Temporal, OperationScope::Core, false),
    (OperationType::RecoveryUpdate, WorkflowKind::MetaTx, OperationScope::Core, false),
    (OperationType::TimelockUpdate, WorkflowKind::MetaTx, OperationScope::Core, false),
    (OperationType::WithdrawEth, WorkflowKind::Temporal, OperationScope::Vault, true),
    (OperationType::WithdrawToken, WorkflowKind::Temporal, OperationScope::Vault, true),
];

#[derive(Debug, Clone)]
pub struct OperationRegistry {
    by_id: HashMap<OperationTypeId, OperationDescriptor>,
    by_type: HashMap<OperationType, OperationTypeId>,
}

impl OperationRegistry {
    /// Build the registry from the static operation table.
    pub fn standard() -> Self {
        let mut by_id = HashMap::with_capacity(OPERATION_TABLE.len());
        let mut by_type = HashMap::with_capacity(OPERATION_TABLE.len());

        for (operation_type, workflow_kind, scope, allows_concurrent) in OPERATION_TABLE {
            let type_id = operation_type.type_id();
            by_id.insert(
                type_id,
                OperationDescriptor {
                    operation_type: *operation_type,
                    type_id,
                    name: operation_type.canonical_name().to_string(),
                    workflow_kind: *workflow_kind,
                    scope: *scope,
                    allows_concurrent: *allows_concurrent,
                },
            );
            by_type.insert(*operation_type, type_id);
        }

        Self { by_id, by_type }
    }

    /// Resolve an opaque identifier.
    pub fn resolve(&self, type_id: &OperationTypeId) -> Result<&OperationDescriptor, WorkflowError> {
        self.by_id
            .get(type_id)
            .ok_or(WorkflowError::UnknownOperationType(*type_id))
    }

    pub fn describe(&self, operation_type: OperationType) -> &OperationDescriptor {
        // Every OperationType variant is present in OPERATION_TABLE.
        let type_id = self.by_type[&operation_type];
        &self.by_id[&type_id]
    }

    pub fn workflow_kind(&self, operation_type: OperationType) -> WorkflowKind {
        self.describe(operation_type).workflow_kind
    }

    pub fn is_core(&self, operation_type: OperationType) -> bool {
        self.describe(operation_type).scope == OperationScope::Core
    }

    /// Keep only the identifiers this registry knows about.
    pub fn filter_known<'a, I>(&'a self, ids: I) -> impl Iterator<Item = &'a OperationDescriptor> + 'a
    where
        I: IntoIterator<Item = OperationTypeId>,
        I::IntoIter: 'a,
    {
        ids.into_iter().filter_map(move |id| self.resolve(&id).ok())
    }

    pub fn descriptors(&self) -> impl Iterator<Item = &OperationDescriptor> {
        self.by_id.values()
    }
}

impl Default for OperationRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy_primitives::B256;

    #[test]
    fn test_every_operation_type_is_registered() {
        let registry = OperationRegistry::standard();
        for op in OperationType::ALL {
            let descriptor = registry.resolve(&op.type_id()).unwrap();
            assert_eq!(descriptor.operation_type, op);
            assert_eq!(descriptor.name, op.canonical_name());
        }
    }

    #[test]
    fn test_unknown_id_is_rejected() {
        let registry = OperationRegistry::standard();
        let unknown = OperationTypeId(B256::repeat_byte(0xab));
        assert!(matches!(
            registry.resolve(&unknown),
            Err(WorkflowError::UnknownOperationType(id)) if id == unknown
        ));
    }

    #[test]
    fn test_filter_known_drops_unknown_ids() {
        let registry = OperationRegistry::standard();
        let ids = vec![
            OperationType::WithdrawEth.type_id(),
            OperationTypeId::from_name("MINT_NFT"),
            OperationType::OwnershipTransfer.type_id(),
        ];
        let known: Vec<_> = registry.filter_known(ids).map(|d| d.operation_type).collect();
        assert_eq!(known, vec![OperationType::WithdrawEth, OperationType::OwnershipTransfer]);
    }

    #[test]
    fn test_workflow_models() {
        let registry = OperationRegistry::standard();
        assert_eq!(registry.workflow_kind(OperationType::OwnershipTransfer), WorkflowKind::Temporal);
        assert_eq!(registry.workflow_kind(OperationType::RecoveryUpdate), WorkflowKind::MetaTx);
        assert!(!registry.describe(OperationType::OwnershipTransfer).allows_concurrent);
        assert!(registry.describe(OperationType::WithdrawToken).allows_concurrent);
        assert!(registry.is_core(OperationType::TimelockUpdate));
        assert!(!registry.is_core(OperationType::WithdrawEth));
    }
}
