// Copyright (c) 2026 100monkeys.ai
// SPDX-License-Identifier: AGPL-3.0
//! # Roles and the Role Guard
//!
//! A secured contract has exactly three privileged roles. [`RoleGuard`] is a
//! pure, table-driven evaluator: every [`Action`] declares the roles allowed
//! to perform it and the guard answers yes or no. It performs no I/O, so the
//! table can be exercised without any chain state.
//!
//! ## Permission Table
//!
//! | Action | Allowed roles |
//! |--------|---------------|
//! | request ownership-transfer | recovery |
//! | cancel ownership-transfer | recovery |
//! | approve ownership-transfer | owner |
//! | request / approve / cancel any other operation | owner |
//! | sign meta-tx (any operation) | owner |
//! | broadcast meta-tx | broadcaster |

use alloy_primitives::Address;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::domain::operation::OperationType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Owner,
    Broadcaster,
    Recovery,
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Role::Owner => f.write_str("owner"),
            Role::Broadcaster => f.write_str("broadcaster"),
            Role::Recovery => f.write_str("recovery"),
        }
    }
}

/// Snapshot of a contract's role holders, refreshed from the chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleSet {
    pub owner: Address,
    pub broadcaster: Address,
    pub recovery: Address,
}

impl RoleSet {
    pub fn holder(&self, role: Role) -> Address {
        match role {
            Role::Owner => self.owner,
            Role::Broadcaster => self.broadcaster,
            Role::Recovery => self.recovery,
        }
    }

    /// Roles held by `caller`. One address may hold several roles.
    pub fn roles_of(&self, caller: Address) -> Vec<Role> {
        [Role::Owner, Role::Broadcaster, Role::Recovery]
            .into_iter()
            .filter(|role| self.holder(*role) == caller)
            .collect()
    }
}

/// Something a caller may attempt against a contract.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "action", content = "operation", rename_all = "snake_case")]
pub enum Action {
    Request(OperationType),
    Approve(OperationType),
    Cancel(OperationType),
    SignMetaTx(OperationType),
    BroadcastMetaTx(OperationType),
}

impl Action {
    pub fn operation(&self) -> OperationType {
        match self {
            Action::Request(op)
            | Action::Approve(op)
            | Action::Cancel(op)
            | Action::SignMetaTx(op)
            | Action::BroadcastMetaTx(op) => *op,
        }
    }

    fn verb(&self) -> &'static str {
        match self {
            Action::Request(_) => "request",
            Action::Approve(_) => "approve",
            Action::Cancel(_) => "cancel",
            Action::SignMetaTx(_) => "sign",
            Action::BroadcastMetaTx(_) => "broadcast",
        }
    }

    /// Every action the guard knows about.
    pub fn all() -> Vec<Action> {
        OperationType::ALL
            .into_iter()
            .flat_map(|op| {
                [
                    Action::Request(op),
                    Action::Approve(op),
                    Action::Cancel(op),
                    Action::SignMetaTx(op),
                    Action::BroadcastMetaTx(op),
                ]
            })
            .collect()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.verb(), self.operation().slug())
    }
}

impl FromStr for Action {
    type Err = String;

    /// Parses names such as `approve-ownership-transfer`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (verb, rest) = s
            .split_once('-')
            .ok_or_else(|| format!("Invalid action name: {}", s))?;
        let op = OperationType::from_slug(rest).ok_or_else(|| format!("Unknown operation in action: {}", s))?;
        match verb {
            "request" => Ok(Action::Request(op)),
            "approve" => Ok(Action::Approve(op)),
            "cancel" => Ok(Action::Cancel(op)),
            "sign" => Ok(Action::SignMetaTx(op)),
            "broadcast" => Ok(Action::BroadcastMetaTx(op)),
            _ => Err(format!("Unknown action verb: {}", verb)),
        }
    }
}

/// Pure permission evaluator.
#[derive(Debug, Clone, Copy, Default)]
pub struct RoleGuard;

impl RoleGuard {
    /// Roles allowed to perform `action`.
    pub fn required_roles(action: Action) -> &'static [Role] {
        match action {
            Action::Request(OperationType::OwnershipTransfer)
            | Action::Cancel(OperationType::OwnershipTransfer) => &[Role::Recovery],
            Action::BroadcastMetaTx(_) => &[Role::Broadcaster],
            Action::Request(_)
            | Action::Approve(_)
            | Action::Cancel(_)
            | Action::SignMetaTx(_) => &[Role::Owner],
        }
    }

    /// Table lookup for a single role. Callers holding an address rather
    /// than a role go through [`RoleGuard::authorize_caller`].
    pub fn authorize(action: Action, role: Role) -> bool {
        Self::required_roles(action).contains(&role)
    }

    /// Whether `caller` holds any role permitted to perform `action`.
    ///
    /// This is the `authorize(action, role, roleSet)` entry point every
    /// workflow calls. The caller's roles are resolved against `roles`, the
    /// contract's current role set.
    pub fn authorize_caller(action: Action, caller: Address, roles: &RoleSet) -> bool {
        Self::required_roles(action)
            .iter()
            .any(|role| roles.holder(*role) == caller)
    }

    pub fn permitted_actions(caller: Address, roles: &RoleSet) -> Vec<Action> {
        Action::all()
            .into_iter()
            .filter(|action| Self::authorize_caller(*action, caller, roles))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn roles() -> RoleSet {
        RoleSet {
            owner: Address::repeat_byte(0x01),
            broadcaster: Address::repeat_byte(0x02),
            recovery: Address::repeat_byte(0x03),
        }
    }

    #[test]
    fn test_only_owner_approves_ownership_transfer() {
        let action: Action = "approve-ownership-transfer".parse().unwrap();
        assert!(!RoleGuard::authorize(action, Role::Broadcaster));
        assert!(!RoleGuard::authorize(action, Role::Recovery));
        assert!(RoleGuard::authorize(action, Role::Owner));
    }

    #[test]
    fn test_role_set_decides_who_approves_ownership_transfer() {
        let mut set = roles();
        let action: Action = "approve-ownership-transfer".parse().unwrap();
        assert!(!RoleGuard::authorize_caller(action, set.broadcaster, &set));
        assert!(RoleGuard::authorize_caller(action, set.owner, &set));

        // Same address, new role set: the former owner is now only broadcaster.
        let former_owner = set.owner;
        set.owner = Address::repeat_byte(0x04);
        set.broadcaster = former_owner;
        assert!(!RoleGuard::authorize_caller(action, former_owner, &set));
        assert!(RoleGuard::authorize_caller(action, set.owner, &set));
    }

    #[test]
    fn test_ownership_transfer_requested_by_recovery() {
        let set = roles();
        let action = Action::Request(OperationType::OwnershipTransfer);
        assert!(RoleGuard::authorize_caller(action, set.recovery, &set));
        assert!(!RoleGuard::authorize_caller(action, set.owner, &set));
    }

    #[test]
    fn test_broadcast_requires_broadcaster() {
        let set = roles();
        let action = Action::BroadcastMetaTx(OperationType::RecoveryUpdate);
        assert!(RoleGuard::authorize_caller(action, set.broadcaster, &set));
        assert!(!RoleGuard::authorize_caller(action, set.owner, &set));
    }

    #[test]
    fn test_stranger_has_no_permissions() {
        let set = roles();
        assert!(RoleGuard::permitted_actions(Address::repeat_byte(0x99), &set).is_empty());
    }

    #[test]
    fn test_action_names_roundtrip() {
        for action in Action::all() {
            assert_eq!(action.to_string().parse::<Action>().unwrap(), action);
        }
        assert!("approve".parse::<Action>().is_err());
        assert!("launch-ownership-transfer".parse::<Action>().is_err());
    }

    #[test]
    fn test_address_holding_two_roles() {
        let mut set = roles();
        set.broadcaster = set.owner;
        assert_eq!(set.roles_of(set.owner), vec![Role::Owner, Role::Broadcaster]);
    }
}
