//! Permission gate
//!
//! Per-function allow-list of roles. Consulted at the start of every
//! mutating engine entry point.

use crate::error::AccessError;
use crate::roles::RoleRegistry;
use secops_core::{functions, Address, FunctionId, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionGate {
    allowed: BTreeMap<FunctionId, Vec<RoleId>>,
}

impl PermissionGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// Default table: owner-only administration and direct transitions,
    /// broadcaster-only meta-transaction submission
    pub fn with_defaults() -> Self {
        let mut gate = Self::new();
        for name in functions::OWNER_DEFAULTS {
            gate.set_allowed_roles(name, vec![secops_core::roles::owner()]);
        }
        for name in functions::BROADCASTER_DEFAULTS {
            gate.set_allowed_roles(name, vec![secops_core::roles::broadcaster()]);
        }
        gate
    }

    /// Replace the allowed roles for a function (not additive)
    pub fn set_allowed_roles(&mut self, function_name: &str, roles: Vec<RoleId>) {
        self.allowed.insert(functions::id(function_name), roles);
    }

    /// Replace by raw identifier, used when reloading from storage
    pub fn set_allowed_roles_by_id(&mut self, function: FunctionId, roles: Vec<RoleId>) {
        self.allowed.insert(function, roles);
    }

    pub fn allowed_roles(&self, function_name: &str) -> &[RoleId] {
        self.allowed
            .get(&functions::id(function_name))
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Succeeds iff the caller holds at least one role listed for the function
    pub fn check_permission(
        &self,
        function_name: &str,
        caller: &Address,
        registry: &RoleRegistry,
    ) -> Result<(), AccessError> {
        let permitted = self
            .allowed_roles(function_name)
            .iter()
            .any(|role| registry.has_role(role, caller));

        if permitted {
            tracing::debug!(function = function_name, %caller, "Permission granted");
            Ok(())
        } else {
            tracing::warn!(function = function_name, %caller, "Permission denied");
            Err(AccessError::Unauthorized {
                function: function_name.to_string(),
                caller: *caller,
            })
        }
    }

    pub fn entries(&self) -> impl Iterator<Item = (&FunctionId, &Vec<RoleId>)> {
        self.allowed.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use secops_core::roles;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn registry() -> RoleRegistry {
        RoleRegistry::with_protected(addr(1), addr(2), addr(3)).unwrap()
    }

    #[test]
    fn test_default_table() {
        let gate = PermissionGate::with_defaults();
        let reg = registry();

        assert!(gate.check_permission(functions::TX_REQUEST, &addr(1), &reg).is_ok());
        assert!(gate.check_permission(functions::TX_REQUEST, &addr(2), &reg).is_err());
        assert!(gate
            .check_permission(functions::TX_APPROVAL_WITH_META_TX, &addr(2), &reg)
            .is_ok());
        assert!(gate
            .check_permission(functions::TX_APPROVAL_WITH_META_TX, &addr(1), &reg)
            .is_err());
    }

    #[test]
    fn test_unknown_function_denied() {
        let gate = PermissionGate::with_defaults();
        let result = gate.check_permission("selfDestruct", &addr(1), &registry());
        assert_eq!(
            result,
            Err(AccessError::Unauthorized {
                function: "selfDestruct".to_string(),
                caller: addr(1),
            })
        );
    }

    #[test]
    fn test_set_allowed_roles_replaces() {
        let mut gate = PermissionGate::with_defaults();
        let reg = registry();

        gate.set_allowed_roles(functions::TX_REQUEST, vec![roles::recovery()]);

        assert_eq!(gate.allowed_roles(functions::TX_REQUEST), &[roles::recovery()]);
        assert!(gate.check_permission(functions::TX_REQUEST, &addr(1), &reg).is_err());
        assert!(gate.check_permission(functions::TX_REQUEST, &addr(3), &reg).is_ok());
    }

    #[test]
    fn test_any_listed_role_suffices() {
        let mut gate = PermissionGate::new();
        gate.set_allowed_roles(functions::TX_CANCELLATION, vec![roles::owner(), roles::recovery()]);
        let reg = registry();

        assert!(gate.check_permission(functions::TX_CANCELLATION, &addr(1), &reg).is_ok());
        assert!(gate.check_permission(functions::TX_CANCELLATION, &addr(3), &reg).is_ok());
        assert!(gate.check_permission(functions::TX_CANCELLATION, &addr(2), &reg).is_err());
    }
}
