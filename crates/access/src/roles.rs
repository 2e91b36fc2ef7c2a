//! Role registry
//!
//! Maps role identifiers to a single holder each. OWNER, BROADCASTER and
//! RECOVERY are permanent: they can be re-assigned but never removed.
//! Authorized signers are tracked separately; they gain meta-transaction
//! signing rights without holding OWNER.

use crate::error::AccessError;
use secops_core::{roles, Address, RoleId};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleRegistry {
    holders: BTreeMap<RoleId, Address>,
    authorized_signers: BTreeSet<Address>,
}

impl RoleRegistry {
    /// Create an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with the three protected roles assigned
    pub fn with_protected(
        owner: Address,
        broadcaster: Address,
        recovery: Address,
    ) -> Result<Self, AccessError> {
        let mut registry = Self::new();
        registry.add_role(roles::owner(), owner)?;
        registry.add_role(roles::broadcaster(), broadcaster)?;
        registry.add_role(roles::recovery(), recovery)?;
        Ok(registry)
    }

    /// Assign a new role
    pub fn add_role(&mut self, role: RoleId, holder: Address) -> Result<(), AccessError> {
        if holder.is_zero() {
            return Err(AccessError::InvalidHolder(holder));
        }
        if self.holders.contains_key(&role) {
            return Err(AccessError::RoleAlreadyExists(role));
        }
        self.holders.insert(role, holder);
        tracing::debug!(%role, %holder, "Role added");
        Ok(())
    }

    /// Remove a non-protected role
    pub fn remove_role(&mut self, role: RoleId) -> Result<Address, AccessError> {
        if Self::is_protected(&role) {
            return Err(AccessError::ProtectedRole(role));
        }
        self.holders
            .remove(&role)
            .ok_or(AccessError::RoleNotFound(role))
    }

    /// Re-assign an existing role, returning the previous holder
    pub fn update_role(&mut self, role: RoleId, new_holder: Address) -> Result<Address, AccessError> {
        if new_holder.is_zero() {
            return Err(AccessError::InvalidHolder(new_holder));
        }
        let slot = self
            .holders
            .get_mut(&role)
            .ok_or(AccessError::RoleNotFound(role))?;
        let previous = std::mem::replace(slot, new_holder);

        // An owner can never also sit in the delegated signer set
        if role == roles::owner() {
            self.authorized_signers.remove(&new_holder);
        }

        tracing::debug!(%role, %previous, holder = %new_holder, "Role updated");
        Ok(previous)
    }

    /// Pure lookup
    pub fn has_role(&self, role: &RoleId, identity: &Address) -> bool {
        self.holders.get(role) == Some(identity)
    }

    /// Current holder of a role
    pub fn holder(&self, role: &RoleId) -> Option<Address> {
        self.holders.get(role).copied()
    }

    /// Holder of OWNER (null identity before initialization)
    pub fn owner(&self) -> Address {
        self.holder(&roles::owner()).unwrap_or(Address::ZERO)
    }

    pub fn broadcaster(&self) -> Address {
        self.holder(&roles::broadcaster()).unwrap_or(Address::ZERO)
    }

    pub fn recovery(&self) -> Address {
        self.holder(&roles::recovery()).unwrap_or(Address::ZERO)
    }

    pub fn is_protected(role: &RoleId) -> bool {
        roles::protected().contains(role)
    }

    /// All (role, holder) pairs in identifier order
    pub fn roles(&self) -> impl Iterator<Item = (&RoleId, &Address)> {
        self.holders.iter()
    }

    /// Delegate meta-transaction signing rights
    pub fn add_authorized_signer(&mut self, signer: Address) -> Result<(), AccessError> {
        if signer.is_zero() {
            return Err(AccessError::InvalidHolder(signer));
        }
        if signer == self.owner() {
            return Err(AccessError::CannotDelegateToOwner(signer));
        }
        if !self.authorized_signers.insert(signer) {
            return Err(AccessError::AlreadyAuthorized(signer));
        }
        Ok(())
    }

    pub fn remove_authorized_signer(&mut self, signer: Address) -> Result<(), AccessError> {
        if !self.authorized_signers.remove(&signer) {
            return Err(AccessError::NotAuthorized(signer));
        }
        Ok(())
    }

    pub fn is_authorized_signer(&self, identity: &Address) -> bool {
        self.authorized_signers.contains(identity)
    }

    /// OWNER or a member of the authorized-signer set
    pub fn can_sign(&self, identity: &Address) -> bool {
        !identity.is_zero()
            && (self.has_role(&roles::owner(), identity) || self.is_authorized_signer(identity))
    }

    pub fn authorized_signers(&self) -> impl Iterator<Item = &Address> {
        self.authorized_signers.iter()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(n: u64) -> Address {
        Address::from_low_u64(n)
    }

    fn registry() -> RoleRegistry {
        RoleRegistry::with_protected(addr(1), addr(2), addr(3)).unwrap()
    }

    #[test]
    fn test_protected_roles_assigned() {
        let reg = registry();
        assert_eq!(reg.owner(), addr(1));
        assert_eq!(reg.broadcaster(), addr(2));
        assert_eq!(reg.recovery(), addr(3));
        assert!(reg.has_role(&roles::owner(), &addr(1)));
        assert!(!reg.has_role(&roles::owner(), &addr(2)));
    }

    #[test]
    fn test_zero_holder_rejected() {
        let mut reg = registry();
        let result = reg.add_role(RoleId::named("AUDITOR"), Address::ZERO);
        assert_eq!(result, Err(AccessError::InvalidHolder(Address::ZERO)));
    }

    #[test]
    fn test_remove_protected_role_always_fails() {
        let mut reg = registry();
        for role in roles::protected() {
            assert_eq!(reg.remove_role(role), Err(AccessError::ProtectedRole(role)));
        }
        assert_eq!(reg.owner(), addr(1));
    }

    #[test]
    fn test_custom_role_lifecycle() {
        let mut reg = registry();
        let auditor = RoleId::named("AUDITOR");

        reg.add_role(auditor, addr(10)).unwrap();
        assert!(reg.has_role(&auditor, &addr(10)));

        assert_eq!(reg.update_role(auditor, addr(11)).unwrap(), addr(10));
        assert!(reg.has_role(&auditor, &addr(11)));

        assert_eq!(reg.remove_role(auditor).unwrap(), addr(11));
        assert!(!reg.has_role(&auditor, &addr(11)));
        assert_eq!(reg.remove_role(auditor), Err(AccessError::RoleNotFound(auditor)));
    }

    #[test]
    fn test_update_unknown_role() {
        let mut reg = registry();
        let role = RoleId::named("NEVER_SET");
        assert_eq!(reg.update_role(role, addr(5)), Err(AccessError::RoleNotFound(role)));
    }

    #[test]
    fn test_duplicate_role_rejected() {
        let mut reg = registry();
        let result = reg.add_role(roles::owner(), addr(9));
        assert_eq!(result, Err(AccessError::RoleAlreadyExists(roles::owner())));
    }

    #[test]
    fn test_authorized_signer_rules() {
        let mut reg = registry();

        assert_eq!(
            reg.add_authorized_signer(addr(1)),
            Err(AccessError::CannotDelegateToOwner(addr(1)))
        );

        reg.add_authorized_signer(addr(7)).unwrap();
        assert!(reg.can_sign(&addr(7)));
        assert_eq!(
            reg.add_authorized_signer(addr(7)),
            Err(AccessError::AlreadyAuthorized(addr(7)))
        );

        reg.remove_authorized_signer(addr(7)).unwrap();
        assert!(!reg.can_sign(&addr(7)));
        assert_eq!(
            reg.remove_authorized_signer(addr(7)),
            Err(AccessError::NotAuthorized(addr(7)))
        );
    }

    #[test]
    fn test_owner_can_sign_broadcaster_cannot() {
        let reg = registry();
        assert!(reg.can_sign(&addr(1)));
        assert!(!reg.can_sign(&addr(2)));
        assert!(!reg.can_sign(&Address::ZERO));
    }

    #[test]
    fn test_promoted_signer_leaves_signer_set() {
        let mut reg = registry();
        reg.add_authorized_signer(addr(7)).unwrap();
        reg.update_role(roles::owner(), addr(7)).unwrap();

        assert!(!reg.is_authorized_signer(&addr(7)));
        assert!(reg.can_sign(&addr(7)));
        assert!(!reg.can_sign(&addr(1)));
    }
}
