//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Rules that hold regardless of any permission grant.
//!
//! The guard runs before authorization at every mutation boundary. A
//! super-administrator is subject to the same rules as everyone else.

use std::collections::BTreeSet;
use std::sync::Arc;

use thiserror::Error;
use tiergate_common::{PrincipalId, StoreError};
use tracing::warn;

use crate::identity::PrincipalSource;
use crate::rbac::{AssignmentSource, Role, RoleScope};

/// Explicit rejection raised at the mutation boundary.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum GuardViolation {
    /// The role is protected and cannot be edited.
    #[error("role '{role}' is protected and cannot be modified")]
    ProtectedRoleUpdate {
        /// Role name.
        role: String,
    },
    /// The role is protected and cannot be deleted.
    #[error("role '{role}' is protected and cannot be deleted")]
    ProtectedRoleDelete {
        /// Role name.
        role: String,
    },
    /// The operation would leave a protected role without active holders.
    #[error("'{principal}' is the last active holder of protected role '{role}'")]
    LastHolder {
        /// Role name.
        role: String,
        /// Principal that would be removed.
        principal: PrincipalId,
    },
    /// A principal tried to delete itself.
    #[error("principals cannot delete themselves")]
    SelfDeletion,
    /// A principal tried to change its own roles.
    #[error("principals cannot change their own roles")]
    SelfRoleChange,
    /// Holder counts could not be read; the mutation is refused.
    #[error("protected-entity check could not complete: {0}")]
    Store(#[from] StoreError),
}

/// Enforces protected-role and minimum-holder invariants.
#[derive(Clone)]
pub struct ProtectedEntityGuard {
    protected_names: BTreeSet<String>,
    assignments: Arc<dyn AssignmentSource>,
    principals: Arc<dyn PrincipalSource>,
}

impl ProtectedEntityGuard {
    /// Build a guard over the given stores. `protected_names` are always
    /// protected, whatever the role's own flag says.
    pub fn new<I, S>(
        protected_names: I,
        assignments: Arc<dyn AssignmentSource>,
        principals: Arc<dyn PrincipalSource>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            protected_names: protected_names.into_iter().map(Into::into).collect(),
            assignments,
            principals,
        }
    }

    /// Returns true for flagged roles, super-admin roles and well-known
    /// protected names.
    pub fn is_protected(&self, role: &Role) -> bool {
        role.protected || role.super_admin || self.protected_names.contains(&role.name)
    }

    /// Reject edits and renames of protected roles.
    pub fn check_role_update(&self, role: &Role) -> Result<(), GuardViolation> {
        if self.is_protected(role) {
            return Err(reject(GuardViolation::ProtectedRoleUpdate {
                role: role.name.clone(),
            }));
        }
        Ok(())
    }

    /// Reject deletion of protected roles.
    pub fn check_role_delete(&self, role: &Role) -> Result<(), GuardViolation> {
        if self.is_protected(role) {
            return Err(reject(GuardViolation::ProtectedRoleDelete {
                role: role.name.clone(),
            }));
        }
        Ok(())
    }

    /// Reject deleting oneself, and deleting the last active holder of any
    /// protected role the target holds.
    pub fn check_principal_delete(
        &self,
        actor: &PrincipalId,
        target: &PrincipalId,
    ) -> Result<(), GuardViolation> {
        if actor == target {
            return Err(reject(GuardViolation::SelfDeletion));
        }
        for role in self.assignments.roles_of(target)? {
            self.ensure_other_holder(&role, target)?;
        }
        Ok(())
    }

    /// Reject removing a protected role from its last active holder.
    pub fn check_role_revoke(&self, target: &PrincipalId, role: &Role) -> Result<(), GuardViolation> {
        self.ensure_other_holder(role, target)
    }

    /// Reject a principal changing its own role memberships.
    pub fn check_self_role_change(
        &self,
        actor: &PrincipalId,
        target: &PrincipalId,
    ) -> Result<(), GuardViolation> {
        if actor == target {
            return Err(reject(GuardViolation::SelfRoleChange));
        }
        Ok(())
    }

    /// Active holders of a role within its scope.
    ///
    /// Platform roles count every active holder; tenant roles only count
    /// active holders that belong to the role's tenant.
    pub fn active_holders(&self, role: &Role) -> Result<Vec<PrincipalId>, StoreError> {
        let mut holders = Vec::new();
        for id in self.assignments.holders_of(&role.id)? {
            let Some(principal) = self.principals.principal(&id)? else {
                continue;
            };
            let in_scope = match &role.scope {
                RoleScope::Platform => true,
                RoleScope::Tenant(tenant) => principal.tenant.as_ref() == Some(tenant),
            };
            if principal.active && in_scope {
                holders.push(id);
            }
        }
        Ok(holders)
    }

    fn ensure_other_holder(&self, role: &Role, target: &PrincipalId) -> Result<(), GuardViolation> {
        if !self.is_protected(role) {
            return Ok(());
        }
        let holders = self.active_holders(role)?;
        if !holders.iter().any(|holder| holder != target) {
            return Err(reject(GuardViolation::LastHolder {
                role: role.name.clone(),
                principal: target.clone(),
            }));
        }
        Ok(())
    }
}

fn reject(violation: GuardViolation) -> GuardViolation {
    warn!(reason = %violation, "protected-entity guard rejected mutation");
    violation
}
