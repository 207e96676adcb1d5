//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tiergate_common::{DepartmentId, PrincipalId, StoreError, TenantId};

fn default_active() -> bool {
    true
}

/// Employment record linked to a principal; carries the indirect department.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct EmploymentRecord {
    /// Department the employment belongs to.
    #[serde(default)]
    pub department: Option<DepartmentId>,
    /// Job title, informational.
    #[serde(default)]
    pub title: Option<String>,
}

/// Authenticated actor evaluated for access.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Principal {
    /// Stable identifier.
    pub id: PrincipalId,
    /// Owning tenant; platform operators have none.
    #[serde(default)]
    pub tenant: Option<TenantId>,
    /// Display name for UI rendering.
    #[serde(default)]
    pub display_name: String,
    /// Inactive principals do not count as role holders.
    #[serde(default = "default_active")]
    pub active: bool,
    /// Department set directly on the principal.
    #[serde(default)]
    pub department: Option<DepartmentId>,
    /// Linked employment record.
    #[serde(default)]
    pub employment: Option<EmploymentRecord>,
}

impl Principal {
    /// Short helper for constructing an active principal.
    pub fn new(id: impl Into<PrincipalId>, tenant: Option<TenantId>) -> Self {
        Self {
            id: id.into(),
            tenant,
            display_name: String::new(),
            active: true,
            department: None,
            employment: None,
        }
    }

    /// Set the direct department.
    pub fn with_department(mut self, department: impl Into<DepartmentId>) -> Self {
        self.department = Some(department.into());
        self
    }

    /// Department used for scope checks: the direct one, else the employment record's.
    pub fn effective_department(&self) -> Option<&DepartmentId> {
        self.department.as_ref().or_else(|| {
            self.employment
                .as_ref()
                .and_then(|employment| employment.department.as_ref())
        })
    }
}

/// Read access to principal records.
pub trait PrincipalSource: Send + Sync {
    /// Principal by id, `None` when unknown.
    fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError>;
}

/// In-memory principal directory.
#[derive(Debug, Default, Clone)]
pub struct PrincipalDirectory {
    principals: Arc<RwLock<HashMap<PrincipalId, Principal>>>,
}

impl PrincipalDirectory {
    /// Create an empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or update a principal.
    pub fn upsert(&self, principal: Principal) {
        self.principals.write().insert(principal.id.clone(), principal);
    }

    /// Remove a principal.
    pub fn remove(&self, id: &PrincipalId) -> Option<Principal> {
        self.principals.write().remove(id)
    }

    /// Principal by id.
    pub fn get(&self, id: &PrincipalId) -> Option<Principal> {
        self.principals.read().get(id).cloned()
    }

    /// Principals belonging to a tenant, sorted by id.
    pub fn members_of(&self, tenant: &TenantId) -> Vec<Principal> {
        let mut members = self
            .principals
            .read()
            .values()
            .filter(|principal| principal.tenant.as_ref() == Some(tenant))
            .cloned()
            .collect::<Vec<_>>();
        members.sort_by(|a, b| a.id.cmp(&b.id));
        members
    }

    /// Mark a principal inactive. Returns false when unknown.
    pub fn deactivate(&self, id: &PrincipalId) -> bool {
        match self.principals.write().get_mut(id) {
            Some(principal) => {
                principal.active = false;
                true
            }
            None => false,
        }
    }
}

impl PrincipalSource for PrincipalDirectory {
    fn principal(&self, id: &PrincipalId) -> Result<Option<Principal>, StoreError> {
        Ok(self.get(id))
    }
}
