//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use serde::{Deserialize, Serialize};
use tiergate_common::{DepartmentId, PrincipalId};
use tiergate_security::{DataScope, EmploymentRecord, Principal};

/// A record whose visibility depends on the caller's data scope.
pub trait ScopedResource {
    /// Principal owning the record.
    fn owner_id(&self) -> Option<&PrincipalId>;

    /// Department set directly on the record.
    fn department_id(&self) -> Option<&DepartmentId>;

    /// Sub-resource consulted when the record has no department of its own.
    fn linked(&self) -> Option<&dyn ScopedResource> {
        None
    }
}

impl ScopedResource for Principal {
    fn owner_id(&self) -> Option<&PrincipalId> {
        Some(&self.id)
    }

    fn department_id(&self) -> Option<&DepartmentId> {
        self.department.as_ref()
    }

    fn linked(&self) -> Option<&dyn ScopedResource> {
        self.employment
            .as_ref()
            .map(|employment| employment as &dyn ScopedResource)
    }
}

impl ScopedResource for EmploymentRecord {
    fn owner_id(&self) -> Option<&PrincipalId> {
        None
    }

    fn department_id(&self) -> Option<&DepartmentId> {
        self.department.as_ref()
    }
}

/// Plain resource description for callers without their own record type.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResourceRecord {
    /// Owning principal.
    #[serde(default)]
    pub owner: Option<PrincipalId>,
    /// Department on the record.
    #[serde(default)]
    pub department: Option<DepartmentId>,
    /// Linked sub-resource.
    #[serde(default)]
    pub linked: Option<Box<ResourceRecord>>,
}

impl ScopedResource for ResourceRecord {
    fn owner_id(&self) -> Option<&PrincipalId> {
        self.owner.as_ref()
    }

    fn department_id(&self) -> Option<&DepartmentId> {
        self.department.as_ref()
    }

    fn linked(&self) -> Option<&dyn ScopedResource> {
        self.linked
            .as_deref()
            .map(|linked| linked as &dyn ScopedResource)
    }
}

/// Department of a resource, following linked sub-resources.
pub fn resource_department(resource: &dyn ScopedResource) -> Option<&DepartmentId> {
    resource
        .department_id()
        .or_else(|| resource.linked().and_then(resource_department))
}

/// Whether `scope` lets `principal` see `resource`.
///
/// `Team` is evaluated exactly like `Department`.
pub fn scope_allows(scope: DataScope, principal: &Principal, resource: &dyn ScopedResource) -> bool {
    match scope {
        DataScope::All => true,
        DataScope::Own => resource.owner_id() == Some(&principal.id),
        DataScope::Department | DataScope::Team => {
            match (principal.effective_department(), resource_department(resource)) {
                (Some(mine), Some(theirs)) => mine == theirs,
                _ => false,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn alice() -> Principal {
        Principal::new("alice", Some("acme".into())).with_department("sales")
    }

    #[test]
    fn own_scope_matches_owner_only() {
        let alice = alice();
        let bob = Principal::new("bob", Some("acme".into())).with_department("sales");
        assert!(scope_allows(DataScope::Own, &alice, &alice));
        assert!(!scope_allows(DataScope::Own, &alice, &bob));
        assert!(scope_allows(DataScope::Department, &alice, &bob));
        assert!(scope_allows(DataScope::All, &alice, &bob));
    }

    #[test]
    fn department_is_found_through_linked_record() {
        let alice = alice();
        let invoice = ResourceRecord {
            owner: None,
            department: None,
            linked: Some(Box::new(ResourceRecord {
                department: Some("sales".into()),
                ..ResourceRecord::default()
            })),
        };
        assert!(scope_allows(DataScope::Department, &alice, &invoice));
        assert!(scope_allows(DataScope::Team, &alice, &invoice));
        assert!(!scope_allows(DataScope::Own, &alice, &invoice));
    }

    #[test]
    fn missing_departments_never_match() {
        let mut carol = Principal::new("carol", Some("acme".into()));
        let orphan = ResourceRecord::default();
        assert!(!scope_allows(DataScope::Department, &carol, &orphan));

        carol.employment = Some(EmploymentRecord {
            department: Some("ops".into()),
            title: None,
        });
        let ops = ResourceRecord {
            department: Some("ops".into()),
            ..ResourceRecord::default()
        };
        assert!(scope_allows(DataScope::Department, &carol, &ops));
        assert!(scope_allows(DataScope::Department, &carol, &carol));
    }
}
