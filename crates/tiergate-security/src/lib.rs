//! ---
//! tg_section: "04-security-access-control"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Role assignments, principals, and protected-entity rules."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
#![warn(missing_docs)]

pub mod audit;
pub mod guard;
pub mod identity;
pub mod metrics;
pub mod rbac;

pub use audit::{AuditEntry, AuditLog};
pub use guard::{GuardViolation, ProtectedEntityGuard};
pub use identity::{EmploymentRecord, Principal, PrincipalDirectory, PrincipalSource};
pub use metrics::AccessMetrics;
pub use rbac::{AssignmentSource, DataScope, RbacError, Role, RoleAssignment, RoleScope, RoleStore};
