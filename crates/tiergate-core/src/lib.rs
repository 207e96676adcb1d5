//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Access resolution and policy wiring."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Access resolution for Tiergate.
//!
//! [`AccessResolver`] reconciles subscription entitlement, role grants and
//! data scope into one decision. [`CachedResolver`] memoizes it per tenant,
//! [`AccessAdministrator`] is the only way to mutate roles, memberships and
//! subscriptions, and [`Engine`] wires everything from a [`PolicyBundle`].

pub mod admin;
pub mod bundle;
pub mod cached;
pub mod decision;
pub mod engine;
pub mod resolver;
pub mod scope;

pub use admin::{AccessAdministrator, AdminError};
pub use bundle::{BundleReport, DanglingGrant, GrantSpec, PolicyBundle, PrincipalSpec, RoleSpec};
pub use cached::CachedResolver;
pub use decision::{Decision, DenialReason};
pub use engine::Engine;
pub use resolver::{
    AccessResolver, CapabilityPrefix, MenuComponent, MenuModule, MenuSubModule, PrincipalGrants,
};
pub use scope::{resource_department, scope_allows, ResourceRecord, ScopedResource};
