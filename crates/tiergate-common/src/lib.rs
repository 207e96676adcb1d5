//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Shared primitives and utilities for the authorization engine."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
//! Core shared primitives for the Tiergate workspace.
//! This crate exposes identifier newtypes, configuration loading, and
//! tracing initialisation consumed across the workspace.

pub mod config;
pub mod error;
pub mod ids;
pub mod logging;

pub use config::{
    AccessConfig, AdminCapabilities, AppConfig, CacheConfig, InvalidationTags, LoadedAppConfig,
    LoggingConfig, MetricsConfig, UnknownCapabilityPolicy,
};
pub use error::StoreError;
pub use ids::{DepartmentId, PrincipalId, RoleId, TenantId};
pub use logging::{init_tracing, LogFormat};
