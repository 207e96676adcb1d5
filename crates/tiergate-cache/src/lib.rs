//! ---
//! tg_section: "05-decision-cache"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Tenant-scoped memoization of access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! Tenant-namespaced memoization in front of the access resolver.

pub mod store;
pub mod tenant;

pub use store::{CacheError, KeyValueStore, MemoryStore};
pub use tenant::TenantCache;
