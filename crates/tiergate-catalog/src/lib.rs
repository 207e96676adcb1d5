//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
#![warn(missing_docs)]

//! The capability catalog answers two questions: which Action a
//! `module.submodule.component.action` path names, and which Modules a
//! tenant's active plans entitle it to use.

pub mod definition;
pub mod error;
pub mod hierarchy;
pub mod path;
pub mod plan;
pub mod shared;

pub use definition::{
    load_document, ActionDefinition, ComponentDefinition, HierarchyDefinition, ModuleDefinition,
    SubModuleDefinition,
};
pub use error::CatalogError;
pub use hierarchy::{
    ActionId, ActionNode, ComponentId, ComponentNode, HierarchyCatalog, ModuleId, ModuleNode,
    SubModuleId, SubModuleNode,
};
pub use path::CapabilityPath;
pub use plan::{Plan, PlanCatalog, PlanSource, TenantSubscription};
pub use shared::SharedCatalog;
