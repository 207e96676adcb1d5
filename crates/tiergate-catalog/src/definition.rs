//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fs;
use std::path::Path;

use anyhow::{anyhow, Context, Result};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

fn default_true() -> bool {
    true
}

/// Declarative capability tree as written by administrators.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct HierarchyDefinition {
    /// Root modules.
    #[serde(default)]
    pub modules: Vec<ModuleDefinition>,
}

/// Top-level capability grouping, optionally gated by subscription.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ModuleDefinition {
    /// Stable identifier, unique across modules.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Sort order; lower values come first.
    #[serde(default)]
    pub priority: i32,
    /// Inactive modules deny every capability beneath them.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Whether a tenant needs an active plan that includes this module.
    #[serde(default = "default_true")]
    pub requires_subscription: bool,
    /// Informational routing prefix.
    #[serde(default)]
    pub route_prefix: Option<String>,
    /// Child submodules.
    #[serde(default)]
    pub submodules: Vec<SubModuleDefinition>,
}

/// Second level of the capability tree.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct SubModuleDefinition {
    /// Identifier unique within the owning module.
    pub code: String,
    /// Display name.
    pub name: String,
    /// Sort order; lower values come first.
    #[serde(default)]
    pub priority: i32,
    /// Inactive submodules deny every capability beneath them.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Child components.
    #[serde(default)]
    pub components: Vec<ComponentDefinition>,
}

/// Third level of the capability tree, usually one screen or view.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ComponentDefinition {
    /// Identifier unique within the owning submodule.
    pub code: String,
    /// Display name.
    pub name: String,
    /// View identifier rendered by callers.
    #[serde(default)]
    pub view: Option<String>,
    /// Sort order; lower values come first.
    #[serde(default)]
    pub priority: i32,
    /// Inactive components deny every action beneath them.
    #[serde(default = "default_true")]
    pub active: bool,
    /// Grantable actions.
    #[serde(default)]
    pub actions: Vec<ActionDefinition>,
}

/// Leaf of the capability tree; the unit a role grants.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ActionDefinition {
    /// Identifier unique within the owning component.
    pub code: String,
    /// Display name; defaults to the code.
    #[serde(default)]
    pub name: Option<String>,
    /// Inactive actions are never granted.
    #[serde(default = "default_true")]
    pub active: bool,
}

impl HierarchyDefinition {
    /// Load a hierarchy definition from a TOML or YAML file.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        load_document(path)
    }
}

/// Deserialize a TOML (`.toml`) or YAML (`.yaml`/`.yml`) document from disk.
pub fn load_document<T: DeserializeOwned>(path: impl AsRef<Path>) -> Result<T> {
    let path = path.as_ref();
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let extension = path
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);
    match extension.as_deref() {
        Some("toml") => toml::from_str(&raw)
            .with_context(|| format!("failed to parse TOML document {}", path.display())),
        Some("yaml") | Some("yml") => serde_yaml::from_str(&raw)
            .with_context(|| format!("failed to parse YAML document {}", path.display())),
        _ => Err(anyhow!(
            "unsupported document format for {} (expected .toml, .yaml or .yml)",
            path.display()
        )),
    }
}
