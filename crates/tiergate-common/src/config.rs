//! ---
//! tg_section: "01-core-functionality"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Shared primitives and utilities for the authorization engine."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use serde_with::{serde_as, DurationMilliSeconds, DurationSeconds};
use tracing::debug;

use crate::logging::LogFormat;

fn default_super_admin_roles() -> Vec<String> {
    vec!["Super Administrator".to_owned()]
}

fn default_protected_roles() -> Vec<String> {
    vec![
        "Super Administrator".to_owned(),
        "Tenant Administrator".to_owned(),
    ]
}

fn default_multi_tenant() -> bool {
    true
}

fn default_cache_enabled() -> bool {
    true
}

fn default_cache_ttl() -> Duration {
    Duration::from_secs(3600)
}

fn default_cache_capacity() -> usize {
    10_000
}

fn default_store_timeout() -> Duration {
    Duration::from_millis(50)
}

fn default_permissions_tag() -> String {
    "permissions".to_owned()
}

fn default_subscriptions_tag() -> String {
    "subscriptions".to_owned()
}

fn default_hierarchy_tag() -> String {
    "hierarchy".to_owned()
}

fn default_manage_roles() -> String {
    "core.settings.roles.manage".to_owned()
}

fn default_manage_users() -> String {
    "core.settings.users.manage".to_owned()
}

fn default_manage_billing() -> String {
    "core.settings.billing.manage".to_owned()
}

fn default_logging_directory() -> PathBuf {
    PathBuf::from("target/logs")
}

fn default_log_format() -> LogFormat {
    LogFormat::StructuredJson
}

fn default_metrics_enabled() -> bool {
    true
}

/// Primary configuration object for the authorization engine.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    /// Optional policy bundle loaded at start-up.
    #[serde(default)]
    pub bundle: Option<PathBuf>,
    #[serde(default)]
    pub access: AccessConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

/// Metadata describing where an [`AppConfig`] was loaded from.
#[derive(Debug, Clone)]
pub struct LoadedAppConfig {
    pub config: AppConfig,
    pub source: PathBuf,
}

impl AppConfig {
    pub const ENV_CONFIG_PATH: &'static str = "TIERGATE_CONFIG";

    /// Load configuration from disk, respecting the `TIERGATE_CONFIG` override.
    pub fn load<P: AsRef<Path>>(candidates: &[P]) -> Result<Self> {
        Ok(Self::load_with_source(candidates)?.config)
    }

    /// Load configuration from disk together with the effective source path.
    pub fn load_with_source<P: AsRef<Path>>(candidates: &[P]) -> Result<LoadedAppConfig> {
        if let Ok(env_path) = std::env::var(Self::ENV_CONFIG_PATH) {
            if !env_path.trim().is_empty() {
                let path = PathBuf::from(env_path);
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        for candidate in candidates {
            if candidate.as_ref().exists() {
                let path = candidate.as_ref().to_path_buf();
                let config = Self::from_path(&path)?;
                return Ok(LoadedAppConfig {
                    config,
                    source: path,
                });
            }
        }

        Err(anyhow!(
            "no configuration files found. inspected: {}",
            candidates
                .iter()
                .map(|p| p.as_ref().display().to_string())
                .collect::<Vec<_>>()
                .join(", ")
        ))
    }

    /// Read and validate a configuration file.
    pub fn from_path(path: &Path) -> Result<Self> {
        debug!(config_path = %path.display(), "loading configuration");
        let contents = fs::read_to_string(path)
            .with_context(|| format!("unable to read config file {}", path.display()))?;
        let config = toml::from_str::<AppConfig>(&contents)
            .with_context(|| format!("failed to parse config file {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validate structural invariants.
    pub fn validate(&self) -> Result<()> {
        self.access.validate()?;
        self.cache.validate()?;
        Ok(())
    }
}

impl std::str::FromStr for AppConfig {
    type Err = anyhow::Error;

    fn from_str(content: &str) -> std::result::Result<Self, Self::Err> {
        let config: AppConfig =
            toml::from_str(content).with_context(|| "failed to parse configuration")?;
        config.validate()?;
        Ok(config)
    }
}

/// What the resolver does when a capability path is not in the catalog.
#[derive(Debug, Copy, Clone, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum UnknownCapabilityPolicy {
    /// Treat the unknown path as a denial (fail closed).
    #[default]
    Deny,
    /// Permit the unknown path. Only for migrating legacy call sites.
    Allow,
}

/// Access-control settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AccessConfig {
    /// Role names that carry the super-administrator capability.
    #[serde(default = "default_super_admin_roles")]
    pub super_admin_roles: Vec<String>,
    /// Role names that are protected regardless of the role's own flag.
    #[serde(default = "default_protected_roles")]
    pub protected_roles: Vec<String>,
    /// Whether cache keys are namespaced per tenant.
    #[serde(default = "default_multi_tenant")]
    pub multi_tenant: bool,
    #[serde(default)]
    pub unknown_capability: UnknownCapabilityPolicy,
    #[serde(default)]
    pub admin: AdminCapabilities,
}

impl Default for AccessConfig {
    fn default() -> Self {
        Self {
            super_admin_roles: default_super_admin_roles(),
            protected_roles: default_protected_roles(),
            multi_tenant: default_multi_tenant(),
            unknown_capability: UnknownCapabilityPolicy::default(),
            admin: AdminCapabilities::default(),
        }
    }
}

impl AccessConfig {
    pub fn validate(&self) -> Result<()> {
        if self.super_admin_roles.is_empty() {
            return Err(anyhow!("access.super_admin_roles must name at least one role"));
        }
        if let Some(blank) = self
            .super_admin_roles
            .iter()
            .chain(self.protected_roles.iter())
            .find(|name| name.trim().is_empty())
        {
            return Err(anyhow!("access role names cannot be blank (got {blank:?})"));
        }
        self.admin.validate()
    }

    /// Returns true when the role name is configured as super-administrator.
    pub fn is_super_admin_name(&self, name: &str) -> bool {
        self.super_admin_roles.iter().any(|candidate| candidate == name)
    }
}

/// Capability paths (`module.sub.component.action`) guarding administrative mutations.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AdminCapabilities {
    #[serde(default = "default_manage_roles")]
    pub manage_roles: String,
    #[serde(default = "default_manage_users")]
    pub manage_users: String,
    #[serde(default = "default_manage_billing")]
    pub manage_billing: String,
}

impl Default for AdminCapabilities {
    fn default() -> Self {
        Self {
            manage_roles: default_manage_roles(),
            manage_users: default_manage_users(),
            manage_billing: default_manage_billing(),
        }
    }
}

impl AdminCapabilities {
    fn validate(&self) -> Result<()> {
        for (field, path) in [
            ("manage_roles", &self.manage_roles),
            ("manage_users", &self.manage_users),
            ("manage_billing", &self.manage_billing),
        ] {
            let segments = path.split('.').collect::<Vec<_>>();
            if segments.len() != 4 || segments.iter().any(|segment| segment.is_empty()) {
                return Err(anyhow!(
                    "access.admin.{field} must be a four-segment capability path, got '{path}'"
                ));
            }
        }
        Ok(())
    }
}

/// Cache tag names used for bulk invalidation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InvalidationTags {
    #[serde(default = "default_permissions_tag")]
    pub permissions: String,
    #[serde(default = "default_subscriptions_tag")]
    pub subscriptions: String,
    #[serde(default = "default_hierarchy_tag")]
    pub hierarchy: String,
}

impl Default for InvalidationTags {
    fn default() -> Self {
        Self {
            permissions: default_permissions_tag(),
            subscriptions: default_subscriptions_tag(),
            hierarchy: default_hierarchy_tag(),
        }
    }
}

#[serde_as]
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    #[serde(default = "default_cache_enabled")]
    pub enabled: bool,
    #[serde(default = "default_cache_ttl")]
    #[serde_as(as = "DurationSeconds<u64>")]
    pub default_ttl: Duration,
    #[serde(default = "default_cache_capacity")]
    pub capacity: usize,
    /// Upper bound on how long a cache operation may wait for the store.
    #[serde(default = "default_store_timeout")]
    #[serde_as(as = "DurationMilliSeconds<u64>")]
    pub store_timeout: Duration,
    #[serde(default)]
    pub invalidation_tags: InvalidationTags,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: default_cache_enabled(),
            default_ttl: default_cache_ttl(),
            capacity: default_cache_capacity(),
            store_timeout: default_store_timeout(),
            invalidation_tags: InvalidationTags::default(),
        }
    }
}

impl CacheConfig {
    pub fn validate(&self) -> Result<()> {
        if self.default_ttl.is_zero() {
            return Err(anyhow!("cache.default_ttl must be greater than zero"));
        }
        if self.capacity == 0 {
            return Err(anyhow!("cache.capacity must be greater than zero"));
        }
        let tags = &self.invalidation_tags;
        let names = [&tags.permissions, &tags.subscriptions, &tags.hierarchy];
        if names.iter().any(|name| name.trim().is_empty()) {
            return Err(anyhow!("cache.invalidation_tags entries cannot be blank"));
        }
        let unique = names.iter().collect::<HashSet<_>>();
        if unique.len() != names.len() {
            return Err(anyhow!("cache.invalidation_tags entries must be distinct"));
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_directory")]
    pub directory: PathBuf,
    #[serde(default = "default_log_format")]
    pub format: LogFormat,
    #[serde(default)]
    pub file_prefix: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            directory: default_logging_directory(),
            format: default_log_format(),
            file_prefix: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MetricsConfig {
    #[serde(default = "default_metrics_enabled")]
    pub enabled: bool,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            enabled: default_metrics_enabled(),
        }
    }
}
