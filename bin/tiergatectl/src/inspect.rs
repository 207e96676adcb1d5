//! ---
//! tg_section: "05-operator-interfaces"
//! tg_subsection: "binary"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Operator CLI for inspecting policy bundles and access decisions."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fmt::Write as _;
use std::path::PathBuf;

use anyhow::{anyhow, Context, Result};
use clap::Args;
use indexmap::IndexMap;
use tiergate_catalog::CapabilityPath;
use tiergate_common::AppConfig;
use tiergate_core::{CapabilityPrefix, Decision, Engine, MenuModule, PolicyBundle, ResourceRecord};
use tracing::debug;

use crate::OutputFormat;

/// Where the configuration and bundle come from.
pub struct Source {
    pub config: Option<PathBuf>,
    pub bundle: Option<PathBuf>,
}

impl Source {
    pub fn app_config(&self) -> Result<AppConfig> {
        let mut config = match &self.config {
            Some(path) => AppConfig::from_path(path)?,
            None => AppConfig::default(),
        };
        if let Some(bundle) = &self.bundle {
            config.bundle = Some(bundle.clone());
        }
        Ok(config)
    }

    fn bundle_path(&self, config: &AppConfig) -> Result<PathBuf> {
        config
            .bundle
            .clone()
            .ok_or_else(|| anyhow!("no policy bundle given; pass --bundle or set `bundle` in the configuration"))
    }

    fn engine(&self) -> Result<Engine> {
        let config = self.app_config()?;
        debug!(bundle = ?config.bundle, "wiring engine for inspection");
        Engine::load(config)
    }
}

pub fn validate(source: &Source, format: OutputFormat) -> Result<String> {
    let config = source.app_config()?;
    let path = source.bundle_path(&config)?;
    let report = PolicyBundle::from_path(&path)?.validate()?;
    if format == OutputFormat::Json {
        return Ok(serde_json::to_string_pretty(&report)?);
    }
    let mut out = String::new();
    writeln!(out, "bundle {} is valid", path.display())?;
    writeln!(
        out,
        "  {} modules, {} actions, {} plans, {} subscriptions, {} roles, {} principals",
        report.modules,
        report.actions,
        report.plans,
        report.subscriptions,
        report.roles,
        report.principals
    )?;
    if report.dangling_grants.is_empty() {
        write!(out, "  no dangling grants")?;
    } else {
        write!(out, "  dangling grants (never match):")?;
        for grant in &report.dangling_grants {
            write!(out, "\n    {grant}")?;
        }
    }
    Ok(out)
}

#[derive(Debug, Args)]
pub struct CheckCommand {
    /// Principal to evaluate.
    #[arg(long, value_name = "ID")]
    principal: String,

    /// Capability paths or prefixes (`module`, `module.sub`, ... up to a full action path).
    #[arg(value_name = "CAPABILITY", required = true, num_args = 1..)]
    capabilities: Vec<String>,

    /// Owner of the resource, enabling the scope check for full action paths.
    #[arg(long = "resource-owner", value_name = "ID")]
    resource_owner: Option<String>,

    /// Department of the resource, enabling the scope check for full action paths.
    #[arg(long = "resource-department", value_name = "ID")]
    resource_department: Option<String>,
}

impl CheckCommand {
    pub fn execute(self, source: &Source, format: OutputFormat) -> Result<String> {
        let engine = source.engine()?;
        let principal = engine.principal(&self.principal)?;
        let resource = (self.resource_owner.is_some() || self.resource_department.is_some()).then(|| {
            ResourceRecord {
                owner: self.resource_owner.as_deref().map(Into::into),
                department: self.resource_department.as_deref().map(Into::into),
                linked: None,
            }
        });

        let mut decisions: IndexMap<String, Decision> = IndexMap::new();
        for raw in &self.capabilities {
            let prefix = CapabilityPrefix::parse(raw)
                .ok_or_else(|| anyhow!("malformed capability '{raw}'"))?;
            let decision = match (prefix.to_path(), &resource) {
                (Some(path), Some(resource)) => {
                    engine
                        .resolver()
                        .decide_action_with_scope(&principal, &path, Some(resource))
                }
                _ => engine.resolver().decide(&principal, &prefix),
            };
            decisions.insert(raw.clone(), decision);
        }

        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(&decisions)?);
        }
        let width = decisions.keys().map(String::len).max().unwrap_or(0);
        Ok(decisions
            .iter()
            .map(|(capability, decision)| format!("{capability:<width$}  {decision}"))
            .collect::<Vec<_>>()
            .join("\n"))
    }
}

#[derive(Debug, Args)]
pub struct ScopeCommand {
    /// Principal to evaluate.
    #[arg(long, value_name = "ID")]
    principal: String,

    /// Full action path (`module.submodule.component.action`).
    #[arg(value_name = "ACTION")]
    action: String,
}

impl ScopeCommand {
    pub fn execute(self, source: &Source, format: OutputFormat) -> Result<String> {
        let engine = source.engine()?;
        let principal = engine.principal(&self.principal)?;
        let path: CapabilityPath = self
            .action
            .parse()
            .with_context(|| format!("invalid action path '{}'", self.action))?;
        let scope = engine.resolver().scope_for_path(&principal, &path);
        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(&serde_json::json!({
                "principal": principal.id,
                "action": path,
                "scope": scope,
            }))?);
        }
        Ok(scope.map_or_else(|| "none".to_string(), |scope| scope.to_string()))
    }
}

#[derive(Debug, Args)]
pub struct MenuCommand {
    /// Principal to evaluate.
    #[arg(long, value_name = "ID")]
    principal: String,
}

impl MenuCommand {
    pub fn execute(self, source: &Source, format: OutputFormat) -> Result<String> {
        let engine = source.engine()?;
        let principal = engine.principal(&self.principal)?;
        let menu = engine.resolver().accessible_modules(&principal);
        if format == OutputFormat::Json {
            return Ok(serde_json::to_string_pretty(&menu)?);
        }
        Ok(render_menu(&menu))
    }
}

fn render_menu(menu: &[MenuModule]) -> String {
    let mut lines = Vec::new();
    for module in menu {
        match &module.route_prefix {
            Some(route) => lines.push(format!("{} ({}) {route}", module.name, module.code)),
            None => lines.push(format!("{} ({})", module.name, module.code)),
        }
        for submodule in &module.submodules {
            lines.push(format!("  {} ({})", submodule.name, submodule.code));
            for component in &submodule.components {
                lines.push(format!("    {} ({})", component.name, component.code));
            }
        }
    }
    if lines.is_empty() {
        return "no accessible modules".to_string();
    }
    lines.join("\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiergate_core::{MenuComponent, MenuSubModule};

    #[test]
    fn menu_renders_as_indented_tree() {
        let menu = vec![MenuModule {
            code: "crm".into(),
            name: "CRM".into(),
            route_prefix: None,
            submodules: vec![MenuSubModule {
                code: "leads".into(),
                name: "Leads".into(),
                components: vec![MenuComponent {
                    code: "lead_list".into(),
                    name: "Lead list".into(),
                    view: None,
                }],
            }],
        }];
        assert_eq!(
            render_menu(&menu),
            "CRM (crm)\n  Leads (leads)\n    Lead list (lead_list)"
        );
        assert_eq!(render_menu(&[]), "no accessible modules");
    }
}
