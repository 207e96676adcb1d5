//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "test"
//! tg_type: "source"
//! tg_scope: "test"
//! tg_description: "Hierarchy definitions loaded from TOML and YAML files."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::fs;

use tempfile::tempdir;
use tiergate_catalog::{CapabilityPath, CatalogError, HierarchyCatalog, HierarchyDefinition};

const TOML_DEFINITION: &str = r#"
[[modules]]
code = "hr"
name = "HR"
priority = 20

[[modules.submodules]]
code = "payroll"
name = "Payroll"

[[modules.submodules.components]]
code = "payslips"
name = "Payslips"

[[modules.submodules.components.actions]]
code = "view"
name = "View payslips"

[[modules]]
code = "core"
name = "Core"
priority = 0
requires_subscription = false
"#;

const YAML_DEFINITION: &str = r#"
modules:
  - code: hr
    name: HR
    priority: 20
    submodules:
      - code: payroll
        name: Payroll
        components:
          - code: payslips
            name: Payslips
            actions:
              - code: view
                name: View payslips
  - code: core
    name: Core
    priority: 0
    requires_subscription: false
"#;

#[test]
fn toml_and_yaml_describe_the_same_tree() {
    let dir = tempdir().unwrap();
    let toml_path = dir.path().join("hierarchy.toml");
    let yaml_path = dir.path().join("hierarchy.yml");
    fs::write(&toml_path, TOML_DEFINITION).unwrap();
    fs::write(&yaml_path, YAML_DEFINITION).unwrap();

    let from_toml = HierarchyDefinition::from_path(&toml_path).unwrap();
    let from_yaml = HierarchyDefinition::from_path(&yaml_path).unwrap();
    assert_eq!(from_toml, from_yaml);

    let catalog = HierarchyCatalog::build(&from_toml).unwrap();
    let order = catalog
        .modules()
        .map(|id| catalog.module(id).code.clone())
        .collect::<Vec<_>>();
    assert_eq!(order, vec!["core", "hr"]);
    assert!(!catalog.module(catalog.find_module("core").unwrap()).requires_subscription);

    let path = CapabilityPath::new("hr", "payroll", "payslips", "view");
    let action = catalog.resolve(&path).unwrap();
    assert_eq!(catalog.action(action).unwrap().name, "View payslips");
    assert_eq!(catalog.path_of(action), Some(path));
}

#[test]
fn unsupported_extension_is_rejected() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hierarchy.json");
    fs::write(&path, "{}").unwrap();
    let err = HierarchyDefinition::from_path(&path).unwrap_err();
    assert!(err.to_string().contains("unsupported document format"));
}

#[test]
fn duplicate_sibling_codes_fail_the_build() {
    let dir = tempdir().unwrap();
    let path = dir.path().join("hierarchy.yaml");
    fs::write(
        &path,
        "modules:\n  - code: crm\n    name: CRM\n  - code: crm\n    name: CRM again\n",
    )
    .unwrap();
    let definition = HierarchyDefinition::from_path(&path).unwrap();
    let err = HierarchyCatalog::build(&definition).unwrap_err();
    assert!(matches!(err, CatalogError::DuplicateCode { ref code, .. } if code == "crm"));
}
