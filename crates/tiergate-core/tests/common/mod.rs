//! ---
//! tg_section: "15-testing-qa-runbook"
//! tg_subsection: "test"
//! tg_type: "source"
//! tg_scope: "test"
//! tg_description: "Shared policy bundle for resolver and administration tests."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
#![allow(dead_code)]

use tiergate_common::AppConfig;
use tiergate_core::{Engine, PolicyBundle};
use tiergate_security::Principal;

pub const BUNDLE: &str = r#"
[[modules]]
code = "core"
name = "Core"
priority = 0
requires_subscription = false
route_prefix = "/core"

[[modules.submodules]]
code = "users"
name = "Users"

[[modules.submodules.components]]
code = "user_profile"
name = "User profile"
view = "users/profile"

[[modules.submodules.components.actions]]
code = "view"

[[modules.submodules.components.actions]]
code = "edit"

[[modules.submodules]]
code = "settings"
name = "Settings"
priority = 10

[[modules.submodules.components]]
code = "roles"
name = "Roles"

[[modules.submodules.components.actions]]
code = "manage"

[[modules.submodules.components]]
code = "users"
name = "Users"

[[modules.submodules.components.actions]]
code = "manage"

[[modules.submodules.components]]
code = "billing"
name = "Billing"

[[modules.submodules.components.actions]]
code = "manage"

[[modules]]
code = "crm"
name = "CRM"
priority = 10

[[modules.submodules]]
code = "leads"
name = "Leads"

[[modules.submodules.components]]
code = "lead_list"
name = "Lead list"

[[modules.submodules.components.actions]]
code = "view"

[[modules.submodules.components.actions]]
code = "delete"

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

[[modules]]
code = "legacy"
name = "Legacy"
priority = 30
active = false
requires_subscription = false

[[modules.submodules]]
code = "old"
name = "Old"

[[modules.submodules.components]]
code = "screen"
name = "Screen"

[[modules.submodules.components.actions]]
code = "open"

[[plans]]
code = "starter"
name = "Starter"
modules = ["crm"]

[[plans]]
code = "pro"
name = "Pro"
modules = ["crm", "hr"]

[[subscriptions]]
tenant = "acme"
plan = "starter"
starts_at = "2020-01-01T00:00:00Z"

[[subscriptions]]
tenant = "globex"
plan = "pro"
starts_at = "2020-01-01T00:00:00Z"

[[roles]]
id = "super"
name = "Super Administrator"

[[roles]]
id = "acme-admin"
name = "Tenant Administrator"
scope = { tenant = "acme" }

[[roles.assignments]]
action = "core.settings.roles.manage"
scope = "all"

[[roles.assignments]]
action = "core.settings.users.manage"
scope = "all"

[[roles.assignments]]
action = "core.settings.billing.manage"
scope = "all"

[[roles]]
id = "acme-employee"
name = "Employee"
scope = { tenant = "acme" }

[[roles.assignments]]
action = "core.users.user_profile.edit"
scope = "own"

[[roles.assignments]]
action = "crm.leads.lead_list.view"
scope = "own"

[[roles.assignments]]
action = "hr.payroll.payslips.view"
scope = "all"

[[roles.assignments]]
action = "legacy.old.screen.open"
scope = "all"

[[roles]]
id = "acme-manager"
name = "Manager"
scope = { tenant = "acme" }

[[roles.assignments]]
action = "crm.leads.lead_list.view"
scope = "department"

[[roles]]
id = "acme-empty"
name = "Placeholder"
scope = { tenant = "acme" }

[[roles]]
id = "globex-sales"
name = "Sales"
scope = { tenant = "globex" }

[[roles.assignments]]
action = "crm.leads.lead_list.delete"
scope = "all"

[[principals]]
id = "root"
display_name = "Platform operator"
roles = ["super"]

[[principals]]
id = "alice"
tenant = "acme"
department = "sales"
roles = ["acme-employee"]

[[principals]]
id = "bob"
tenant = "acme"
department = "sales"
roles = ["acme-employee", "acme-manager"]

[[principals]]
id = "carol"
tenant = "acme"
department = "ops"
roles = ["acme-empty"]

[[principals]]
id = "dana"
tenant = "acme"
roles = ["acme-admin"]

[[principals]]
id = "erin"
tenant = "acme"
roles = ["acme-admin"]

[[principals]]
id = "mallory"
tenant = "acme"
roles = ["globex-sales"]

[[principals]]
id = "gina"
tenant = "globex"
roles = ["globex-sales"]
"#;

pub fn bundle() -> PolicyBundle {
    toml::from_str(BUNDLE).expect("fixture bundle parses")
}

pub fn engine() -> Engine {
    engine_with(AppConfig::default())
}

pub fn engine_with(config: AppConfig) -> Engine {
    Engine::from_bundle(&bundle(), config).expect("fixture bundle wires")
}

pub fn principal(engine: &Engine, id: &str) -> Principal {
    engine.principal(id).expect("fixture principal exists")
}
