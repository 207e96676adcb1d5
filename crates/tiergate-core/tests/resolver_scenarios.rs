//! ---
//! tg_section: "15-testing-qa-runbook"
//! tg_subsection: "test"
//! tg_type: "source"
//! tg_scope: "test"
//! tg_description: "Access resolver scenarios over the fixture bundle."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
mod common;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use tiergate_cache::TenantCache;
use tiergate_catalog::{CapabilityPath, Plan, PlanSource, SharedCatalog};
use tiergate_common::{AccessConfig, AppConfig, CacheConfig, StoreError, TenantId, UnknownCapabilityPolicy};
use tiergate_core::{
    AccessResolver, CachedResolver, CapabilityPrefix, Decision, DenialReason, ResourceRecord,
};
use tiergate_security::{AssignmentSource, DataScope, RoleStore};

use common::{bundle, engine, engine_with, principal};

#[test]
fn starter_employee_edits_only_own_profile() {
    let engine = engine();
    let resolver = engine.resolver();
    let alice = principal(&engine, "alice");
    let bob = principal(&engine, "bob");

    assert!(resolver.can_perform_action(&alice, "core", "users", "user_profile", "edit"));
    assert!(!resolver.can_perform_action(&alice, "core", "users", "user_profile", "view"));

    let edit = engine
        .catalog()
        .snapshot()
        .find_action("core", "users", "user_profile", "edit")
        .unwrap();
    assert_eq!(resolver.get_user_access_scope(&alice, edit), Some(DataScope::Own));

    assert!(resolver.can_perform_action_with_scope(
        &alice,
        "core",
        "users",
        "user_profile",
        "edit",
        Some(&alice)
    ));
    assert!(!resolver.can_perform_action_with_scope(
        &alice,
        "core",
        "users",
        "user_profile",
        "edit",
        Some(&bob)
    ));
}

#[test]
fn grant_outside_entitled_modules_is_denied() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    let decision = engine.resolver().resolver().decide_action(
        &alice, "hr", "payroll", "payslips", "view",
    );
    assert_eq!(decision, Decision::Denied(DenialReason::Entitlement));
    assert!(!engine.resolver().can_access_module(&alice, "hr"));
    assert!(engine.resolver().can_access_module(&alice, "crm"));
}

#[test]
fn super_admin_bypasses_every_check() {
    let engine = engine();
    let resolver = engine.resolver();
    let root = principal(&engine, "root");

    assert!(resolver.can_access_module(&root, "hr"));
    assert!(resolver.can_perform_action(&root, "crm", "leads", "lead_list", "delete"));
    assert!(resolver.can_perform_action(&root, "nowhere", "a", "b", "c"));
    let path = CapabilityPath::new("hr", "payroll", "payslips", "view");
    assert_eq!(resolver.scope_for_path(&root, &path), Some(DataScope::All));
    let stranger = ResourceRecord::default();
    assert!(resolver.can_perform_action_with_scope(
        &root,
        "hr",
        "payroll",
        "payslips",
        "view",
        Some(&stranger)
    ));

    let menu = resolver.accessible_modules(&root);
    let codes = menu.iter().map(|module| module.code.as_str()).collect::<Vec<_>>();
    assert_eq!(codes, vec!["core", "crm", "hr"]);
}

#[test]
fn role_without_assignments_grants_nothing() {
    let engine = engine();
    let resolver = engine.resolver().resolver();
    let carol = principal(&engine, "carol");

    assert_eq!(
        resolver.decide_module(&carol, "core"),
        Decision::Denied(DenialReason::Grant)
    );
    assert!(!resolver.can_access_module(&carol, "crm"));
    let path = CapabilityPath::new("crm", "leads", "lead_list", "view");
    assert_eq!(resolver.scope_for_path(&carol, &path), None);
    assert!(resolver.accessible_modules(&carol).unwrap().is_empty());
}

#[test]
fn widest_scope_wins_across_roles() {
    let engine = engine();
    let resolver = engine.resolver();
    let alice = principal(&engine, "alice");
    let bob = principal(&engine, "bob");
    let carol = principal(&engine, "carol");
    let path = CapabilityPath::new("crm", "leads", "lead_list", "view");

    assert_eq!(resolver.scope_for_path(&alice, &path), Some(DataScope::Own));
    assert_eq!(resolver.scope_for_path(&bob, &path), Some(DataScope::Department));

    let sales_lead = ResourceRecord {
        owner: Some(alice.id.clone()),
        department: Some("sales".into()),
        linked: None,
    };
    assert!(resolver.can_perform_action_with_scope(&bob, "crm", "leads", "lead_list", "view", Some(&sales_lead)));
    assert!(!resolver.can_perform_action_with_scope(&bob, "crm", "leads", "lead_list", "view", Some(&carol)));
    assert_eq!(
        resolver.decide_action_with_scope(&alice, &path, Some(&carol)),
        Decision::Denied(DenialReason::Scope)
    );
}

#[test]
fn module_submodule_and_component_checks_follow_grants() {
    let engine = engine();
    let resolver = engine.resolver();
    let alice = principal(&engine, "alice");

    assert!(resolver.can_access_module(&alice, "core"));
    assert!(resolver.can_access_submodule(&alice, "core", "users"));
    assert!(resolver.can_access_component(&alice, "core", "users", "user_profile"));
    assert!(!resolver.can_access_submodule(&alice, "core", "settings"));
    assert!(resolver.can_access_component(&alice, "crm", "leads", "lead_list"));
    assert!(!resolver.can_perform_action(&alice, "crm", "leads", "lead_list", "delete"));
}

#[test]
fn unknown_paths_fail_closed_unless_legacy_allow() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    assert_eq!(
        engine.resolver().resolver().decide_module(&alice, "billing"),
        Decision::Denied(DenialReason::UnknownCapability)
    );
    assert_eq!(
        engine
            .resolver()
            .decide(&alice, &CapabilityPrefix::parse("core.users.avatar").unwrap()),
        Decision::Denied(DenialReason::UnknownCapability)
    );

    let mut config = AppConfig::default();
    config.access.unknown_capability = UnknownCapabilityPolicy::Allow;
    let legacy = engine_with(config);
    let alice = principal(&legacy, "alice");
    assert!(legacy.resolver().can_access_module(&alice, "billing"));
    assert!(!legacy.resolver().can_perform_action(&alice, "crm", "leads", "lead_list", "delete"));
}

#[test]
fn inactive_nodes_deny_with_their_own_reason() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    assert_eq!(
        engine
            .resolver()
            .resolver()
            .decide_action(&alice, "legacy", "old", "screen", "open"),
        Decision::Denied(DenialReason::Inactive)
    );
    let menu = engine.resolver().accessible_modules(&alice);
    assert!(menu.iter().all(|module| module.code != "legacy"));
}

#[test]
fn tenant_roles_do_not_cross_tenants() {
    let engine = engine();
    let resolver = engine.resolver();
    let mallory = principal(&engine, "mallory");
    let gina = principal(&engine, "gina");

    assert!(!resolver.can_perform_action(&mallory, "crm", "leads", "lead_list", "delete"));
    assert!(resolver.can_perform_action(&gina, "crm", "leads", "lead_list", "delete"));
}

#[test]
fn menu_lists_reachable_components_in_priority_order() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    let menu = engine.resolver().accessible_modules(&alice);

    let codes = menu.iter().map(|module| module.code.as_str()).collect::<Vec<_>>();
    assert_eq!(codes, vec!["core", "crm"]);
    assert_eq!(menu[0].route_prefix.as_deref(), Some("/core"));
    assert_eq!(menu[0].submodules.len(), 1);
    assert_eq!(menu[0].submodules[0].components[0].view.as_deref(), Some("users/profile"));
}

#[test]
fn hierarchy_refresh_is_seen_by_cached_checks() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    assert!(engine.resolver().can_access_module(&alice, "crm"));

    let mut modules = bundle().modules;
    for module in modules.iter_mut().filter(|module| module.code == "crm") {
        module.active = false;
    }
    let generation = engine.refresh_hierarchy(modules).unwrap();
    assert_eq!(generation, 2);
    assert_eq!(
        engine.resolver().decide(&alice, &CapabilityPrefix::module("crm")),
        Decision::Denied(DenialReason::Inactive)
    );
}

struct FlakyPlans {
    down: AtomicBool,
}

impl PlanSource for FlakyPlans {
    fn active_plans(&self, _tenant: &TenantId, _at: DateTime<Utc>) -> Result<Vec<Plan>, StoreError> {
        if self.down.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable("plans offline".into()));
        }
        Ok(vec![Plan::new("starter", ["crm"])])
    }
}

#[test]
fn store_failures_deny_and_are_not_cached() {
    let engine = engine();
    let alice = principal(&engine, "alice");
    let plans = Arc::new(FlakyPlans {
        down: AtomicBool::new(true),
    });
    let assignments: Arc<dyn AssignmentSource> = Arc::<RoleStore>::clone(engine.roles());
    let catalog = SharedCatalog::from_definition(&bundle().hierarchy()).unwrap();
    let resolver = AccessResolver::new(catalog, plans.clone(), assignments, &AccessConfig::default());
    let cached = CachedResolver::new(
        Arc::new(resolver),
        TenantCache::in_memory(&CacheConfig::default(), true),
        CacheConfig::default().invalidation_tags,
    );

    assert_eq!(
        cached.decide(&alice, &CapabilityPrefix::module("crm")),
        Decision::Denied(DenialReason::StoreUnavailable)
    );
    plans.down.store(false, Ordering::SeqCst);
    assert!(cached.can_access_module(&alice, "crm"));
}

#[test]
fn cached_decisions_keep_dotted_codes_apart() {
    let engine = engine();
    let resolver = engine.resolver();
    let alice = principal(&engine, "alice");

    assert!(resolver.can_access_submodule(&alice, "crm", "leads"));
    assert!(resolver.can_perform_action(&alice, "crm", "leads", "lead_list", "view"));

    assert!(!resolver.can_access_module(&alice, "crm.leads"));
    assert!(!resolver.can_access_component(&alice, "crm.leads", "lead_list", "view"));
    assert_eq!(
        resolver.decide(&alice, &CapabilityPrefix::module("crm.leads")),
        Decision::Denied(DenialReason::UnknownCapability)
    );
    assert_eq!(
        resolver.scope_for_path(
            &alice,
            &CapabilityPath::new("crm.leads", "lead_list", "view", "x")
        ),
        None
    );
}
