//! ---
//! tg_section: "02-capability-catalog"
//! tg_subsection: "module"
//! tg_type: "source"
//! tg_scope: "code"
//! tg_description: "Capability hierarchy and subscription plan catalogs."
//! tg_version: "v0.0.0-prealpha"
//! tg_owner: "tbd"
//! ---
use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tiergate_common::{StoreError, TenantId};
use tracing::{debug, info};

use crate::error::CatalogError;

/// Subscription tier listing the modules a tenant may use.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Plan {
    /// Stable plan code.
    pub code: String,
    /// Display name.
    #[serde(default)]
    pub name: String,
    /// Module codes included in the plan.
    #[serde(default)]
    pub modules: BTreeSet<String>,
    /// Plan-level limits carried for callers; not interpreted here.
    #[serde(default)]
    pub limits: BTreeMap<String, serde_json::Value>,
}

impl Plan {
    /// Convenience constructor for a plan without limits.
    pub fn new<I, S>(code: impl Into<String>, modules: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let code = code.into();
        Self {
            name: code.clone(),
            code,
            modules: modules.into_iter().map(Into::into).collect(),
            limits: BTreeMap::new(),
        }
    }

    /// Returns true if the plan includes the module.
    pub fn includes(&self, module: &str) -> bool {
        self.modules.contains(module)
    }
}

/// A tenant's subscription to one plan for a validity window.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TenantSubscription {
    /// Subscribing tenant.
    pub tenant: TenantId,
    /// Plan code.
    pub plan: String,
    /// Start of validity (inclusive).
    pub starts_at: DateTime<Utc>,
    /// End of validity (exclusive); open-ended when absent.
    #[serde(default)]
    pub ends_at: Option<DateTime<Utc>>,
}

impl TenantSubscription {
    /// Returns true when `at` falls inside the validity window.
    pub fn is_active_at(&self, at: DateTime<Utc>) -> bool {
        self.starts_at <= at && self.ends_at.map_or(true, |end| at < end)
    }
}

/// Read access to tenant entitlements.
pub trait PlanSource: Send + Sync {
    /// Plans whose subscription window covers `at`.
    fn active_plans(&self, tenant: &TenantId, at: DateTime<Utc>) -> Result<Vec<Plan>, StoreError>;

    /// Union of module codes included by the tenant's active plans.
    fn entitled_modules(
        &self,
        tenant: &TenantId,
        at: DateTime<Utc>,
    ) -> Result<BTreeSet<String>, StoreError> {
        Ok(self
            .active_plans(tenant, at)?
            .into_iter()
            .flat_map(|plan| plan.modules)
            .collect())
    }
}

#[derive(Debug, Default)]
struct PlanState {
    plans: HashMap<String, Plan>,
    subscriptions: HashMap<TenantId, Vec<TenantSubscription>>,
}

/// In-memory plan and subscription catalog.
#[derive(Debug, Default)]
pub struct PlanCatalog {
    state: RwLock<PlanState>,
}

impl PlanCatalog {
    /// Create an empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert or replace a plan definition.
    pub fn upsert_plan(&self, plan: Plan) -> Result<(), CatalogError> {
        if plan.code.trim().is_empty() {
            return Err(CatalogError::EmptyPlanCode);
        }
        debug!(plan = %plan.code, modules = plan.modules.len(), "plan registered");
        self.state.write().plans.insert(plan.code.clone(), plan);
        Ok(())
    }

    /// Lookup a plan by code.
    pub fn plan(&self, code: &str) -> Option<Plan> {
        self.state.read().plans.get(code).cloned()
    }

    /// Record a subscription; the plan must already exist.
    pub fn subscribe(&self, subscription: TenantSubscription) -> Result<(), CatalogError> {
        if let Some(end) = subscription.ends_at {
            if end <= subscription.starts_at {
                return Err(CatalogError::InvalidWindow {
                    plan: subscription.plan,
                });
            }
        }
        let mut state = self.state.write();
        if !state.plans.contains_key(&subscription.plan) {
            return Err(CatalogError::UnknownPlan(subscription.plan));
        }
        info!(
            tenant = %subscription.tenant,
            plan = %subscription.plan,
            starts_at = %subscription.starts_at,
            "tenant subscription recorded"
        );
        state
            .subscriptions
            .entry(subscription.tenant.clone())
            .or_default()
            .push(subscription);
        Ok(())
    }

    /// End every subscription of the tenant to `plan` that is still open at `at`.
    ///
    /// Returns the number of subscriptions closed.
    pub fn cancel(&self, tenant: &TenantId, plan: &str, at: DateTime<Utc>) -> usize {
        let mut state = self.state.write();
        let Some(subscriptions) = state.subscriptions.get_mut(tenant) else {
            return 0;
        };
        let mut closed = 0;
        for subscription in subscriptions
            .iter_mut()
            .filter(|sub| sub.plan == plan && sub.is_active_at(at))
        {
            subscription.ends_at = Some(at);
            closed += 1;
        }
        if closed > 0 {
            info!(tenant = %tenant, plan, closed, "tenant subscription cancelled");
        }
        closed
    }

    /// All subscriptions recorded for a tenant, active or not.
    pub fn subscriptions(&self, tenant: &TenantId) -> Vec<TenantSubscription> {
        self.state
            .read()
            .subscriptions
            .get(tenant)
            .cloned()
            .unwrap_or_default()
    }
}

impl PlanSource for PlanCatalog {
    fn active_plans(&self, tenant: &TenantId, at: DateTime<Utc>) -> Result<Vec<Plan>, StoreError> {
        let state = self.state.read();
        let Some(subscriptions) = state.subscriptions.get(tenant) else {
            return Ok(Vec::new());
        };
        let mut seen = BTreeSet::new();
        Ok(subscriptions
            .iter()
            .filter(|sub| sub.is_active_at(at))
            .filter(|sub| seen.insert(sub.plan.clone()))
            .filter_map(|sub| state.plans.get(&sub.plan).cloned())
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    fn catalog() -> PlanCatalog {
        let catalog = PlanCatalog::new();
        catalog.upsert_plan(Plan::new("starter", ["core"])).unwrap();
        catalog
            .upsert_plan(Plan::new("growth", ["core", "hr"]))
            .unwrap();
        catalog
    }

    #[test]
    fn entitlement_is_union_of_active_plans() {
        let catalog = catalog();
        let tenant = TenantId::from("acme");
        let now = Utc::now();
        catalog
            .subscribe(TenantSubscription {
                tenant: tenant.clone(),
                plan: "starter".into(),
                starts_at: now - Duration::days(10),
                ends_at: None,
            })
            .unwrap();
        catalog
            .subscribe(TenantSubscription {
                tenant: tenant.clone(),
                plan: "growth".into(),
                starts_at: now - Duration::days(10),
                ends_at: Some(now - Duration::days(1)),
            })
            .unwrap();

        let modules = catalog.entitled_modules(&tenant, now).unwrap();
        assert_eq!(modules, BTreeSet::from(["core".to_owned()]));

        let earlier = now - Duration::days(5);
        let modules = catalog.entitled_modules(&tenant, earlier).unwrap();
        assert!(modules.contains("hr"));
    }

    #[test]
    fn tenant_without_subscription_has_no_modules() {
        let catalog = catalog();
        let modules = catalog
            .entitled_modules(&TenantId::from("ghost"), Utc::now())
            .unwrap();
        assert!(modules.is_empty());
    }

    #[test]
    fn unknown_plan_and_inverted_window_are_rejected() {
        let catalog = catalog();
        let now = Utc::now();
        let err = catalog
            .subscribe(TenantSubscription {
                tenant: "acme".into(),
                plan: "enterprise".into(),
                starts_at: now,
                ends_at: None,
            })
            .unwrap_err();
        assert_eq!(err, CatalogError::UnknownPlan("enterprise".into()));

        let err = catalog
            .subscribe(TenantSubscription {
                tenant: "acme".into(),
                plan: "starter".into(),
                starts_at: now,
                ends_at: Some(now - Duration::seconds(1)),
            })
            .unwrap_err();
        assert!(matches!(err, CatalogError::InvalidWindow { .. }));
    }

    #[test]
    fn cancel_closes_open_subscription() {
        let catalog = catalog();
        let tenant = TenantId::from("acme");
        let now = Utc::now();
        catalog
            .subscribe(TenantSubscription {
                tenant: tenant.clone(),
                plan: "growth".into(),
                starts_at: now - Duration::days(1),
                ends_at: None,
            })
            .unwrap();
        assert_eq!(catalog.cancel(&tenant, "growth", now), 1);
        assert!(catalog.active_plans(&tenant, now).unwrap().is_empty());
        assert_eq!(catalog.cancel(&tenant, "growth", now), 0);
    }
}
